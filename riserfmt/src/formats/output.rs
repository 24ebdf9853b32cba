//! Structural solver output listings. Sections open on ` *** TITLE *** `
//! banners and are named by the title. Whether the run converged is decided
//! by phrases that can show up anywhere in the listing.

use crate::extractor::*;
use crate::grammar::*;
use crate::issues::*;
use crate::normalize::LineFilter;
use crate::record::*;
use crate::rules::*;
use crate::tree::*;
use crate::units::*;
use crate::util::parse_integer;

/// Blank lines carry nothing here.
pub const FILTER: LineFilter = LineFilter {
  comment_prefixes: &[],
  trim: false,
  skip_blank: true
};

/// The convergence flag.
const CONVERGED: &str = "converged";
/// Set when the restart file was missing.
const RESTART_MISSING: &str = "restart_missing";

/// Shorthand for a case-sensitive sentinel.
const fn sentinel(pattern: &'static str, flag: &'static str, value: bool) -> SentinelRule {
  return SentinelRule { pattern, ignore_case: false, flag, value };
}

/// Banners, plus the phrases that tell whether the run converged.
pub const GRAMMAR: SectionGrammar = SectionGrammar {
  levels: &[LevelSpec::simple(&[MarkerRule {
    matcher: MarkerMatch::ContainsUnless(" *** ", "Articulation Element"),
    name: MarkerName::StripDelimiter("***")
  }])],
  counts: &[],
  sentinels: &[
    SentinelRule {
      pattern: "successful deepriser analysis",
      ignore_case: true,
      flag: CONVERGED,
      value: true
    },
    SentinelRule {
      pattern: "successful flexcom analysis",
      ignore_case: true,
      flag: CONVERGED,
      value: true
    },
    sentinel("Error: Solution has failed to converge.", CONVERGED, false),
    sentinel("Error: The restart file for this analysis does not exist.", CONVERGED, false),
    sentinel("Error: The restart file for this analysis does not exist.", RESTART_MISSING, true),
    sentinel("No database files exist for opening.", CONVERGED, false),
    sentinel("dongle", CONVERGED, false),
  ]
};

/// Reads the vessel offset and the vessel reference point.
#[derive(Default)]
struct VesselMotionDecoder {
  /// The last translational offset seen.
  offsets: Option<Vec<Value>>,
  /// The first reference point seen.
  ref_point: Option<Vec<Value>>
}

/// A translational offset component.
const OFFSET: FieldSpec = FieldSpec::real("vessel_offsets");
/// A reference point coordinate.
const REF_POINT: FieldSpec = FieldSpec::real("vessel_ref_point");

impl SectionDecoder for VesselMotionDecoder {
  fn consume(&mut self, line: &str, ctx: &mut RuleContext) -> LineResponse {
    if line.contains("Vessel Offset (Global Coordinates):") {
      let tokens = Cut::AfterFirst(':').apply(line).split_whitespace().collect::<Vec<_>>();
      // the six-token form has a unit after every component
      let picks: &[usize] = match tokens.len() {
        6 => &[0, 2, 4],
        3 => &[0, 1, 2],
        _ => {
          ctx.malformed(OFFSET.name, line.trim(), MalformedReason::MissingColumn);
          return LineResponse::Malformed;
        }
      };
      let mut offsets = Vec::with_capacity(3);
      for i in picks {
        offsets.push(ctx.coerce(&OFFSET, tokens.get(*i).copied()).unwrap_or_default());
      }
      self.offsets = Some(offsets);
      return LineResponse::Data;
    }
    if self.ref_point.is_none() && line.contains("Initial Coordinates of Vessel Reference Point:") {
      let mut point = Vec::with_capacity(3);
      for tok in Cut::AfterLast(':').apply(line).split_whitespace() {
        point.push(ctx.coerce(&REF_POINT, Some(tok)).unwrap_or_default());
      }
      self.ref_point = Some(point);
      return LineResponse::Data;
    }
    return LineResponse::Useless;
  }

  fn finalise(self: Box<Self>, ctx: &mut RuleContext) {
    ctx.record.set(OFFSET.name, self.offsets.map(Value::List).unwrap_or_default());
    ctx.record.set(REF_POINT.name, self.ref_point.map(Value::List).unwrap_or_default());
  }
}

/// Builds the decoder.
fn vessel_motion() -> Box<dyn SectionDecoder> {
  return Box::new(VesselMotionDecoder::default());
}

/// The node a statistics row is about.
const STAT_NODE: FieldSpec = FieldSpec::integer("node");
/// The degree of freedom.
const STAT_DOF: FieldSpec = FieldSpec::integer("dof");
/// The minimum over the run.
const STAT_MIN: FieldSpec = FieldSpec::real("min");
/// The maximum over the run.
const STAT_MAX: FieldSpec = FieldSpec::real("max");

/// Reads the statistics of motion. A six-token row names its node; the
/// five-token rows after it are further degrees of freedom of that node.
#[derive(Default)]
struct MotionStatisticsDecoder {
  /// The node of the rows being read.
  node: Value,
  /// The rows.
  rows: Vec<Value>
}

impl SectionDecoder for MotionStatisticsDecoder {
  fn consume(&mut self, line: &str, ctx: &mut RuleContext) -> LineResponse {
    let tokens = line.split_whitespace().collect::<Vec<_>>();
    if !(tokens.len() == 5 || tokens.len() == 6) || line.contains("Node") {
      return LineResponse::Useless;
    }
    let rest = if tokens.len() == 6 {
      self.node = ctx.coerce(&STAT_NODE, Some(tokens[0])).unwrap_or_default();
      &tokens[1..]
    } else {
      &tokens[..]
    };
    let mut rb = RecordBuilder::new();
    rb.set(STAT_NODE.name, self.node.clone());
    for (i, spec) in [STAT_DOF, STAT_MIN, STAT_MAX].iter().enumerate() {
      let v = ctx.coerce(spec, rest.get(i).copied()).unwrap_or_default();
      rb.set(spec.name, v);
    }
    self.rows.push(Value::Record(rb.build()));
    return LineResponse::Data;
  }

  fn finalise(self: Box<Self>, ctx: &mut RuleContext) {
    ctx.record.set("motion_statistics", Value::List(self.rows));
  }
}

/// Builds the decoder.
fn motion_statistics() -> Box<dyn SectionDecoder> {
  return Box::new(MotionStatisticsDecoder::default());
}

/// The positions restoring forces are reported at.
pub const FORCE_POSITIONS: [&str; 3] = ["Start", "Midpoint", "End"];

/// Reads the restoring force statistics. A seven-token row starting with an
/// element number opens that element; every row naming a position gives the
/// minimum, maximum and mean there.
#[derive(Default)]
struct RestoringForceDecoder {
  /// The element being read.
  element: Option<i64>,
  /// The rows.
  rows: Vec<Value>
}

impl SectionDecoder for RestoringForceDecoder {
  fn consume(&mut self, line: &str, ctx: &mut RuleContext) -> LineResponse {
    if line.contains("Location") {
      return LineResponse::Useless;
    }
    let tokens = line.split_whitespace().collect::<Vec<_>>();
    if tokens.len() == 7 {
      if let Some(e) = parse_integer(tokens[0]) {
        self.element = Some(e);
      }
    }
    let Some(element) = self.element else {
      return LineResponse::Useless;
    };
    let Some(position) = FORCE_POSITIONS.iter().find(|p| tokens.contains(*p)) else {
      return LineResponse::Useless;
    };
    let mut rb = RecordBuilder::new();
    rb.set("element", element).set("position", *position);
    for (back, name) in [(4, "min"), (3, "max"), (2, "mean")] {
      let tok = Token::FromEnd(back).pick(&tokens);
      let v = ctx.coerce(&FieldSpec::real(name), tok).unwrap_or_default();
      rb.set(name, v);
    }
    self.rows.push(Value::Record(rb.build()));
    return LineResponse::Data;
  }

  fn finalise(self: Box<Self>, ctx: &mut RuleContext) {
    ctx.record.set("restoring_forces", Value::List(self.rows));
  }
}

/// Builds the decoder.
fn restoring_forces() -> Box<dyn SectionDecoder> {
  return Box::new(RestoringForceDecoder::default());
}

/// Reads the fixed and sliding pipe-in-pipe connections. Stiffness given as
/// a curve counts as zero.
#[derive(Default)]
struct PipConnectionDecoder {
  /// The rows.
  rows: Vec<Value>
}

impl SectionDecoder for PipConnectionDecoder {
  fn consume(&mut self, line: &str, ctx: &mut RuleContext) -> LineResponse {
    let lower = line.to_lowercase();
    if !(lower.contains("fixed") || lower.contains("sliding")) {
      return LineResponse::Useless;
    }
    let tokens = line.split_whitespace().collect::<Vec<_>>();
    let mut rb = RecordBuilder::new();
    for (i, name) in [(2, "node_1"), (3, "node_2")] {
      let v = ctx.coerce(&FieldSpec::integer(name), tokens.get(i).copied());
      rb.set(name, v.unwrap_or_default());
    }
    const STIFFNESS: FieldSpec = FieldSpec::real("perpendicular_stiffness");
    let stiffness = match tokens.get(4) {
      Some(t) if t.to_lowercase().contains("curve") => Value::Real(0.0),
      t => ctx.coerce(&STIFFNESS, t.copied()).unwrap_or_default()
    };
    rb.set(STIFFNESS.name, stiffness);
    self.rows.push(Value::Record(rb.build()));
    return LineResponse::Data;
  }

  fn finalise(self: Box<Self>, ctx: &mut RuleContext) {
    ctx.record.set("pip_sections", Value::List(self.rows));
  }
}

/// Builds the decoder.
fn pip_connections() -> Box<dyn SectionDecoder> {
  return Box::new(PipConnectionDecoder::default());
}

/// Lines of the per-element tables that are headings or rulers.
macro_rules! element_table {
  ($section:literal, $skip:literal, $name:literal, $($tok:literal => $field:literal),+ $(,)?) => {
    ExtractionRule::at(&[seg($section)], Strategy::Rows {
      filter: RowFilter::ANY.skipping(&["***", "Element", "----", $skip]).numeric(),
      delimiter: Delimiter::Whitespace,
      columns: &[
        (Token::Nth(0), FieldSpec::integer("element")),
        $((Token::Nth($tok), FieldSpec::real($field)),)+
      ],
      carry: &[],
      shape: RowShape::LIST,
      name: $name
    })
  };
}

/// The whole schema.
pub const SCHEMA: Schema = Schema::rules(&[
  ExtractionRule::here(Strategy::Sentinel { flag: CONVERGED, field: CONVERGED }),
  ExtractionRule::here(Strategy::Sentinel { flag: RESTART_MISSING, field: RESTART_MISSING }),
  ExtractionRule::at(&[seg("UNIT SYSTEM")], Strategy::Classify {
    cases: &[("Imperial", "imperial"), ("Metric", "metric")],
    ignore_case: false,
    pick: Pick::Last,
    field: UNIT_SYSTEM_FIELD
  }).expected(),
  ExtractionRule::at(&[seg("STRUCTURAL DISCRETISATION DETAILS")], Strategy::KeyValue {
    key: "No. of Pipe-in-Pipe Connections",
    separator: ':',
    until: None,
    field: FieldSpec::integer("pip_connections").or(Literal::Integer(0))
  }),
  ExtractionRule::at(&[seg("OCEAN ENVIRONMENT DATA")], Strategy::Split {
    line: LineSelect::LastContaining("."),
    cut: Cut::Keep,
    delimiter: Delimiter::Whitespace,
    columns: &[(Token::Nth(0), FieldSpec::real("water_depth"))]
  }).expected(),
  ExtractionRule::at(&[seg("NODAL DATA")], Strategy::Rows {
    filter: RowFilter::counts(&[4, 5]).skipping(&["Node No."]),
    delimiter: Delimiter::Whitespace,
    columns: &[
      (Token::Nth(0), FieldSpec::integer("node")),
      (Token::Nth(1), FieldSpec::real("x")),
      (Token::Nth(2), FieldSpec::real("y")),
      (Token::Nth(3), FieldSpec::real("z")),
      (Token::Nth(4), FieldSpec::real("contact_diameter").optional()),
    ],
    carry: &[],
    shape: RowShape::LIST,
    name: "nodes"
  }),
  ExtractionRule::at(&[seg("ELEMENT DATA")], Strategy::Rows {
    filter: RowFilter::counts(&[12, 9]).skipping(&["Element"]),
    delimiter: Delimiter::Whitespace,
    columns: &[
      (Token::Nth(0), FieldSpec::integer("element")),
      (Token::Nth(1), FieldSpec::integer("start_node")),
      (Token::Nth(2), FieldSpec::integer("end_node")),
    ],
    carry: &[],
    shape: RowShape::LIST,
    name: "elements"
  }),
  element_table!("ELEMENT PROPERTIES", "Inertia", "element_properties", 1 => "ei_yy"),
  element_table!(
    "ELEMENT PROPERTIES FOR STRESS CALCULATIONS",
    "Number",
    "element_stress_properties",
    1 => "effective_do",
    2 => "effective_di",
  ),
  element_table!("DRAG AND BUOYANCY DATA", "Diameter", "drag_data", 1 => "internal_diameter"),
  ExtractionRule::at(&[seg("OUTPUT OF VESSEL MOTION DATA")], Strategy::Decoder {
    name: "vessel motion",
    make: vessel_motion
  }),
  ExtractionRule::at(&[seg("TIME VARIABLES")], Strategy::Split {
    line: LineSelect::LastContaining("Analysis Start Time"),
    cut: Cut::AfterLast(':'),
    delimiter: Delimiter::Whitespace,
    columns: &[(Token::Nth(0), FieldSpec::real("start_time").or_raw())]
  }),
  ExtractionRule::at(&[seg("TIME VARIABLES")], Strategy::Split {
    line: LineSelect::LastContaining("Analysis Finish Time"),
    cut: Cut::AfterLast(':'),
    delimiter: Delimiter::Whitespace,
    columns: &[(Token::Nth(0), FieldSpec::real("finish_time").or_raw())]
  }),
  ExtractionRule::at(&[seg("BOUNDARY CONDITION INPUT DATA")], Strategy::KeyValue {
    key: "No. of Constant Specified Displacements",
    separator: ':',
    until: None,
    field: FieldSpec::integer("no_constant_bcs")
  }),
  ExtractionRule::at(&[seg("BOUNDARY CONDITION INPUT DATA")], Strategy::KeyValue {
    key: "No. of Attached Vessel Displacements",
    separator: ':',
    until: None,
    field: FieldSpec::integer("no_vessel_bcs")
  }),
  ExtractionRule::at(&[seg("BOUNDARY CONDITION INPUT DATA")], Strategy::CountedTable {
    count: CountSource::Field("no_vessel_bcs"),
    header: LineSelect::FirstContaining(
      "DISPLACEMENTS SPECIFIED FROM MOTION OF ATTACHED FLOATING VESSEL"
    ),
    skip: 2,
    delimiter: Delimiter::Whitespace,
    columns: &[
      (Token::Nth(0), FieldSpec::integer("node")),
      (Token::Nth(1), FieldSpec::integer("dof")),
    ],
    name: "vessel_bcs"
  }).when(Condition::Present("no_vessel_bcs")),
  ExtractionRule::at(&[seg("STATISTICS OF MOTION")], Strategy::Decoder {
    name: "statistics of motion",
    make: motion_statistics
  }),
  ExtractionRule::at(&[seg("SPECTRUM DISCRETISATION DATA")], Strategy::Classify {
    cases: &[("regular", "regular")],
    ignore_case: true,
    pick: Pick::First,
    field: "wave_type"
  }),
  ExtractionRule::at(&[seg("SPECTRUM DISCRETISATION DATA")], Strategy::Split {
    line: LineSelect::FromEnd(1),
    cut: Cut::Keep,
    delimiter: Delimiter::Whitespace,
    columns: &[
      (Token::Nth(1), FieldSpec::real("wave_amplitude")),
      (Token::Nth(2), FieldSpec::real("wave_period")),
      (Token::Nth(3), FieldSpec::real("wave_direction")),
    ]
  }).when(Condition::Equals("wave_type", "regular")),
  ExtractionRule::at(&[seg("STATISTICS OF ELEMENT RESTORING FORCES")], Strategy::Decoder {
    name: "restoring forces",
    make: restoring_forces
  }),
  ExtractionRule::at(&[seg("PIPE-IN-PIPE CONNECTIONS DATA")], Strategy::Decoder {
    name: "pipe-in-pipe connections",
    make: pip_connections
  }),
]);

/// Resolves the length unit and defaults the restart flag.
pub(crate) fn finish(
  rb: &mut RecordBuilder,
  _tree: &SectionTree,
  issues: &mut Vec<ParseIssue>
) {
  if rb.get(RESTART_MISSING).is_null() {
    rb.set(RESTART_MISSING, false);
  }
  match UnitSystem::of(rb.peek()) {
    Ok(units) => {
      rb.set("length_unit", units.length_unit());
    },
    Err(e) => {
      rb.set_null("length_unit");
      ParseIssue::Unresolved {
        field: "length_unit".to_string(),
        reason: e.to_string()
      }.report(issues);
    }
  }
}

#[cfg(test)]
mod tests {
  use crate::prelude::*;

  const SAMPLE: &str = "\
 DeepRiser v3
 *** UNIT SYSTEM ***
   Analysis performed in Imperial units
 *** STRUCTURAL DISCRETISATION DETAILS ***
   No. of Pipe-in-Pipe Connections       :     1
 *** NODAL DATA ***
   Node No.    X        Y      Z
     1      0.0     0.0    0.0
     2     50.0     0.0    0.0   1.5
    10    100.0     0.0    0.0
 *** ELEMENT DATA ***
   Element  Start  End  a  b  c  d  e  f
     1    1    2    0  0  0  0  0  0
 *** ELEMENT PROPERTIES FOR STRESS CALCULATIONS ***
   Element Number   Do    Di
   ------------------------
     1   21.0  19.5
 *** OCEAN ENVIRONMENT DATA ***
   Water depth
   5000.0  ft
 *** OUTPUT OF VESSEL MOTION DATA ***
   Initial Coordinates of Vessel Reference Point:  100.0  0.0  0.0
   Vessel Offset (Global Coordinates):  0.0 ft 300.0 ft 400.0 ft
 *** TIME VARIABLES ***
   Analysis Start Time  :  0.0 s
   Analysis Finish Time :  600.0 s
 *** BOUNDARY CONDITION INPUT DATA ***
   No. of Constant Specified Displacements :  6
   No. of Attached Vessel Displacements    :  2
   DISPLACEMENTS SPECIFIED FROM MOTION OF ATTACHED FLOATING VESSEL
   Node  DOF
   ---------
     10   1
     10   2
 *** STATISTICS OF MOTION ***
   Node  DOF  Min  Max  Mean  Std
     10   1   -4.0   6.0   1.0  0.5
          2   -1.0   1.0   0.0  0.1
 *** SPECTRUM DISCRETISATION DATA ***
   Regular wave
   1   10.0  12.0  180.0
 *** STATISTICS OF ELEMENT RESTORING FORCES ***
   Element  Location  Min  Max  Mean  Std
     98  Start  0.0   10.0  50.0  30.0  1.0
         End  100.0  11.0  51.0  31.0  1.0
 *** PIPE-IN-PIPE CONNECTIONS DATA ***
   1  Fixed  2  10  Curve
 Successful DeepRiser analysis
";

  #[test]
  fn listing_fields() {
    let f = RiserFile::parse_str(SAMPLE, FileFormat::SolverOutput);
    let rec = f.record();
    assert_eq!(rec.flag("converged"), Some(true));
    assert_eq!(rec.flag("restart_missing"), Some(false));
    assert_eq!(rec.text("unit_system"), Some("imperial"));
    assert_eq!(rec.text("length_unit"), Some("ft"));
    assert_eq!(rec.integer("pip_connections"), Some(1));
    assert_eq!(rec.real("water_depth"), Some(5000.0));
    assert_eq!(rec.list("nodes").map(|l| l.len()), Some(3));
    assert_eq!(rec.real("nodes[2]/contact_diameter"), Some(1.5));
    assert_eq!(rec.integer("elements[1]/end_node"), Some(2));
    assert_eq!(rec.real("element_stress_properties[1]/effective_di"), Some(19.5));
    assert_eq!(rec.get("vessel_offsets").reals(), [0.0, 300.0, 400.0]);
    assert_eq!(rec.get("vessel_ref_point").reals(), [100.0, 0.0, 0.0]);
    assert_eq!(rec.real("finish_time"), Some(600.0));
    assert_eq!(rec.integer("no_constant_bcs"), Some(6));
    assert_eq!(rec.integer("vessel_bcs[2]/dof"), Some(2));
    assert_eq!(rec.integer("motion_statistics[2]/node"), Some(10));
    assert_eq!(rec.real("motion_statistics[1]/max"), Some(6.0));
    assert_eq!(rec.text("wave_type"), Some("regular"));
    assert_eq!(rec.real("wave_amplitude"), Some(10.0));
    assert_eq!(rec.real("wave_direction"), Some(180.0));
    assert_eq!(rec.text("restoring_forces[2]/position"), Some("End"));
    assert_eq!(rec.integer("restoring_forces[2]/element"), Some(98));
    assert_eq!(rec.real("restoring_forces[1]/mean"), Some(30.0));
    assert_eq!(rec.real("pip_sections[1]/perpendicular_stiffness"), Some(0.0));
    assert!(f.issues().is_empty(), "{:?}", f.issues());
  }

  #[test]
  fn failure_phrases_win_when_last() {
    let text = "Successful DeepRiser analysis\nError: Solution has failed to converge.\n";
    let f = RiserFile::parse_str(text, FileFormat::SolverOutput);
    assert_eq!(f.record().flag("converged"), Some(false));
    let text = "Error: The restart file for this analysis does not exist.\n";
    let f = RiserFile::parse_str(text, FileFormat::SolverOutput);
    assert_eq!(f.record().flag("restart_missing"), Some(true));
    assert!(f.record().get("length_unit").is_null());
  }

  #[test]
  fn counted_table_header_on_the_last_line() {
    let text = " *** BOUNDARY CONDITION INPUT DATA ***\n\
      No. of Attached Vessel Displacements : 2\n\
      DISPLACEMENTS SPECIFIED FROM MOTION OF ATTACHED FLOATING VESSEL\n";
    let f = RiserFile::parse_str(text, FileFormat::SolverOutput);
    assert_eq!(f.record().integer("no_vessel_bcs"), Some(2));
    assert_eq!(f.record().list("vessel_bcs").map(|l| l.len()), Some(0));
    let short = f.issues().iter().any(|i| matches!(
      i,
      ParseIssue::MalformedField { reason: MalformedReason::MissingLine, field, .. }
        if field == "vessel_bcs"
    ));
    assert!(short, "{:?}", f.issues());
  }
}
