//! Structural analysis input decks. `$` lines open top-level sections, of
//! which `$MODEL` and `$LOAD CASE` repeat, and `*` lines open keyword
//! sections inside them. Lines starting with `c` are comments.

use indexmap::IndexMap;

use crate::extractor::*;
use crate::grammar::*;
use crate::issues::*;
use crate::normalize::LineFilter;
use crate::record::*;
use crate::rules::*;
use crate::tree::*;
use crate::units::*;
use crate::util::{parse_integer, parse_real, real_key};

/// Comments and blanks go, everything is trimmed.
pub const FILTER: LineFilter = LineFilter {
  comment_prefixes: &["c"],
  trim: true,
  skip_blank: true
};

/// The model sections.
const MODEL: &str = "$MODEL";
/// The load case sections.
const LOAD_CASE: &str = "$LOAD CASE";

/// `$` sections, then `*` keywords.
pub const GRAMMAR: SectionGrammar = SectionGrammar {
  levels: &[
    LevelSpec {
      markers: &[MarkerRule {
        matcher: MarkerMatch::Prefix("$"),
        name: MarkerName::Verbatim
      }],
      repeatable: &[MODEL, LOAD_CASE],
      keep_header: false,
      untitled: None
    },
    LevelSpec::simple(&[MarkerRule {
      matcher: MarkerMatch::Prefix("*"),
      name: MarkerName::Verbatim
    }]),
  ],
  counts: &[],
  sentinels: &[]
};

/// Element numbers of a set.
const ELEMENT: FieldSpec = FieldSpec::integer("element_sets");

/// The most elements one `GEN=` range may expand to.
const MAX_GENERATED: i64 = 1_000_000;

/// Reads `*ELEMENT SETS`: a `SET=name` line names the set the lines after it
/// fill, either with comma-separated element numbers or a `GEN=first,last`
/// range.
#[derive(Default)]
struct ElementSetDecoder {
  /// Element numbers per set, in file order.
  sets: IndexMap<String, Vec<Value>>,
  /// The set being filled.
  current: Option<String>
}

impl SectionDecoder for ElementSetDecoder {
  fn consume(&mut self, line: &str, ctx: &mut RuleContext) -> LineResponse {
    if let Some(name) = line.strip_prefix("SET=") {
      let name = name.trim().to_string();
      self.sets.insert(name.clone(), Vec::new());
      self.current = Some(name);
      return LineResponse::Carry;
    }
    let Some(set) = self.current.as_ref().and_then(|s| self.sets.get_mut(s)) else {
      return LineResponse::Useless;
    };
    if let Some(range) = line.strip_prefix("GEN=") {
      let mut ends = range.split(',').map(parse_integer);
      let (Some(Some(first)), Some(Some(last))) = (ends.next(), ends.next()) else {
        ctx.malformed(ELEMENT.name, line, MalformedReason::NotInteger);
        return LineResponse::Malformed;
      };
      if last.saturating_sub(first) >= MAX_GENERATED {
        ctx.malformed(ELEMENT.name, line, MalformedReason::BadCount);
        return LineResponse::Malformed;
      }
      set.extend((first..=last).map(Value::Integer));
      return LineResponse::Data;
    }
    for tok in line.split(',').filter(|t| !t.trim().is_empty()) {
      set.push(ctx.coerce(&ELEMENT, Some(tok)).unwrap_or_default());
    }
    return LineResponse::Data;
  }

  fn finalise(self: Box<Self>, ctx: &mut RuleContext) {
    let mut rb = RecordBuilder::new();
    for (name, elements) in self.sets {
      rb.set(name, Value::List(elements));
    }
    ctx.record.set(ELEMENT.name, rb.build());
  }
}

/// Builds the decoder.
fn element_sets() -> Box<dyn SectionDecoder> {
  return Box::new(ElementSetDecoder::default());
}

/// Reads `*GEOMETRIC SETS`: a `SET=name, ...` line, then the section
/// properties of the set over any number of comma-separated lines. Blank or
/// non-numeric properties are null.
#[derive(Default)]
struct GeometricSetDecoder {
  /// Properties per set.
  sets: IndexMap<String, Vec<Value>>
}

impl SectionDecoder for GeometricSetDecoder {
  fn consume(&mut self, line: &str, _ctx: &mut RuleContext) -> LineResponse {
    if let Some((_, rest)) = line.split_once("SET=") {
      let name = rest.split(',').next().unwrap_or_default().trim();
      self.sets.insert(name.to_string(), Vec::new());
      return LineResponse::Carry;
    }
    let Some((_, props)) = self.sets.last_mut() else {
      return LineResponse::Useless;
    };
    props.extend(line.split(',').map(|t| Value::from(parse_real(t))));
    return LineResponse::Data;
  }

  fn finalise(self: Box<Self>, ctx: &mut RuleContext) {
    let mut rb = RecordBuilder::new();
    for (name, props) in self.sets {
      rb.set(name, Value::List(props));
    }
    ctx.record.set("geometric_sets", rb.build());
  }
}

/// Builds the decoder.
fn geometric_sets() -> Box<dyn SectionDecoder> {
  return Box::new(GeometricSetDecoder::default());
}

/// The hydrodynamic coefficients, in file order.
pub const HYDRO_COEFFICIENTS: [&str; 6] = [
  "Normal Drag",
  "Tangential Drag",
  "Normal Inertia",
  "Normal Added Mass",
  "Tangential Added Mass",
  "Drag Lift",
];

/// Reads `*HYDRODYNAMIC SETS`. `SET=`, `TYPE=`, `DIAMETER=` and `OPTION=`
/// are carried forward; a coefficient line makes an entry. Constant sets are
/// keyed by their name, others get one entry per Reynolds number, keyed
/// `"<set> Re - <re>"`.
#[derive(Default)]
struct HydroSetDecoder {
  /// The entries, by key.
  entries: IndexMap<String, RecordBuilder>
}

impl HydroSetDecoder {
  /// Makes an entry stamped with the carried values.
  fn entry(ctx: &RuleContext) -> RecordBuilder {
    let mut rb = RecordBuilder::new();
    for name in ["set", "type", "diameter", "option"] {
      rb.set(name, ctx.carry.get(name).clone());
    }
    return rb;
  }
}

impl SectionDecoder for HydroSetDecoder {
  fn consume(&mut self, line: &str, ctx: &mut RuleContext) -> LineResponse {
    if let Some(rest) = line.split_once("SET=").map(|(_, r)| r) {
      let mut parts = rest.split(',');
      let name = parts.next().unwrap_or_default().trim();
      ctx.carry.set("set", name);
      if let Some(ty) = parts.next() {
        ctx.carry.set("type", ty.replace("TYPE=", "").trim().to_lowercase());
      }
      return LineResponse::Carry;
    }
    for key in ["DIAMETER", "OPTION"] {
      if let Some(v) = find_key_value(line, key, '=', None, false) {
        ctx.carry.set(key.to_lowercase(), v);
        return LineResponse::Carry;
      }
    }
    let Some(set) = ctx.carry.get("set").as_text().map(String::from) else {
      return LineResponse::Useless;
    };
    let constant = ctx.carry.get("type").as_text() == Some("constant");
    let tokens = line.split(',').collect::<Vec<_>>();
    let (key, coefficients) = if constant {
      (set, &tokens[..])
    } else {
      const RE: FieldSpec = FieldSpec::real("reynolds");
      let Value::Real(re) = ctx.coerce(&RE, tokens.first().copied()).unwrap_or_default() else {
        return LineResponse::Malformed;
      };
      (format!("{} Re - {}", set, real_key(re)), &tokens[1..])
    };
    let mut entry = Self::entry(ctx);
    for (name, tok) in HYDRO_COEFFICIENTS.into_iter().zip(coefficients) {
      let v = ctx.coerce(&FieldSpec::real(name), Some(*tok)).unwrap_or_default();
      entry.set(name, v);
    }
    for name in HYDRO_COEFFICIENTS.iter().skip(coefficients.len()) {
      entry.set_null(name);
    }
    self.entries.insert(key, entry);
    return LineResponse::Data;
  }

  fn finalise(self: Box<Self>, ctx: &mut RuleContext) {
    let mut rb = RecordBuilder::new();
    for (key, entry) in self.entries {
      rb.set(key, entry.build());
    }
    ctx.record.set("hydrodynamic_sets", rb.build());
  }
}

/// Builds the decoder.
fn hydrodynamic_sets() -> Box<dyn SectionDecoder> {
  return Box::new(HydroSetDecoder::default());
}

/// A soil resistance.
const P: FieldSpec = FieldSpec::real("p");
/// A soil displacement.
const Y: FieldSpec = FieldSpec::real("y");

/// Reads `*P-Y` curves. `DEPTH=` gives the depth of the curve that follows;
/// `NODE=` gives it through the x coordinate of a node of the same model.
#[derive(Default)]
struct PyCurveDecoder {
  /// The curves, keyed by depth.
  curves: IndexMap<String, (Vec<Value>, Vec<Value>)>,
  /// The key of the curve being read.
  current: Option<String>
}

impl PyCurveDecoder {
  /// Finds the x coordinate of a node among the model's nodes.
  fn node_depth(ctx: &RuleContext, node: i64) -> Option<f64> {
    return ctx.record.get("nodes")
      .as_list()?
      .iter()
      .filter_map(Value::as_record)
      .find(|n| n.integer("node") == Some(node))
      .and_then(|n| n.real("x"));
  }
}

impl SectionDecoder for PyCurveDecoder {
  fn consume(&mut self, line: &str, ctx: &mut RuleContext) -> LineResponse {
    if line.contains("SET=") {
      return LineResponse::Useless;
    }
    let depth = if let Some(node) = find_key_value(line, "NODE", '=', None, false) {
      const NODE: FieldSpec = FieldSpec::integer("p_y_curves");
      let Value::Integer(n) = ctx.coerce(&NODE, Some(node)).unwrap_or_default() else {
        return LineResponse::Malformed;
      };
      let Some(x) = Self::node_depth(ctx, n) else {
        ctx.malformed(NODE.name, node, MalformedReason::UnknownKey);
        self.current = None;
        return LineResponse::Malformed;
      };
      Some(x)
    } else if let Some(d) = find_key_value(line, "DEPTH", '=', None, false) {
      const DEPTH: FieldSpec = FieldSpec::real("p_y_curves");
      ctx.coerce(&DEPTH, Some(d)).unwrap_or_default().as_real()
    } else {
      None
    };
    if let Some(depth) = depth {
      let key = real_key(depth);
      self.curves.insert(key.clone(), (Vec::new(), Vec::new()));
      self.current = Some(key);
      return LineResponse::Carry;
    }
    let tokens = line.split(',').collect::<Vec<_>>();
    let Some(curve) = self.current.as_ref().and_then(|k| self.curves.get_mut(k)) else {
      return LineResponse::Useless;
    };
    if tokens.len() != 2 {
      return LineResponse::Useless;
    }
    curve.0.push(ctx.coerce(&P, Some(tokens[0])).unwrap_or_default());
    curve.1.push(ctx.coerce(&Y, Some(tokens[1])).unwrap_or_default());
    return LineResponse::Data;
  }

  fn finalise(self: Box<Self>, ctx: &mut RuleContext) {
    let mut rb = RecordBuilder::new();
    for (depth, (p, y)) in self.curves {
      let mut curve = RecordBuilder::new();
      curve.set(P.name, Value::List(p)).set(Y.name, Value::List(y));
      rb.set(depth, curve.build());
    }
    ctx.record.set("p_y_curves", rb.build());
  }
}

/// Builds the decoder.
fn p_y_curves() -> Box<dyn SectionDecoder> {
  return Box::new(PyCurveDecoder::default());
}

/// The amplitude and period of an equivalent wave RAO.
const RAO: FieldSpec = FieldSpec::real("rao").last_word();

/// Reads the `Equivalent Wave Amp` line of `*RAO`, last one wins.
#[derive(Default)]
struct EquivalentWaveDecoder {
  /// Amplitude and period.
  rao: Option<Vec<Value>>
}

impl SectionDecoder for EquivalentWaveDecoder {
  fn consume(&mut self, line: &str, ctx: &mut RuleContext) -> LineResponse {
    if !line.contains("Equivalent Wave Amp") {
      return LineResponse::Useless;
    }
    let pieces = line.split(',').collect::<Vec<_>>();
    let amp = ctx.coerce(&RAO, pieces.first().copied()).unwrap_or_default();
    let period = ctx.coerce(&RAO, pieces.get(1).copied()).unwrap_or_default();
    self.rao = Some(vec![amp, period]);
    return LineResponse::Data;
  }

  fn finalise(self: Box<Self>, ctx: &mut RuleContext) {
    match self.rao {
      Some(rao) => {
        ctx.record.set("rao_type", "Equivalent Wave").set(RAO.name, Value::List(rao));
      },
      None => {
        ctx.record.set_null("rao_type").set_null(RAO.name);
      }
    }
  }
}

/// Builds the decoder.
fn equivalent_wave() -> Box<dyn SectionDecoder> {
  return Box::new(EquivalentWaveDecoder::default());
}

/// Comma-separated row of a model table, numeric rows only.
macro_rules! model_table {
  ($section:literal, $name:literal, $($tok:literal => $field:expr),+ $(,)?) => {
    ExtractionRule::at(&[seg($section)], Strategy::Rows {
      filter: RowFilter::ANY.numeric(),
      delimiter: Delimiter::Char(','),
      columns: &[$((Token::Nth($tok), $field),)+],
      carry: &[],
      shape: RowShape::LIST,
      name: $name
    })
  };
}

/// The rules of one `$MODEL`.
const MODEL_SCHEMA: Schema = Schema::rules(&[
  model_table!("*NODE", "nodes",
    0 => FieldSpec::integer("node"),
    1 => FieldSpec::real("x"),
    2 => FieldSpec::real("y"),
    3 => FieldSpec::real("z"),
  ),
  model_table!("*ELEMENT", "elements",
    0 => FieldSpec::integer("element"),
    1 => FieldSpec::integer("start_node"),
    2 => FieldSpec::integer("end_node"),
  ),
  ExtractionRule::at(&[seg("*ELEMENT SETS")], Strategy::Decoder {
    name: "element sets",
    make: element_sets
  }),
  ExtractionRule::at(&[seg("*GEOMETRIC SETS")], Strategy::Decoder {
    name: "geometric sets",
    make: geometric_sets
  }),
  ExtractionRule::at(&[seg("*HYDRODYNAMIC SETS")], Strategy::Decoder {
    name: "hydrodynamic sets",
    make: hydrodynamic_sets
  }),
  ExtractionRule::at(&[seg("*P-Y")], Strategy::Decoder {
    name: "p-y curves",
    make: p_y_curves
  }),
  model_table!("*MASS", "masses",
    0 => FieldSpec::integer("node"),
    1 => FieldSpec::real("mass"),
    2 => FieldSpec::text("mass_type").optional(),
  ),
  ExtractionRule::at(&[seg("*TENSIONER")], Strategy::KeyValue {
    key: "STIFFNESS",
    separator: '=',
    until: Some(','),
    field: FieldSpec::real("tensioner_stiffness")
  }),
]);

/// A drift-off limit, `KEY = value`.
macro_rules! limit {
  ($key:literal => $field:literal) => {
    ExtractionRule::at(&[seg("*DRIFT-OFF LIMITS")], Strategy::KeyValue {
      key: $key,
      separator: '=',
      until: None,
      field: FieldSpec::real($field)
    })
  };
}

/// The `*WAVE` spectrum lines, most specific first.
const HSTPGAMMA: &str = "TYPE=JONSWAP, FREQUENCY=AREA, SPEC=HSTPGAMMA";
/// Significant height and peak period only.
const HSTP: &str = "TYPE=JONSWAP, FREQUENCY=AREA, SPEC=HSTP";
/// Regular waves.
const REGULAR: &str = "TYPE=REGULAR";

/// The rules of one `$LOAD CASE`.
const LOAD_CASE_SCHEMA: Schema = Schema::rules(&[
  ExtractionRule::at(&[seg("*DIRECTORY")], Strategy::KeyValue {
    key: "DIRECTORY",
    separator: '=',
    until: None,
    field: FieldSpec::text("name").strip(&['"'])
  }),
  ExtractionRule::at(&[seg("*TIME")], Strategy::Classify {
    cases: &[("STEP=FIXED", "FIXED")],
    ignore_case: false,
    pick: Pick::First,
    field: "time_type"
  }),
  ExtractionRule::at(&[seg("*TIME")], Strategy::Split {
    line: LineSelect::After("STEP=FIXED"),
    cut: Cut::Keep,
    delimiter: Delimiter::Char(','),
    columns: &[
      (Token::Nth(0), FieldSpec::real("time_start").rounded(3)),
      (Token::Nth(1), FieldSpec::real("time_end").rounded(3)),
      (Token::Nth(3), FieldSpec::real("ramp").rounded(3)),
    ]
  }).when(Condition::Equals("time_type", "FIXED")),
  ExtractionRule::at(&[seg("*INTERNAL FLUID")], Strategy::Tagged {
    tag: "SET=_InternalFluid",
    delimiter: Delimiter::Char(','),
    columns: &[
      (Token::Nth(0), FieldSpec::real("level")),
      (Token::Nth(1), FieldSpec::real("density")),
      (Token::Nth(2), FieldSpec::real("pressure")),
      (Token::Nth(5), FieldSpec::integer("axial_inertia").optional()),
    ],
    name: Some("internal_fluids")
  }),
  ExtractionRule::at(&[seg("*TOP TENSION")], Strategy::Tagged {
    tag: "SET=_Tensioner",
    delimiter: Delimiter::Char(','),
    columns: &[(Token::Nth(0), FieldSpec::real("top_tension"))],
    name: None
  }),
  ExtractionRule::at(&[seg("*WAVE")], Strategy::Classify {
    cases: &[
      (HSTPGAMMA, "Jonswap HSTPGAMMA"),
      (HSTP, "Jonswap HSTP"),
      (REGULAR, "Regular"),
    ],
    ignore_case: false,
    pick: Pick::First,
    field: "wave_type"
  }),
  ExtractionRule::at(&[seg("*WAVE")], Strategy::Split {
    line: LineSelect::After(HSTPGAMMA),
    cut: Cut::Keep,
    delimiter: Delimiter::Char(','),
    columns: &[
      (Token::Nth(0), FieldSpec::real("hs").rounded(3)),
      (Token::Nth(1), FieldSpec::real("tp").rounded(3)),
      (Token::Nth(7), FieldSpec::real("wave_dir").rounded(3)),
    ]
  }).when(Condition::Equals("wave_type", "Jonswap HSTPGAMMA")),
  ExtractionRule::at(&[seg("*WAVE")], Strategy::Split {
    line: LineSelect::After(HSTP),
    cut: Cut::Keep,
    delimiter: Delimiter::Char(','),
    columns: &[
      (Token::Nth(0), FieldSpec::real("hs").rounded(3)),
      (Token::Nth(1), FieldSpec::real("tp").rounded(3)),
      (Token::Nth(6), FieldSpec::real("wave_dir").rounded(3)),
    ]
  }).when(Condition::Equals("wave_type", "Jonswap HSTP")),
  ExtractionRule::at(&[seg("*WAVE")], Strategy::Split {
    line: LineSelect::After(REGULAR),
    cut: Cut::Keep,
    delimiter: Delimiter::Char(','),
    columns: &[
      (Token::Nth(0), FieldSpec::real("wave_amplitude").rounded(3)),
      (Token::Nth(1), FieldSpec::real("wave_period").rounded(3)),
      (Token::Nth(2), FieldSpec::real("wave_dir").rounded(3)),
    ]
  }).when(Condition::Equals("wave_type", "Regular")),
  ExtractionRule::at(&[seg("*WIND")], Strategy::Split {
    line: LineSelect::Index(0),
    cut: Cut::Keep,
    delimiter: Delimiter::Char(','),
    columns: &[
      (Token::Nth(0), FieldSpec::real("wind_speed").rounded(3)),
      (Token::Nth(1), FieldSpec::real("wind_dir").rounded(3)),
    ]
  }),
  ExtractionRule::at(&[seg("*CURRENT")], Strategy::Classify {
    cases: &[("TYPE=PIECEWISE LINEAR", "PIECEWISE LINEAR")],
    ignore_case: false,
    pick: Pick::First,
    field: "current_type"
  }),
  ExtractionRule::at(&[seg("*CURRENT")], Strategy::Classify {
    cases: &[("DESCENDING", "DESCENDING"), ("TYPE=PIECEWISE LINEAR", "ASCENDING")],
    ignore_case: false,
    pick: Pick::First,
    field: "current_spec"
  }).when(Condition::Present("current_type")),
  ExtractionRule::at(&[seg("*CURRENT")], Strategy::Rows {
    filter: RowFilter::counts(&[3]).numeric(),
    delimiter: Delimiter::Char(','),
    columns: &[
      (Token::Nth(0), FieldSpec::real("depth")),
      (Token::Nth(1), FieldSpec::real("speed")),
      (Token::Nth(2), FieldSpec::real("direction")),
    ],
    carry: &[],
    shape: RowShape::LIST,
    name: "current_profile"
  }).when(Condition::Present("current_type")),
  limit!("RED TO POD TIME" => "eds"),
  limit!("MAX SLJ STROKE" => "tj_limit"),
  limit!("MAX TEN STROKE" => "ten_limit"),
  limit!("MAX UFJ ANGLE" => "ufj_limit"),
  limit!("MAX LFJ ANGLE" => "lfj_limit"),
  limit!("MAX WH BENDING" => "wh_bm_limit"),
  limit!("MAX VM STRESS" => "riser_vms_limit"),
  limit!("MAX CON VM STRESS" => "cond_vms_limit"),
  ExtractionRule::at(&[seg("*RAO")], Strategy::Decoder {
    name: "equivalent wave",
    make: equivalent_wave
  }),
  ExtractionRule::at(&[seg("*RAO")], Strategy::Contains {
    pattern: "FIRSTRAO=YES",
    field: "first_rao"
  }),
  ExtractionRule::at(&[seg("*TIME,DISCONNECT")], Strategy::Split {
    line: LineSelect::FromEnd(1),
    cut: Cut::Keep,
    delimiter: Delimiter::Char(','),
    columns: &[(Token::Nth(0), FieldSpec::real("disconnect_time"))]
  }),
  ExtractionRule::at(&[seg("*DRILLING MUD")], Strategy::Split {
    line: LineSelect::LastWithout("SET"),
    cut: Cut::Keep,
    delimiter: Delimiter::Char(','),
    columns: &[
      (Token::Nth(1), FieldSpec::real("bulk_modulus")),
      (Token::Nth(2), FieldSpec::real("fanning_friction")),
      (Token::Nth(3), FieldSpec::real("discharge_coeff_out")),
      (Token::Nth(4), FieldSpec::real("discharge_coeff_in")),
      (Token::Nth(6), FieldSpec::real("atmospheric_pressure")),
    ]
  }),
  ExtractionRule::at(&[seg("*OFFSET")], Strategy::KeyValue {
    key: "OPTION",
    separator: '=',
    until: None,
    field: FieldSpec::text("offset_option").or(Literal::Text("dist"))
  }),
  ExtractionRule::at(&[seg("*OFFSET")], Strategy::Split {
    line: LineSelect::FromEnd(1),
    cut: Cut::Keep,
    delimiter: Delimiter::Char(','),
    columns: &[
      (Token::Nth(1), FieldSpec::real("offset_y")),
      (Token::Nth(2), FieldSpec::real("offset_z")),
    ]
  }),
  ExtractionRule::at(&[seg("*DAMPING")], Strategy::Rows {
    filter: RowFilter::counts(&[3]),
    delimiter: Delimiter::Char(','),
    columns: &[(Token::Nth(0), FieldSpec::text("coefficient"))],
    carry: &[CarryKey {
      key: "set",
      name: "set",
      until: None,
      ignore_case: true,
      ty: FieldType::Text
    }],
    shape: RowShape::LIST,
    name: "damping"
  }),
]);

/// The whole schema.
pub const SCHEMA: Schema = Schema {
  rules: &[
    ExtractionRule::at(&[seg("$ANALYSIS"), seg("*UNITS")], Strategy::KeyValue {
      key: "UNITS",
      separator: '=',
      until: None,
      field: FieldSpec::text("units")
    }),
    ExtractionRule::at(&[seg("$ANALYSIS"), seg("*ANALYSIS TYPE")], Strategy::KeyValue {
      key: "TYPE",
      separator: '=',
      until: None,
      field: FieldSpec::text("analysis_type")
    }),
    ExtractionRule::at(&[nth(MODEL, 1), seg("*OCEAN")], Strategy::Split {
      line: LineSelect::Index(0),
      cut: Cut::Keep,
      delimiter: Delimiter::Char(','),
      columns: &[(Token::Nth(0), FieldSpec::real("water_depth"))]
    }),
    ExtractionRule::at(&[seg("$POSTPROCESSING"), seg("*DATABASE")], Strategy::Split {
      line: LineSelect::Index(1),
      cut: Cut::Keep,
      delimiter: Delimiter::Char(','),
      columns: &[(Token::Nth(0), FieldSpec::real("database_start"))]
    }),
  ],
  groups: &[
    GroupSchema {
      name: "models",
      matcher: NameMatch::Exact(MODEL),
      schema: MODEL_SCHEMA
    },
    GroupSchema {
      name: "load_cases",
      matcher: NameMatch::Exact(LOAD_CASE),
      schema: LOAD_CASE_SCHEMA
    },
  ]
};

/// Resolves the unit system from the `UNITS=` keyword.
pub(crate) fn finish(
  rb: &mut RecordBuilder,
  _tree: &SectionTree,
  issues: &mut Vec<ParseIssue>
) {
  let units = rb.get("units").as_text().and_then(|u| u.parse::<UnitSystem>().ok());
  match units {
    Some(units) => {
      rb.set(UNIT_SYSTEM_FIELD, units.name()).set("length_unit", units.length_unit());
    },
    None => {
      rb.set_null(UNIT_SYSTEM_FIELD).set_null("length_unit");
      ParseIssue::Unresolved {
        field: "units".to_string(),
        reason: "Units not found".to_string()
      }.report(issues);
    }
  }
}

#[cfg(test)]
mod tests {
  use crate::prelude::*;

  const SAMPLE: &str = "\
c deck written by hand
$ANALYSIS
*UNITS
UNITS=IMPERIAL
*ANALYSIS TYPE
TYPE=DYNAMIC
$MODEL
*NODE
1, -100.0, 0.0, 0.0
2, 0.0, 0.0, 0.0
3, 50.0, 0.0, 0.0
*ELEMENT
1, 1, 2
2, 2, 3
*ELEMENT SETS
SET=Conductor PIP Inner
GEN=1,2
SET=Riser
2
*GEOMETRIC SETS
SET=Riser, TYPE=PIPE
1.0e9, 1.0e9, , 2.0e7
*HYDRODYNAMIC SETS
SET=Pup Joint, TYPE=CONSTANT
1.2,1.0,1.0,1.0,1.0,0.0
SET=Bare, TYPE=REYNOLDS
DIAMETER=1.75
1.0e5, 1.1, 0.0, 2.0
*P-Y
SET=soil
NODE=1
10.0, 0.1
20.0, 0.2
DEPTH=-150
30.0, 0.3
*MASS
1, 12.5, MASS
*TENSIONER
STIFFNESS=25.0, STROKE=10
*OCEAN
5000.0, 1.99
$LOAD CASE
*DIRECTORY
DIRECTORY=\"case_01\"
*TIME
STEP=FIXED
0.0, 600.0, 0.1, 50.0
*INTERNAL FLUID
SET=_InternalFluid
0.0, 2.0, 144.0, 0, 0, 1
*TOP TENSION
SET=_Tensioner
1500000.0
*WAVE
TYPE=REGULAR
10.0, 12.0, 180.0
*CURRENT
TYPE=PIECEWISE LINEAR, DESCENDING
0.0, 2.0, 90.0
100.0, 1.0, 90.0
*DRIFT-OFF LIMITS
MAX VM STRESS = 0.67
MAX CON VM STRESS = 0.8
*RAO
Equivalent Wave Amp 6.5, Period 11.0
*TIME,DISCONNECT
130.0
*OFFSET
OPTION=percent
1, -30.0, -40.0
*DAMPING
set=damp1
0.05, 0.0, 0.0
$LOAD CASE
*DIRECTORY
DIRECTORY=case_02
*RAO
FIRSTRAO=YES
$POSTPROCESSING
*DATABASE
FILE=db
100.0, 600.0
";

  #[test]
  fn root_fields() {
    let f = RiserFile::parse_str(SAMPLE, FileFormat::Das);
    let rec = f.record();
    assert_eq!(rec.text("units"), Some("IMPERIAL"));
    assert_eq!(rec.text("unit_system"), Some("imperial"));
    assert_eq!(rec.text("length_unit"), Some("ft"));
    assert_eq!(rec.text("analysis_type"), Some("DYNAMIC"));
    assert_eq!(rec.real("water_depth"), Some(5000.0));
    assert_eq!(rec.real("database_start"), Some(100.0));
    assert_eq!(rec.group_len("models"), 1);
    assert_eq!(rec.group_len("load_cases"), 2);
    assert!(f.issues().is_empty(), "{:?}", f.issues());
  }

  #[test]
  fn model_tables() {
    let f = RiserFile::parse_str(SAMPLE, FileFormat::Das);
    let model = f.record().record("models[1]").unwrap();
    assert_eq!(model.list("nodes").map(|l| l.len()), Some(3));
    assert_eq!(model.integer("elements[2]/end_node"), Some(3));
    let sets = model.record("element_sets").unwrap();
    assert_eq!(sets.list("Conductor PIP Inner").map(|l| l.len()), Some(2));
    assert_eq!(sets.integer("Riser[1]"), Some(2));
    assert_eq!(model.real("geometric_sets/Riser[4]"), Some(2.0e7));
    assert!(model.get("geometric_sets/Riser[3]").is_null());
    assert_eq!(model.get("p_y_curves/-100.0/p").reals(), [10.0, 20.0]);
    assert_eq!(model.get("p_y_curves/-150.0/y").reals(), [0.3]);
    assert_eq!(model.text("masses[1]/mass_type"), Some("MASS"));
    assert_eq!(model.real("tensioner_stiffness"), Some(25.0));
  }

  #[test]
  fn hydro_sets_are_keyed_by_name_or_reynolds_number() {
    let f = RiserFile::parse_str(SAMPLE, FileFormat::Das);
    let sets = f.record().record("models[1]/hydrodynamic_sets").unwrap();
    assert_eq!(sets.real("Pup Joint/Normal Drag"), Some(1.2));
    assert_eq!(sets.text("Pup Joint/type"), Some("constant"));
    assert_eq!(sets.real("Bare Re - 100000.0/Normal Drag"), Some(1.1));
    assert_eq!(sets.text("Bare Re - 100000.0/diameter"), Some("1.75"));
    assert!(sets.get("Bare Re - 100000.0/Normal Added Mass").is_null());
  }

  #[test]
  fn load_case_fields() {
    let f = RiserFile::parse_str(SAMPLE, FileFormat::Das);
    let lc = f.record().record("load_cases[1]").unwrap();
    assert_eq!(lc.text("name"), Some("case_01"));
    assert_eq!(lc.text("time_type"), Some("FIXED"));
    assert_eq!(lc.real("time_end"), Some(600.0));
    assert_eq!(lc.real("ramp"), Some(50.0));
    assert_eq!(lc.real("internal_fluids[1]/pressure"), Some(144.0));
    assert_eq!(lc.integer("internal_fluids[1]/axial_inertia"), Some(1));
    assert_eq!(lc.real("top_tension"), Some(1500000.0));
    assert_eq!(lc.text("wave_type"), Some("Regular"));
    assert_eq!(lc.real("wave_period"), Some(12.0));
    assert_eq!(lc.real("wave_dir"), Some(180.0));
    assert!(lc.get("hs").is_null());
    assert_eq!(lc.text("current_spec"), Some("DESCENDING"));
    assert_eq!(lc.real("current_profile[2]/speed"), Some(1.0));
    assert_eq!(lc.real("riser_vms_limit"), Some(0.67));
    assert_eq!(lc.real("cond_vms_limit"), Some(0.8));
    assert_eq!(lc.get("rao").reals(), [6.5, 11.0]);
    assert_eq!(lc.text("rao_type"), Some("Equivalent Wave"));
    assert_eq!(lc.flag("first_rao"), Some(false));
    assert_eq!(lc.real("disconnect_time"), Some(130.0));
    assert_eq!(lc.text("offset_option"), Some("percent"));
    assert_eq!(lc.real("offset_z"), Some(-40.0));
    assert_eq!(lc.text("damping[1]/set"), Some("damp1"));
    assert_eq!(lc.text("damping[1]/coefficient"), Some("0.05"));
    let second = f.record().record("load_cases[2]").unwrap();
    assert_eq!(second.flag("first_rao"), Some(true));
    assert!(second.get("rao").is_null());
    assert_eq!(second.text("offset_option"), Some("dist"));
  }

  #[test]
  fn missing_units_are_unresolved() {
    let f = RiserFile::parse_str("$MODEL\n*NODE\n1, 0.0, 0.0, 0.0\n", FileFormat::Das);
    assert!(f.record().get("unit_system").is_null());
    assert!(f.issues().iter().any(|i| i.field() == Some("units")));
  }

  #[test]
  fn oversized_generated_range_is_refused() {
    let text = "$MODEL\n*ELEMENT SETS\nSET=Riser\nGEN=1,100000000000\n3, 4\n";
    let f = RiserFile::parse_str(text, FileFormat::Das);
    let sets = f.record().record("models[1]/element_sets").unwrap();
    assert_eq!(sets.get("Riser").as_list().map(|l| l.len()), Some(2));
    assert!(f.issues().iter().any(|i| matches!(
      i,
      ParseIssue::MalformedField { reason: MalformedReason::BadCount, .. }
    )));
  }
}
