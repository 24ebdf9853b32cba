//! SHEAR7 input files. They are split into numbered blocks by `***` lines,
//! e.g. `*** BLOCK 2. STRUCTURAL DATA ***`, and every value sits at a fixed
//! line offset within its block. Section property zones are six lines each
//! and their count is declared in the block, so zone lines are never taken
//! for markers.
//!
//! The v4.10 and v4.6 layouts only differ in the damping line of each zone.

use crate::extractor::*;
use crate::grammar::*;
use crate::issues::*;
use crate::normalize::LineFilter;
use crate::record::*;
use crate::rules::*;
use crate::tree::*;

/// Byte column where a zone's name starts.
const ZONE_NAME_COLUMN: usize = 50;

/// Blank lines count towards offsets here.
const FILTER: LineFilter = LineFilter::RAW;

/// Blocks, with the zone and current point counts protected.
const GRAMMAR: SectionGrammar = SectionGrammar {
  levels: &[LevelSpec::simple(&[MarkerRule {
    matcher: MarkerMatch::Contains("***"),
    name: MarkerName::BeforeDot("***")
  }])],
  counts: &[
    CountDeclaration {
      section: "BLOCK 2",
      line: 7,
      token: 0,
      lines_per_item: 6
    },
    CountDeclaration {
      section: "BLOCK 3",
      line: 0,
      token: 0,
      lines_per_item: 1
    },
  ],
  sentinels: &[]
};

/// Builds the pieces of one section property zone, common lines first and
/// then the version-specific damping line.
macro_rules! zone_parts {
  ($($damping:expr),* $(,)?) => {
    &[
      BlockPart::Column {
        line: 0,
        start: ZONE_NAME_COLUMN,
        end: None,
        field: FieldSpec::text("name")
      },
      zone_token(0, 0, FieldSpec::real("start")),
      zone_token(0, 1, FieldSpec::real("end")),
      zone_token(1, 0, FieldSpec::real("hydro_diameter")),
      zone_token(2, 0, FieldSpec::real("inertia")),
      zone_token(2, 1, FieldSpec::real("dry_mass")),
      zone_token(2, 2, FieldSpec::real("wet_mass")),
      zone_token(3, 1, FieldSpec::integer("sn_curve_id")),
      zone_token(4, 0, FieldSpec::real("bandwidth")),
      zone_token(4, 1, FieldSpec::real("st_code")),
      zone_token(4, 2, FieldSpec::real("cl_reduction_factor")),
      zone_token(4, 3, FieldSpec::integer("zone_cl_type")),
      $($damping,)*
    ]
  };
}

/// A whitespace token of a zone line, commas stripped.
const fn zone_token(line: usize, n: usize, field: FieldSpec) -> BlockPart {
  return BlockPart::Token {
    line,
    delimiter: Delimiter::Whitespace,
    token: Token::Nth(n),
    field: field.strip(&[','])
  };
}

/// A comma-separated value of the damping line (line 5) of a zone.
const fn damping(n: usize, field: FieldSpec) -> BlockPart {
  return BlockPart::Token {
    line: 5,
    delimiter: Delimiter::Char(','),
    token: Token::Nth(n),
    field: field.first_word()
  };
}

/// Reads the S-N curves of block 4: per curve, a line with the curve id and
/// its number of segments, a line that is skipped, and one `stress, cycles`
/// line per segment end.
#[derive(Default)]
struct SnCurveDecoder {
  /// Lines seen so far.
  seen: usize,
  /// Curves still to be read.
  remaining: usize,
  /// Lines still to be skipped.
  skip: usize,
  /// Points still to be read for the current curve.
  points: usize,
  /// The curves read so far.
  curves: Vec<(Value, Vec<Value>, Vec<Value>)>
}

/// The S-N curve id.
const SN_ID: FieldSpec = FieldSpec::integer("id").strip(&[',']);
/// The number of segments of a curve.
const SN_SEGMENTS: FieldSpec = FieldSpec::integer("segments").strip(&[',']);
/// A stress range.
const SN_STRESS: FieldSpec = FieldSpec::real("stress").strip(&[',']);
/// A number of cycles.
const SN_CYCLES: FieldSpec = FieldSpec::real("cycles").strip(&[',']);

impl SectionDecoder for SnCurveDecoder {
  fn consume(&mut self, line: &str, ctx: &mut RuleContext) -> LineResponse {
    self.seen += 1;
    if self.seen == 1 {
      let declared = ctx.record.get("number_of_sn_curves").as_integer().unwrap_or(0);
      self.remaining = num::ToPrimitive::to_usize(&declared).unwrap_or(0);
      return LineResponse::Useless;
    }
    let tokens = line.split_whitespace().collect::<Vec<_>>();
    if self.skip > 0 {
      self.skip -= 1;
      return LineResponse::Useless;
    }
    if self.points > 0 {
      self.points -= 1;
      let stress = ctx.coerce(&SN_STRESS, tokens.first().copied()).unwrap_or_default();
      let cycles = ctx.coerce(&SN_CYCLES, tokens.get(1).copied()).unwrap_or_default();
      if let Some((_, s, c)) = self.curves.last_mut() {
        s.push(stress);
        c.push(cycles);
      }
      return LineResponse::Data;
    }
    if self.remaining == 0 {
      return LineResponse::Done;
    }
    self.remaining -= 1;
    let id = tokens.first().and_then(|t| t.split(',').next());
    let id = ctx.coerce(&SN_ID, id).unwrap_or_default();
    let segments = ctx.coerce(&SN_SEGMENTS, tokens.get(1).copied()).unwrap_or_default();
    let Some(segments) = segments.as_integer().and_then(|n| num::ToPrimitive::to_usize(&n)) else {
      return LineResponse::Malformed;
    };
    self.skip = 1;
    self.points = segments + 1;
    self.curves.push((id, Vec::new(), Vec::new()));
    return LineResponse::Data;
  }

  fn finalise(self: Box<Self>, ctx: &mut RuleContext) {
    let curves = self.curves.into_iter().map(|(id, stress, cycles)| {
      let mut rb = RecordBuilder::new();
      rb.set(SN_ID.name, id)
        .set(SN_STRESS.name, Value::List(stress))
        .set(SN_CYCLES.name, Value::List(cycles));
      return Value::Record(rb.build());
    });
    ctx.record.set("sn_curves", Value::List(curves.collect()));
  }
}

/// Builds the decoder.
fn sn_curves() -> Box<dyn SectionDecoder> {
  return Box::new(SnCurveDecoder::default());
}

/// A first-token scalar of a block line.
macro_rules! scalar {
  ($block:literal, $line:literal, $($tok:literal => $field:expr),+ $(,)?) => {
    ExtractionRule::at(&[seg($block)], Strategy::Split {
      line: LineSelect::Index($line),
      cut: Cut::Keep,
      delimiter: Delimiter::Whitespace,
      columns: &[$((Token::Nth($tok), $field.strip(&[','])),)+]
    })
  };
}

/// Builds the schema of a version from the parts of its zones.
macro_rules! shear7_schema {
  ($zone:expr) => {
    Schema::rules(&[
      ExtractionRule::here(Strategy::Constant {
        field: crate::units::UNIT_SYSTEM_FIELD,
        value: Literal::Text("imperial")
      }),
      ExtractionRule::here(Strategy::Constant {
        field: "length_unit",
        value: Literal::Text("ft")
      }),
      scalar!("BLOCK 2", 1, 0 => FieldSpec::real("total_length")).expected(),
      scalar!("BLOCK 2", 2, 0 => FieldSpec::integer("total_segments")),
      scalar!("BLOCK 2", 3, 0 => FieldSpec::real("volume_weight_of_fluid")),
      scalar!("BLOCK 2", 4, 0 => FieldSpec::real("kinematic_viscosity_of_fluid")),
      scalar!("BLOCK 2", 5, 0 => FieldSpec::real("structural_damping_coefficient")),
      scalar!("BLOCK 2", 6, 0 => FieldSpec::real("effective_tension_at_origin")),
      scalar!("BLOCK 2", 7, 0 => FieldSpec::integer("number_of_section_property_zones")),
      ExtractionRule::at(&[seg("BLOCK 2")], Strategy::Blocks {
        count: CountSource::Field("number_of_section_property_zones"),
        start: 8,
        lines_per_item: 6,
        parts: $zone,
        name: "section_properties"
      }),
      scalar!("BLOCK 3", 0, 0 => FieldSpec::integer("number_current_points")).expected(),
      ExtractionRule::at(&[seg("BLOCK 3")], Strategy::CountedTable {
        count: CountSource::Field("number_current_points"),
        header: LineSelect::Index(0),
        skip: 0,
        delimiter: Delimiter::Char(','),
        columns: &[
          (Token::Nth(0), FieldSpec::real("depth")),
          (Token::Nth(1), FieldSpec::real("speed").first_word()),
        ],
        name: "current_profile"
      }),
      scalar!("BLOCK 4", 0, 0 => FieldSpec::integer("number_of_sn_curves")),
      ExtractionRule::at(&[seg("BLOCK 4")], Strategy::Split {
        line: LineSelect::FromEnd(2),
        cut: Cut::Keep,
        delimiter: Delimiter::Whitespace,
        columns: &[(Token::Nth(0), FieldSpec::real("global_scf").strip(&[',']))]
      }),
      ExtractionRule::at(&[seg("BLOCK 4")], Strategy::Decoder {
        name: "S-N curves",
        make: sn_curves
      }),
      scalar!(
        "BLOCK 5", 3,
        0 => FieldSpec::real("power_cutoff"),
        1 => FieldSpec::real("primary_zone_amplitude_limit"),
      ),
      scalar!("BLOCK 5", 4, 0 => FieldSpec::real("power_value_exponent")),
      scalar!("BLOCK 5", 7, 0 => FieldSpec::integer("riser_diameter")),
    ])
  };
}

/// Nothing to resolve.
fn finish(
  _rb: &mut RecordBuilder,
  _tree: &SectionTree,
  _issues: &mut Vec<ParseIssue>
) {}

pub mod v410 {
  //! SHEAR7 v4.10: six damping values per zone.
  use super::*;

  /// Blank lines count towards offsets.
  pub const FILTER: LineFilter = super::FILTER;
  /// Numbered blocks.
  pub const GRAMMAR: SectionGrammar = super::GRAMMAR;
  /// The whole schema.
  pub const SCHEMA: Schema = shear7_schema!(zone_parts!(
    damping(0, FieldSpec::real("ca")),
    damping(1, FieldSpec::real("damp_coeff0")),
    damping(2, FieldSpec::real("damp_coeff1")),
    damping(3, FieldSpec::real("damp_coeff2")),
    damping(4, FieldSpec::real("damp_coeff3")),
    damping(5, FieldSpec::real("damp_coeff4")),
  ));

  /// Nothing to resolve.
  pub(crate) fn finish(
    rb: &mut RecordBuilder,
    tree: &SectionTree,
    issues: &mut Vec<ParseIssue>
  ) {
    super::finish(rb, tree, issues);
  }
}

pub mod v46 {
  //! SHEAR7 v4.6: the added mass coefficient and three damping values.
  use super::*;

  /// Blank lines count towards offsets.
  pub const FILTER: LineFilter = super::FILTER;
  /// Numbered blocks.
  pub const GRAMMAR: SectionGrammar = super::GRAMMAR;
  /// The whole schema.
  pub const SCHEMA: Schema = shear7_schema!(zone_parts!(
    damping(0, FieldSpec::real("ca")),
    damping(1, FieldSpec::real("damp_coeff1")),
    damping(2, FieldSpec::real("damp_coeff2")),
    damping(3, FieldSpec::real("damp_coeff3")),
  ));

  /// Nothing to resolve.
  pub(crate) fn finish(
    rb: &mut RecordBuilder,
    tree: &SectionTree,
    issues: &mut Vec<ParseIssue>
  ) {
    super::finish(rb, tree, issues);
  }
}


#[cfg(test)]
mod tests {
  use crate::prelude::*;

  /// A zone's first line, with the name at its fixed column.
  fn zone_head(start: &str, end: &str, name: &str) -> String {
    return format!("{:<50}{}", format!("  {}, {}", start, end), name);
  }

  fn sample(damping: &str) -> String {
    let mut lines = vec![
      "SHEAR7 data file".to_string(),
      "*** BLOCK 1. UNITS ***".to_string(),
      "1          unit system".to_string(),
      "*** BLOCK 2. STRUCTURAL DATA ***".to_string(),
      "1          structure type".to_string(),
      "1000.0     total length".to_string(),
      "100        number of segments".to_string(),
      "64.0       volume weight of fluid".to_string(),
      "1.4e-5     kinematic viscosity".to_string(),
      "0.003      structural damping".to_string(),
      "500.0      effective tension at origin".to_string(),
      "2          number of zones".to_string(),
    ];
    for (start, end, name) in [("0.0", "0.5", "Riser Joint"), ("0.5", "1.0", "*** Slick ***")] {
      lines.push(zone_head(start, end, name));
      lines.push("  21.0        hydro diameter".to_string());
      lines.push("  500.0, 0.2, 0.1   inertia and masses".to_string());
      lines.push("  1 1      sn curve".to_string());
      lines.push("  0.4, 0.18, 1.0, 1   bandwidth and strouhal".to_string());
      lines.push(damping.to_string());
    }
    lines.extend([
      "*** BLOCK 3. CURRENT DATA ***",
      "3, number of current points",
      "0.0, 2.0  surface",
      "0.5, 1.0",
      "1.0, 0.5",
      "*** BLOCK 4. S-N CURVE DATA ***",
      "1   number of S-N curves",
      "1, 1   curve id and segments",
      "0.0  cutoff",
      "1.0e3, 1.0e9",
      "2.0e3, 1.0e7",
      "1.0, global SCF",
      "",
      "*** BLOCK 5. CALCULATION DATA ***",
      "0",
      "0",
      "0",
      "0.1, 0.3   power cutoff and limit",
      "1.0        power exponent",
      "0",
      "0",
      "21         riser diameter",
    ].map(String::from));
    return lines.join("\n");
  }

  #[test]
  fn blocks_and_zones() {
    let text = sample("1.0,0.1,0.2,0.3,0.4,0.5  added mass and damping");
    let f = RiserFile::parse_str(&text, FileFormat::Shear7Input);
    let rec = f.record();
    assert_eq!(rec.text("unit_system"), Some("imperial"));
    assert_eq!(rec.real("total_length"), Some(1000.0));
    assert_eq!(rec.integer("total_segments"), Some(100));
    assert_eq!(rec.integer("number_of_section_property_zones"), Some(2));
    assert_eq!(rec.text("section_properties[1]/name"), Some("Riser Joint"));
    assert_eq!(rec.text("section_properties[2]/name"), Some("*** Slick ***"));
    assert_eq!(rec.real("section_properties[2]/start"), Some(0.5));
    assert_eq!(rec.real("section_properties[1]/wet_mass"), Some(0.1));
    assert_eq!(rec.integer("section_properties[1]/zone_cl_type"), Some(1));
    assert_eq!(rec.real("section_properties[1]/damp_coeff4"), Some(0.5));
    assert_eq!(rec.integer("number_current_points"), Some(3));
    assert_eq!(rec.real("current_profile[3]/speed"), Some(0.5));
    assert_eq!(rec.integer("number_of_sn_curves"), Some(1));
    assert_eq!(rec.get("sn_curves[1]/stress").reals(), [1.0e3, 2.0e3]);
    assert_eq!(rec.get("sn_curves[1]/cycles").reals(), [1.0e9, 1.0e7]);
    assert_eq!(rec.real("global_scf"), Some(1.0));
    assert_eq!(rec.real("primary_zone_amplitude_limit"), Some(0.3));
    assert_eq!(rec.integer("riser_diameter"), Some(21));
    assert!(f.issues().is_empty(), "{:?}", f.issues());
  }

  #[test]
  fn legacy_damping_line() {
    let text = sample("1.0,0.1,0.2,0.3  added mass and damping");
    let f = RiserFile::parse_str(&text, FileFormat::Shear7InputLegacy);
    let rec = f.record();
    assert_eq!(rec.real("section_properties[2]/ca"), Some(1.0));
    assert_eq!(rec.real("section_properties[2]/damp_coeff3"), Some(0.3));
    assert!(!rec.has("section_properties[2]/damp_coeff4"));
    assert!(f.issues().is_empty(), "{:?}", f.issues());
  }

  #[test]
  fn absurd_zone_count_stops_at_the_data() {
    let text = sample("1.0,0.1,0.2,0.3,0.4,0.5  added mass and damping")
      .replace("2          number of zones", "100000000000000000, number of zones");
    let f = RiserFile::parse_str(&text, FileFormat::Shear7Input);
    let zones = f.record().list("section_properties").unwrap();
    assert!((2..=6).contains(&zones.len()), "{}", zones.len());
    assert_eq!(f.record().text("section_properties[1]/name"), Some("Riser Joint"));
    let flagged = f.issues().iter().any(|i| matches!(
      i,
      ParseIssue::MalformedField { reason: MalformedReason::BadCount, .. }
    ));
    assert!(flagged, "{:?}", f.issues());
  }
}
