//! SHEAR7 output listings. Only the initial power calculation table is read:
//! it starts six lines after the `F = force; L = length; T = time.` legend
//! and runs until a blank line, after which a line ends with the number of
//! modes that could be excited.

use crate::extractor::*;
use crate::grammar::*;
use crate::issues::*;
use crate::normalize::LineFilter;
use crate::record::*;
use crate::rules::*;
use crate::tree::*;

/// Blank lines end the table, so they stay.
pub const FILTER: LineFilter = LineFilter::RAW;

/// The flag set when the results banner shows up.
const RESULTS_FOUND: &str = "results_found";

/// Two phrase markers.
pub const GRAMMAR: SectionGrammar = SectionGrammar {
  levels: &[LevelSpec::simple(&[
    MarkerRule {
      matcher: MarkerMatch::Contains("THE RESULTS OF PROGRAM ANALYSIS"),
      name: MarkerName::Fixed("results")
    },
    MarkerRule {
      matcher: MarkerMatch::Contains("F = force; L = length; T = time."),
      name: MarkerName::Fixed("power")
    },
  ])],
  counts: &[],
  sentinels: &[SentinelRule {
    pattern: "THE RESULTS OF PROGRAM ANALYSIS",
    ignore_case: false,
    flag: RESULTS_FOUND,
    value: true
  }]
};

/// Index of the first table row within the power section.
const FIRST_ROW: usize = 5;

/// The number of possibly excited modes.
const EXCITED: FieldSpec = FieldSpec::integer("no_possible_excited_modes");

/// Finds the line after the blank that ends the table and reads its last
/// token.
#[derive(Default)]
struct ExcitedModesDecoder {
  /// Lines seen so far.
  seen: usize,
  /// The table has ended.
  past_table: bool
}

impl SectionDecoder for ExcitedModesDecoder {
  fn consume(&mut self, line: &str, ctx: &mut RuleContext) -> LineResponse {
    self.seen += 1;
    if self.seen <= FIRST_ROW {
      return LineResponse::Useless;
    }
    if !self.past_table {
      self.past_table = line.trim().is_empty();
      return LineResponse::Useless;
    }
    let v = ctx.coerce(&EXCITED, line.split_whitespace().last());
    ctx.record.set(EXCITED.name, v.unwrap_or_default());
    return LineResponse::Done;
  }

  fn finalise(self: Box<Self>, ctx: &mut RuleContext) {
    ctx.record.set_null(EXCITED.name);
  }
}

/// Builds the decoder.
fn excited_modes() -> Box<dyn SectionDecoder> {
  return Box::new(ExcitedModesDecoder::default());
}

/// The whole schema.
pub const SCHEMA: Schema = Schema::rules(&[
  ExtractionRule::at(&[seg("power")], Strategy::Rows {
    filter: RowFilter {
      token_counts: &[],
      skip_containing: &[],
      numeric_first: false,
      start: FIRST_ROW,
      stop_at_blank: true
    },
    delimiter: Delimiter::Whitespace,
    columns: &[
      (Token::Nth(0), FieldSpec::integer("mode")),
      (Token::Nth(1), FieldSpec::real("freq_hz")),
      (Token::Nth(4), FieldSpec::real("modal_power")),
      (Token::Nth(6), FieldSpec::real("power_ratio_raised_exponent")),
    ],
    carry: &[],
    shape: RowShape::LIST,
    name: "initial_power_calcs"
  }).expected(),
  ExtractionRule::at(&[seg("power")], Strategy::Decoder {
    name: "excited modes",
    make: excited_modes
  }),
]);

/// Turns the results banner into a flag, reporting files that lack it.
pub(crate) fn finish(
  rb: &mut RecordBuilder,
  tree: &SectionTree,
  issues: &mut Vec<ParseIssue>
) {
  let found = tree.sentinel(RESULTS_FOUND).unwrap_or(false);
  if !found {
    ParseIssue::Unresolved {
      field: RESULTS_FOUND.to_string(),
      reason: "no results banner in the file".to_string()
    }.report(issues);
  }
  rb.set(RESULTS_FOUND, found);
}

#[cfg(test)]
mod tests {
  use crate::prelude::*;

  const SAMPLE: &str = "\
SHEAR7 listing
THE RESULTS OF PROGRAM ANALYSIS
some preamble
INITIAL POWER CALCULATION  F = force; L = length; T = time.
header 1
header 2
header 3
header 4
mode   freq  a  b  power  c  ratio
  1   0.05  0  0  12.5  0  1.00
  2   0.10  0  0   6.0  0  0.48

Number of possibly excited modes:   2
";

  #[test]
  fn power_table_and_excited_modes() {
    let f = RiserFile::parse_str(SAMPLE, FileFormat::Shear7Output);
    let rec = f.record();
    assert_eq!(rec.flag("results_found"), Some(true));
    assert_eq!(rec.list("initial_power_calcs").map(|l| l.len()), Some(2));
    assert_eq!(rec.integer("initial_power_calcs[2]/mode"), Some(2));
    assert_eq!(rec.real("initial_power_calcs[1]/modal_power"), Some(12.5));
    assert_eq!(rec.real("initial_power_calcs[2]/power_ratio_raised_exponent"), Some(0.48));
    assert_eq!(rec.integer("no_possible_excited_modes"), Some(2));
    assert!(f.issues().is_empty(), "{:?}", f.issues());
  }

  #[test]
  fn missing_results_are_reported() {
    let f = RiserFile::parse_str("nothing to see\n", FileFormat::Shear7Output);
    assert_eq!(f.record().flag("results_found"), Some(false));
    assert!(f.record().get("no_possible_excited_modes").is_null());
    assert!(f.issues().iter().any(|i| i.field() == Some("results_found")));
  }
}
