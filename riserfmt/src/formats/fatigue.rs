//! Fatigue post-processor listings. Everything after the `Results in Plot
//! Format` banner is scanned for nine-column rows.

use crate::grammar::*;
use crate::issues::ParseIssue;
use crate::normalize::LineFilter;
use crate::record::RecordBuilder;
use crate::rules::*;
use crate::tree::*;

/// Rows are told apart by their token count only.
pub const FILTER: LineFilter = LineFilter {
  comment_prefixes: &[],
  trim: true,
  skip_blank: true
};

/// One banner.
pub const GRAMMAR: SectionGrammar = SectionGrammar {
  levels: &[LevelSpec::simple(&[MarkerRule {
    matcher: MarkerMatch::Contains("Results in Plot Format"),
    name: MarkerName::Fixed("plot format")
  }])],
  counts: &[],
  sentinels: &[]
};

/// The whole schema.
pub const SCHEMA: Schema = Schema::rules(&[
  ExtractionRule::at(&[seg("plot format")], Strategy::Rows {
    filter: RowFilter::counts(&[9]).numeric(),
    delimiter: Delimiter::Whitespace,
    columns: &[
      (Token::Nth(0), FieldSpec::integer("element")),
      (Token::Nth(1), FieldSpec::integer("node")),
      (Token::Nth(2), FieldSpec::real("arc_length")),
      (Token::Nth(3), FieldSpec::real("fatigue_life")),
      (Token::Nth(4), FieldSpec::integer("critical_point")),
      (Token::Nth(5), FieldSpec::real("damage")),
      (Token::Nth(6), FieldSpec::integer("sn_curve")),
      (Token::Nth(7), FieldSpec::real("scf")),
      (Token::Nth(8), FieldSpec::integer("load_cases")),
    ],
    carry: &[],
    shape: RowShape::LIST,
    name: "fatigue_lives"
  }).expected(),
]);

/// Nothing to resolve.
pub(crate) fn finish(
  _rb: &mut RecordBuilder,
  _tree: &SectionTree,
  _issues: &mut Vec<ParseIssue>
) {}

#[cfg(test)]
mod tests {
  use crate::prelude::*;

  #[test]
  fn nine_column_rows_only() {
    let text = "\
1 2 3.0 4.0 5 6.0 7 8.0 9
Results in Plot Format
Elem Node Arc Life Pt Damage Curve SCF Cases
  10  11  0.0  1.5e4  3  6.7e-5  2  1.2  40
  10  12  5.0  2.0e4  1  5.0e-5  2  1.2
  11  12  5.0  2.5e4  1  4.0e-5  2  1.2  40
";
    let f = RiserFile::parse_str(text, FileFormat::FatigueOutput);
    let lives = f.record().list("fatigue_lives").unwrap();
    assert_eq!(lives.len(), 2);
    assert_eq!(f.record().real("fatigue_lives[1]/fatigue_life"), Some(1.5e4));
    assert_eq!(f.record().integer("fatigue_lives[2]/element"), Some(11));
    assert!(f.issues().is_empty(), "{:?}", f.issues());
  }
}
