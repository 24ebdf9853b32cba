//! Tabulated plot exports. Every `Table No.` line opens a table whose axis
//! labels follow it; every `Plot Data:` line opens a series of tab-separated
//! X/Y pairs within the table.

use crate::extractor::*;
use crate::grammar::*;
use crate::issues::ParseIssue;
use crate::normalize::LineFilter;
use crate::record::*;
use crate::rules::*;
use crate::tree::*;

/// Leading whitespace is data here.
pub const FILTER: LineFilter = LineFilter {
  comment_prefixes: &[],
  trim: false,
  skip_blank: true
};

/// Tables, then series.
pub const GRAMMAR: SectionGrammar = SectionGrammar {
  levels: &[
    LevelSpec {
      markers: &[MarkerRule {
        matcher: MarkerMatch::Contains("Table No."),
        name: MarkerName::Verbatim
      }],
      repeatable: &[],
      keep_header: true,
      untitled: None
    },
    LevelSpec {
      markers: &[MarkerRule {
        matcher: MarkerMatch::Prefix("Plot Data:"),
        name: MarkerName::AfterChar(':')
      }],
      repeatable: &[],
      keep_header: false,
      untitled: Some("Series")
    },
  ],
  counts: &[],
  sentinels: &[]
};

/// Reads the `X-Axis:`, `Y-Axis:`, `X-Units:` and `Y-Units:` lines of a
/// table. Labels get the units appended when there are any.
#[derive(Default)]
struct AxisLabelDecoder {
  /// Axis names and units, X then Y.
  axes: [String; 2],
  /// Units, X then Y.
  units: [String; 2]
}

impl SectionDecoder for AxisLabelDecoder {
  fn consume(&mut self, line: &str, _ctx: &mut RuleContext) -> LineResponse {
    let value = || line.split(':').nth(1).unwrap_or_default().trim().to_string();
    let slot = match line.get(..8).unwrap_or(line) {
      l if l.starts_with("X-Axis:") => &mut self.axes[0],
      l if l.starts_with("Y-Axis:") => &mut self.axes[1],
      "X-Units:" => &mut self.units[0],
      "Y-Units:" => &mut self.units[1],
      _ => return LineResponse::Useless
    };
    *slot = value();
    return LineResponse::Data;
  }

  fn finalise(self: Box<Self>, ctx: &mut RuleContext) {
    for (i, axis) in ["x", "y"].into_iter().enumerate() {
      let label = match self.units[i].as_str() {
        "" => self.axes[i].clone(),
        units => format!("{} ({})", self.axes[i], units)
      };
      ctx.record.set(format!("{}_axis", axis), self.axes[i].as_str());
      ctx.record.set(format!("{}_units", axis), self.units[i].as_str());
      ctx.record.set(format!("{}_label", axis), label);
    }
  }
}

/// Builds the decoder.
fn axis_labels() -> Box<dyn SectionDecoder> {
  return Box::new(AxisLabelDecoder::default());
}

/// The rules of one series.
const SERIES: Schema = Schema::rules(&[
  ExtractionRule::here(Strategy::SectionName { field: "name" }),
  ExtractionRule::here(Strategy::Rows {
    filter: RowFilter::ANY.numeric(),
    delimiter: Delimiter::Char('\t'),
    columns: &[
      (Token::Nth(0), FieldSpec::real("X")),
      (Token::Nth(1), FieldSpec::real("Y")),
    ],
    carry: &[],
    shape: RowShape::SPREAD,
    name: "data"
  }),
]);

/// The rules of one table.
const TABLE: Schema = Schema {
  rules: &[
    ExtractionRule::here(Strategy::SectionName { field: "title" }),
    ExtractionRule::here(Strategy::Split {
      line: LineSelect::Header,
      cut: Cut::AfterFirst('.'),
      delimiter: Delimiter::Whitespace,
      columns: &[(Token::Nth(0), FieldSpec::integer("table_no"))]
    }),
    ExtractionRule::here(Strategy::Split {
      line: LineSelect::Header,
      cut: Cut::Keep,
      delimiter: Delimiter::Text(" - "),
      columns: &[(Token::Nth(1), FieldSpec::text("table_name").optional())]
    }),
    ExtractionRule::here(Strategy::Decoder {
      name: "axis labels",
      make: axis_labels
    }),
  ],
  groups: &[GroupSchema {
    name: "series",
    matcher: NameMatch::Any,
    schema: SERIES
  }]
};

/// The whole schema.
pub const SCHEMA: Schema = Schema {
  rules: &[],
  groups: &[GroupSchema {
    name: "tables",
    matcher: NameMatch::Any,
    schema: TABLE
  }]
};

/// Nothing to resolve.
pub(crate) fn finish(
  _rb: &mut RecordBuilder,
  _tree: &SectionTree,
  _issues: &mut Vec<ParseIssue>
) {}

#[cfg(test)]
mod tests {
  use crate::prelude::*;

  const SAMPLE: &str = "\
Deepriser plot export
Table No. 3 - Envelope of Von Mises Stress
X-Axis: Von Mises Stress
Y-Axis: Elevation
X-Units: ksi
Y-Units:
Plot Data:
1.0\t-10.0
2.0\t-5.0
Plot Data:
3.0\t0.0
Plot Data: Max-Von Mises Stress Envelope
4.0\t5.0
Table No.4 - Tension
Plot Data: Max
9.5\t1.0
";

  #[test]
  fn tables_and_series() {
    let f = RiserFile::parse_str(SAMPLE, FileFormat::Tab);
    let rec = f.record();
    assert_eq!(rec.group_len("tables"), 2);
    assert_eq!(rec.integer("tables[1]/table_no"), Some(3));
    assert_eq!(rec.text("tables[1]/table_name"), Some("Envelope of Von Mises Stress"));
    assert_eq!(rec.text("tables[1]/x_label"), Some("Von Mises Stress (ksi)"));
    assert_eq!(rec.text("tables[1]/y_label"), Some("Elevation"));
    assert_eq!(rec.text("tables[1]/y_units"), Some(""));
    assert_eq!(rec.text("tables[1]/series[1]/name"), Some("Series 1"));
    assert_eq!(rec.text("tables[1]/series[2]/name"), Some("Series 2"));
    assert_eq!(rec.text("tables[1]/series[3]/name"), Some("Max-Von Mises Stress Envelope"));
    assert_eq!(rec.get("tables[1]/series[1]/X").reals(), [1.0, 2.0]);
    assert_eq!(rec.get("tables[1]/series[1]/Y").reals(), [-10.0, -5.0]);
    assert_eq!(rec.integer("tables[2]/table_no"), Some(4));
    assert_eq!(rec.get("tables[2]/series[1]/X").reals(), [9.5]);
    assert!(f.issues().is_empty());
  }
}
