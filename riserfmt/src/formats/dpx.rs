//! Component configuration files. Every `<component "name" "id" "type">` line
//! opens a component; inside it, `<menu "name">` lines open menus whose
//! `<value "param" "row">v</value>` lines form a table, and `<option "param"
//! ... "value">` lines set scalar options.
//!
//! Menu names are free text and often hold `/` (e.g. `Jonswap - Equal Area -
//! Hs/Tp|||`), so they can't be walked into with record paths: read them with
//! `Record::field` on the `menus` record instead.

use indexmap::IndexMap;

use crate::extractor::*;
use crate::grammar::*;
use crate::issues::*;
use crate::normalize::LineFilter;
use crate::record::*;
use crate::rules::*;
use crate::tree::*;
use crate::util::parse_integer;

/// Columns matter; only blank lines go.
pub const FILTER: LineFilter = LineFilter {
  comment_prefixes: &[],
  trim: false,
  skip_blank: true
};

/// Components, then menus.
pub const GRAMMAR: SectionGrammar = SectionGrammar {
  levels: &[
    LevelSpec {
      markers: &[MarkerRule {
        matcher: MarkerMatch::Prefix("<component "),
        name: MarkerName::Quoted(1)
      }],
      repeatable: &[],
      keep_header: true,
      untitled: None
    },
    LevelSpec {
      markers: &[MarkerRule {
        matcher: MarkerMatch::Prefix("<menu "),
        name: MarkerName::Quoted(1)
      }],
      repeatable: &[],
      keep_header: true,
      untitled: None
    },
  ],
  counts: &[],
  sentinels: &[]
};

/// Option and menu values are numbers when they parse as such.
const VALUE: FieldSpec = FieldSpec::real("value").or_raw();
/// The row number of a menu value.
const ROW: FieldSpec = FieldSpec::integer("row");

/// Reads the options and menu tables of one component. It is fed the whole
/// subtree of the component, menu marker lines included, in file order.
#[derive(Default)]
struct ComponentDecoder {
  /// The scalar options.
  options: IndexMap<String, Value>,
  /// The menu tables, rows in file order.
  menus: IndexMap<String, Vec<RecordBuilder>>,
  /// The menu being read.
  menu: Option<String>,
  /// The row number of the last value read.
  row: Option<i64>
}

impl ComponentDecoder {
  /// Reads a `<value "param" "row">v</value>` line.
  fn value(&mut self, pieces: &[&str], ctx: &mut RuleContext) -> LineResponse {
    let Some(menu) = self.menu.as_ref().and_then(|m| self.menus.get_mut(m)) else {
      return LineResponse::Useless;
    };
    let raw_row = pieces.get(3).copied().unwrap_or_default();
    let Some(row) = parse_integer(raw_row) else {
      ctx.malformed(ROW.name, raw_row, MalformedReason::NotInteger);
      return LineResponse::Malformed;
    };
    let tail = pieces.last().copied().unwrap_or_default();
    let raw = tail.split('<').next().unwrap_or_default().replace('>', "");
    let value = ctx.coerce(&VALUE, Some(&raw)).unwrap_or_default();
    if self.row != Some(row) || menu.is_empty() {
      menu.push(RecordBuilder::new());
      self.row = Some(row);
    }
    if let Some(current) = menu.last_mut() {
      current.set(pieces.get(1).copied().unwrap_or_default(), value);
    }
    return LineResponse::Data;
  }
}

impl SectionDecoder for ComponentDecoder {
  fn consume(&mut self, line: &str, ctx: &mut RuleContext) -> LineResponse {
    let pieces = line.split('"').collect::<Vec<_>>();
    if line.starts_with("<menu ") {
      let name = pieces.get(1).copied().unwrap_or_default().to_string();
      // a menu seen twice starts over
      self.menus.insert(name.clone(), Vec::new());
      self.menu = Some(name);
      self.row = None;
      return LineResponse::Carry;
    }
    if line.starts_with("<option ") {
      let param = pieces.get(1).copied().unwrap_or_default();
      let raw = pieces.len().checked_sub(2).and_then(|i| pieces.get(i)).copied();
      let value = ctx.coerce(&VALUE, raw).unwrap_or_default();
      self.options.insert(param.to_string(), value);
      return LineResponse::Data;
    }
    if line.starts_with("<value ") {
      return self.value(&pieces, ctx);
    }
    return LineResponse::Useless;
  }

  fn finalise(self: Box<Self>, ctx: &mut RuleContext) {
    let mut options = RecordBuilder::new();
    for (k, v) in self.options {
      options.set(k, v);
    }
    let mut menus = RecordBuilder::new();
    for (k, rows) in self.menus {
      let rows = rows.into_iter().map(|r| Value::Record(r.build())).collect();
      menus.set(k, Value::List(rows));
    }
    ctx.record.set("options", options.build());
    ctx.record.set("menus", menus.build());
  }
}

/// Builds the decoder.
fn component() -> Box<dyn SectionDecoder> {
  return Box::new(ComponentDecoder::default());
}

/// The rules of one component.
const COMPONENT: Schema = Schema::rules(&[
  ExtractionRule::here(Strategy::SectionName { field: "name" }),
  ExtractionRule::here(Strategy::Split {
    line: LineSelect::Header,
    cut: Cut::Keep,
    delimiter: Delimiter::Char('"'),
    columns: &[
      (Token::Nth(3), FieldSpec::text("id")),
      (Token::FromEnd(2), FieldSpec::text("type")),
    ]
  }),
  ExtractionRule::here(Strategy::Decoder {
    name: "component",
    make: component
  }).deep(),
]);

/// The whole schema.
pub const SCHEMA: Schema = Schema {
  rules: &[],
  groups: &[GroupSchema {
    name: "components",
    matcher: NameMatch::Any,
    schema: COMPONENT
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

  const SAMPLE: &str = r#"<dpx version="2">
<component "Joint 75ft" "J1" "Drilling Riser Joint">
<option "Load Sharing with Choke/Kill Line|||" "0" "Yes">
<option "Load Sharing Gap|||" "0" "0.25">
<menu "Drilling Riser Joint - Properties|||">
<value "Weight in Air - W(air)" "1">31.5</value>
<value "Weight in Water - W(water)" "1">27.4</value>
</menu>
<menu "Current - Piecewise Linear|||">
<value "Distance Below Mean Waterline" "1">0.0</value>
<value "Velocity" "1">1.2</value>
<value "Distance Below Mean Waterline" "2">100.0</value>
<value "Velocity" "2">n/a</value>
</menu>
</component>
<component "BOP Stack" "B7" "BOP">
<menu "Properties - Define |||">
<value "Weight in Air" "x">400</value>
</menu>
</component>
"#;

  #[test]
  fn components_options_and_menus() {
    let f = RiserFile::parse_str(SAMPLE, FileFormat::Dpx);
    let rec = f.record();
    assert_eq!(rec.group_len("components"), 2);
    let (_, joint) = rec.group("components").next().unwrap();
    assert_eq!(joint.text("name"), Some("Joint 75ft"));
    assert_eq!(joint.text("id"), Some("J1"));
    assert_eq!(joint.text("type"), Some("Drilling Riser Joint"));
    let options = joint.record("options").unwrap();
    assert_eq!(options.field("Load Sharing with Choke/Kill Line|||").as_text(), Some("Yes"));
    assert_eq!(options.field("Load Sharing Gap|||").as_real(), Some(0.25));
    let menus = joint.record("menus").unwrap();
    let props = menus.field("Drilling Riser Joint - Properties|||").as_list().unwrap();
    assert_eq!(props.len(), 1);
    let row = props[0].as_record().unwrap();
    assert_eq!(row.field("Weight in Water - W(water)").as_real(), Some(27.4));
    let current = menus.field("Current - Piecewise Linear|||").as_list().unwrap();
    assert_eq!(current.len(), 2);
    let second = current[1].as_record().unwrap();
    assert_eq!(second.field("Distance Below Mean Waterline").as_real(), Some(100.0));
    assert_eq!(second.field("Velocity").as_text(), Some("n/a"));
  }

  #[test]
  fn bad_row_numbers_are_reported() {
    let f = RiserFile::parse_str(SAMPLE, FileFormat::Dpx);
    let bop = f.record().record("components[2]").unwrap();
    assert_eq!(bop.text("type"), Some("BOP"));
    let menus = bop.record("menus").unwrap();
    assert_eq!(menus.field("Properties - Define |||").as_list().map(|l| l.len()), Some(0));
    assert!(matches!(
      f.issues(),
      [ParseIssue::MalformedField { reason: MalformedReason::NotInteger, .. }]
    ));
  }
}
