//! This module defines the extraction rule language: typed field specs, the
//! ways of picking lines and tokens, the extraction strategies, and the format
//! schema that binds rules to sections and groups.
//!
//! Everything here is `const`-constructible so that formats can declare their
//! schemas as static data.

use serde::Serialize;

use crate::extractor::SectionDecoder;
use crate::record::Value;
use crate::tree::Seg;

/// The type a field is coerced to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum FieldType {
  /// A real number.
  Real,
  /// An integer.
  Integer,
  /// Free text.
  Text,
  /// A yes/no flag.
  Flag
}

/// What happens when a token can't be coerced to its field type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum Fallback {
  /// Store null and report the token.
  Null,
  /// Store the raw token as text.
  Raw,
  /// Report the token and stop this rule.
  Fail
}

/// A constant usable as a default value.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub enum Literal {
  /// Null.
  Null,
  /// A real.
  Real(f64),
  /// An integer.
  Integer(i64),
  /// Text.
  Text(&'static str),
  /// A flag.
  Flag(bool)
}

impl Literal {
  /// Turns it into a value.
  pub fn to_value(self) -> Value {
    return match self {
      Self::Null => Value::Null,
      Self::Real(x) => Value::Real(x),
      Self::Integer(i) => Value::Integer(i),
      Self::Text(s) => Value::Text(s.to_string()),
      Self::Flag(b) => Value::Bool(b),
    };
  }
}

/// Which whitespace-separated word of a token to keep.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum Word {
  /// All of it.
  Whole,
  /// The first word.
  First,
  /// The last word.
  Last
}

/// A typed, named field and the clean-up its token goes through.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct FieldSpec {
  /// The field name in the record.
  pub name: &'static str,
  /// The target type.
  pub ty: FieldType,
  /// The coercion failure policy.
  pub fallback: Fallback,
  /// The value used when the token is empty or the section is absent.
  pub default: Literal,
  /// A missing column is not worth reporting.
  pub optional: bool,
  /// Characters removed from the token before anything else.
  pub strip: &'static [char],
  /// Which word of the token to keep.
  pub word: Word,
  /// Remove surrounding quotes.
  pub unquote: bool,
  /// Round reals to this many decimal places.
  pub round: Option<u32>
}

impl FieldSpec {
  /// A field of a given type with no clean-up.
  pub const fn new(name: &'static str, ty: FieldType) -> Self {
    return Self {
      name,
      ty,
      fallback: Fallback::Null,
      default: Literal::Null,
      optional: false,
      strip: &[],
      word: Word::Whole,
      unquote: false,
      round: None
    };
  }

  /// A real field.
  pub const fn real(name: &'static str) -> Self {
    return Self::new(name, FieldType::Real);
  }

  /// An integer field.
  pub const fn integer(name: &'static str) -> Self {
    return Self::new(name, FieldType::Integer);
  }

  /// A text field.
  pub const fn text(name: &'static str) -> Self {
    return Self::new(name, FieldType::Text);
  }

  /// A flag field.
  pub const fn flag(name: &'static str) -> Self {
    return Self::new(name, FieldType::Flag);
  }

  /// Keeps the raw token when coercion fails.
  pub const fn or_raw(mut self) -> Self {
    self.fallback = Fallback::Raw;
    return self;
  }

  /// Fails the rule when coercion fails.
  pub const fn or_fail(mut self) -> Self {
    self.fallback = Fallback::Fail;
    return self;
  }

  /// Sets a default.
  pub const fn or(mut self, default: Literal) -> Self {
    self.default = default;
    return self;
  }

  /// Makes a missing column silent.
  pub const fn optional(mut self) -> Self {
    self.optional = true;
    return self;
  }

  /// Strips characters from the token.
  pub const fn strip(mut self, chars: &'static [char]) -> Self {
    self.strip = chars;
    return self;
  }

  /// Keeps only the first word of the token.
  pub const fn first_word(mut self) -> Self {
    self.word = Word::First;
    return self;
  }

  /// Keeps only the last word of the token.
  pub const fn last_word(mut self) -> Self {
    self.word = Word::Last;
    return self;
  }

  /// Removes surrounding quotes.
  pub const fn unquoted(mut self) -> Self {
    self.unquote = true;
    return self;
  }

  /// Rounds reals.
  pub const fn rounded(mut self, places: u32) -> Self {
    self.round = Some(places);
    return self;
  }
}

/// Picks a token out of a split line.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum Token {
  /// The n-th token, 0-based.
  Nth(usize),
  /// The n-th token from the end, 1 being the last.
  FromEnd(usize)
}

impl Token {
  /// Picks from a token list.
  pub fn pick<'a>(&self, tokens: &[&'a str]) -> Option<&'a str> {
    return match self {
      Self::Nth(n) => tokens.get(*n).copied(),
      Self::FromEnd(n) => tokens.len().checked_sub(*n)
        .and_then(|i| tokens.get(i))
        .copied(),
    };
  }
}

/// How a line splits into tokens.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum Delimiter {
  /// Runs of whitespace; empty tokens never appear.
  Whitespace,
  /// A single character; empty tokens are kept.
  Char(char),
  /// A literal string; empty tokens are kept.
  Text(&'static str)
}

impl Delimiter {
  /// Splits a line.
  pub fn split<'a>(&self, line: &'a str) -> Vec<&'a str> {
    return match self {
      Self::Whitespace => line.split_whitespace().collect(),
      Self::Char(c) => line.split(*c).collect(),
      Self::Text(t) => line.split(*t).collect(),
    };
  }
}

/// Cuts a line down before splitting it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum Cut {
  /// Keep the whole line.
  Keep,
  /// Keep what follows the first occurrence of a char.
  AfterFirst(char),
  /// Keep what follows the last occurrence of a char.
  AfterLast(char)
}

impl Cut {
  /// Applies the cut.
  pub fn apply<'a>(&self, line: &'a str) -> &'a str {
    return match self {
      Self::Keep => line,
      Self::AfterFirst(c) => line.split_once(*c).map(|(_, r)| r).unwrap_or(line),
      Self::AfterLast(c) => line.rsplit_once(*c).map(|(_, r)| r).unwrap_or(line),
    };
  }
}

/// Picks one line of a section.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum LineSelect {
  /// The n-th data line, 0-based.
  Index(usize),
  /// The n-th line from the end, 1 being the last.
  FromEnd(usize),
  /// The first line containing some text.
  FirstContaining(&'static str),
  /// The last line containing some text.
  LastContaining(&'static str),
  /// The last line not containing some text.
  LastWithout(&'static str),
  /// The line right after the first line containing some text.
  After(&'static str),
  /// The marker line of the section itself.
  Header
}

/// Which match wins when several lines qualify.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum Pick {
  /// The first one.
  First,
  /// The last one.
  Last
}

/// A `KEY=value` pair that updates carry-forward state instead of being a row.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct CarryKey {
  /// The key, without the separator.
  pub key: &'static str,
  /// The name the value is carried under and stamped onto rows.
  pub name: &'static str,
  /// The value stops at this char, if set.
  pub until: Option<char>,
  /// Match the key case-insensitively.
  pub ignore_case: bool,
  /// The value type.
  pub ty: FieldType
}

/// Decides which lines of a section are rows.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RowFilter {
  /// Allowed token counts; empty means any.
  pub token_counts: &'static [usize],
  /// Lines containing any of these are skipped.
  pub skip_containing: &'static [&'static str],
  /// Only lines whose first token is a number are rows.
  pub numeric_first: bool,
  /// Lines before this index are skipped.
  pub start: usize,
  /// The first blank line at or after `start` ends the rows.
  pub stop_at_blank: bool
}

impl RowFilter {
  /// Every line is a row.
  pub const ANY: Self = Self {
    token_counts: &[],
    skip_containing: &[],
    numeric_first: false,
    start: 0,
    stop_at_blank: false
  };

  /// Rows with one of the given token counts.
  pub const fn counts(token_counts: &'static [usize]) -> Self {
    let mut f = Self::ANY;
    f.token_counts = token_counts;
    return f;
  }

  /// Adds exclusions.
  pub const fn skipping(mut self, skip: &'static [&'static str]) -> Self {
    self.skip_containing = skip;
    return self;
  }

  /// Requires a numeric first token.
  pub const fn numeric(mut self) -> Self {
    self.numeric_first = true;
    return self;
  }
}

/// How rows are laid out in the record.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum Layout {
  /// A list of row records.
  Records,
  /// One list per column.
  Columns,
  /// One list per column, each written as its own field of the scope.
  Spread
}

/// The output shape of a row rule.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RowShape {
  /// Row layout.
  pub layout: Layout,
  /// Group rows by a carried value into a record keyed by it.
  pub group_by: Option<&'static str>
}

impl RowShape {
  /// A plain list of row records.
  pub const LIST: Self = Self { layout: Layout::Records, group_by: None };
  /// One list per column.
  pub const COLUMNS: Self = Self { layout: Layout::Columns, group_by: None };
  /// One scope field per column.
  pub const SPREAD: Self = Self { layout: Layout::Spread, group_by: None };
}

/// Where a row count comes from.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum CountSource {
  /// A whitespace token of a line (`3,` counts as 3).
  Token(LineSelect, usize),
  /// An integer field extracted earlier in the same scope.
  Field(&'static str)
}

/// One piece of a multi-line block item.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub enum BlockPart {
  /// A byte-column slice of line `line` of the item.
  Column {
    /// Line offset within the item.
    line: usize,
    /// First byte.
    start: usize,
    /// One past the last byte; `None` runs to the end.
    end: Option<usize>,
    /// The field.
    field: FieldSpec
  },
  /// A token of line `line` of the item.
  Token {
    /// Line offset within the item.
    line: usize,
    /// How to split.
    delimiter: Delimiter,
    /// Which token.
    token: Token,
    /// The field.
    field: FieldSpec
  }
}

/// A condition on fields extracted earlier in the same scope.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum Condition {
  /// The field holds this text.
  Equals(&'static str, &'static str),
  /// The field is set and not null.
  Present(&'static str)
}

/// How a rule turns lines into fields.
#[derive(Copy, Clone, Debug)]
pub enum Strategy {
  /// A fixed byte-column slice of one line.
  Column {
    /// The line.
    line: LineSelect,
    /// First byte.
    start: usize,
    /// One past the last byte.
    end: Option<usize>,
    /// The field.
    field: FieldSpec
  },
  /// Tokens of one line.
  Split {
    /// The line.
    line: LineSelect,
    /// Cut applied before splitting.
    cut: Cut,
    /// How to split.
    delimiter: Delimiter,
    /// Token to field bindings.
    columns: &'static [(Token, FieldSpec)]
  },
  /// Every token of one line as a single list field.
  List {
    /// The line.
    line: LineSelect,
    /// Cut applied before splitting.
    cut: Cut,
    /// How to split.
    delimiter: Delimiter,
    /// The list field; its type applies to every element.
    field: FieldSpec
  },
  /// `KEY<sep>value` scanning; the last occurrence wins.
  KeyValue {
    /// The key.
    key: &'static str,
    /// The separator following the key.
    separator: char,
    /// The value stops at this char, if set.
    until: Option<char>,
    /// The field.
    field: FieldSpec
  },
  /// A label chosen by which pattern a line contains.
  Classify {
    /// Pattern and label pairs, in priority order.
    cases: &'static [(&'static str, &'static str)],
    /// Compare case-insensitively.
    ignore_case: bool,
    /// Which matching line wins.
    pick: Pick,
    /// The field name.
    field: &'static str
  },
  /// Whether any line contains a pattern.
  Contains {
    /// The pattern.
    pattern: &'static str,
    /// The field name.
    field: &'static str
  },
  /// A header declares a number of rows that follow it verbatim.
  CountedTable {
    /// The row count.
    count: CountSource,
    /// Rows start after this line.
    header: LineSelect,
    /// Lines skipped between the header and the first row.
    skip: usize,
    /// How rows split.
    delimiter: Delimiter,
    /// Token to column bindings.
    columns: &'static [(Token, FieldSpec)],
    /// The list field name.
    name: &'static str
  },
  /// A counted sequence of fixed-height multi-line items.
  Blocks {
    /// The item count.
    count: CountSource,
    /// Index of the first line of the first item.
    start: usize,
    /// Lines per item.
    lines_per_item: usize,
    /// The pieces of each item.
    parts: &'static [BlockPart],
    /// The list field name.
    name: &'static str
  },
  /// Every qualifying line is a row; carry keys stamp state onto rows.
  Rows {
    /// Which lines are rows.
    filter: RowFilter,
    /// How rows split.
    delimiter: Delimiter,
    /// Token to column bindings.
    columns: &'static [(Token, FieldSpec)],
    /// Carry-forward keys.
    carry: &'static [CarryKey],
    /// Output shape.
    shape: RowShape,
    /// The field name.
    name: &'static str
  },
  /// The line after each line containing a tag is a row. Without a name,
  /// the columns of the last such row become plain fields.
  Tagged {
    /// The tag.
    tag: &'static str,
    /// How rows split.
    delimiter: Delimiter,
    /// Token to column bindings.
    columns: &'static [(Token, FieldSpec)],
    /// The list field name, if rows are kept as a list.
    name: Option<&'static str>
  },
  /// A flag resolved from sentinel hits, last one wins.
  Sentinel {
    /// The sentinel flag.
    flag: &'static str,
    /// The field name.
    field: &'static str
  },
  /// The name of the scope section.
  SectionName {
    /// The field name.
    field: &'static str
  },
  /// A constant.
  Constant {
    /// The field name.
    field: &'static str,
    /// The value.
    value: Literal
  },
  /// A hand-written decoder for layouts the other strategies don't cover.
  Decoder {
    /// A name for messages.
    name: &'static str,
    /// Builds a fresh decoder.
    make: fn() -> Box<dyn SectionDecoder>
  }
}

/// Whether an absent section is worth reporting.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum Presence {
  /// Absence just leaves fields null.
  Optional,
  /// Absence is reported as an issue.
  Expected
}

/// A rule: a strategy bound to a section relative to the current scope.
#[derive(Copy, Clone, Debug)]
pub struct ExtractionRule {
  /// The section path, relative to the scope. Empty means the scope itself.
  pub section: &'static [Seg],
  /// Include the lines of descendant sections, kept marker lines included.
  pub deep: bool,
  /// The strategy.
  pub strategy: Strategy,
  /// Only run if this holds.
  pub when: Option<Condition>,
  /// Whether absence is reported.
  pub presence: Presence
}

impl ExtractionRule {
  /// A rule on a section.
  pub const fn at(section: &'static [Seg], strategy: Strategy) -> Self {
    return Self {
      section,
      deep: false,
      strategy,
      when: None,
      presence: Presence::Optional
    };
  }

  /// A rule on the scope section itself.
  pub const fn here(strategy: Strategy) -> Self {
    return Self::at(&[], strategy);
  }

  /// Includes descendant lines.
  pub const fn deep(mut self) -> Self {
    self.deep = true;
    return self;
  }

  /// Adds a condition.
  pub const fn when(mut self, cond: Condition) -> Self {
    self.when = Some(cond);
    return self;
  }

  /// Reports absence.
  pub const fn expected(mut self) -> Self {
    self.presence = Presence::Expected;
    return self;
  }
}

/// Which child sections instantiate a group.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum NameMatch {
  /// Sections with exactly this name.
  Exact(&'static str),
  /// Every child except the implicit headers section.
  Any
}

/// A repeatable group: one nested record per matching child section.
#[derive(Copy, Clone, Debug)]
pub struct GroupSchema {
  /// The group name in the record.
  pub name: &'static str,
  /// Which child sections it covers.
  pub matcher: NameMatch,
  /// What is extracted from each.
  pub schema: Schema
}

/// The rules and groups of one scope.
#[derive(Copy, Clone, Debug)]
pub struct Schema {
  /// Rules, run in order.
  pub rules: &'static [ExtractionRule],
  /// Groups, run after the rules.
  pub groups: &'static [GroupSchema]
}

impl Schema {
  /// A schema with rules only.
  pub const fn rules(rules: &'static [ExtractionRule]) -> Self {
    return Self { rules, groups: &[] };
  }
}
