//! This module implements the field extractor: it walks a format schema over a
//! section tree and applies every rule, building the record scope by scope.
//!
//! Extraction never fails as a whole. Bad tokens and absent sections become
//! nulls plus issues, and a rule declared to fail hard only stops itself.

use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::issues::*;
use crate::record::*;
use crate::rules::*;
use crate::tree::*;
use crate::util::*;

/// A decoder might respond this when fed a line.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum LineResponse {
  /// The line was useless.
  Useless,
  /// The line contained data.
  Data,
  /// The line updated carry-forward state.
  Carry,
  /// The line looked like data but was malformed.
  Malformed,
  /// The decoder wants no more lines.
  Done
}

/// The carry-forward state of a rule: named values set by one line and
/// applied to the lines that follow it.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct CarryState {
  /// The carried values.
  values: IndexMap<String, Value>
}

impl CarryState {
  /// Sets a value; it applies to every line from now on.
  pub fn set<S: Into<String>, V: Into<Value>>(&mut self, name: S, value: V) {
    self.values.insert(name.into(), value.into());
  }

  /// Gets a value, null if never set.
  pub fn get(&self, name: &str) -> &Value {
    return self.values.get(name).unwrap_or(&Value::Null);
  }

  /// Forgets a value.
  pub fn clear(&mut self, name: &str) {
    self.values.shift_remove(name);
  }
}

/// Returned by coercion when a field declared to fail hard can't be read.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RuleAbort;

/// Everything a rule (or a decoder) needs while it runs.
pub struct RuleContext<'a> {
  /// The record of the current scope, as built so far.
  pub record: &'a mut RecordBuilder,
  /// Carry-forward state for this rule.
  pub carry: CarryState,
  /// The issue sink.
  issues: &'a mut Vec<ParseIssue>,
  /// The section being read, for messages.
  section: String
}

impl<'a> RuleContext<'a> {
  /// Builds a context.
  pub fn new(
    record: &'a mut RecordBuilder,
    issues: &'a mut Vec<ParseIssue>,
    section: String
  ) -> Self {
    return Self { record, carry: CarryState::default(), issues, section };
  }

  /// The section being read.
  pub fn section(&self) -> &str {
    return &self.section;
  }

  /// Reports an issue.
  pub fn issue(&mut self, issue: ParseIssue) {
    issue.report(self.issues);
  }

  /// Reports a malformed token.
  pub fn malformed(&mut self, field: &str, token: &str, reason: MalformedReason) {
    let issue = ParseIssue::MalformedField {
      section: self.section.clone(),
      field: field.to_string(),
      token: token.to_string(),
      reason
    };
    self.issue(issue);
  }

  /// Coerces a token (`None` meaning the column is missing) into a field
  /// value according to its spec.
  pub fn coerce(
    &mut self,
    spec: &FieldSpec,
    raw: Option<&str>
  ) -> Result<Value, RuleAbort> {
    let Some(raw) = raw else {
      if !spec.optional {
        self.malformed(spec.name, "", MalformedReason::MissingColumn);
      }
      return Ok(spec.default.to_value());
    };
    let stripped: String = raw.chars().filter(|c| !spec.strip.contains(c)).collect();
    let word = match spec.word {
      Word::Whole => stripped.trim(),
      Word::First => stripped.split_whitespace().next().unwrap_or_default(),
      Word::Last => stripped.split_whitespace().last().unwrap_or_default(),
    };
    let tok = if spec.unquote { unquote(word) } else { word.trim() };
    if tok.is_empty() {
      return Ok(spec.default.to_value());
    }
    let (parsed, reason) = match spec.ty {
      FieldType::Real => (
        parse_real(tok).map(|x| Value::Real(match spec.round {
          Some(places) => round_to(x, places),
          None => x
        })),
        MalformedReason::NotReal
      ),
      FieldType::Integer => {
        (parse_integer(tok).map(Value::Integer), MalformedReason::NotInteger)
      },
      FieldType::Text => (Some(Value::Text(tok.to_string())), MalformedReason::NotReal),
      FieldType::Flag => (parse_flag(tok).map(Value::Bool), MalformedReason::NotFlag),
    };
    if let Some(v) = parsed {
      return Ok(v);
    }
    return match spec.fallback {
      Fallback::Null => {
        self.malformed(spec.name, tok, reason);
        Ok(Value::Null)
      },
      Fallback::Raw => Ok(Value::Text(tok.to_string())),
      Fallback::Fail => {
        let issue = ParseIssue::RuleAborted {
          section: self.section.clone(),
          field: spec.name.to_string(),
          token: tok.to_string()
        };
        self.issue(issue);
        Err(RuleAbort)
      }
    };
  }

  /// Coerces the columns of a split line into a row record.
  pub fn row(
    &mut self,
    tokens: &[&str],
    columns: &[(Token, FieldSpec)]
  ) -> Result<Record, RuleAbort> {
    let mut rb = RecordBuilder::new();
    for (tok, spec) in columns {
      let v = self.coerce(spec, tok.pick(tokens))?;
      rb.set(spec.name, v);
    }
    return Ok(rb.build());
  }
}

/// A hand-written, line-by-line decoder for a section whose layout the
/// declarative strategies can't express. It is fed every line of its section
/// and then finalised, even if the section was absent.
pub trait SectionDecoder {
  /// Consumes a line.
  fn consume(&mut self, line: &str, ctx: &mut RuleContext) -> LineResponse;

  /// Writes the decoded fields into the scope record.
  fn finalise(self: Box<Self>, ctx: &mut RuleContext);
}

/// Finds `KEY<sep>value` in a line and returns the value, trimmed and cut at
/// `until` if given. Spaces may separate the key and the separator.
pub fn find_key_value<'l>(
  line: &'l str,
  key: &str,
  separator: char,
  until: Option<char>,
  ignore_case: bool
) -> Option<&'l str> {
  // ASCII lowercasing keeps byte offsets intact
  let (hay, needle) = if ignore_case {
    (line.to_ascii_lowercase(), key.to_ascii_lowercase())
  } else {
    (line.to_string(), key.to_string())
  };
  for (start, _) in hay.match_indices(needle.as_str()) {
    let rest = line[start + key.len()..].trim_start();
    if let Some(rest) = rest.strip_prefix(separator) {
      let value = match until {
        Some(c) => rest.split(c).next().unwrap_or_default(),
        None => rest
      };
      return Some(value.trim());
    }
  }
  return None;
}

/// Resolves a line selection to an index into the lines.
fn select_index(sel: &LineSelect, lines: &[&str]) -> Option<usize> {
  return match sel {
    LineSelect::Index(n) => (*n < lines.len()).then_some(*n),
    LineSelect::FromEnd(n) => lines.len().checked_sub(*n),
    LineSelect::FirstContaining(p) => lines.iter().position(|l| l.contains(p)),
    LineSelect::LastContaining(p) => lines.iter().rposition(|l| l.contains(p)),
    LineSelect::LastWithout(p) => lines.iter().rposition(|l| !l.contains(p)),
    LineSelect::After(p) => lines.iter()
      .position(|l| l.contains(p))
      .map(|i| i + 1)
      .filter(|i| *i < lines.len()),
    LineSelect::Header => None,
  };
}

/// Resolves a line selection to a line.
fn select<'l>(
  sel: &LineSelect,
  lines: &[&'l str],
  header: Option<&'l str>
) -> Option<&'l str> {
  if let LineSelect::Header = sel {
    return header;
  }
  return select_index(sel, lines).map(|i| lines[i]);
}

/// Whether a missing selected line is a malformation rather than a pattern
/// that simply didn't show up.
fn positional(sel: &LineSelect) -> bool {
  return matches!(sel, LineSelect::Index(_) | LineSelect::FromEnd(_));
}

/// The plain (non-decoder) fields a strategy produces, with their defaults.
fn produced_fields(strategy: &Strategy) -> Vec<(&'static str, Value)> {
  let spec = |f: &FieldSpec| (f.name, f.default.to_value());
  return match strategy {
    Strategy::Column { field, .. } => vec![spec(field)],
    Strategy::Split { columns, .. } => columns.iter().map(|(_, f)| spec(f)).collect(),
    Strategy::List { field, .. } => vec![(field.name, Value::Null)],
    Strategy::KeyValue { field, .. } => vec![spec(field)],
    Strategy::Classify { field, .. } => vec![(*field, Value::Null)],
    Strategy::Contains { field, .. } => vec![(*field, Value::Null)],
    Strategy::CountedTable { name, .. } => vec![(*name, Value::Null)],
    Strategy::Blocks { name, .. } => vec![(*name, Value::Null)],
    Strategy::Rows { shape: RowShape { layout: Layout::Spread, group_by: None }, columns, .. } => {
      columns.iter().map(|(_, f)| (f.name, Value::Null)).collect()
    },
    Strategy::Rows { name, .. } => vec![(*name, Value::Null)],
    Strategy::Tagged { name: Some(name), .. } => vec![(*name, Value::Null)],
    Strategy::Tagged { name: None, columns, .. } => {
      columns.iter().map(|(_, f)| spec(f)).collect()
    },
    Strategy::Sentinel { field, .. } => vec![(*field, Value::Null)],
    Strategy::SectionName { field } => vec![(*field, Value::Null)],
    Strategy::Constant { field, value } => vec![(*field, value.to_value())],
    Strategy::Decoder { .. } => Vec::new(),
  };
}

/// Checks a rule condition against the scope record.
fn holds(cond: &Condition, rb: &RecordBuilder) -> bool {
  return match cond {
    Condition::Equals(field, value) => rb.get(field).as_text() == Some(*value),
    Condition::Present(field) => !rb.get(field).is_null(),
  };
}

/// Reads a row count.
fn read_count(
  count: &CountSource,
  lines: &[&str],
  ctx: &mut RuleContext,
  name: &str
) -> Option<usize> {
  let (n, token) = match count {
    CountSource::Token(sel, tok) => {
      let line = select(sel, lines, None)?;
      let token = line.split_whitespace().nth(*tok).unwrap_or_default();
      let head = token.split(',').next().unwrap_or_default();
      (parse_integer(head), token.to_string())
    },
    CountSource::Field(field) => {
      let v = ctx.record.get(field);
      (v.as_integer(), v.to_string())
    }
  };
  match n.and_then(|n| num::ToPrimitive::to_usize(&n)) {
    Some(n) => return Some(n),
    None => {
      ctx.malformed(name, &token, MalformedReason::BadCount);
      return None;
    }
  }
}

/// Runs the strategies that read lines.
fn apply(
  strategy: &Strategy,
  lines: &[&str],
  header: Option<&str>,
  tree: &SectionTree,
  scope: &[SectionKey],
  ctx: &mut RuleContext
) -> Result<(), RuleAbort> {
  match strategy {
    Strategy::Column { line, start, end, field } => {
      let Some(text) = select(line, lines, header) else {
        if positional(line) {
          ctx.malformed(field.name, "", MalformedReason::MissingLine);
        }
        return Ok(());
      };
      let stop = end.unwrap_or(text.len()).min(text.len());
      let slice = text.get((*start).min(stop)..stop).unwrap_or_default();
      let v = ctx.coerce(field, Some(slice))?;
      ctx.record.set(field.name, v);
    },
    Strategy::Split { line, cut, delimiter, columns } => {
      let Some(text) = select(line, lines, header) else {
        if positional(line) {
          if let Some((_, f)) = columns.first() {
            ctx.malformed(f.name, "", MalformedReason::MissingLine);
          }
        }
        return Ok(());
      };
      let tokens = delimiter.split(cut.apply(text));
      for (tok, spec) in columns.iter() {
        let v = ctx.coerce(spec, tok.pick(&tokens))?;
        ctx.record.set(spec.name, v);
      }
    },
    Strategy::List { line, cut, delimiter, field } => {
      let Some(text) = select(line, lines, header) else {
        return Ok(());
      };
      let mut out = Vec::new();
      for tok in delimiter.split(cut.apply(text)) {
        out.push(ctx.coerce(field, Some(tok))?);
      }
      ctx.record.set(field.name, Value::List(out));
    },
    Strategy::KeyValue { key, separator, until, field } => {
      let found = lines.iter()
        .filter_map(|l| find_key_value(l, key, *separator, *until, false))
        .last();
      if let Some(raw) = found {
        let v = ctx.coerce(field, Some(raw))?;
        ctx.record.set(field.name, v);
      }
    },
    Strategy::Classify { cases, ignore_case, pick, field } => {
      let mut label = None;
      for line in lines {
        let hay = if *ignore_case { line.to_lowercase() } else { line.to_string() };
        let hit = cases.iter().find(|(p, _)| {
          if *ignore_case { hay.contains(&p.to_lowercase()) } else { hay.contains(p) }
        });
        if let Some((_, l)) = hit {
          label = Some(*l);
          if *pick == Pick::First {
            break;
          }
        }
      }
      if let Some(l) = label {
        ctx.record.set(*field, l);
      }
    },
    Strategy::Contains { pattern, field } => {
      let found = lines.iter().any(|l| l.contains(pattern));
      ctx.record.set(*field, found);
    },
    Strategy::CountedTable { count, header: head, skip, delimiter, columns, name } => {
      let Some(h) = select_index(head, lines) else {
        return Ok(());
      };
      let Some(n) = read_count(count, lines, ctx, name) else {
        return Ok(());
      };
      let first = (h + 1 + skip).min(lines.len());
      let available = lines.len().saturating_sub(first).min(n);
      if available < n {
        ctx.malformed(name, &n.to_string(), MalformedReason::MissingLine);
      }
      let mut rows = Vec::with_capacity(available);
      for line in &lines[first..first + available] {
        let tokens = delimiter.split(line);
        rows.push(Value::Record(ctx.row(&tokens, columns)?));
      }
      ctx.record.set(*name, Value::List(rows));
    },
    Strategy::Blocks { count, start, lines_per_item, parts, name } => {
      let Some(n) = read_count(count, lines, ctx, name) else {
        return Ok(());
      };
      // only items whose first line exists are read
      let fits = lines.len().saturating_sub(*start).div_ceil((*lines_per_item).max(1));
      if n > fits {
        ctx.malformed(name, &n.to_string(), MalformedReason::BadCount);
      }
      let n = n.min(fits);
      let mut items = Vec::with_capacity(n);
      for k in 0..n {
        let base = start + k * lines_per_item;
        let mut rb = RecordBuilder::new();
        for part in parts.iter() {
          let (offset, field) = match part {
            BlockPart::Column { line, field, .. } => (*line, field),
            BlockPart::Token { line, field, .. } => (*line, field),
          };
          let Some(text) = lines.get(base + offset) else {
            ctx.malformed(field.name, "", MalformedReason::MissingLine);
            rb.set(field.name, field.default.to_value());
            continue;
          };
          let raw = match part {
            BlockPart::Column { start, end, .. } => {
              let stop = end.unwrap_or(text.len()).min(text.len());
              Some(text.get((*start).min(stop)..stop).unwrap_or_default())
            },
            BlockPart::Token { delimiter, token, .. } => {
              token.pick(&delimiter.split(text))
            }
          };
          let v = ctx.coerce(field, raw)?;
          rb.set(field.name, v);
        }
        items.push(Value::Record(rb.build()));
      }
      ctx.record.set(*name, Value::List(items));
    },
    Strategy::Rows { filter, delimiter, columns, carry, shape, name } => {
      let rows = collect_rows(filter, delimiter, columns, carry, lines, ctx)?;
      if shape.layout == Layout::Spread && shape.group_by.is_none() {
        for (k, v) in to_columns(&rows, columns).fields() {
          ctx.record.set(k, v.clone());
        }
      } else {
        let v = shape_rows(rows, shape, columns);
        ctx.record.set(*name, v);
      }
    },
    Strategy::Tagged { tag, delimiter, columns, name } => {
      let mut rows = Vec::new();
      for (i, line) in lines.iter().enumerate() {
        if line.contains(tag) {
          if let Some(next) = lines.get(i + 1) {
            rows.push(ctx.row(&delimiter.split(next), columns)?);
          }
        }
      }
      match name {
        Some(name) => {
          let list = rows.into_iter().map(Value::Record).collect::<Vec<_>>();
          ctx.record.set(*name, Value::List(list));
        },
        None => if let Some(last) = rows.pop() {
          for (k, v) in last.fields() {
            ctx.record.set(k, v.clone());
          }
        }
      }
    },
    Strategy::Decoder { name, make } => {
      let mut dec = make();
      for line in lines {
        if dec.consume(line, ctx) == LineResponse::Done {
          debug!("Decoder \"{}\" finished early.", name);
          break;
        }
      }
      dec.finalise(ctx);
    },
    Strategy::Sentinel { flag, field } => {
      let v = tree.sentinel(flag).map(Value::Bool).unwrap_or_default();
      ctx.record.set(*field, v);
    },
    Strategy::SectionName { field } => {
      if let Some(key) = scope.last() {
        ctx.record.set(*field, key.name.as_str());
      }
    },
    Strategy::Constant { field, value } => {
      ctx.record.set(*field, value.to_value());
    }
  }
  return Ok(());
}

/// Collects the rows of a row rule, applying carry keys.
fn collect_rows(
  filter: &RowFilter,
  delimiter: &Delimiter,
  columns: &[(Token, FieldSpec)],
  carry: &[CarryKey],
  lines: &[&str],
  ctx: &mut RuleContext
) -> Result<Vec<Record>, RuleAbort> {
  let mut rows = Vec::new();
  for (i, line) in lines.iter().enumerate() {
    if i < filter.start {
      continue;
    }
    if filter.stop_at_blank && line.trim().is_empty() {
      break;
    }
    let hit = carry.iter().find_map(|ck| {
      find_key_value(line, ck.key, '=', ck.until, ck.ignore_case).map(|v| (ck, v))
    });
    if let Some((ck, raw)) = hit {
      let v = ctx.coerce(&FieldSpec::new(ck.name, ck.ty), Some(raw))?;
      ctx.carry.set(ck.name, v);
      continue;
    }
    if filter.skip_containing.iter().any(|s| line.contains(s)) {
      continue;
    }
    let tokens = delimiter.split(line);
    if tokens.iter().all(|t| t.trim().is_empty()) {
      continue;
    }
    if !filter.token_counts.is_empty() && !filter.token_counts.contains(&tokens.len()) {
      continue;
    }
    if filter.numeric_first && parse_real(tokens[0]).is_none() {
      continue;
    }
    let mut rb = RecordBuilder::new();
    for ck in carry {
      rb.set(ck.name, ctx.carry.get(ck.name).clone());
    }
    for (tok, spec) in columns {
      let v = ctx.coerce(spec, tok.pick(&tokens))?;
      rb.set(spec.name, v);
    }
    rows.push(rb.build());
  }
  return Ok(rows);
}

/// Turns rows into a column-per-field record.
fn to_columns(rows: &[Record], columns: &[(Token, FieldSpec)]) -> Record {
  let mut rb = RecordBuilder::new();
  for (_, spec) in columns {
    let col = rows.iter().map(|r| r.get(spec.name).clone()).collect::<Vec<_>>();
    rb.set(spec.name, Value::List(col));
  }
  return rb.build();
}

/// Lays rows out as requested.
fn shape_rows(rows: Vec<Record>, shape: &RowShape, columns: &[(Token, FieldSpec)]) -> Value {
  let layout = |rows: Vec<Record>| match shape.layout {
    Layout::Records => Value::List(rows.into_iter().map(Value::Record).collect()),
    Layout::Columns | Layout::Spread => Value::Record(to_columns(&rows, columns)),
  };
  let Some(key) = shape.group_by else {
    return layout(rows);
  };
  let mut groups: IndexMap<String, Vec<Record>> = IndexMap::new();
  for row in rows {
    let k = match row.get(key) {
      Value::Null => continue,
      Value::Real(x) => real_key(*x),
      other => other.to_string()
    };
    groups.entry(k).or_default().push(row);
  }
  let mut rb = RecordBuilder::new();
  for (k, rows) in groups {
    rb.set(k, layout(rows));
  }
  return Value::Record(rb.build());
}

/// Runs one rule in one scope.
fn run_rule(
  tree: &SectionTree,
  issues: &mut Vec<ParseIssue>,
  scope: &[SectionKey],
  rule: &ExtractionRule,
  rb: &mut RecordBuilder
) {
  let fields = produced_fields(&rule.strategy);
  let fill = |rb: &mut RecordBuilder| {
    for (name, default) in &fields {
      if !rb.has(name) {
        rb.set(*name, default.clone());
      }
    }
  };
  if let Some(cond) = &rule.when {
    if !holds(cond, rb) {
      fill(rb);
      return;
    }
  }
  let reads_lines = !matches!(
    rule.strategy,
    Strategy::Sentinel { .. } | Strategy::SectionName { .. } | Strategy::Constant { .. }
  );
  let path = if reads_lines { tree.find(scope, rule.section) } else { None };
  let label = match path {
    Some(p) => path_string(p),
    None => {
      let mut label = path_string(scope);
      for s in rule.section {
        label = format!("{}/{}", label.trim_end_matches('/'), s.name);
      }
      label
    }
  };
  let mut ctx = RuleContext::new(rb, issues, label);
  let (lines, header): (Vec<&str>, Option<&str>) = match path {
    Some(p) => {
      let lines = if rule.deep {
        tree.subtree_lines(p).map(String::as_str).collect()
      } else {
        tree.lines(p).iter().map(String::as_str).collect()
      };
      (lines, tree.get(p).and_then(|s| s.header.as_deref()))
    },
    None if reads_lines => {
      if rule.presence == Presence::Expected {
        let section = ctx.section().to_string();
        ctx.issue(ParseIssue::SectionNotFound { section });
      }
      if let Strategy::Decoder { make, .. } = rule.strategy {
        make().finalise(&mut ctx);
      }
      fill(ctx.record);
      return;
    },
    None => (Vec::new(), None)
  };
  if apply(&rule.strategy, &lines, header, tree, scope, &mut ctx).is_err() {
    debug!("A rule on \"{}\" was aborted.", ctx.section());
  }
  fill(ctx.record);
}

/// Walks a schema over a section tree.
pub struct FieldExtractor<'t> {
  /// The tree being read.
  tree: &'t SectionTree,
  /// The issues found so far.
  issues: Vec<ParseIssue>
}

impl<'t> FieldExtractor<'t> {
  /// Instantiates an extractor over a tree.
  pub fn new(tree: &'t SectionTree) -> Self {
    return Self { tree, issues: Vec::new() };
  }

  /// Runs the rules and groups of a schema in a scope.
  fn run_scope(&mut self, scope: &[SectionKey], schema: &Schema, rb: &mut RecordBuilder) {
    for rule in schema.rules {
      run_rule(self.tree, &mut self.issues, scope, rule, rb);
    }
    for group in schema.groups {
      rb.declare_group(group.name);
      let children = self.tree.children(scope)
        .map(|(p, _)| p)
        .filter(|p| p.last().is_some_and(|k| match group.matcher {
          NameMatch::Exact(name) => k.name == name,
          NameMatch::Any => !k.is_headers(),
        }))
        .cloned()
        .collect::<Vec<_>>();
      for child in children {
        let mut crb = RecordBuilder::new();
        self.run_scope(&child, &group.schema, &mut crb);
        rb.push_group(group.name, crb.build());
      }
    }
  }

  /// Extracts a schema from the root, continuing an existing builder.
  pub fn extract_into(&mut self, schema: &Schema, rb: &mut RecordBuilder) {
    self.run_scope(&[], schema, rb);
  }

  /// Hands back the issues.
  pub fn finish(self) -> Vec<ParseIssue> {
    return self.issues;
  }

  /// Extracts a whole record in one go.
  pub fn extract(tree: &SectionTree, schema: &Schema) -> (Record, Vec<ParseIssue>) {
    let mut ex = FieldExtractor::new(tree);
    let mut rb = RecordBuilder::new();
    ex.extract_into(schema, &mut rb);
    return (rb.build(), ex.finish());
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::grammar::*;
  use crate::tokenizer::OnePassTokenizer;

  const STAR: SectionGrammar = SectionGrammar {
    levels: &[LevelSpec::simple(&[MarkerRule {
      matcher: MarkerMatch::Prefix("*"),
      name: MarkerName::Verbatim
    }])],
    counts: &[],
    sentinels: &[]
  };

  fn run(lines: &[&str], rules: &'static [ExtractionRule]) -> (Record, Vec<ParseIssue>) {
    let tree = OnePassTokenizer::tokenize(STAR, lines.iter());
    return FieldExtractor::extract(&tree, &Schema::rules(rules));
  }

  #[test]
  fn bad_numbers_become_null_with_an_issue() {
    const RULES: &[ExtractionRule] = &[ExtractionRule::at(
      &[seg("*WIND")],
      Strategy::Split {
        line: LineSelect::Index(0),
        cut: Cut::Keep,
        delimiter: Delimiter::Char(','),
        columns: &[
          (Token::Nth(0), FieldSpec::real("wind_speed")),
          (Token::Nth(1), FieldSpec::real("wind_dir")),
        ]
      }
    )];
    let (rec, issues) = run(&["*WIND", "abc, 45.0"], RULES);
    assert!(rec.get("wind_speed").is_null());
    assert_eq!(rec.real("wind_dir"), Some(45.0));
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].field(), Some("wind_speed"));
  }

  #[test]
  fn absent_sections_leave_defaults() {
    const RULES: &[ExtractionRule] = &[
      ExtractionRule::at(&[seg("*OFFSET")], Strategy::KeyValue {
        key: "OPTION",
        separator: '=',
        until: None,
        field: FieldSpec::text("offset_option").or(Literal::Text("dist"))
      }),
      ExtractionRule::at(&[seg("*OCEAN")], Strategy::Split {
        line: LineSelect::Index(0),
        cut: Cut::Keep,
        delimiter: Delimiter::Char(','),
        columns: &[(Token::Nth(0), FieldSpec::real("water_depth"))]
      }).expected(),
    ];
    let (rec, issues) = run(&["*WIND", "1, 2"], RULES);
    assert_eq!(rec.text("offset_option"), Some("dist"));
    assert!(rec.has("water_depth"));
    assert!(rec.get("water_depth").is_null());
    assert!(matches!(issues[..], [ParseIssue::SectionNotFound { .. }]));
  }

  #[test]
  fn carry_keys_stamp_rows() {
    const RULES: &[ExtractionRule] = &[ExtractionRule::at(
      &[seg("*P-Y")],
      Strategy::Rows {
        filter: RowFilter::counts(&[2]),
        delimiter: Delimiter::Char(','),
        columns: &[
          (Token::Nth(0), FieldSpec::real("p")),
          (Token::Nth(1), FieldSpec::real("y")),
        ],
        carry: &[CarryKey {
          key: "DEPTH",
          name: "depth",
          until: Some(','),
          ignore_case: false,
          ty: FieldType::Real
        }],
        shape: RowShape { layout: Layout::Columns, group_by: Some("depth") },
        name: "p_y_curves"
      }
    )];
    let lines = [
      "*P-Y", "0.0, 0.0", "DEPTH=10", "1.0, 0.1", "2.0, 0.2", "DEPTH = 20", "3.0, 0.3",
    ];
    let (rec, issues) = run(&lines, RULES);
    assert!(issues.is_empty());
    assert_eq!(rec.get("p_y_curves/10.0/p").reals(), [1.0, 2.0]);
    assert_eq!(rec.get("p_y_curves/20.0/y").reals(), [0.3]);
    assert!(!rec.has("p_y_curves/0.0"));
  }

  #[test]
  fn fail_policy_stops_only_that_rule() {
    const RULES: &[ExtractionRule] = &[
      ExtractionRule::at(&[seg("*A")], Strategy::Rows {
        filter: RowFilter::ANY,
        delimiter: Delimiter::Whitespace,
        columns: &[(Token::Nth(0), FieldSpec::integer("n").or_fail())],
        carry: &[],
        shape: RowShape::LIST,
        name: "rows"
      }),
      ExtractionRule::at(&[seg("*B")], Strategy::Split {
        line: LineSelect::Index(0),
        cut: Cut::Keep,
        delimiter: Delimiter::Whitespace,
        columns: &[(Token::Nth(0), FieldSpec::integer("b"))]
      }),
    ];
    let (rec, issues) = run(&["*A", "1", "x", "*B", "7"], RULES);
    assert!(rec.get("rows").is_null());
    assert_eq!(rec.integer("b"), Some(7));
    assert!(matches!(issues[..], [ParseIssue::RuleAborted { .. }]));
  }

  #[test]
  fn key_values_tolerate_spaces() {
    assert_eq!(find_key_value("SET=Pup Joint, TYPE=CONSTANT", "SET", '=', Some(','), false), Some("Pup Joint"));
    assert_eq!(find_key_value("MAX VM STRESS = 0.67", "MAX VM STRESS", '=', None, false), Some("0.67"));
    assert_eq!(find_key_value("set=damp1", "SET", '=', None, true), Some("damp1"));
    assert_eq!(find_key_value("NO KEY HERE", "SET", '=', None, false), None);
    assert_eq!(find_key_value("OFFSET, SET=a", "SET", '=', None, false), Some("a"));
  }
}
