//! This module implements the record model: the typed, ordered, immutable
//! result of extracting fields from one file.
//!
//! A record maps field names to values and also holds repeatable groups
//! (models, load cases, components, tables, modes...) in occurrence order.
//! Paths address into it with `/` separators, and `name[n]` picks the n-th
//! (1-based) occurrence of a group or element of a list, e.g.
//! `load_cases[2]/hs` or `modes[1]/mode_shape[2]`.

use std::error::Error;
use std::fmt::Display;

use derive_more::From;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A field value.
#[derive(Clone, Debug, Default, PartialEq, From, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
  /// Explicitly absent.
  #[default]
  Null,
  /// A yes/no flag.
  Bool(bool),
  /// An integer.
  Integer(i64),
  /// A real.
  Real(f64),
  /// Text, or the raw token of a field declared to keep it.
  Text(String),
  /// An ordered list.
  List(Vec<Value>),
  /// A nested record.
  Record(Record)
}

/// The null value, for lookups that come up empty.
static NULL: Value = Value::Null;

impl From<&str> for Value {
  fn from(s: &str) -> Self {
    return Self::Text(s.to_string());
  }
}

impl From<Option<f64>> for Value {
  fn from(x: Option<f64>) -> Self {
    return x.map(Value::Real).unwrap_or_default();
  }
}

impl From<Vec<f64>> for Value {
  fn from(xs: Vec<f64>) -> Self {
    return Self::List(xs.into_iter().map(Value::Real).collect());
  }
}

impl Value {
  /// Whether this is null.
  pub fn is_null(&self) -> bool {
    return matches!(self, Self::Null);
  }

  /// The value as a real. Integers widen.
  pub fn as_real(&self) -> Option<f64> {
    return match self {
      Self::Real(x) => Some(*x),
      Self::Integer(i) => Some(*i as f64),
      _ => None
    };
  }

  /// The value as an integer.
  pub fn as_integer(&self) -> Option<i64> {
    return if let Self::Integer(i) = self { Some(*i) } else { None };
  }

  /// The value as text.
  pub fn as_text(&self) -> Option<&str> {
    return if let Self::Text(s) = self { Some(s.as_str()) } else { None };
  }

  /// The value as a flag.
  pub fn as_flag(&self) -> Option<bool> {
    return if let Self::Bool(b) = self { Some(*b) } else { None };
  }

  /// The value as a list.
  pub fn as_list(&self) -> Option<&[Value]> {
    return if let Self::List(l) = self { Some(l.as_slice()) } else { None };
  }

  /// The value as a nested record.
  pub fn as_record(&self) -> Option<&Record> {
    return if let Self::Record(r) = self { Some(r) } else { None };
  }

  /// A list of reals, skipping anything that isn't one.
  pub fn reals(&self) -> Vec<f64> {
    return self.as_list()
      .map(|l| l.iter().filter_map(Value::as_real).collect())
      .unwrap_or_default();
  }

  /// A short name for the kind of value, for messages.
  pub fn kind(&self) -> &'static str {
    return match self {
      Self::Null => "null",
      Self::Bool(_) => "flag",
      Self::Integer(_) => "integer",
      Self::Real(_) => "real",
      Self::Text(_) => "text",
      Self::List(_) => "list",
      Self::Record(_) => "record",
    };
  }
}

impl Display for Value {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    return match self {
      Self::Null => write!(f, "null"),
      Self::Bool(b) => write!(f, "{}", b),
      Self::Integer(i) => write!(f, "{}", i),
      Self::Real(x) => write!(f, "{}", x),
      Self::Text(s) => write!(f, "{}", s),
      Self::List(l) => write!(f, "[{}]", itertools::join(l.iter(), ", ")),
      Self::Record(r) => write!(f, "{{{} fields}}", r.fields.len()),
    };
  }
}

/// Asked for a field that isn't there (or is null, or has the wrong type).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingFieldError {
  /// The path that was asked for.
  pub field: String,
  /// What was found instead, if anything.
  pub found: Option<&'static str>
}

impl MissingFieldError {
  /// A field that is absent or null.
  pub fn absent<S: Into<String>>(field: S) -> Self {
    return Self { field: field.into(), found: None };
  }
}

impl Display for MissingFieldError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    return match self.found {
      Some(kind) => write!(f, "field \"{}\" holds a {} value", self.field, kind),
      None => write!(f, "field \"{}\" is missing", self.field),
    };
  }
}

impl Error for MissingFieldError {}

/// One step of a path.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct PathStep<'p> {
  /// The field or group name.
  name: &'p str,
  /// The 1-based index, if any.
  index: Option<usize>
}

/// Splits a path into steps. Malformed indices make the whole path invalid.
fn parse_path(path: &str) -> Option<Vec<PathStep<'_>>> {
  return path.split('/')
    .filter(|s| !s.is_empty())
    .map(|s| {
      if let Some(open) = s.rfind('[') {
        if s.ends_with(']') {
          let index = s[open+1..s.len()-1].trim().parse::<usize>().ok()?;
          return Some(PathStep { name: &s[..open], index: Some(index) });
        }
      }
      return Some(PathStep { name: s, index: None });
    })
    .collect();
}

/// An immutable, ordered record.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
  /// Named fields in insertion order.
  fields: IndexMap<String, Value>,
  /// Repeatable groups in insertion order, occurrences in encounter order.
  #[serde(skip_serializing_if = "IndexMap::is_empty", default)]
  groups: IndexMap<String, Vec<Record>>
}

impl Record {
  /// An empty record.
  pub fn new() -> Self {
    return Self::default();
  }

  /// Walks a path down to a record (for groups and nested records) or a
  /// value. Returns the value if the path ends on one.
  fn walk(&self, path: &str) -> Option<Walked<'_>> {
    let steps = parse_path(path)?;
    let mut cur = Walked::Rec(self);
    for step in steps {
      let rec = match cur {
        Walked::Rec(r) => r,
        Walked::Val(Value::Record(r)) => r,
        Walked::Val(_) => return None
      };
      cur = match step.index {
        Some(n) if rec.groups.contains_key(step.name) => {
          Walked::Rec(rec.groups.get(step.name)?.get(n.checked_sub(1)?)?)
        },
        Some(n) => {
          let list = rec.fields.get(step.name)?.as_list()?;
          Walked::Val(list.get(n.checked_sub(1)?)?)
        },
        None => Walked::Val(rec.fields.get(step.name)?)
      };
    }
    return Some(cur);
  }

  /// Gets the value at a path, or null if there is nothing there.
  pub fn get(&self, path: &str) -> &Value {
    return match self.walk(path) {
      Some(Walked::Val(v)) => v,
      _ => &NULL
    };
  }

  /// Gets a field by its exact name, without path parsing. Names holding
  /// `/` or `[` can only be read this way.
  pub fn field(&self, name: &str) -> &Value {
    return self.fields.get(name).unwrap_or(&NULL);
  }

  /// Whether a path resolves to anything, null included.
  pub fn has(&self, path: &str) -> bool {
    return self.walk(path).is_some();
  }

  /// Gets the record at a path: a group occurrence or a nested record.
  pub fn record(&self, path: &str) -> Option<&Record> {
    return match self.walk(path)? {
      Walked::Rec(r) => Some(r),
      Walked::Val(v) => v.as_record()
    };
  }

  /// Gets a real (integers widen).
  pub fn real(&self, path: &str) -> Option<f64> {
    return self.get(path).as_real();
  }

  /// Gets an integer.
  pub fn integer(&self, path: &str) -> Option<i64> {
    return self.get(path).as_integer();
  }

  /// Gets text.
  pub fn text(&self, path: &str) -> Option<&str> {
    return self.get(path).as_text();
  }

  /// Gets a flag.
  pub fn flag(&self, path: &str) -> Option<bool> {
    return self.get(path).as_flag();
  }

  /// Gets a list.
  pub fn list(&self, path: &str) -> Option<&[Value]> {
    return self.get(path).as_list();
  }

  /// Gets a value that must be there and must not be null.
  pub fn require(&self, path: &str) -> Result<&Value, MissingFieldError> {
    let v = self.get(path);
    if v.is_null() {
      return Err(MissingFieldError::absent(path));
    }
    return Ok(v);
  }

  /// Gets a real that must be there.
  pub fn require_real(&self, path: &str) -> Result<f64, MissingFieldError> {
    let v = self.require(path)?;
    return v.as_real().ok_or(MissingFieldError {
      field: path.to_string(),
      found: Some(v.kind())
    });
  }

  /// Gets text that must be there.
  pub fn require_text(&self, path: &str) -> Result<&str, MissingFieldError> {
    let v = self.require(path)?;
    return v.as_text().ok_or(MissingFieldError {
      field: path.to_string(),
      found: Some(v.kind())
    });
  }

  /// Gets a nested record or group occurrence that must be there.
  pub fn require_record(&self, path: &str) -> Result<&Record, MissingFieldError> {
    return self.record(path).ok_or_else(|| MissingFieldError::absent(path));
  }

  /// The occurrences of a group with their 1-based numbers.
  pub fn group<'a>(
    &'a self,
    name: &str
  ) -> impl Iterator<Item = (usize, &'a Record)> + 'a {
    return self.groups.get(name)
      .map(|v| v.as_slice())
      .unwrap_or_default()
      .iter()
      .enumerate()
      .map(|(i, r)| (i + 1, r));
  }

  /// The number of occurrences of a group.
  pub fn group_len(&self, name: &str) -> usize {
    return self.groups.get(name).map(Vec::len).unwrap_or(0);
  }

  /// The group names, in order.
  pub fn group_names(&self) -> impl Iterator<Item = &str> {
    return self.groups.keys().map(String::as_str);
  }

  /// The fields, in order.
  pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
    return self.fields.iter().map(|(k, v)| (k.as_str(), v));
  }

  /// The number of fields (groups excluded).
  pub fn len(&self) -> usize {
    return self.fields.len();
  }

  /// Whether there are neither fields nor groups.
  pub fn is_empty(&self) -> bool {
    return self.fields.is_empty() && self.groups.is_empty();
  }

  /// Builds a new record with the fields and groups of `other` laid over
  /// those of `self`. Neither input is touched.
  pub fn merged(&self, other: &Record) -> Record {
    let mut out = self.clone();
    for (k, v) in &other.fields {
      out.fields.insert(k.clone(), v.clone());
    }
    for (k, v) in &other.groups {
      out.groups.insert(k.clone(), v.clone());
    }
    return out;
  }
}

/// Where a path walk ended.
enum Walked<'a> {
  /// On a record.
  Rec(&'a Record),
  /// On a value.
  Val(&'a Value)
}

/// The only way to put together a record. Fields set twice keep the last
/// value, in the position of the first.
#[derive(Clone, Debug, Default)]
pub struct RecordBuilder {
  /// The record under construction.
  inner: Record
}

impl RecordBuilder {
  /// A fresh builder.
  pub fn new() -> Self {
    return Self::default();
  }

  /// Sets a field.
  pub fn set<S: Into<String>, V: Into<Value>>(&mut self, name: S, value: V) -> &mut Self {
    self.inner.fields.insert(name.into(), value.into());
    return self;
  }

  /// Sets a field to null unless it is already set.
  pub fn set_null(&mut self, name: &str) -> &mut Self {
    if !self.inner.fields.contains_key(name) {
      self.inner.fields.insert(name.to_string(), Value::Null);
    }
    return self;
  }

  /// Appends an occurrence to a group.
  pub fn push_group<S: Into<String>>(&mut self, name: S, rec: Record) -> &mut Self {
    self.inner.groups.entry(name.into()).or_default().push(rec);
    return self;
  }

  /// Declares a group, possibly empty, so that it shows up in order.
  pub fn declare_group(&mut self, name: &str) -> &mut Self {
    if !self.inner.groups.contains_key(name) {
      self.inner.groups.insert(name.to_string(), Vec::new());
    }
    return self;
  }

  /// Reads back a value set earlier (paths allowed).
  pub fn get(&self, path: &str) -> &Value {
    return self.inner.get(path);
  }

  /// Whether a field is set.
  pub fn has(&self, path: &str) -> bool {
    return self.inner.has(path);
  }

  /// The record built so far, read-only.
  pub fn peek(&self) -> &Record {
    return &self.inner;
  }

  /// Finishes the record.
  pub fn build(self) -> Record {
    return self.inner;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn sample() -> Record {
    let mut mode = RecordBuilder::new();
    mode.set("natural_frequency", 1.5).set("mode_shape", vec![1.0, 0.5]);
    let mut rb = RecordBuilder::new();
    rb.set("no_of_modes", 2i64).set("units", "imperial");
    rb.push_group("modes", mode.build());
    let mut nested = RecordBuilder::new();
    nested.set("Normal Drag", 1.2);
    rb.set("sets", nested.build());
    return rb.build();
  }

  #[test]
  fn paths_resolve() {
    let rec = sample();
    assert_eq!(rec.integer("no_of_modes"), Some(2));
    assert_eq!(rec.real("modes[1]/natural_frequency"), Some(1.5));
    assert_eq!(rec.real("modes[1]/mode_shape[2]"), Some(0.5));
    assert_eq!(rec.real("sets/Normal Drag"), Some(1.2));
    assert!(rec.get("modes[2]/natural_frequency").is_null());
    assert!(rec.get("modes[0]").is_null());
    assert!(!rec.has("nope"));
    assert_eq!(rec.group("modes").map(|(n, _)| n).collect::<Vec<_>>(), [1]);
  }

  #[test]
  fn require_names_the_field() {
    let rec = sample();
    let err = rec.require_real("water_depth").unwrap_err();
    assert_eq!(err.field, "water_depth");
    let err = rec.require_real("units").unwrap_err();
    assert_eq!(err.found, Some("text"));
  }

  #[test]
  fn merging_makes_a_new_record() {
    let base = sample();
    let mut extra = RecordBuilder::new();
    extra.set("units", "metric").set("heave", 2.5);
    let merged = base.merged(&extra.build());
    assert_eq!(merged.text("units"), Some("metric"));
    assert_eq!(base.text("units"), Some("imperial"));
    assert_eq!(merged.real("heave"), Some(2.5));
  }

  #[test]
  fn serializes_with_nulls() {
    let mut rb = RecordBuilder::new();
    rb.set("hs", Value::Null).set("tp", 12.0);
    let json = serde_json::to_string(&rb.build()).unwrap();
    assert_eq!(json, r#"{"fields":{"hs":null,"tp":12.0}}"#);
  }
}
