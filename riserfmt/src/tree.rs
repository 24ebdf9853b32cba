//! This module implements the section tree: the ordered mapping from section
//! paths to the raw data lines the tokenizer assigned to them.

use std::fmt::Display;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_with::serde_as;

/// The name of the implicit section holding lines seen before any marker.
pub const HEADERS: &str = "headers";

/// One component of a section path.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SectionKey {
  /// The marker-derived name.
  pub name: String,
  /// The 1-based occurrence number, for repeatable sections only.
  pub occurrence: Option<usize>
}

impl SectionKey {
  /// A key for a non-repeatable section.
  pub fn named<S: Into<String>>(name: S) -> Self {
    return Self { name: name.into(), occurrence: None };
  }

  /// A key for the n-th occurrence of a repeatable section.
  pub fn nth<S: Into<String>>(name: S, n: usize) -> Self {
    return Self { name: name.into(), occurrence: Some(n) };
  }

  /// Whether this is the implicit headers section.
  pub fn is_headers(&self) -> bool {
    return self.name == HEADERS && self.occurrence.is_none();
  }
}

impl Display for SectionKey {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    return match self.occurrence {
      Some(n) => write!(f, "{}#{}", self.name, n),
      None => write!(f, "{}", self.name),
    };
  }
}

/// A full section path, shallowest key first.
pub type SectionPath = Vec<SectionKey>;

/// Renders a path for messages, e.g. `$LOAD CASE#2/*WAVE`.
pub fn path_string(path: &[SectionKey]) -> String {
  if path.is_empty() {
    return "/".to_string();
  }
  return itertools::join(path.iter(), "/");
}

/// A pattern matching one section key in a query.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Seg {
  /// The section name.
  pub name: &'static str,
  /// The occurrence wanted. `None` matches the first key with that name.
  pub nth: Option<usize>
}

/// Shorthand for a segment matching a section by name.
pub const fn seg(name: &'static str) -> Seg {
  return Seg { name, nth: None };
}

/// Shorthand for a segment matching the n-th occurrence of a section.
pub const fn nth(name: &'static str, n: usize) -> Seg {
  return Seg { name, nth: Some(n) };
}

impl Seg {
  /// Tests a key.
  pub fn matches(&self, key: &SectionKey) -> bool {
    if key.name != self.name {
      return false;
    }
    return match self.nth {
      Some(n) => key.occurrence == Some(n),
      None => true,
    };
  }
}

/// The raw contents of a section.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Section {
  /// The marker line, for levels that keep it.
  pub header: Option<String>,
  /// The 1-based line number of the marker (0 for implicit sections).
  pub line_no: usize,
  /// The data lines, in file order.
  pub lines: Vec<String>
}

/// A sentinel that fired while tokenizing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SentinelHit {
  /// The flag it sets.
  pub flag: String,
  /// The value it sets.
  pub value: bool,
  /// The 1-based line number.
  pub line_no: usize
}

/// The ordered section tree of one file.
#[serde_as]
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SectionTree {
  /// Sections in the order they were opened.
  #[serde_as(as = "Vec<(_, _)>")]
  sections: IndexMap<SectionPath, Section>,
  /// Sentinel hits in encounter order.
  sentinels: Vec<SentinelHit>
}

impl SectionTree {
  /// An empty tree.
  pub fn new() -> Self {
    return Self::default();
  }

  /// Opens a fresh section at a path. If the path already exists, it and
  /// everything under it is dropped first.
  pub(crate) fn open(&mut self, path: SectionPath, section: Section) {
    if self.sections.contains_key(&path) {
      self.sections.retain(|k, _| !k.starts_with(&path));
    }
    self.sections.insert(path, section);
  }

  /// Appends a data line to an existing (or implicitly created) section.
  pub(crate) fn push_line(&mut self, path: &[SectionKey], line: &str) {
    if !self.sections.contains_key(path) {
      self.sections.insert(path.to_vec(), Section::default());
    }
    if let Some(sec) = self.sections.get_mut(path) {
      sec.lines.push(line.to_string());
    }
  }

  /// Records a sentinel hit.
  pub(crate) fn push_sentinel(&mut self, hit: SentinelHit) {
    self.sentinels.push(hit);
  }

  /// Gets a section by exact path.
  pub fn get(&self, path: &[SectionKey]) -> Option<&Section> {
    return self.sections.get(path);
  }

  /// The lines of a section, empty if it doesn't exist.
  pub fn lines(&self, path: &[SectionKey]) -> &[String] {
    return self.get(path).map(|s| s.lines.as_slice()).unwrap_or_default();
  }

  /// Finds the first section whose path starts with `base` followed by keys
  /// matching every segment of `query`.
  pub fn find(&self, base: &[SectionKey], query: &[Seg]) -> Option<&SectionPath> {
    if query.is_empty() {
      return self.sections.get_key_value(base).map(|(k, _)| k);
    }
    return self.sections.keys().find(|k| {
      k.len() == base.len() + query.len()
        && k.starts_with(base)
        && k[base.len()..].iter().zip(query).all(|(key, q)| q.matches(key))
    });
  }

  /// Direct children of a path, in order.
  pub fn children<'a>(
    &'a self,
    parent: &'a [SectionKey]
  ) -> impl Iterator<Item = (&'a SectionPath, &'a Section)> + 'a {
    return self.sections.iter()
      .filter(move |(k, _)| k.len() == parent.len() + 1 && k.starts_with(parent));
  }

  /// All lines of a section and its descendants, section by section. A
  /// descendant that kept its marker line yields it before its data lines.
  pub fn subtree_lines<'a>(
    &'a self,
    root: &'a [SectionKey]
  ) -> impl Iterator<Item = &'a String> + 'a {
    return self.sections.iter()
      .filter(move |(k, _)| k.starts_with(root))
      .flat_map(move |(k, s)| {
        let header = s.header.as_ref().filter(|_| k.len() > root.len());
        header.into_iter().chain(s.lines.iter())
      });
  }

  /// Every section, in order.
  pub fn iter(&self) -> impl Iterator<Item = (&SectionPath, &Section)> {
    return self.sections.iter();
  }

  /// Number of sections.
  pub fn len(&self) -> usize {
    return self.sections.len();
  }

  /// Whether there are no sections at all.
  pub fn is_empty(&self) -> bool {
    return self.sections.is_empty();
  }

  /// Total number of data lines over all sections.
  pub fn total_lines(&self) -> usize {
    return self.sections.values().map(|s| s.lines.len()).sum();
  }

  /// Number of occurrences of a repeatable top-level section.
  pub fn occurrences(&self, name: &str) -> usize {
    return self.sections.keys()
      .filter(|k| k.len() == 1 && k[0].name == name && k[0].occurrence.is_some())
      .count();
  }

  /// The sentinel hits.
  pub fn sentinels(&self) -> &[SentinelHit] {
    return &self.sentinels;
  }

  /// The last value a sentinel flag was set to.
  pub fn sentinel(&self, flag: &str) -> Option<bool> {
    return self.sentinels.iter().rev().find(|h| h.flag == flag).map(|h| h.value);
  }
}
