//! This module defines section grammars: the declarative description of which
//! lines open sections, how those sections are named, which of them repeat,
//! and which lines carry a row count or a sentinel string.
//!
//! Grammars are plain `const` data so every format can declare its own next to
//! its extraction rules.

use serde::Serialize;

use crate::util::parse_integer;

/// How a marker line is recognised.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum MarkerMatch {
  /// The line starts with this text.
  Prefix(&'static str),
  /// The line contains this text anywhere.
  Contains(&'static str),
  /// The line contains the first text but not the second.
  ContainsUnless(&'static str, &'static str)
}

impl MarkerMatch {
  /// Tests a line.
  pub fn matches(&self, line: &str) -> bool {
    return match self {
      Self::Prefix(p) => line.starts_with(p),
      Self::Contains(p) => line.contains(p),
      Self::ContainsUnless(p, q) => line.contains(p) && !line.contains(q),
    };
  }
}

/// How a section is named from its marker line.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum MarkerName {
  /// The whole (already normalized) line.
  Verbatim,
  /// The line with every occurrence of a delimiter removed, then trimmed.
  StripDelimiter(&'static str),
  /// The text between the first delimiter and the first dot, as in
  /// `*** BLOCK 3. CURRENT DATA ***`.
  BeforeDot(&'static str),
  /// The n-th field when the line is split on double quotes.
  Quoted(usize),
  /// Whatever follows the first occurrence of a char, trimmed.
  AfterChar(char),
  /// A fixed name regardless of the line.
  Fixed(&'static str)
}

impl MarkerName {
  /// Computes the section name for a marker line.
  pub fn resolve(&self, line: &str) -> String {
    return match self {
      Self::Verbatim => line.trim().to_string(),
      Self::StripDelimiter(d) => line.replace(d, "").trim().to_string(),
      Self::BeforeDot(d) => {
        let head = line.split('.').next().unwrap_or_default();
        head.split(d).nth(1).unwrap_or_default().trim().to_string()
      },
      Self::Quoted(n) => {
        line.split('"').nth(*n).unwrap_or_default().trim().to_string()
      },
      Self::AfterChar(c) => match line.split_once(*c) {
        Some((_, rest)) => rest.trim().to_string(),
        None => String::new()
      },
      Self::Fixed(name) => name.to_string(),
    };
  }
}

/// A marker: a way to recognise a line and a way to name its section.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MarkerRule {
  /// The recogniser.
  pub matcher: MarkerMatch,
  /// The naming policy.
  pub name: MarkerName
}

/// One nesting level of a grammar.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LevelSpec {
  /// The markers that open a section at this level.
  pub markers: &'static [MarkerRule],
  /// Section names that are occurrence-counted instead of re-initialized.
  pub repeatable: &'static [&'static str],
  /// Keep the marker line itself as section metadata.
  pub keep_header: bool,
  /// If set, an empty or duplicate name under the same parent is replaced by
  /// this prefix and a per-parent counter, e.g. `Series 2`.
  pub untitled: Option<&'static str>
}

impl LevelSpec {
  /// A level with a single marker and no extras.
  pub const fn simple(markers: &'static [MarkerRule]) -> Self {
    return Self {
      markers,
      repeatable: &[],
      keep_header: false,
      untitled: None
    };
  }

  /// Whether a section name is occurrence-counted at this level.
  pub fn is_repeatable(&self, name: &str) -> bool {
    return self.repeatable.contains(&name);
  }
}

/// Declares that a given data line of a section holds a row count. The rows
/// that follow are appended verbatim, even if they look like markers.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CountDeclaration {
  /// The name of the section holding the count.
  pub section: &'static str,
  /// The 0-based data line within the section holding the count.
  pub line: usize,
  /// The whitespace-separated token of that line holding the count.
  pub token: usize,
  /// How many physical lines each counted item spans.
  pub lines_per_item: usize
}

impl CountDeclaration {
  /// Reads the count off a line. Tokens like `3,` count as 3.
  pub fn count_in(&self, line: &str) -> Option<usize> {
    let tok = line.split_whitespace().nth(self.token)?;
    let tok = tok.split(',').next()?;
    let n = parse_integer(tok)?;
    return num::ToPrimitive::to_usize(&n);
  }

  /// How many lines are protected for a count. Absurd counts protect the
  /// rest of the file.
  pub fn span(&self, count: usize) -> usize {
    return count.checked_mul(self.lines_per_item).unwrap_or(usize::MAX);
  }
}

/// A string whose presence anywhere in a file sets a flag.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SentinelRule {
  /// The text to look for.
  pub pattern: &'static str,
  /// Compare case-insensitively.
  pub ignore_case: bool,
  /// The flag it sets.
  pub flag: &'static str,
  /// The value it sets the flag to.
  pub value: bool
}

impl SentinelRule {
  /// Tests a line.
  pub fn matches(&self, line: &str) -> bool {
    if self.ignore_case {
      return line.to_lowercase().contains(&self.pattern.to_lowercase());
    }
    return line.contains(self.pattern);
  }
}

/// A whole grammar: the levels, shallowest first, plus count declarations and
/// sentinels.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SectionGrammar {
  /// The levels, shallowest first.
  pub levels: &'static [LevelSpec],
  /// Declared row counts.
  pub counts: &'static [CountDeclaration],
  /// Sentinel strings.
  pub sentinels: &'static [SentinelRule]
}

impl SectionGrammar {
  /// A grammar with no markers at all: everything lands in `headers`.
  pub const FLAT: Self = Self { levels: &[], counts: &[], sentinels: &[] };

  /// Finds the shallowest marker matching a line, returning its level and the
  /// raw section name.
  pub fn detect(&self, line: &str) -> Option<(usize, String)> {
    for (depth, level) in self.levels.iter().enumerate() {
      if let Some(m) = level.markers.iter().find(|m| m.matcher.matches(line)) {
        return Some((depth, m.name.resolve(line)));
      }
    }
    return None;
  }

  /// Finds the count declaration that applies to a data line, if any.
  pub fn count_for(
    &self,
    section: &str,
    line_index: usize
  ) -> Option<&CountDeclaration> {
    return self.counts.iter()
      .find(|c| c.section == section && c.line == line_index);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn marker_names() {
    let blk = MarkerName::BeforeDot("***");
    assert_eq!(blk.resolve("*** BLOCK 3. CURRENT DATA ***"), "BLOCK 3");
    let strip = MarkerName::StripDelimiter("***");
    assert_eq!(strip.resolve(" *** NODAL DATA *** "), "NODAL DATA");
    let quoted = MarkerName::Quoted(1);
    assert_eq!(quoted.resolve("<component \"Riser A\" \"12\" \"Joint\">"), "Riser A");
    assert_eq!(MarkerName::AfterChar(':').resolve("Plot Data:  "), "");
  }

  #[test]
  fn shallowest_level_wins() {
    const G: SectionGrammar = SectionGrammar {
      levels: &[
        LevelSpec::simple(&[MarkerRule {
          matcher: MarkerMatch::Prefix("$"),
          name: MarkerName::Verbatim
        }]),
        LevelSpec::simple(&[MarkerRule {
          matcher: MarkerMatch::Contains("$"),
          name: MarkerName::Verbatim
        }]),
      ],
      counts: &[],
      sentinels: &[]
    };
    assert_eq!(G.detect("$MODEL"), Some((0, "$MODEL".to_string())));
    assert_eq!(G.detect("*A $B"), Some((1, "*A $B".to_string())));
    assert_eq!(G.detect("1, 2, 3"), None);
  }

  #[test]
  fn counts_tolerate_trailing_commas() {
    let c = CountDeclaration {
      section: "BLOCK 3",
      line: 0,
      token: 0,
      lines_per_item: 1
    };
    assert_eq!(c.count_in("3, number of current points"), Some(3));
    assert_eq!(c.count_in("three"), None);
    assert_eq!(c.count_in("-1"), None);
  }
}
