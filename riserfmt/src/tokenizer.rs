//! This module implements the one-pass section tokenizer. It doesn't care how
//! lines are fed into it: it assigns each one to exactly one section according
//! to a grammar and builds the section tree as it goes.

use std::collections::HashMap;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::grammar::SectionGrammar;
use crate::tree::*;

/// What the tokenizer did with a line.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum TokenizerResponse {
  /// The line was appended to the innermost open section.
  Data,
  /// The line was appended verbatim as part of a counted region.
  Counted,
  /// The line was a marker and opened a new section.
  Opened(SectionKey),
  /// The line was a marker for a section that already existed, which was
  /// re-initialized.
  Reopened(SectionKey)
}

/// The tokenizer. One-pass, single-thread.
pub struct OnePassTokenizer {
  /// The grammar driving it.
  grammar: SectionGrammar,
  /// The tree being built.
  tree: SectionTree,
  /// The path of the innermost open section.
  open: SectionPath,
  /// Occurrence counters, per parent path and section name.
  occurrences: HashMap<(SectionPath, String), usize>,
  /// Counters for auto-named sections, per parent path.
  untitled: HashMap<SectionPath, usize>,
  /// Lines still protected by a count declaration.
  protected: usize,
  /// The total number of consumed lines.
  total_lines: usize
}

impl OnePassTokenizer {
  /// Instantiates a new tokenizer for a grammar.
  pub fn new(grammar: SectionGrammar) -> Self {
    return Self {
      grammar,
      tree: SectionTree::new(),
      open: Vec::new(),
      occurrences: HashMap::new(),
      untitled: HashMap::new(),
      protected: 0,
      total_lines: 0
    };
  }

  /// The number of lines consumed so far.
  pub fn total_lines(&self) -> usize {
    return self.total_lines;
  }

  /// Makes sure a path exists in the tree without touching its lines.
  fn ensure(&mut self, path: &[SectionKey]) {
    for depth in 1..=path.len() {
      if self.tree.get(&path[..depth]).is_none() {
        self.tree.open(path[..depth].to_vec(), Section::default());
      }
    }
  }

  /// Opens the section for a marker line.
  fn open_section(
    &mut self,
    level: usize,
    raw_name: String,
    line: &str
  ) -> TokenizerResponse {
    let spec = self.grammar.levels[level];
    let mut parent: SectionPath = self.open.iter().take(level).cloned().collect();
    while parent.len() < level {
      parent.push(SectionKey::named(HEADERS));
    }
    self.ensure(&parent);
    let mut name = raw_name;
    if let Some(prefix) = spec.untitled {
      let mut candidate = parent.clone();
      candidate.push(SectionKey::named(name.as_str()));
      if name.is_empty() || self.tree.get(&candidate).is_some() {
        let counter = self.untitled.entry(parent.clone()).or_insert(0);
        *counter += 1;
        name = format!("{} {}", prefix, counter);
      }
    }
    let key = if spec.is_repeatable(&name) {
      let counter = self.occurrences
        .entry((parent.clone(), name.clone()))
        .or_insert(0);
      *counter += 1;
      SectionKey::nth(name, *counter)
    } else {
      SectionKey::named(name)
    };
    let mut path = parent;
    path.push(key.clone());
    let existed = self.tree.get(&path).is_some();
    if existed {
      // the old subtree goes away, and so do the counters under it
      self.untitled.retain(|p, _| !p.starts_with(&path));
      self.occurrences.retain(|(p, _), _| !p.starts_with(&path));
    }
    let section = Section {
      header: spec.keep_header.then(|| line.to_string()),
      line_no: self.total_lines,
      lines: Vec::new()
    };
    self.tree.open(path.clone(), section);
    debug!(
      "Opened section \"{}\" on line {}.",
      path_string(&path),
      self.total_lines
    );
    self.open = path;
    if existed {
      return TokenizerResponse::Reopened(key);
    }
    return TokenizerResponse::Opened(key);
  }

  /// Appends a data line to the innermost open section and arms a counted
  /// region if the line declares one.
  fn append(&mut self, line: &str) -> TokenizerResponse {
    if self.open.is_empty() {
      self.open.push(SectionKey::named(HEADERS));
    }
    self.tree.push_line(&self.open, line);
    let index = self.tree.lines(&self.open).len() - 1;
    let name = self.open.last().map(|k| k.name.as_str()).unwrap_or(HEADERS);
    if let Some(decl) = self.grammar.count_for(name, index) {
      match decl.count_in(line) {
        Some(n) => {
          self.protected = decl.span(n);
          debug!(
            "Line {} declares {} counted lines in \"{}\".",
            self.total_lines,
            self.protected,
            name
          );
        },
        None => debug!(
          "Line {} should declare a count in \"{}\" but doesn't.",
          self.total_lines,
          name
        )
      }
    }
    return TokenizerResponse::Data;
  }

  /// Consumes a line into the tokenizer.
  pub fn consume(&mut self, line: &str) -> TokenizerResponse {
    self.total_lines += 1;
    for sentinel in self.grammar.sentinels {
      if sentinel.matches(line) {
        debug!(
          "Sentinel \"{}\" sets {} = {} on line {}.",
          sentinel.pattern,
          sentinel.flag,
          sentinel.value,
          self.total_lines
        );
        self.tree.push_sentinel(SentinelHit {
          flag: sentinel.flag.to_string(),
          value: sentinel.value,
          line_no: self.total_lines
        });
      }
    }
    if self.protected > 0 {
      self.protected -= 1;
      if self.open.is_empty() {
        self.open.push(SectionKey::named(HEADERS));
      }
      self.tree.push_line(&self.open, line);
      return TokenizerResponse::Counted;
    }
    if let Some((level, name)) = self.grammar.detect(line) {
      return self.open_section(level, name, line);
    }
    return self.append(line);
  }

  /// Finishes up and returns the tree.
  pub fn finish(self) -> SectionTree {
    return self.tree;
  }

  /// Tokenizes a whole sequence of lines.
  pub fn tokenize<I, S>(grammar: SectionGrammar, lines: I) -> SectionTree
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>
  {
    let mut tok = Self::new(grammar);
    for line in lines {
      tok.consume(line.as_ref());
    }
    return tok.finish();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::grammar::*;

  const DOLLAR_STAR: SectionGrammar = SectionGrammar {
    levels: &[
      LevelSpec {
        markers: &[MarkerRule {
          matcher: MarkerMatch::Prefix("$"),
          name: MarkerName::Verbatim
        }],
        repeatable: &["$MODEL", "$LOAD CASE"],
        keep_header: false,
        untitled: None
      },
      LevelSpec::simple(&[MarkerRule {
        matcher: MarkerMatch::Prefix("*"),
        name: MarkerName::Verbatim
      }]),
    ],
    counts: &[CountDeclaration {
      section: "*TABLE",
      line: 0,
      token: 0,
      lines_per_item: 1
    }],
    sentinels: &[]
  };

  #[test]
  fn occurrences_are_counted() {
    let lines = [
      "$MODEL", "*NODE", "1", "$LOAD CASE", "*WAVE", "a",
      "$LOAD CASE", "*WAVE", "b", "$MODEL", "*NODE", "2",
    ];
    let tree = OnePassTokenizer::tokenize(DOLLAR_STAR, lines);
    assert_eq!(tree.occurrences("$LOAD CASE"), 2);
    assert_eq!(tree.occurrences("$MODEL"), 2);
    let wave2 = [SectionKey::nth("$LOAD CASE", 2), SectionKey::named("*WAVE")];
    assert_eq!(tree.lines(&wave2), ["b"]);
    let node2 = [SectionKey::nth("$MODEL", 2), SectionKey::named("*NODE")];
    assert_eq!(tree.lines(&node2), ["2"]);
  }

  #[test]
  fn leading_lines_go_to_headers() {
    let tree = OnePassTokenizer::tokenize(DOLLAR_STAR, ["x", "*UNITS", "y"]);
    assert_eq!(tree.lines(&[SectionKey::named(HEADERS)]), ["x"]);
    let units = [SectionKey::named(HEADERS), SectionKey::named("*UNITS")];
    assert_eq!(tree.lines(&units), ["y"]);
  }

  #[test]
  fn repeated_plain_marker_reinitializes() {
    let lines = ["$ANALYSIS", "*UNITS", "a", "$ANALYSIS", "b"];
    let tree = OnePassTokenizer::tokenize(DOLLAR_STAR, lines);
    assert_eq!(tree.lines(&[SectionKey::named("$ANALYSIS")]), ["b"]);
    let units = [SectionKey::named("$ANALYSIS"), SectionKey::named("*UNITS")];
    assert!(tree.get(&units).is_none());
  }

  #[test]
  fn counted_rows_hide_markers() {
    let lines = ["*TABLE", "2 rows", "$NOT A MARKER", "*NOR THIS", "*AFTER", "z"];
    let tree = OnePassTokenizer::tokenize(DOLLAR_STAR, lines);
    let table = [SectionKey::named(HEADERS), SectionKey::named("*TABLE")];
    assert_eq!(tree.lines(&table), ["2 rows", "$NOT A MARKER", "*NOR THIS"]);
    let after = [SectionKey::named(HEADERS), SectionKey::named("*AFTER")];
    assert_eq!(tree.lines(&after), ["z"]);
  }

  #[test]
  fn untitled_sections_get_numbered() {
    const TAB: SectionGrammar = SectionGrammar {
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
    let lines = [
      "Table No. 1 - Tension", "Plot Data:", "1\t2", "Plot Data:", "3\t4",
      "Plot Data: Max", "Plot Data: Max",
    ];
    let tree = OnePassTokenizer::tokenize(TAB, lines);
    let table = SectionKey::named("Table No. 1 - Tension");
    let names = tree.children(std::slice::from_ref(&table))
      .map(|(p, _)| p[1].name.clone())
      .collect::<Vec<_>>();
    assert_eq!(names, ["Series 1", "Series 2", "Max", "Series 3"]);
    let header = tree.get(std::slice::from_ref(&table)).unwrap().header.clone();
    assert_eq!(header.as_deref(), Some("Table No. 1 - Tension"));
  }
}
