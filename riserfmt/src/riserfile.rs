//! This module implements the parsed form of a riser file and the entry points
//! that produce it: text, a reader, or a path.

use std::io::{self, BufRead};
use std::path::Path;

use itertools::Itertools;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::extractor::FieldExtractor;
use crate::formats::FileFormat;
use crate::issues::ParseIssue;
use crate::normalize::{FilteredLines, LineSource, normalize_text};
use crate::record::{Record, RecordBuilder};
use crate::tokenizer::OnePassTokenizer;
use crate::tree::SectionTree;

/// This is the output of parsing one file: its section tree, the record
/// extracted from it, and every issue found along the way.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RiserFile {
  /// The format it was read as.
  pub format: FileFormat,
  /// The file name, if it came from a file.
  pub filename: Option<String>,
  /// The sections.
  tree: SectionTree,
  /// The extracted fields.
  record: Record,
  /// Recoverable problems, in encounter order.
  issues: Vec<ParseIssue>
}

impl RiserFile {
  /// The section tree.
  pub fn tree(&self) -> &SectionTree {
    return &self.tree;
  }

  /// The extracted record.
  pub fn record(&self) -> &Record {
    return &self.record;
  }

  /// The issues found while extracting.
  pub fn issues(&self) -> &[ParseIssue] {
    return &self.issues;
  }

  /// Takes the record out, dropping everything else.
  pub fn into_record(self) -> Record {
    return self.record;
  }

  /// Runs the engine over lines that already went through the format's
  /// filter.
  pub fn parse_lines<I, S>(lines: I, format: FileFormat) -> Self
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>
  {
    return Self::parse_with(lines, format, Vec::new());
  }

  /// Runs the engine, after any issues found while reading. The full issue
  /// list is logged once extraction is over.
  fn parse_with<I, S>(lines: I, format: FileFormat, mut issues: Vec<ParseIssue>) -> Self
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>
  {
    let tree = OnePassTokenizer::tokenize(format.grammar(), lines);
    debug!(
      "Tokenized {} lines into {} sections as {}.",
      tree.total_lines(),
      tree.len(),
      format
    );
    let mut rb = RecordBuilder::new();
    let mut ex = FieldExtractor::new(&tree);
    ex.extract_into(&format.schema(), &mut rb);
    issues.extend(ex.finish());
    format.finish(&mut rb, &tree, &mut issues);
    if !issues.is_empty() {
      warn!(
        "Parsing as {} found {} issue(s): {}",
        format,
        issues.len(),
        issues.iter().join("; ")
      );
    }
    return Self {
      format,
      filename: None,
      record: rb.build(),
      tree,
      issues
    };
  }

  /// Turns line numbers that needed replacement characters into issues.
  fn encoding_issues(replaced: &[usize]) -> Vec<ParseIssue> {
    return replaced.iter()
      .map(|&line| ParseIssue::InvalidEncoding { line })
      .collect();
  }

  /// Parses text already in memory.
  pub fn parse_str(text: &str, format: FileFormat) -> Self {
    return Self::parse_lines(normalize_text(text, &format.filter()), format);
  }

  /// Parses from a BufRead instance. Lines that are not UTF-8 are kept with
  /// replacement characters and reported.
  pub fn parse_bufread<R: BufRead>(reader: R, format: FileFormat) -> io::Result<Self> {
    let mut lines = FilteredLines::new(reader, format.filter());
    let kept = lines.by_ref().collect::<io::Result<Vec<_>>>()?;
    let issues = Self::encoding_issues(lines.replaced());
    return Ok(Self::parse_with(kept, format, issues));
  }

  /// Utility method -- reads and parses a file. A missing or unreadable file
  /// is the only way this fails.
  pub fn parse_file<P: AsRef<Path>>(path: P, format: FileFormat) -> io::Result<Self> {
    let source = LineSource::open(path.as_ref(), format.filter())?;
    let (lines, replaced) = source.read_lossy()?;
    let mut file = Self::parse_with(lines, format, Self::encoding_issues(&replaced));
    file.filename = path.as_ref().file_name()
      .and_then(|s| s.to_str())
      .map(String::from);
    return Ok(file);
  }
}
