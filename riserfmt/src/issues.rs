//! This module defines the recoverable problems a parse can run into. None of
//! them stop a parse: they are collected in encounter order and handed to the
//! caller along with the best-effort record.

use std::error::Error;
use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Why a token could not be turned into a field value.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MalformedReason {
  /// Expected a real number.
  NotReal,
  /// Expected an integer.
  NotInteger,
  /// Expected a yes/no flag.
  NotFlag,
  /// The line had fewer columns than the field needed.
  MissingColumn,
  /// The line the rule points at doesn't exist.
  MissingLine,
  /// A declared row count was not a usable number.
  BadCount,
  /// A row referred to a key nothing declared.
  UnknownKey
}

impl Display for MalformedReason {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    return write!(f, "{}", match self {
      Self::NotReal => "not a real number",
      Self::NotInteger => "not an integer",
      Self::NotFlag => "not a yes/no flag",
      Self::MissingColumn => "missing column",
      Self::MissingLine => "missing line",
      Self::BadCount => "bad row count",
      Self::UnknownKey => "unknown key",
    });
  }
}

/// A problem found while extracting fields. The parse carries on regardless.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ParseIssue {
  /// A section a rule expected was absent; its fields were left null.
  SectionNotFound {
    /// The section path, as text.
    section: String
  },
  /// A token was unusable for the field it feeds; the field was left null.
  MalformedField {
    /// The section path, as text.
    section: String,
    /// The field name.
    field: String,
    /// The offending token.
    token: String,
    /// What was wrong with it.
    reason: MalformedReason
  },
  /// A rule declared to fail hard hit a bad token and produced nothing more.
  RuleAborted {
    /// The section path, as text.
    section: String,
    /// The field that triggered it.
    field: String,
    /// The offending token.
    token: String
  },
  /// A physical line was not valid UTF-8. It was kept, with the bad bytes
  /// replaced by U+FFFD.
  InvalidEncoding {
    /// The 1-based line number in the file.
    line: usize
  },
  /// A value the format requires could not be resolved at all.
  Unresolved {
    /// The field name.
    field: String,
    /// A short human description.
    reason: String
  }
}

impl ParseIssue {
  /// Appends the issue to a sink. Issues are logged once the parse is done.
  pub fn report(self, sink: &mut Vec<ParseIssue>) {
    sink.push(self);
  }

  /// The field this issue is about, if it is about one.
  pub fn field(&self) -> Option<&str> {
    return match self {
      Self::SectionNotFound { .. } => None,
      Self::InvalidEncoding { .. } => None,
      Self::MalformedField { field, .. } => Some(field),
      Self::RuleAborted { field, .. } => Some(field),
      Self::Unresolved { field, .. } => Some(field),
    };
  }
}

impl Display for ParseIssue {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    return match self {
      Self::SectionNotFound { section } => {
        write!(f, "section \"{}\" not found", section)
      },
      Self::MalformedField { section, field, token, reason } => write!(
        f,
        "malformed field \"{}\" in \"{}\": \"{}\" ({})",
        field, section, token, reason
      ),
      Self::RuleAborted { section, field, token } => write!(
        f,
        "extraction of \"{}\" in \"{}\" aborted at \"{}\"",
        field, section, token
      ),
      Self::InvalidEncoding { line } => {
        write!(f, "line {} is not valid UTF-8", line)
      },
      Self::Unresolved { field, reason } => {
        write!(f, "could not resolve \"{}\": {}", field, reason)
      }
    };
  }
}

impl Error for ParseIssue {}
