//! This module defines what a calculator is and how it fails.

use std::error::Error;
use std::fmt::Display;

use riserfmt::record::{MissingFieldError, Record};

/// This is the kind of error a calculator can return.
#[derive(Debug, Clone, PartialEq, derive_more::From)]
pub enum CalcError {
  /// A required field is absent, null, or of the wrong kind.
  Missing(MissingFieldError),
  /// Something looked up by name or number isn't in the record.
  #[from(ignore)]
  NotFound {
    /// What was being looked for.
    what: &'static str,
    /// The name or number used.
    key: String
  },
  /// The inputs are there but can't produce a result.
  #[from(ignore)]
  Invalid {
    /// The field or parameter at fault.
    field: String,
    /// Why.
    reason: String
  }
}

impl CalcError {
  /// Shorthand for an invalid input.
  pub fn invalid<F: Into<String>, R: Into<String>>(field: F, reason: R) -> Self {
    return Self::Invalid { field: field.into(), reason: reason.into() };
  }

  /// Shorthand for a failed lookup.
  pub fn not_found<K: Display>(what: &'static str, key: K) -> Self {
    return Self::NotFound { what, key: key.to_string() };
  }
}

impl Display for CalcError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    return match self {
      Self::Missing(e) => write!(f, "{}", e),
      Self::NotFound { what, key } => write!(f, "no {} \"{}\"", what, key),
      Self::Invalid { field, reason } => write!(f, "bad \"{}\": {}", field, reason),
    };
  }
}

impl Error for CalcError {
  fn source(&self) -> Option<&(dyn Error + 'static)> {
    return match self {
      Self::Missing(e) => Some(e),
      _ => None
    };
  }
}

/// A derived-value calculator. It declares the paths it needs, and those are
/// checked before it runs.
pub trait Calculator: Send + Sync {
  /// A short name, for logs and failure reports.
  fn name(&self) -> &str;

  /// Paths that must be present and non-null.
  fn requires(&self) -> &[&str] {
    return &[];
  }

  /// Builds the derived fields from a record.
  fn compute(&self, rec: &Record) -> Result<Record, CalcError>;

  /// Checks the requirements, then computes.
  fn run(&self, rec: &Record) -> Result<Record, CalcError> {
    for path in self.requires() {
      rec.require(path)?;
    }
    return self.compute(rec);
  }
}

/// Rounds like the reports do.
pub(crate) fn round(x: f64, places: u32) -> f64 {
  return riserfmt::util::round_to(x, places);
}

/// The records of a list field, skipping anything that isn't one.
pub(crate) fn rows<'r>(rec: &'r Record, path: &str) -> impl Iterator<Item = &'r Record> {
  return rec.list(path)
    .unwrap_or_default()
    .iter()
    .filter_map(|v| v.as_record());
}

#[cfg(test)]
mod tests {
  use riserfmt::prelude::*;
  use super::*;

  struct Double;

  impl Calculator for Double {
    fn name(&self) -> &str {
      return "double";
    }

    fn requires(&self) -> &[&str] {
      return &["x"];
    }

    fn compute(&self, rec: &Record) -> Result<Record, CalcError> {
      let mut rb = RecordBuilder::new();
      rb.set("y", rec.require_real("x")? * 2.0);
      return Ok(rb.build());
    }
  }

  #[test]
  fn requirements_are_checked_first() {
    let mut rb = RecordBuilder::new();
    rb.set_null("x");
    let err = Double.run(&rb.build()).unwrap_err();
    assert_eq!(err, CalcError::Missing(MissingFieldError::absent("x")));
    assert_eq!(err.to_string(), "field \"x\" is missing");
    let mut rb = RecordBuilder::new();
    rb.set("x", 2.5);
    assert_eq!(Double.run(&rb.build()).unwrap().real("y"), Some(5.0));
  }

  #[test]
  fn wrong_kinds_are_missing_too() {
    let mut rb = RecordBuilder::new();
    rb.set("x", "two");
    let err = Double.run(&rb.build()).unwrap_err();
    assert!(matches!(err, CalcError::Missing(MissingFieldError { found: Some("text"), .. })));
  }
}
