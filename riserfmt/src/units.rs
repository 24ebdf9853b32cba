//! This module deals with the unit systems riser files are written in.

use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::record::{MissingFieldError, Record};

/// The record field every format resolves its unit system into.
pub const UNIT_SYSTEM_FIELD: &str = "unit_system";

/// A unit system.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitSystem {
  /// Feet, kips, psi.
  Imperial,
  /// Metres, kN, Pa.
  Metric
}

impl UnitSystem {
  /// The name stored in records.
  pub const fn name(&self) -> &'static str {
    return match self {
      Self::Imperial => "imperial",
      Self::Metric => "metric",
    };
  }

  /// The length unit.
  pub const fn length_unit(&self) -> &'static str {
    return match self {
      Self::Imperial => "ft",
      Self::Metric => "m",
    };
  }

  /// Reads the unit system off a record.
  pub fn of(rec: &Record) -> Result<Self, MissingFieldError> {
    let text = rec.require_text(UNIT_SYSTEM_FIELD)?;
    return text.parse().map_err(|_| MissingFieldError {
      field: UNIT_SYSTEM_FIELD.to_string(),
      found: Some("text")
    });
  }
}

impl Display for UnitSystem {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    return write!(f, "{}", self.name());
  }
}

impl FromStr for UnitSystem {
  type Err = ();

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("imperial") {
      return Ok(Self::Imperial);
    }
    if s.eq_ignore_ascii_case("metric") {
      return Ok(Self::Metric);
    }
    return Err(());
  }
}
