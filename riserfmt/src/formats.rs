//! This module implements the list of known file formats. Every format is a
//! configuration of the same engine: a line filter, a section grammar, an
//! extraction schema, and a finaliser for values that depend on several
//! extracted fields at once.

use std::fmt::Display;
use std::path::Path;

use convert_case::{Case, Casing};
use serde::{Deserialize, Serialize};

use crate::grammar::SectionGrammar;
use crate::issues::ParseIssue;
use crate::normalize::LineFilter;
use crate::record::RecordBuilder;
use crate::rules::Schema;
use crate::tree::SectionTree;

pub mod das;
pub mod dpx;
pub mod fatigue;
pub mod mds;
pub mod output;
pub mod shear7;
pub mod shear7_output;
pub mod tab;

use shear7::v410 as shear7_v410;
use shear7::v46 as shear7_v46;

/// Generates the FileFormat enum and dispatches to the format modules.
macro_rules! gen_formats {
  (
    $(
      {
        $desc:literal,
        $fname:ident,
        $module:ident,
        [$($ext:literal),*]
      },
    )*
  ) => {
    /// This contains all the known file formats.
    #[derive(
      Copy, Clone, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd,
      Ord, Hash
    )]
    #[non_exhaustive]
    pub enum FileFormat {
      $(
        #[doc = $desc]
        $fname,
      )*
    }

    impl FileFormat {
      /// Returns all known formats.
      pub const fn all() -> &'static [Self] {
        return &[ $(Self::$fname,)* ];
      }

      /// Returns the description of the format.
      pub const fn desc(&self) -> &'static str {
        return match self {
          $(Self::$fname => $desc,)*
        };
      }

      /// Returns the lower-case file extensions this format is written with.
      pub const fn extensions(&self) -> &'static [&'static str] {
        return match self {
          $(Self::$fname => &[$($ext,)*],)*
        };
      }

      /// Returns the line filter for this format.
      pub const fn filter(&self) -> LineFilter {
        return match self {
          $(Self::$fname => $module::FILTER,)*
        };
      }

      /// Returns the section grammar for this format.
      pub const fn grammar(&self) -> SectionGrammar {
        return match self {
          $(Self::$fname => $module::GRAMMAR,)*
        };
      }

      /// Returns the extraction schema for this format.
      pub const fn schema(&self) -> Schema {
        return match self {
          $(Self::$fname => $module::SCHEMA,)*
        };
      }

      /// Resolves the fields that depend on more than one extracted value.
      pub(crate) fn finish(
        &self,
        rb: &mut RecordBuilder,
        tree: &SectionTree,
        issues: &mut Vec<ParseIssue>
      ) {
        match self {
          $(Self::$fname => $module::finish(rb, tree, issues),)*
        };
      }

      /// Returns the small name of the variant, CamelCase.
      pub const fn short_name(&self) -> &'static str {
        return match self {
          $(Self::$fname => stringify!($fname),)*
        };
      }

      /// Returns the small, snake case name of the variant.
      pub fn snake_case_name(&self) -> String {
        return self.short_name().to_case(Case::Snake);
      }
    }
  }
}

gen_formats!(
  // riser structural input deck
  {
    "Structural analysis input deck",
    Das,
    das,
    ["das"]
  },
  // component configuration
  {
    "Component configuration file",
    Dpx,
    dpx,
    ["dpx"]
  },
  // solver listing
  {
    "Structural solver output",
    SolverOutput,
    output,
    ["out"]
  },
  // shear7 input, current
  {
    "SHEAR7 v4.10 input",
    Shear7Input,
    shear7_v410,
    ["dat"]
  },
  // shear7 input, old
  {
    "SHEAR7 v4.6 input",
    Shear7InputLegacy,
    shear7_v46,
    ["dat"]
  },
  // shear7 listing
  {
    "SHEAR7 output",
    Shear7Output,
    shear7_output,
    ["out"]
  },
  // fatigue listing
  {
    "Fatigue post-processor output",
    FatigueOutput,
    fatigue,
    ["out"]
  },
  // plot exports
  {
    "Tabulated plot export",
    Tab,
    tab,
    ["tab"]
  },
  // common modal shapes
  {
    "Modal shape file",
    ModalShape,
    mds,
    ["mds"]
  },
);

impl FileFormat {
  /// Guesses the format from a file extension. Extensions shared by more
  /// than one format (`.out`, `.dat`) give `None`.
  pub fn from_extension(ext: &str) -> Option<Self> {
    let ext = ext.trim_start_matches('.').to_ascii_lowercase();
    let mut hits = Self::all().iter().filter(|f| f.extensions().contains(&ext.as_str()));
    let first = hits.next()?;
    if hits.next().is_some() {
      return None;
    }
    return Some(*first);
  }

  /// Guesses the format from a path's extension.
  pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
    let ext = path.as_ref().extension()?.to_str()?;
    return Self::from_extension(ext);
  }
}

impl Display for FileFormat {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    return write!(f, "{}", self.desc());
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn names() {
    assert_eq!(FileFormat::Shear7InputLegacy.snake_case_name(), "shear_7_input_legacy");
    assert_eq!(FileFormat::Das.short_name(), "Das");
    assert_eq!(FileFormat::all().len(), 9);
  }

  #[test]
  fn extensions_must_be_unique() {
    assert_eq!(FileFormat::from_extension("DAS"), Some(FileFormat::Das));
    assert_eq!(FileFormat::from_extension(".mds"), Some(FileFormat::ModalShape));
    assert_eq!(FileFormat::from_path("a/b/analysis.tab"), Some(FileFormat::Tab));
    assert_eq!(FileFormat::from_extension("out"), None);
    assert_eq!(FileFormat::from_extension("dat"), None);
    assert_eq!(FileFormat::from_extension("xyz"), None);
  }
}
