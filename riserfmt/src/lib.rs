//! This library implements types and functions to parse the loosely-structured
//! plain-text files written by offshore riser-analysis software: structural
//! input decks, component configuration files, solver output, SHEAR7 modal
//! VIV input/output, fatigue output, tabulated plot exports and modal shape
//! files.
//!
//! Every reader is the same engine configured differently: lines go through a
//! normalizer, a one-pass tokenizer splits them into nested sections keyed by
//! textual markers, and a field extractor applies declarative rules to build
//! an immutable record. Supporting another "family" of files is a matter of
//! writing a grammar and a schema in `formats`.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]
#![allow(clippy::needless_return)]

pub mod batch;
pub mod extractor;
pub mod formats;
pub mod grammar;
pub mod issues;
pub mod normalize;
pub mod record;
pub mod riserfile;
pub mod rules;
pub mod tokenizer;
pub mod tree;
pub mod units;
pub mod util;

pub mod prelude {
  //! The prelude exports the types most consumers of the library need.
  pub use crate::batch::{BatchOutcome, parse_many};
  pub use crate::extractor::{FieldExtractor, RuleContext, SectionDecoder};
  pub use crate::formats::FileFormat;
  pub use crate::grammar::*;
  pub use crate::issues::*;
  pub use crate::normalize::{FilteredLines, LineFilter, LineSource, normalize_text};
  pub use crate::record::*;
  pub use crate::riserfile::RiserFile;
  pub use crate::rules::*;
  pub use crate::tokenizer::{OnePassTokenizer, TokenizerResponse};
  pub use crate::tree::*;
  pub use crate::units::{UNIT_SYSTEM_FIELD, UnitSystem};
}
