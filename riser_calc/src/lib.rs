//! This library implements derived-value calculators over the records parsed
//! by `riserfmt`: summaries, statistics, interpolated tables and lookups that
//! engineers usually compute by hand from an analysis file.
//!
//! Every calculator reads a record and builds a new one; nothing is mutated.
//! A `Pipeline` runs several of them in order, feeding each stage the base
//! record with the outputs of the previous stages laid over it.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]
#![allow(clippy::needless_return)]

pub mod calculator;
pub mod das;
pub mod dpx;
pub mod interp;
pub mod output;
pub mod pipeline;
pub mod shear7;
pub mod tab;

pub use calculator::{CalcError, Calculator};
pub use pipeline::{Pipeline, PipelineRun};

pub mod prelude {
  //! The prelude exports the calculators and the pipeline.
  pub use crate::calculator::*;
  pub use crate::das::*;
  pub use crate::dpx::*;
  pub use crate::output::*;
  pub use crate::pipeline::*;
  pub use crate::shear7::*;
  pub use crate::tab::*;
}
