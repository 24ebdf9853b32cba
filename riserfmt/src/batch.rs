//! This module implements batch parsing: many explicitly listed files of one
//! format, parsed in parallel, with cooperative cancellation between files.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use log::{debug, info};
use rayon::prelude::*;

use crate::formats::FileFormat;
use crate::riserfile::RiserFile;

/// What happened to one file of a batch.
#[derive(Debug)]
pub enum BatchOutcome {
  /// It was parsed (possibly with issues).
  Parsed(Box<RiserFile>),
  /// It could not be read.
  Failed(io::Error),
  /// Cancellation was requested before its turn came.
  Cancelled
}

impl BatchOutcome {
  /// The parsed file, if any.
  pub fn parsed(&self) -> Option<&RiserFile> {
    return match self {
      Self::Parsed(f) => Some(f),
      _ => None
    };
  }

  /// Whether the file was skipped.
  pub fn is_cancelled(&self) -> bool {
    return matches!(self, Self::Cancelled);
  }
}

/// Parses files in parallel. The cancel flag is checked before each file
/// starts; files already being parsed run to completion. Outcomes come back
/// in the order of `paths`.
pub fn parse_many<P>(
  paths: &[P],
  format: FileFormat,
  cancel: &AtomicBool
) -> Vec<(PathBuf, BatchOutcome)>
where
  P: AsRef<Path> + Sync
{
  let relaxed = Ordering::Relaxed;
  let done = AtomicUsize::new(0);
  info!("Parsing {} files as {}.", paths.len(), format);
  let outcomes = paths.par_iter()
    .map(|p| {
      let path = p.as_ref().to_path_buf();
      if cancel.load(relaxed) {
        debug!("Skipping {}, batch cancelled.", path.display());
        return (path, BatchOutcome::Cancelled);
      }
      let outcome = match RiserFile::parse_file(&path, format) {
        Ok(f) => BatchOutcome::Parsed(Box::new(f)),
        Err(e) => BatchOutcome::Failed(e)
      };
      let n = done.fetch_add(1, relaxed) + 1;
      debug!("Batch file {} of {} done: {}.", n, paths.len(), path.display());
      return (path, outcome);
    })
    .collect::<Vec<_>>();
  info!("Batch finished, {} of {} files processed.", done.load(relaxed), paths.len());
  return outcomes;
}
