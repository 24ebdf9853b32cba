//! This module implements the calculator pipeline: stages run in order, each
//! one over the base record with the earlier outputs merged in.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use riserfmt::record::Record;

use crate::calculator::{CalcError, Calculator};

/// An ordered list of calculators.
#[derive(Default)]
pub struct Pipeline {
  /// The stages, in run order.
  stages: Vec<Box<dyn Calculator>>
}

/// What a pipeline run produced.
#[derive(Debug, Clone)]
pub struct PipelineRun {
  /// The base record with every successful output merged in.
  pub record: Record,
  /// The stages that failed, by name, in run order.
  pub failures: Vec<(String, CalcError)>
}

/// A summary of a failed stage, for reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageFailure {
  /// The stage name.
  pub stage: String,
  /// What went wrong.
  pub reason: String
}

impl PipelineRun {
  /// Whether every stage succeeded.
  pub fn is_clean(&self) -> bool {
    return self.failures.is_empty();
  }

  /// The failures as plain text.
  pub fn failure_report(&self) -> Vec<StageFailure> {
    return self.failures.iter()
      .map(|(stage, e)| StageFailure { stage: stage.clone(), reason: e.to_string() })
      .collect();
  }
}

impl Pipeline {
  /// An empty pipeline.
  pub fn new() -> Self {
    return Self::default();
  }

  /// Adds a stage at the end.
  pub fn stage<C: Calculator + 'static>(mut self, calc: C) -> Self {
    self.stages.push(Box::new(calc));
    return self;
  }

  /// The number of stages.
  pub fn len(&self) -> usize {
    return self.stages.len();
  }

  /// Whether there are no stages.
  pub fn is_empty(&self) -> bool {
    return self.stages.is_empty();
  }

  /// Runs every stage. A failed stage contributes nothing, but later stages
  /// still run.
  pub fn run(&self, base: &Record) -> PipelineRun {
    let mut record = base.clone();
    let mut failures = Vec::new();
    for calc in &self.stages {
      match calc.run(&record) {
        Ok(out) => {
          debug!("Stage \"{}\" produced {} fields.", calc.name(), out.len());
          record = record.merged(&out);
        },
        Err(e) => {
          warn!("Stage \"{}\" failed: {}", calc.name(), e);
          failures.push((calc.name().to_string(), e));
        }
      }
    }
    return PipelineRun { record, failures };
  }
}
