//! Report sink trait
//!
//! Lets the engine emit progress without depending on a particular
//! console or log file implementation.

use crate::orchestrator::RunReport;
use crate::types::{EntityOutcome, StepOutcome};

/// Receiver for reconciliation progress
///
/// Per-entity events may arrive from several worker threads at once,
/// so implementations take `&self` and must be `Sync`.
pub trait ReportSink: Sync {
    /// Called once before the first step
    fn on_run_start(&self, _total_steps: usize) {}

    /// Called before a step's reconciler is built
    fn on_step_start(&self, _index: usize, _total: usize, _label: &str) {}

    /// Called after both sides of a collection have been listed
    fn on_listed(&self, _collection: &str, _source: usize, _destination: usize) {}

    /// Called when a single entity has been reconciled
    fn on_entity(&self, _collection: &str, _name: &str, _outcome: &EntityOutcome) {}

    /// Called when a step finishes (or is skipped)
    fn on_step_complete(&self, _index: usize, _label: &str, _outcome: &StepOutcome) {}

    /// Called once after the last step
    fn on_run_complete(&self, _report: &RunReport) {}
}

/// No-op report sink
pub struct NoReport;

impl ReportSink for NoReport {}
