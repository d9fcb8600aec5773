//! Orchestrator - runs category steps in a fixed order

use crate::reconciler::Reconciler;
use crate::report::ReportSink;
use crate::types::{FailurePolicy, StepOutcome};

/// Builds a step's reconciler from the run context
pub type BuildFn<C> = for<'a> fn(&'a C) -> Box<dyn Reconciler + 'a>;

/// One entry of the step table
pub struct Step<C> {
    /// Selection key (e.g. "transforms")
    pub key: &'static str,
    /// Display label (e.g. "Transforms")
    pub label: &'static str,
    pub build: BuildFn<C>,
}

/// Outcome of one step in a finished run
#[derive(Debug)]
pub struct StepRecord {
    /// 1-based position in the step table
    pub index: usize,
    pub label: &'static str,
    pub outcome: StepOutcome,
}

/// Outcome of a whole run
#[derive(Debug, Default)]
pub struct RunReport {
    pub steps: Vec<StepRecord>,
}

impl RunReport {
    /// No step failed, faulted, or was left unattempted
    pub fn is_success(&self) -> bool {
        !self.steps.iter().any(|s| s.outcome.is_failure())
    }

    /// Boolean outcome of each step, in order
    pub fn outcomes(&self) -> Vec<bool> {
        self.steps.iter().map(|s| s.outcome.succeeded()).collect()
    }

    /// Creates issued across every step
    pub fn total_created(&self) -> usize {
        self.steps
            .iter()
            .filter_map(|s| s.outcome.summary())
            .map(|s| s.total_created())
            .sum()
    }

    /// Creates a dry run would issue across every step
    pub fn total_planned(&self) -> usize {
        self.steps
            .iter()
            .filter_map(|s| s.outcome.summary())
            .map(|s| s.total_planned())
            .sum()
    }

    /// Steps that count against the run
    pub fn failed_steps(&self) -> impl Iterator<Item = &StepRecord> {
        self.steps.iter().filter(|s| s.outcome.is_failure())
    }
}

/// Ordered list of steps plus the failure policy
pub struct Orchestrator<C> {
    steps: Vec<Step<C>>,
    policy: FailurePolicy,
    selection: Option<Vec<String>>,
}

impl<C> Orchestrator<C> {
    pub fn new(policy: FailurePolicy) -> Self {
        Self {
            steps: Vec::new(),
            policy,
            selection: None,
        }
    }

    /// Append a step
    pub fn step(mut self, key: &'static str, label: &'static str, build: BuildFn<C>) -> Self {
        self.steps.push(Step { key, label, build });
        self
    }

    /// Restrict the run to the given step keys; others are reported as skipped
    pub fn select<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selection = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    pub fn steps(&self) -> &[Step<C>] {
        &self.steps
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    fn is_selected(&self, step: &Step<C>) -> bool {
        match &self.selection {
            Some(keys) => keys.iter().any(|k| k == step.key),
            None => true,
        }
    }

    /// Run every step in order
    ///
    /// Each selected step's reconciler is built and run to completion before
    /// the next one starts. Under [`FailurePolicy::FailFast`] the first step
    /// that does not succeed stops the run and later steps are recorded as
    /// not attempted.
    pub fn run(&self, ctx: &C, report: &dyn ReportSink) -> RunReport {
        let total = self.steps.len();
        report.on_run_start(total);

        let mut records = Vec::with_capacity(total);
        let mut stopped = false;

        for (i, step) in self.steps.iter().enumerate() {
            let index = i + 1;

            let outcome = if stopped {
                StepOutcome::NotAttempted
            } else if !self.is_selected(step) {
                StepOutcome::Skipped
            } else {
                report.on_step_start(index, total, step.label);
                let reconciler = (step.build)(ctx);
                log::debug!("Running step {index}: {}", reconciler.label());

                match reconciler.replicate(report) {
                    Ok(summary) if summary.is_success() => StepOutcome::Succeeded(summary),
                    Ok(summary) => StepOutcome::Failed(summary),
                    Err(e) => StepOutcome::Faulted(e),
                }
            };

            if !stopped && outcome.is_failure() && self.policy == FailurePolicy::FailFast {
                log::debug!("Stopping after step {index} ({})", step.label);
                stopped = true;
            }

            report.on_step_complete(index, step.label, &outcome);
            records.push(StepRecord {
                index,
                label: step.label,
                outcome,
            });
        }

        let run = RunReport { steps: records };
        report.on_run_complete(&run);
        run
    }
}
