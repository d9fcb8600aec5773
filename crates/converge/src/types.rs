//! Core types for reconciliation

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where an entity stands at the destination once its turn is over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Presence {
    /// Already existed before this run touched it
    Existing,
    /// Created during this run
    Created,
    /// Would be created (dry run); does not exist yet
    Planned,
}

impl Presence {
    /// Whether the entity really exists at the destination
    pub fn exists(&self) -> bool {
        matches!(self, Self::Existing | Self::Created)
    }
}

/// Result of reconciling a single entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityOutcome {
    /// Same name already present at the destination
    Existing,
    /// Entity was created at the destination
    Created,
    /// Entity would be created (dry run)
    Planned,
    /// Mapping, create or post-create work failed
    Failed { error: String },
}

impl EntityOutcome {
    /// Check if the outcome represents success (no failure)
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }

    /// Short symbol used in progress output
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Existing => "○",
            Self::Created => "✓",
            Self::Planned => "+",
            Self::Failed { .. } => "✗",
        }
    }
}

/// Counts for one level (parents or children) of a category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub created: usize,
    pub existing: usize,
    pub planned: usize,
    pub failed: usize,
}

impl Tally {
    /// Total entities seen
    pub fn total(&self) -> usize {
        self.created + self.existing + self.planned + self.failed
    }

    /// Merge another tally into this one
    pub fn merge(&mut self, other: &Tally) {
        self.created += other.created;
        self.existing += other.existing;
        self.planned += other.planned;
        self.failed += other.failed;
    }

    /// Add an outcome to the tally
    pub fn add(&mut self, outcome: &EntityOutcome) {
        match outcome {
            EntityOutcome::Existing => self.existing += 1,
            EntityOutcome::Created => self.created += 1,
            EntityOutcome::Planned => self.planned += 1,
            EntityOutcome::Failed { .. } => self.failed += 1,
        }
    }
}

/// Summary of one category's replication
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySummary {
    /// Top-level entities of the category
    pub entities: Tally,
    /// Dependent children (asset filters, live outputs)
    pub children: Tally,
    /// Entities that failed (name, error message)
    pub failures: Vec<(String, String)>,
}

impl CategorySummary {
    /// Check if every entity and child converged
    pub fn is_success(&self) -> bool {
        self.entities.failed == 0 && self.children.failed == 0
    }

    /// Number of create calls issued
    pub fn total_created(&self) -> usize {
        self.entities.created + self.children.created
    }

    /// Number of creates a dry run would issue
    pub fn total_planned(&self) -> usize {
        self.entities.planned + self.children.planned
    }

    /// Fold another category's counts in as children of this one
    pub fn absorb_children(&mut self, children: CategorySummary) {
        self.children.merge(&children.entities);
        self.children.merge(&children.children);
        self.failures.extend(children.failures);
    }

    /// Merge a sibling summary at the same level
    pub fn merge(&mut self, other: CategorySummary) {
        self.entities.merge(&other.entities);
        self.children.merge(&other.children);
        self.failures.extend(other.failures);
    }
}

/// Options for replicating one category
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    /// List and diff only, never create
    pub dry_run: bool,
    /// Number of parallel per-entity workers
    pub jobs: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            jobs: 4,
        }
    }
}

impl SyncOptions {
    /// Same options with a single worker
    pub fn sequential(&self) -> Self {
        Self {
            dry_run: self.dry_run,
            jobs: 1,
        }
    }
}

/// What the orchestrator does after a step that did not succeed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailurePolicy {
    /// Stop; remaining steps are not attempted
    #[default]
    FailFast,
    /// Log the failure and run the next step
    Continue,
}

/// Outcome of one orchestrated step
#[derive(Debug)]
pub enum StepOutcome {
    /// Every entity of the category exists at the destination
    Succeeded(CategorySummary),
    /// The category ran to completion but some entities failed
    Failed(CategorySummary),
    /// The category aborted (listing or authentication fault)
    Faulted(anyhow::Error),
    /// Excluded by the step selection
    Skipped,
    /// Not run because an earlier step stopped the run
    NotAttempted,
}

impl StepOutcome {
    /// Boolean outcome of the step
    pub fn succeeded(&self) -> bool {
        matches!(self, Self::Succeeded(_))
    }

    /// Whether the step counts against the run
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::Failed(_) | Self::Faulted(_) | Self::NotAttempted
        )
    }

    /// Summary, if the step ran to completion
    pub fn summary(&self) -> Option<&CategorySummary> {
        match self {
            Self::Succeeded(s) | Self::Failed(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded(_) => write!(f, "succeeded"),
            Self::Failed(s) => write!(
                f,
                "failed ({} entities, {} children)",
                s.entities.failed, s.children.failed
            ),
            Self::Faulted(e) => write!(f, "faulted: {e}"),
            Self::Skipped => write!(f, "skipped"),
            Self::NotAttempted => write!(f, "not attempted"),
        }
    }
}
