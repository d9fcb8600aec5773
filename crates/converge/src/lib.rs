//! # Converge
//!
//! A name-keyed reconciliation engine.
//!
//! This crate provides the abstractions for copying one category of
//! entities from a source collection into a destination collection until
//! every source name exists at the destination, and for sequencing several
//! such categories in a fixed order.
//!
//! ## Core Concepts
//!
//! - **Entity**: Something identified by a unique name within its collection
//! - **Collection**: A paginated list/get/create handle bound to one account
//! - **ChildCollections**: Collections scoped to a parent entity (e.g. an asset's filters)
//! - **EntityHooks**: Per-kind mapping and post-create work
//! - **Reconciler**: One category's replicate step
//! - **Orchestrator**: Ordered list of reconcilers with a failure policy
//!
//! ## Example
//!
//! ```ignore
//! use converge::{replicate, mapped, Collection, NoReport, SyncOptions};
//!
//! let summary = replicate(
//!     &source,
//!     &destination,
//!     &mapped(|item: &Transform| Ok(item.clone())),
//!     &SyncOptions::default(),
//!     &NoReport,
//! )?;
//!
//! assert!(summary.is_success());
//! ```
//!
//! ## Provider Traits
//!
//! - [`Collection`]: Backend for listing and creating entities
//! - [`ReportSink`]: Receives progress events
//!
//! The destination is authoritative: an entity whose name already exists
//! there is never overwritten, so re-running a replication is a no-op for
//! everything that already converged.

pub mod collection;
#[cfg(any(test, feature = "testing"))]
pub mod memory;
pub mod orchestrator;
pub mod reconciler;
pub mod report;
pub mod sync;
pub mod types;

// Re-export main types at crate root
pub use collection::{ChildCollections, ChildPair, Collection, CollectionPair, Entity, Page};
pub use orchestrator::{BuildFn, Orchestrator, RunReport, Step, StepRecord};
pub use reconciler::Reconciler;
pub use report::{NoReport, ReportSink};
pub use sync::{EntityHooks, MapWith, mapped, replicate, replicate_children};
pub use types::{
    CategorySummary, EntityOutcome, FailurePolicy, Presence, StepOutcome, SyncOptions, Tally,
};
