//! Reconciler trait - one category's replicate step

use crate::report::ReportSink;
use crate::types::CategorySummary;
use anyhow::Result;

/// A bound, ready-to-run replication of one category
///
/// Implementations are constructed with their collection handles and
/// settings already bound (no I/O at construction). `replicate` performs
/// the whole category:
/// 1. List every source entity
/// 2. List the destination to find names that already exist
/// 3. Map and create every missing entity
/// 4. Reconcile dependent children once their parent exists
///
/// An `Err` means the category could not run at all (e.g. listing
/// failed); per-entity failures are reported in the summary instead.
pub trait Reconciler {
    /// Category label (e.g. "Transforms")
    fn label(&self) -> &'static str;

    /// Replicate the whole category
    fn replicate(&self, report: &dyn ReportSink) -> Result<CategorySummary>;
}
