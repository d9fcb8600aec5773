//! Replication engine - lists, diffs by name, and creates what is missing

use crate::collection::{ChildCollections, Collection, Entity};
use crate::report::ReportSink;
use crate::types::{CategorySummary, EntityOutcome, Presence, SyncOptions};
use anyhow::{Context as AnyhowContext, Result};
use rayon::prelude::*;
use std::collections::HashSet;

/// Per-kind behaviour plugged into [`replicate`]
pub trait EntityHooks<T>: Sync {
    /// Build the destination representation of a source entity
    fn map(&self, source: &T) -> Result<T>;

    /// Called once the entity exists at the destination, or would exist
    /// after a dry run (`Presence::Planned`)
    ///
    /// The returned summary is folded in as children of the entity.
    fn after_present(
        &self,
        _source: &T,
        _presence: Presence,
        _report: &dyn ReportSink,
    ) -> Result<CategorySummary> {
        Ok(CategorySummary::default())
    }
}

/// Hooks that only map, with no post-create work
pub struct MapWith<F>(F);

/// Wrap a mapping function as [`EntityHooks`]
pub fn mapped<T, F>(map: F) -> MapWith<F>
where
    F: Fn(&T) -> Result<T> + Sync,
{
    MapWith(map)
}

impl<T, F> EntityHooks<T> for MapWith<F>
where
    F: Fn(&T) -> Result<T> + Sync,
{
    fn map(&self, source: &T) -> Result<T> {
        (self.0)(source)
    }
}

/// Replicate one collection into another
///
/// Every source page is drained, then the destination is listed once to
/// build the set of existing names. Entities whose name already exists are
/// left untouched; the rest are mapped and created. Listing failures abort
/// with `Err`; per-entity failures are counted in the summary.
pub fn replicate<S, D, H>(
    source: &S,
    destination: &D,
    hooks: &H,
    opts: &SyncOptions,
    report: &dyn ReportSink,
) -> Result<CategorySummary>
where
    S: Collection,
    D: Collection<Item = S::Item>,
    H: EntityHooks<S::Item> + ?Sized,
{
    let items = source
        .list_all()
        .with_context(|| format!("Failed to list {}", source.describe()))?;

    let existing: HashSet<String> = destination
        .list_all()
        .with_context(|| format!("Failed to list {}", destination.describe()))?
        .iter()
        .map(|e| e.name().to_string())
        .collect();

    let collection = destination.describe();
    report.on_listed(&collection, items.len(), existing.len());

    let reconcile = |item: &S::Item| {
        reconcile_one(
            item,
            existing.contains(item.name()),
            destination,
            &collection,
            hooks,
            opts,
            report,
        )
    };

    let results: Vec<CategorySummary> = if opts.jobs <= 1 || items.len() <= 1 {
        items.iter().map(reconcile).collect()
    } else {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(opts.jobs)
            .build()
            .context("Failed to create replication thread pool")?;

        pool.install(|| items.par_iter().map(reconcile).collect())
    };

    let mut summary = CategorySummary::default();
    for result in results {
        summary.merge(result);
    }

    Ok(summary)
}

/// Reconcile a single source entity against the destination
fn reconcile_one<D, H>(
    item: &D::Item,
    exists: bool,
    destination: &D,
    collection: &str,
    hooks: &H,
    opts: &SyncOptions,
    report: &dyn ReportSink,
) -> CategorySummary
where
    D: Collection,
    H: EntityHooks<D::Item> + ?Sized,
{
    let mut summary = CategorySummary::default();
    let name = item.name();

    let presence = if exists {
        Presence::Existing
    } else if opts.dry_run {
        Presence::Planned
    } else {
        match hooks.map(item).and_then(|mapped| destination.create(&mapped)) {
            Ok(_) => Presence::Created,
            Err(e) => {
                record_failure(&mut summary, collection, name, format!("{e:#}"), report);
                return summary;
            }
        }
    };

    let outcome = match presence {
        Presence::Existing => EntityOutcome::Existing,
        Presence::Created => EntityOutcome::Created,
        Presence::Planned => EntityOutcome::Planned,
    };
    match hooks.after_present(item, presence, report) {
        Ok(children) => {
            report.on_entity(collection, name, &outcome);
            summary.entities.add(&outcome);
            summary.absorb_children(children);
        }
        Err(e) => {
            record_failure(&mut summary, collection, name, format!("{e:#}"), report);
        }
    }

    summary
}

fn record_failure(
    summary: &mut CategorySummary,
    collection: &str,
    name: &str,
    error: String,
    report: &dyn ReportSink,
) {
    let outcome = EntityOutcome::Failed {
        error: error.clone(),
    };
    report.on_entity(collection, name, &outcome);
    summary.entities.add(&outcome);
    summary.failures.push((name.to_string(), error));
}

/// Replicate the children of one parent entity
///
/// Children run sequentially inside the parent's worker. When the parent
/// only exists in a dry-run plan, the destination child collection cannot
/// be listed, so every source child is reported as planned.
pub fn replicate_children<SC, DC, H>(
    source: &SC,
    destination: &DC,
    parent: &str,
    presence: Presence,
    hooks: &H,
    opts: &SyncOptions,
    report: &dyn ReportSink,
) -> Result<CategorySummary>
where
    SC: ChildCollections,
    DC: ChildCollections,
    DC::Child: Collection<Item = <SC::Child as Collection>::Item>,
    H: EntityHooks<<SC::Child as Collection>::Item> + ?Sized,
{
    let source_children = source.scoped(parent);
    let destination_children = destination.scoped(parent);

    if presence.exists() {
        return replicate(
            &source_children,
            &destination_children,
            hooks,
            &opts.sequential(),
            report,
        );
    }

    let items = source_children
        .list_all()
        .with_context(|| format!("Failed to list {}", source_children.describe()))?;

    let collection = destination_children.describe();
    report.on_listed(&collection, items.len(), 0);

    let mut summary = CategorySummary::default();
    for item in &items {
        let outcome = EntityOutcome::Planned;
        report.on_entity(&collection, item.name(), &outcome);
        summary.entities.add(&outcome);
        summary.absorb_children(hooks.after_present(item, Presence::Planned, report)?);
    }

    Ok(summary)
}
