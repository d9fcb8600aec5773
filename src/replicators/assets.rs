//! Assets, their filters, and their blob content
//!
//! A missing asset is created against the destination storage account with
//! no container name, so the destination service picks its own container.
//! Content is reconciled for every asset that exists at the destination:
//! blobs the destination container lacks are copied, so an asset whose copy
//! failed on an earlier run is completed by the next one. Filters are
//! reconciled the same way.

use super::{ContentTransfer, ReplicationSettings};
use crate::ui;
use anyhow::Result;
use converge::{
    CategorySummary, ChildCollections, ChildPair, Collection, CollectionPair, EntityHooks,
    EntityOutcome, Presence, Reconciler, ReportSink, mapped, replicate_children,
};
use mediakit::{Asset, AssetFilter};

pub struct AssetReconciler<'a, S, D, SF, DF, C> {
    pair: CollectionPair<S, D>,
    filters: ChildPair<SF, DF>,
    content: &'a C,
    settings: &'a ReplicationSettings,
}

impl<'a, S, D, SF, DF, C> AssetReconciler<'a, S, D, SF, DF, C> {
    pub fn new(
        pair: CollectionPair<S, D>,
        filters: ChildPair<SF, DF>,
        content: &'a C,
        settings: &'a ReplicationSettings,
    ) -> Self {
        Self {
            pair,
            filters,
            content,
            settings,
        }
    }
}

impl<S, D, SF, DF, C> AssetReconciler<'_, S, D, SF, DF, C>
where
    D: Collection<Item = Asset>,
    C: ContentTransfer,
{
    /// Copy the asset's missing blobs; a failure is recorded as a failed child
    fn copy_content(&self, name: &str, report: &dyn ReportSink) -> CategorySummary {
        let mut summary = CategorySummary::default();

        match self.content.transfer(name) {
            Ok(stats) if stats.blobs == 0 => {
                log::debug!("Content of asset {name} is complete ({} present)", stats.skipped);
            }
            Ok(stats) => log::info!(
                "Copied {} ({}) into asset {name}",
                ui::plural(stats.blobs, "blob", "blobs"),
                ui::format_size(stats.bytes)
            ),
            Err(e) => {
                let entry = format!("{name} (content)");
                let outcome = EntityOutcome::Failed {
                    error: format!("{e:#}"),
                };
                report.on_entity(&self.pair.destination.describe(), &entry, &outcome);
                summary.entities.add(&outcome);
                summary.failures.push((entry, format!("{e:#}")));
            }
        }

        summary
    }
}

impl<S, D, SF, DF, C> EntityHooks<Asset> for AssetReconciler<'_, S, D, SF, DF, C>
where
    S: Collection<Item = Asset>,
    D: Collection<Item = Asset>,
    SF: ChildCollections,
    DF: ChildCollections,
    SF::Child: Collection<Item = AssetFilter>,
    DF::Child: Collection<Item = AssetFilter>,
    C: ContentTransfer,
{
    fn map(&self, source: &Asset) -> Result<Asset> {
        let translator = &self.settings.translator;
        let mut asset = translator.resource(source)?;

        asset.properties.container = None;
        asset.properties.storage_account_name = source
            .properties
            .storage_account_name
            .as_deref()
            .map(|name| translator.storage_account_name(name));

        Ok(asset)
    }

    fn after_present(
        &self,
        source: &Asset,
        presence: Presence,
        report: &dyn ReportSink,
    ) -> Result<CategorySummary> {
        let mut summary = match presence {
            Presence::Created | Presence::Existing => self.copy_content(&source.name, report),
            Presence::Planned => {
                log::debug!("Content of asset {} would be copied", source.name);
                CategorySummary::default()
            }
        };

        let translator = &self.settings.translator;
        let filters = replicate_children(
            &self.filters.source,
            &self.filters.destination,
            &source.name,
            presence,
            &mapped(|filter: &AssetFilter| Ok(translator.resource(filter)?)),
            &self.settings.sync,
            report,
        )?;
        summary.merge(filters);

        Ok(summary)
    }
}

impl<S, D, SF, DF, C> Reconciler for AssetReconciler<'_, S, D, SF, DF, C>
where
    S: Collection<Item = Asset>,
    D: Collection<Item = Asset>,
    SF: ChildCollections,
    DF: ChildCollections,
    SF::Child: Collection<Item = AssetFilter>,
    DF::Child: Collection<Item = AssetFilter>,
    C: ContentTransfer,
{
    fn label(&self) -> &'static str {
        "Assets"
    }

    fn replicate(&self, report: &dyn ReportSink) -> Result<CategorySummary> {
        converge::replicate(
            &self.pair.source,
            &self.pair.destination,
            self,
            &self.settings.sync,
            report,
        )
    }
}
