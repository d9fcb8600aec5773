//! Run context: both connected accounts plus the settings every step shares
//!
//! Built once before the first step and passed by reference to each step
//! factory.

use crate::config::Config;
use crate::replicators::ReplicationSettings;
use anyhow::{Context as AnyhowContext, Result};
use converge::{ChildPair, CollectionPair, SyncOptions};
use mediakit::{
    AccountTranslator, ContentCopier, MediaChildren, MediaClient, MediaCollection, ResourceKind,
    ResourceProperties, TransferMode,
};
use std::sync::Arc;

pub struct RunContext {
    pub source: Arc<MediaClient>,
    pub destination: Arc<MediaClient>,
    pub settings: ReplicationSettings,
    pub content: ContentCopier,
}

impl RunContext {
    /// Sign in to both accounts and bind the run settings
    pub fn connect(config: &Config, sync: SyncOptions, mode: TransferMode) -> Result<Self> {
        let options = config.options.client_options();

        let source = MediaClient::connect(&config.source.to_context(), &options).with_context(
            || format!("Failed to connect to source account {}", config.source.account_name),
        )?;
        let destination = MediaClient::connect(&config.destination.to_context(), &options)
            .with_context(|| {
                format!(
                    "Failed to connect to destination account {}",
                    config.destination.account_name
                )
            })?;

        let translator = AccountTranslator::new(source.account(), destination.account());
        let content = ContentCopier::new(
            Arc::clone(&source),
            Arc::clone(&destination),
            mode,
            config.options.sas_expiry(),
        );

        Ok(Self {
            source,
            destination,
            settings: ReplicationSettings { translator, sync },
            content,
        })
    }

    /// Source and destination handles for one top-level kind
    pub fn pair<P: ResourceProperties>(
        &self,
        kind: ResourceKind,
    ) -> CollectionPair<MediaCollection<P>, MediaCollection<P>> {
        CollectionPair::new(
            self.source.collection(kind),
            self.destination.collection(kind),
        )
    }

    /// Source and destination handles for one child kind
    pub fn children<P: ResourceProperties>(
        &self,
        kind: ResourceKind,
    ) -> ChildPair<MediaChildren<P>, MediaChildren<P>> {
        ChildPair::new(self.source.children(kind), self.destination.children(kind))
    }
}
