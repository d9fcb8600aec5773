//! Streaming locators
//!
//! Locators with content keys are created with the key values read from the
//! source, so both accounts hand out the same keys for the same locator.

use super::{LocatorKeys, ReplicationSettings};
use anyhow::{Context, Result};
use converge::{CategorySummary, Collection, CollectionPair, Reconciler, ReportSink, mapped};
use mediakit::StreamingLocator;

pub struct StreamingLocatorReconciler<'a, S, D, K> {
    pair: CollectionPair<S, D>,
    keys: &'a K,
    settings: &'a ReplicationSettings,
}

impl<'a, S, D, K> StreamingLocatorReconciler<'a, S, D, K>
where
    K: LocatorKeys,
{
    pub fn new(pair: CollectionPair<S, D>, keys: &'a K, settings: &'a ReplicationSettings) -> Self {
        Self {
            pair,
            keys,
            settings,
        }
    }

    fn map(&self, source: &StreamingLocator) -> Result<StreamingLocator> {
        let mut locator = source.clone();

        if !source.properties.content_keys.is_empty() {
            locator.properties.content_keys =
                self.keys.content_keys(&source.name).with_context(|| {
                    format!("Failed to read content keys of locator {}", source.name)
                })?;
        }

        Ok(self.settings.translator.resource(&locator)?)
    }
}

impl<S, D, K> Reconciler for StreamingLocatorReconciler<'_, S, D, K>
where
    S: Collection<Item = StreamingLocator>,
    D: Collection<Item = StreamingLocator>,
    K: LocatorKeys,
{
    fn label(&self) -> &'static str {
        "Streaming Locators"
    }

    fn replicate(&self, report: &dyn ReportSink) -> Result<CategorySummary> {
        converge::replicate(
            &self.pair.source,
            &self.pair.destination,
            &mapped(|locator: &StreamingLocator| self.map(locator)),
            &self.settings.sync,
            report,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replicators::fixtures;
    use converge::NoReport;
    use converge::memory::MemoryCollection;
    use mediakit::{ArmResource, StreamingLocatorContentKey, StreamingLocatorProperties};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeKeys {
        calls: AtomicUsize,
    }

    impl LocatorKeys for FakeKeys {
        fn content_keys(&self, locator: &str) -> Result<Vec<StreamingLocatorContentKey>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![StreamingLocatorContentKey {
                id: format!("{locator}-key"),
                label_reference_in_streaming_policy: Some("cencDefaultKey".to_string()),
                value: Some("AAECAwQFBgcICQoLDA0ODw==".to_string()),
                key_type: Some("CommonEncryptionCenc".to_string()),
                policy_name: Some("policy".to_string()),
                tracks: vec![json!({"trackSelections": []})],
            }])
        }
    }

    fn locator(name: &str, with_keys: bool) -> StreamingLocator {
        let content_keys = if with_keys {
            vec![StreamingLocatorContentKey {
                id: format!("{name}-key"),
                label_reference_in_streaming_policy: Some("cencDefaultKey".to_string()),
                ..StreamingLocatorContentKey::default()
            }]
        } else {
            Vec::new()
        };

        ArmResource::new(
            name,
            StreamingLocatorProperties {
                asset_name: "A1".to_string(),
                streaming_policy_name: Some("Predefined_MultiDrmCencStreaming".to_string()),
                streaming_locator_id: Some("91bb4d4e-0000-0000-0000-000000000000".to_string()),
                content_keys,
                ..StreamingLocatorProperties::default()
            },
        )
    }

    #[test]
    fn test_locator_keys_carry_values() {
        let settings = fixtures::settings(false);
        let keys = FakeKeys::default();
        let source = MemoryCollection::named("src/streamingLocators")
            .with_items([locator("L1", true), locator("L2", false)]);
        let destination = MemoryCollection::named("dst/streamingLocators");

        let summary = StreamingLocatorReconciler::new(
            CollectionPair::new(source, destination.clone()),
            &keys,
            &settings,
        )
        .replicate(&NoReport)
        .unwrap();

        assert_eq!(summary.entities.created, 2);
        assert_eq!(keys.calls.load(Ordering::SeqCst), 1);

        let created = destination
            .items()
            .into_iter()
            .find(|l| l.name == "L1")
            .unwrap();
        let key = &created.properties.content_keys[0];
        assert_eq!(key.value.as_deref(), Some("AAECAwQFBgcICQoLDA0ODw=="));
        assert_eq!(key.policy_name, None);
        assert!(key.tracks.is_empty());
        assert_eq!(
            created.properties.streaming_locator_id.as_deref(),
            Some("91bb4d4e-0000-0000-0000-000000000000")
        );
    }

    #[test]
    fn test_dry_run_reads_no_keys() {
        let settings = fixtures::settings(true);
        let keys = FakeKeys::default();
        let source =
            MemoryCollection::named("src/streamingLocators").with_items([locator("L1", true)]);
        let destination = MemoryCollection::named("dst/streamingLocators");

        let summary = StreamingLocatorReconciler::new(
            CollectionPair::new(source, destination.clone()),
            &keys,
            &settings,
        )
        .replicate(&NoReport)
        .unwrap();

        assert_eq!(summary.entities.planned, 1);
        assert_eq!(keys.calls.load(Ordering::SeqCst), 0);
        assert!(destination.is_empty());
    }
}
