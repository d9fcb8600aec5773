//! Content key policies
//!
//! Listings return policy options without key material, so each missing
//! policy is re-read with its secrets from the source before it is created.

use super::{PolicySecrets, ReplicationSettings};
use anyhow::{Context, Result};
use converge::{CategorySummary, Collection, CollectionPair, Reconciler, ReportSink, mapped};
use mediakit::ContentKeyPolicy;

pub struct ContentKeyPolicyReconciler<'a, S, D, K> {
    pair: CollectionPair<S, D>,
    secrets: &'a K,
    settings: &'a ReplicationSettings,
}

impl<'a, S, D, K> ContentKeyPolicyReconciler<'a, S, D, K>
where
    K: PolicySecrets,
{
    pub fn new(
        pair: CollectionPair<S, D>,
        secrets: &'a K,
        settings: &'a ReplicationSettings,
    ) -> Self {
        Self {
            pair,
            secrets,
            settings,
        }
    }

    fn map(&self, source: &ContentKeyPolicy) -> Result<ContentKeyPolicy> {
        let full = self
            .secrets
            .policy_with_secrets(&source.name)
            .with_context(|| format!("Failed to read secrets of policy {}", source.name))?;

        let mut policy = source.clone();
        policy.properties.options = full.options;
        if full.description.is_some() {
            policy.properties.description = full.description;
        }

        Ok(self.settings.translator.resource(&policy)?)
    }
}

impl<S, D, K> Reconciler for ContentKeyPolicyReconciler<'_, S, D, K>
where
    S: Collection<Item = ContentKeyPolicy>,
    D: Collection<Item = ContentKeyPolicy>,
    K: PolicySecrets,
{
    fn label(&self) -> &'static str {
        "Content Key Policies"
    }

    fn replicate(&self, report: &dyn ReportSink) -> Result<CategorySummary> {
        converge::replicate(
            &self.pair.source,
            &self.pair.destination,
            &mapped(|policy: &ContentKeyPolicy| self.map(policy)),
            &self.settings.sync,
            report,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replicators::fixtures;
    use anyhow::bail;
    use converge::NoReport;
    use converge::memory::MemoryCollection;
    use mediakit::{ArmResource, ContentKeyPolicyProperties};
    use serde_json::{Value, json};
    use std::sync::Mutex;

    /// Secrets keyed by policy name; records every lookup
    #[derive(Default)]
    struct FakeSecrets {
        calls: Mutex<Vec<String>>,
    }

    impl PolicySecrets for FakeSecrets {
        fn policy_with_secrets(&self, name: &str) -> Result<ContentKeyPolicyProperties> {
            self.calls.lock().unwrap().push(name.to_string());
            if name == "locked" {
                bail!("AuthorizationFailed: no access to {name}");
            }
            Ok(ContentKeyPolicyProperties {
                description: Some("with secrets".to_string()),
                options: vec![option(Some("c2VjcmV0"))],
                ..ContentKeyPolicyProperties::default()
            })
        }
    }

    fn option(key: Option<&str>) -> Value {
        json!({
            "name": "aes",
            "configuration": {
                "@odata.type": "#Microsoft.Media.ContentKeyPolicyClearKeyConfiguration"
            },
            "restriction": {
                "@odata.type": "#Microsoft.Media.ContentKeyPolicyTokenRestriction",
                "primaryVerificationKey": {
                    "@odata.type": "#Microsoft.Media.ContentKeyPolicySymmetricTokenKey",
                    "keyValue": key
                }
            }
        })
    }

    fn listed(name: &str) -> ContentKeyPolicy {
        ArmResource::new(
            name,
            ContentKeyPolicyProperties {
                description: Some("listed".to_string()),
                options: vec![option(None)],
                policy_id: Some("8d1e5f8a-0000-0000-0000-000000000000".to_string()),
                ..ContentKeyPolicyProperties::default()
            },
        )
    }

    #[test]
    fn test_created_policy_carries_secrets() {
        let settings = fixtures::settings(false);
        let secrets = FakeSecrets::default();
        let source = MemoryCollection::named("src/contentKeyPolicies").with_items([listed("P1")]);
        let destination = MemoryCollection::named("dst/contentKeyPolicies");

        let summary = ContentKeyPolicyReconciler::new(
            CollectionPair::new(source, destination.clone()),
            &secrets,
            &settings,
        )
        .replicate(&NoReport)
        .unwrap();

        assert!(summary.is_success());
        let created = &destination.items()[0].properties;
        assert_eq!(created.options, vec![option(Some("c2VjcmV0"))]);
        assert_eq!(created.description.as_deref(), Some("with secrets"));
        assert_eq!(created.policy_id, None);
    }

    #[test]
    fn test_existing_policy_skips_secret_lookup() {
        let settings = fixtures::settings(false);
        let secrets = FakeSecrets::default();
        let source = MemoryCollection::named("src/contentKeyPolicies").with_items([listed("P1")]);
        let destination =
            MemoryCollection::named("dst/contentKeyPolicies").with_items([listed("P1")]);

        ContentKeyPolicyReconciler::new(
            CollectionPair::new(source, destination.clone()),
            &secrets,
            &settings,
        )
        .replicate(&NoReport)
        .unwrap();

        assert!(secrets.calls.lock().unwrap().is_empty());
        assert_eq!(destination.create_calls(), 0);
    }

    #[test]
    fn test_secret_failure_fails_only_that_policy() {
        let settings = fixtures::settings(false);
        let secrets = FakeSecrets::default();
        let source = MemoryCollection::named("src/contentKeyPolicies")
            .with_items([listed("locked"), listed("open")]);
        let destination = MemoryCollection::named("dst/contentKeyPolicies");

        let summary = ContentKeyPolicyReconciler::new(
            CollectionPair::new(source, destination.clone()),
            &secrets,
            &settings,
        )
        .replicate(&NoReport)
        .unwrap();

        assert_eq!(summary.entities.failed, 1);
        assert_eq!(summary.entities.created, 1);
        assert_eq!(summary.failures[0].0, "locked");
        assert!(summary.failures[0].1.contains("AuthorizationFailed"));
        assert_eq!(destination.names(), vec!["open"]);
    }
}
