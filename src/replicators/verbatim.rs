//! Categories copied field for field (account filters, transforms,
//! streaming endpoints).

use super::ReplicationSettings;
use anyhow::Result;
use converge::{CategorySummary, Collection, CollectionPair, Reconciler, ReportSink, mapped};
use mediakit::{ArmResource, ResourceProperties};

pub struct VerbatimReconciler<'a, S, D> {
    label: &'static str,
    pair: CollectionPair<S, D>,
    settings: &'a ReplicationSettings,
}

impl<'a, S, D> VerbatimReconciler<'a, S, D> {
    pub fn new(
        label: &'static str,
        pair: CollectionPair<S, D>,
        settings: &'a ReplicationSettings,
    ) -> Self {
        Self {
            label,
            pair,
            settings,
        }
    }
}

impl<P, S, D> Reconciler for VerbatimReconciler<'_, S, D>
where
    P: ResourceProperties,
    S: Collection<Item = ArmResource<P>>,
    D: Collection<Item = ArmResource<P>>,
{
    fn label(&self) -> &'static str {
        self.label
    }

    fn replicate(&self, report: &dyn ReportSink) -> Result<CategorySummary> {
        let translator = &self.settings.translator;
        let hooks = mapped(|source: &ArmResource<P>| Ok(translator.resource(source)?));

        converge::replicate(
            &self.pair.source,
            &self.pair.destination,
            &hooks,
            &self.settings.sync,
            report,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replicators::fixtures::{self, DESTINATION_ID, SOURCE_ID};
    use converge::NoReport;
    use converge::memory::MemoryCollection;
    use mediakit::{FilterProperties, StreamingEndpointProperties, Transform, TransformProperties};
    use serde_json::json;

    fn transform(name: &str) -> Transform {
        ArmResource::new(
            name,
            TransformProperties {
                description: Some(format!("{name} transform")),
                outputs: vec![json!({"preset": {"presetName": "AdaptiveStreaming"}})],
                ..TransformProperties::default()
            },
        )
    }

    #[test]
    fn test_creates_only_missing_transforms() {
        let settings = fixtures::settings(false);
        let source = MemoryCollection::named("src/transforms")
            .with_items([transform("T1"), transform("T2")]);
        let destination = MemoryCollection::named("dst/transforms").with_items([transform("T1")]);

        let reconciler = VerbatimReconciler::new(
            "Transforms",
            CollectionPair::new(source, destination.clone()),
            &settings,
        );
        let summary = reconciler.replicate(&NoReport).unwrap();

        assert_eq!(summary.entities.created, 1);
        assert_eq!(summary.entities.existing, 1);
        assert_eq!(destination.create_calls(), 1);
        assert_eq!(destination.names(), vec!["T1", "T2"]);

        let created = &destination.items()[1];
        assert_eq!(created.properties, transform("T2").properties);
    }

    #[test]
    fn test_endpoint_moves_to_destination_location() {
        let settings = fixtures::settings(false);
        let mut endpoint = ArmResource::new(
            "default",
            StreamingEndpointProperties {
                scale_units: Some(0),
                host_name: Some("srcmedia-usea.streaming.media.azure.net".to_string()),
                ..StreamingEndpointProperties::default()
            },
        );
        endpoint.location = Some("East US".to_string());
        endpoint.id = Some(format!("{SOURCE_ID}/streamingEndpoints/default"));

        let source = MemoryCollection::named("src/streamingEndpoints").with_items([endpoint]);
        let destination = MemoryCollection::named("dst/streamingEndpoints");

        VerbatimReconciler::new(
            "Streaming Endpoints",
            CollectionPair::new(source, destination.clone()),
            &settings,
        )
        .replicate(&NoReport)
        .unwrap();

        let created = &destination.items()[0];
        assert_eq!(created.location.as_deref(), Some("westeurope"));
        assert_eq!(created.id, None);
        assert_eq!(created.properties.scale_units, Some(0));
        assert_eq!(created.properties.host_name, None);
    }

    #[test]
    fn test_filter_account_references_rewritten() {
        let settings = fixtures::settings(false);
        let mut properties = FilterProperties::default();
        properties.extra.insert(
            "source".to_string(),
            json!(format!("{SOURCE_ID}/assets/a1")),
        );
        properties
            .extra
            .insert("firstQuality".to_string(), json!({"bitrate": 128_000}));

        let source = MemoryCollection::named("src/accountFilters")
            .with_items([ArmResource::new("F1", properties)]);
        let destination = MemoryCollection::named("dst/accountFilters");

        VerbatimReconciler::new(
            "Account Filters",
            CollectionPair::new(source, destination.clone()),
            &settings,
        )
        .replicate(&NoReport)
        .unwrap();

        let created = &destination.items()[0].properties.extra;
        assert_eq!(created["source"], json!(format!("{DESTINATION_ID}/assets/a1")));
        assert_eq!(created["firstQuality"], json!({"bitrate": 128_000}));
    }
}
