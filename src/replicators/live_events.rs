//! Live events and their live outputs

use super::ReplicationSettings;
use anyhow::Result;
use converge::{
    CategorySummary, ChildCollections, ChildPair, Collection, CollectionPair, EntityHooks,
    Presence, Reconciler, ReportSink, mapped, replicate_children,
};
use mediakit::{LiveEvent, LiveOutput};
use serde_json::Value;

pub struct LiveEventReconciler<'a, S, D, SO, DO> {
    pair: CollectionPair<S, D>,
    outputs: ChildPair<SO, DO>,
    settings: &'a ReplicationSettings,
}

impl<'a, S, D, SO, DO> LiveEventReconciler<'a, S, D, SO, DO> {
    pub fn new(
        pair: CollectionPair<S, D>,
        outputs: ChildPair<SO, DO>,
        settings: &'a ReplicationSettings,
    ) -> Self {
        Self {
            pair,
            outputs,
            settings,
        }
    }
}

/// Drop the account-specific `endpoints` list (ingest or preview URLs)
fn strip_endpoints(section: Option<&mut Value>) {
    if let Some(Value::Object(map)) = section {
        map.remove("endpoints");
    }
}

impl<S, D, SO, DO> EntityHooks<LiveEvent> for LiveEventReconciler<'_, S, D, SO, DO>
where
    S: Collection<Item = LiveEvent>,
    D: Collection<Item = LiveEvent>,
    SO: ChildCollections,
    DO: ChildCollections,
    SO::Child: Collection<Item = LiveOutput>,
    DO::Child: Collection<Item = LiveOutput>,
{
    fn map(&self, source: &LiveEvent) -> Result<LiveEvent> {
        let mut event = self.settings.translator.resource(source)?;
        strip_endpoints(event.properties.input.as_mut());
        strip_endpoints(event.properties.preview.as_mut());
        Ok(event)
    }

    fn after_present(
        &self,
        source: &LiveEvent,
        presence: Presence,
        report: &dyn ReportSink,
    ) -> Result<CategorySummary> {
        let translator = &self.settings.translator;
        replicate_children(
            &self.outputs.source,
            &self.outputs.destination,
            &source.name,
            presence,
            &mapped(|output: &LiveOutput| Ok(translator.resource(output)?)),
            &self.settings.sync,
            report,
        )
    }
}

impl<S, D, SO, DO> Reconciler for LiveEventReconciler<'_, S, D, SO, DO>
where
    S: Collection<Item = LiveEvent>,
    D: Collection<Item = LiveEvent>,
    SO: ChildCollections,
    DO: ChildCollections,
    SO::Child: Collection<Item = LiveOutput>,
    DO::Child: Collection<Item = LiveOutput>,
{
    fn label(&self) -> &'static str {
        "Live Events"
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replicators::fixtures;
    use converge::NoReport;
    use converge::memory::{MemoryChildren, MemoryCollection};
    use mediakit::{ArmResource, LiveEventProperties, LiveOutputProperties};
    use serde_json::json;

    fn event(name: &str) -> LiveEvent {
        let mut event = ArmResource::new(
            name,
            LiveEventProperties {
                description: Some("studio feed".to_string()),
                input: Some(json!({
                    "streamingProtocol": "RTMP",
                    "accessToken": "acf7b6ef-0000-0000-0000-000000000000",
                    "endpoints": [{"protocol": "RTMP", "url": "rtmp://srcmedia-usea.channel.media.azure.net:1935/live/x"}]
                })),
                preview: Some(json!({
                    "accessControl": {"ip": {"allow": []}},
                    "endpoints": [{"protocol": "FragmentedMP4", "url": "https://srcmedia-usea.channel.media.azure.net/preview"}]
                })),
                resource_state: Some("Running".to_string()),
                ..LiveEventProperties::default()
            },
        );
        event.location = Some("East US".to_string());
        event
    }

    fn output(name: &str, asset: &str) -> LiveOutput {
        ArmResource::new(
            name,
            LiveOutputProperties {
                asset_name: asset.to_string(),
                archive_window_length: Some("PT1H".to_string()),
                manifest_name: Some("output".to_string()),
                ..LiveOutputProperties::default()
            },
        )
    }

    #[test]
    fn test_event_created_without_endpoints() {
        let settings = fixtures::settings(false);
        let source = MemoryCollection::named("src/liveEvents").with_items([event("E1")]);
        let destination = MemoryCollection::named("dst/liveEvents");
        let source_outputs = MemoryChildren::named("src/liveEvents");
        source_outputs.insert("E1", [output("O1", "archive-1")]);
        let destination_outputs =
            MemoryChildren::named("dst/liveEvents").requiring_parents(destination.clone());

        let summary = LiveEventReconciler::new(
            CollectionPair::new(source, destination.clone()),
            ChildPair::new(source_outputs, destination_outputs.clone()),
            &settings,
        )
        .replicate(&NoReport)
        .unwrap();

        assert!(summary.is_success());
        assert_eq!(summary.entities.created, 1);
        assert_eq!(summary.children.created, 1);

        let created = &destination.items()[0];
        assert_eq!(created.location.as_deref(), Some("westeurope"));
        let input = created.properties.input.as_ref().unwrap();
        assert!(input.get("endpoints").is_none());
        assert_eq!(input["streamingProtocol"], "RTMP");
        let preview = created.properties.preview.as_ref().unwrap();
        assert!(preview.get("endpoints").is_none());
        assert!(preview.get("accessControl").is_some());
        assert_eq!(created.properties.resource_state, None);

        assert_eq!(destination_outputs.names("E1"), vec!["O1"]);
    }

    #[test]
    fn test_output_failure_fails_the_event() {
        let settings = fixtures::settings(false);
        let source =
            MemoryCollection::named("src/liveEvents").with_items([event("E1"), event("E2")]);
        let destination = MemoryCollection::named("dst/liveEvents").with_items([event("E1")]);
        let source_outputs = MemoryChildren::named("src/liveEvents");
        source_outputs.insert("E1", [output("O1", "archive-1")]);
        let destination_outputs = MemoryChildren::named("dst/liveEvents");
        destination_outputs.scoped("E1").failing_list("InternalServerError: try later");

        let summary = LiveEventReconciler::new(
            CollectionPair::new(source, destination.clone()),
            ChildPair::new(source_outputs, destination_outputs),
            &settings,
        )
        .replicate(&NoReport)
        .unwrap();

        assert_eq!(summary.entities.failed, 1);
        assert_eq!(summary.entities.created, 1);
        assert_eq!(summary.failures[0].0, "E1");
    }
}
