//! Media Services resource models.
//!
//! Every resource shares the ARM envelope ([`ArmResource`]); the per-kind
//! property structs name the fields replication reasons about and keep all
//! other properties verbatim in a flattened map. Read-only fields are
//! accepted when listing but never written into a create body.

use converge::Entity;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Properties of one resource kind.
pub trait ResourceProperties:
    Serialize + DeserializeOwned + Clone + Send + Sync + fmt::Debug + 'static
{
}

impl<T> ResourceProperties for T where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + fmt::Debug + 'static
{
}

/// The ARM resource envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArmResource<P> {
    /// Identity key within the account
    pub name: String,
    #[serde(default, skip_serializing)]
    pub id: Option<String>,
    #[serde(default, rename = "type", skip_serializing)]
    pub resource_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    #[serde(default, skip_serializing)]
    pub system_data: Option<Value>,
    pub properties: P,
}

impl<P> ArmResource<P> {
    /// A bare resource, as used for create bodies and tests.
    pub fn new(name: impl Into<String>, properties: P) -> Self {
        Self {
            name: name.into(),
            id: None,
            resource_type: None,
            location: None,
            tags: BTreeMap::new(),
            system_data: None,
            properties,
        }
    }
}

impl<P: ResourceProperties> Entity for ArmResource<P> {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Resource kinds replicated between accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    AccountFilter,
    Transform,
    ContentKeyPolicy,
    StreamingEndpoint,
    Asset,
    AssetFilter,
    StreamingLocator,
    LiveEvent,
    LiveOutput,
}

impl ResourceKind {
    /// URL segment under the account (or under the parent for child kinds).
    pub fn segment(&self) -> &'static str {
        match self {
            Self::AccountFilter => "accountFilters",
            Self::Transform => "transforms",
            Self::ContentKeyPolicy => "contentKeyPolicies",
            Self::StreamingEndpoint => "streamingEndpoints",
            Self::Asset => "assets",
            Self::AssetFilter => "assetFilters",
            Self::StreamingLocator => "streamingLocators",
            Self::LiveEvent => "liveEvents",
            Self::LiveOutput => "liveOutputs",
        }
    }

    /// Parent kind for child resources.
    pub fn parent(&self) -> Option<ResourceKind> {
        match self {
            Self::AssetFilter => Some(Self::Asset),
            Self::LiveOutput => Some(Self::LiveEvent),
            _ => None,
        }
    }

    /// Whether a create returns before provisioning has finished.
    pub fn is_long_running(&self) -> bool {
        matches!(
            self,
            Self::StreamingEndpoint | Self::LiveEvent | Self::LiveOutput
        )
    }

    /// Extra query parameters for a create call.
    pub fn create_query(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::StreamingEndpoint | Self::LiveEvent => &[("autoStart", "false")],
            _ => &[],
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segment())
    }
}

/// Account and asset filters (presentation range, tracks, first quality).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterProperties {
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub outputs: Vec<Value>,
    #[serde(default, skip_serializing)]
    pub created: Option<String>,
    #[serde(default, skip_serializing)]
    pub last_modified: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentKeyPolicyProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Policy options; listings return them without key material
    #[serde(default)]
    pub options: Vec<Value>,
    #[serde(default, skip_serializing)]
    pub policy_id: Option<String>,
    #[serde(default, skip_serializing)]
    pub created: Option<String>,
    #[serde(default, skip_serializing)]
    pub last_modified: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamingEndpointProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_units: Option<u32>,
    #[serde(default, skip_serializing)]
    pub host_name: Option<String>,
    #[serde(default, skip_serializing)]
    pub provisioning_state: Option<String>,
    #[serde(default, skip_serializing)]
    pub resource_state: Option<String>,
    #[serde(default, skip_serializing)]
    pub free_trial_end_time: Option<String>,
    #[serde(default, skip_serializing)]
    pub created: Option<String>,
    #[serde(default, skip_serializing)]
    pub last_modified: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternate_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Blob container name; the service picks one when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_account_name: Option<String>,
    #[serde(default, skip_serializing)]
    pub asset_id: Option<String>,
    #[serde(default, skip_serializing)]
    pub storage_encryption_format: Option<String>,
    #[serde(default, skip_serializing)]
    pub created: Option<String>,
    #[serde(default, skip_serializing)]
    pub last_modified: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamingLocatorProperties {
    pub asset_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub streaming_policy_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_content_key_policy_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content_keys: Vec<StreamingLocatorContentKey>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub streaming_locator_id: Option<String>,
    #[serde(default, skip_serializing)]
    pub created: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One content key of a streaming locator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamingLocatorContentKey {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_reference_in_streaming_policy: Option<String>,
    /// Key material; only present in `listContentKeys` responses
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, rename = "type", skip_serializing)]
    pub key_type: Option<String>,
    #[serde(default, skip_serializing)]
    pub policy_name: Option<String>,
    #[serde(default, skip_serializing)]
    pub tracks: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveEventProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<Value>,
    #[serde(default, skip_serializing)]
    pub provisioning_state: Option<String>,
    #[serde(default, skip_serializing)]
    pub resource_state: Option<String>,
    #[serde(default, skip_serializing)]
    pub created: Option<String>,
    #[serde(default, skip_serializing)]
    pub last_modified: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveOutputProperties {
    pub asset_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_window_length: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest_name: Option<String>,
    #[serde(default, skip_serializing)]
    pub provisioning_state: Option<String>,
    #[serde(default, skip_serializing)]
    pub resource_state: Option<String>,
    #[serde(default, skip_serializing)]
    pub created: Option<String>,
    #[serde(default, skip_serializing)]
    pub last_modified: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The media account itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaServiceProperties {
    #[serde(default)]
    pub storage_accounts: Vec<StorageAccountRef>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageAccountRef {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, rename = "type")]
    pub account_type: Option<String>,
}

impl StorageAccountRef {
    pub fn is_primary(&self) -> bool {
        self.account_type
            .as_deref()
            .is_some_and(|t| t.eq_ignore_ascii_case("primary"))
    }
}

pub type AccountFilter = ArmResource<FilterProperties>;
pub type AssetFilter = ArmResource<FilterProperties>;
pub type Transform = ArmResource<TransformProperties>;
pub type ContentKeyPolicy = ArmResource<ContentKeyPolicyProperties>;
pub type StreamingEndpoint = ArmResource<StreamingEndpointProperties>;
pub type Asset = ArmResource<AssetProperties>;
pub type StreamingLocator = ArmResource<StreamingLocatorProperties>;
pub type LiveEvent = ArmResource<LiveEventProperties>;
pub type LiveOutput = ArmResource<LiveOutputProperties>;
pub type MediaService = ArmResource<MediaServiceProperties>;

// =============================================================================
// Wire-only response types
// =============================================================================

/// One page of an ARM listing.
#[derive(Debug, Deserialize)]
pub(crate) struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
    #[serde(default, rename = "@odata.nextLink")]
    pub next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ContentKeysResponse {
    #[serde(default)]
    pub content_keys: Vec<StreamingLocatorContentKey>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ContainerSasResponse {
    #[serde(default)]
    pub asset_container_sas_urls: Vec<String>,
}

/// Permissions requested from `listContainerSas`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ContainerPermission {
    Read,
    ReadWrite,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ContainerSasRequest {
    pub permissions: ContainerPermission,
    pub expiry_time: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_asset_read_only_fields_not_serialized() {
        let listed = json!({
            "name": "asset-1",
            "id": "/subscriptions/s/resourceGroups/rg/providers/Microsoft.Media/mediaservices/src/assets/asset-1",
            "type": "Microsoft.Media/mediaservices/assets",
            "systemData": {"createdBy": "someone"},
            "properties": {
                "assetId": "1b2c",
                "created": "2024-01-01T00:00:00Z",
                "lastModified": "2024-01-01T00:00:00Z",
                "alternateId": "alt",
                "container": "asset-1b2c",
                "storageAccountName": "srcstore",
                "storageEncryptionFormat": "None"
            }
        });

        let asset: Asset = serde_json::from_value(listed).unwrap();
        assert_eq!(asset.properties.asset_id.as_deref(), Some("1b2c"));

        let body = serde_json::to_value(&asset).unwrap();
        assert!(body.get("id").is_none());
        assert!(body.get("type").is_none());
        assert!(body.get("systemData").is_none());
        assert_eq!(
            body["properties"],
            json!({
                "alternateId": "alt",
                "container": "asset-1b2c",
                "storageAccountName": "srcstore"
            })
        );
    }

    #[test]
    fn test_unknown_properties_kept_verbatim() {
        let listed = json!({
            "name": "f1",
            "properties": {
                "presentationTimeRange": {"startTimestamp": 0, "timescale": 10_000_000},
                "firstQuality": {"bitrate": 128_000},
                "tracks": [{"trackSelections": [{"property": "Type", "operation": "Equal", "value": "Audio"}]}]
            }
        });

        let filter: AccountFilter = serde_json::from_value(listed.clone()).unwrap();
        let body = serde_json::to_value(&filter).unwrap();

        assert_eq!(body["properties"], listed["properties"]);
    }

    #[test]
    fn test_locator_content_key_drops_read_only_fields() {
        let key: StreamingLocatorContentKey = serde_json::from_value(json!({
            "id": "2f5c4e3a-0000-0000-0000-000000000001",
            "type": "CommonEncryptionCenc",
            "labelReferenceInStreamingPolicy": "cencDefaultKey",
            "value": "c2VjcmV0",
            "policyName": "policy-1",
            "tracks": [{"trackSelections": []}]
        }))
        .unwrap();

        assert_eq!(
            serde_json::to_value(&key).unwrap(),
            json!({
                "id": "2f5c4e3a-0000-0000-0000-000000000001",
                "labelReferenceInStreamingPolicy": "cencDefaultKey",
                "value": "c2VjcmV0"
            })
        );
    }

    #[test]
    fn test_list_response_next_link() {
        let page: ListResponse<Transform> = serde_json::from_value(json!({
            "value": [{"name": "t1", "properties": {"outputs": []}}],
            "@odata.nextLink": "https://management.azure.com/next?$skiptoken=abc"
        }))
        .unwrap();

        assert_eq!(page.value.len(), 1);
        assert!(page.next_link.unwrap().contains("skiptoken"));
    }

    #[test]
    fn test_long_running_kinds() {
        assert!(ResourceKind::StreamingEndpoint.is_long_running());
        assert!(ResourceKind::LiveEvent.is_long_running());
        assert!(!ResourceKind::Asset.is_long_running());
        assert_eq!(ResourceKind::LiveEvent.create_query(), &[("autoStart", "false")]);
        assert_eq!(ResourceKind::AssetFilter.parent(), Some(ResourceKind::Asset));
    }

    #[test]
    fn test_primary_storage_account() {
        let account: MediaService = serde_json::from_value(json!({
            "name": "src",
            "location": "westeurope",
            "properties": {
                "storageAccounts": [
                    {"id": "/subscriptions/s/resourceGroups/rg/providers/Microsoft.Storage/storageAccounts/secondary", "type": "Secondary"},
                    {"id": "/subscriptions/s/resourceGroups/rg/providers/Microsoft.Storage/storageAccounts/primary", "type": "Primary"}
                ]
            }
        }))
        .unwrap();

        let primary = account
            .properties
            .storage_accounts
            .iter()
            .find(|s| s.is_primary())
            .unwrap();
        assert!(primary.id.as_deref().unwrap().ends_with("/primary"));
    }
}
