//! Rewriting account-specific references when copying a resource.

use crate::account::AccountInfo;
use crate::error::Result;
use crate::models::ArmResource;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Maps references to the source account onto the destination account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountTranslator {
    source_account_id: String,
    destination_account_id: String,
    source_storage_id: String,
    destination_storage_id: String,
    source_storage_name: String,
    destination_storage_name: String,
    destination_location: String,
}

impl AccountTranslator {
    pub fn new(source: &AccountInfo, destination: &AccountInfo) -> Self {
        Self {
            source_account_id: source.id.clone(),
            destination_account_id: destination.id.clone(),
            source_storage_id: source.storage_account_id.clone(),
            destination_storage_id: destination.storage_account_id.clone(),
            source_storage_name: source.storage_account_name.clone(),
            destination_storage_name: destination.storage_account_name.clone(),
            destination_location: destination.location.clone(),
        }
    }

    pub fn destination_location(&self) -> &str {
        &self.destination_location
    }

    /// Rewrite source account and storage resource ids inside a string.
    pub fn rewrite_str(&self, value: &str) -> String {
        let value = replace_id_prefix(value, &self.source_account_id, &self.destination_account_id);
        replace_id_prefix(&value, &self.source_storage_id, &self.destination_storage_id)
    }

    /// Rewrite every string inside a JSON value.
    pub fn rewrite_value(&self, value: &mut Value) {
        match value {
            Value::String(s) => {
                let rewritten = self.rewrite_str(s);
                if rewritten != *s {
                    *s = rewritten;
                }
            }
            Value::Array(items) => items.iter_mut().for_each(|v| self.rewrite_value(v)),
            Value::Object(map) => map.values_mut().for_each(|v| self.rewrite_value(v)),
            _ => {}
        }
    }

    /// Destination storage account for a source storage account name.
    ///
    /// Only the source account's own storage account is mapped; names of
    /// other storage accounts are kept.
    pub fn storage_account_name(&self, name: &str) -> String {
        if name.eq_ignore_ascii_case(&self.source_storage_name) {
            self.destination_storage_name.clone()
        } else {
            name.to_string()
        }
    }

    /// Build the create body for a source resource.
    ///
    /// Properties go through [`rewrite_value`](Self::rewrite_value), a
    /// present location becomes the destination location, and the
    /// read-only envelope fields are cleared.
    pub fn resource<P>(&self, source: &ArmResource<P>) -> Result<ArmResource<P>>
    where
        P: Serialize + DeserializeOwned,
    {
        let mut properties = serde_json::to_value(&source.properties)?;
        self.rewrite_value(&mut properties);

        Ok(ArmResource {
            name: source.name.clone(),
            id: None,
            resource_type: None,
            location: source
                .location
                .as_ref()
                .map(|_| self.destination_location.clone()),
            tags: source.tags.clone(),
            system_data: None,
            properties: serde_json::from_value(properties)?,
        })
    }
}

/// Replace `from` with `to` wherever it appears as a whole resource id or
/// id prefix (followed by `/` or the end of the string), ignoring ASCII case.
fn replace_id_prefix(haystack: &str, from: &str, to: &str) -> String {
    if from.is_empty() || from.len() > haystack.len() {
        return haystack.to_string();
    }

    let lower_haystack = haystack.to_ascii_lowercase();
    let lower_from = from.to_ascii_lowercase();

    let mut result = String::with_capacity(haystack.len());
    let mut cursor = 0;
    let mut search = 0;

    // A candidate not ending on a segment boundary may overlap a later one
    while let Some(offset) = lower_haystack[search..].find(&lower_from) {
        let start = search + offset;
        let end = start + from.len();
        if matches!(haystack.as_bytes().get(end), None | Some(b'/')) {
            result.push_str(&haystack[cursor..start]);
            result.push_str(to);
            cursor = end;
            search = end;
        } else {
            search = start + lower_haystack[start..].chars().next().map_or(1, char::len_utf8);
        }
    }

    result.push_str(&haystack[cursor..]);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AssetProperties, FilterProperties, LiveOutputProperties};
    use serde_json::json;

    const SRC: &str =
        "/subscriptions/s1/resourceGroups/rg1/providers/Microsoft.Media/mediaservices/source";
    const DST: &str =
        "/subscriptions/s2/resourceGroups/rg2/providers/Microsoft.Media/mediaservices/dest";

    fn translator() -> AccountTranslator {
        AccountTranslator::new(
            &AccountInfo {
                name: "source".into(),
                id: SRC.into(),
                location: "westeurope".into(),
                storage_account_name: "srcstore".into(),
                storage_account_id: "/subscriptions/s1/resourceGroups/rg1/providers/Microsoft.Storage/storageAccounts/srcstore".into(),
            },
            &AccountInfo {
                name: "dest".into(),
                id: DST.into(),
                location: "northeurope".into(),
                storage_account_name: "dststore".into(),
                storage_account_id: "/subscriptions/s2/resourceGroups/rg2/providers/Microsoft.Storage/storageAccounts/dststore".into(),
            },
        )
    }

    #[test]
    fn test_rewrite_account_prefix_case_insensitive() {
        let t = translator();
        let input = format!("{}/transforms/t1", SRC.to_uppercase());
        assert_eq!(t.rewrite_str(&input), format!("{DST}/transforms/t1"));
    }

    #[test]
    fn test_rewrite_requires_segment_boundary() {
        let t = translator();
        let other_account = format!("{SRC}2/transforms/t1");
        assert_eq!(t.rewrite_str(&other_account), other_account);
    }

    #[test]
    fn test_rewrite_after_rejected_candidate() {
        let t = translator();
        let input = format!("{SRC}2 then {SRC}/assets/a1");
        assert_eq!(t.rewrite_str(&input), format!("{SRC}2 then {DST}/assets/a1"));

        assert_eq!(replace_id_prefix("xaaa", "aa", "B"), "xaB");
        assert_eq!(replace_id_prefix("AAA/aa", "aa", "B"), "AB/B");
    }

    #[test]
    fn test_rewrite_leaves_other_strings() {
        let t = translator();
        assert_eq!(t.rewrite_str("H264MultipleBitrate720p"), "H264MultipleBitrate720p");
    }

    #[test]
    fn test_storage_account_name_mapping() {
        let t = translator();
        assert_eq!(t.storage_account_name("SrcStore"), "dststore");
        assert_eq!(t.storage_account_name("otherstore"), "otherstore");
    }

    #[test]
    fn test_resource_rewrites_nested_ids_only() {
        let t = translator();
        let mut source = ArmResource::new(
            "f1",
            serde_json::from_value::<FilterProperties>(json!({
                "tracks": [{"trackSelections": [{"property": "Type", "value": "Video"}]}],
                "reference": format!("{SRC}/assets/a1")
            }))
            .unwrap(),
        );
        source.id = Some(format!("{SRC}/accountFilters/f1"));

        let mapped = t.resource(&source).unwrap();

        assert!(mapped.id.is_none());
        assert_eq!(mapped.properties.extra["reference"], json!(format!("{DST}/assets/a1")));
        assert_eq!(mapped.properties.extra["tracks"], source.properties.extra["tracks"]);
    }

    #[test]
    fn test_resource_location_only_when_present() {
        let t = translator();

        let mut located = ArmResource::new("e1", AssetProperties::default());
        located.location = Some("westeurope".into());
        assert_eq!(t.resource(&located).unwrap().location.as_deref(), Some("northeurope"));

        let unlocated = ArmResource::new("o1", LiveOutputProperties::default());
        assert!(t.resource(&unlocated).unwrap().location.is_none());
    }
}
