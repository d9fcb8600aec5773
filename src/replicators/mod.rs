//! Category reconcilers
//!
//! Each reconciler binds a source/destination collection pair (plus any
//! kind-specific handle) and runs `converge::replicate` with its own
//! mapping and post-create hooks. Construction performs no I/O.

mod assets;
mod content_key_policies;
mod live_events;
mod streaming_locators;
mod verbatim;

pub use assets::AssetReconciler;
pub use content_key_policies::ContentKeyPolicyReconciler;
pub use live_events::LiveEventReconciler;
pub use streaming_locators::StreamingLocatorReconciler;
pub use verbatim::VerbatimReconciler;

use anyhow::Result;
use converge::SyncOptions;
use mediakit::{
    AccountTranslator, ContentCopier, ContentKeyPolicyProperties, MediaClient,
    StreamingLocatorContentKey, TransferStats,
};

/// Settings shared by every reconciler of a run
#[derive(Debug, Clone)]
pub struct ReplicationSettings {
    pub translator: AccountTranslator,
    pub sync: SyncOptions,
}

/// Source of content key policy options including key material
pub trait PolicySecrets: Sync {
    fn policy_with_secrets(&self, name: &str) -> Result<ContentKeyPolicyProperties>;
}

impl PolicySecrets for MediaClient {
    fn policy_with_secrets(&self, name: &str) -> Result<ContentKeyPolicyProperties> {
        Ok(self.content_key_policy_with_secrets(name)?)
    }
}

/// Source of streaming locator key values
pub trait LocatorKeys: Sync {
    fn content_keys(&self, locator: &str) -> Result<Vec<StreamingLocatorContentKey>>;
}

impl LocatorKeys for MediaClient {
    fn content_keys(&self, locator: &str) -> Result<Vec<StreamingLocatorContentKey>> {
        Ok(self.list_content_keys(locator)?)
    }
}

/// Copies the blobs missing from the same-named destination asset
pub trait ContentTransfer: Sync {
    fn transfer(&self, asset: &str) -> Result<TransferStats>;
}

impl ContentTransfer for ContentCopier {
    fn transfer(&self, asset: &str) -> Result<TransferStats> {
        Ok(self.copy_asset(asset)?)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::ReplicationSettings;
    use converge::SyncOptions;
    use mediakit::{AccountInfo, AccountTranslator};

    pub const SOURCE_ID: &str =
        "/subscriptions/sub/resourceGroups/rg-src/providers/Microsoft.Media/mediaservices/srcmedia";
    pub const DESTINATION_ID: &str =
        "/subscriptions/sub/resourceGroups/rg-dst/providers/Microsoft.Media/mediaservices/dstmedia";

    pub fn source_info() -> AccountInfo {
        AccountInfo {
            name: "srcmedia".to_string(),
            id: SOURCE_ID.to_string(),
            location: "eastus".to_string(),
            storage_account_name: "srcstorage".to_string(),
            storage_account_id: "/subscriptions/sub/resourceGroups/rg-src/providers/Microsoft.Storage/storageAccounts/srcstorage".to_string(),
        }
    }

    pub fn destination_info() -> AccountInfo {
        AccountInfo {
            name: "dstmedia".to_string(),
            id: DESTINATION_ID.to_string(),
            location: "westeurope".to_string(),
            storage_account_name: "dststorage".to_string(),
            storage_account_id: "/subscriptions/sub/resourceGroups/rg-dst/providers/Microsoft.Storage/storageAccounts/dststorage".to_string(),
        }
    }

    pub fn settings(dry_run: bool) -> ReplicationSettings {
        ReplicationSettings {
            translator: AccountTranslator::new(&source_info(), &destination_info()),
            sync: SyncOptions { dry_run, jobs: 4 },
        }
    }
}
