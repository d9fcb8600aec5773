//! Account identity and resolution.

use std::fmt;

/// Management API version used for every Media Services call.
pub const API_VERSION: &str = "2023-01-01";

/// Public-cloud Azure AD authority.
pub const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";

/// Public-cloud Resource Manager endpoint.
pub const DEFAULT_MANAGEMENT_ENDPOINT: &str = "https://management.azure.com";

/// Service principal credentials for one account.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthSettings {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    /// Authority host (e.g. https://login.microsoftonline.com)
    pub authority: String,
}

impl fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSettings")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("authority", &self.authority)
            .finish()
    }
}

/// Everything needed to address one Media Services account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountContext {
    pub subscription_id: String,
    pub resource_group: String,
    pub account_name: String,
    /// Storage account holding asset containers (resolved when omitted)
    pub storage_account_name: Option<String>,
    /// Azure region (resolved when omitted)
    pub location: Option<String>,
    pub auth: AuthSettings,
    /// Resource Manager endpoint
    pub management_endpoint: String,
}

impl AccountContext {
    /// ARM resource id of the media account.
    pub fn account_id(&self) -> String {
        format!(
            "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Media/mediaservices/{}",
            self.subscription_id, self.resource_group, self.account_name
        )
    }

    /// Whether both contexts address the same account.
    pub fn same_account(&self, other: &AccountContext) -> bool {
        self.account_id().eq_ignore_ascii_case(&other.account_id())
            && self
                .management_endpoint
                .trim_end_matches('/')
                .eq_ignore_ascii_case(other.management_endpoint.trim_end_matches('/'))
    }
}

/// ARM resource id of a storage account.
pub fn storage_account_id(subscription_id: &str, resource_group: &str, name: &str) -> String {
    format!(
        "/subscriptions/{subscription_id}/resourceGroups/{resource_group}/providers/Microsoft.Storage/storageAccounts/{name}"
    )
}

/// Last segment of an ARM resource id.
pub fn resource_name(id: &str) -> &str {
    id.trim_end_matches('/').rsplit('/').next().unwrap_or(id)
}

/// An account after its location and storage account have been resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountInfo {
    pub name: String,
    /// ARM resource id of the media account
    pub id: String,
    pub location: String,
    pub storage_account_name: String,
    /// ARM resource id of the storage account
    pub storage_account_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(name: &str) -> AccountContext {
        AccountContext {
            subscription_id: "00000000-0000-0000-0000-000000000001".into(),
            resource_group: "media-rg".into(),
            account_name: name.into(),
            storage_account_name: None,
            location: None,
            auth: AuthSettings {
                tenant_id: "tenant".into(),
                client_id: "client".into(),
                client_secret: "s3cret".into(),
                authority: DEFAULT_AUTHORITY.into(),
            },
            management_endpoint: DEFAULT_MANAGEMENT_ENDPOINT.into(),
        }
    }

    #[test]
    fn test_account_id() {
        assert_eq!(
            context("src").account_id(),
            "/subscriptions/00000000-0000-0000-0000-000000000001/resourceGroups/media-rg/providers/Microsoft.Media/mediaservices/src"
        );
    }

    #[test]
    fn test_same_account_ignores_case() {
        assert!(context("Media1").same_account(&context("media1")));
        assert!(!context("media1").same_account(&context("media2")));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let debug = format!("{:?}", context("a").auth);
        assert!(!debug.contains("s3cret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_resource_name() {
        assert_eq!(
            resource_name(
                "/subscriptions/x/resourceGroups/rg/providers/Microsoft.Storage/storageAccounts/mediastore"
            ),
            "mediastore"
        );
        assert_eq!(resource_name("plain"), "plain");
    }
}
