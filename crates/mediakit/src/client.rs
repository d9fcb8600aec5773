//! Resource Manager client for one Media Services account.

use crate::account::{self, API_VERSION, AccountContext, AccountInfo};
use crate::auth::Credential;
use crate::collection::{MediaChildren, MediaCollection};
use crate::error::{Error, Result};
use crate::models::{
    ContainerPermission, ContainerSasRequest, ContainerSasResponse, ContentKeyPolicyProperties,
    ContentKeysResponse, ListResponse, MediaService, ResourceKind, ResourceProperties,
    StreamingLocatorContentKey,
};
use crate::retry::{LogCallback, with_retry};
use crate::types::ClientOptions;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use ureq::Body;
use ureq::http::Response;
use url::Url;

/// Authenticated client bound to one account.
pub struct MediaClient {
    agent: ureq::Agent,
    credential: Credential,
    account: AccountInfo,
    /// `{endpoint}{account id}`
    base_url: String,
    options: ClientOptions,
}

impl MediaClient {
    /// Authenticate and resolve the account.
    ///
    /// Acquires a token eagerly so bad credentials fail before any
    /// replication starts, then reads the account to resolve its location
    /// and storage account.
    pub fn connect(context: &AccountContext, options: &ClientOptions) -> Result<Arc<Self>> {
        let agent = options.agent();
        let endpoint = context.management_endpoint.trim_end_matches('/').to_string();
        let credential = Credential::new(agent.clone(), context.auth.clone(), &endpoint);

        credential.token()?;
        log::info!("Authenticated to account {}", context.account_name);

        let account_id = context.account_id();
        let mut client = Self {
            agent,
            credential,
            account: AccountInfo {
                name: context.account_name.clone(),
                id: account_id.clone(),
                location: String::new(),
                storage_account_name: String::new(),
                storage_account_id: String::new(),
            },
            base_url: format!("{endpoint}{account_id}"),
            options: options.clone(),
        };

        let service: MediaService = client.get_json(&client.url("", &[])?)?;
        client.account = resolve_account(context, &service)?;
        log::debug!("Resolved account {:?}", client.account);

        Ok(Arc::new(client))
    }

    /// The resolved account.
    pub fn account(&self) -> &AccountInfo {
        &self.account
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Handle to a top-level collection.
    pub fn collection<P: ResourceProperties>(
        self: &Arc<Self>,
        kind: ResourceKind,
    ) -> MediaCollection<P> {
        MediaCollection::new(Arc::clone(self), kind, kind.segment().to_string())
    }

    /// Handle to the children of one kind under each parent.
    pub fn children<P: ResourceProperties>(
        self: &Arc<Self>,
        kind: ResourceKind,
    ) -> MediaChildren<P> {
        MediaChildren::new(Arc::clone(self), kind)
    }

    /// Build an account-relative URL with the api-version and extra query.
    pub fn url(&self, path: &str, query: &[(&str, &str)]) -> Result<Url> {
        let full = if path.is_empty() {
            self.base_url.clone()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        };

        let mut url = Url::parse(&full)?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("api-version", API_VERSION);
            for (k, v) in query {
                pairs.append_pair(k, v);
            }
        }
        Ok(url)
    }

    fn bearer(&self) -> Result<String> {
        Ok(format!("Bearer {}", self.credential.token()?))
    }

    /// GET and decode a JSON body.
    pub fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<T> {
        let operation = format!("GET {}", url.path());
        with_retry(
            &self.options.retry,
            Some(&LogCallback {
                operation: &operation,
            }),
            || {
                let response = self
                    .agent
                    .get(url.as_str())
                    .header("Authorization", self.bearer()?)
                    .call()?;
                read_json(response)
            },
        )
    }

    /// GET a resource, mapping 404 to `None`.
    pub fn get_optional<T: DeserializeOwned>(&self, url: &Url) -> Result<Option<T>> {
        match self.get_json(url) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// PUT a JSON body and decode the response.
    pub fn put_json<B: Serialize, T: DeserializeOwned>(&self, url: &Url, body: &B) -> Result<T> {
        let operation = format!("PUT {}", url.path());
        with_retry(
            &self.options.retry,
            Some(&LogCallback {
                operation: &operation,
            }),
            || {
                let response = self
                    .agent
                    .put(url.as_str())
                    .header("Authorization", self.bearer()?)
                    .send_json(body)?;
                read_json(response)
            },
        )
    }

    /// POST an action, with or without a JSON body.
    pub fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        url: &Url,
        body: Option<&B>,
    ) -> Result<T> {
        let operation = format!("POST {}", url.path());
        with_retry(
            &self.options.retry,
            Some(&LogCallback {
                operation: &operation,
            }),
            || {
                let request = self
                    .agent
                    .post(url.as_str())
                    .header("Authorization", self.bearer()?);
                let response = match body {
                    Some(body) => request.send_json(body)?,
                    None => request.send_empty()?,
                };
                read_json(response)
            },
        )
    }

    /// Fetch one page of a collection.
    ///
    /// `token` is the absolute `@odata.nextLink` of the previous page.
    pub fn list_page<T: DeserializeOwned>(
        &self,
        path: &str,
        token: Option<&str>,
    ) -> Result<(Vec<T>, Option<String>)> {
        let url = match token {
            Some(next) => Url::parse(next)?,
            None => self.url(path, &[])?,
        };
        let page: ListResponse<T> = self.get_json(&url)?;
        Ok((page.value, page.next_link))
    }

    /// Poll a resource until its provisioning state is terminal.
    pub fn wait_for_provisioning(&self, url: &Url, name: &str) -> Result<()> {
        let poll = &self.options.poll;
        let started = Instant::now();

        loop {
            let resource: Value = self.get_json(url)?;
            let state = resource
                .pointer("/properties/provisioningState")
                .and_then(Value::as_str)
                .unwrap_or("Succeeded");

            match state {
                "Succeeded" => return Ok(()),
                "Failed" | "Canceled" => {
                    return Err(Error::Provisioning {
                        name: name.to_string(),
                        state: state.to_string(),
                    });
                }
                _ => log::debug!("{name} is {state}"),
            }

            if started.elapsed() >= poll.timeout {
                return Err(Error::Timeout {
                    what: format!("provisioning of {name}"),
                    seconds: poll.timeout.as_secs(),
                });
            }
            thread::sleep(poll.interval);
        }
    }

    /// Content key policy options including key material.
    pub fn content_key_policy_with_secrets(
        &self,
        name: &str,
    ) -> Result<ContentKeyPolicyProperties> {
        let url = self.url(
            &format!(
                "{}/{name}/getPolicyPropertiesWithSecrets",
                ResourceKind::ContentKeyPolicy.segment()
            ),
            &[],
        )?;
        self.post_json::<Value, _>(&url, None)
    }

    /// Content keys of a streaming locator, including their values.
    pub fn list_content_keys(&self, locator: &str) -> Result<Vec<StreamingLocatorContentKey>> {
        let url = self.url(
            &format!(
                "{}/{locator}/listContentKeys",
                ResourceKind::StreamingLocator.segment()
            ),
            &[],
        )?;
        let response: ContentKeysResponse = self.post_json::<Value, _>(&url, None)?;
        Ok(response.content_keys)
    }

    /// SAS URLs for an asset's blob container.
    pub fn list_container_sas(
        &self,
        asset: &str,
        permissions: ContainerPermission,
        expiry: DateTime<Utc>,
    ) -> Result<Vec<Url>> {
        let url = self.url(
            &format!("{}/{asset}/listContainerSas", ResourceKind::Asset.segment()),
            &[],
        )?;
        let request = ContainerSasRequest {
            permissions,
            expiry_time: expiry.to_rfc3339_opts(SecondsFormat::Secs, true),
        };
        let response: ContainerSasResponse = self.post_json(&url, Some(&request))?;

        response
            .asset_container_sas_urls
            .iter()
            .map(|u| Url::parse(u).map_err(Error::from))
            .collect()
    }
}

/// Read a response body, turning non-2xx statuses into API errors.
fn read_json<T: DeserializeOwned>(mut response: Response<Body>) -> Result<T> {
    let status = response.status().as_u16();
    let body = response.body_mut().read_to_string()?;

    if !(200..300).contains(&status) {
        return Err(Error::from_response(status, &body));
    }

    if body.trim().is_empty() {
        return Ok(serde_json::from_value(Value::Null)?);
    }
    Ok(serde_json::from_str(&body)?)
}

/// Fill in location and storage account from the account resource.
fn resolve_account(context: &AccountContext, service: &MediaService) -> Result<AccountInfo> {
    let location = context
        .location
        .clone()
        .or_else(|| service.location.clone())
        .ok_or_else(|| {
            Error::Other(format!(
                "account {} has no location; set it in the configuration",
                context.account_name
            ))
        })?;

    let storage_accounts = &service.properties.storage_accounts;
    let (storage_account_name, storage_account_id) = match &context.storage_account_name {
        Some(name) => {
            let id = storage_accounts
                .iter()
                .filter_map(|s| s.id.as_deref())
                .find(|id| account::resource_name(id).eq_ignore_ascii_case(name))
                .map(str::to_string)
                .unwrap_or_else(|| {
                    account::storage_account_id(
                        &context.subscription_id,
                        &context.resource_group,
                        name,
                    )
                });
            (name.clone(), id)
        }
        None => {
            let id = storage_accounts
                .iter()
                .find(|s| s.is_primary())
                .or_else(|| storage_accounts.first())
                .and_then(|s| s.id.clone())
                .ok_or_else(|| {
                    Error::Other(format!(
                        "account {} has no storage account; set storage_account_name in the configuration",
                        context.account_name
                    ))
                })?;
            (account::resource_name(&id).to_string(), id)
        }
    };

    Ok(AccountInfo {
        name: context.account_name.clone(),
        id: context.account_id(),
        location,
        storage_account_name,
        storage_account_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{AuthSettings, DEFAULT_AUTHORITY, DEFAULT_MANAGEMENT_ENDPOINT};
    use serde_json::json;

    fn context() -> AccountContext {
        AccountContext {
            subscription_id: "sub".into(),
            resource_group: "rg".into(),
            account_name: "media1".into(),
            storage_account_name: None,
            location: None,
            auth: AuthSettings {
                tenant_id: "t".into(),
                client_id: "c".into(),
                client_secret: "s".into(),
                authority: DEFAULT_AUTHORITY.into(),
            },
            management_endpoint: DEFAULT_MANAGEMENT_ENDPOINT.into(),
        }
    }

    fn service() -> MediaService {
        serde_json::from_value(json!({
            "name": "media1",
            "location": "westus2",
            "properties": {
                "storageAccounts": [{
                    "id": "/subscriptions/sub/resourceGroups/other-rg/providers/Microsoft.Storage/storageAccounts/media1store",
                    "type": "Primary"
                }]
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_resolve_account_from_service() {
        let info = resolve_account(&context(), &service()).unwrap();

        assert_eq!(info.location, "westus2");
        assert_eq!(info.storage_account_name, "media1store");
        assert!(info.storage_account_id.contains("/resourceGroups/other-rg/"));
    }

    #[test]
    fn test_resolve_account_prefers_configuration() {
        let mut ctx = context();
        ctx.location = Some("eastus".into());
        ctx.storage_account_name = Some("MEDIA1STORE".into());

        let info = resolve_account(&ctx, &service()).unwrap();

        assert_eq!(info.location, "eastus");
        assert_eq!(info.storage_account_name, "MEDIA1STORE");
        assert!(info.storage_account_id.ends_with("/media1store"));
    }

    #[test]
    fn test_resolve_account_without_storage_fails() {
        let mut svc = service();
        svc.properties.storage_accounts.clear();

        assert!(resolve_account(&context(), &svc).is_err());
    }
}
