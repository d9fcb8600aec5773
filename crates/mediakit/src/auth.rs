//! Client-credentials token acquisition with caching.

use crate::account::AuthSettings;
use crate::error::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::sync::Mutex;

/// Tokens are refreshed this long before they expire.
const REFRESH_MARGIN_SECS: i64 = 300;

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(REFRESH_MARGIN_SECS) < self.expires_at
    }
}

/// Bearer token source for one service principal and one scope.
pub struct Credential {
    agent: ureq::Agent,
    settings: AuthSettings,
    scope: String,
    cache: Mutex<Option<CachedToken>>,
}

impl Credential {
    /// Create a credential for the given resource endpoint
    /// (scope `{endpoint}/.default`).
    pub fn new(agent: ureq::Agent, settings: AuthSettings, resource: &str) -> Self {
        Self {
            agent,
            settings,
            scope: format!("{}/.default", resource.trim_end_matches('/')),
            cache: Mutex::new(None),
        }
    }

    /// Token endpoint for the configured tenant.
    pub fn token_url(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.settings.authority.trim_end_matches('/'),
            self.settings.tenant_id
        )
    }

    /// Return a valid bearer token, fetching a new one when the cached
    /// token is missing or about to expire.
    pub fn token(&self) -> Result<String> {
        let mut cache = self
            .cache
            .lock()
            .map_err(|_| Error::Other("token cache poisoned".to_string()))?;

        if let Some(token) = cache.as_ref().filter(|t| t.is_fresh(Utc::now())) {
            return Ok(token.value.clone());
        }

        let token = self.fetch()?;
        let value = token.value.clone();
        *cache = Some(token);
        Ok(value)
    }

    fn fetch(&self) -> Result<CachedToken> {
        log::debug!(
            "Requesting token for client {} in tenant {}",
            self.settings.client_id,
            self.settings.tenant_id
        );

        let auth_error = |message: String| Error::Auth {
            tenant: self.settings.tenant_id.clone(),
            message,
        };

        let mut response = self
            .agent
            .post(&self.token_url())
            .send_form([
                ("grant_type", "client_credentials"),
                ("client_id", self.settings.client_id.as_str()),
                ("client_secret", self.settings.client_secret.as_str()),
                ("scope", self.scope.as_str()),
            ])
            .map_err(|e| auth_error(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| auth_error(e.to_string()))?;

        if !(200..300).contains(&status) {
            let message = serde_json::from_str::<TokenError>(&body)
                .map(|e| e.error_description.unwrap_or(e.error))
                .unwrap_or_else(|_| format!("HTTP {status}"));
            return Err(auth_error(message));
        }

        parse_token(&body, Utc::now()).map_err(|e| auth_error(e.to_string()))
    }
}

fn parse_token(body: &str, now: DateTime<Utc>) -> Result<CachedToken> {
    let response: TokenResponse = serde_json::from_str(body)?;
    Ok(CachedToken {
        value: response.access_token,
        expires_at: now + Duration::seconds(response.expires_in as i64),
    })
}

// =============================================================================
// Identity provider response types
// =============================================================================

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct TokenError {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}
