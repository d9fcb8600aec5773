//! Run configuration: both accounts plus replication options
//!
//! Loaded from a TOML or JSON file (picked by extension). Client secrets
//! may be kept out of the file and supplied through
//! `MEDIASYNC_SOURCE_CLIENT_SECRET` / `MEDIASYNC_DESTINATION_CLIENT_SECRET`.

use crate::paths;
use anyhow::{Context, Result, bail};
use mediakit::account::{DEFAULT_AUTHORITY, DEFAULT_MANAGEMENT_ENDPOINT};
use mediakit::{AccountContext, AuthSettings, ClientOptions, PollConfig, RetryConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable holding the source account's client secret
pub const ENV_SOURCE_SECRET: &str = "MEDIASYNC_SOURCE_CLIENT_SECRET";

/// Environment variable holding the destination account's client secret
pub const ENV_DESTINATION_SECRET: &str = "MEDIASYNC_DESTINATION_CLIENT_SECRET";

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    /// Detect the format from a file extension (TOML unless `.json`)
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Toml,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub source: AccountConfig,
    pub destination: AccountConfig,
    #[serde(default)]
    pub options: Options,
}

/// One Media Services account and the service principal used to reach it
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountConfig {
    #[serde(default)]
    pub subscription_id: String,
    #[serde(default)]
    pub resource_group: String,
    #[serde(default)]
    pub account_name: String,
    /// Resolved from the account's primary storage account when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_account_name: Option<String>,
    /// Resolved from the account when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default)]
    pub tenant_id: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default, skip_serializing)]
    pub client_secret: String,
    #[serde(default = "default_authority")]
    pub authority: String,
    #[serde(default = "default_management_endpoint")]
    pub management_endpoint: String,
}

fn default_authority() -> String {
    DEFAULT_AUTHORITY.to_string()
}

fn default_management_endpoint() -> String {
    DEFAULT_MANAGEMENT_ENDPOINT.to_string()
}

impl AccountConfig {
    /// Names of required fields that are empty
    fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("subscription_id", &self.subscription_id),
            ("resource_group", &self.resource_group),
            ("account_name", &self.account_name),
            ("tenant_id", &self.tenant_id),
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }

    pub fn to_context(&self) -> AccountContext {
        AccountContext {
            subscription_id: self.subscription_id.clone(),
            resource_group: self.resource_group.clone(),
            account_name: self.account_name.clone(),
            storage_account_name: self.storage_account_name.clone(),
            location: self.location.clone(),
            auth: AuthSettings {
                tenant_id: self.tenant_id.clone(),
                client_id: self.client_id.clone(),
                client_secret: self.client_secret.clone(),
                authority: self.authority.clone(),
            },
            management_endpoint: self.management_endpoint.clone(),
        }
    }
}

/// Replication settings shared by every category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Relay asset content through this machine instead of a server-side copy
    pub copy_using_local_network: bool,
    /// Parallel creates per category
    pub jobs: usize,
    /// Run the remaining categories after one fails
    pub keep_going: bool,
    pub retry: RetryOptions,
    pub poll_interval_secs: u64,
    pub provisioning_timeout_secs: u64,
    /// Lifetime of the container SAS URLs used for content copies
    pub sas_expiry_hours: u64,
    /// Per-request timeout (0 = no limit)
    pub request_timeout_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            copy_using_local_network: false,
            jobs: 4,
            keep_going: false,
            retry: RetryOptions::default(),
            poll_interval_secs: 10,
            provisioning_timeout_secs: 30 * 60,
            sas_expiry_hours: 24,
            request_timeout_secs: 300,
            log_dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryOptions {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub backoff_factor: f64,
    pub max_delay_secs: u64,
}

impl Default for RetryOptions {
    fn default() -> Self {
        let defaults = RetryConfig::default();
        Self {
            max_attempts: defaults.max_attempts,
            base_delay_ms: defaults.base_delay.as_millis() as u64,
            backoff_factor: defaults.backoff_factor,
            max_delay_secs: defaults.max_delay.as_secs(),
        }
    }
}

impl Options {
    /// HTTP client settings derived from these options
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            retry: RetryConfig {
                max_attempts: self.retry.max_attempts.max(1),
                base_delay: Duration::from_millis(self.retry.base_delay_ms),
                backoff_factor: self.retry.backoff_factor,
                max_delay: Duration::from_secs(self.retry.max_delay_secs),
            },
            poll: PollConfig {
                interval: Duration::from_secs(self.poll_interval_secs),
                timeout: Duration::from_secs(self.provisioning_timeout_secs),
            },
            request_timeout: (self.request_timeout_secs > 0)
                .then(|| Duration::from_secs(self.request_timeout_secs)),
        }
    }

    pub fn sas_expiry(&self) -> Duration {
        Duration::from_secs(self.sas_expiry_hours.max(1).saturating_mul(3600))
    }

    /// Configured log directory, with `~` and variables expanded
    pub fn log_dir(&self) -> Option<PathBuf> {
        self.log_dir.as_deref().map(paths::expand)
    }
}

impl Config {
    /// Load, apply environment secrets, and validate
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = Self::read(path)?;
        config.apply_secrets(|key| std::env::var(key).ok());
        config
            .validate()
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;
        Ok(config)
    }

    /// Parse a configuration file without validating it
    pub fn read(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;

        match ConfigFormat::from_path(path) {
            ConfigFormat::Json => serde_json::from_str(&content)
                .with_context(|| format!("Invalid JSON in {}", path.display())),
            ConfigFormat::Toml => toml::from_str(&content)
                .with_context(|| format!("Invalid TOML in {}", path.display())),
        }
    }

    /// Fill client secrets from the environment; a set variable wins over the file
    pub fn apply_secrets(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(secret) = lookup(ENV_SOURCE_SECRET).filter(|s| !s.is_empty()) {
            self.source.client_secret = secret;
        }
        if let Some(secret) = lookup(ENV_DESTINATION_SECRET).filter(|s| !s.is_empty()) {
            self.destination.client_secret = secret;
        }
    }

    /// Check required fields and that the two accounts differ
    pub fn validate(&self) -> Result<()> {
        let missing: Vec<String> = self
            .source
            .missing_fields()
            .into_iter()
            .map(|f| format!("source.{f}"))
            .chain(
                self.destination
                    .missing_fields()
                    .into_iter()
                    .map(|f| format!("destination.{f}")),
            )
            .collect();

        if !missing.is_empty() {
            bail!("Missing required settings: {}", missing.join(", "));
        }

        if self.options.jobs == 0 {
            bail!("options.jobs must be at least 1");
        }

        if self.source.to_context().same_account(&self.destination.to_context()) {
            bail!(
                "Source and destination are the same account ({})",
                self.source.account_name
            );
        }

        Ok(())
    }
}
