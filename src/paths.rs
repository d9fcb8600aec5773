//! Centralized path resolution for mediasync
//!
//! # Environment Variables
//!
//! - `MEDIASYNC_CONFIG` - Path of the configuration file
//! - `MEDIASYNC_CONFIG_DIR` - Override config directory
//! - `MEDIASYNC_LOG_DIR` - Override run log directory
//!
//! # Path Resolution Priority
//!
//! For config_dir():
//! 1. `MEDIASYNC_CONFIG_DIR` environment variable
//! 2. `XDG_CONFIG_HOME/mediasync` (if set)
//! 3. Platform default:
//!    - Windows: `%APPDATA%\mediasync`
//!    - macOS/Linux: `~/.config/mediasync`
//!
//! For log_dir():
//! 1. `MEDIASYNC_LOG_DIR` environment variable
//! 2. `XDG_STATE_HOME/mediasync/logs` (if set)
//! 3. Platform default:
//!    - Windows: `%LOCALAPPDATA%\mediasync\logs`
//!    - macOS/Linux: `~/.local/state/mediasync/logs`

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Environment variable for the configuration file
pub const ENV_CONFIG: &str = "MEDIASYNC_CONFIG";

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "MEDIASYNC_CONFIG_DIR";

/// Environment variable for log directory override
pub const ENV_LOG_DIR: &str = "MEDIASYNC_LOG_DIR";

/// Default configuration file name
pub const CONFIG_FILE: &str = "config.toml";

/// Get the mediasync config directory path
pub fn config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_CONFIG_DIR) {
        let path = expand(&dir);
        log::debug!(
            "Using config dir from {}: {}",
            ENV_CONFIG_DIR,
            path.display()
        );
        return Ok(path);
    }

    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        let path = PathBuf::from(xdg_config).join("mediasync");
        log::debug!("Using XDG_CONFIG_HOME: {}", path.display());
        return Ok(path);
    }

    #[cfg(windows)]
    {
        if let Some(app_data) = dirs::config_dir() {
            return Ok(app_data.join("mediasync"));
        }
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("mediasync"))
}

/// Resolve the configuration file
///
/// Priority:
/// 1. `--config` argument
/// 2. `MEDIASYNC_CONFIG` env var
/// 3. `<config dir>/config.toml`
pub fn config_file(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(expand(&path.to_string_lossy()));
    }

    if let Ok(path) = std::env::var(ENV_CONFIG) {
        log::debug!("Using config file from {ENV_CONFIG}: {path}");
        return Ok(expand(&path));
    }

    Ok(config_dir()?.join(CONFIG_FILE))
}

/// Get the run log directory
///
/// Priority:
/// 1. `MEDIASYNC_LOG_DIR` env var
/// 2. `XDG_STATE_HOME/mediasync/logs`
/// 3. Platform default
pub fn log_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_LOG_DIR) {
        let path = expand(&dir);
        log::debug!("Using log dir from {}: {}", ENV_LOG_DIR, path.display());
        return Ok(path);
    }

    if let Ok(xdg_state) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg_state).join("mediasync").join("logs"));
    }

    #[cfg(windows)]
    {
        if let Some(local_app_data) = dirs::data_local_dir() {
            return Ok(local_app_data.join("mediasync").join("logs"));
        }
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home
        .join(".local")
        .join("state")
        .join("mediasync")
        .join("logs"))
}

/// Expand ~ and environment variables in a path string.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

// ============================================================================
// Tests
// ============================================================================
