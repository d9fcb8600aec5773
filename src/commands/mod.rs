pub mod check;
pub mod run;

use crate::config::Config;
use crate::paths;
use anyhow::Result;
use std::path::{Path, PathBuf};

/// Resolve and load the configuration file
fn load_config(explicit: Option<&Path>) -> Result<(PathBuf, Config)> {
    let path = paths::config_file(explicit)?;
    log::debug!("Loading configuration from {}", path.display());
    let config = Config::load(&path)?;
    Ok((path, config))
}
