use crate::error::DistSortError;
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::path::Path;
use tokio::fs;
use tracing::debug;

/// Load a TOML config file, or the defaults when no path is given.
///
/// A path that is given but missing is an error rather than a silent
/// fall back to defaults.
pub async fn load_config<T>(path: Option<&Path>) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let Some(path) = path else {
        debug!("No config file given, using defaults");
        return Ok(T::default());
    };

    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config = toml::from_str(&content)
        .map_err(|e| DistSortError::config_parse(e.to_string()))
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;

    debug!("Loaded config from {}", path.display());
    Ok(config)
}
