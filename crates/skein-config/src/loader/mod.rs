//! Config loading from files, strings, and ordered layers.

mod merge;

#[cfg(test)]
mod tests;

use crate::{ConfigError, SkeinConfig, StoreBackend};
use directories::UserDirs;
use log::{debug, info};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// Default config filename in local layers.
const DEFAULT_CONFIG_FILE: &str = "skein.json5";
/// Default config directory under the user's home.
const DEFAULT_CONFIG_DIR: &str = ".skein";

/// Effective config plus the layers that contributed to it.
#[derive(Debug, Clone)]
pub struct LayeredConfig {
    /// The merged, validated config.
    pub config: SkeinConfig,
    /// Paths that were found and merged, lowest precedence first.
    pub layers: Vec<PathBuf>,
}

/// Default layer locations, lowest precedence first: the user config under
/// `~/.skein/` and then `skein.json5` in `cwd`.
pub fn default_layer_paths(cwd: impl AsRef<Path>) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(dirs) = UserDirs::new() {
        paths.push(
            dirs.home_dir()
                .join(DEFAULT_CONFIG_DIR)
                .join(DEFAULT_CONFIG_FILE),
        );
    }
    paths.push(cwd.as_ref().join(DEFAULT_CONFIG_FILE));
    paths
}

impl SkeinConfig {
    /// Load a single config from a path (no layering).
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        info!("loading config from path: {}", path.as_ref().display());
        let contents = fs::read_to_string(path)?;
        let value: Value = json5::from_str(&contents)?;
        config_from_value(value)
    }

    /// Load a single config from JSON5 contents (no layering).
    pub fn load_from_str(contents: &str) -> Result<Self, ConfigError> {
        debug!("loading config from raw contents (len={})", contents.len());
        let value: Value = json5::from_str(contents)?;
        config_from_value(value)
    }

    /// Load the default layers for `cwd`.
    pub fn load_layered(cwd: impl AsRef<Path>) -> Result<LayeredConfig, ConfigError> {
        Self::load_layered_from(&default_layer_paths(cwd))
    }

    /// Merge the given layers in order; later layers override earlier ones.
    /// Missing files are skipped.
    pub fn load_layered_from(paths: &[PathBuf]) -> Result<LayeredConfig, ConfigError> {
        let mut merged = Value::Object(serde_json::Map::new());
        let mut layers = Vec::new();
        for path in paths {
            if !path.exists() {
                debug!("skipping missing layer (path={})", path.display());
                continue;
            }
            debug!("loading config layer (path={})", path.display());
            let contents = fs::read_to_string(path)?;
            let value: Value = json5::from_str(&contents)?;
            merge::overlay_layer(&mut merged, &value);
            layers.push(path.clone());
        }
        let config = config_from_value(merged)?;
        info!("layered config loaded (layers={})", layers.len());
        Ok(LayeredConfig { config, layers })
    }

    /// Validate configuration invariants that cannot be expressed in serde.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.backend == StoreBackend::Jsonl
            && self
                .store
                .path
                .as_deref()
                .is_none_or(|path| path.trim().is_empty())
        {
            return Err(ConfigError::InvalidField {
                path: "store.path".to_string(),
                message: "jsonl backend requires a path".to_string(),
            });
        }
        if self.history.recall_limit == Some(0) {
            return Err(ConfigError::InvalidField {
                path: "history.recall_limit".to_string(),
                message: "must be greater than zero when set".to_string(),
            });
        }
        Ok(())
    }
}

fn config_from_value(value: Value) -> Result<SkeinConfig, ConfigError> {
    let config: SkeinConfig = serde_json::from_value(value)?;
    config.validate()?;
    Ok(config)
}
