use std::fs;
use std::path::{Path, PathBuf};

use crate::model::config::GridConfig;

pub const CONFIG_FILE: &str = "treegrid.toml";

/// Error type for workspace configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("not a treegrid workspace: no treegrid.toml found")]
    NotAWorkspace,
    #[error("could not read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse treegrid.toml: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("could not serialize treegrid.toml: {0}")]
    SerializeError(#[from] toml::ser::Error),
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Walk up from `start` to the first directory holding a `treegrid.toml`.
pub fn discover_workspace(start: &Path) -> Result<PathBuf, ConfigError> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(CONFIG_FILE).is_file() {
            return Ok(current);
        }
        if !current.pop() {
            return Err(ConfigError::NotAWorkspace);
        }
    }
}

pub fn read_config(root: &Path) -> Result<GridConfig, ConfigError> {
    let path = root.join(CONFIG_FILE);
    let text = fs::read_to_string(&path).map_err(|e| ConfigError::ReadError {
        path: path.clone(),
        source: e,
    })?;
    Ok(toml::from_str(&text)?)
}

pub fn write_config(root: &Path, config: &GridConfig) -> Result<(), ConfigError> {
    let text = toml::to_string_pretty(config)?;
    fs::write(root.join(CONFIG_FILE), text)?;
    Ok(())
}

/// Absolute path of the tree file named in the config
pub fn tree_path(root: &Path, config: &GridConfig) -> PathBuf {
    root.join(&config.grid.tree_file)
}
