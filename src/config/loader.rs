//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::tree::ConfigTree;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),
}

/// Load a TOML file into a configuration tree.
pub fn load_config(path: &Path) -> Result<ConfigTree, ConfigError> {
    let content = fs::read_to_string(path)?;
    ConfigTree::from_toml_str(&content)
}
