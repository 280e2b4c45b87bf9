//! CLI configuration.
//!
//! Resolution order, lowest to highest: built-in defaults, the JSON config
//! file, then flags and their environment variables.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use vigil_store::StoreConfig;

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    /// Filter used when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of text
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            json: false,
        }
    }
}

/// Everything the CLI reads from its config file
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CliConfig {
    /// Trace store
    pub store: StoreConfig,
    /// Logging
    pub log: LogConfig,
    /// Templates applied by `ingest` when no expectations are given
    pub templates: Vec<String>,
    /// Bottlenecks reported by `analyze`
    pub top_n: Option<usize>,
}

/// Values supplied on the command line or through the environment
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// `--store` / `VIGIL_STORE`
    pub store: Option<PathBuf>,
    /// `--log-level` / `VIGIL_LOG`
    pub log_level: Option<String>,
    /// `--log-json`
    pub log_json: bool,
}

impl CliConfig {
    /// Parse a config file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or contains unknown keys
    pub fn from_file(path: &Path) -> color_eyre::Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Defaults, then the optional file, then overrides
    ///
    /// # Errors
    ///
    /// Returns error if a given config file is unreadable or invalid
    pub fn resolve(file: Option<&Path>, overrides: Overrides) -> color_eyre::Result<Self> {
        let mut config = match file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        if let Some(store) = overrides.store {
            config.store.path = store;
        }
        if let Some(level) = overrides.log_level {
            config.log.level = level;
        }
        config.log.json |= overrides.log_json;
        Ok(config)
    }
}
