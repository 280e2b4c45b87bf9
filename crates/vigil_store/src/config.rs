//! Store configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default store file, relative to the working directory
pub const DEFAULT_STORE_PATH: &str = ".vigil/store.json";

/// File store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Store document path
    pub path: PathBuf,
    /// Pretty-print the document
    pub pretty: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_STORE_PATH),
            pretty: true,
        }
    }
}

impl StoreConfig {
    /// Config for a specific path
    #[must_use]
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: StoreConfig = serde_json::from_str(r#"{"pretty": false}"#).unwrap();
        assert_eq!(config.path, PathBuf::from(DEFAULT_STORE_PATH));
        assert!(!config.pretty);
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(serde_json::from_str::<StoreConfig>(r#"{"compression": true}"#).is_err());
    }
}
