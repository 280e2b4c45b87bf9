//! Store failures.

use std::path::PathBuf;
use vigil_core::VigilError;

/// Backend failure, surfaced to callers as `VigilError::Storage`
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Reading or writing the store file failed
    #[error("i/o on {}: {source}", path.display())]
    Io {
        /// File being accessed
        path: PathBuf,
        /// Underlying failure
        #[source]
        source: std::io::Error,
    },

    /// Taking the advisory lock on the store's lock file failed
    #[error("locking {}: {source}", path.display())]
    Lock {
        /// Lock file
        path: PathBuf,
        /// Underlying failure
        #[source]
        source: std::io::Error,
    },

    /// Replacing the store file failed
    #[error("persisting {}: {source}", path.display())]
    Persist {
        /// Store file being replaced
        path: PathBuf,
        /// Underlying failure
        #[source]
        source: tempfile::PersistError,
    },

    /// The store document could not be parsed
    #[error("store document {} is malformed: {source}", path.display())]
    Malformed {
        /// Store file
        path: PathBuf,
        /// Parse failure
        #[source]
        source: serde_json::Error,
    },

    /// A lock holder panicked
    #[error("{0} lock poisoned")]
    Poisoned(&'static str),
}

impl From<StoreError> for VigilError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Malformed { .. } => VigilError::Encoding {
                reason: err.to_string(),
            },
            _ => VigilError::Storage {
                reason: err.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::ErrorCode;

    #[test]
    fn test_poisoned_maps_to_storage() {
        let err: VigilError = StoreError::Poisoned("records").into();
        assert_eq!(err.code(), ErrorCode::Storage);
        assert_eq!(err.to_string(), "storage failed: records lock poisoned");
    }

    #[test]
    fn test_malformed_maps_to_encoding() {
        let source = serde_json::from_str::<u8>("x").unwrap_err();
        let err: VigilError = StoreError::Malformed {
            path: PathBuf::from("s.json"),
            source,
        }
        .into();
        assert_eq!(err.code(), ErrorCode::Encoding);
    }
}
