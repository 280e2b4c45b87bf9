//! Identifiers for recorded calls and execution groups.
//!
//! Ids are opaque strings. Callers may supply their own (tests, imports from
//! other systems); freshly generated ids are UUID v4 in canonical hyphenated
//! form. Ordering is lexical and only used where a stable order is needed for
//! map keys, never for graph ordering.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Generate a fresh random id
            #[must_use]
            pub fn generate() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            /// Wrap an existing id
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Borrow as str
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Take the inner string
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Trace identifier - unique per recorded call, the store's primary key
    TraceId
);

string_id!(
    /// Execution identifier - shared by every call in one execution group
    ExecutionId
);

string_id!(
    /// Node identifier - unique within one execution group
    NodeId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_unique() {
        assert_ne!(TraceId::generate(), TraceId::generate());
        assert_ne!(ExecutionId::generate(), ExecutionId::generate());
        assert_ne!(NodeId::generate(), NodeId::generate());
    }

    #[test]
    fn test_id_from_str_round_trips_display() {
        let id = NodeId::from("step-1");
        assert_eq!(id.as_str(), "step-1");
        assert_eq!(format!("{}", id), "step-1");
    }

    #[test]
    fn test_id_serializes_as_plain_string() {
        let id = ExecutionId::new("exec-7");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"exec-7\"");
        let back: ExecutionId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
