//! Raw evidence.
//!
//! Observations, not explanations: every type here carries the two compared
//! values and a mechanical comparison outcome. Nothing is scored and nothing
//! is interpreted.

use crate::hash::Digest;
use serde::{Deserialize, Serialize};

/// Two response digests and whether they are equal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashEvidence {
    /// Digest of the reference text
    pub original: Digest,
    /// Digest of the compared text
    pub new: Digest,
    /// `original == new`
    pub matched: bool,
}

impl HashEvidence {
    /// Compare two digests
    #[must_use]
    pub fn compare(original: Digest, new: Digest) -> Self {
        Self {
            original,
            new,
            matched: original == new,
        }
    }

    /// Hash two texts and compare
    #[must_use]
    pub fn from_texts(original: &str, new: &str) -> Self {
        Self::compare(
            Digest::compute(original.as_bytes()),
            Digest::compute(new.as_bytes()),
        )
    }
}

/// Two latency observations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatencyEvidence {
    /// Reference latency
    pub original_ms: u64,
    /// Compared latency
    pub new_ms: u64,
    /// `new_ms - original_ms`
    pub delta_ms: i64,
}

impl LatencyEvidence {
    /// Compare two latencies
    #[must_use]
    pub fn compare(original_ms: u64, new_ms: u64) -> Self {
        let delta = i128::from(new_ms) - i128::from(original_ms);
        Self {
            original_ms,
            new_ms,
            delta_ms: i64::try_from(delta).unwrap_or(if delta < 0 { i64::MIN } else { i64::MAX }),
        }
    }
}

/// Where two paths first differ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "index")]
pub enum PathDivergence {
    /// Elements differ at this index
    Index(usize),
    /// One path is a strict prefix of the other
    LengthMismatch,
}

/// Two ordered paths of node keys
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathEvidence {
    /// Reference path
    pub original: Vec<String>,
    /// Compared path
    pub new: Vec<String>,
    /// First divergence, `None` if the paths are identical
    pub divergence: Option<PathDivergence>,
}

impl PathEvidence {
    /// Compare two paths
    #[must_use]
    pub fn compare(original: Vec<String>, new: Vec<String>) -> Self {
        let divergence = if original == new {
            None
        } else {
            Some(
                original
                    .iter()
                    .zip(new.iter())
                    .position(|(a, b)| a != b)
                    .map_or(PathDivergence::LengthMismatch, PathDivergence::Index),
            )
        };
        Self {
            original,
            new,
            divergence,
        }
    }

    /// Whether the paths differ
    #[must_use]
    pub fn diverged(&self) -> bool {
        self.divergence.is_some()
    }
}
