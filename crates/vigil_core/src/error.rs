//! Error taxonomy for VIGIL.
//!
//! Every error is structural misuse: a precondition of the engine was
//! violated. Failed expectations and golden mismatches are not errors; they
//! travel through `Verdict` and comparison results. Each variant carries a
//! stable code and a one-line statement of the violated invariant.

use crate::hash::{Digest, DigestError};
use crate::id::{ExecutionId, NodeId, TraceId};
use crate::record::GoldenKey;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Workspace result type
pub type VigilResult<T> = Result<T, VigilError>;

/// Stable machine-readable error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCode {
    /// An evaluation ran with an empty expectation set
    NoExpectationsDeclared,
    /// An expectation document named an option outside the closed set
    UnknownExpectationOption,
    /// A template name is not registered
    UnknownTemplate,
    /// A graph was built from zero records
    EmptyExecutionSet,
    /// A graph was built from records of several executions
    MixedExecutionSet,
    /// Two records of one execution share a node id
    DuplicateNodeId,
    /// A parent id names no node of the execution
    DanglingParentReference,
    /// Parent links loop back on themselves
    CyclicExecutionGraph,
    /// Aggregation met a node that was never judged
    MissingNodeVerdict,
    /// A node id is not part of the queried graph
    NodeNotFound,
    /// A diff key matches more than one node
    DuplicateDiffKey,
    /// Bless targeted a trace without a PASS verdict
    BlessWithoutPassingVerdict,
    /// Bless would replace a golden without force
    GoldenAlreadyExists,
    /// No golden is registered under the key
    GoldenNotFound,
    /// Check ran with no goldens registered
    CheckWithoutAnyGolden,
    /// A response digest differs from its golden
    GoldenHashMismatch,
    /// A snapshot no longer matches its seal
    SnapshotTampered,
    /// A trace id is not in the store
    TraceNotFound,
    /// An execution id has no records in the store
    ExecutionNotFound,
    /// A digest string is malformed
    InvalidDigest,
    /// JSON encoding or decoding failed
    Encoding,
    /// The backing store failed
    Storage,
}

impl ErrorCode {
    /// Every code, in declaration order
    pub const ALL: [ErrorCode; 22] = [
        Self::NoExpectationsDeclared,
        Self::UnknownExpectationOption,
        Self::UnknownTemplate,
        Self::EmptyExecutionSet,
        Self::MixedExecutionSet,
        Self::DuplicateNodeId,
        Self::DanglingParentReference,
        Self::CyclicExecutionGraph,
        Self::MissingNodeVerdict,
        Self::NodeNotFound,
        Self::DuplicateDiffKey,
        Self::BlessWithoutPassingVerdict,
        Self::GoldenAlreadyExists,
        Self::GoldenNotFound,
        Self::CheckWithoutAnyGolden,
        Self::GoldenHashMismatch,
        Self::SnapshotTampered,
        Self::TraceNotFound,
        Self::ExecutionNotFound,
        Self::InvalidDigest,
        Self::Encoding,
        Self::Storage,
    ];

    /// The wire form of the code
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NoExpectationsDeclared => "no-expectations-declared",
            Self::UnknownExpectationOption => "unknown-expectation-option",
            Self::UnknownTemplate => "unknown-template",
            Self::EmptyExecutionSet => "empty-execution-set",
            Self::MixedExecutionSet => "mixed-execution-set",
            Self::DuplicateNodeId => "duplicate-node-id",
            Self::DanglingParentReference => "dangling-parent-reference",
            Self::CyclicExecutionGraph => "cyclic-execution-graph",
            Self::MissingNodeVerdict => "missing-node-verdict",
            Self::NodeNotFound => "node-not-found",
            Self::DuplicateDiffKey => "duplicate-diff-key",
            Self::BlessWithoutPassingVerdict => "bless-without-passing-verdict",
            Self::GoldenAlreadyExists => "golden-already-exists",
            Self::GoldenNotFound => "golden-not-found",
            Self::CheckWithoutAnyGolden => "check-without-any-golden",
            Self::GoldenHashMismatch => "golden-hash-mismatch",
            Self::SnapshotTampered => "snapshot-tampered",
            Self::TraceNotFound => "trace-not-found",
            Self::ExecutionNotFound => "execution-not-found",
            Self::InvalidDigest => "invalid-digest",
            Self::Encoding => "encoding",
            Self::Storage => "storage",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Workspace error type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VigilError {
    /// A call was evaluated with zero declared expectations
    #[error("no expectations declared; a verdict requires at least one rule")]
    NoExpectations,

    /// An expectation configuration named an unrecognized option
    #[error("unrecognized expectation option: {option}")]
    UnknownExpectationOption {
        /// Option as written
        option: String,
    },

    /// A template name has no registered template
    #[error("no expectation template named {name}")]
    UnknownTemplate {
        /// Requested template name
        name: String,
    },

    /// Graph construction over zero records
    #[error("execution set is empty")]
    EmptyExecutionSet,

    /// Records from different execution groups were combined
    #[error("node {node_id} belongs to execution {found}, not {expected}")]
    MixedExecutionSet {
        /// Execution of the first record
        expected: ExecutionId,
        /// Execution of the offending record
        found: ExecutionId,
        /// Node of the offending record
        node_id: NodeId,
    },

    /// Two records in one execution share a node id
    #[error("node id {node_id} appears more than once in the execution")]
    DuplicateNodeId {
        /// Repeated node id
        node_id: NodeId,
    },

    /// A parent link points at a node absent from the execution
    #[error("node {node_id} references missing parent {parent_node_id}")]
    DanglingParent {
        /// Child holding the link
        node_id: NodeId,
        /// Parent that does not exist
        parent_node_id: NodeId,
    },

    /// Parent links form a cycle
    #[error("parent links form a cycle through {} node(s) starting at {}", .node_ids.len(), .node_ids.first().map(NodeId::as_str).unwrap_or("?"))]
    CyclicGraph {
        /// Nodes on the cycle, in canonical order
        node_ids: Vec<NodeId>,
    },

    /// Aggregation reached a node without a per-node verdict
    #[error("node {node_id} carries no verdict")]
    MissingVerdict {
        /// Unjudged node
        node_id: NodeId,
    },

    /// A node id does not belong to the graph being queried
    #[error("node {node_id} is not part of the execution graph")]
    NodeNotFound {
        /// Requested node
        node_id: NodeId,
    },

    /// Two nodes in one graph map to the same diff key
    #[error("diff key {key} maps to more than one node")]
    DuplicateDiffKey {
        /// Shared key value
        key: String,
    },

    /// Bless was attempted on a trace whose verdict is not PASS
    #[error("trace {trace_id} has no passing verdict; only PASS traces become goldens")]
    BlessWithoutPass {
        /// Trace offered for blessing
        trace_id: TraceId,
    },

    /// A golden already exists for the key and force was not given
    #[error("golden reference for {key} already exists; replacement requires force")]
    GoldenExists {
        /// Occupied provider/model key
        key: GoldenKey,
    },

    /// No golden is registered under the key
    #[error("no golden reference for {key}")]
    GoldenNotFound {
        /// Requested provider/model key
        key: GoldenKey,
    },

    /// A check was run with no goldens to compare against
    #[error("check requires at least one golden reference")]
    NoGoldens,

    /// A response digest differs from the golden digest
    #[error("response digest {actual} differs from golden digest {expected}")]
    GoldenHashMismatch {
        /// Golden digest
        expected: Digest,
        /// Digest of the compared response
        actual: Digest,
    },

    /// A snapshot payload no longer hashes to its sealed digest
    #[error("snapshot payload hashes to {actual}, sealed digest is {expected}")]
    SnapshotTampered {
        /// Sealed digest
        expected: Digest,
        /// Digest of the payload as found
        actual: Digest,
    },

    /// A snapshot's outer execution id differs from the sealed one
    #[error("snapshot is labeled {claimed} but seals execution {sealed}")]
    SnapshotMislabeled {
        /// Execution named outside the seal
        claimed: ExecutionId,
        /// Execution sealed in the payload
        sealed: ExecutionId,
    },

    /// Trace lookup failed
    #[error("trace {trace_id} not found")]
    TraceNotFound {
        /// Requested trace
        trace_id: TraceId,
    },

    /// Execution lookup failed
    #[error("execution {execution_id} not found")]
    ExecutionNotFound {
        /// Requested execution
        execution_id: ExecutionId,
    },

    /// A digest string could not be parsed
    #[error("invalid digest: {0}")]
    InvalidDigest(#[from] DigestError),

    /// Canonical encoding or decoding failed
    #[error("encoding failed: {reason}")]
    Encoding {
        /// Underlying failure
        reason: String,
    },

    /// The backing store failed
    #[error("storage failed: {reason}")]
    Storage {
        /// Underlying failure
        reason: String,
    },
}

impl VigilError {
    /// The stable code for this error
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NoExpectations => ErrorCode::NoExpectationsDeclared,
            Self::UnknownExpectationOption { .. } => ErrorCode::UnknownExpectationOption,
            Self::UnknownTemplate { .. } => ErrorCode::UnknownTemplate,
            Self::EmptyExecutionSet => ErrorCode::EmptyExecutionSet,
            Self::MixedExecutionSet { .. } => ErrorCode::MixedExecutionSet,
            Self::DuplicateNodeId { .. } => ErrorCode::DuplicateNodeId,
            Self::DanglingParent { .. } => ErrorCode::DanglingParentReference,
            Self::CyclicGraph { .. } => ErrorCode::CyclicExecutionGraph,
            Self::MissingVerdict { .. } => ErrorCode::MissingNodeVerdict,
            Self::NodeNotFound { .. } => ErrorCode::NodeNotFound,
            Self::DuplicateDiffKey { .. } => ErrorCode::DuplicateDiffKey,
            Self::BlessWithoutPass { .. } => ErrorCode::BlessWithoutPassingVerdict,
            Self::GoldenExists { .. } => ErrorCode::GoldenAlreadyExists,
            Self::GoldenNotFound { .. } => ErrorCode::GoldenNotFound,
            Self::NoGoldens => ErrorCode::CheckWithoutAnyGolden,
            Self::GoldenHashMismatch { .. } => ErrorCode::GoldenHashMismatch,
            Self::SnapshotTampered { .. } | Self::SnapshotMislabeled { .. } => {
                ErrorCode::SnapshotTampered
            }
            Self::TraceNotFound { .. } => ErrorCode::TraceNotFound,
            Self::ExecutionNotFound { .. } => ErrorCode::ExecutionNotFound,
            Self::InvalidDigest(_) => ErrorCode::InvalidDigest,
            Self::Encoding { .. } => ErrorCode::Encoding,
            Self::Storage { .. } => ErrorCode::Storage,
        }
    }

    /// `[code] message`, the boundary rendering
    #[must_use]
    pub fn report(&self) -> String {
        format!("[{}] {}", self.code(), self)
    }
}

impl From<serde_json::Error> for VigilError {
    fn from(err: serde_json::Error) -> Self {
        Self::Encoding {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_codes_are_unique() {
        let codes: BTreeSet<&str> = ErrorCode::ALL.iter().map(ErrorCode::as_str).collect();
        assert_eq!(codes.len(), ErrorCode::ALL.len());
    }

    #[test]
    fn test_code_serde_matches_as_str() {
        for code in ErrorCode::ALL {
            let json = serde_json::to_string(&code).unwrap();
            assert_eq!(json, format!("\"{}\"", code.as_str()));
        }
    }

    #[test]
    fn test_report_carries_code() {
        let err = VigilError::DanglingParent {
            node_id: NodeId::from("b"),
            parent_node_id: NodeId::from("zz"),
        };
        assert_eq!(err.code(), ErrorCode::DanglingParentReference);
        assert_eq!(
            err.report(),
            "[dangling-parent-reference] node b references missing parent zz"
        );
    }

    #[test]
    fn test_cycle_message_names_first_node() {
        let err = VigilError::CyclicGraph {
            node_ids: vec![NodeId::from("a"), NodeId::from("b")],
        };
        assert_eq!(
            err.to_string(),
            "parent links form a cycle through 2 node(s) starting at a"
        );
    }

    #[test]
    fn test_messages_are_single_line() {
        let samples = [
            VigilError::NoExpectations,
            VigilError::EmptyExecutionSet,
            VigilError::NoGoldens,
            VigilError::BlessWithoutPass {
                trace_id: TraceId::from("t1"),
            },
        ];
        for err in samples {
            assert!(!err.to_string().contains('\n'));
        }
    }

    #[test]
    fn test_mislabeled_snapshot_shares_tamper_code() {
        let err = VigilError::SnapshotMislabeled {
            claimed: ExecutionId::from("exec-forged"),
            sealed: ExecutionId::from("exec-1"),
        };
        assert_eq!(
            err.report(),
            "[snapshot-tampered] snapshot is labeled exec-forged but seals execution exec-1"
        );
    }

    #[test]
    fn test_serde_error_maps_to_encoding() {
        let err: VigilError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert_eq!(err.code(), ErrorCode::Encoding);
    }
}
