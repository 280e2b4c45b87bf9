//! Hash-sealed execution snapshots.
//!
//! The payload is the canonical JSON of the graph's records in canonical
//! order plus the aggregated verdict. Struct fields serialize in
//! declaration order and every map in a record is ordered, so equal inputs
//! always produce equal bytes. Nothing about the act of snapshotting (no
//! wall-clock time) enters the payload.
//!
//! The outer `execution_id` is a readable label outside the seal. Verification
//! checks it against the id sealed in the payload, so relabeling an export
//! is reported like any other edit.

use serde::{Deserialize, Serialize};
use vigil_core::{CallRecord, Digest, ExecutionId, VigilError, VigilResult};
use vigil_graph::{ExecutionGraph, GraphVerdict};

/// Payload format version
pub const FORMAT_VERSION: u32 = 1;

/// The sealed content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotContent {
    /// Payload format version
    pub format_version: u32,
    /// Execution captured
    pub execution_id: ExecutionId,
    /// Records in canonical order
    pub nodes: Vec<CallRecord>,
    /// Aggregated verdict at capture
    pub verdict: GraphVerdict,
}

/// Sealed snapshot as stored or exported
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Execution captured; must equal the id sealed in `payload`
    pub execution_id: ExecutionId,
    /// Digest of `payload`
    pub digest: Digest,
    /// Canonical JSON of a `SnapshotContent`
    pub payload: String,
}

/// Outcome of integrity verification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "integrity", rename_all = "snake_case")]
pub enum Integrity {
    /// Payload hashes to the sealed digest
    Valid,
    /// Payload no longer hashes to the sealed digest
    Tampered {
        /// Sealed digest
        expected: Digest,
        /// Digest of the payload as found
        actual: Digest,
    },
    /// Payload is intact but the outer label names another execution
    Mislabeled {
        /// Execution named outside the seal
        claimed: ExecutionId,
        /// Execution sealed in the payload
        sealed: ExecutionId,
    },
}

impl Integrity {
    /// Whether the seal holds and the label matches it
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

#[derive(Deserialize)]
struct SealedLabel {
    execution_id: ExecutionId,
}

/// Seal a graph and its verdict
///
/// # Errors
///
/// `Encoding` if serialization fails
pub fn snapshot(graph: &ExecutionGraph, verdict: &GraphVerdict) -> VigilResult<Snapshot> {
    let content = SnapshotContent {
        format_version: FORMAT_VERSION,
        execution_id: graph.execution_id().clone(),
        nodes: graph.nodes().map(|n| n.record.clone()).collect(),
        verdict: verdict.clone(),
    };
    let payload = serde_json::to_string(&content)?;
    let digest = Digest::compute(payload.as_bytes());

    tracing::debug!(
        execution_id = %content.execution_id,
        nodes = content.nodes.len(),
        digest = %digest,
        "sealed snapshot"
    );

    Ok(Snapshot {
        execution_id: content.execution_id,
        digest,
        payload,
    })
}

/// Verify raw payload bytes against a sealed digest
#[must_use]
pub fn verify_bytes(expected: Digest, payload: &[u8]) -> Integrity {
    let actual = Digest::compute(payload);
    if actual == expected {
        Integrity::Valid
    } else {
        Integrity::Tampered { expected, actual }
    }
}

impl Snapshot {
    /// Recompute the payload digest and compare it with the seal
    #[must_use]
    pub fn verify(&self) -> Integrity {
        let mut integrity = verify_bytes(self.digest, self.payload.as_bytes());
        if integrity.is_valid() {
            if let Ok(label) = serde_json::from_str::<SealedLabel>(&self.payload) {
                if label.execution_id != self.execution_id {
                    integrity = Integrity::Mislabeled {
                        claimed: self.execution_id.clone(),
                        sealed: label.execution_id,
                    };
                }
            }
        }
        if !integrity.is_valid() {
            tracing::warn!(execution_id = %self.execution_id, "snapshot failed integrity verification");
        }
        integrity
    }

    /// Verify, then parse the payload
    ///
    /// # Errors
    ///
    /// - `SnapshotTampered` if the seal does not hold
    /// - `SnapshotMislabeled` if the outer label disagrees with the payload
    /// - `Encoding` if the payload is not a supported `SnapshotContent`
    pub fn decode(&self) -> VigilResult<SnapshotContent> {
        match self.verify() {
            Integrity::Valid => {}
            Integrity::Tampered { expected, actual } => {
                return Err(VigilError::SnapshotTampered { expected, actual });
            }
            Integrity::Mislabeled { claimed, sealed } => {
                return Err(VigilError::SnapshotMislabeled { claimed, sealed });
            }
        }
        let content: SnapshotContent = serde_json::from_str(&self.payload)?;
        if content.format_version != FORMAT_VERSION {
            return Err(VigilError::Encoding {
                reason: format!(
                    "snapshot format version {} is not supported (expected {})",
                    content.format_version, FORMAT_VERSION
                ),
            });
        }
        Ok(content)
    }

    /// Serialize for export
    ///
    /// # Errors
    ///
    /// `Encoding` if serialization fails
    pub fn to_json(&self) -> VigilResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse an exported snapshot without verifying it
    ///
    /// # Errors
    ///
    /// `Encoding` if the text is not a snapshot
    pub fn from_json(text: &str) -> VigilResult<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use vigil_core::{ErrorCode, NodeId, Request, Response, RuleId, Timestamp, TokenUsage, Verdict};
    use vigil_graph::{aggregate, build};

    fn graph() -> (ExecutionGraph, GraphVerdict) {
        let rec = |id: &str, parent: Option<&str>, verdict: Verdict| {
            let r = CallRecord::new(
                ExecutionId::from("exec-snap"),
                NodeId::from(id),
                Request::new("anthropic", "claude").with_label(id),
                Response::new(format!("answer {id}"), 42, TokenUsage::new(3, 7)),
            )
            .with_trace_id(format!("t-{id}"))
            .with_timestamp(Timestamp::from_millis(1_700_000_000_000))
            .with_verdict(verdict);
            match parent {
                Some(p) => r.with_parent(p),
                None => r,
            }
        };
        let graph = build(vec![
            rec("a", None, Verdict::pass()),
            rec("b", Some("a"), Verdict::from_violations(vec![RuleId::MaxLatencyMs])),
        ])
        .unwrap();
        let verdict = aggregate(&graph).unwrap();
        (graph, verdict)
    }

    #[test]
    fn test_round_trip_is_valid() {
        let (g, v) = graph();
        let snap = snapshot(&g, &v).unwrap();
        assert_eq!(snap.verify(), Integrity::Valid);
        let content = snap.decode().unwrap();
        assert_eq!(content.verdict, v);
        assert_eq!(content.nodes.len(), 2);
        assert_eq!(content.nodes[0].node_id, NodeId::from("a"));
    }

    #[test]
    fn test_snapshot_is_deterministic() {
        let (g, v) = graph();
        let first = snapshot(&g, &v).unwrap();
        let second = snapshot(&g, &v).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_payload_has_no_capture_time() {
        let (g, v) = graph();
        let snap = snapshot(&g, &v).unwrap();
        let value: serde_json::Value = serde_json::from_str(&snap.payload).unwrap();
        let keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys.len(), 4);
        for key in ["format_version", "execution_id", "nodes", "verdict"] {
            assert!(keys.contains(&key));
        }
    }

    #[test]
    fn test_edited_payload_is_tampered() {
        let (g, v) = graph();
        let mut snap = snapshot(&g, &v).unwrap();
        snap.payload = snap.payload.replace("answer b", "answer B");
        assert!(matches!(snap.verify(), Integrity::Tampered { .. }));
        assert_eq!(snap.decode().unwrap_err().code(), ErrorCode::SnapshotTampered);
    }

    #[test]
    fn test_relabeled_export_is_not_valid() {
        let (g, v) = graph();
        let exported = snapshot(&g, &v).unwrap().to_json().unwrap();
        let relabeled = exported.replacen(
            "\"execution_id\": \"exec-snap\"",
            "\"execution_id\": \"exec-forged\"",
            1,
        );
        assert_ne!(relabeled, exported);

        let snap = Snapshot::from_json(&relabeled).unwrap();
        assert_eq!(snap.execution_id, ExecutionId::from("exec-forged"));
        assert_eq!(
            snap.verify(),
            Integrity::Mislabeled {
                claimed: ExecutionId::from("exec-forged"),
                sealed: ExecutionId::from("exec-snap"),
            }
        );
        assert_eq!(snap.decode().unwrap_err().code(), ErrorCode::SnapshotTampered);
    }

    #[test]
    fn test_export_round_trip() {
        let (g, v) = graph();
        let snap = snapshot(&g, &v).unwrap();
        let back = Snapshot::from_json(&snap.to_json().unwrap()).unwrap();
        assert_eq!(back, snap);
        assert!(back.verify().is_valid());
    }

    proptest! {
        #[test]
        fn prop_any_single_byte_flip_is_tampered(pick in any::<prop::sample::Index>()) {
            let (g, v) = graph();
            let snap = snapshot(&g, &v).unwrap();
            let mut bytes = snap.payload.clone().into_bytes();
            let i = pick.index(bytes.len());
            bytes[i] ^= 0x01;
            prop_assert!(!verify_bytes(snap.digest, &bytes).is_valid());
        }
    }
}
