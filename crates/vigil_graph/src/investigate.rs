//! Investigation path.
//!
//! The ordered evidence from a root down to the first failing node. Each
//! step carries recorded facts only.

use crate::aggregate::GraphVerdict;
use crate::graph::ExecutionGraph;
use serde::{Deserialize, Serialize};
use vigil_core::{NodeId, Timestamp, TokenUsage, TraceId, Verdict, VigilError, VigilResult};

/// One step of an investigation path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservationRecord {
    /// Zero-based step index
    pub step: usize,
    /// Node observed
    pub node_id: NodeId,
    /// Source record
    pub trace_id: TraceId,
    /// Parent node, `None` at the root
    pub parent_node_id: Option<NodeId>,
    /// The node's own verdict
    pub verdict: Option<Verdict>,
    /// Raw response text
    pub response_text: String,
    /// Observed latency
    pub latency_ms: u64,
    /// Observed token usage
    pub token_usage: TokenUsage,
    /// Recorded timestamp
    pub timestamp: Timestamp,
}

/// Chain of observations from a root to `verdict.first_failing_node`
///
/// Empty when nothing failed.
///
/// # Errors
///
/// `NodeNotFound` if the failing node is not part of `graph`
pub fn investigation_path(
    graph: &ExecutionGraph,
    verdict: &GraphVerdict,
) -> VigilResult<Vec<ObservationRecord>> {
    let Some(target) = &verdict.first_failing_node else {
        return Ok(Vec::new());
    };

    let chain = graph.path_from_root(target)?;
    chain
        .iter()
        .enumerate()
        .map(|(step, id)| {
            let node = graph.node(id).ok_or_else(|| VigilError::NodeNotFound {
                node_id: id.clone(),
            })?;
            let record = &node.record;
            Ok(ObservationRecord {
                step,
                node_id: record.node_id.clone(),
                trace_id: record.trace_id.clone(),
                parent_node_id: record.parent_node_id.clone(),
                verdict: record.verdict.clone(),
                response_text: record.response.text.clone(),
                latency_ms: record.response.latency_ms,
                token_usage: record.response.token_usage,
                timestamp: record.timestamp,
            })
        })
        .collect()
}
