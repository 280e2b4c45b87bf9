//! Verdict aggregation.
//!
//! Reduces already-computed per-node verdicts to one graph verdict. The
//! status space stays two-valued; nodes downstream of a failure are only
//! counted as tainted.

use crate::graph::ExecutionGraph;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use vigil_core::{NodeId, Status, VigilError, VigilResult};

/// Graph-level verdict
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphVerdict {
    /// FAIL iff any node failed
    pub status: Status,
    /// Earliest failing node in canonical order
    pub first_failing_node: Option<NodeId>,
    /// Number of failing nodes
    pub failed_count: usize,
    /// Non-failing descendants of failing nodes
    pub tainted_count: usize,
}

impl GraphVerdict {
    /// Whether the graph passed
    #[must_use]
    pub fn is_pass(&self) -> bool {
        self.status == Status::Pass
    }
}

/// Aggregate the per-node verdicts of a graph.
///
/// # Errors
///
/// `MissingVerdict` for the first node in canonical order that carries no
/// verdict
pub fn aggregate(graph: &ExecutionGraph) -> VigilResult<GraphVerdict> {
    let mut failing = Vec::new();
    for node in graph.nodes() {
        let Some(verdict) = &node.record.verdict else {
            tracing::warn!(
                execution_id = %graph.execution_id(),
                node_id = %node.id(),
                "aggregation reached a node without a verdict"
            );
            return Err(VigilError::MissingVerdict {
                node_id: node.id().clone(),
            });
        };
        if verdict.is_fail() {
            failing.push(node.id());
        }
    }

    let tainted = tainted_nodes(graph)?;
    let result = GraphVerdict {
        status: if failing.is_empty() {
            Status::Pass
        } else {
            Status::Fail
        },
        first_failing_node: failing.first().map(|id| (*id).clone()),
        failed_count: failing.len(),
        tainted_count: tainted.len(),
    };

    tracing::debug!(
        execution_id = %graph.execution_id(),
        status = %result.status,
        failed = result.failed_count,
        tainted = result.tainted_count,
        "aggregated graph verdict"
    );
    Ok(result)
}

/// Non-failing nodes reachable from any failing node, in canonical order.
///
/// Nodes without a verdict are treated as not failing.
///
/// # Errors
///
/// `NodeNotFound` if the graph's adjacency is inconsistent
pub fn tainted_nodes(graph: &ExecutionGraph) -> VigilResult<Vec<NodeId>> {
    let is_fail = |id: &NodeId| {
        graph
            .node(id)
            .and_then(|n| n.record.verdict.as_ref())
            .is_some_and(|v| v.is_fail())
    };

    let mut tainted: BTreeSet<(usize, NodeId)> = BTreeSet::new();
    for node in graph.nodes().filter(|n| is_fail(n.id())) {
        for descendant in graph.descendants(node.id())? {
            if is_fail(&descendant) {
                continue;
            }
            if let Some(d) = graph.node(&descendant) {
                tainted.insert((d.position, descendant));
            }
        }
    }
    Ok(tainted.into_iter().map(|(_, id)| id).collect())
}
