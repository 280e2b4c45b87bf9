//! Latency analysis over a built graph.
//!
//! Recorded latencies reported as facts: total, the heaviest root-to-leaf
//! chain and the slowest nodes. Ties always resolve to canonical order.

use crate::graph::ExecutionGraph;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use vigil_core::{ExecutionId, NodeId};

/// A slow node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bottleneck {
    /// Node
    pub node_id: NodeId,
    /// Its recorded latency
    pub latency_ms: u64,
    /// Canonical position
    pub position: usize,
}

/// Latency facts for one execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatencyAnalysis {
    /// Execution analyzed
    pub execution_id: ExecutionId,
    /// Node count
    pub node_count: usize,
    /// Sum of every node's latency
    pub total_latency_ms: u64,
    /// Root-to-leaf chain with the largest summed latency
    pub critical_path: Vec<NodeId>,
    /// Summed latency along `critical_path`
    pub critical_path_latency_ms: u64,
    /// Slowest nodes, slowest first
    pub bottlenecks: Vec<Bottleneck>,
}

/// Analyze recorded latencies, reporting at most `top_n` bottlenecks
#[must_use]
pub fn analyze(graph: &ExecutionGraph, top_n: usize) -> LatencyAnalysis {
    let latency = |id: &NodeId| graph.node(id).map_or(0, |n| n.record.response.latency_ms);

    let total_latency_ms = graph
        .nodes()
        .map(|n| n.record.response.latency_ms)
        .fold(0u64, u64::saturating_add);

    // Heaviest chain below each node; children are visited before parents by
    // walking canonical order backwards. The first child wins a tie.
    let order: Vec<&NodeId> = graph.canonical_order().collect();
    let mut heaviest: HashMap<&NodeId, (u64, Option<&NodeId>)> = HashMap::with_capacity(order.len());
    for &id in order.iter().rev() {
        let mut best: Option<(u64, &NodeId)> = None;
        for child in graph.children(id) {
            let weight = heaviest.get(child).map_or(0, |(w, _)| *w);
            if best.is_none_or(|(w, _)| weight > w) {
                best = Some((weight, child));
            }
        }
        let below = best.map_or(0, |(w, _)| w);
        heaviest.insert(id, (latency(id).saturating_add(below), best.map(|(_, c)| c)));
    }

    let mut start: Option<(u64, &NodeId)> = None;
    for root in graph.roots() {
        let weight = heaviest.get(root).map_or(0, |(w, _)| *w);
        if start.is_none_or(|(w, _)| weight > w) {
            start = Some((weight, root));
        }
    }

    let mut critical_path = Vec::new();
    let mut cursor = start.map(|(_, id)| id);
    while let Some(id) = cursor {
        critical_path.push(id.clone());
        cursor = heaviest.get(id).and_then(|(_, next)| *next);
    }

    let mut ranked: Vec<Bottleneck> = graph
        .nodes()
        .map(|n| Bottleneck {
            node_id: n.id().clone(),
            latency_ms: n.record.response.latency_ms,
            position: n.position,
        })
        .collect();
    ranked.sort_by(|a, b| b.latency_ms.cmp(&a.latency_ms).then(a.position.cmp(&b.position)));
    ranked.truncate(top_n);

    LatencyAnalysis {
        execution_id: graph.execution_id().clone(),
        node_count: graph.len(),
        total_latency_ms,
        critical_path,
        critical_path_latency_ms: start.map_or(0, |(w, _)| w),
        bottlenecks: ranked,
    }
}
