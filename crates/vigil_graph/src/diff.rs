//! Graph differ.
//!
//! Matches the nodes of two executions of the same workflow by a semantic
//! key, since node ids are per execution. Presence and verdicts are
//! compared; response text and latency are carried as raw evidence only.

use crate::graph::{ExecutionGraph, GraphNode};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use vigil_core::{
    ExecutionId, HashEvidence, LatencyEvidence, NodeId, PathEvidence, Status, Verdict,
    VigilError, VigilResult,
};

/// How nodes of two executions are matched
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKey {
    /// Index in canonical order
    Position,
    /// Request label, falling back to `#<position>` for unlabeled calls
    #[default]
    Label,
    /// Raw node id, for executions that reuse ids
    NodeId,
}

impl NodeKey {
    /// Key of a node under this strategy
    #[must_use]
    pub fn key_for(&self, node: &GraphNode) -> String {
        match self {
            Self::Position => node.position.to_string(),
            Self::Label => node
                .record
                .request
                .label
                .clone()
                .unwrap_or_else(|| format!("#{}", node.position)),
            Self::NodeId => node.id().to_string(),
        }
    }

    /// Name as accepted by `FromStr`
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Position => "position",
            Self::Label => "label",
            Self::NodeId => "node_id",
        }
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "position" => Ok(Self::Position),
            "label" => Ok(Self::Label),
            "node_id" | "node-id" => Ok(Self::NodeId),
            other => Err(format!("unknown node key: {other}")),
        }
    }
}

/// A node present on one side only
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodePresence {
    /// Matching key
    pub key: String,
    /// Node id on its side
    pub node_id: NodeId,
    /// Its verdict, if judged
    pub verdict: Option<Verdict>,
}

/// A node present on both sides
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeComparison {
    /// Matching key
    pub key: String,
    /// Node id in A
    pub node_a: NodeId,
    /// Node id in B
    pub node_b: NodeId,
    /// Verdict in A
    pub verdict_a: Option<Verdict>,
    /// Verdict in B
    pub verdict_b: Option<Verdict>,
    /// Response digests
    pub hash: HashEvidence,
    /// Latencies
    pub latency: LatencyEvidence,
}

impl NodeComparison {
    /// Whether the verdicts differ
    #[must_use]
    pub fn verdict_diverged(&self) -> bool {
        self.verdict_a != self.verdict_b
    }

    /// A passed and B failed
    #[must_use]
    pub fn is_regression(&self) -> bool {
        status(self.verdict_a.as_ref()) == Some(Status::Pass)
            && status(self.verdict_b.as_ref()) == Some(Status::Fail)
    }
}

fn status(verdict: Option<&Verdict>) -> Option<Status> {
    verdict.map(Verdict::status)
}

/// Structural and verdict delta between two executions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphDelta {
    /// Execution A
    pub execution_a: ExecutionId,
    /// Execution B
    pub execution_b: ExecutionId,
    /// Keys only in A, in A's canonical order
    pub only_in_a: Vec<NodePresence>,
    /// Keys only in B, in B's canonical order
    pub only_in_b: Vec<NodePresence>,
    /// Keys in both with identical verdicts, in A's canonical order
    pub unchanged: Vec<NodeComparison>,
    /// Keys in both with differing verdicts, in A's canonical order
    pub diverged: Vec<NodeComparison>,
    /// Canonical key sequences of both executions
    pub path: PathEvidence,
}

impl GraphDelta {
    /// Whether anything structural or verdict-level differs
    #[must_use]
    pub fn has_divergence(&self) -> bool {
        !self.only_in_a.is_empty() || !self.only_in_b.is_empty() || !self.diverged.is_empty()
    }

    /// Diverged entries that went from PASS to FAIL
    pub fn regressions(&self) -> impl Iterator<Item = &NodeComparison> {
        self.diverged.iter().filter(|c| c.is_regression())
    }
}

/// Diff two graphs, matching nodes by `key`
///
/// # Errors
///
/// `DuplicateDiffKey` if two nodes of one graph share a key
pub fn diff(a: &ExecutionGraph, b: &ExecutionGraph, key: NodeKey) -> VigilResult<GraphDelta> {
    diff_by(a, b, |node| key.key_for(node))
}

/// Diff two graphs with a caller-supplied key function
///
/// # Errors
///
/// `DuplicateDiffKey` if two nodes of one graph share a key
pub fn diff_by<F>(a: &ExecutionGraph, b: &ExecutionGraph, key: F) -> VigilResult<GraphDelta>
where
    F: Fn(&GraphNode) -> String,
{
    let keyed_a = keyed(a, &key)?;
    let keyed_b = keyed(b, &key)?;

    let mut only_in_a = Vec::new();
    let mut unchanged = Vec::new();
    let mut diverged = Vec::new();

    for (k, node_a) in &keyed_a {
        let Some(node_b) = keyed_b.get(k) else {
            only_in_a.push(presence(k, node_a));
            continue;
        };
        let ra = &node_a.record;
        let rb = &node_b.record;
        let comparison = NodeComparison {
            key: k.clone(),
            node_a: ra.node_id.clone(),
            node_b: rb.node_id.clone(),
            verdict_a: ra.verdict.clone(),
            verdict_b: rb.verdict.clone(),
            hash: HashEvidence::from_texts(&ra.response.text, &rb.response.text),
            latency: LatencyEvidence::compare(ra.response.latency_ms, rb.response.latency_ms),
        };
        if comparison.verdict_diverged() {
            diverged.push(comparison);
        } else {
            unchanged.push(comparison);
        }
    }

    let only_in_b = keyed_b
        .iter()
        .filter(|(k, _)| !keyed_a.contains_key(*k))
        .map(|(k, node)| presence(k, node))
        .collect();

    let delta = GraphDelta {
        execution_a: a.execution_id().clone(),
        execution_b: b.execution_id().clone(),
        only_in_a,
        only_in_b,
        unchanged,
        diverged,
        path: PathEvidence::compare(
            keyed_a.keys().cloned().collect(),
            keyed_b.keys().cloned().collect(),
        ),
    };

    tracing::debug!(
        execution_a = %delta.execution_a,
        execution_b = %delta.execution_b,
        only_in_a = delta.only_in_a.len(),
        only_in_b = delta.only_in_b.len(),
        diverged = delta.diverged.len(),
        "diffed execution graphs"
    );
    Ok(delta)
}

fn keyed<'g, F>(graph: &'g ExecutionGraph, key: &F) -> VigilResult<IndexMap<String, &'g GraphNode>>
where
    F: Fn(&GraphNode) -> String,
{
    let mut out = IndexMap::with_capacity(graph.len());
    for node in graph.nodes() {
        let k = key(node);
        if out.contains_key(&k) {
            return Err(VigilError::DuplicateDiffKey { key: k });
        }
        out.insert(k, node);
    }
    Ok(out)
}

fn presence(key: &str, node: &GraphNode) -> NodePresence {
    NodePresence {
        key: key.to_string(),
        node_id: node.id().clone(),
        verdict: node.record.verdict.clone(),
    }
}
