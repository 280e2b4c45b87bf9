//! VIGIL Execution Graph
//!
//! Builds the DAG of one execution group from its parent/child links,
//! aggregates per-node verdicts into a graph verdict, walks the evidence
//! path to the first failure, and diffs two executions of the same
//! workflow. Every "first" is taken in the graph's canonical order.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod aggregate;
pub mod analysis;
pub mod diff;
pub mod graph;
pub mod investigate;

#[cfg(test)]
pub(crate) mod fixtures;

pub use aggregate::{aggregate, tainted_nodes, GraphVerdict};
pub use analysis::{analyze, Bottleneck, LatencyAnalysis};
pub use diff::{diff, diff_by, GraphDelta, NodeComparison, NodeKey, NodePresence};
pub use graph::{build, Edge, ExecutionGraph, GraphNode};
pub use investigate::{investigation_path, ObservationRecord};
