//! Execution graph construction.
//!
//! The graph is a view over the call records of one execution group, with
//! directed edges parent → child. Nodes are stored in canonical
//! topological order: a parent always precedes its children, and among
//! nodes that are ready at the same time the one supplied earlier wins.
//! Input order is the recording order; timestamps are never consulted.

use indexmap::IndexMap;
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use vigil_core::{CallRecord, ExecutionId, NodeId, VigilError, VigilResult};

/// A node in the execution graph
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphNode {
    /// The recorded call
    pub record: CallRecord,
    /// Children in canonical order
    pub children: Vec<NodeId>,
    /// Distance from the node's root
    pub depth: usize,
    /// Index in canonical order
    pub position: usize,
}

impl GraphNode {
    /// Node id
    #[must_use]
    pub fn id(&self) -> &NodeId {
        &self.record.node_id
    }

    /// Parent node id, `None` for roots
    #[must_use]
    pub fn parent(&self) -> Option<&NodeId> {
        self.record.parent_node_id.as_ref()
    }

    /// Whether this node has no children
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// A parent → child edge
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Edge {
    /// Parent node
    pub from: NodeId,
    /// Child node
    pub to: NodeId,
}

/// The DAG of one execution group
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionGraph {
    execution_id: ExecutionId,
    /// Nodes in canonical order
    nodes: IndexMap<NodeId, GraphNode>,
    /// Roots in canonical order
    roots: Vec<NodeId>,
}

/// Build the graph of one execution group
///
/// # Errors
///
/// See [`ExecutionGraph::build`]
pub fn build(records: Vec<CallRecord>) -> VigilResult<ExecutionGraph> {
    ExecutionGraph::build(records)
}

impl ExecutionGraph {
    /// Build the graph from records in recording order.
    ///
    /// # Errors
    ///
    /// - `EmptyExecutionSet` for zero records
    /// - `MixedExecutionSet` if execution ids differ
    /// - `DuplicateNodeId` if a node id repeats
    /// - `DanglingParent` if a parent id matches no node
    /// - `CyclicGraph` if parent links loop
    pub fn build(records: Vec<CallRecord>) -> VigilResult<Self> {
        let Some(first) = records.first() else {
            tracing::warn!("rejected empty execution set");
            return Err(VigilError::EmptyExecutionSet);
        };
        let execution_id = first.execution_id.clone();

        let mut index: HashMap<&NodeId, usize> = HashMap::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            if record.execution_id != execution_id {
                return Err(VigilError::MixedExecutionSet {
                    expected: execution_id,
                    found: record.execution_id.clone(),
                    node_id: record.node_id.clone(),
                });
            }
            if index.insert(&record.node_id, i).is_some() {
                return Err(VigilError::DuplicateNodeId {
                    node_id: record.node_id.clone(),
                });
            }
        }

        let mut children: Vec<Vec<usize>> = vec![Vec::new(); records.len()];
        let mut ready = BinaryHeap::new();
        for (i, record) in records.iter().enumerate() {
            match &record.parent_node_id {
                None => ready.push(Reverse(i)),
                Some(parent) => {
                    let Some(&p) = index.get(parent) else {
                        tracing::warn!(
                            execution_id = %execution_id,
                            node_id = %record.node_id,
                            parent_node_id = %parent,
                            "rejected dangling parent reference"
                        );
                        return Err(VigilError::DanglingParent {
                            node_id: record.node_id.clone(),
                            parent_node_id: parent.clone(),
                        });
                    };
                    children[p].push(i);
                }
            }
        }

        // Kahn's algorithm; every node has at most one parent, so a node is
        // ready exactly when its parent has been emitted.
        let mut order = Vec::with_capacity(records.len());
        let mut depth = vec![0usize; records.len()];
        while let Some(Reverse(i)) = ready.pop() {
            order.push(i);
            for &child in &children[i] {
                depth[child] = depth[i] + 1;
                ready.push(Reverse(child));
            }
        }

        if order.len() < records.len() {
            let mut emitted = vec![false; records.len()];
            for &i in &order {
                emitted[i] = true;
            }
            let node_ids: Vec<NodeId> = records
                .iter()
                .enumerate()
                .filter(|(i, _)| !emitted[*i])
                .map(|(_, r)| r.node_id.clone())
                .collect();
            tracing::warn!(execution_id = %execution_id, nodes = node_ids.len(), "rejected cyclic parent links");
            return Err(VigilError::CyclicGraph { node_ids });
        }

        let mut position = vec![0usize; records.len()];
        for (pos, &i) in order.iter().enumerate() {
            position[i] = pos;
        }

        let ids: Vec<NodeId> = records.iter().map(|r| r.node_id.clone()).collect();
        let mut slots: Vec<Option<CallRecord>> = records.into_iter().map(Some).collect();
        let mut nodes = IndexMap::with_capacity(order.len());
        let mut roots = Vec::new();

        for &i in &order {
            let Some(record) = slots[i].take() else {
                continue;
            };
            let mut kids = children[i].clone();
            kids.sort_by_key(|&c| position[c]);
            if record.is_root() {
                roots.push(record.node_id.clone());
            }
            nodes.insert(
                record.node_id.clone(),
                GraphNode {
                    record,
                    children: kids.into_iter().map(|c| ids[c].clone()).collect(),
                    depth: depth[i],
                    position: position[i],
                },
            );
        }

        tracing::debug!(
            execution_id = %execution_id,
            nodes = nodes.len(),
            roots = roots.len(),
            "built execution graph"
        );

        Ok(Self {
            execution_id,
            nodes,
            roots,
        })
    }

    /// Execution group id
    #[must_use]
    pub fn execution_id(&self) -> &ExecutionId {
        &self.execution_id
    }

    /// Node count
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false for a built graph
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Get node by id
    #[must_use]
    pub fn node(&self, id: &NodeId) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    /// Nodes in canonical order
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values()
    }

    /// Node ids in canonical order
    pub fn canonical_order(&self) -> impl Iterator<Item = &NodeId> {
        self.nodes.keys()
    }

    /// Roots in canonical order
    #[must_use]
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Children of a node in canonical order, empty for unknown ids
    #[must_use]
    pub fn children(&self, id: &NodeId) -> &[NodeId] {
        self.nodes.get(id).map_or(&[], |n| n.children.as_slice())
    }

    /// Leaves in canonical order
    pub fn leaves(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values().filter(|n| n.is_leaf())
    }

    /// All edges, ordered by parent then child canonical position
    #[must_use]
    pub fn edges(&self) -> Vec<Edge> {
        self.nodes
            .values()
            .flat_map(|n| {
                n.children.iter().map(|c| Edge {
                    from: n.id().clone(),
                    to: c.clone(),
                })
            })
            .collect()
    }

    /// Every node reachable from `id` through child edges, excluding `id`,
    /// in canonical order
    ///
    /// # Errors
    ///
    /// `NodeNotFound` if `id` is not in the graph
    pub fn descendants(&self, id: &NodeId) -> VigilResult<Vec<NodeId>> {
        let start = self.require(id)?;
        let mut found: Vec<&GraphNode> = Vec::new();
        let mut stack: Vec<&NodeId> = start.children.iter().collect();
        while let Some(next) = stack.pop() {
            if let Some(node) = self.nodes.get(next) {
                found.push(node);
                stack.extend(node.children.iter());
            }
        }
        found.sort_by_key(|n| n.position);
        Ok(found.into_iter().map(|n| n.id().clone()).collect())
    }

    /// The chain from the node's root down to the node, inclusive
    ///
    /// # Errors
    ///
    /// `NodeNotFound` if `id` is not in the graph
    pub fn path_from_root(&self, id: &NodeId) -> VigilResult<Vec<NodeId>> {
        let mut node = self.require(id)?;
        let mut path = vec![node.id().clone()];
        while let Some(parent) = node.parent() {
            node = self.require(parent)?;
            path.push(node.id().clone());
        }
        path.reverse();
        Ok(path)
    }

    fn require(&self, id: &NodeId) -> VigilResult<&GraphNode> {
        self.nodes.get(id).ok_or_else(|| VigilError::NodeNotFound {
            node_id: id.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{node, pass};
    use vigil_core::{ErrorCode, Timestamp};

    fn ids(graph: &ExecutionGraph) -> Vec<&str> {
        graph.canonical_order().map(NodeId::as_str).collect()
    }

    #[test]
    fn test_build_empty_fails() {
        let err = build(Vec::new()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::EmptyExecutionSet);
    }

    #[test]
    fn test_build_chain() {
        let graph = build(vec![
            node("a", None, pass()),
            node("b", Some("a"), pass()),
            node("c", Some("b"), pass()),
        ])
        .unwrap();
        assert_eq!(ids(&graph), vec!["a", "b", "c"]);
        assert_eq!(graph.roots(), &[NodeId::from("a")]);
        assert_eq!(graph.node(&NodeId::from("c")).unwrap().depth, 2);
        assert_eq!(graph.edges().len(), 2);
    }

    #[test]
    fn test_parent_precedes_child_regardless_of_input_order() {
        let graph = build(vec![
            node("c", Some("b"), pass()),
            node("b", Some("a"), pass()),
            node("a", None, pass()),
        ])
        .unwrap();
        assert_eq!(ids(&graph), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_independent_roots_follow_input_order_not_timestamp() {
        let x = node("x", None, pass()).with_timestamp(Timestamp::from_millis(2_000));
        let y = node("y", None, pass()).with_timestamp(Timestamp::from_millis(1_000));
        let graph = build(vec![x, y]).unwrap();
        assert_eq!(ids(&graph), vec!["x", "y"]);
        assert_eq!(graph.roots().len(), 2);
    }

    #[test]
    fn test_ready_nodes_break_ties_by_input_index() {
        // r1 and r2 are roots; c1 is r1's child but recorded after r2
        let graph = build(vec![
            node("r1", None, pass()),
            node("r2", None, pass()),
            node("c1", Some("r1"), pass()),
        ])
        .unwrap();
        assert_eq!(ids(&graph), vec!["r1", "r2", "c1"]);
    }

    #[test]
    fn test_dangling_parent_is_surfaced() {
        let err = build(vec![node("a", None, pass()), node("b", Some("zz"), pass())]).unwrap_err();
        assert_eq!(
            err,
            VigilError::DanglingParent {
                node_id: NodeId::from("b"),
                parent_node_id: NodeId::from("zz"),
            }
        );
    }

    #[test]
    fn test_duplicate_node_id() {
        let err = build(vec![node("a", None, pass()), node("a", None, pass())]).unwrap_err();
        assert_eq!(err.code(), ErrorCode::DuplicateNodeId);
    }

    #[test]
    fn test_mixed_execution_rejected() {
        let mut other = node("b", None, pass());
        other.execution_id = ExecutionId::from("exec-other");
        let err = build(vec![node("a", None, pass()), other]).unwrap_err();
        assert_eq!(err.code(), ErrorCode::MixedExecutionSet);
    }

    #[test]
    fn test_cycle_rejected() {
        let err = build(vec![
            node("root", None, pass()),
            node("a", Some("b"), pass()),
            node("b", Some("a"), pass()),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            VigilError::CyclicGraph {
                node_ids: vec![NodeId::from("a"), NodeId::from("b")]
            }
        );
    }

    #[test]
    fn test_self_parent_is_a_cycle() {
        let err = build(vec![node("a", Some("a"), pass())]).unwrap_err();
        assert_eq!(err.code(), ErrorCode::CyclicExecutionGraph);
    }

    #[test]
    fn test_descendants_and_path() {
        let graph = build(vec![
            node("a", None, pass()),
            node("b", Some("a"), pass()),
            node("c", Some("a"), pass()),
            node("d", Some("b"), pass()),
        ])
        .unwrap();
        let desc = graph.descendants(&NodeId::from("a")).unwrap();
        assert_eq!(desc, vec![NodeId::from("b"), NodeId::from("c"), NodeId::from("d")]);
        let path = graph.path_from_root(&NodeId::from("d")).unwrap();
        assert_eq!(path, vec![NodeId::from("a"), NodeId::from("b"), NodeId::from("d")]);
        assert_eq!(graph.leaves().count(), 2);
        assert!(graph.descendants(&NodeId::from("nope")).is_err());
    }

    #[test]
    fn test_children_in_canonical_order() {
        let graph = build(vec![
            node("a", None, pass()),
            node("c", Some("a"), pass()),
            node("b", Some("a"), pass()),
        ])
        .unwrap();
        assert_eq!(
            graph.children(&NodeId::from("a")),
            &[NodeId::from("c"), NodeId::from("b")]
        );
    }
}
