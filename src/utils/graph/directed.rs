//! Adjacency-set directed graph.

use crate::{utils::graph::node::NodeId, Error, Result};

/// A directed graph with typed node data and unlabelled, deduplicated edges.
///
/// Each node keeps its successor and predecessor lists, so both directions
/// can be walked in time proportional to the node's degree. Adding an edge
/// that already exists is a no-op.
///
/// Graphs are built single-threaded and then used immutably, possibly from
/// several threads.
///
/// # Examples
///
/// ```rust
/// use midend::utils::graph::DirectedGraph;
///
/// let mut graph: DirectedGraph<char> = DirectedGraph::new();
/// let a = graph.add_node('A');
/// let b = graph.add_node('B');
/// let c = graph.add_node('C');
/// assert!(graph.add_edge(a, b)?);
/// assert!(graph.add_edge(a, c)?);
/// assert!(!graph.add_edge(a, c)?);
///
/// assert_eq!(graph.successors(a).count(), 2);
/// assert_eq!(graph.predecessors(b).collect::<Vec<_>>(), vec![a]);
/// # Ok::<(), midend::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct DirectedGraph<N> {
    nodes: Vec<N>,
    successors: Vec<Vec<NodeId>>,
    predecessors: Vec<Vec<NodeId>>,
    edge_count: usize,
}

impl<N> Default for DirectedGraph<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N> DirectedGraph<N> {
    /// Creates a new empty directed graph.
    #[must_use]
    pub fn new() -> Self {
        DirectedGraph {
            nodes: Vec::new(),
            successors: Vec::new(),
            predecessors: Vec::new(),
            edge_count: 0,
        }
    }

    /// Adds a node and returns its id. Ids are sequential from 0.
    pub fn add_node(&mut self, data: N) -> NodeId {
        let id = NodeId::new(self.nodes.len());
        self.nodes.push(data);
        self.successors.push(Vec::new());
        self.predecessors.push(Vec::new());
        id
    }

    /// Adds the edge `source -> target`.
    ///
    /// Returns `false` if the edge was already present.
    ///
    /// # Errors
    ///
    /// Returns [`Error::GraphError`] if either endpoint is not a node of this
    /// graph.
    pub fn add_edge(&mut self, source: NodeId, target: NodeId) -> Result<bool> {
        for endpoint in [source, target] {
            if endpoint.index() >= self.nodes.len() {
                return Err(Error::GraphError(format!(
                    "node {endpoint} is not part of a graph with {} nodes",
                    self.nodes.len()
                )));
            }
        }
        if self.has_edge(source, target) {
            return Ok(false);
        }

        self.successors[source.index()].push(target);
        self.predecessors[target.index()].push(source);
        self.edge_count += 1;
        Ok(true)
    }

    /// Returns `true` if the edge `source -> target` exists.
    #[must_use]
    pub fn has_edge(&self, source: NodeId, target: NodeId) -> bool {
        self.successors
            .get(source.index())
            .is_some_and(|out| out.contains(&target))
    }

    /// Data of a node.
    #[must_use]
    pub fn node(&self, node: NodeId) -> Option<&N> {
        self.nodes.get(node.index())
    }

    /// Number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of distinct edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Returns `true` if the graph has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes with their ids, in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &N)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (NodeId::new(i), n))
    }

    /// Successors of a node, in edge insertion order. An unknown node has
    /// none.
    pub fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.successors.get(node.index()).into_iter().flatten().copied()
    }

    /// Predecessors of a node, in edge insertion order. An unknown node has
    /// none.
    pub fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.predecessors.get(node.index()).into_iter().flatten().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_definitions_reaching_a_use() {
        // two definitions of `a` on both branches of an `if`, one use after it
        let mut graph: DirectedGraph<&str> = DirectedGraph::new();
        let then_def = graph.add_node("a = 1");
        let else_def = graph.add_node("a = 2");
        let use_site = graph.add_node("return a");

        graph.add_edge(then_def, use_site).unwrap();
        graph.add_edge(else_def, use_site).unwrap();
        assert!(!graph.add_edge(else_def, use_site).unwrap());

        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 2);
        assert!(graph.has_edge(then_def, use_site));
        assert!(!graph.has_edge(use_site, then_def));
        assert_eq!(
            graph.predecessors(use_site).collect::<Vec<_>>(),
            vec![then_def, else_def]
        );
        assert_eq!(graph.node(else_def), Some(&"a = 2"));
    }

    #[test]
    fn test_edge_to_missing_node() {
        let mut graph: DirectedGraph<()> = DirectedGraph::new();
        let a = graph.add_node(());
        assert!(matches!(
            graph.add_edge(a, NodeId::new(7)),
            Err(Error::GraphError(_))
        ));
        assert!(matches!(
            graph.add_edge(NodeId::new(9), a),
            Err(Error::GraphError(_))
        ));
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_unknown_node_queries() {
        let graph: DirectedGraph<()> = DirectedGraph::default();
        assert!(graph.is_empty());
        assert_eq!(graph.successors(NodeId::new(3)).count(), 0);
        assert_eq!(graph.predecessors(NodeId::new(3)).count(), 0);
        assert!(graph.node(NodeId::new(0)).is_none());
    }
}
