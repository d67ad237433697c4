//! Node identifiers.

use std::fmt;

/// Index of a node within one [`DirectedGraph`](crate::utils::graph::DirectedGraph).
///
/// Ids are handed out sequentially by
/// [`DirectedGraph::add_node`](crate::utils::graph::DirectedGraph::add_node)
/// and are meaningless across graphs.
///
/// ```rust
/// use midend::utils::graph::NodeId;
///
/// assert_eq!(NodeId::new(5).index(), 5);
/// assert_eq!(NodeId::new(5).to_string(), "n5");
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

impl NodeId {
    /// Wraps a raw index.
    #[must_use]
    #[inline]
    pub const fn new(index: usize) -> Self {
        NodeId(index)
    }

    /// The raw index.
    #[must_use]
    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_node_id_ordering() {
        let set: BTreeSet<NodeId> = [NodeId::new(3), NodeId::new(1), NodeId::new(2)]
            .into_iter()
            .collect();
        let ordered: Vec<usize> = set.into_iter().map(NodeId::index).collect();
        assert_eq!(ordered, vec![1, 2, 3]);
        assert_eq!(format!("{:?}", NodeId::new(4)), "NodeId(4)");
    }
}
