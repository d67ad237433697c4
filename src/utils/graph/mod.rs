//! Generic directed graph infrastructure for program analysis.
//!
//! The use-def analysis stores one graph per variable: nodes are occurrences of
//! the variable, edges point from a definition to the uses it reaches. Graphs
//! are built once per tree snapshot and then only queried.
//!
//! # Key Components
//!
//! - [`NodeId`] - Strongly-typed node identifier
//! - [`DirectedGraph`] - Graph with deduplicated edges and traversal in both directions
//!
//! # Examples
//!
//! ```rust
//! use midend::utils::graph::DirectedGraph;
//!
//! let mut graph: DirectedGraph<&str> = DirectedGraph::new();
//! let def = graph.add_node("a = 1");
//! let use_site = graph.add_node("print(a)");
//! graph.add_edge(def, use_site)?;
//!
//! assert_eq!(graph.predecessors(use_site).collect::<Vec<_>>(), vec![def]);
//! # Ok::<(), midend::Error>(())
//! ```

mod directed;
mod node;

pub use directed::DirectedGraph;
pub use node::NodeId;
