//! twinlink-graph: the browsable, strongly-typed node graph.
//!
//! This crate is the single mutation point for the projected graph. All
//! structural changes are whole staged subtrees handed to a [`GraphStore`],
//! so concurrent readers never observe a partially built subtree.

pub mod memory;
pub mod node;
pub mod queries;
pub mod store;
pub mod subgraph;
pub mod variant;

pub use memory::MemoryGraph;
pub use node::{
    AccessLevel, Argument, GraphNode, Identifier, Link, LinkKind, MethodSignature, NodeClass,
    NodeId,
};
pub use queries::{GraphQueries, TreeNode};
pub use store::{BrowseEntry, GraphError, GraphStore};
pub use subgraph::Subgraph;
pub use variant::{DataType, LocalizedText, Variant};
