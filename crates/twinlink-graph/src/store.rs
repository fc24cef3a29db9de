//! The graph store capability.
//!
//! Every graph read and write flows through [`GraphStore`]. Structural
//! changes are whole-subtree operations: a staged [`Subgraph`] is attached,
//! replaced or detached atomically with respect to readers.

use crate::node::{GraphNode, LinkKind, NodeClass, NodeId};
use crate::subgraph::Subgraph;
use crate::variant::{DataType, Variant};

/// Errors from graph operations.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Duplicate node: {0}")]
    DuplicateNode(NodeId),

    #[error("Parent node is not attached: {0}")]
    DetachedParent(NodeId),

    #[error("Node {0} is not a variable")]
    NotVariable(NodeId),

    #[error("Type mismatch on {node}: expected {expected}, got {found}")]
    TypeMismatch {
        node: NodeId,
        expected: DataType,
        found: DataType,
    },

    #[error("Array too long for {node}: at most {max} elements, got {got}")]
    ArrayBounds { node: NodeId, max: usize, got: usize },

    #[error("The root folder cannot be detached")]
    RootDetach,
}

pub type Result<T> = std::result::Result<T, GraphError>;

/// One outgoing link as seen by a browsing client.
#[derive(Debug, Clone, PartialEq)]
pub struct BrowseEntry {
    pub kind: LinkKind,
    pub target: NodeId,
    pub browse_name: String,
    pub class: NodeClass,
}

/// A browsable, typed node graph.
pub trait GraphStore: Send + Sync {
    /// Namespace of ids handed out by [`GraphStore::allocate_id`].
    fn namespace(&self) -> u16;

    /// A fresh, never reused node id.
    fn allocate_id(&self) -> NodeId;

    /// The root `Objects` folder.
    fn root(&self) -> NodeId;

    /// Attach a staged subtree as the last child of `parent`.
    fn attach(&self, parent: &NodeId, kind: LinkKind, subgraph: Subgraph) -> Result<NodeId>;

    /// Swap the subtree at `old` for `subgraph` under the same parent and
    /// with the same link kind. The new subtree is appended after the
    /// remaining siblings. Returns the ids that were removed.
    fn replace(&self, old: &NodeId, subgraph: Subgraph) -> Result<Vec<NodeId>>;

    /// Store `value` on `id` and swap every hierarchical child of `id` for
    /// `children`, in one step. Returns the ids that were removed.
    fn replace_children(
        &self,
        id: &NodeId,
        value: Variant,
        children: Vec<(LinkKind, Subgraph)>,
    ) -> Result<Vec<NodeId>>;

    /// Remove the subtree rooted at `id` and every link into it.
    fn detach(&self, id: &NodeId) -> Result<Vec<NodeId>>;

    fn add_link(&self, from: &NodeId, kind: LinkKind, to: &NodeId) -> Result<()>;

    fn remove_link(&self, from: &NodeId, kind: LinkKind, to: &NodeId) -> Result<bool>;

    fn node(&self, id: &NodeId) -> Option<GraphNode>;

    fn contains(&self, id: &NodeId) -> bool {
        self.node(id).is_some()
    }

    /// Outgoing links of `id`, in link order.
    fn browse(&self, id: &NodeId) -> Result<Vec<BrowseEntry>>;

    /// Hierarchical child of `parent` with the given browse name.
    fn find_child(&self, parent: &NodeId, browse_name: &str) -> Option<NodeId>;

    fn read(&self, id: &NodeId) -> Result<Variant>;

    /// Store a new value. Type and array bounds are checked; access level
    /// is the caller's concern.
    fn write(&self, id: &NodeId, value: Variant) -> Result<()>;
}

/// Check that `value` fits the declared type and bounds of `node`.
pub fn check_value(node: &GraphNode, value: &Variant) -> Result<()> {
    if node.class != NodeClass::Variable {
        return Err(GraphError::NotVariable(node.id.clone()));
    }

    if let (Some(max), Variant::Array(items)) = (node.array_len, value) {
        if items.len() > max {
            return Err(GraphError::ArrayBounds {
                node: node.id.clone(),
                max,
                got: items.len(),
            });
        }
    }

    if node.data_type == DataType::BaseDataType {
        return Ok(());
    }

    let scalars: Vec<&Variant> = match value {
        Variant::Array(items) => items.iter().collect(),
        other => vec![other],
    };
    for v in scalars {
        if let Some(found) = v.data_type() {
            if found != node.data_type {
                return Err(GraphError::TypeMismatch {
                    node: node.id.clone(),
                    expected: node.data_type,
                    found,
                });
            }
        }
    }
    Ok(())
}
