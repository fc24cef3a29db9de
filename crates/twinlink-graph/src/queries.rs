//! Read-side helpers shared by every [`GraphStore`].

use serde::Serialize;

use crate::node::{GraphNode, LinkKind, NodeClass, NodeId};
use crate::store::GraphStore;
use crate::variant::Variant;

/// Serializable view of a subtree, used for dumps and assertions.
#[derive(Debug, Clone, Serialize)]
pub struct TreeNode {
    pub id: String,
    pub class: NodeClass,
    pub browse_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Variant>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<(LinkKind, String)>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeNode>,
}

/// Convenience lookups layered over the store trait.
pub trait GraphQueries {
    /// Follow browse names from `start`, one hierarchical hop per name.
    fn browse_path(&self, start: &NodeId, path: &[&str]) -> Option<NodeId>;

    /// Hierarchical children of `id`, in link order.
    fn children(&self, id: &NodeId) -> Vec<GraphNode>;

    /// Ids of the subtree rooted at `id`, depth-first, root first.
    fn subtree(&self, id: &NodeId) -> Vec<NodeId>;

    /// Nearest ancestor of `id` (excluding itself) accepted by `pred`.
    fn ancestor_where(&self, id: &NodeId, pred: &dyn Fn(&NodeId) -> bool) -> Option<NodeId>;

    fn tree(&self, id: &NodeId) -> Option<TreeNode>;
}

impl<S: GraphStore + ?Sized> GraphQueries for S {
    fn browse_path(&self, start: &NodeId, path: &[&str]) -> Option<NodeId> {
        let mut current = start.clone();
        for name in path {
            current = self.find_child(&current, name)?;
        }
        Some(current)
    }

    fn children(&self, id: &NodeId) -> Vec<GraphNode> {
        let Some(node) = self.node(id) else {
            return Vec::new();
        };
        let children = node.children().filter_map(|c| self.node(c)).collect();
        children
    }

    fn subtree(&self, id: &NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id.clone()];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.node(&current) {
                let children: Vec<_> = node.children().cloned().collect();
                stack.extend(children.into_iter().rev());
                out.push(current);
            }
        }
        out
    }

    fn ancestor_where(&self, id: &NodeId, pred: &dyn Fn(&NodeId) -> bool) -> Option<NodeId> {
        let mut current = self.node(id)?.parent;
        while let Some(candidate) = current {
            if pred(&candidate) {
                return Some(candidate);
            }
            current = self.node(&candidate)?.parent;
        }
        None
    }

    fn tree(&self, id: &NodeId) -> Option<TreeNode> {
        let node = self.node(id)?;
        let children = node.children().filter_map(|c| self.tree(c)).collect();
        let links = node
            .links
            .iter()
            .filter(|l| !l.kind.is_hierarchical())
            .map(|l| (l.kind, l.target.to_string()))
            .collect();
        Some(TreeNode {
            id: node.id.to_string(),
            class: node.class,
            browse_name: node.browse_name,
            value: (node.class == NodeClass::Variable).then_some(node.value),
            links,
            children,
        })
    }
}
