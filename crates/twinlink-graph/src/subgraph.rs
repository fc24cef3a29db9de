//! Off-graph staging area for a subtree under construction.
//!
//! Projectors build a complete [`Subgraph`] before anything becomes
//! visible; the store then attaches it in a single operation so readers
//! never observe a half-built subtree.

use std::collections::HashMap;

use crate::node::{GraphNode, Link, LinkKind, NodeId};
use crate::store::{GraphError, Result};

#[derive(Debug, Clone)]
pub struct Subgraph {
    root: NodeId,
    nodes: HashMap<NodeId, GraphNode>,
}

impl Subgraph {
    /// Start a staging subgraph rooted at `root`.
    pub fn new(mut root: GraphNode) -> Self {
        root.parent = None;
        let id = root.id.clone();
        let mut nodes = HashMap::new();
        nodes.insert(id.clone(), root);
        Self { root: id, nodes }
    }

    pub fn root(&self) -> &NodeId {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn node(&self, id: &NodeId) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: &NodeId) -> Option<&mut GraphNode> {
        self.nodes.get_mut(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values()
    }

    /// Add `node` as the last child of `parent`.
    pub fn add_child(
        &mut self,
        parent: &NodeId,
        kind: LinkKind,
        mut node: GraphNode,
    ) -> Result<NodeId> {
        if self.nodes.contains_key(&node.id) {
            return Err(GraphError::DuplicateNode(node.id));
        }
        let id = node.id.clone();
        node.parent = Some(parent.clone());
        let parent_node = self
            .nodes
            .get_mut(parent)
            .ok_or_else(|| GraphError::NodeNotFound(parent.clone()))?;
        parent_node.links.push(Link {
            kind,
            target: id.clone(),
        });
        self.nodes.insert(id.clone(), node);
        Ok(id)
    }

    /// Merge another staged subtree as the last child of `parent`.
    pub fn graft(&mut self, parent: &NodeId, kind: LinkKind, other: Subgraph) -> Result<()> {
        if !self.nodes.contains_key(parent) {
            return Err(GraphError::NodeNotFound(parent.clone()));
        }
        if let Some(dup) = other.nodes.keys().find(|id| self.nodes.contains_key(*id)) {
            return Err(GraphError::DuplicateNode(dup.clone()));
        }

        let Subgraph { root, mut nodes } = other;
        if let Some(r) = nodes.get_mut(&root) {
            r.parent = Some(parent.clone());
        }
        if let Some(p) = self.nodes.get_mut(parent) {
            p.links.push(Link { kind, target: root });
        }
        self.nodes.extend(nodes);
        Ok(())
    }

    /// Add a non-owning link from a staged node to any node.
    pub fn add_link(&mut self, from: &NodeId, kind: LinkKind, target: NodeId) -> Result<()> {
        let node = self
            .nodes
            .get_mut(from)
            .ok_or_else(|| GraphError::NodeNotFound(from.clone()))?;
        let link = Link { kind, target };
        if !node.links.contains(&link) {
            node.links.push(link);
        }
        Ok(())
    }

    /// Child of `parent` with the given browse name.
    pub fn find_child(&self, parent: &NodeId, browse_name: &str) -> Option<NodeId> {
        let parent = self.nodes.get(parent)?;
        parent
            .children()
            .find(|id| {
                self.nodes
                    .get(*id)
                    .is_some_and(|n| n.browse_name == browse_name)
            })
            .cloned()
    }

    pub(crate) fn into_parts(self) -> (NodeId, HashMap<NodeId, GraphNode>) {
        (self.root, self.nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variant::{DataType, Variant};

    fn id(n: u32) -> NodeId {
        NodeId::numeric(2, n)
    }

    #[test]
    fn add_child_links_in_order() {
        let mut sub = Subgraph::new(GraphNode::object(id(1), "Root"));
        sub.add_child(&id(1), LinkKind::Component, GraphNode::object(id(2), "A"))
            .unwrap();
        sub.add_child(
            &id(1),
            LinkKind::HasProperty,
            GraphNode::variable(id(3), "B", Variant::Int32(1), DataType::Int32),
        )
        .unwrap();

        let root = sub.node(&id(1)).unwrap();
        let order: Vec<_> = root.children().cloned().collect();
        assert_eq!(order, vec![id(2), id(3)]);
        assert_eq!(sub.node(&id(3)).unwrap().parent, Some(id(1)));
        assert_eq!(sub.find_child(&id(1), "B"), Some(id(3)));
    }

    #[test]
    fn duplicate_and_missing_parent_rejected() {
        let mut sub = Subgraph::new(GraphNode::object(id(1), "Root"));
        let err = sub
            .add_child(&id(9), LinkKind::Component, GraphNode::object(id(2), "A"))
            .unwrap_err();
        assert!(matches!(err, GraphError::NodeNotFound(_)));

        let err = sub
            .add_child(&id(1), LinkKind::Component, GraphNode::object(id(1), "Again"))
            .unwrap_err();
        assert!(matches!(err, GraphError::DuplicateNode(_)));
    }

    #[test]
    fn graft_merges_subtree() {
        let mut sub = Subgraph::new(GraphNode::object(id(1), "Root"));
        let mut other = Subgraph::new(GraphNode::object(id(10), "Child"));
        other
            .add_child(&id(10), LinkKind::Component, GraphNode::object(id(11), "Leaf"))
            .unwrap();

        sub.graft(&id(1), LinkKind::OrderedComponent, other).unwrap();
        assert_eq!(sub.len(), 3);
        assert_eq!(sub.node(&id(10)).unwrap().parent, Some(id(1)));
        assert_eq!(sub.find_child(&id(10), "Leaf"), Some(id(11)));
    }
}
