//! In-memory graph store.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::node::{GraphNode, Link, LinkKind, NodeClass, NodeId};
use crate::store::{check_value, BrowseEntry, GraphError, GraphStore, Result};
use crate::subgraph::Subgraph;
use crate::variant::Variant;

struct Inner {
    nodes: RwLock<HashMap<NodeId, GraphNode>>,
    next_id: AtomicU32,
    namespace: u16,
}

/// Thread-safe in-memory graph.
///
/// Readers share a reader lock; every structural change takes the writer
/// lock once, so a reader sees either the old or the new subtree.
/// Clone is cheap (inner Arc).
#[derive(Clone)]
pub struct MemoryGraph {
    inner: Arc<Inner>,
}

impl MemoryGraph {
    /// Create a graph holding only the root `Objects` folder.
    pub fn new(namespace: u16) -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(
            NodeId::OBJECTS_FOLDER,
            GraphNode::object(NodeId::OBJECTS_FOLDER, "Objects"),
        );
        Self {
            inner: Arc::new(Inner {
                nodes: RwLock::new(nodes),
                next_id: AtomicU32::new(1),
                namespace,
            }),
        }
    }

    /// Number of nodes, including the root folder.
    pub fn len(&self) -> usize {
        self.inner.nodes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every node id.
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.inner.nodes.read().keys().cloned().collect()
    }
}

impl Default for MemoryGraph {
    fn default() -> Self {
        Self::new(2)
    }
}

// ── Locked helpers ────────────────────────────────────────────────

/// Ids of the subtree rooted at `id`, root first.
fn collect_subtree(nodes: &HashMap<NodeId, GraphNode>, id: &NodeId) -> Vec<NodeId> {
    let mut out = Vec::new();
    let mut stack = vec![id.clone()];
    while let Some(current) = stack.pop() {
        if let Some(node) = nodes.get(&current) {
            // Push in reverse so children are visited in link order.
            let children: Vec<_> = node.children().cloned().collect();
            stack.extend(children.into_iter().rev());
            out.push(current);
        }
    }
    out
}

/// Remove `ids`, unlink the subtree root from its parent and strip every
/// remaining link that points into the removed set.
fn remove_nodes(nodes: &mut HashMap<NodeId, GraphNode>, root: &NodeId, ids: &[NodeId]) {
    let parent = nodes.get(root).and_then(|n| n.parent.clone());
    let removed: HashSet<&NodeId> = ids.iter().collect();

    for id in ids {
        nodes.remove(id);
    }
    if let Some(parent) = parent.and_then(|p| nodes.get_mut(&p)) {
        parent.links.retain(|l| &l.target != root);
    }
    for node in nodes.values_mut() {
        node.links.retain(|l| !removed.contains(&l.target));
    }
}

/// Check a staged subtree against the graph as it will look once
/// `removing` is gone.
fn validate(
    nodes: &HashMap<NodeId, GraphNode>,
    parent: &NodeId,
    subgraph: &Subgraph,
    removing: &HashSet<NodeId>,
) -> Result<()> {
    let live = |id: &NodeId| nodes.contains_key(id) && !removing.contains(id);

    if !live(parent) {
        return Err(GraphError::DetachedParent(parent.clone()));
    }
    for node in subgraph.nodes() {
        if live(&node.id) {
            return Err(GraphError::DuplicateNode(node.id.clone()));
        }
        for link in &node.links {
            if !subgraph.contains(&link.target) && !live(&link.target) {
                return Err(GraphError::NodeNotFound(link.target.clone()));
            }
        }
    }
    Ok(())
}

/// Validate then insert a staged subtree under `parent`.
fn insert_subgraph(
    nodes: &mut HashMap<NodeId, GraphNode>,
    parent: &NodeId,
    kind: LinkKind,
    subgraph: Subgraph,
) -> Result<NodeId> {
    validate(nodes, parent, &subgraph, &HashSet::new())?;

    let (root, mut staged) = subgraph.into_parts();
    if let Some(r) = staged.get_mut(&root) {
        r.parent = Some(parent.clone());
    }
    if let Some(p) = nodes.get_mut(parent) {
        p.links.push(Link {
            kind,
            target: root.clone(),
        });
    }
    nodes.extend(staged);
    Ok(root)
}

// ── GraphStore ────────────────────────────────────────────────────

impl GraphStore for MemoryGraph {
    fn namespace(&self) -> u16 {
        self.inner.namespace
    }

    fn allocate_id(&self) -> NodeId {
        let n = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        NodeId::numeric(self.inner.namespace, n)
    }

    fn root(&self) -> NodeId {
        NodeId::OBJECTS_FOLDER
    }

    fn attach(&self, parent: &NodeId, kind: LinkKind, subgraph: Subgraph) -> Result<NodeId> {
        let size = subgraph.len();
        let mut nodes = self.inner.nodes.write();
        let root = insert_subgraph(&mut nodes, parent, kind, subgraph)?;
        tracing::debug!(parent = %parent, root = %root, nodes = size, "Attached subtree");
        Ok(root)
    }

    fn replace(&self, old: &NodeId, subgraph: Subgraph) -> Result<Vec<NodeId>> {
        let mut nodes = self.inner.nodes.write();

        let old_node = nodes
            .get(old)
            .ok_or_else(|| GraphError::NodeNotFound(old.clone()))?;
        let parent = old_node.parent.clone().ok_or(GraphError::RootDetach)?;
        let kind = nodes
            .get(&parent)
            .and_then(|p| p.link_to(old))
            .map(|l| l.kind)
            .ok_or_else(|| GraphError::DetachedParent(parent.clone()))?;

        let removed = collect_subtree(&nodes, old);
        let removing: HashSet<NodeId> = removed.iter().cloned().collect();

        validate(&nodes, &parent, &subgraph, &removing)?;

        remove_nodes(&mut nodes, old, &removed);
        let root = insert_subgraph(&mut nodes, &parent, kind, subgraph)?;
        tracing::debug!(old = %old, new = %root, removed = removed.len(), "Replaced subtree");
        Ok(removed)
    }

    fn replace_children(
        &self,
        id: &NodeId,
        value: Variant,
        children: Vec<(LinkKind, Subgraph)>,
    ) -> Result<Vec<NodeId>> {
        let mut nodes = self.inner.nodes.write();

        let node = nodes
            .get(id)
            .ok_or_else(|| GraphError::NodeNotFound(id.clone()))?;
        check_value(node, &value)?;
        let old_children: Vec<NodeId> = node.children().cloned().collect();

        let removed: Vec<NodeId> = old_children
            .iter()
            .flat_map(|child| collect_subtree(&nodes, child))
            .collect();
        let removing: HashSet<NodeId> = removed.iter().cloned().collect();

        // Everything is checked before the first change so a failure leaves
        // the node as it was.
        let mut staged_ids = HashSet::new();
        for (_, subgraph) in &children {
            validate(&nodes, id, subgraph, &removing)?;
            for node in subgraph.nodes() {
                if !staged_ids.insert(node.id.clone()) {
                    return Err(GraphError::DuplicateNode(node.id.clone()));
                }
            }
        }

        for child in &old_children {
            let ids = collect_subtree(&nodes, child);
            remove_nodes(&mut nodes, child, &ids);
        }
        if let Some(node) = nodes.get_mut(id) {
            node.value = value;
        }
        for (kind, subgraph) in children {
            insert_subgraph(&mut nodes, id, kind, subgraph)?;
        }
        tracing::debug!(node = %id, removed = removed.len(), "Replaced children");
        Ok(removed)
    }

    fn detach(&self, id: &NodeId) -> Result<Vec<NodeId>> {
        if id == &NodeId::OBJECTS_FOLDER {
            return Err(GraphError::RootDetach);
        }
        let mut nodes = self.inner.nodes.write();
        if !nodes.contains_key(id) {
            return Err(GraphError::NodeNotFound(id.clone()));
        }
        let removed = collect_subtree(&nodes, id);
        remove_nodes(&mut nodes, id, &removed);
        tracing::debug!(root = %id, removed = removed.len(), "Detached subtree");
        Ok(removed)
    }

    fn add_link(&self, from: &NodeId, kind: LinkKind, to: &NodeId) -> Result<()> {
        let mut nodes = self.inner.nodes.write();
        if !nodes.contains_key(to) {
            return Err(GraphError::NodeNotFound(to.clone()));
        }
        let node = nodes
            .get_mut(from)
            .ok_or_else(|| GraphError::NodeNotFound(from.clone()))?;
        let link = Link {
            kind,
            target: to.clone(),
        };
        if !node.links.contains(&link) {
            node.links.push(link);
        }
        Ok(())
    }

    fn remove_link(&self, from: &NodeId, kind: LinkKind, to: &NodeId) -> Result<bool> {
        let mut nodes = self.inner.nodes.write();
        let node = nodes
            .get_mut(from)
            .ok_or_else(|| GraphError::NodeNotFound(from.clone()))?;
        let before = node.links.len();
        node.links.retain(|l| !(l.kind == kind && &l.target == to));
        Ok(node.links.len() != before)
    }

    fn node(&self, id: &NodeId) -> Option<GraphNode> {
        self.inner.nodes.read().get(id).cloned()
    }

    fn contains(&self, id: &NodeId) -> bool {
        self.inner.nodes.read().contains_key(id)
    }

    fn browse(&self, id: &NodeId) -> Result<Vec<BrowseEntry>> {
        let nodes = self.inner.nodes.read();
        let node = nodes
            .get(id)
            .ok_or_else(|| GraphError::NodeNotFound(id.clone()))?;
        Ok(node
            .links
            .iter()
            .filter_map(|link| {
                nodes.get(&link.target).map(|target| BrowseEntry {
                    kind: link.kind,
                    target: link.target.clone(),
                    browse_name: target.browse_name.clone(),
                    class: target.class,
                })
            })
            .collect())
    }

    fn find_child(&self, parent: &NodeId, browse_name: &str) -> Option<NodeId> {
        let nodes = self.inner.nodes.read();
        let parent = nodes.get(parent)?;
        let found = parent
            .children()
            .find(|id| {
                nodes
                    .get(*id)
                    .is_some_and(|n| n.browse_name == browse_name)
            })
            .cloned();
        found
    }

    fn read(&self, id: &NodeId) -> Result<Variant> {
        let nodes = self.inner.nodes.read();
        let node = nodes
            .get(id)
            .ok_or_else(|| GraphError::NodeNotFound(id.clone()))?;
        if node.class != NodeClass::Variable {
            return Err(GraphError::NotVariable(id.clone()));
        }
        Ok(node.value.clone())
    }

    fn write(&self, id: &NodeId, value: Variant) -> Result<()> {
        let mut nodes = self.inner.nodes.write();
        let node = nodes
            .get_mut(id)
            .ok_or_else(|| GraphError::NodeNotFound(id.clone()))?;
        check_value(node, &value)?;
        node.value = value;
        Ok(())
    }
}
