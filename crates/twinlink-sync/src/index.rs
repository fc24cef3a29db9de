//! Bidirectional reference index.
//!
//! Maps every projected element's [`Reference`] to the node at the root of
//! its subtree (and back), and every bound leaf or method node to the
//! element field it exposes. Removal cascades by reference prefix.

use std::collections::HashMap;

use parking_lot::RwLock;

use twinlink_core::{Reference, SubmodelElement};
use twinlink_graph::NodeId;

use crate::binding::ValueBinding;
use crate::error::{Result, SyncError};

/// Where children of a container element are attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    pub node: NodeId,
    pub ordered: bool,
}

#[derive(Default)]
struct Inner {
    by_ref: HashMap<Reference, NodeId>,
    by_node: HashMap<NodeId, Reference>,
    bindings: HashMap<NodeId, ValueBinding>,
    containers: HashMap<Reference, Container>,
    /// Element node → its semantic id, for dictionary cross-links.
    semantics: HashMap<NodeId, Reference>,
    /// Element node → its qualifier container.
    qualifiers: HashMap<NodeId, NodeId>,
}

/// Everything a staged subtree registers once it is attached.
#[derive(Debug, Default)]
pub struct Registration {
    pub references: Vec<(Reference, NodeId)>,
    pub bindings: Vec<(NodeId, ValueBinding)>,
    pub containers: Vec<(Reference, Container)>,
    pub semantics: Vec<(NodeId, Reference)>,
    pub qualifiers: Vec<(NodeId, NodeId)>,
}

impl Registration {
    pub fn extend(&mut self, other: Registration) {
        self.references.extend(other.references);
        self.bindings.extend(other.bindings);
        self.containers.extend(other.containers);
        self.semantics.extend(other.semantics);
        self.qualifiers.extend(other.qualifiers);
    }
}

#[derive(Default)]
pub struct ReferenceIndex {
    inner: RwLock<Inner>,
}

impl ReferenceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    // ── References ────────────────────────────────────────────────

    /// Map `reference` to `node`. A reference can only be mapped once.
    pub fn put(&self, reference: Reference, node: NodeId) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.by_ref.contains_key(&reference) {
            return Err(SyncError::StructuralConflict(reference.to_string()));
        }
        inner.by_node.insert(node.clone(), reference.clone());
        inner.by_ref.insert(reference, node);
        Ok(())
    }

    pub fn get(&self, reference: &Reference) -> Option<NodeId> {
        self.inner.read().by_ref.get(reference).cloned()
    }

    pub fn contains(&self, reference: &Reference) -> bool {
        self.inner.read().by_ref.contains_key(reference)
    }

    pub fn reverse(&self, node: &NodeId) -> Option<Reference> {
        self.inner.read().by_node.get(node).cloned()
    }

    /// Remove `reference` and every entry beneath it, with their bindings.
    /// Returns the removed references.
    pub fn remove(&self, reference: &Reference) -> Vec<Reference> {
        let mut inner = self.inner.write();
        let removed: Vec<Reference> = inner
            .by_ref
            .keys()
            .filter(|r| r.starts_with(reference))
            .cloned()
            .collect();

        for r in &removed {
            if let Some(node) = inner.by_ref.remove(r) {
                inner.by_node.remove(&node);
                inner.semantics.remove(&node);
                inner.qualifiers.remove(&node);
            }
            inner.containers.remove(r);
        }
        inner
            .bindings
            .retain(|_, b| !b.reference.starts_with(reference));
        removed
    }

    /// References that would clash with `refs`, ignoring everything under
    /// `replacing`.
    pub fn conflicts(
        &self,
        refs: &[(Reference, NodeId)],
        replacing: Option<&Reference>,
    ) -> Option<Reference> {
        let inner = self.inner.read();
        refs.iter()
            .map(|(r, _)| r)
            .find(|r| {
                inner.by_ref.contains_key(*r) && !replacing.is_some_and(|p| r.starts_with(p))
            })
            .cloned()
    }

    // ── Bindings ──────────────────────────────────────────────────

    pub fn put_value_map(&self, node: NodeId, binding: ValueBinding) {
        self.inner.write().bindings.insert(node, binding);
    }

    pub fn get_value_map(&self, node: &NodeId) -> Option<ValueBinding> {
        self.inner.read().bindings.get(node).cloned()
    }

    /// Bound nodes of the element at `reference`.
    pub fn bindings_for(&self, reference: &Reference) -> Vec<(NodeId, ValueBinding)> {
        self.inner
            .read()
            .bindings
            .iter()
            .filter(|(_, b)| &b.reference == reference)
            .map(|(n, b)| (n.clone(), b.clone()))
            .collect()
    }

    /// Replace the element snapshot held by every binding of `reference`.
    pub fn refresh_snapshot(&self, reference: &Reference, element: &SubmodelElement) {
        let mut inner = self.inner.write();
        for binding in inner.bindings.values_mut() {
            if &binding.reference == reference {
                binding.element = element.clone();
            }
        }
    }

    // ── Containers and semantics ──────────────────────────────────

    pub fn container(&self, reference: &Reference) -> Option<Container> {
        self.inner.read().containers.get(reference).cloned()
    }

    /// Element nodes whose semantic id names `concept`.
    pub fn semantic_matches(&self, concept: &Reference) -> Vec<NodeId> {
        self.inner
            .read()
            .semantics
            .iter()
            .filter(|(_, sem)| sem.values_eq(concept))
            .map(|(n, _)| n.clone())
            .collect()
    }

    /// The qualifier container below element node `element`.
    pub fn qualifier_container(&self, element: &NodeId) -> Option<NodeId> {
        self.inner.read().qualifiers.get(element).cloned()
    }

    pub fn put_qualifier_container(&self, element: NodeId, container: NodeId) {
        self.inner.write().qualifiers.insert(element, container);
    }

    /// Register everything a freshly attached subtree produced.
    pub fn register(&self, registration: Registration) -> Result<()> {
        let Registration {
            references,
            bindings,
            containers,
            semantics,
            qualifiers,
        } = registration;

        for (reference, node) in references {
            self.put(reference, node)?;
        }
        let mut inner = self.inner.write();
        inner.bindings.extend(bindings);
        inner.containers.extend(containers);
        inner.semantics.extend(semantics);
        inner.qualifiers.extend(qualifiers);
        Ok(())
    }

    // ── Introspection ─────────────────────────────────────────────

    pub fn len(&self) -> usize {
        self.inner.read().by_ref.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn binding_count(&self) -> usize {
        self.inner.read().bindings.len()
    }

    /// Snapshot of every reference mapping.
    pub fn entries(&self) -> Vec<(Reference, NodeId)> {
        self.inner
            .read()
            .by_ref
            .iter()
            .map(|(r, n)| (r.clone(), n.clone()))
            .collect()
    }

    /// Snapshot of every binding.
    pub fn bindings(&self) -> Vec<(NodeId, ValueBinding)> {
        self.inner
            .read()
            .bindings
            .iter()
            .map(|(n, b)| (n.clone(), b.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::ValueKind;
    use twinlink_core::{DataTypeDef, Key, KeyType, Property};

    fn sm() -> Reference {
        Reference::submodel("urn:sm:1")
    }

    fn coll() -> Reference {
        sm().child(Key::id_short(KeyType::SubmodelElementCollection, "C"))
    }

    fn prop(name: &str) -> Reference {
        coll().child(Key::id_short(KeyType::Property, name))
    }

    fn binding(reference: Reference) -> ValueBinding {
        ValueBinding::new(
            ValueKind::PropertyValue,
            reference,
            Some(sm()),
            SubmodelElement::Property(Property::new("P", DataTypeDef::Int, "1")),
        )
    }

    #[test]
    fn test_put_get_reverse() {
        let index = ReferenceIndex::new();
        index.put(sm(), NodeId::numeric(2, 1)).unwrap();
        assert_eq!(index.get(&sm()), Some(NodeId::numeric(2, 1)));
        assert_eq!(index.reverse(&NodeId::numeric(2, 1)), Some(sm()));

        // A structurally equal but freshly built reference resolves too.
        assert!(index.contains(&Reference::submodel("urn:sm:1")));

        let err = index.put(sm(), NodeId::numeric(2, 2)).unwrap_err();
        assert!(matches!(err, SyncError::StructuralConflict(_)));
    }

    #[test]
    fn test_remove_cascades_by_prefix() {
        let index = ReferenceIndex::new();
        index.put(sm(), NodeId::numeric(2, 1)).unwrap();
        index.put(coll(), NodeId::numeric(2, 2)).unwrap();
        index.put(prop("A"), NodeId::numeric(2, 3)).unwrap();
        index.put_value_map(NodeId::numeric(2, 4), binding(prop("A")));
        let top = sm().child(Key::id_short(KeyType::Property, "Top"));
        index.put_value_map(NodeId::numeric(2, 5), binding(top));

        let mut removed = index.remove(&coll());
        removed.sort_by_key(|r| r.len());
        assert_eq!(removed, vec![coll(), prop("A")]);
        assert_eq!(index.len(), 1);
        assert!(index.get_value_map(&NodeId::numeric(2, 4)).is_none());
        assert!(index.get_value_map(&NodeId::numeric(2, 5)).is_some());

        // Removing again is a no-op.
        assert!(index.remove(&coll()).is_empty());
    }

    #[test]
    fn test_conflicts_ignore_replaced_subtree() {
        let index = ReferenceIndex::new();
        index.put(coll(), NodeId::numeric(2, 2)).unwrap();
        index.put(prop("A"), NodeId::numeric(2, 3)).unwrap();

        let staged = vec![
            (coll(), NodeId::numeric(2, 9)),
            (prop("A"), NodeId::numeric(2, 10)),
        ];
        assert_eq!(index.conflicts(&staged, None), Some(coll()));
        assert_eq!(index.conflicts(&staged, Some(&coll())), None);
    }

    #[test]
    fn test_semantic_matches_compare_values() {
        let index = ReferenceIndex::new();
        index
            .register(Registration {
                references: vec![(prop("A"), NodeId::numeric(2, 3))],
                semantics: vec![(NodeId::numeric(2, 3), Reference::global("urn:cd:temp"))],
                ..Default::default()
            })
            .unwrap();
        let matches = index.semantic_matches(&Reference::concept_description("urn:cd:temp"));
        assert_eq!(matches, vec![NodeId::numeric(2, 3)]);
        assert!(index
            .semantic_matches(&Reference::concept_description("urn:cd:other"))
            .is_empty());
    }

    #[test]
    fn test_qualifier_containers_follow_their_element() {
        let index = ReferenceIndex::new();
        index
            .register(Registration {
                references: vec![
                    (coll(), NodeId::numeric(2, 2)),
                    (prop("A"), NodeId::numeric(2, 3)),
                ],
                qualifiers: vec![(NodeId::numeric(2, 3), NodeId::numeric(2, 7))],
                ..Default::default()
            })
            .unwrap();
        assert_eq!(
            index.qualifier_container(&NodeId::numeric(2, 3)),
            Some(NodeId::numeric(2, 7))
        );
        assert_eq!(index.qualifier_container(&NodeId::numeric(2, 2)), None);

        index.remove(&coll());
        assert_eq!(index.qualifier_container(&NodeId::numeric(2, 3)), None);
    }
}
