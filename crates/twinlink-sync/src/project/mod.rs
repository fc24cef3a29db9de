//! Type dispatcher and per-kind projectors.
//!
//! A projector turns one domain element into a [`Staged`] subtree: an
//! off-graph [`Subgraph`] plus the index [`Registration`] it will need once
//! attached. Nothing here touches the live graph except id allocation and
//! read-only lookups of existing concept description nodes.

mod container;
mod data;
mod entity;
mod identifiable;
mod operation;
mod relation;

use std::collections::HashSet;

use twinlink_core::{ElementBase, FailurePolicy, Key, Qualifier, Reference, SubmodelElement};
use twinlink_graph::{
    AccessLevel, DataType, GraphNode, GraphStore, LinkKind, NodeId, Subgraph, Variant,
};

use crate::binding::{self, ValueBinding, ValueKind};
use crate::error::{Result, SyncError};
use crate::index::{Container, ReferenceIndex, Registration};
use crate::value::ValueBridge;

pub(crate) use identifiable::{
    project_concept_description, project_qualifier, project_shell, project_submodel,
};
pub(crate) use operation::{input_variables, output_variables};

/// Browse name of the per-element qualifier container.
pub const QUALIFIER_CONTAINER: &str = "Qualifier";

/// Shared state for one projection run.
pub struct ProjectCtx<'a> {
    pub store: &'a dyn GraphStore,
    pub index: &'a ReferenceIndex,
    pub bridge: &'a ValueBridge,
    pub policy: FailurePolicy,
    pub read_only_without_submodel: bool,
}

impl ProjectCtx<'_> {
    pub fn object(&self, name: &str) -> GraphNode {
        GraphNode::object(self.store.allocate_id(), name)
    }

    pub fn variable(&self, name: &str, value: Variant, data_type: DataType) -> GraphNode {
        GraphNode::variable(self.store.allocate_id(), name, value, data_type)
    }
}

// ── Staging ───────────────────────────────────────────────────────

/// A subtree under construction together with its index entries.
#[derive(Debug)]
pub struct Staged {
    pub graph: Subgraph,
    pub registration: Registration,
}

impl Staged {
    pub fn new(root: GraphNode) -> Self {
        Self {
            graph: Subgraph::new(root),
            registration: Registration::default(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.graph.root().clone()
    }

    pub fn property(&mut self, parent: &NodeId, node: GraphNode) -> Result<NodeId> {
        Ok(self.graph.add_child(parent, LinkKind::HasProperty, node)?)
    }

    pub fn component(&mut self, parent: &NodeId, node: GraphNode) -> Result<NodeId> {
        Ok(self.graph.add_child(parent, LinkKind::Component, node)?)
    }

    /// Merge a child subtree, including its registration.
    pub fn graft(&mut self, parent: &NodeId, kind: LinkKind, child: Staged) -> Result<()> {
        self.graph.graft(parent, kind, child.graph)?;
        self.registration.extend(child.registration);
        Ok(())
    }

    pub fn bind(&mut self, node: NodeId, binding: ValueBinding) {
        self.registration.bindings.push((node, binding));
    }
}

pub fn link_kind(ordered: bool) -> LinkKind {
    if ordered {
        LinkKind::OrderedComponent
    } else {
        LinkKind::Component
    }
}

// ── Dispatcher ────────────────────────────────────────────────────

/// Project one submodel element (and everything beneath it).
pub fn project_element(
    ctx: &ProjectCtx<'_>,
    element: &SubmodelElement,
    reference: &Reference,
    submodel: Option<&Reference>,
) -> Result<Staged> {
    // List items have no idShort and are named by their index key.
    let name = match element.id_short() {
        "" => reference.last().map(|k| k.value.as_str()).unwrap_or_default(),
        id_short => id_short,
    };
    if name.is_empty() {
        return Err(SyncError::Validation(format!(
            "{} at {reference} has no idShort",
            element.key_type()
        )));
    }

    let mut staged = Staged::new(ctx.object(name));
    let root = staged.root();
    add_base_data(ctx, &mut staged, &root, element.base())?;

    let target = Target {
        element,
        reference,
        submodel,
    };
    match element {
        SubmodelElement::Property(p) => data::property(ctx, &mut staged, &target, p)?,
        SubmodelElement::Range(r) => data::range(ctx, &mut staged, &target, r)?,
        SubmodelElement::MultiLanguageProperty(m) => {
            data::multi_language(ctx, &mut staged, &target, m)?
        }
        SubmodelElement::Blob(_) => data::blob(ctx, &mut staged, &target)?,
        SubmodelElement::File(_) => data::file(ctx, &mut staged, &target)?,
        SubmodelElement::ReferenceElement(r) => {
            relation::reference_element(ctx, &mut staged, &target, r)?
        }
        SubmodelElement::RelationshipElement(_) => {
            relation::relationship(ctx, &mut staged, &target)?
        }
        SubmodelElement::AnnotatedRelationshipElement(a) => {
            relation::relationship(ctx, &mut staged, &target)?;
            relation::annotations(ctx, &mut staged, &target, a)?
        }
        SubmodelElement::Entity(e) => entity::entity(ctx, &mut staged, &target, e)?,
        SubmodelElement::BasicEvent(e) => {
            if let Some(observed) = &e.observed {
                tracing::warn!(
                    reference = %reference,
                    observed = %observed,
                    "Event observed relation is not projected"
                );
            }
        }
        SubmodelElement::Operation(op) => operation::operation(ctx, &mut staged, &target, op)?,
        SubmodelElement::Capability(_) => {}
        SubmodelElement::SubmodelElementCollection(c) => {
            container::collection(ctx, &mut staged, &target, c)?
        }
        SubmodelElement::SubmodelElementList(l) => container::list(ctx, &mut staged, &target, l)?,
    }

    staged
        .registration
        .references
        .push((reference.clone(), root));
    Ok(staged)
}

/// Project `children` under `container`, honouring the failure policy per
/// child. List items are addressed by position, everything else by idShort.
pub(crate) fn project_children(
    ctx: &ProjectCtx<'_>,
    staged: &mut Staged,
    container: &NodeId,
    children: &[SubmodelElement],
    parent: &Reference,
    submodel: Option<&Reference>,
    ordered: bool,
    by_index: bool,
) -> Result<()> {
    let kind = link_kind(ordered);
    let mut seen = HashSet::new();

    for (i, child) in children.iter().enumerate() {
        let child_ref = if by_index {
            parent.child(Key::id_short(child.key_type(), i.to_string()))
        } else {
            parent.child(child.key())
        };

        let projected = if seen.insert(child_ref.clone()) {
            project_element(ctx, child, &child_ref, submodel)
        } else {
            Err(SyncError::StructuralConflict(child_ref.to_string()))
        };

        match projected {
            Ok(child_staged) => staged.graft(container, kind, child_staged)?,
            Err(e) if ctx.policy == FailurePolicy::BestEffort => {
                tracing::warn!(
                    reference = %child_ref,
                    error = %e,
                    "Skipping element that failed to project"
                );
            }
            Err(e) => return Err(e),
        }
    }

    staged.registration.containers.push((
        parent.clone(),
        Container {
            node: container.clone(),
            ordered,
        },
    ));
    Ok(())
}

/// The element a per-kind projector works on.
pub(crate) struct Target<'a> {
    pub element: &'a SubmodelElement,
    pub reference: &'a Reference,
    pub submodel: Option<&'a Reference>,
}

impl Target<'_> {
    fn binding(&self, kind: ValueKind) -> ValueBinding {
        ValueBinding::new(
            kind,
            self.reference.clone(),
            self.submodel.cloned(),
            self.element.clone(),
        )
    }
}

// ── Shared builders ───────────────────────────────────────────────

/// Read-only string property.
pub(crate) fn add_text(
    ctx: &ProjectCtx<'_>,
    staged: &mut Staged,
    parent: &NodeId,
    name: &str,
    text: &str,
) -> Result<NodeId> {
    staged.property(parent, ctx.variable(name, Variant::from(text), DataType::String))
}

/// Variable exposing one bound field of the target element.
pub(crate) fn add_bound_value(
    ctx: &ProjectCtx<'_>,
    staged: &mut Staged,
    parent: &NodeId,
    name: &str,
    kind: ValueKind,
    target: &Target<'_>,
    access: AccessLevel,
) -> Result<NodeId> {
    let value = binding::read(ctx.bridge, kind, target.element)?;
    let data_type = binding::data_type(ctx.bridge, kind, target.element);
    let node = staged.property(
        parent,
        ctx.variable(name, value, data_type).with_access(access),
    )?;
    staged.bind(node.clone(), target.binding(kind));
    Ok(node)
}

/// Reference subtree bound to a field of the target element.
pub(crate) fn add_bound_reference(
    ctx: &ProjectCtx<'_>,
    staged: &mut Staged,
    parent: &NodeId,
    name: &str,
    kind: ValueKind,
    target: &Target<'_>,
    value: Option<&Reference>,
) -> Result<NodeId> {
    let node = add_reference(ctx, staged, parent, name, value, AccessLevel::ReadWrite)?;
    staged.bind(node.clone(), target.binding(kind));
    Ok(node)
}

/// Reference subtree: a variable holding the key texts, with one child
/// object per key carrying `Type`, `Value` and `IdType`.
pub(crate) fn add_reference(
    ctx: &ProjectCtx<'_>,
    staged: &mut Staged,
    parent: &NodeId,
    name: &str,
    reference: Option<&Reference>,
    access: AccessLevel,
) -> Result<NodeId> {
    let variable = ctx
        .variable(name, ctx.bridge.reference_variant(reference), DataType::String)
        .with_access(access);
    let node = staged.component(parent, variable)?;
    let keys = reference.map(Reference::keys).unwrap_or_default();
    for (i, key) in keys.iter().enumerate() {
        let key_graph = key_object(ctx.store, i, key)?;
        staged.graph.graft(&node, LinkKind::Component, key_graph)?;
    }
    Ok(node)
}

fn key_object(store: &dyn GraphStore, position: usize, key: &Key) -> Result<Subgraph> {
    let name = format!("Key{position}");
    let mut graph = Subgraph::new(GraphNode::object(store.allocate_id(), &name));
    let root = graph.root().clone();
    for (name, text) in [
        ("Type", key.key_type.as_str()),
        ("Value", key.value.as_str()),
        ("IdType", key.id_type.as_str()),
    ] {
        let node = GraphNode::variable(
            store.allocate_id(),
            name,
            Variant::from(text),
            DataType::String,
        );
        graph.add_child(&root, LinkKind::HasProperty, node)?;
    }
    Ok(graph)
}

/// Rewrite a live reference subtree in place: new key texts on the
/// variable and freshly built key objects beneath it, swapped in one store
/// call.
pub(crate) fn rewrite_reference(
    store: &dyn GraphStore,
    bridge: &ValueBridge,
    node: &NodeId,
    reference: Option<&Reference>,
) -> Result<()> {
    let keys = reference
        .map(Reference::keys)
        .unwrap_or_default()
        .iter()
        .enumerate()
        .map(|(i, key)| Ok((LinkKind::Component, key_object(store, i, key)?)))
        .collect::<Result<Vec<_>>>()?;
    store.replace_children(node, bridge.reference_variant(reference), keys)?;
    Ok(())
}

/// The concept description a semantic id names, when it is a single key.
pub(crate) fn concept_for(semantic_id: &Reference) -> Option<Reference> {
    match semantic_id.keys() {
        [key] => Some(Reference::concept_description(key.value.clone())),
        _ => None,
    }
}

/// `Category`, `ModelingKind`, `Description`, `SemanticId`,
/// `DataSpecification` and qualifiers.
pub(crate) fn add_base_data(
    ctx: &ProjectCtx<'_>,
    staged: &mut Staged,
    node: &NodeId,
    base: &ElementBase,
) -> Result<()> {
    if let Some(category) = &base.category {
        add_text(ctx, staged, node, "Category", category)?;
    }
    add_text(ctx, staged, node, "ModelingKind", base.kind.as_str())?;

    if !base.descriptions.is_empty() {
        let description = ctx
            .variable(
                "Description",
                ctx.bridge.lang_strings(&base.descriptions),
                DataType::LocalizedText,
            )
            .with_array_len(base.descriptions.len());
        staged.property(node, description)?;
    }

    if let Some(semantic_id) = &base.semantic_id {
        add_reference(
            ctx,
            staged,
            node,
            "SemanticId",
            Some(semantic_id),
            AccessLevel::ReadOnly,
        )?;
        staged
            .registration
            .semantics
            .push((node.clone(), semantic_id.clone()));
        if let Some(concept) = concept_for(semantic_id).and_then(|c| ctx.index.get(&c)) {
            staged.graph.add_link(node, LinkKind::DictionaryEntry, concept)?;
        }
    }

    if !base.embedded_data_specifications.is_empty() {
        let folder = staged.component(node, ctx.object("DataSpecification"))?;
        for (i, spec) in base.embedded_data_specifications.iter().enumerate() {
            let name = format!("DataSpecification{i}");
            add_reference(ctx, staged, &folder, &name, Some(spec), AccessLevel::ReadOnly)?;
        }
    }

    if !base.qualifiers.is_empty() {
        let folder = staged.component(node, ctx.object(QUALIFIER_CONTAINER))?;
        staged
            .registration
            .qualifiers
            .push((node.clone(), folder.clone()));
        for qualifier in &base.qualifiers {
            add_qualifier(ctx, staged, &folder, qualifier)?;
        }
    }
    Ok(())
}

fn add_qualifier(
    ctx: &ProjectCtx<'_>,
    staged: &mut Staged,
    folder: &NodeId,
    qualifier: &Qualifier,
) -> Result<()> {
    let projected = project_qualifier(ctx, qualifier)?;
    staged.graft(folder, LinkKind::Component, projected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use twinlink_core::{
        DataTypeDef, KeyType, Property, SubmodelElementCollection, SubmodelElementList,
    };
    use twinlink_graph::MemoryGraph;

    struct Fixture {
        store: MemoryGraph,
        index: ReferenceIndex,
        bridge: ValueBridge,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                store: MemoryGraph::default(),
                index: ReferenceIndex::new(),
                bridge: ValueBridge::default(),
            }
        }

        fn ctx(&self, policy: FailurePolicy, read_only: bool) -> ProjectCtx<'_> {
            ProjectCtx {
                store: &self.store,
                index: &self.index,
                bridge: &self.bridge,
                policy,
                read_only_without_submodel: read_only,
            }
        }
    }

    fn prop(name: &str) -> SubmodelElement {
        SubmodelElement::Property(Property::new(name, DataTypeDef::Int, "1"))
    }

    fn value_access(staged: &Staged) -> AccessLevel {
        let value = staged
            .graph
            .find_child(staged.graph.root(), "Value")
            .unwrap();
        staged.graph.node(&value).unwrap().access
    }

    #[test]
    fn test_property_without_submodel_is_read_only() {
        let fx = Fixture::new();
        let reference =
            Reference::global("urn:standalone").child(Key::id_short(KeyType::Property, "P"));
        let read_only = fx.ctx(FailurePolicy::BestEffort, true);
        let writable = fx.ctx(FailurePolicy::BestEffort, false);

        let staged = project_element(&read_only, &prop("P"), &reference, None).unwrap();
        assert_eq!(value_access(&staged), AccessLevel::ReadOnly);

        let staged = project_element(&writable, &prop("P"), &reference, None).unwrap();
        assert_eq!(value_access(&staged), AccessLevel::ReadWrite);

        let sm = Reference::submodel("urn:sm:1");
        let staged = project_element(&read_only, &prop("P"), &reference, Some(&sm)).unwrap();
        assert_eq!(value_access(&staged), AccessLevel::ReadWrite);
        assert_eq!(staged.registration.bindings.len(), 1);
    }

    #[test]
    fn test_list_items_are_addressed_by_index() {
        let fx = Fixture::new();
        let sm = Reference::submodel("urn:sm:1");
        let list_ref = sm.child(Key::id_short(KeyType::SubmodelElementList, "L"));
        let list = SubmodelElement::SubmodelElementList(SubmodelElementList {
            base: ElementBase::new("L"),
            value: vec![prop(""), prop("")],
            ..Default::default()
        });

        let ctx = fx.ctx(FailurePolicy::BestEffort, true);
        let staged = project_element(&ctx, &list, &list_ref, Some(&sm)).unwrap();
        let refs: Vec<String> = staged
            .registration
            .references
            .iter()
            .map(|(r, _)| r.last().map(|k| k.value.clone()).unwrap_or_default())
            .collect();
        assert_eq!(refs, vec!["0", "1", "L"]);

        let root = staged.root();
        assert!(staged.graph.find_child(&root, "0").is_some());
        let first = staged.graph.find_child(&root, "0").unwrap();
        let link = staged.graph.node(&root).unwrap().link_to(&first).unwrap().kind;
        assert_eq!(link, LinkKind::OrderedComponent);
    }

    #[test]
    fn test_duplicate_children_follow_failure_policy() {
        let fx = Fixture::new();
        let sm = Reference::submodel("urn:sm:1");
        let coll_ref = sm.child(Key::id_short(KeyType::SubmodelElementCollection, "C"));
        let coll = SubmodelElement::SubmodelElementCollection(SubmodelElementCollection {
            base: ElementBase::new("C"),
            value: vec![prop("Dup"), prop("Dup")],
            ..Default::default()
        });

        let best_effort = fx.ctx(FailurePolicy::BestEffort, true);
        let staged = project_element(&best_effort, &coll, &coll_ref, Some(&sm)).unwrap();
        // The collection itself plus one child.
        assert_eq!(staged.registration.references.len(), 2);

        let fail_fast = fx.ctx(FailurePolicy::FailFast, true);
        let err = project_element(&fail_fast, &coll, &coll_ref, Some(&sm)).unwrap_err();
        assert!(matches!(err, SyncError::StructuralConflict(_)));
    }

    #[test]
    fn test_missing_id_short_is_a_validation_error() {
        let fx = Fixture::new();
        let ctx = fx.ctx(FailurePolicy::BestEffort, true);
        let err = project_element(&ctx, &prop(""), &Reference::default(), None).unwrap_err();
        assert!(matches!(err, SyncError::Validation(_)));
    }

    #[test]
    fn test_concept_for_single_key_only() {
        assert_eq!(
            concept_for(&Reference::global("urn:cd:1")),
            Some(Reference::concept_description("urn:cd:1"))
        );
        let two = Reference::global("urn:cd:1").child(Key::id_short(KeyType::Property, "x"));
        assert_eq!(concept_for(&two), None);
    }
}
