//! Live mutation handler.
//!
//! Change events are applied strictly one at a time. Every structural
//! change stages its subtree off-graph first, hands it to the store in one
//! call, and only then touches the reference index.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use twinlink_core::{
    ChangeEvent, ChangePayload, ElementValue, ModelElement, Qualifier, Reference, SubmodelElement,
};
use twinlink_graph::{LinkKind, NodeId};

use crate::binding::{self, ValueBinding, ValueKind};
use crate::error::{Result, SyncError};
use crate::project::{
    self, link_kind, project_concept_description, project_qualifier, project_shell,
    project_submodel, Staged, QUALIFIER_CONTAINER,
};
use crate::SyncEngine;

impl SyncEngine {
    /// Apply one change event. Mutations never interleave.
    pub async fn apply(&self, event: ChangeEvent) -> Result<()> {
        let _guard = self.mutation.lock().await;
        tracing::debug!(
            event_id = %event.id.0,
            event_type = event.payload.kind(),
            reference = %event.payload.reference(),
            "Applying change event"
        );

        match event.payload {
            ChangePayload::ElementCreated { reference, value } => {
                self.on_create(&reference, value).await
            }
            ChangePayload::ElementUpdated { reference, value } => {
                self.on_update(&reference, value).await
            }
            ChangePayload::ElementDeleted { reference } => self.on_delete(&reference),
            ChangePayload::ValueChanged { reference, value } => {
                self.on_value_changed(&reference, value)
            }
        }
    }

    /// Consume events until the channel closes. Failures are logged and the
    /// loop moves on to the next event.
    pub async fn run(self, mut events: mpsc::Receiver<ChangeEvent>) {
        while let Some(event) = events.recv().await {
            let id = event.id.clone();
            let reference = event.reference().clone();
            let kind = event.payload.kind();
            if let Err(e) = self.apply(event).await {
                tracing::warn!(
                    event_id = %id.0,
                    event_type = kind,
                    reference = %reference,
                    error = %e,
                    "Change event dropped"
                );
            }
        }
        tracing::info!("Change event channel closed");
    }

    /// Spawn the mutation loop and return its sender.
    pub fn spawn_mutation_loop(&self) -> (mpsc::Sender<ChangeEvent>, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(self.config.event_buffer.max(1));
        let engine = self.clone();
        let handle = tokio::spawn(engine.run(rx));
        (tx, handle)
    }

    // ── Handlers ──────────────────────────────────────────────────

    async fn on_create(&self, reference: &Reference, value: Option<ModelElement>) -> Result<()> {
        let element = self.resolve_value(reference, value).await?;

        // Qualifiers attach to the element at `reference` itself.
        if let ModelElement::Qualifier(qualifier) = &element {
            return self.attach_qualifier(reference, qualifier);
        }
        if let Some(old) = self.index.get(reference) {
            tracing::info!(reference = %reference, "Element already projected, updating instead");
            return self.rebuild(reference, &old, &element);
        }

        let roots = self.ensure_roots()?;
        let ctx = self.ctx();
        let (parent, kind, staged) = match &element {
            ModelElement::Shell(shell) => (
                roots.environment,
                LinkKind::Component,
                project_shell(&ctx, shell)?,
            ),
            ModelElement::Submodel(submodel) => (
                roots.environment,
                LinkKind::Component,
                project_submodel(&ctx, submodel)?,
            ),
            ModelElement::ConceptDescription(concept) => (
                roots.dictionaries,
                LinkKind::Organizes,
                project_concept_description(&ctx, concept)?,
            ),
            ModelElement::SubmodelElement(e) => {
                let parent_ref = reference
                    .parent()
                    .ok_or_else(|| SyncError::NotFound(format!("parent of {reference}")))?;
                let container = self
                    .index
                    .container(&parent_ref)
                    .ok_or_else(|| SyncError::NotFound(parent_ref.to_string()))?;
                let submodel = reference.submodel_root();
                let staged = project::project_element(&ctx, e, reference, submodel.as_ref())?;
                (container.node, link_kind(container.ordered), staged)
            }
            ModelElement::Qualifier(qualifier) => {
                return self.attach_qualifier(reference, qualifier)
            }
        };

        let root = self.commit_attach(&parent, kind, staged)?;
        if matches!(element, ModelElement::ConceptDescription(_)) {
            self.link_concept(reference)?;
        }
        tracing::info!(reference = %reference, node = %root, "Element created");
        Ok(())
    }

    async fn on_update(&self, reference: &Reference, value: Option<ModelElement>) -> Result<()> {
        let old = self
            .index
            .get(reference)
            .ok_or_else(|| SyncError::NotFound(reference.to_string()))?;
        let element = self.resolve_value(reference, value).await?;
        self.rebuild(reference, &old, &element)
    }

    fn on_delete(&self, reference: &Reference) -> Result<()> {
        let Some(node) = self.index.get(reference) else {
            tracing::debug!(reference = %reference, "Delete of unprojected element ignored");
            return Ok(());
        };
        let removed = self.store.detach(&node)?;
        let entries = self.index.remove(reference);
        tracing::info!(
            reference = %reference,
            nodes = removed.len(),
            references = entries.len(),
            "Element deleted"
        );
        Ok(())
    }

    fn on_value_changed(&self, reference: &Reference, value: ElementValue) -> Result<()> {
        let bindings = self.index.bindings_for(reference);
        let (_, first) = bindings
            .first()
            .ok_or_else(|| SyncError::NotFound(reference.to_string()))?;

        let mut element = first.element.clone();
        element.apply_value(value)?;
        self.write_through(&bindings, &element)?;
        self.index.refresh_snapshot(reference, &element);
        tracing::debug!(reference = %reference, nodes = bindings.len(), "Value updated in place");
        Ok(())
    }

    // ── Helpers ───────────────────────────────────────────────────

    async fn resolve_value(
        &self,
        reference: &Reference,
        value: Option<ModelElement>,
    ) -> Result<ModelElement> {
        if let Some(value) = value {
            return Ok(value);
        }
        let source = self
            .source
            .as_ref()
            .ok_or_else(|| SyncError::ProviderMissing("model source".to_string()))?;
        source
            .get(reference)
            .await
            .ok_or_else(|| SyncError::NotFound(reference.to_string()))
    }

    /// Replace the subtree at `old` with a freshly projected `element`.
    fn rebuild(&self, reference: &Reference, old: &NodeId, element: &ModelElement) -> Result<()> {
        let ctx = self.ctx();
        let staged = match element {
            ModelElement::Shell(shell) => project_shell(&ctx, shell)?,
            ModelElement::Submodel(submodel) => project_submodel(&ctx, submodel)?,
            ModelElement::ConceptDescription(concept) => {
                project_concept_description(&ctx, concept)?
            }
            ModelElement::SubmodelElement(e) => {
                let submodel = reference.submodel_root();
                project::project_element(&ctx, e, reference, submodel.as_ref())?
            }
            ModelElement::Qualifier(_) => {
                return Err(SyncError::Validation(format!(
                    "qualifier at {reference} cannot replace an element"
                )))
            }
        };

        if let Some(conflict) = self
            .index
            .conflicts(&staged.registration.references, Some(reference))
        {
            return Err(SyncError::StructuralConflict(conflict.to_string()));
        }
        let removed = self.store.replace(old, staged.graph)?;
        self.index.remove(reference);
        self.index.register(staged.registration)?;

        if matches!(element, ModelElement::ConceptDescription(_)) {
            self.link_concept(reference)?;
        }
        tracing::info!(reference = %reference, removed = removed.len(), "Element replaced");
        Ok(())
    }

    /// Attach a staged subtree and register it.
    pub(crate) fn commit_attach(
        &self,
        parent: &NodeId,
        kind: LinkKind,
        staged: Staged,
    ) -> Result<NodeId> {
        if let Some(conflict) = self.index.conflicts(&staged.registration.references, None) {
            return Err(SyncError::StructuralConflict(conflict.to_string()));
        }
        let root = self.store.attach(parent, kind, staged.graph)?;
        self.index.register(staged.registration)?;
        Ok(root)
    }

    /// Add a qualifier to the element at `reference`. A qualifier of the
    /// same type is replaced, so replayed creates do not pile up. The
    /// qualifier container is created with the first qualifier.
    fn attach_qualifier(&self, reference: &Reference, qualifier: &Qualifier) -> Result<()> {
        let node = self
            .index
            .get(reference)
            .ok_or_else(|| SyncError::NotFound(reference.to_string()))?;
        let ctx = self.ctx();
        let staged = project_qualifier(&ctx, qualifier)?;

        let Some(folder) = self.index.qualifier_container(&node) else {
            let mut container = Staged::new(ctx.object(QUALIFIER_CONTAINER));
            let root = container.root();
            container.graft(&root, LinkKind::Component, staged)?;
            self.store.attach(&node, LinkKind::Component, container.graph)?;
            self.index.put_qualifier_container(node, root);
            tracing::info!(
                reference = %reference,
                qualifier = %qualifier.qualifier_type,
                "Qualifier added"
            );
            return Ok(());
        };

        match self.store.find_child(&folder, &qualifier.qualifier_type) {
            Some(existing) => {
                self.store.replace(&existing, staged.graph)?;
                tracing::info!(
                    reference = %reference,
                    qualifier = %qualifier.qualifier_type,
                    "Qualifier replaced"
                );
            }
            None => {
                self.store.attach(&folder, LinkKind::Component, staged.graph)?;
                tracing::info!(
                    reference = %reference,
                    qualifier = %qualifier.qualifier_type,
                    "Qualifier added"
                );
            }
        }
        Ok(())
    }

    /// Cross-link every element whose semantic id names the concept
    /// description at `reference`.
    pub(crate) fn link_concept(&self, reference: &Reference) -> Result<()> {
        let Some(concept) = self.index.get(reference) else {
            return Ok(());
        };
        for element in self.index.semantic_matches(reference) {
            self.store.add_link(&element, LinkKind::DictionaryEntry, &concept)?;
        }
        Ok(())
    }

    /// Push `element`'s current field values into its bound nodes.
    pub(crate) fn write_through(
        &self,
        bindings: &[(NodeId, ValueBinding)],
        element: &SubmodelElement,
    ) -> Result<()> {
        for (node, binding) in bindings {
            if binding.kind == ValueKind::Operation {
                continue;
            }
            if binding.kind.is_reference() {
                let value = binding::reference_field(binding.kind, element);
                project::rewrite_reference(self.store.as_ref(), &self.bridge, node, value)?;
            } else {
                let value = binding::read(&self.bridge, binding.kind, element)?;
                self.store.write(node, value)?;
            }
        }
        Ok(())
    }
}
