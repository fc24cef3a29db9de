//! twinlink-sync: projects shell models into a typed node graph and keeps
//! the two in step.
//!
//! [`SyncEngine::compile`] builds the graph from a full [`Environment`].
//! Afterwards change events flow through [`SyncEngine::apply`] (or the
//! mutation loop from [`SyncEngine::spawn_mutation_loop`]), client writes
//! through [`SyncEngine::write`] and operation calls through
//! [`SyncEngine::invoke`].

pub mod binding;
pub mod error;
pub mod index;
pub mod invoke;
pub mod mutation;
mod project;
pub mod source;
pub mod value;

pub use binding::{ValueBinding, ValueKind};
pub use error::SyncError;
pub use index::ReferenceIndex;
pub use invoke::{ExecutorRegistry, OperationExecutor};
pub use source::{ModelSource, ModelWriter, StaticModel};
pub use value::ValueBridge;

use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;

use twinlink_core::{Environment, FailurePolicy, Reference, SyncConfig};
use twinlink_graph::store::check_value;
use twinlink_graph::{
    BrowseEntry, GraphNode, GraphQueries, GraphStore, LinkKind, NodeId, Subgraph, TreeNode, Variant,
};

use crate::error::Result;
use crate::project::{
    project_concept_description, project_shell, project_submodel, ProjectCtx, Staged,
};

/// Browse name of the node holding shells and submodels.
pub const ENVIRONMENT_NODE: &str = "AASEnvironment";
/// Browse name of the folder holding concept descriptions.
pub const DICTIONARY_NODE: &str = "Dictionaries";

/// Fixed top-level nodes, created once per engine.
#[derive(Debug, Clone)]
pub(crate) struct Roots {
    pub environment: NodeId,
    pub dictionaries: NodeId,
}

/// Outcome of a full-tree compile.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CompileReport {
    pub shells: usize,
    pub submodels: usize,
    pub concept_descriptions: usize,
    /// Identifiables that failed to project and were skipped.
    pub skipped: Vec<String>,
    /// Indexed references after the compile.
    pub indexed: usize,
    pub bindings: usize,
}

/// The projection and live-sync engine. Clone is cheap (inner Arc).
#[derive(Clone)]
pub struct SyncEngine {
    store: Arc<dyn GraphStore>,
    index: Arc<ReferenceIndex>,
    bridge: ValueBridge,
    config: Arc<SyncConfig>,
    source: Option<Arc<dyn ModelSource>>,
    writer: Option<Arc<dyn ModelWriter>>,
    executors: ExecutorRegistry,
    mutation: Arc<tokio::sync::Mutex<()>>,
    roots: Arc<RwLock<Option<Roots>>>,
}

impl SyncEngine {
    pub fn new(store: Arc<dyn GraphStore>, config: SyncConfig) -> Self {
        Self {
            store,
            index: Arc::new(ReferenceIndex::new()),
            bridge: ValueBridge::new(config.default_utc_offset_minutes),
            config: Arc::new(config),
            source: None,
            writer: None,
            executors: ExecutorRegistry::new(),
            mutation: Arc::new(tokio::sync::Mutex::new(())),
            roots: Arc::new(RwLock::new(None)),
        }
    }

    /// Resolve value-less change events against `source`.
    pub fn with_source(mut self, source: Arc<dyn ModelSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Forward client writes to `writer`.
    pub fn with_writer(mut self, writer: Arc<dyn ModelWriter>) -> Self {
        self.writer = Some(writer);
        self
    }

    pub fn register_executor(&self, operation: Reference, executor: Arc<dyn OperationExecutor>) {
        tracing::debug!(operation = %operation, "Executor registered");
        self.executors.register(operation, executor);
    }

    pub fn store(&self) -> &Arc<dyn GraphStore> {
        &self.store
    }

    pub fn index(&self) -> &ReferenceIndex {
        &self.index
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub(crate) fn ctx(&self) -> ProjectCtx<'_> {
        ProjectCtx {
            store: self.store.as_ref(),
            index: &self.index,
            bridge: &self.bridge,
            policy: self.config.failure_policy,
            read_only_without_submodel: self.config.read_only_without_submodel,
        }
    }

    /// The environment and dictionary nodes, created on first use.
    pub(crate) fn ensure_roots(&self) -> Result<Roots> {
        let mut roots = self.roots.write();
        if let Some(existing) = roots.as_ref() {
            return Ok(existing.clone());
        }

        let objects = self.store.root();
        let environment = self.store.attach(
            &objects,
            LinkKind::Organizes,
            Subgraph::new(GraphNode::object(self.store.allocate_id(), ENVIRONMENT_NODE)),
        )?;
        let dictionaries = self.store.attach(
            &objects,
            LinkKind::Organizes,
            Subgraph::new(GraphNode::object(self.store.allocate_id(), DICTIONARY_NODE)),
        )?;

        let created = Roots {
            environment,
            dictionaries,
        };
        *roots = Some(created.clone());
        Ok(created)
    }

    // ── Compile ───────────────────────────────────────────────────

    /// Project a whole environment: concept descriptions first so element
    /// semantic ids can link to them, then shells, then submodels.
    pub async fn compile(&self, env: &Environment) -> Result<CompileReport> {
        let _guard = self.mutation.lock().await;
        let start = std::time::Instant::now();
        let roots = self.ensure_roots()?;
        let ctx = self.ctx();
        let mut report = CompileReport::default();

        for concept in &env.concept_descriptions {
            let reference = concept.reference();
            let staged = project_concept_description(&ctx, concept);
            let parent = &roots.dictionaries;
            if self.compile_one(parent, LinkKind::Organizes, &reference, staged, &mut report)? {
                report.concept_descriptions += 1;
            }
        }
        for shell in &env.asset_administration_shells {
            let reference = shell.reference();
            let staged = project_shell(&ctx, shell);
            let parent = &roots.environment;
            if self.compile_one(parent, LinkKind::Component, &reference, staged, &mut report)? {
                report.shells += 1;
            }
        }
        for submodel in &env.submodels {
            let reference = submodel.reference();
            let staged = project_submodel(&ctx, submodel);
            let parent = &roots.environment;
            if self.compile_one(parent, LinkKind::Component, &reference, staged, &mut report)? {
                report.submodels += 1;
            }
        }

        report.indexed = self.index.len();
        report.bindings = self.index.binding_count();
        tracing::info!(
            shells = report.shells,
            submodels = report.submodels,
            concept_descriptions = report.concept_descriptions,
            skipped = report.skipped.len(),
            indexed = report.indexed,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Environment compiled"
        );
        Ok(report)
    }

    /// Attach one projected identifiable. Returns whether it was attached;
    /// failures are skipped or propagated per the failure policy.
    fn compile_one(
        &self,
        parent: &NodeId,
        kind: LinkKind,
        reference: &Reference,
        staged: Result<Staged>,
        report: &mut CompileReport,
    ) -> Result<bool> {
        match staged.and_then(|s| self.commit_attach(parent, kind, s)) {
            Ok(_) => Ok(true),
            Err(e) if self.config.failure_policy == FailurePolicy::BestEffort => {
                tracing::warn!(
                    reference = %reference,
                    error = %e,
                    "Skipping identifiable that failed to project"
                );
                report.skipped.push(reference.to_string());
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    // ── Client bridge ─────────────────────────────────────────────

    pub fn browse(&self, node: &NodeId) -> Result<Vec<BrowseEntry>> {
        Ok(self.store.browse(node)?)
    }

    pub fn read(&self, node: &NodeId) -> Result<Variant> {
        Ok(self.store.read(node)?)
    }

    pub fn node(&self, node: &NodeId) -> Option<GraphNode> {
        self.store.node(node)
    }

    /// The node an element's subtree is rooted at.
    pub fn resolve(&self, reference: &Reference) -> Option<NodeId> {
        self.index.get(reference)
    }

    /// Follow browse names down from the `Objects` folder.
    pub fn browse_path(&self, path: &[&str]) -> Option<NodeId> {
        self.store.browse_path(&self.store.root(), path)
    }

    /// Nested view of the graph below `node`.
    pub fn tree(&self, node: &NodeId) -> Option<TreeNode> {
        self.store.tree(node)
    }

    /// Write `value` into bound node `node` on behalf of a client.
    ///
    /// The new element value goes to the model writer first; the graph is
    /// only updated once the writer accepted it.
    pub async fn write(&self, node: &NodeId, value: Variant) -> Result<()> {
        let binding = self
            .index
            .get_value_map(node)
            .ok_or_else(|| SyncError::NotFound(node.to_string()))?;
        let graph_node = self
            .store
            .node(node)
            .ok_or_else(|| SyncError::NotFound(node.to_string()))?;
        if binding.kind == ValueKind::Operation || !graph_node.access.is_writable() {
            return Err(SyncError::NotWritable(node.to_string()));
        }
        check_value(&graph_node, &value)?;

        let new_value = binding::write(&self.bridge, binding.kind, &binding.element, &value)?;
        let writer = self
            .writer
            .as_ref()
            .ok_or_else(|| SyncError::ProviderMissing("model writer".to_string()))?;
        writer.write_value(&binding.reference, new_value.clone()).await?;

        let _guard = self.mutation.lock().await;
        let bindings = self.index.bindings_for(&binding.reference);
        let Some((_, current)) = bindings.first() else {
            // Removed while the writer ran.
            return Ok(());
        };
        let mut element = current.element.clone();
        element.apply_value(new_value)?;
        self.write_through(&bindings, &element)?;
        self.index.refresh_snapshot(&binding.reference, &element);
        tracing::info!(node = %node, reference = %binding.reference, "Client write applied");
        Ok(())
    }
}
