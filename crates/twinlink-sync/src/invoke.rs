//! Operation invocation bridge.
//!
//! A method node bound to an Operation forwards calls to the executor
//! registered for the operation's reference. Arguments are bridged into
//! copies of the declared input variables; results are matched back to the
//! declared outputs by idShort.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use twinlink_core::{OperationVariable, Reference, SubmodelElement};
use twinlink_graph::{NodeId, Variant};

use crate::binding::ValueKind;
use crate::error::{Result, SyncError};
use crate::project::{input_variables, output_variables};
use crate::SyncEngine;

/// Runs an Operation on behalf of a graph client.
#[async_trait]
pub trait OperationExecutor: Send + Sync {
    /// Execute `operation` with the bridged input variables and return the
    /// output variables it produced.
    async fn invoke(
        &self,
        operation: &Reference,
        inputs: Vec<SubmodelElement>,
    ) -> anyhow::Result<Vec<SubmodelElement>>;
}

/// Executors keyed by operation reference. Clone is cheap (inner Arc).
#[derive(Default, Clone)]
pub struct ExecutorRegistry {
    executors: Arc<RwLock<HashMap<Reference, Arc<dyn OperationExecutor>>>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `executor` for `operation`, replacing any previous one.
    pub fn register(&self, operation: Reference, executor: Arc<dyn OperationExecutor>) {
        self.executors.write().insert(operation, executor);
    }

    pub fn unregister(&self, operation: &Reference) -> bool {
        self.executors.write().remove(operation).is_some()
    }

    pub fn get(&self, operation: &Reference) -> Option<Arc<dyn OperationExecutor>> {
        self.executors.read().get(operation).cloned()
    }

    pub fn len(&self) -> usize {
        self.executors.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SyncEngine {
    /// Call the operation behind method node `node`.
    ///
    /// Fails with `Arity` before anything runs when the argument count does
    /// not match the declared inputs. The executor runs on its own task; on
    /// timeout the caller gets `Timeout` and the task is left to finish.
    pub async fn invoke(&self, node: &NodeId, args: Vec<Variant>) -> Result<Vec<Variant>> {
        let binding = self
            .index
            .get_value_map(node)
            .filter(|b| b.kind == ValueKind::Operation)
            .ok_or_else(|| SyncError::NotFound(node.to_string()))?;
        let SubmodelElement::Operation(operation) = &binding.element else {
            return Err(SyncError::NotFound(node.to_string()));
        };

        let declared: Vec<&OperationVariable> = input_variables(operation).collect();
        if args.len() != declared.len() {
            return Err(SyncError::Arity {
                expected: declared.len(),
                got: args.len(),
            });
        }

        let inputs = declared
            .iter()
            .zip(&args)
            .map(|(variable, arg)| self.bridge_argument(variable, arg))
            .collect::<Result<Vec<_>>>()?;

        let reference = binding.reference.clone();
        let executor = self
            .executors
            .get(&reference)
            .ok_or_else(|| SyncError::ProviderMissing(reference.to_string()))?;

        let timeout = self.config.invocation_timeout();
        tracing::info!(
            operation = %reference,
            arguments = inputs.len(),
            "Invoking operation"
        );

        let task_ref = reference.clone();
        let task = tokio::spawn(async move { executor.invoke(&task_ref, inputs).await });
        let produced = match tokio::time::timeout(timeout, task).await {
            Err(_) => {
                tracing::warn!(
                    operation = %reference,
                    timeout_ms = self.config.invocation_timeout_ms,
                    "Operation timed out"
                );
                return Err(SyncError::Timeout {
                    operation: reference.to_string(),
                    timeout_ms: self.config.invocation_timeout_ms,
                });
            }
            Ok(Err(join)) => {
                return Err(SyncError::Executor {
                    operation: reference.to_string(),
                    source: anyhow::Error::new(join),
                })
            }
            Ok(Ok(Err(source))) => {
                return Err(SyncError::Executor {
                    operation: reference.to_string(),
                    source,
                })
            }
            Ok(Ok(Ok(produced))) => produced,
        };

        output_variables(operation)
            .map(|declared| self.bridge_output(declared, &produced))
            .collect()
    }

    /// Non-Property variables are advertised as String arguments. A String
    /// or Null argument sends the declared variable through as is.
    fn bridge_argument(
        &self,
        variable: &OperationVariable,
        arg: &Variant,
    ) -> Result<SubmodelElement> {
        match &variable.value {
            SubmodelElement::Property(p) => {
                let mut p = p.clone();
                p.value = self.bridge.from_variant(p.value_type, arg)?;
                Ok(SubmodelElement::Property(p))
            }
            other if arg.is_null() || matches!(arg, Variant::String(_)) => {
                tracing::debug!(
                    variable = %other.id_short(),
                    kind = %other.key_type(),
                    "Argument passed through unchanged"
                );
                Ok(other.clone())
            }
            other => Err(SyncError::value_format(
                other.key_type(),
                format!("argument {} expects a String", other.id_short()),
            )),
        }
    }

    /// The produced value for a declared output, or Null if the executor
    /// did not return it.
    fn bridge_output(
        &self,
        declared: &OperationVariable,
        produced: &[SubmodelElement],
    ) -> Result<Variant> {
        let SubmodelElement::Property(declared) = &declared.value else {
            return Ok(Variant::Null);
        };
        let found = produced
            .iter()
            .find(|e| e.id_short() == declared.base.id_short);
        match found {
            Some(SubmodelElement::Property(p)) => {
                self.bridge.to_variant(declared.value_type, p.value.as_deref())
            }
            _ => Ok(Variant::Null),
        }
    }
}
