//! Error types for the twinlink-sync crate.

use thiserror::Error;
use twinlink_core::ModelError;
use twinlink_graph::GraphError;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid {value_type} value: {message}")]
    ValueFormat { value_type: String, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Wrong number of arguments: expected {expected}, got {got}")]
    Arity { expected: usize, got: usize },

    #[error("No provider registered for {0}")]
    ProviderMissing(String),

    #[error("Structural conflict: {0} is already projected")]
    StructuralConflict(String),

    #[error("Operation {operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    #[error("Node {0} is not writable")]
    NotWritable(String),

    #[error("Executor error for {operation}: {source}")]
    Executor {
        operation: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SyncError {
    pub(crate) fn value_format(value_type: impl ToString, message: impl Into<String>) -> Self {
        SyncError::ValueFormat {
            value_type: value_type.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
