//! twinlink-core: Shared domain model, events, configuration, and error handling.
//!
//! This crate provides the foundational types used across all twinlink components:
//! - References and keys identifying model elements
//! - The shell / submodel / submodel element model
//! - Change events consumed by the sync engine
//! - Configuration management
//! - Common error types

pub mod config;
pub mod error;
pub mod events;
pub mod model;
pub mod types;

pub use config::{FailurePolicy, SyncConfig};
pub use error::ModelError;
pub use events::{ChangeEvent, ChangePayload, EventId};
pub use model::*;
pub use types::{
    AssetKind, DataTypeDef, EntityType, IdKind, Key, KeyType, LangString, ModelingKind, Reference,
};
