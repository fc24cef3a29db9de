use thiserror::Error;

/// Errors raised while handling domain model data.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Value of kind {found} cannot be applied to a {expected}")]
    ValueMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ModelError>;
