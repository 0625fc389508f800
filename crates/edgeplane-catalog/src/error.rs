//! Error types for the catalog store.

use thiserror::Error;

/// Result type alias for catalog store operations.
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Errors that can occur during catalog store operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to open database: {0}")]
    Open(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),

    #[error("{kind} not found: {key}")]
    NotFound { kind: &'static str, key: String },

    #[error("{kind} already exists: {key}")]
    AlreadyExists { kind: &'static str, key: String },
}
