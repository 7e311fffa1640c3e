//! Error types for sift-core

use thiserror::Error;

/// Result type alias using sift-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in sift-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid input from the caller
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Item not found in the local store
    #[error("Item not found: {0}")]
    NotFound(String),

    /// Local storage failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Remote gateway failure surfaced by an explicit full sync
    #[error("Remote error: {0}")]
    Remote(#[from] crate::gateway::GatewayError),
}
