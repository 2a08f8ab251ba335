//! Error types for the store module.

use consent_vault_core::PrincipalId;
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A stored value could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A second non-terminal consent for the same subject and policy.
    #[error("subject {subject} already has an open consent for policy {policy_id}")]
    Conflict { subject: PrincipalId, policy_id: i64 },

    /// A value that must not be stored, such as an owner literal in an
    /// attribute assignment.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// The backend is temporarily unable to serve the request.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
