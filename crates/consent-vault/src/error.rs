//! Error types for the vault.

use consent_vault_core::{CoreError, PrincipalId};
use consent_vault_crypto::{EncryptionError, KeyLoadError};
use consent_vault_store::StoreError;
use thiserror::Error;

/// The current policy of a subject could not be computed.
///
/// Never answered with a partial policy.
#[derive(Debug, Error)]
pub enum PolicyConstructionError {
    /// The consent collaborator failed.
    #[error("consent lookup for subject {subject} failed: {source}")]
    ConsentLookup {
        subject: PrincipalId,
        #[source]
        source: StoreError,
    },

    /// A catalog title is not a valid attribute literal.
    #[error("invalid policy title for subject {subject}: {source}")]
    InvalidTitle {
        subject: PrincipalId,
        #[source]
        source: CoreError,
    },
}

/// A decrypt request failed for a reason unrelated to authorization.
///
/// Both variants are retryable service errors. An unauthorized requester is
/// an [`AccessOutcome`](crate::AccessOutcome), not an error.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    PolicyConstruction(#[from] PolicyConstructionError),

    #[error("attribute store unavailable: {0}")]
    AttributeStore(#[from] StoreError),
}

/// Errors that can occur during vault operations.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Key material could not be loaded. Fatal at startup.
    #[error("key load error: {0}")]
    KeyLoad(#[from] KeyLoadError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("encryption error: {0}")]
    Encryption(#[from] EncryptionError),

    #[error(transparent)]
    PolicyConstruction(#[from] PolicyConstructionError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// Invalid attribute name.
    #[error("invalid attribute: {0}")]
    InvalidAttribute(#[from] CoreError),

    /// No stored value for this (subject, field).
    #[error("field {field:?} not found for subject {subject}")]
    FieldNotFound { subject: PrincipalId, field: String },
}

/// Result type for vault operations.
pub type Result<T> = std::result::Result<T, VaultError>;
