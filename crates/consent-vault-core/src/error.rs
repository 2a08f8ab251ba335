//! Error types for the Consent Vault Core.

use thiserror::Error;

/// Errors raised while constructing or parsing core values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("attribute name must not be empty")]
    EmptyAttribute,

    #[error("attribute {0:?} is reserved for data subjects")]
    ReservedAttribute(String),

    #[error("disjunction must contain at least one literal")]
    EmptyDisjunction,

    #[error("unknown consent state: {0}")]
    UnknownConsentState(String),

    #[error("invalid principal id: {0}")]
    InvalidPrincipal(String),
}
