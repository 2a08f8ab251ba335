//! # Consent Vault Core
//!
//! Pure types for the Consent Vault: principals, attributes, policy
//! expressions, consent records and audit events.
//!
//! This crate contains no I/O, no storage and no cryptography. It is the
//! vocabulary shared by the keyring, the stores and the access resolver.
//!
//! ## Key Types
//!
//! - [`PrincipalId`] - Identifies a data subject or a requesting principal
//! - [`Attribute`] - A string label a principal can hold (often a policy title)
//! - [`AttributeSet`] - An ordered set of attributes
//! - [`PolicyExpression`] - A disjunction of attribute literals
//! - [`ConsentRecord`] / [`SubjectConsent`] - Consent state as stored and as read
//! - [`AttributeAssignment`] - The versioned attribute set of a principal
//! - [`AccessEvent`] - One audit record per decrypt attempt

pub mod audit;
pub mod consent;
pub mod error;
pub mod policy;
pub mod time;
pub mod types;

pub use audit::AccessEvent;
pub use consent::{
    AttributeAssignment, ConsentRecord, ConsentState, PolicyCatalogEntry, SubjectConsent,
};
pub use error::CoreError;
pub use policy::PolicyExpression;
pub use time::{now_millis, HOUR_MS, MINUTE_MS};
pub use types::{Attribute, AttributeSet, PrincipalId, OWNER_PREFIX};
