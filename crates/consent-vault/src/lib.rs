//! # Consent Vault
//!
//! Field-level encryption of personal data under policies derived from
//! live consent state.
//!
//! ## Overview
//!
//! - **Write path**: the [`PolicyBuilder`] turns a subject's consents into
//!   `owner:<id> OR <title> OR ...`, and the field is sealed under it
//! - **Read path**: the [`AccessResolver`] picks the requester's attributes
//!   (the owner's current policy, or a third party's assignment), tries to
//!   decrypt and records the attempt in the access log
//!
//! Access changes as consents and assignments change. Nothing is
//! re-encrypted.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use consent_vault::{AccessOutcome, PrincipalId, Vault, VaultConfig};
//!
//! async fn example() {
//!     let vault = Vault::open(&VaultConfig::default()).unwrap();
//!     let subject = PrincipalId::new(7);
//!
//!     vault.seal_field(subject, "phone", "555-0100").await.unwrap();
//!
//!     let outcome = vault.open_field(subject, subject, "phone").await.unwrap();
//!     assert_eq!(outcome, AccessOutcome::Granted("555-0100".into()));
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `consent_vault::core` - principals, attributes, policies, consent records
//! - `consent_vault::crypto` - keyring, field cipher, wire format
//! - `consent_vault::store` - collaborator traits and storage backends

pub mod config;
pub mod error;
pub mod policy;
pub mod resolver;
pub mod telemetry;
pub mod vault;

pub use consent_vault_core as core;
pub use consent_vault_crypto as crypto;
pub use consent_vault_store as store;

pub use config::{VaultConfig, DEFAULT_GRACE_WINDOW_MS};
pub use error::{PolicyConstructionError, ResolveError, Result, VaultError};
pub use policy::{compose_policy, qualifies, PolicyBuilder};
pub use resolver::{AccessOutcome, AccessResolver};
pub use vault::{Vault, VaultStore};

pub use consent_vault_core::{
    Attribute, AttributeAssignment, AttributeSet, PolicyExpression, PrincipalId, SubjectConsent,
};
