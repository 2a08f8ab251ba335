//! # Consent Vault Store
//!
//! The narrow interfaces through which the engine talks to its
//! collaborators, plus SQLite and in-memory implementations.
//!
//! ## Key Types
//!
//! - [`ConsentSource`] - read-only consent state per data subject
//! - [`AttributeStore`] - versioned attribute assignments per principal
//! - [`AuditSink`] - the access log
//! - [`FieldStore`] - opaque ciphertext bytes per (subject, field)
//! - [`SqliteStore`] - SQLite-backed implementation of all four
//! - [`MemoryStore`] - in-memory implementation for tests
//!
//! ## Usage
//!
//! ```rust,no_run
//! use consent_vault_core::{AttributeSet, PrincipalId};
//! use consent_vault_store::{AttributeStore, SqliteStore};
//!
//! async fn example() {
//!     let store = SqliteStore::open("consent-vault.db").unwrap();
//!
//!     let attrs = AttributeSet::from_names(["Marketing"]).unwrap();
//!     let assignment = store.save(PrincipalId::new(42), attrs).await.unwrap();
//!     assert_eq!(assignment.version, 1);
//! }
//! ```

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{AttributeStore, AuditSink, ConsentSource, FieldStore};
