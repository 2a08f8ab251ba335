//! # Consent Vault Testkit
//!
//! Testing utilities for Consent Vault.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Policy vectors**: consent histories with the policy they must produce
//! - **Generators**: Proptest strategies for property-based testing
//! - **Fixtures**: a keyring plus a seeded in-memory store, and a store that
//!   fails on demand
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use consent_vault_testkit::generators::{plaintext, policy};
//!
//! proptest! {
//!     #[test]
//!     fn owner_reads_own_field(value in plaintext(), policy in policy(3)) {
//!         // seal under `policy`, open with its first literal
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust,ignore
//! use consent_vault_testkit::fixtures::{TestFixture, MARKETING};
//!
//! let fixture = TestFixture::new().await;
//! fixture.grant(PrincipalId::new(7), MARKETING, expires_at).await?;
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{catalog, FaultyStore, TestFixture, ANALYTICS, MARKETING, RESEARCH};
pub use generators::{ScenarioParams, NOW};
pub use vectors::{all_vectors, ConsentRow, PolicyVector, GRACE_WINDOW_MS};
