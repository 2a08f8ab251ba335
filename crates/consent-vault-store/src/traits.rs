//! Collaborator interfaces.
//!
//! The engine reads consent state, reads and writes attribute assignments,
//! stores opaque field ciphertexts and reports every decrypt attempt. Each
//! concern is its own trait so a deployment can back them separately.

use async_trait::async_trait;
use bytes::Bytes;
use consent_vault_core::{
    AccessEvent, Attribute, AttributeAssignment, AttributeSet, PrincipalId, SubjectConsent,
};

use crate::error::Result;

/// Read-only view of a subject's consents.
#[async_trait]
pub trait ConsentSource: Send + Sync {
    /// Every consent of `subject`, joined with its catalog title, in the
    /// order the records were created.
    ///
    /// Returns all states; callers filter. A failure must surface as an
    /// error, never as an empty list.
    async fn consents_for(&self, subject: PrincipalId) -> Result<Vec<SubjectConsent>>;
}

/// Versioned attribute assignments per principal.
#[async_trait]
pub trait AttributeStore: Send + Sync {
    /// Replace the attribute set of `principal`.
    ///
    /// Upsert: the version starts at 1 and increments on every save. Last
    /// write wins.
    ///
    /// Sets containing an `owner:<id>` literal are rejected with
    /// [`StoreError::InvalidData`](crate::StoreError::InvalidData).
    async fn save(&self, principal: PrincipalId, attributes: AttributeSet)
        -> Result<AttributeAssignment>;

    /// The current attribute set, or the empty set if none was saved.
    async fn load(&self, principal: PrincipalId) -> Result<AttributeSet>;

    /// The full assignment row, if any.
    async fn assignment(&self, principal: PrincipalId) -> Result<Option<AttributeAssignment>>;

    /// Delete the assignment. Returns whether one existed.
    async fn remove(&self, principal: PrincipalId) -> Result<bool>;

    /// Whether `principal` currently holds `attribute`.
    async fn holds(&self, principal: PrincipalId, attribute: &Attribute) -> Result<bool> {
        Ok(self.load(principal).await?.contains(attribute))
    }
}

/// Append-only access log.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Record one decrypt attempt. No retry, no batching.
    async fn record(&self, event: &AccessEvent) -> Result<()>;
}

/// Encrypted field values keyed by (subject, field name).
///
/// The store never interprets the bytes.
#[async_trait]
pub trait FieldStore: Send + Sync {
    /// Insert or replace a field.
    async fn put_field(&self, subject: PrincipalId, field: &str, ciphertext: Bytes) -> Result<()>;

    /// Fetch a field.
    async fn get_field(&self, subject: PrincipalId, field: &str) -> Result<Option<Bytes>>;

    /// Names of the stored fields of `subject`, sorted.
    async fn list_fields(&self, subject: PrincipalId) -> Result<Vec<String>>;

    /// Delete every field of `subject`. Returns the number deleted.
    async fn delete_fields(&self, subject: PrincipalId) -> Result<u64>;
}
