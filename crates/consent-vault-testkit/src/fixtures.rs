//! Test fixtures and helpers.
//!
//! Common setup code for integration tests: a keyring, an in-memory store
//! seeded with a small policy catalog, and a store wrapper that fails on
//! demand.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use consent_vault_core::{
    now_millis, AccessEvent, AttributeAssignment, AttributeSet, ConsentRecord, ConsentState,
    PolicyCatalogEntry, PrincipalId, SubjectConsent,
};
use consent_vault_crypto::Keyring;
use consent_vault_store::{
    AttributeStore, AuditSink, ConsentSource, FieldStore, MemoryStore, Result, StoreError,
};

/// Catalog id of the "Marketing" policy.
pub const MARKETING: i64 = 1;
/// Catalog id of the "Research" policy.
pub const RESEARCH: i64 = 2;
/// Catalog id of the "Analytics" policy.
pub const ANALYTICS: i64 = 3;

/// The catalog every fixture starts with.
pub fn catalog() -> Vec<PolicyCatalogEntry> {
    [(MARKETING, "Marketing"), (RESEARCH, "Research"), (ANALYTICS, "Analytics")]
        .into_iter()
        .map(|(policy_id, title)| PolicyCatalogEntry {
            policy_id,
            title: title.to_string(),
            valid_until: i64::MAX,
        })
        .collect()
}

/// A keyring and a memory store with the catalog loaded.
pub struct TestFixture {
    pub keyring: Arc<Keyring>,
    pub store: Arc<MemoryStore>,
    next_consent_id: AtomicI64,
}

impl TestFixture {
    /// Create a fixture with a random keyring.
    pub async fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        for entry in catalog() {
            store
                .put_policy(&entry)
                .await
                .expect("memory store rejected catalog entry");
        }

        Self {
            keyring: Arc::new(Keyring::generate()),
            store,
            next_consent_id: AtomicI64::new(1),
        }
    }

    fn consent_id(&self) -> i64 {
        self.next_consent_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Record an active consent of `subject` to `policy_id` expiring at
    /// `expires_at`. Returns the consent id.
    pub async fn grant(&self, subject: PrincipalId, policy_id: i64, expires_at: i64) -> Result<i64> {
        let consent_id = self.consent_id();
        self.store
            .put_consent(&ConsentRecord {
                consent_id,
                subject,
                policy_id,
                state: ConsentState::Active,
                granted_at: now_millis(),
                expires_at: Some(expires_at),
                revocation_requested_at: None,
            })
            .await?;
        Ok(consent_id)
    }

    /// Move a consent to another state, keeping its other columns.
    pub async fn transition(
        &self,
        consent_id: i64,
        subject: PrincipalId,
        policy_id: i64,
        state: ConsentState,
        revocation_requested_at: Option<i64>,
    ) -> Result<()> {
        self.store
            .put_consent(&ConsentRecord {
                consent_id,
                subject,
                policy_id,
                state,
                granted_at: now_millis(),
                expires_at: None,
                revocation_requested_at,
            })
            .await
    }

    /// Mark a consent as revocation-pending since `requested_at`.
    pub async fn request_revocation(
        &self,
        consent_id: i64,
        subject: PrincipalId,
        policy_id: i64,
        requested_at: i64,
    ) -> Result<()> {
        self.transition(
            consent_id,
            subject,
            policy_id,
            ConsentState::RevocationPending,
            Some(requested_at),
        )
        .await
    }
}

/// Wraps a [`MemoryStore`] and fails selected operations on demand.
#[derive(Default)]
pub struct FaultyStore {
    pub inner: MemoryStore,
    fail_consents: AtomicBool,
    fail_attributes: AtomicBool,
    fail_audit: AtomicBool,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_consents(&self, fail: bool) {
        self.fail_consents.store(fail, Ordering::SeqCst);
    }

    pub fn fail_attributes(&self, fail: bool) {
        self.fail_attributes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_audit(&self, fail: bool) {
        self.fail_audit.store(fail, Ordering::SeqCst);
    }

    fn check(flag: &AtomicBool, what: &str) -> Result<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!("{what} offline")));
        }
        Ok(())
    }
}

#[async_trait]
impl ConsentSource for FaultyStore {
    async fn consents_for(&self, subject: PrincipalId) -> Result<Vec<SubjectConsent>> {
        Self::check(&self.fail_consents, "consent source")?;
        self.inner.consents_for(subject).await
    }
}

#[async_trait]
impl AttributeStore for FaultyStore {
    async fn save(
        &self,
        principal: PrincipalId,
        attributes: AttributeSet,
    ) -> Result<AttributeAssignment> {
        Self::check(&self.fail_attributes, "attribute store")?;
        self.inner.save(principal, attributes).await
    }

    async fn load(&self, principal: PrincipalId) -> Result<AttributeSet> {
        Self::check(&self.fail_attributes, "attribute store")?;
        self.inner.load(principal).await
    }

    async fn assignment(&self, principal: PrincipalId) -> Result<Option<AttributeAssignment>> {
        Self::check(&self.fail_attributes, "attribute store")?;
        self.inner.assignment(principal).await
    }

    async fn remove(&self, principal: PrincipalId) -> Result<bool> {
        Self::check(&self.fail_attributes, "attribute store")?;
        self.inner.remove(principal).await
    }
}

#[async_trait]
impl AuditSink for FaultyStore {
    async fn record(&self, event: &AccessEvent) -> Result<()> {
        Self::check(&self.fail_audit, "audit sink")?;
        self.inner.record(event).await
    }
}

#[async_trait]
impl FieldStore for FaultyStore {
    async fn put_field(&self, subject: PrincipalId, field: &str, ciphertext: Bytes) -> Result<()> {
        self.inner.put_field(subject, field, ciphertext).await
    }

    async fn get_field(&self, subject: PrincipalId, field: &str) -> Result<Option<Bytes>> {
        self.inner.get_field(subject, field).await
    }

    async fn list_fields(&self, subject: PrincipalId) -> Result<Vec<String>> {
        self.inner.list_fields(subject).await
    }

    async fn delete_fields(&self, subject: PrincipalId) -> Result<u64> {
        self.inner.delete_fields(subject).await
    }
}
