//! In-memory implementation of the collaborator traits.
//!
//! Same semantics as SQLite, no persistence. Used by tests and fixtures.

use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use bytes::Bytes;

use consent_vault_core::{
    now_millis, AccessEvent, AttributeAssignment, AttributeSet, ConsentRecord, PolicyCatalogEntry,
    PrincipalId, SubjectConsent,
};

use crate::error::{Result, StoreError};
use crate::traits::{AttributeStore, AuditSink, ConsentSource, FieldStore};

/// In-memory store. All data is lost when the store is dropped.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    policies: HashMap<i64, PolicyCatalogEntry>,

    /// Ordered by consent id, which is the creation order.
    consents: BTreeMap<i64, ConsentRecord>,

    assignments: HashMap<PrincipalId, AttributeAssignment>,

    access_log: Vec<AccessEvent>,

    /// (subject, field name) -> ciphertext.
    fields: BTreeMap<(PrincipalId, String), Bytes>,
}

fn poisoned<T>(_: PoisonError<T>) -> StoreError {
    StoreError::Unavailable("memory store lock poisoned".into())
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner.read().map_err(poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner.write().map_err(poisoned)
    }

    /// Insert or replace a catalog entry.
    pub async fn put_policy(&self, entry: &PolicyCatalogEntry) -> Result<()> {
        self.write()?.policies.insert(entry.policy_id, entry.clone());
        Ok(())
    }

    /// Insert a consent or update it by `consent_id`.
    ///
    /// Fails with [`StoreError::Conflict`] when it would leave two open
    /// consents for the same subject and policy.
    pub async fn put_consent(&self, record: &ConsentRecord) -> Result<()> {
        let mut inner = self.write()?;

        if !record.state.is_terminal() {
            let clash = inner.consents.values().any(|other| {
                other.consent_id != record.consent_id
                    && other.subject == record.subject
                    && other.policy_id == record.policy_id
                    && !other.state.is_terminal()
            });
            if clash {
                return Err(StoreError::Conflict {
                    subject: record.subject,
                    policy_id: record.policy_id,
                });
            }
        }

        inner.consents.insert(record.consent_id, record.clone());
        Ok(())
    }

    /// The whole access log, oldest first.
    pub async fn access_events(&self) -> Result<Vec<AccessEvent>> {
        Ok(self.read()?.access_log.clone())
    }
}

#[async_trait]
impl ConsentSource for MemoryStore {
    async fn consents_for(&self, subject: PrincipalId) -> Result<Vec<SubjectConsent>> {
        let inner = self.read()?;

        // Inner join: consents whose policy is missing from the catalog are skipped.
        Ok(inner
            .consents
            .values()
            .filter(|c| c.subject == subject)
            .filter_map(|c| {
                inner.policies.get(&c.policy_id).map(|p| SubjectConsent {
                    title: p.title.clone(),
                    state: c.state,
                    expires_at: c.expires_at,
                    revocation_requested_at: c.revocation_requested_at,
                })
            })
            .collect())
    }
}

#[async_trait]
impl AttributeStore for MemoryStore {
    async fn save(
        &self,
        principal: PrincipalId,
        attributes: AttributeSet,
    ) -> Result<AttributeAssignment> {
        attributes
            .ensure_grantable()
            .map_err(|e| StoreError::InvalidData(e.to_string()))?;
        let mut inner = self.write()?;

        let version = inner
            .assignments
            .get(&principal)
            .map_or(1, |existing| existing.version + 1);
        let assignment = AttributeAssignment {
            principal,
            attributes,
            version,
            assigned_at: now_millis(),
        };

        inner.assignments.insert(principal, assignment.clone());
        Ok(assignment)
    }

    async fn load(&self, principal: PrincipalId) -> Result<AttributeSet> {
        Ok(self
            .read()?
            .assignments
            .get(&principal)
            .map(|a| a.attributes.clone())
            .unwrap_or_default())
    }

    async fn assignment(&self, principal: PrincipalId) -> Result<Option<AttributeAssignment>> {
        Ok(self.read()?.assignments.get(&principal).cloned())
    }

    async fn remove(&self, principal: PrincipalId) -> Result<bool> {
        Ok(self.write()?.assignments.remove(&principal).is_some())
    }
}

#[async_trait]
impl AuditSink for MemoryStore {
    async fn record(&self, event: &AccessEvent) -> Result<()> {
        self.write()?.access_log.push(event.clone());
        Ok(())
    }
}

#[async_trait]
impl FieldStore for MemoryStore {
    async fn put_field(&self, subject: PrincipalId, field: &str, ciphertext: Bytes) -> Result<()> {
        self.write()?
            .fields
            .insert((subject, field.to_string()), ciphertext);
        Ok(())
    }

    async fn get_field(&self, subject: PrincipalId, field: &str) -> Result<Option<Bytes>> {
        Ok(self
            .read()?
            .fields
            .get(&(subject, field.to_string()))
            .cloned())
    }

    async fn list_fields(&self, subject: PrincipalId) -> Result<Vec<String>> {
        Ok(self
            .read()?
            .fields
            .keys()
            .filter(|(s, _)| *s == subject)
            .map(|(_, name)| name.clone())
            .collect())
    }

    async fn delete_fields(&self, subject: PrincipalId) -> Result<u64> {
        let mut inner = self.write()?;
        let before = inner.fields.len();
        inner.fields.retain(|(s, _), _| *s != subject);
        Ok((before - inner.fields.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use consent_vault_core::{Attribute, ConsentState};

    fn record(consent_id: i64, policy_id: i64, state: ConsentState) -> ConsentRecord {
        ConsentRecord {
            consent_id,
            subject: PrincipalId(7),
            policy_id,
            state,
            granted_at: 0,
            expires_at: Some(100),
            revocation_requested_at: None,
        }
    }

    #[tokio::test]
    async fn test_consents_skip_unknown_policies() {
        let store = MemoryStore::new();
        store
            .put_policy(&PolicyCatalogEntry {
                policy_id: 1,
                title: "Marketing".into(),
                valid_until: i64::MAX,
            })
            .await
            .unwrap();
        store.put_consent(&record(1, 1, ConsentState::Active)).await.unwrap();
        store.put_consent(&record(2, 99, ConsentState::Active)).await.unwrap();

        let consents = store.consents_for(PrincipalId(7)).await.unwrap();
        assert_eq!(consents, vec![SubjectConsent::active("Marketing", 100)]);
        assert!(store.consents_for(PrincipalId(8)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_open_consent_conflict() {
        let store = MemoryStore::new();
        store.put_consent(&record(1, 1, ConsentState::Active)).await.unwrap();

        assert!(matches!(
            store.put_consent(&record(2, 1, ConsentState::Active)).await,
            Err(StoreError::Conflict { .. })
        ));

        // Updating the same consent is not a conflict.
        store
            .put_consent(&record(1, 1, ConsentState::RevocationPending))
            .await
            .unwrap();
        store.put_consent(&record(3, 1, ConsentState::Revoked)).await.unwrap();
    }

    #[tokio::test]
    async fn test_assignment_lifecycle() {
        let store = MemoryStore::new();
        let bob = PrincipalId(42);

        let first = store
            .save(bob, AttributeSet::from_names(["Marketing"]).unwrap())
            .await
            .unwrap();
        let second = store.save(bob, AttributeSet::new()).await.unwrap();

        assert_eq!((first.version, second.version), (1, 2));
        assert!(store.load(bob).await.unwrap().is_empty());
        assert!(!store.holds(bob, &Attribute::new("Marketing").unwrap()).await.unwrap());
        assert!(store.remove(bob).await.unwrap());
        assert!(store.assignment(bob).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_owner_literal_not_assignable() {
        let store = MemoryStore::new();
        let bob = PrincipalId(42);

        let err = store
            .save(bob, AttributeSet::from_names(["Marketing", "owner:7"]).unwrap())
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::InvalidData(_)));
        assert!(store.assignment(bob).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fields_per_subject() {
        let store = MemoryStore::new();
        store.put_field(PrincipalId(1), "phone", Bytes::from_static(b"x")).await.unwrap();
        store.put_field(PrincipalId(1), "email", Bytes::from_static(b"y")).await.unwrap();
        store.put_field(PrincipalId(2), "phone", Bytes::from_static(b"z")).await.unwrap();

        assert_eq!(store.list_fields(PrincipalId(1)).await.unwrap(), vec!["email", "phone"]);
        assert_eq!(store.delete_fields(PrincipalId(1)).await.unwrap(), 2);
        assert_eq!(
            store.get_field(PrincipalId(2), "phone").await.unwrap(),
            Some(Bytes::from_static(b"z"))
        );
    }
}
