//! SQLite implementation of the collaborator traits.
//!
//! Uses rusqlite with bundled SQLite, wrapped in async via
//! `tokio::task::spawn_blocking`.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use bytes::Bytes;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};

use consent_vault_core::{
    now_millis, AccessEvent, AttributeAssignment, AttributeSet, ConsentRecord, ConsentState,
    PolicyCatalogEntry, PrincipalId, SubjectConsent,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{AttributeStore, AuditSink, ConsentSource, FieldStore};

/// SQLite-based store.
///
/// Thread-safe via an internal Mutex. Every operation runs on the blocking
/// thread pool.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

fn poisoned<T>(e: PoisonError<T>) -> StoreError {
    StoreError::Database(rusqlite::Error::SqliteFailure(
        rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_LOCKED),
        Some(format!("mutex poisoned: {}", e)),
    ))
}

impl SqliteStore {
    /// Open a SQLite database at the given path, creating and migrating it
    /// as needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(poisoned)?;
            f(&mut conn)
        })
        .await
        .map_err(|e| {
            StoreError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
                Some(format!("spawn_blocking failed: {}", e)),
            ))
        })?
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Consent collaborator writes
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert or replace a catalog entry.
    pub async fn put_policy(&self, entry: &PolicyCatalogEntry) -> Result<()> {
        let entry = entry.clone();

        self.blocking(move |conn| {
            conn.execute(
                "INSERT INTO policies (policy_id, title, valid_until) VALUES (?1, ?2, ?3)
                 ON CONFLICT(policy_id) DO UPDATE SET
                    title = excluded.title, valid_until = excluded.valid_until",
                params![entry.policy_id, entry.title, entry.valid_until],
            )?;
            Ok(())
        })
        .await
    }

    /// Insert a consent or update it by `consent_id`.
    ///
    /// Fails with [`StoreError::Conflict`] when it would leave two open
    /// consents for the same subject and policy.
    pub async fn put_consent(&self, record: &ConsentRecord) -> Result<()> {
        let record = record.clone();

        self.blocking(move |conn| {
            let result = conn.execute(
                "INSERT INTO consents (consent_id, subject_id, policy_id, state, granted_at,
                                       expires_at, revocation_requested_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(consent_id) DO UPDATE SET
                    subject_id = excluded.subject_id,
                    policy_id = excluded.policy_id,
                    state = excluded.state,
                    granted_at = excluded.granted_at,
                    expires_at = excluded.expires_at,
                    revocation_requested_at = excluded.revocation_requested_at",
                params![
                    record.consent_id,
                    record.subject.get(),
                    record.policy_id,
                    record.state.as_str(),
                    record.granted_at,
                    record.expires_at,
                    record.revocation_requested_at,
                ],
            );

            match result {
                Ok(_) => Ok(()),
                Err(rusqlite::Error::SqliteFailure(err, _))
                    if err.code == ErrorCode::ConstraintViolation =>
                {
                    Err(StoreError::Conflict {
                        subject: record.subject,
                        policy_id: record.policy_id,
                    })
                }
                Err(e) => Err(e.into()),
            }
        })
        .await
    }

    /// The whole access log, oldest first.
    pub async fn access_events(&self) -> Result<Vec<AccessEvent>> {
        self.blocking(|conn| {
            let mut stmt = conn.prepare(
                "SELECT requester_id, subject_id, field_name, success, reason, at
                 FROM access_log ORDER BY id",
            )?;
            let events = stmt
                .query_map([], |row| {
                    Ok(AccessEvent {
                        requester: PrincipalId(row.get(0)?),
                        subject: PrincipalId(row.get(1)?),
                        field: row.get(2)?,
                        success: row.get::<_, i64>(3)? != 0,
                        reason: row.get(4)?,
                        at: row.get(5)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(events)
        })
        .await
    }
}

#[async_trait]
impl ConsentSource for SqliteStore {
    async fn consents_for(&self, subject: PrincipalId) -> Result<Vec<SubjectConsent>> {
        self.blocking(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT p.title, c.state, c.expires_at, c.revocation_requested_at
                 FROM consents c JOIN policies p ON p.policy_id = c.policy_id
                 WHERE c.subject_id = ?1
                 ORDER BY c.consent_id",
            )?;
            let consents = stmt
                .query_map(params![subject.get()], |row| {
                    let state: String = row.get(1)?;
                    let state = state.parse::<ConsentState>().map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(
                            1,
                            rusqlite::types::Type::Text,
                            Box::new(e),
                        )
                    })?;
                    Ok(SubjectConsent {
                        title: row.get(0)?,
                        state,
                        expires_at: row.get(2)?,
                        revocation_requested_at: row.get(3)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(consents)
        })
        .await
    }
}

#[async_trait]
impl AttributeStore for SqliteStore {
    async fn save(
        &self,
        principal: PrincipalId,
        attributes: AttributeSet,
    ) -> Result<AttributeAssignment> {
        attributes
            .ensure_grantable()
            .map_err(|e| StoreError::InvalidData(e.to_string()))?;
        let json = serde_json::to_string(&attributes)?;
        let now = now_millis();

        let version: i64 = self
            .blocking(move |conn| {
                let version = conn.query_row(
                    "INSERT INTO attribute_assignments (principal_id, attributes, version, assigned_at)
                     VALUES (?1, ?2, 1, ?3)
                     ON CONFLICT(principal_id) DO UPDATE SET
                        attributes = excluded.attributes,
                        version = attribute_assignments.version + 1,
                        assigned_at = excluded.assigned_at
                     RETURNING version",
                    params![principal.get(), json, now],
                    |row| row.get(0),
                )?;
                Ok(version)
            })
            .await?;

        Ok(AttributeAssignment {
            principal,
            attributes,
            version: version as u64,
            assigned_at: now,
        })
    }

    async fn load(&self, principal: PrincipalId) -> Result<AttributeSet> {
        Ok(self
            .assignment(principal)
            .await?
            .map(|a| a.attributes)
            .unwrap_or_default())
    }

    async fn assignment(&self, principal: PrincipalId) -> Result<Option<AttributeAssignment>> {
        let row: Option<(String, i64, i64)> = self
            .blocking(move |conn| {
                let row = conn
                    .query_row(
                        "SELECT attributes, version, assigned_at
                         FROM attribute_assignments WHERE principal_id = ?1",
                        params![principal.get()],
                        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                    )
                    .optional()?;
                Ok(row)
            })
            .await?;

        row.map(|(json, version, assigned_at)| -> Result<AttributeAssignment> {
            Ok(AttributeAssignment {
                principal,
                attributes: serde_json::from_str(&json)?,
                version: version as u64,
                assigned_at,
            })
        })
        .transpose()
    }

    async fn remove(&self, principal: PrincipalId) -> Result<bool> {
        self.blocking(move |conn| {
            let deleted = conn.execute(
                "DELETE FROM attribute_assignments WHERE principal_id = ?1",
                params![principal.get()],
            )?;
            Ok(deleted > 0)
        })
        .await
    }
}

#[async_trait]
impl AuditSink for SqliteStore {
    async fn record(&self, event: &AccessEvent) -> Result<()> {
        let event = event.clone();

        self.blocking(move |conn| {
            conn.execute(
                "INSERT INTO access_log (requester_id, subject_id, field_name, success, reason, at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    event.requester.get(),
                    event.subject.get(),
                    event.field,
                    event.success,
                    event.reason,
                    event.at,
                ],
            )?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl FieldStore for SqliteStore {
    async fn put_field(&self, subject: PrincipalId, field: &str, ciphertext: Bytes) -> Result<()> {
        let field = field.to_string();
        let now = now_millis();

        self.blocking(move |conn| {
            conn.execute(
                "INSERT INTO encrypted_fields (subject_id, field_name, ciphertext, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(subject_id, field_name) DO UPDATE SET
                    ciphertext = excluded.ciphertext, updated_at = excluded.updated_at",
                params![subject.get(), field, &ciphertext[..], now],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_field(&self, subject: PrincipalId, field: &str) -> Result<Option<Bytes>> {
        let field = field.to_string();

        self.blocking(move |conn| {
            let bytes: Option<Vec<u8>> = conn
                .query_row(
                    "SELECT ciphertext FROM encrypted_fields
                     WHERE subject_id = ?1 AND field_name = ?2",
                    params![subject.get(), field],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(bytes.map(Bytes::from))
        })
        .await
    }

    async fn list_fields(&self, subject: PrincipalId) -> Result<Vec<String>> {
        self.blocking(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT field_name FROM encrypted_fields
                 WHERE subject_id = ?1 ORDER BY field_name",
            )?;
            let names = stmt
                .query_map(params![subject.get()], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<String>>>()?;
            Ok(names)
        })
        .await
    }

    async fn delete_fields(&self, subject: PrincipalId) -> Result<u64> {
        self.blocking(move |conn| {
            let deleted = conn.execute(
                "DELETE FROM encrypted_fields WHERE subject_id = ?1",
                params![subject.get()],
            )?;
            Ok(deleted as u64)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use consent_vault_core::{Attribute, HOUR_MS};
    use tempfile::TempDir;

    fn record(consent_id: i64, subject: i64, policy_id: i64, state: ConsentState) -> ConsentRecord {
        ConsentRecord {
            consent_id,
            subject: PrincipalId(subject),
            policy_id,
            state,
            granted_at: 1_000,
            expires_at: Some(1_000 + HOUR_MS),
            revocation_requested_at: None,
        }
    }

    async fn with_catalog() -> SqliteStore {
        let store = SqliteStore::open_memory().unwrap();
        for (id, title) in [(1, "Marketing"), (2, "Research")] {
            store
                .put_policy(&PolicyCatalogEntry {
                    policy_id: id,
                    title: title.into(),
                    valid_until: i64::MAX,
                })
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_consents_joined_with_titles_in_order() {
        let store = with_catalog().await;
        store.put_consent(&record(10, 7, 2, ConsentState::Active)).await.unwrap();
        store.put_consent(&record(11, 7, 1, ConsentState::Revoked)).await.unwrap();
        store.put_consent(&record(12, 8, 1, ConsentState::Active)).await.unwrap();

        let consents = store.consents_for(PrincipalId(7)).await.unwrap();
        assert_eq!(consents.len(), 2);
        assert_eq!(consents[0].title, "Research");
        assert_eq!(consents[0].state, ConsentState::Active);
        assert_eq!(consents[1].title, "Marketing");
        assert_eq!(consents[1].state, ConsentState::Revoked);
    }

    #[tokio::test]
    async fn test_second_open_consent_conflicts() {
        let store = with_catalog().await;
        store.put_consent(&record(1, 7, 1, ConsentState::Active)).await.unwrap();

        let err = store
            .put_consent(&record(2, 7, 1, ConsentState::RevocationPending))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { policy_id: 1, .. }));

        // Terminal records may repeat.
        store.put_consent(&record(3, 7, 1, ConsentState::Expired)).await.unwrap();
        store.put_consent(&record(4, 7, 1, ConsentState::Expired)).await.unwrap();
    }

    #[tokio::test]
    async fn test_consent_state_transition_in_place() {
        let store = with_catalog().await;
        store.put_consent(&record(1, 7, 1, ConsentState::Active)).await.unwrap();

        let mut pending = record(1, 7, 1, ConsentState::RevocationPending);
        pending.revocation_requested_at = Some(5_000);
        store.put_consent(&pending).await.unwrap();

        let consents = store.consents_for(PrincipalId(7)).await.unwrap();
        assert_eq!(consents.len(), 1);
        assert_eq!(consents[0].revocation_requested_at, Some(5_000));
    }

    #[tokio::test]
    async fn test_attribute_versions_increment() {
        let store = SqliteStore::open_memory().unwrap();
        let alice = PrincipalId(42);

        assert!(store.load(alice).await.unwrap().is_empty());
        assert!(store.assignment(alice).await.unwrap().is_none());

        let first = store
            .save(alice, AttributeSet::from_names(["Marketing"]).unwrap())
            .await
            .unwrap();
        let second = store
            .save(alice, AttributeSet::from_names(["Research"]).unwrap())
            .await
            .unwrap();

        assert_eq!(first.version, 1);
        assert_eq!(second.version, 2);
        assert_eq!(store.load(alice).await.unwrap().names(), vec!["Research"]);
        assert!(store.holds(alice, &Attribute::new("Research").unwrap()).await.unwrap());
        assert!(!store.holds(alice, &Attribute::new("Marketing").unwrap()).await.unwrap());

        assert!(store.remove(alice).await.unwrap());
        assert!(!store.remove(alice).await.unwrap());
        assert!(store.load(alice).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_owner_literal_not_assignable() {
        let store = SqliteStore::open_memory().unwrap();
        let alice = PrincipalId(42);
        store
            .save(alice, AttributeSet::from_names(["Marketing"]).unwrap())
            .await
            .unwrap();

        let err = store
            .save(alice, AttributeSet::from_names(["owner:7"]).unwrap())
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::InvalidData(_)));
        let current = store.assignment(alice).await.unwrap().unwrap();
        assert_eq!((current.version, current.attributes.names()), (1, vec!["Marketing".to_string()]));
    }

    #[tokio::test]
    async fn test_fields_and_audit() {
        let store = SqliteStore::open_memory().unwrap();
        let subject = PrincipalId(7);

        store.put_field(subject, "phone", Bytes::from_static(b"a")).await.unwrap();
        store.put_field(subject, "phone", Bytes::from_static(b"b")).await.unwrap();
        store.put_field(subject, "email", Bytes::from_static(b"c")).await.unwrap();

        assert_eq!(
            store.get_field(subject, "phone").await.unwrap(),
            Some(Bytes::from_static(b"b"))
        );
        assert_eq!(store.list_fields(subject).await.unwrap(), vec!["email", "phone"]);
        assert_eq!(store.delete_fields(subject).await.unwrap(), 2);
        assert_eq!(store.get_field(subject, "phone").await.unwrap(), None);

        let event = AccessEvent {
            requester: PrincipalId(42),
            subject,
            field: Some("phone".into()),
            success: false,
            reason: "not authorized".into(),
            at: 9,
        };
        store.record(&event).await.unwrap();
        assert_eq!(store.access_events().await.unwrap(), vec![event]);
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vault.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store
                .save(PrincipalId(1), AttributeSet::from_names(["Marketing"]).unwrap())
                .await
                .unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        let assignment = store.assignment(PrincipalId(1)).await.unwrap().unwrap();
        assert_eq!(assignment.version, 1);
        assert_eq!(assignment.attributes.names(), vec!["Marketing"]);
    }
}
