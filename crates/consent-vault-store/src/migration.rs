//! Database schema migrations for SQLite.
//!
//! Versioned: each migration transforms the schema from version N to N+1
//! and is recorded in `schema_migrations`.

use consent_vault_core::now_millis;
use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema. Idempotent.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema version {current} is newer than supported version {CURRENT_VERSION}"
        )));
    }

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_millis()],
            )?;
        }

        tx.commit()?;
        tracing::info!(from = current, to = CURRENT_VERSION, "migrated database schema");
    }

    Ok(())
}

fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Privacy policy catalog; title doubles as the attribute literal
        CREATE TABLE policies (
            policy_id INTEGER PRIMARY KEY,
            title TEXT NOT NULL,
            valid_until INTEGER NOT NULL          -- Unix ms
        );

        -- Consents given by data subjects
        CREATE TABLE consents (
            consent_id INTEGER PRIMARY KEY,
            subject_id INTEGER NOT NULL,
            policy_id INTEGER NOT NULL,
            state TEXT NOT NULL CHECK (state IN
                ('active', 'not_accepted', 'revoked', 'expired', 'revocation_pending')),
            granted_at INTEGER NOT NULL,
            expires_at INTEGER,
            revocation_requested_at INTEGER
        );

        -- At most one open consent per (subject, policy)
        CREATE UNIQUE INDEX idx_consents_open
            ON consents(subject_id, policy_id)
            WHERE state IN ('active', 'revocation_pending');

        CREATE INDEX idx_consents_subject ON consents(subject_id);

        -- Attribute assignments, attributes as a JSON array of names
        CREATE TABLE attribute_assignments (
            principal_id INTEGER PRIMARY KEY,
            attributes TEXT NOT NULL,
            version INTEGER NOT NULL,
            assigned_at INTEGER NOT NULL
        );

        -- One row per decrypt attempt
        CREATE TABLE access_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            requester_id INTEGER NOT NULL,
            subject_id INTEGER NOT NULL,
            field_name TEXT,
            success INTEGER NOT NULL,
            reason TEXT NOT NULL,
            at INTEGER NOT NULL
        );

        CREATE INDEX idx_access_log_subject ON access_log(subject_id);

        -- Encrypted personal data fields
        CREATE TABLE encrypted_fields (
            subject_id INTEGER NOT NULL,
            field_name TEXT NOT NULL,
            ciphertext BLOB NOT NULL,
            updated_at INTEGER NOT NULL,
            PRIMARY KEY (subject_id, field_name)
        );
        "#,
    )?;

    Ok(())
}
