//! The Vault: write and read paths for encrypted personal data fields.
//!
//! Brings the keyring, the policy builder, the field cipher, the access
//! resolver and a store together behind one API keyed by
//! (subject, field name).

use std::sync::Arc;

use consent_vault_core::{
    now_millis, AttributeAssignment, AttributeSet, PolicyExpression, PrincipalId,
};
use consent_vault_crypto::{FieldCipher, Keyring};
use consent_vault_store::{AttributeStore, AuditSink, ConsentSource, FieldStore, SqliteStore};
use tracing::info;

use crate::config::VaultConfig;
use crate::error::{Result, VaultError};
use crate::policy::PolicyBuilder;
use crate::resolver::{AccessOutcome, AccessResolver};

/// Everything the vault needs from its storage collaborators.
pub trait VaultStore: ConsentSource + AttributeStore + AuditSink + FieldStore {}

impl<T> VaultStore for T where T: ConsentSource + AttributeStore + AuditSink + FieldStore + ?Sized {}

/// The main Vault struct.
pub struct Vault<S: VaultStore> {
    keyring: Arc<Keyring>,
    store: Arc<S>,
    policies: PolicyBuilder<S>,
    cipher: FieldCipher,
    resolver: AccessResolver<S>,
}

impl Vault<SqliteStore> {
    /// Load or create the key pair, then open and migrate the database.
    ///
    /// Nothing is served if either step fails.
    pub fn open(config: &VaultConfig) -> Result<Self> {
        let keyring = Arc::new(Keyring::initialize(&config.key_dir)?);
        let store = SqliteStore::open(&config.database_path)?;

        info!(
            key_id = %keyring.key_id(),
            database = %config.database_path.display(),
            "vault opened"
        );
        Ok(Self::new(keyring, Arc::new(store), config))
    }
}

impl<S: VaultStore> Vault<S> {
    /// Assemble a vault from an existing keyring and store.
    pub fn new(keyring: Arc<Keyring>, store: Arc<S>, config: &VaultConfig) -> Self {
        let policies =
            PolicyBuilder::new(Arc::clone(&store)).with_grace_window(config.grace_window_ms);
        let cipher = FieldCipher::new(Arc::clone(&keyring));
        let resolver = AccessResolver::new(Arc::clone(&store), policies.clone(), cipher.clone());

        Self {
            keyring,
            store,
            policies,
            cipher,
            resolver,
        }
    }

    pub fn keyring(&self) -> &Arc<Keyring> {
        &self.keyring
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn policy_builder(&self) -> &PolicyBuilder<S> {
        &self.policies
    }

    pub fn cipher(&self) -> &FieldCipher {
        &self.cipher
    }

    pub fn resolver(&self) -> &AccessResolver<S> {
        &self.resolver
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Write path
    // ─────────────────────────────────────────────────────────────────────────

    /// The policy a field of `subject` would be sealed under right now.
    pub async fn current_policy(&self, subject: PrincipalId) -> Result<PolicyExpression> {
        Ok(self.policies.build(subject).await?)
    }

    /// Encrypt and store one field. Returns the policy it was sealed under.
    pub async fn seal_field(
        &self,
        subject: PrincipalId,
        field: &str,
        plaintext: &str,
    ) -> Result<PolicyExpression> {
        self.seal_record_at(subject, &[(field, plaintext)], now_millis())
            .await
    }

    /// Encrypt and store several fields under one policy snapshot.
    pub async fn seal_record(
        &self,
        subject: PrincipalId,
        fields: &[(&str, &str)],
    ) -> Result<PolicyExpression> {
        self.seal_record_at(subject, fields, now_millis()).await
    }

    /// Like [`seal_record`](Self::seal_record), with the policy as of `now`.
    pub async fn seal_record_at(
        &self,
        subject: PrincipalId,
        fields: &[(&str, &str)],
        now: i64,
    ) -> Result<PolicyExpression> {
        let policy = self.policies.build_at(subject, now).await?;

        // Encrypt everything before writing anything.
        let mut sealed = Vec::with_capacity(fields.len());
        for (field, plaintext) in fields {
            sealed.push((*field, self.cipher.seal(plaintext, &policy)?));
        }

        for (field, bytes) in sealed {
            self.store.put_field(subject, field, bytes).await?;
        }

        info!(%subject, fields = fields.len(), %policy, "sealed fields");
        Ok(policy)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Read path
    // ─────────────────────────────────────────────────────────────────────────

    /// Decrypt one stored field on behalf of `requester`.
    pub async fn open_field(
        &self,
        requester: PrincipalId,
        subject: PrincipalId,
        field: &str,
    ) -> Result<AccessOutcome> {
        self.open_field_at(requester, subject, field, now_millis())
            .await
    }

    /// Like [`open_field`](Self::open_field), resolving as of `now`.
    pub async fn open_field_at(
        &self,
        requester: PrincipalId,
        subject: PrincipalId,
        field: &str,
        now: i64,
    ) -> Result<AccessOutcome> {
        let bytes = self
            .store
            .get_field(subject, field)
            .await?
            .ok_or_else(|| VaultError::FieldNotFound {
                subject,
                field: field.to_string(),
            })?;

        Ok(self
            .resolver
            .decrypt_at(requester, subject, Some(field), &bytes, now)
            .await?)
    }

    /// Decrypt several fields. Each field is a separate, separately audited
    /// attempt with its own result; a missing or failing field does not hide
    /// the others.
    pub async fn open_record(
        &self,
        requester: PrincipalId,
        subject: PrincipalId,
        fields: &[&str],
    ) -> Vec<(String, Result<AccessOutcome>)> {
        let now = now_millis();
        let mut outcomes = Vec::with_capacity(fields.len());
        for field in fields {
            let outcome = self.open_field_at(requester, subject, field, now).await;
            outcomes.push((field.to_string(), outcome));
        }
        outcomes
    }

    /// Delete every stored field of `subject`.
    pub async fn erase_subject(&self, subject: PrincipalId) -> Result<u64> {
        let deleted = self.store.delete_fields(subject).await?;
        info!(%subject, deleted, "erased subject fields");
        Ok(deleted)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Attribute assignments
    // ─────────────────────────────────────────────────────────────────────────

    /// Replace the attributes `principal` holds.
    ///
    /// `owner:<id>` literals cannot be assigned.
    pub async fn assign_attributes<I, N>(
        &self,
        principal: PrincipalId,
        names: I,
    ) -> Result<AttributeAssignment>
    where
        I: IntoIterator<Item = N>,
        N: Into<String>,
    {
        let attributes = AttributeSet::from_names(names)?;
        attributes.ensure_grantable()?;
        let assignment = self.store.save(principal, attributes).await?;

        info!(
            %principal,
            version = assignment.version,
            attributes = assignment.attributes.len(),
            "assigned attributes"
        );
        Ok(assignment)
    }

    /// Remove every attribute of `principal`.
    pub async fn clear_attributes(&self, principal: PrincipalId) -> Result<bool> {
        Ok(self.store.remove(principal).await?)
    }

    /// The current assignment of `principal`, if any.
    pub async fn attributes_of(&self, principal: PrincipalId) -> Result<Option<AttributeAssignment>> {
        Ok(self.store.assignment(principal).await?)
    }
}
