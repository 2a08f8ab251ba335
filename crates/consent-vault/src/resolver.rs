//! Deciding, per decrypt request, which attributes the requester holds.
//!
//! The owner of a field reads it through the literals of their *current*
//! policy. Anyone else reads it through their persisted attribute
//! assignment. Every attempt is reported to the audit sink exactly once.

use std::fmt;
use std::sync::Arc;

use consent_vault_core::{now_millis, AccessEvent, PrincipalId};
use consent_vault_crypto::{Decryption, FieldCipher};
use consent_vault_store::{AttributeStore, AuditSink, ConsentSource};
use tracing::{debug, warn};

use crate::error::ResolveError;
use crate::policy::PolicyBuilder;

/// What a decrypt request yields.
///
/// Denial carries no detail: a caller cannot tell a missing attribute from
/// a corrupt or foreign ciphertext.
#[derive(Clone, PartialEq, Eq)]
pub enum AccessOutcome {
    Granted(String),
    NotAuthorized,
}

impl AccessOutcome {
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted(_))
    }

    /// The plaintext, if granted.
    pub fn into_plaintext(self) -> Option<String> {
        match self {
            Self::Granted(plaintext) => Some(plaintext),
            Self::NotAuthorized => None,
        }
    }
}

impl fmt::Debug for AccessOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Granted(_) => f.write_str("Granted(<plaintext>)"),
            Self::NotAuthorized => f.write_str("NotAuthorized"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Owner,
    ThirdParty,
}

impl Role {
    fn of(requester: PrincipalId, subject: PrincipalId) -> Self {
        if requester == subject {
            Self::Owner
        } else {
            Self::ThirdParty
        }
    }
}

/// Internal result of an attempt, before it is collapsed for the caller.
enum Verdict {
    Granted(String, Role),
    Denied(Role),
    Corrupt,
}

impl Verdict {
    fn reason(&self) -> &'static str {
        match self {
            Self::Granted(_, Role::Owner) => "granted: owner",
            Self::Granted(_, Role::ThirdParty) => "granted: attributes",
            Self::Denied(Role::Owner) => "not authorized: owner policy",
            Self::Denied(Role::ThirdParty) => "not authorized: attributes",
            Self::Corrupt => "corrupt ciphertext",
        }
    }
}

fn error_reason(err: &ResolveError) -> &'static str {
    match err {
        ResolveError::PolicyConstruction(_) => "error: policy construction",
        ResolveError::AttributeStore(_) => "error: attribute store",
    }
}

/// Resolves decrypt requests against live consent and attribute state.
pub struct AccessResolver<S: ?Sized> {
    store: Arc<S>,
    policies: PolicyBuilder<S>,
    cipher: FieldCipher,
}

impl<S> AccessResolver<S>
where
    S: ConsentSource + AttributeStore + AuditSink + ?Sized,
{
    pub fn new(store: Arc<S>, policies: PolicyBuilder<S>, cipher: FieldCipher) -> Self {
        Self {
            store,
            policies,
            cipher,
        }
    }

    /// Decrypt `ciphertext`, a field of `subject`, on behalf of `requester`.
    pub async fn decrypt(
        &self,
        requester: PrincipalId,
        subject: PrincipalId,
        ciphertext: &[u8],
    ) -> Result<AccessOutcome, ResolveError> {
        self.decrypt_at(requester, subject, None, ciphertext, now_millis())
            .await
    }

    /// Like [`decrypt`](Self::decrypt), recording `field` in the audit log.
    pub async fn decrypt_field(
        &self,
        requester: PrincipalId,
        subject: PrincipalId,
        field: &str,
        ciphertext: &[u8],
    ) -> Result<AccessOutcome, ResolveError> {
        self.decrypt_at(requester, subject, Some(field), ciphertext, now_millis())
            .await
    }

    /// Resolve a request as of `now` (Unix ms).
    #[tracing::instrument(skip(self, ciphertext), fields(%requester, %subject))]
    pub async fn decrypt_at(
        &self,
        requester: PrincipalId,
        subject: PrincipalId,
        field: Option<&str>,
        ciphertext: &[u8],
        now: i64,
    ) -> Result<AccessOutcome, ResolveError> {
        let result = self.attempt(requester, subject, ciphertext, now).await;

        let (success, reason) = match &result {
            Ok(verdict) => (matches!(verdict, Verdict::Granted(..)), verdict.reason()),
            Err(err) => (false, error_reason(err)),
        };
        self.audit(AccessEvent {
            requester,
            subject,
            field: field.map(str::to_string),
            success,
            reason: reason.to_string(),
            at: now,
        })
        .await;

        match result? {
            Verdict::Granted(plaintext, _) => Ok(AccessOutcome::Granted(plaintext)),
            Verdict::Denied(_) | Verdict::Corrupt => Ok(AccessOutcome::NotAuthorized),
        }
    }

    async fn attempt(
        &self,
        requester: PrincipalId,
        subject: PrincipalId,
        ciphertext: &[u8],
        now: i64,
    ) -> Result<Verdict, ResolveError> {
        let ciphertext = match FieldCipher::deserialize(ciphertext) {
            Ok(ciphertext) => ciphertext,
            Err(err) => {
                warn!(error = %err, "stored field is not a valid ciphertext");
                return Ok(Verdict::Corrupt);
            }
        };

        let role = Role::of(requester, subject);
        let attributes = match role {
            Role::Owner => self
                .policies
                .build_at(subject, now)
                .await?
                .to_attribute_set(),
            Role::ThirdParty => self.store.load(requester).await?,
        };

        match self.cipher.decrypt(&ciphertext, &attributes) {
            Decryption::Granted(plaintext) => Ok(Verdict::Granted(plaintext, role)),
            Decryption::Denied => {
                debug!(?role, held = attributes.len(), "decrypt denied");
                Ok(Verdict::Denied(role))
            }
        }
    }

    async fn audit(&self, event: AccessEvent) {
        if let Err(err) = self.store.record(&event).await {
            warn!(error = %err, "failed to write access log entry");
        }
    }
}
