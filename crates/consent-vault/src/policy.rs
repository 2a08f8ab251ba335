//! Computing a subject's current encryption policy from live consent state.

use std::sync::Arc;

use consent_vault_core::{
    now_millis, Attribute, ConsentState, CoreError, PolicyExpression, PrincipalId, SubjectConsent,
};
use consent_vault_store::ConsentSource;
use tracing::debug;

use crate::config::DEFAULT_GRACE_WINDOW_MS;
use crate::error::PolicyConstructionError;

/// Whether `consent` contributes its title to the policy at `now`.
///
/// Active consents count until they expire; an active consent without an
/// expiry does not count. Pending revocations count while the request is
/// younger than the grace window (strictly).
pub fn qualifies(consent: &SubjectConsent, now: i64, grace_window_ms: i64) -> bool {
    match consent.state {
        ConsentState::Active => consent.expires_at.is_some_and(|expires| now < expires),
        ConsentState::RevocationPending => consent
            .revocation_requested_at
            .is_some_and(|requested| requested > now.saturating_sub(grace_window_ms)),
        ConsentState::NotAccepted | ConsentState::Revoked | ConsentState::Expired => false,
    }
}

/// Compose the policy of `subject` from its consents as of `now`.
///
/// The owner literal always comes first; qualifying titles follow in the
/// order given, repeated titles dropped. A title in the `owner:` namespace
/// is an error, never a literal.
pub fn compose_policy(
    subject: PrincipalId,
    consents: &[SubjectConsent],
    now: i64,
    grace_window_ms: i64,
) -> Result<PolicyExpression, CoreError> {
    let mut literals = vec![Attribute::owner(subject)];
    for consent in consents.iter().filter(|c| qualifies(c, now, grace_window_ms)) {
        literals.push(Attribute::grantable(consent.title.as_str())?);
    }

    PolicyExpression::any_of(literals)
}

/// Builds the current policy of a subject.
///
/// Reads consent state on every call; nothing is cached.
pub struct PolicyBuilder<C: ?Sized> {
    consents: Arc<C>,
    grace_window_ms: i64,
}

impl<C: ?Sized> Clone for PolicyBuilder<C> {
    fn clone(&self) -> Self {
        Self {
            consents: Arc::clone(&self.consents),
            grace_window_ms: self.grace_window_ms,
        }
    }
}

impl<C: ConsentSource + ?Sized> PolicyBuilder<C> {
    pub fn new(consents: Arc<C>) -> Self {
        Self {
            consents,
            grace_window_ms: DEFAULT_GRACE_WINDOW_MS,
        }
    }

    pub fn with_grace_window(mut self, grace_window_ms: i64) -> Self {
        self.grace_window_ms = grace_window_ms;
        self
    }

    pub fn grace_window_ms(&self) -> i64 {
        self.grace_window_ms
    }

    /// The policy of `subject` right now.
    pub async fn build(
        &self,
        subject: PrincipalId,
    ) -> Result<PolicyExpression, PolicyConstructionError> {
        self.build_at(subject, now_millis()).await
    }

    /// The policy of `subject` as of `now` (Unix ms).
    pub async fn build_at(
        &self,
        subject: PrincipalId,
        now: i64,
    ) -> Result<PolicyExpression, PolicyConstructionError> {
        let consents = self
            .consents
            .consents_for(subject)
            .await
            .map_err(|source| PolicyConstructionError::ConsentLookup { subject, source })?;

        let policy = compose_policy(subject, &consents, now, self.grace_window_ms)
            .map_err(|source| PolicyConstructionError::InvalidTitle { subject, source })?;

        debug!(
            %subject,
            consents = consents.len(),
            literals = policy.literals().len(),
            "composed policy"
        );
        Ok(policy)
    }
}
