//! Consent records, policy catalog entries and attribute assignments.
//!
//! These rows are written by collaborators outside the engine (consent
//! management, expiry sweepers, the attribute approval workflow). The engine
//! only reads consent state and reads/writes attribute assignments.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;
use crate::types::{AttributeSet, PrincipalId};

/// Lifecycle state of a consent record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsentState {
    Active,
    NotAccepted,
    Revoked,
    Expired,
    RevocationPending,
}

impl ConsentState {
    /// Storage representation.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::NotAccepted => "not_accepted",
            Self::Revoked => "revoked",
            Self::Expired => "expired",
            Self::RevocationPending => "revocation_pending",
        }
    }

    /// Terminal states never change again. At most one non-terminal record
    /// may exist per (subject, policy).
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::NotAccepted | Self::Revoked | Self::Expired)
    }
}

impl fmt::Display for ConsentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConsentState {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "not_accepted" => Ok(Self::NotAccepted),
            "revoked" => Ok(Self::Revoked),
            "expired" => Ok(Self::Expired),
            "revocation_pending" => Ok(Self::RevocationPending),
            other => Err(CoreError::UnknownConsentState(other.to_string())),
        }
    }
}

/// An entry of the privacy policy catalog.
///
/// `title` is also the attribute literal placed in encryption policies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyCatalogEntry {
    pub policy_id: i64,
    pub title: String,
    /// Unix milliseconds.
    pub valid_until: i64,
}

/// A consent given (or not) by a data subject to a catalog policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentRecord {
    pub consent_id: i64,
    pub subject: PrincipalId,
    pub policy_id: i64,
    pub state: ConsentState,
    /// Unix milliseconds.
    pub granted_at: i64,
    pub expires_at: Option<i64>,
    pub revocation_requested_at: Option<i64>,
}

/// The shape in which the consent collaborator answers "list consents of
/// subject X": the consent joined with its catalog title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectConsent {
    pub title: String,
    pub state: ConsentState,
    pub expires_at: Option<i64>,
    pub revocation_requested_at: Option<i64>,
}

impl SubjectConsent {
    /// An active consent expiring at `expires_at`.
    pub fn active(title: impl Into<String>, expires_at: i64) -> Self {
        Self {
            title: title.into(),
            state: ConsentState::Active,
            expires_at: Some(expires_at),
            revocation_requested_at: None,
        }
    }

    /// A consent whose revocation was requested at `requested_at`.
    pub fn revocation_pending(title: impl Into<String>, requested_at: i64) -> Self {
        Self {
            title: title.into(),
            state: ConsentState::RevocationPending,
            expires_at: None,
            revocation_requested_at: Some(requested_at),
        }
    }
}

/// The attributes a principal currently holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeAssignment {
    pub principal: PrincipalId,
    pub attributes: AttributeSet,
    /// Incremented on every save. Informational only, not a concurrency guard.
    pub version: u64,
    /// Unix milliseconds.
    pub assigned_at: i64,
}
