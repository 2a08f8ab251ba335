//! Policy composition scenarios with their expected policies.
//!
//! Every scenario is evaluated for subject 7 at [`NOW`](crate::generators::NOW)
//! with a 24h grace window. Offsets are relative to that instant.

use consent_vault_core::{ConsentState, PrincipalId, SubjectConsent, HOUR_MS, MINUTE_MS};

use crate::generators::NOW;

/// Grace window the expectations assume.
pub const GRACE_WINDOW_MS: i64 = 24 * HOUR_MS;

/// One consent row of a scenario.
#[derive(Debug, Clone, Copy)]
pub struct ConsentRow {
    pub title: &'static str,
    pub state: ConsentState,
    /// Offset of `expires_at` from NOW.
    pub expires_in: Option<i64>,
    /// Offset of `revocation_requested_at` from NOW.
    pub requested_in: Option<i64>,
}

const fn active(title: &'static str, expires_in: i64) -> ConsentRow {
    ConsentRow {
        title,
        state: ConsentState::Active,
        expires_in: Some(expires_in),
        requested_in: None,
    }
}

const fn pending(title: &'static str, requested_in: i64) -> ConsentRow {
    ConsentRow {
        title,
        state: ConsentState::RevocationPending,
        expires_in: None,
        requested_in: Some(requested_in),
    }
}

const fn terminal(title: &'static str, state: ConsentState) -> ConsentRow {
    ConsentRow {
        title,
        state,
        expires_in: Some(HOUR_MS),
        requested_in: None,
    }
}

/// A policy composition scenario.
#[derive(Debug, Clone)]
pub struct PolicyVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    pub consents: Vec<ConsentRow>,
    /// The expected policy, rendered with `Display`.
    pub expected: &'static str,
}

impl PolicyVector {
    pub fn subject(&self) -> PrincipalId {
        PrincipalId::new(7)
    }

    pub fn now(&self) -> i64 {
        NOW
    }

    /// The consent rows as the consent collaborator would return them.
    pub fn consents(&self) -> Vec<SubjectConsent> {
        self.consents
            .iter()
            .map(|row| SubjectConsent {
                title: row.title.to_string(),
                state: row.state,
                expires_at: row.expires_in.map(|offset| NOW + offset),
                revocation_requested_at: row.requested_in.map(|offset| NOW + offset),
            })
            .collect()
    }
}

/// Get all policy vectors.
pub fn all_vectors() -> Vec<PolicyVector> {
    vec![
        PolicyVector {
            name: "no consents",
            consents: vec![],
            expected: "owner:7",
        },
        PolicyVector {
            name: "single active consent",
            consents: vec![active("Marketing", HOUR_MS)],
            expected: "owner:7 OR Marketing",
        },
        PolicyVector {
            name: "active consents keep read order",
            consents: vec![active("Research", HOUR_MS), active("Marketing", 2 * HOUR_MS)],
            expected: "owner:7 OR Research OR Marketing",
        },
        PolicyVector {
            name: "active consent expiring now",
            consents: vec![active("Marketing", 0)],
            expected: "owner:7",
        },
        PolicyVector {
            name: "active consent without expiry",
            consents: vec![ConsentRow {
                title: "Marketing",
                state: ConsentState::Active,
                expires_in: None,
                requested_in: None,
            }],
            expected: "owner:7",
        },
        PolicyVector {
            name: "pending revocation at 23h59m",
            consents: vec![pending("Research", -(24 * HOUR_MS - MINUTE_MS))],
            expected: "owner:7 OR Research",
        },
        PolicyVector {
            name: "pending revocation at 24h01m",
            consents: vec![pending("Research", -(24 * HOUR_MS + MINUTE_MS))],
            expected: "owner:7",
        },
        PolicyVector {
            name: "pending revocation at exactly 24h",
            consents: vec![pending("Research", -24 * HOUR_MS)],
            expected: "owner:7",
        },
        PolicyVector {
            name: "terminal states ignored",
            consents: vec![
                terminal("Marketing", ConsentState::Revoked),
                terminal("Research", ConsentState::Expired),
                terminal("Analytics", ConsentState::NotAccepted),
            ],
            expected: "owner:7",
        },
        PolicyVector {
            name: "duplicate title kept once",
            consents: vec![active("Marketing", HOUR_MS), pending("Marketing", -HOUR_MS)],
            expected: "owner:7 OR Marketing",
        },
        PolicyVector {
            name: "mixed history",
            consents: vec![
                active("Marketing", HOUR_MS),
                terminal("Research", ConsentState::Revoked),
                pending("Analytics", -HOUR_MS),
            ],
            expected: "owner:7 OR Marketing OR Analytics",
        },
        PolicyVector {
            name: "titles are verbatim",
            consents: vec![active("Investigación de Mercado", HOUR_MS), active("marketing", HOUR_MS)],
            expected: "owner:7 OR Investigación de Mercado OR marketing",
        },
    ]
}
