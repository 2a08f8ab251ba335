//! Audit events.

use serde::{Deserialize, Serialize};

use crate::types::PrincipalId;

/// One record per decrypt attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessEvent {
    pub requester: PrincipalId,
    pub subject: PrincipalId,
    /// Field name, when the attempt was made through a named field.
    pub field: Option<String>,
    pub success: bool,
    pub reason: String,
    /// Unix milliseconds.
    pub at: i64,
}
