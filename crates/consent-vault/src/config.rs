//! Vault configuration.

use std::path::PathBuf;

use consent_vault_core::HOUR_MS;

/// How long a consent in `revocation_pending` keeps granting access.
pub const DEFAULT_GRACE_WINDOW_MS: i64 = 24 * HOUR_MS;

/// Configuration for [`Vault::open`](crate::Vault::open).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultConfig {
    /// Directory holding `vault_public.key` and `vault_secret.key`.
    pub key_dir: PathBuf,
    /// SQLite database file.
    pub database_path: PathBuf,
    /// Grace window for pending revocations, in milliseconds.
    pub grace_window_ms: i64,
}

impl VaultConfig {
    pub fn new(key_dir: impl Into<PathBuf>, database_path: impl Into<PathBuf>) -> Self {
        Self {
            key_dir: key_dir.into(),
            database_path: database_path.into(),
            ..Self::default()
        }
    }

    /// Set the grace window in whole hours.
    pub fn with_grace_hours(mut self, hours: i64) -> Self {
        self.grace_window_ms = hours.saturating_mul(HOUR_MS);
        self
    }
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            key_dir: PathBuf::from("./keys"),
            database_path: PathBuf::from("consent-vault.db"),
            grace_window_ms: DEFAULT_GRACE_WINDOW_MS,
        }
    }
}
