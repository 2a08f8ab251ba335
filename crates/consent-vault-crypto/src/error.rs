//! Error types for the crypto module.
//!
//! Note what is *not* here: an unsatisfied policy is not an error. It is the
//! [`Decryption::Denied`](crate::Decryption::Denied) value.

use std::path::PathBuf;

use consent_vault_core::CoreError;
use thiserror::Error;

/// Key material could not be generated, persisted or loaded.
///
/// Fatal: nothing may be encrypted or decrypted without a valid key pair.
#[derive(Debug, Error)]
pub enum KeyLoadError {
    /// Reading or writing a key file failed.
    #[error("key file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A key file exists but is not a valid key document.
    #[error("malformed key file {}: {reason}", .path.display())]
    Malformed { path: PathBuf, reason: String },

    /// A key file was written by an incompatible format version.
    #[error("key file {} has unsupported format version {version}", .path.display())]
    UnsupportedVersion { path: PathBuf, version: u16 },

    /// The public key file exists but the secret key file does not.
    #[error("secret key file {} is missing", .path.display())]
    MissingSecret { path: PathBuf },

    /// The public and secret key files do not belong to the same key pair.
    #[error("public key file does not match secret key (expected key id {expected}, found {found})")]
    Mismatch { expected: String, found: String },
}

/// Encrypting a field failed.
///
/// Policies are built by the policy builder and cannot be malformed in normal
/// operation, so this indicates a bug rather than a runtime condition.
#[derive(Debug, Error)]
pub enum EncryptionError {
    /// The policy expression violates a structural rule.
    #[error("invalid policy expression: {0}")]
    InvalidPolicy(#[from] CoreError),

    /// The AEAD rejected the input.
    #[error("aead failure: {0}")]
    Aead(String),
}

/// Stored bytes are not a ciphertext this version can read.
///
/// A storage-integrity problem, distinct from an authorization outcome.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeserializationError {
    #[error("ciphertext too large: {0} bytes")]
    TooLarge(usize),

    #[error("ciphertext truncated")]
    Truncated,

    #[error("bad ciphertext magic")]
    BadMagic,

    #[error("unsupported ciphertext version: {0}")]
    UnsupportedVersion(u8),

    #[error("ciphertext body: {0}")]
    Body(String),

    #[error("{0} trailing bytes after ciphertext body")]
    TrailingBytes(usize),

    #[error("malformed ciphertext: {0}")]
    Malformed(String),
}
