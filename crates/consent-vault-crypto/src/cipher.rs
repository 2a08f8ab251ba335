//! Field-level encrypt/decrypt over the keyring.

use std::sync::Arc;

use bytes::Bytes;
use consent_vault_core::{AttributeSet, PolicyExpression};
use tracing::debug;

use crate::envelope::Ciphertext;
use crate::error::{DeserializationError, EncryptionError};
use crate::keyring::Keyring;
use crate::scheme::{self, AttributeKey};

/// Result of a decrypt attempt.
///
/// Every cryptographic failure collapses into `Denied`: unsatisfied policy,
/// wrong key pair, tampering and invalid UTF-8 are indistinguishable.
#[derive(Clone, PartialEq, Eq)]
pub enum Decryption {
    Granted(String),
    Denied,
}

impl Decryption {
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted(_))
    }

    /// The plaintext, if granted.
    pub fn into_plaintext(self) -> Option<String> {
        match self {
            Self::Granted(plaintext) => Some(plaintext),
            Self::Denied => None,
        }
    }
}

impl std::fmt::Debug for Decryption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Granted(_) => f.write_str("Granted(<plaintext>)"),
            Self::Denied => f.write_str("Denied"),
        }
    }
}

/// Encrypts field values under policies and decrypts them for attribute sets.
#[derive(Debug, Clone)]
pub struct FieldCipher {
    keyring: Arc<Keyring>,
}

impl FieldCipher {
    pub fn new(keyring: Arc<Keyring>) -> Self {
        Self { keyring }
    }

    pub fn keyring(&self) -> &Arc<Keyring> {
        &self.keyring
    }

    /// Encrypt `plaintext` under `policy`.
    pub fn encrypt(
        &self,
        plaintext: &str,
        policy: &PolicyExpression,
    ) -> Result<Ciphertext, EncryptionError> {
        scheme::seal(&self.keyring, plaintext.as_bytes(), policy)
    }

    /// Encrypt and serialize in one step.
    pub fn seal(&self, plaintext: &str, policy: &PolicyExpression) -> Result<Bytes, EncryptionError> {
        self.encrypt(plaintext, policy).map(|ct| Self::serialize(&ct))
    }

    /// Decrypt with a key derived for exactly `attributes`.
    pub fn decrypt(&self, ciphertext: &Ciphertext, attributes: &AttributeSet) -> Decryption {
        let key = self.keyring.derive_attribute_key(attributes);
        self.decrypt_with_key(ciphertext, &key)
    }

    /// Decrypt with an already derived key.
    pub fn decrypt_with_key(&self, ciphertext: &Ciphertext, key: &AttributeKey) -> Decryption {
        match scheme::open(ciphertext, key) {
            Some(plaintext) => match String::from_utf8(plaintext) {
                Ok(plaintext) => Decryption::Granted(plaintext),
                Err(_) => {
                    debug!("decrypted payload is not utf-8");
                    Decryption::Denied
                }
            },
            None => Decryption::Denied,
        }
    }

    pub fn serialize(ciphertext: &Ciphertext) -> Bytes {
        ciphertext.to_bytes()
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Ciphertext, DeserializationError> {
        Ciphertext::from_bytes(bytes)
    }
}
