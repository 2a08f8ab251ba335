//! Field ciphertext and its wire format.
//!
//! ```text
//! "CVF" | version (1 byte) | CBOR body
//! ```
//!
//! The body carries the key id, the ephemeral public key, one wrapped
//! content key per policy literal, and the sealed payload.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::crypto::{EncryptionNonce, X25519PublicKey};
use crate::error::DeserializationError;
use crate::keyring::KeyId;

/// Leading bytes of every serialized ciphertext.
pub const MAGIC: &[u8; 3] = b"CVF";

/// Current wire format version.
pub const WIRE_VERSION: u8 = 1;

/// Stored fields larger than this are rejected before parsing.
pub const MAX_CIPHERTEXT_LEN: usize = 1024 * 1024;

/// A wrapped content key is the 32-byte key plus the 16-byte AEAD tag.
const WRAPPED_KEY_LEN: usize = 32 + 16;

const TAG_LEN: usize = 16;

/// Algorithms used by a ciphertext.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum EncryptionFormat {
    /// X25519 key wrapping, BLAKE3 KDF, ChaCha20-Poly1305.
    X25519ChaCha20Poly1305 = 1,
}

/// The content key sealed for one policy literal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrappedKey {
    pub nonce: EncryptionNonce,
    pub sealed: Vec<u8>,
}

/// A field value encrypted under a policy.
///
/// Self-describing: decryption needs only this value and an attribute key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ciphertext {
    pub format: EncryptionFormat,
    pub key_id: KeyId,
    pub ephemeral: X25519PublicKey,
    pub slots: Vec<WrappedKey>,
    pub nonce: EncryptionNonce,
    pub payload: Vec<u8>,
}

impl Ciphertext {
    /// Serialize to the wire format.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = Vec::with_capacity(MAGIC.len() + 1 + self.payload.len() * 2);
        buf.extend_from_slice(MAGIC);
        buf.push(WIRE_VERSION);
        ciborium::into_writer(self, &mut buf).expect("CBOR serialization failed");
        Bytes::from(buf)
    }

    /// Parse the wire format. Never panics on arbitrary input.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DeserializationError> {
        if bytes.len() > MAX_CIPHERTEXT_LEN {
            return Err(DeserializationError::TooLarge(bytes.len()));
        }
        if bytes.len() < MAGIC.len() + 1 {
            return Err(DeserializationError::Truncated);
        }
        if &bytes[..MAGIC.len()] != MAGIC {
            return Err(DeserializationError::BadMagic);
        }

        let version = bytes[MAGIC.len()];
        if version != WIRE_VERSION {
            return Err(DeserializationError::UnsupportedVersion(version));
        }

        let mut body = &bytes[MAGIC.len() + 1..];
        let ciphertext: Ciphertext = ciborium::from_reader(&mut body)
            .map_err(|e| DeserializationError::Body(e.to_string()))?;
        if !body.is_empty() {
            return Err(DeserializationError::TrailingBytes(body.len()));
        }

        ciphertext.check_shape()?;
        Ok(ciphertext)
    }

    fn check_shape(&self) -> Result<(), DeserializationError> {
        if self.slots.is_empty() {
            return Err(DeserializationError::Malformed("no key slots".into()));
        }
        if let Some(slot) = self.slots.iter().find(|s| s.sealed.len() != WRAPPED_KEY_LEN) {
            return Err(DeserializationError::Malformed(format!(
                "wrapped key of {} bytes",
                slot.sealed.len()
            )));
        }
        if self.payload.len() < TAG_LEN {
            return Err(DeserializationError::Malformed("payload shorter than tag".into()));
        }
        Ok(())
    }
}
