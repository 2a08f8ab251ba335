//! Encryption under a disjunction of attribute literals.
//!
//! A random content key seals the payload. For every literal of the policy
//! a slot holds that content key, wrapped for the literal's attribute public
//! key through one ephemeral X25519 exchange. Anyone holding the secret of
//! any one literal can unwrap a slot; slots do not name their attribute.

use consent_vault_core::PolicyExpression;
use rand::seq::SliceRandom;
use tracing::trace;

use crate::crypto::{EncryptionKey, EncryptionNonce, X25519PublicKey, X25519StaticSecret};
use crate::envelope::{Ciphertext, EncryptionFormat, WrappedKey};
use crate::error::EncryptionError;
use crate::keyring::{KeyId, Keyring};

/// The secrets for a set of attributes, bound to one master key pair.
pub struct AttributeKey {
    key_id: KeyId,
    secrets: Vec<X25519StaticSecret>,
}

impl AttributeKey {
    pub(crate) fn new(key_id: KeyId, secrets: Vec<X25519StaticSecret>) -> Self {
        Self { key_id, secrets }
    }

    /// The key pair this key was derived from.
    pub fn key_id(&self) -> KeyId {
        self.key_id
    }

    /// Number of attributes covered.
    pub fn len(&self) -> usize {
        self.secrets.len()
    }

    /// Whether the key covers no attribute at all.
    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }
}

impl std::fmt::Debug for AttributeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttributeKey")
            .field("key_id", &self.key_id)
            .field("attributes", &self.secrets.len())
            .finish()
    }
}

/// Associated data binding slots and payload to the key pair and ephemeral.
fn header(key_id: &KeyId, ephemeral: &X25519PublicKey) -> [u8; 64] {
    let mut aad = [0u8; 64];
    aad[..32].copy_from_slice(key_id.as_bytes());
    aad[32..].copy_from_slice(ephemeral.as_bytes());
    aad
}

/// Seal `plaintext` so that any holder of one literal of `policy` can open it.
pub fn seal(
    keyring: &Keyring,
    plaintext: &[u8],
    policy: &PolicyExpression,
) -> Result<Ciphertext, EncryptionError> {
    policy.validate()?;

    let key_id = keyring.key_id();
    let ephemeral = X25519StaticSecret::generate();
    let ephemeral_public = ephemeral.public_key();
    let aad = header(&key_id, &ephemeral_public);

    let content_key = EncryptionKey::generate();

    let mut slots = policy
        .literals()
        .iter()
        .map(|literal| {
            let shared = ephemeral.diffie_hellman(&keyring.attribute_public_key(literal));
            let wrap_key = shared.derive_wrap_key(&aad);
            let nonce = EncryptionNonce::generate();
            let sealed = wrap_key
                .seal(content_key.as_bytes(), &aad, &nonce)
                .map_err(|e| EncryptionError::Aead(e.to_string()))?;
            Ok(WrappedKey { nonce, sealed })
        })
        .collect::<Result<Vec<_>, EncryptionError>>()?;

    // Slot position must not reveal which literal it belongs to.
    slots.shuffle(&mut rand::thread_rng());

    let nonce = EncryptionNonce::generate();
    let payload = content_key
        .seal(plaintext, &aad, &nonce)
        .map_err(|e| EncryptionError::Aead(e.to_string()))?;

    trace!(slots = slots.len(), "sealed payload");

    Ok(Ciphertext {
        format: EncryptionFormat::X25519ChaCha20Poly1305,
        key_id,
        ephemeral: ephemeral_public,
        slots,
        nonce,
        payload,
    })
}

/// Open `ciphertext` with `key`. `None` when no held attribute unlocks a slot
/// or when any authentication check fails.
pub fn open(ciphertext: &Ciphertext, key: &AttributeKey) -> Option<Vec<u8>> {
    if ciphertext.key_id != key.key_id {
        return None;
    }

    let aad = header(&ciphertext.key_id, &ciphertext.ephemeral);

    for secret in &key.secrets {
        let wrap_key = secret
            .diffie_hellman(&ciphertext.ephemeral)
            .derive_wrap_key(&aad);

        for slot in &ciphertext.slots {
            let Ok(content) = wrap_key.open(&slot.sealed, &aad, &slot.nonce) else {
                continue;
            };
            let Ok(content) = <[u8; 32]>::try_from(content.as_slice()) else {
                continue;
            };

            if let Ok(plaintext) =
                EncryptionKey::from_bytes(content).open(&ciphertext.payload, &aad, &ciphertext.nonce)
            {
                return Some(plaintext);
            }
        }
    }

    None
}
