//! # Consent Vault Crypto
//!
//! Key management and field encryption under disjunctive attribute policies.
//!
//! ## Encryption Model
//!
//! A field is encrypted under a policy `a1 OR a2 OR ...`:
//!
//! 1. **Content key**: a random ChaCha20-Poly1305 key seals the field value
//! 2. **Slots**: the content key is wrapped once per literal via X25519 ECDH
//!    against that literal's attribute public key
//!
//! Attribute keys are derived from the master secret on demand, so access
//! follows whatever attributes a principal holds at decrypt time. Nothing
//! is re-encrypted when attributes change.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use consent_vault_core::{Attribute, AttributeSet, PolicyExpression, PrincipalId};
//! use consent_vault_crypto::{FieldCipher, Keyring};
//!
//! let keyring = Arc::new(Keyring::initialize("./keys").unwrap());
//! let cipher = FieldCipher::new(keyring);
//!
//! let policy = PolicyExpression::any_of([
//!     Attribute::owner(PrincipalId::new(7)),
//!     Attribute::new("Marketing").unwrap(),
//! ])
//! .unwrap();
//! let stored = cipher.seal("555-0100", &policy).unwrap();
//!
//! let ct = FieldCipher::deserialize(&stored).unwrap();
//! let held = AttributeSet::from_names(["Marketing"]).unwrap();
//! assert!(cipher.decrypt(&ct, &held).is_granted());
//! ```

pub mod cipher;
pub mod crypto;
pub mod envelope;
pub mod error;
pub mod keyfile;
pub mod keyring;
pub mod scheme;

pub use cipher::{Decryption, FieldCipher};
pub use crypto::{EncryptionKey, EncryptionNonce, SharedKey, X25519PublicKey, X25519StaticSecret};
pub use envelope::{Ciphertext, EncryptionFormat, WrappedKey, MAX_CIPHERTEXT_LEN};
pub use error::{DeserializationError, EncryptionError, KeyLoadError};
pub use keyring::{KeyId, Keyring, MasterKeypair, MasterPublicKey, MasterSecretKey};
pub use scheme::AttributeKey;
