//! The master key pair and attribute-key derivation.
//!
//! The keyring is created once at startup and never mutated. It is shared
//! as `Arc<Keyring>` between every component that encrypts or decrypts.

use std::fmt;
use std::path::Path;

use consent_vault_core::{Attribute, AttributeSet};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::crypto::{X25519PublicKey, X25519StaticSecret};
use crate::error::KeyLoadError;
use crate::keyfile::{self, KeyFiles, KeyKind};
use crate::scheme::AttributeKey;

/// Domain separation for attribute secret derivation.
const ATTRIBUTE_DOMAIN: &[u8] = b"attribute";

/// Identifies a master key pair: the BLAKE3 hash of its public key.
///
/// Every ciphertext records the key id it was sealed under.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyId(pub [u8; 32]);

impl KeyId {
    /// Compute the id of a public key.
    pub fn of(public: &MasterPublicKey) -> Self {
        Self(*blake3::hash(public.0.as_bytes()).as_bytes())
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hex encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyId({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// The public half of the master key pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterPublicKey(pub X25519PublicKey);

impl MasterPublicKey {
    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_bytes()
    }
}

/// The master secret. Never leaves the keyring.
pub struct MasterSecretKey([u8; 32]);

impl MasterSecretKey {
    fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub(crate) const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub(crate) const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// The public key belonging to this secret.
    pub fn public_key(&self) -> MasterPublicKey {
        MasterPublicKey(X25519StaticSecret::from_bytes(self.0).public_key())
    }
}

impl fmt::Debug for MasterSecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterSecretKey(<redacted>)")
    }
}

/// A master key pair.
#[derive(Debug)]
pub struct MasterKeypair {
    pub public: MasterPublicKey,
    pub secret: MasterSecretKey,
}

impl MasterKeypair {
    /// Generate a fresh key pair.
    pub fn generate() -> Self {
        let secret = MasterSecretKey::generate();
        Self {
            public: secret.public_key(),
            secret,
        }
    }

    /// A deterministic key pair. For tests and reproducible fixtures only.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        let secret = MasterSecretKey::from_bytes(seed);
        Self {
            public: secret.public_key(),
            secret,
        }
    }
}

/// Holds the master key pair and derives per-attribute keys from it.
pub struct Keyring {
    keypair: MasterKeypair,
    key_id: KeyId,
}

impl Keyring {
    /// Load the key pair persisted in `dir`, or generate and persist one.
    ///
    /// Both files absent: generate. Both present: load and verify they form
    /// a pair. Only the secret present: rebuild the public file. Only the
    /// public file present, or anything unreadable: error.
    pub fn initialize(dir: impl AsRef<Path>) -> Result<Self, KeyLoadError> {
        let files = KeyFiles::in_dir(dir.as_ref());

        match (files.public.exists(), files.secret.exists()) {
            (false, false) => {
                std::fs::create_dir_all(dir.as_ref()).map_err(|source| KeyLoadError::Io {
                    path: dir.as_ref().to_path_buf(),
                    source,
                })?;

                let keyring = Self::from_keypair(MasterKeypair::generate());
                keyfile::write(&files.secret, KeyKind::Secret, keyring.key_id, keyring.keypair.secret.as_bytes())?;
                keyfile::write(&files.public, KeyKind::Public, keyring.key_id, keyring.keypair.public.as_bytes())?;

                info!(key_id = %keyring.key_id, dir = %dir.as_ref().display(), "generated master key pair");
                Ok(keyring)
            }
            (true, false) => Err(KeyLoadError::MissingSecret { path: files.secret }),
            (false, true) => {
                let keyring = Self::load_secret(&files.secret)?;
                keyfile::write(&files.public, KeyKind::Public, keyring.key_id, keyring.keypair.public.as_bytes())?;

                warn!(key_id = %keyring.key_id, "public key file was missing, rebuilt from secret");
                Ok(keyring)
            }
            (true, true) => {
                let keyring = Self::load_secret(&files.secret)?;
                let public = keyfile::read(&files.public, KeyKind::Public)?;

                if public.material != *keyring.keypair.public.as_bytes() || public.key_id != keyring.key_id {
                    return Err(KeyLoadError::Mismatch {
                        expected: keyring.key_id.to_hex(),
                        found: public.key_id.to_hex(),
                    });
                }

                info!(key_id = %keyring.key_id, "loaded master key pair");
                Ok(keyring)
            }
        }
    }

    fn load_secret(path: &Path) -> Result<Self, KeyLoadError> {
        let doc = keyfile::read(path, KeyKind::Secret)?;
        let keyring = Self::from_keypair(MasterKeypair {
            public: MasterSecretKey::from_bytes(doc.material).public_key(),
            secret: MasterSecretKey::from_bytes(doc.material),
        });

        if doc.key_id != keyring.key_id {
            return Err(KeyLoadError::Malformed {
                path: path.to_path_buf(),
                reason: "recorded key id does not match secret".into(),
            });
        }
        Ok(keyring)
    }

    /// An in-memory keyring that is never persisted.
    pub fn generate() -> Self {
        Self::from_keypair(MasterKeypair::generate())
    }

    /// Wrap an existing key pair.
    pub fn from_keypair(keypair: MasterKeypair) -> Self {
        let key_id = KeyId::of(&keypair.public);
        Self { keypair, key_id }
    }

    /// The id of the master key pair.
    pub fn key_id(&self) -> KeyId {
        self.key_id
    }

    /// The master public key.
    pub fn public_key(&self) -> MasterPublicKey {
        self.keypair.public
    }

    /// Derive the key for exactly `attributes`.
    ///
    /// Deterministic: the same set always yields the same key. No other
    /// attribute is implied.
    pub fn derive_attribute_key(&self, attributes: &AttributeSet) -> AttributeKey {
        let secrets = attributes
            .iter()
            .map(|attr| self.attribute_secret(attr))
            .collect();

        debug!(count = attributes.len(), "derived attribute key");
        AttributeKey::new(self.key_id, secrets)
    }

    /// The public point an encryptor uses for `attribute`.
    pub fn attribute_public_key(&self, attribute: &Attribute) -> X25519PublicKey {
        self.attribute_secret(attribute).public_key()
    }

    fn attribute_secret(&self, attribute: &Attribute) -> X25519StaticSecret {
        let name = attribute.as_str().as_bytes();

        let mut hasher = blake3::Hasher::new_keyed(self.keypair.secret.as_bytes());
        hasher.update(ATTRIBUTE_DOMAIN);
        hasher.update(&(name.len() as u64).to_le_bytes());
        hasher.update(name);

        X25519StaticSecret::from_bytes(*hasher.finalize().as_bytes())
    }
}

impl fmt::Debug for Keyring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keyring").field("key_id", &self.key_id).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn set(names: &[&str]) -> AttributeSet {
        AttributeSet::from_names(names.iter().copied()).unwrap()
    }

    #[test]
    fn test_initialize_generates_then_loads() {
        let dir = TempDir::new().unwrap();

        let first = Keyring::initialize(dir.path()).unwrap();
        let second = Keyring::initialize(dir.path()).unwrap();

        assert_eq!(first.key_id(), second.key_id());
        assert_eq!(first.public_key(), second.public_key());
    }

    #[test]
    fn test_initialize_creates_missing_dir() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("keys");

        Keyring::initialize(&nested).unwrap();

        assert!(nested.join(keyfile::PUBLIC_FILE).exists());
        assert!(nested.join(keyfile::SECRET_FILE).exists());
    }

    #[test]
    fn test_missing_secret_is_fatal() {
        let dir = TempDir::new().unwrap();
        Keyring::initialize(dir.path()).unwrap();
        std::fs::remove_file(dir.path().join(keyfile::SECRET_FILE)).unwrap();

        let err = Keyring::initialize(dir.path()).unwrap_err();
        assert!(matches!(err, KeyLoadError::MissingSecret { .. }));
    }

    #[test]
    fn test_missing_public_is_rebuilt() {
        let dir = TempDir::new().unwrap();
        let original = Keyring::initialize(dir.path()).unwrap();
        std::fs::remove_file(dir.path().join(keyfile::PUBLIC_FILE)).unwrap();

        let reloaded = Keyring::initialize(dir.path()).unwrap();

        assert_eq!(original.key_id(), reloaded.key_id());
        assert!(dir.path().join(keyfile::PUBLIC_FILE).exists());
    }

    #[test]
    fn test_mismatched_pair_is_fatal() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        Keyring::initialize(a.path()).unwrap();
        Keyring::initialize(b.path()).unwrap();

        std::fs::copy(
            b.path().join(keyfile::PUBLIC_FILE),
            a.path().join(keyfile::PUBLIC_FILE),
        )
        .unwrap();

        let err = Keyring::initialize(a.path()).unwrap_err();
        assert!(matches!(err, KeyLoadError::Mismatch { .. }));
    }

    #[test]
    fn test_garbage_secret_is_fatal() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(keyfile::SECRET_FILE), b"not a key").unwrap();

        let err = Keyring::initialize(dir.path()).unwrap_err();
        assert!(matches!(err, KeyLoadError::Malformed { .. }));
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let keyring = Keyring::generate();
        let attr = Attribute::new("Marketing").unwrap();

        assert_eq!(
            keyring.attribute_public_key(&attr),
            keyring.attribute_public_key(&attr)
        );
        assert_eq!(keyring.derive_attribute_key(&set(&["Marketing", "Research"])).len(), 2);
    }

    #[test]
    fn test_attribute_keys_differ_per_attribute_and_keyring() {
        let k1 = Keyring::generate();
        let k2 = Keyring::generate();
        let marketing = Attribute::new("Marketing").unwrap();
        let research = Attribute::new("Research").unwrap();

        assert_ne!(k1.attribute_public_key(&marketing), k1.attribute_public_key(&research));
        assert_ne!(k1.attribute_public_key(&marketing), k2.attribute_public_key(&marketing));
    }

    #[test]
    fn test_seeded_keyring_is_reproducible() {
        let a = Keyring::from_keypair(MasterKeypair::from_seed([0x42; 32]));
        let b = Keyring::from_keypair(MasterKeypair::from_seed([0x42; 32]));
        let attr = Attribute::new("Research").unwrap();

        assert_eq!(a.key_id(), b.key_id());
        assert_eq!(a.attribute_public_key(&attr), b.attribute_public_key(&attr));
    }

    #[test]
    fn test_key_id_formatting() {
        let keyring = Keyring::generate();
        let id = keyring.key_id();

        assert_eq!(id.to_string().len(), 64);
        assert!(format!("{keyring:?}").contains("KeyId("));
        assert_eq!(
            format!("{:?}", MasterKeypair::generate().secret),
            "MasterSecretKey(<redacted>)"
        );
    }
}
