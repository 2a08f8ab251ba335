//! On-disk key documents.
//!
//! Each half of the master key pair lives in its own CBOR document carrying
//! a magic string, a format version, its kind and the key id, so that an
//! incompatible file is detected instead of silently misread.

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::KeyLoadError;
use crate::keyring::KeyId;

pub const PUBLIC_FILE: &str = "vault_public.key";
pub const SECRET_FILE: &str = "vault_secret.key";

const MAGIC: &str = "CVK";
const FORMAT_VERSION: u16 = 1;

/// Upper bound on a key document; real ones are ~150 bytes.
const MAX_DOCUMENT_LEN: u64 = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyKind {
    Public,
    Secret,
}

/// A parsed key document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyDocument {
    pub magic: String,
    pub format_version: u16,
    pub kind: KeyKind,
    pub key_id: KeyId,
    pub material: [u8; 32],
}

/// Paths of the two key files inside a key directory.
pub struct KeyFiles {
    pub public: PathBuf,
    pub secret: PathBuf,
}

impl KeyFiles {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            public: dir.join(PUBLIC_FILE),
            secret: dir.join(SECRET_FILE),
        }
    }
}

/// Write a new key document. Fails if the file already exists.
pub fn write(path: &Path, kind: KeyKind, key_id: KeyId, material: &[u8; 32]) -> Result<(), KeyLoadError> {
    let doc = KeyDocument {
        magic: MAGIC.to_string(),
        format_version: FORMAT_VERSION,
        kind,
        key_id,
        material: *material,
    };

    let mut buf = Vec::new();
    ciborium::into_writer(&doc, &mut buf).map_err(|e| KeyLoadError::Malformed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let io_err = |source| KeyLoadError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut file = open_new(path, kind).map_err(io_err)?;
    file.write_all(&buf).map_err(io_err)?;
    file.sync_all().map_err(io_err)
}

#[cfg(unix)]
fn open_new(path: &Path, kind: KeyKind) -> std::io::Result<File> {
    use std::os::unix::fs::OpenOptionsExt;

    let mode = match kind {
        KeyKind::Secret => 0o600,
        KeyKind::Public => 0o644,
    };
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(mode)
        .open(path)
}

#[cfg(not(unix))]
fn open_new(path: &Path, _kind: KeyKind) -> std::io::Result<File> {
    OpenOptions::new().write(true).create_new(true).open(path)
}

/// Read and validate a key document of the expected kind.
pub fn read(path: &Path, expected: KeyKind) -> Result<KeyDocument, KeyLoadError> {
    let io_err = |source| KeyLoadError::Io {
        path: path.to_path_buf(),
        source,
    };
    let malformed = |reason: String| KeyLoadError::Malformed {
        path: path.to_path_buf(),
        reason,
    };

    let mut buf = Vec::new();
    File::open(path)
        .map_err(io_err)?
        .take(MAX_DOCUMENT_LEN + 1)
        .read_to_end(&mut buf)
        .map_err(io_err)?;
    if buf.len() as u64 > MAX_DOCUMENT_LEN {
        return Err(malformed("file too large".into()));
    }

    let doc: KeyDocument = ciborium::from_reader(buf.as_slice()).map_err(|e| malformed(e.to_string()))?;

    if doc.magic != MAGIC {
        return Err(malformed(format!("bad magic {:?}", doc.magic)));
    }
    if doc.format_version != FORMAT_VERSION {
        return Err(KeyLoadError::UnsupportedVersion {
            path: path.to_path_buf(),
            version: doc.format_version,
        });
    }
    if doc.kind != expected {
        return Err(malformed(format!("expected {expected:?} key, found {:?}", doc.kind)));
    }

    Ok(doc)
}
