//! BLAKE3 content hashing for payloads and readers
//!
//! The hex digest is the catalog's dedup key.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Read;
use std::str::FromStr;

use cafs_core::{CafsError, CafsResult};

/// A BLAKE3 hash digest (32 bytes), displayed as 64 hex chars
pub type Hash = blake3::Hash;

/// Read buffer for streaming hashes
pub(crate) const READ_BUF_LEN: usize = 64 * 1024;

/// Hash a byte slice in memory.
pub fn hash_bytes(data: &[u8]) -> Hash {
    blake3::hash(data)
}

/// Hash everything a reader yields until EOF.
///
/// Fails with `CafsError::Io` if the reader errors before EOF.
pub fn hash_reader<R: Read>(mut reader: R) -> CafsResult<Hash> {
    let mut hasher = blake3::Hasher::new();
    let mut buf = vec![0u8; READ_BUF_LEN];

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(CafsError::Io(e)),
        };
        hasher.update(&buf[..n]);
    }

    Ok(hasher.finalize())
}

/// Format a hash as lowercase hex string (64 chars)
pub fn hash_to_hex(hash: &Hash) -> String {
    hash.to_hex().to_string()
}

/// Parse a 64-char hex string into a Hash
pub fn hash_from_hex(hex: &str) -> Result<Hash> {
    blake3::Hash::from_hex(hex).map_err(|e| anyhow::anyhow!("invalid BLAKE3 hex '{}': {}", hex, e))
}

/// Hex digest of a payload, as stored in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    pub fn of(data: &[u8]) -> Self {
        Self::from(hash_bytes(data))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<Hash> for ContentHash {
    fn from(hash: Hash) -> Self {
        ContentHash(hash_to_hex(&hash))
    }
}

impl FromStr for ContentHash {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let hash = hash_from_hex(s)?;
        Ok(hash.into())
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
