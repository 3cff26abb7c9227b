//! Buffered upload payloads.
//!
//! An upload stream can only be read once, but the bytes are needed twice:
//! once for the fingerprint and once for the physical write. The stream is
//! drained into memory and hashed in the same pass.

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::blake3::{ContentHash, READ_BUF_LEN};
use cafs_core::{CafsError, CafsResult};

/// A fully read upload together with its fingerprint
#[derive(Debug, Clone)]
pub struct Payload {
    pub bytes: Bytes,
    pub hash: ContentHash,
}

impl Payload {
    /// Fingerprint bytes that are already in memory.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        let hash = ContentHash::of(&bytes);
        Payload { bytes, hash }
    }

    /// Fingerprint an in-memory body on the blocking pool.
    ///
    /// Hashing large bodies is CPU-bound; this keeps it off the async workers.
    pub async fn from_bytes_blocking(bytes: impl Into<Bytes>) -> CafsResult<Self> {
        let bytes = bytes.into();
        tokio::task::spawn_blocking(move || Payload::from_bytes(bytes))
            .await
            .map_err(|e| CafsError::Other(anyhow::anyhow!("fingerprint task failed: {e}")))
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Drain `reader` to EOF, hashing as it goes.
///
/// Fails with `CafsError::Io` if the stream cannot be fully read.
pub async fn read_payload<R>(mut reader: R) -> CafsResult<Payload>
where
    R: AsyncRead + Unpin,
{
    let mut hasher = blake3::Hasher::new();
    let mut data = BytesMut::new();
    let mut buf = vec![0u8; READ_BUF_LEN];

    loop {
        let n = reader.read(&mut buf).await.map_err(CafsError::Io)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        data.extend_from_slice(&buf[..n]);
    }

    let hash = ContentHash::from(hasher.finalize());
    tracing::trace!(bytes = data.len(), hash = %hash, "payload buffered");

    Ok(Payload {
        bytes: data.freeze(),
        hash,
    })
}
