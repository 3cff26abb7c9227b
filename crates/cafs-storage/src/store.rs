//! Physical artifact store: existence checks, partition creation, writes.

use bytes::Bytes;
use cafs_core::{CafsError, CafsResult, StorageKind};
use opendal::Operator;
use tracing::debug;

use crate::layout::partition_dir;

/// Storage backend authoritative over every catalog `storage_path`.
#[derive(Clone, Debug)]
pub struct FileStore {
    op: Operator,
    kind: StorageKind,
}

impl FileStore {
    pub fn new(op: Operator, kind: StorageKind) -> Self {
        Self { op, kind }
    }

    pub fn kind(&self) -> StorageKind {
        self.kind
    }

    pub fn operator(&self) -> &Operator {
        &self.op
    }

    /// Whether an artifact is present at `path`.
    pub async fn exists(&self, path: &str) -> CafsResult<bool> {
        self.op.exists(path).await.map_err(into_io)
    }

    /// Create `dir` and all its parents. Already existing is not an error.
    pub async fn ensure_dir(&self, dir: &str) -> CafsResult<()> {
        let dir = if dir.ends_with('/') {
            dir.to_string()
        } else {
            format!("{dir}/")
        };

        match self.op.create_dir(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == opendal::ErrorKind::AlreadyExists => Ok(()),
            Err(e) => Err(into_io(e)),
        }
    }

    /// Write the whole payload to `path`, creating its partition first.
    ///
    /// Empty payloads are rejected before anything touches the backend.
    /// A failed write is not cleaned up.
    pub async fn write(&self, bytes: Bytes, path: &str) -> CafsResult<u64> {
        if bytes.is_empty() {
            return Err(CafsError::Validation("empty payload".into()));
        }

        if let Some(dir) = partition_dir(path) {
            if self.op.info().full_capability().create_dir {
                self.ensure_dir(&dir).await?;
            }
        }

        let len = bytes.len() as u64;
        self.op.write(path, bytes).await.map_err(into_io)?;
        debug!(path = %path, bytes = len, "artifact written");

        Ok(len)
    }
}

/// Map an OpenDAL failure onto the I/O error class.
fn into_io(e: opendal::Error) -> CafsError {
    let kind = match e.kind() {
        opendal::ErrorKind::NotFound => std::io::ErrorKind::NotFound,
        opendal::ErrorKind::PermissionDenied => std::io::ErrorKind::PermissionDenied,
        opendal::ErrorKind::AlreadyExists => std::io::ErrorKind::AlreadyExists,
        _ => std::io::ErrorKind::Other,
    };
    CafsError::Io(std::io::Error::new(kind, e))
}
