use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which backend holds the physical artifact of a catalog row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// Files under the web root of this host
    #[default]
    Local,
    /// S3-compatible object storage
    Remote,
}

impl StorageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKind::Local => "local",
            StorageKind::Remote => "remote",
        }
    }
}

/// One catalog row per logical file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: u64,
    /// BLAKE3 digest of the file content (hex)
    pub content_hash: String,
    pub original_name: String,
    /// Extension including the leading dot, or empty
    pub extension: String,
    /// Relative path of the artifact, forward slashes
    pub storage_path: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
    pub kind: StorageKind,
}

/// A catalog row before the catalog has assigned `id` and `created_at`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFileRecord {
    pub content_hash: String,
    pub original_name: String,
    pub extension: String,
    pub storage_path: String,
    pub size_bytes: u64,
    pub kind: StorageKind,
}

impl NewFileRecord {
    pub fn into_record(self, id: u64, created_at: DateTime<Utc>) -> FileRecord {
        FileRecord {
            id,
            content_hash: self.content_hash,
            original_name: self.original_name,
            extension: self.extension,
            storage_path: self.storage_path,
            size_bytes: self.size_bytes,
            created_at,
            kind: self.kind,
        }
    }
}

/// Which branch the dedup resolver took for an upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UploadOutcome {
    /// Matching content already on disk; nothing written
    Reuse,
    /// No matching row; new file written and row inserted
    StoreNew,
    /// Matching row whose file was gone; new file written, row path updated
    RewriteStale,
}

impl UploadOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadOutcome::Reuse => "reuse",
            UploadOutcome::StoreNew => "store_new",
            UploadOutcome::RewriteStale => "rewrite_stale",
        }
    }
}

/// What an uploader gets back
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub id: u64,
    /// `file_<correlation key>`, echoed so batch callers can match results
    pub key: String,
    /// Relative storage path
    pub path: String,
    /// Externally addressable URL
    pub url: String,
}

/// Label echoed back for a caller-supplied correlation key.
pub fn correlation_label(key: u64) -> String {
    format!("file_{key}")
}
