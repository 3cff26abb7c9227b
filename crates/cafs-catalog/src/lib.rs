//! cafs-catalog: metadata catalog of stored files, queryable by content hash.
//!
//! Two backends are available:
//!   - **JSON** (default): loads entirely into memory, flushed atomically via
//!     temp+rename after every mutation.
//!   - **RocksDB** (behind the `rocksdb` feature): write-through to RocksDB
//!     with an in-memory mirror.
//!
//! Both implement [`Catalog`], so the upload path can use either
//! transparently. No uniqueness is enforced on the content hash; lookups
//! return the most recently created match.

pub mod backend;
pub mod json;
#[cfg(feature = "rocksdb")]
pub mod rocks;
mod table;

use cafs_core::{CafsResult, FileRecord, NewFileRecord, StorageKind};

pub use backend::CatalogBackend;
pub use json::JsonCatalog;
#[cfg(feature = "rocksdb")]
pub use rocks::RocksDbCatalog;

/// Repository contract the dedup resolver depends on.
pub trait Catalog: Send + Sync {
    /// Newest record (by `created_at`, then id) with this hash and kind.
    fn find_latest_by_hash_and_kind(
        &self,
        content_hash: &str,
        kind: StorageKind,
    ) -> CafsResult<Option<FileRecord>>;

    /// Assign an id and creation time, persist, and return the stored row.
    fn insert(&self, record: NewFileRecord) -> CafsResult<FileRecord>;

    /// Replace the storage path of exactly one row.
    ///
    /// Fails with `CafsError::NotFound` if no row has this id.
    fn update_path_by_id(&self, id: u64, new_path: &str) -> CafsResult<()>;

    fn get(&self, id: u64) -> CafsResult<Option<FileRecord>>;

    /// Number of rows sharing a hash and kind.
    fn count_by_hash(&self, content_hash: &str, kind: StorageKind) -> CafsResult<usize>;

    /// Total number of rows
    fn len(&self) -> CafsResult<usize>;

    fn is_empty(&self) -> CafsResult<bool> {
        Ok(self.len()? == 0)
    }
}
