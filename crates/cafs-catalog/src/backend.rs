use cafs_core::{CafsResult, FileRecord, NewFileRecord, StorageKind};
use std::path::Path;

use crate::json::JsonCatalog;
#[cfg(feature = "rocksdb")]
use crate::rocks::RocksDbCatalog;
use crate::Catalog;

/// Dispatch enum that wraps either a JSON or RocksDB catalog.
///
/// Used by `cafsd` to select the backend at runtime from the configured path.
pub enum CatalogBackend {
    Json(JsonCatalog),
    #[cfg(feature = "rocksdb")]
    Rocks(RocksDbCatalog),
}

impl CatalogBackend {
    /// Open the appropriate backend based on path extension.
    ///
    /// Paths ending in `.json` use the JSON backend; otherwise RocksDB (if
    /// compiled with the `rocksdb` feature).
    pub fn open(db_path: &Path) -> CafsResult<Self> {
        let is_json = db_path
            .extension()
            .map(|ext| ext == "json")
            .unwrap_or(false);

        #[cfg(feature = "rocksdb")]
        if !is_json {
            return Ok(CatalogBackend::Rocks(RocksDbCatalog::open(db_path)?));
        }

        #[cfg(not(feature = "rocksdb"))]
        if !is_json {
            tracing::warn!(
                path = %db_path.display(),
                "RocksDB not compiled in (missing 'rocksdb' feature), falling back to JSON backend"
            );
        }

        Ok(CatalogBackend::Json(JsonCatalog::open(db_path)?))
    }

    pub fn name(&self) -> &'static str {
        match self {
            CatalogBackend::Json(_) => "json",
            #[cfg(feature = "rocksdb")]
            CatalogBackend::Rocks(_) => "rocksdb",
        }
    }
}

impl Catalog for CatalogBackend {
    fn find_latest_by_hash_and_kind(
        &self,
        content_hash: &str,
        kind: StorageKind,
    ) -> CafsResult<Option<FileRecord>> {
        match self {
            CatalogBackend::Json(c) => c.find_latest_by_hash_and_kind(content_hash, kind),
            #[cfg(feature = "rocksdb")]
            CatalogBackend::Rocks(c) => c.find_latest_by_hash_and_kind(content_hash, kind),
        }
    }
    fn insert(&self, record: NewFileRecord) -> CafsResult<FileRecord> {
        match self {
            CatalogBackend::Json(c) => c.insert(record),
            #[cfg(feature = "rocksdb")]
            CatalogBackend::Rocks(c) => c.insert(record),
        }
    }
    fn update_path_by_id(&self, id: u64, new_path: &str) -> CafsResult<()> {
        match self {
            CatalogBackend::Json(c) => c.update_path_by_id(id, new_path),
            #[cfg(feature = "rocksdb")]
            CatalogBackend::Rocks(c) => c.update_path_by_id(id, new_path),
        }
    }
    fn get(&self, id: u64) -> CafsResult<Option<FileRecord>> {
        match self {
            CatalogBackend::Json(c) => c.get(id),
            #[cfg(feature = "rocksdb")]
            CatalogBackend::Rocks(c) => c.get(id),
        }
    }
    fn count_by_hash(&self, content_hash: &str, kind: StorageKind) -> CafsResult<usize> {
        match self {
            CatalogBackend::Json(c) => c.count_by_hash(content_hash, kind),
            #[cfg(feature = "rocksdb")]
            CatalogBackend::Rocks(c) => c.count_by_hash(content_hash, kind),
        }
    }
    fn len(&self) -> CafsResult<usize> {
        match self {
            CatalogBackend::Json(c) => c.len(),
            #[cfg(feature = "rocksdb")]
            CatalogBackend::Rocks(c) => c.len(),
        }
    }
}
