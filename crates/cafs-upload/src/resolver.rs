//! Dedup resolver: decides per upload whether to reuse, store, or heal.
//!
//! ```text
//! START → HASHED → LOOKED_UP → { REUSE | STORE_NEW | REWRITE_STALE } → RESPONDED
//! ```
//!
//! Catalog calls may block on file or RocksDB IO and run on the blocking
//! pool. No lock is held between the catalog lookup and the write. Two concurrent
//! uploads of identical content may both store a new copy; the newest row
//! wins later lookups and the older one is left in place.

use chrono::NaiveDate;
use std::sync::Arc;
use tokio::io::AsyncRead;
use tracing::{debug, info, warn};

use cafs_catalog::Catalog;
use cafs_core::config::STORE_DIR_KEY;
use cafs_core::{
    correlation_label, CafsError, CafsResult, ConfigProvider, FileRecord, NewFileRecord,
    UploadOutcome, UploadReceipt,
};
use cafs_fingerprint::{read_payload, Payload};
use cafs_storage::{allocate_path, declared_extension, FileStore};

use crate::locator::build_locator;
use crate::origin::OriginResolver;

/// Result of a single upload
#[derive(Debug, Clone)]
pub struct UploadReport {
    pub receipt: UploadReceipt,
    pub outcome: UploadOutcome,
    pub content_hash: String,
    /// Bytes physically written (0 on reuse)
    pub bytes_written: u64,
}

pub struct UploadService {
    catalog: Arc<dyn Catalog>,
    store: FileStore,
    config: Arc<dyn ConfigProvider>,
    today: fn() -> NaiveDate,
}

fn local_today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

impl UploadService {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        store: FileStore,
        config: Arc<dyn ConfigProvider>,
    ) -> Self {
        Self {
            catalog,
            store,
            config,
            today: local_today,
        }
    }

    /// Override the date used for path partitions.
    pub fn with_clock(mut self, today: fn() -> NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn catalog(&self) -> &Arc<dyn Catalog> {
        &self.catalog
    }

    pub fn store(&self) -> &FileStore {
        &self.store
    }

    /// Read an upload stream to the end and store it.
    pub async fn upload<R>(
        &self,
        reader: R,
        original_name: &str,
        key: u64,
        origin: &dyn OriginResolver,
    ) -> CafsResult<UploadReport>
    where
        R: AsyncRead + Unpin,
    {
        let payload = read_payload(reader).await?;
        self.upload_payload(payload, original_name, key, origin).await
    }

    /// Store an already buffered and fingerprinted payload.
    pub async fn upload_payload(
        &self,
        payload: Payload,
        original_name: &str,
        key: u64,
        origin: &dyn OriginResolver,
    ) -> CafsResult<UploadReport> {
        if payload.is_empty() {
            return Err(CafsError::Validation("empty payload".into()));
        }

        let hash = payload.hash.to_string();
        let kind = self.store.kind();
        let existing = {
            let hash = hash.clone();
            self.with_catalog(move |c| c.find_latest_by_hash_and_kind(&hash, kind))
                .await?
        };

        if let Some(record) = &existing {
            if self.store.exists(&record.storage_path).await? {
                debug!(id = record.id, hash = %hash, path = %record.storage_path, "dedup: reuse");
                return Ok(self.respond(
                    record.id,
                    &record.storage_path,
                    key,
                    origin,
                    hash,
                    UploadOutcome::Reuse,
                    0,
                ));
            }
            warn!(
                id = record.id,
                hash = %hash,
                path = %record.storage_path,
                "dedup: catalog row points at a missing file, rewriting"
            );
        }

        // Always a fresh path, even when healing: the stale slot may be
        // recreated by someone else.
        let root = self
            .config
            .get(STORE_DIR_KEY)
            .ok_or_else(|| CafsError::Config(format!("missing {STORE_DIR_KEY}")))?;
        let path = allocate_path(&root, original_name, (self.today)());
        let size = payload.len();
        let written = self.store.write(payload.bytes, &path).await?;

        let (id, outcome) = match existing {
            None => {
                let record = NewFileRecord {
                    content_hash: hash.clone(),
                    original_name: original_name.to_string(),
                    extension: declared_extension(original_name),
                    storage_path: path.clone(),
                    size_bytes: size,
                    kind,
                };
                let stored = self.with_catalog(move |c| c.insert(record)).await?;
                (stored.id, UploadOutcome::StoreNew)
            }
            Some(FileRecord { id, .. }) => {
                let new_path = path.clone();
                self.with_catalog(move |c| c.update_path_by_id(id, &new_path))
                    .await?;
                (id, UploadOutcome::RewriteStale)
            }
        };

        info!(
            id,
            hash = %hash,
            path = %path,
            bytes = written,
            outcome = outcome.as_str(),
            "upload stored"
        );

        Ok(self.respond(id, &path, key, origin, hash, outcome, written))
    }

    /// Run a catalog call on the blocking pool.
    async fn with_catalog<T, F>(&self, f: F) -> CafsResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn Catalog) -> CafsResult<T> + Send + 'static,
    {
        let catalog = Arc::clone(&self.catalog);
        tokio::task::spawn_blocking(move || f(catalog.as_ref()))
            .await
            .map_err(|e| CafsError::Catalog(format!("catalog task failed: {e}")))?
    }

    #[allow(clippy::too_many_arguments)]
    fn respond(
        &self,
        id: u64,
        path: &str,
        key: u64,
        origin: &dyn OriginResolver,
        content_hash: String,
        outcome: UploadOutcome,
        bytes_written: u64,
    ) -> UploadReport {
        UploadReport {
            receipt: UploadReceipt {
                id,
                key: correlation_label(key),
                path: path.to_string(),
                url: build_locator(&origin.origin(), path),
            },
            outcome,
            content_hash,
            bytes_written,
        }
    }
}
