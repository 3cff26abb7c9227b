//! RocksDB-backed catalog with an in-memory mirror.
//!
//! On `open()`, all rows are loaded into memory so hash lookups never hit
//! disk. Writes go through to RocksDB immediately (write-through).

use anyhow::Context;
use cafs_core::{CafsError, CafsResult, FileRecord, NewFileRecord, StorageKind};
use chrono::Utc;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::table::Table;
use crate::Catalog;

const RECORD_PREFIX: &str = "record/";
const NEXT_ID_KEY: &[u8] = b"meta/next_id";

pub struct RocksDbCatalog {
    db: rocksdb::DB,
    mirror: Mutex<Table>,
}

fn record_key(id: u64) -> String {
    // Zero-padded so lexical order matches id order
    format!("{RECORD_PREFIX}{id:020}")
}

fn engine_err(e: rocksdb::Error) -> CafsError {
    CafsError::Catalog(format!("rocksdb: {e}"))
}

impl RocksDbCatalog {
    /// Open or create a RocksDB catalog at the given path.
    pub fn open(db_path: &Path) -> CafsResult<Self> {
        let mut opts = rocksdb::Options::default();
        opts.create_if_missing(true);

        let db = rocksdb::DB::open(&opts, db_path)
            .with_context(|| format!("opening RocksDB: {}", db_path.display()))?;

        let mut table = Table::default();
        for item in db.prefix_iterator(RECORD_PREFIX.as_bytes()) {
            let (key, value) = item.map_err(engine_err)?;
            if !key.starts_with(RECORD_PREFIX.as_bytes()) {
                break;
            }
            match serde_json::from_slice::<FileRecord>(&value) {
                Ok(record) => table.commit(record),
                Err(e) => warn!(key = %String::from_utf8_lossy(&key), "skipping unreadable catalog row: {e}"),
            }
        }

        if let Some(raw) = db.get(NEXT_ID_KEY).map_err(engine_err)? {
            let bytes: [u8; 8] = raw
                .as_slice()
                .try_into()
                .map_err(|_| CafsError::Catalog("malformed next_id".into()))?;
            table.next_id = table.next_id.max(u64::from_be_bytes(bytes));
        }

        Ok(RocksDbCatalog {
            db,
            mirror: Mutex::new(table),
        })
    }

    fn lock(&self) -> CafsResult<MutexGuard<'_, Table>> {
        self.mirror
            .lock()
            .map_err(|_| CafsError::Catalog("catalog lock poisoned".into()))
    }

    fn put_record(&self, record: &FileRecord, next_id: Option<u64>) -> CafsResult<()> {
        let json = serde_json::to_vec(record)
            .map_err(|e| CafsError::Catalog(format!("serializing record {}: {e}", record.id)))?;

        let mut batch = rocksdb::WriteBatch::default();
        batch.put(record_key(record.id).as_bytes(), &json);
        if let Some(next) = next_id {
            batch.put(NEXT_ID_KEY, next.to_be_bytes());
        }
        self.db.write(batch).map_err(engine_err)
    }
}

impl Catalog for RocksDbCatalog {
    fn find_latest_by_hash_and_kind(
        &self,
        content_hash: &str,
        kind: StorageKind,
    ) -> CafsResult<Option<FileRecord>> {
        Ok(self.lock()?.latest(content_hash, kind).cloned())
    }

    fn insert(&self, record: NewFileRecord) -> CafsResult<FileRecord> {
        let mut table = self.lock()?;
        let stored = table.stage(record, Utc::now());

        self.put_record(&stored, Some(stored.id + 1))?;
        table.commit(stored.clone());

        debug!(id = stored.id, hash = %stored.content_hash, "catalog: inserted");
        Ok(stored)
    }

    fn update_path_by_id(&self, id: u64, new_path: &str) -> CafsResult<()> {
        let mut table = self.lock()?;
        let mut updated = table
            .records
            .get(&id)
            .cloned()
            .ok_or_else(|| CafsError::NotFound(format!("file record {id}")))?;
        updated.storage_path = new_path.to_string();

        self.put_record(&updated, None)?;
        table.set_path(id, new_path)?;

        debug!(id, new = %new_path, "catalog: path updated");
        Ok(())
    }

    fn get(&self, id: u64) -> CafsResult<Option<FileRecord>> {
        Ok(self.lock()?.records.get(&id).cloned())
    }

    fn count_by_hash(&self, content_hash: &str, kind: StorageKind) -> CafsResult<usize> {
        Ok(self.lock()?.count(content_hash, kind))
    }

    fn len(&self) -> CafsResult<usize> {
        Ok(self.lock()?.records.len())
    }
}
