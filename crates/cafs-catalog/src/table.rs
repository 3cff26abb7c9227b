//! In-memory row set shared by every backend.

use cafs_core::{CafsError, CafsResult, FileRecord, NewFileRecord, StorageKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Table {
    /// Next id to hand out; ids are never reused
    pub next_id: u64,
    pub records: BTreeMap<u64, FileRecord>,
}

impl Default for Table {
    fn default() -> Self {
        Self {
            next_id: 1,
            records: BTreeMap::new(),
        }
    }
}

impl Table {
    pub fn latest(&self, content_hash: &str, kind: StorageKind) -> Option<&FileRecord> {
        self.records
            .values()
            .filter(|r| r.kind == kind && r.content_hash == content_hash)
            .max_by_key(|r| (r.created_at, r.id))
    }

    pub fn count(&self, content_hash: &str, kind: StorageKind) -> usize {
        self.records
            .values()
            .filter(|r| r.kind == kind && r.content_hash == content_hash)
            .count()
    }

    /// Build the row `insert` would store, without storing it.
    pub fn stage(&self, record: NewFileRecord, created_at: DateTime<Utc>) -> FileRecord {
        record.into_record(self.next_id, created_at)
    }

    pub fn commit(&mut self, record: FileRecord) {
        self.next_id = self.next_id.max(record.id + 1);
        self.records.insert(record.id, record);
    }

    /// Swap in a new path, returning the old one.
    pub fn set_path(&mut self, id: u64, new_path: &str) -> CafsResult<String> {
        let record = self
            .records
            .get_mut(&id)
            .ok_or_else(|| CafsError::NotFound(format!("file record {id}")))?;
        Ok(std::mem::replace(&mut record.storage_path, new_path.to_string()))
    }
}
