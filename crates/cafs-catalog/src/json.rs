//! JSON file catalog: whole table in memory, rewritten atomically on change.

use anyhow::Context;
use cafs_core::{CafsError, CafsResult, FileRecord, NewFileRecord, StorageKind};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

use crate::table::Table;
use crate::Catalog;

pub struct JsonCatalog {
    /// Path of the JSON file on disk; `None` keeps the catalog in memory only
    db_path: Option<PathBuf>,
    table: Mutex<Table>,
}

impl JsonCatalog {
    /// Load or create a catalog at the given path.
    /// If the file doesn't exist, starts empty.
    pub fn open(db_path: &Path) -> CafsResult<Self> {
        let table = if db_path.exists() {
            let content = std::fs::read_to_string(db_path)
                .with_context(|| format!("reading catalog: {}", db_path.display()))?;
            serde_json::from_str(&content).map_err(|e| {
                CafsError::Catalog(format!("parsing catalog {}: {e}", db_path.display()))
            })?
        } else {
            Table::default()
        };

        Ok(JsonCatalog {
            db_path: Some(db_path.to_path_buf()),
            table: Mutex::new(table),
        })
    }

    /// A catalog that never touches disk.
    pub fn in_memory() -> Self {
        JsonCatalog {
            db_path: None,
            table: Mutex::new(Table::default()),
        }
    }

    fn lock(&self) -> CafsResult<MutexGuard<'_, Table>> {
        self.table
            .lock()
            .map_err(|_| CafsError::Catalog("catalog lock poisoned".into()))
    }

    /// Write the table to disk using an atomic write (write then rename).
    fn persist(&self, table: &Table) -> CafsResult<()> {
        let Some(db_path) = &self.db_path else {
            return Ok(());
        };

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating catalog dir: {}", parent.display()))?;
        }

        let json = serde_json::to_string_pretty(table)
            .map_err(|e| CafsError::Catalog(format!("serializing catalog: {e}")))?;

        let tmp_path = db_path.with_extension("tmp");
        std::fs::write(&tmp_path, &json)
            .with_context(|| format!("writing catalog temp: {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, db_path)
            .with_context(|| format!("renaming catalog: {}", db_path.display()))?;

        Ok(())
    }
}

impl Catalog for JsonCatalog {
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

        let mut next = table.clone();
        next.commit(stored.clone());
        self.persist(&next)?;
        *table = next;

        debug!(id = stored.id, hash = %stored.content_hash, "catalog: inserted");
        Ok(stored)
    }

    fn update_path_by_id(&self, id: u64, new_path: &str) -> CafsResult<()> {
        let mut table = self.lock()?;
        let old_path = table.set_path(id, new_path)?;

        if let Err(e) = self.persist(&table) {
            table.set_path(id, &old_path)?;
            return Err(e);
        }

        debug!(id, old = %old_path, new = %new_path, "catalog: path updated");
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

#[cfg(test)]
mod tests {
    use super::*;

    fn new(hash: &str, path: &str) -> NewFileRecord {
        NewFileRecord {
            content_hash: hash.into(),
            original_name: "doc.txt".into(),
            extension: ".txt".into(),
            storage_path: path.into(),
            size_bytes: 5,
            kind: StorageKind::Local,
        }
    }

    #[test]
    fn open_nonexistent_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = JsonCatalog::open(&dir.path().join("catalog.json")).unwrap();
        assert!(catalog.is_empty().unwrap());
    }

    #[test]
    fn insert_assigns_increasing_ids() {
        let catalog = JsonCatalog::in_memory();
        let a = catalog.insert(new("h1", "p1")).unwrap();
        let b = catalog.insert(new("h2", "p2")).unwrap();
        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
        assert_eq!(catalog.len().unwrap(), 2);
    }

    #[test]
    fn insert_update_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state/catalog.json");

        let catalog = JsonCatalog::open(&path).unwrap();
        let rec = catalog.insert(new("abc123", "assets/2024/01/02/a.txt")).unwrap();
        catalog
            .update_path_by_id(rec.id, "assets/2024/01/02/b.txt")
            .unwrap();
        drop(catalog);

        let reloaded = JsonCatalog::open(&path).unwrap();
        let entry = reloaded
            .find_latest_by_hash_and_kind("abc123", StorageKind::Local)
            .unwrap()
            .unwrap();
        assert_eq!(entry.id, rec.id);
        assert_eq!(entry.storage_path, "assets/2024/01/02/b.txt");
        assert_eq!(entry.created_at, rec.created_at);
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn ids_are_not_reused_after_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");

        JsonCatalog::open(&path).unwrap().insert(new("h", "p")).unwrap();
        let second = JsonCatalog::open(&path).unwrap().insert(new("h", "q")).unwrap();
        assert_eq!(second.id, 2);
    }

    #[test]
    fn update_missing_id_is_not_found() {
        let catalog = JsonCatalog::in_memory();
        let err = catalog.update_path_by_id(42, "x").unwrap_err();
        assert!(matches!(err, CafsError::NotFound(_)));
    }

    #[test]
    fn update_touches_only_the_path() {
        let catalog = JsonCatalog::in_memory();
        let before = catalog.insert(new("h", "old")).unwrap();
        catalog.update_path_by_id(before.id, "new").unwrap();
        let after = catalog.get(before.id).unwrap().unwrap();
        assert_eq!(
            after,
            FileRecord {
                storage_path: "new".into(),
                ..before
            }
        );
    }

    #[test]
    fn corrupt_file_is_catalog_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = JsonCatalog::open(&path).err().unwrap();
        assert!(matches!(err, CafsError::Catalog(_)));
    }
}
