//! Integration tests: upload → reuse → out-of-band delete → self-heal
//!
//! Uses a local OpenDAL `Fs` operator rooted in a temp dir so that files can
//! be removed behind the catalog's back.

use cafs_catalog::{Catalog, JsonCatalog};
use cafs_core::{
    CafsConfig, CafsError, CafsResult, ErrorKind, FileRecord, NewFileRecord, StorageKind,
    UploadOutcome,
};
use cafs_fingerprint::ContentHash;
use cafs_storage::FileStore;
use cafs_upload::{FixedOrigin, UploadService};
use chrono::{NaiveDate, Utc};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread::ThreadId;
use tempfile::TempDir;

const ORIGIN: &str = "http://localhost:8080";

fn jan_second() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()
}

fn service(web_root: &Path) -> UploadService {
    let op = cafs_storage::build_local_operator(web_root).expect("local operator");
    UploadService::new(
        Arc::new(JsonCatalog::in_memory()),
        FileStore::new(op, StorageKind::Local),
        Arc::new(CafsConfig::default()),
    )
    .with_clock(jan_second)
}

fn hash_of(data: &[u8]) -> String {
    ContentHash::of(data).to_string()
}

fn count_files(dir: &Path) -> usize {
    if !dir.exists() {
        return 0;
    }
    std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .map(|p| if p.is_dir() { count_files(&p) } else { 1 })
        .sum()
}

#[tokio::test]
async fn worked_example_store_reuse_heal() {
    let tmp = TempDir::new().unwrap();
    let svc = service(tmp.path());
    let origin = FixedOrigin(ORIGIN.into());
    let h1 = hash_of(b"abc");

    // Store
    let first = svc.upload(&b"abc"[..], "abc.txt", 0, &origin).await.unwrap();
    assert_eq!(first.outcome, UploadOutcome::StoreNew);
    assert_eq!(first.receipt.id, 1);
    assert!(first.receipt.path.starts_with("assets/2024/01/02/"));
    assert!(first.receipt.path.ends_with(".txt"));
    assert_eq!(first.receipt.url, format!("{ORIGIN}/{}", first.receipt.path));

    // Reuse
    let second = svc.upload(&b"abc"[..], "other-name.txt", 1, &origin).await.unwrap();
    assert_eq!(second.outcome, UploadOutcome::Reuse);
    assert_eq!(second.receipt.id, 1);
    assert_eq!(second.receipt.path, first.receipt.path);
    assert_eq!(second.bytes_written, 0);
    assert_eq!(svc.catalog().count_by_hash(&h1, StorageKind::Local).unwrap(), 1);

    // Out-of-band delete, then heal
    std::fs::remove_file(tmp.path().join(&first.receipt.path)).unwrap();
    let third = svc.upload(&b"abc"[..], "abc.txt", 2, &origin).await.unwrap();
    assert_eq!(third.outcome, UploadOutcome::RewriteStale);
    assert_eq!(third.receipt.id, 1);
    assert_ne!(third.receipt.path, first.receipt.path);
    assert!(third.receipt.path.starts_with("assets/2024/01/02/"));
    assert!(tmp.path().join(&third.receipt.path).exists());
    assert_eq!(svc.catalog().count_by_hash(&h1, StorageKind::Local).unwrap(), 1);

    let row = svc.catalog().get(1).unwrap().unwrap();
    assert_eq!(row.storage_path, third.receipt.path);
    assert_eq!(row.original_name, "abc.txt");
}

#[tokio::test]
async fn heal_keeps_every_field_but_the_path() {
    let tmp = TempDir::new().unwrap();
    let svc = service(tmp.path());
    let origin = FixedOrigin(ORIGIN.into());

    let first = svc.upload(&b"payload"[..], "a.md", 0, &origin).await.unwrap();
    let before = svc.catalog().get(first.receipt.id).unwrap().unwrap();

    std::fs::remove_file(tmp.path().join(&first.receipt.path)).unwrap();
    svc.upload(&b"payload"[..], "renamed.bin", 0, &origin).await.unwrap();

    let after = svc.catalog().get(first.receipt.id).unwrap().unwrap();
    assert_ne!(after.storage_path, before.storage_path);
    assert_eq!(after.original_name, before.original_name);
    assert_eq!(after.extension, before.extension);
    assert_eq!(after.created_at, before.created_at);
    assert_eq!(after.size_bytes, before.size_bytes);
    assert_eq!(after.content_hash, before.content_hash);
}

#[tokio::test]
async fn empty_payload_creates_nothing() {
    let tmp = TempDir::new().unwrap();
    let svc = service(tmp.path());
    let origin = FixedOrigin(ORIGIN.into());

    let err = svc.upload(&b""[..], "empty.txt", 0, &origin).await.unwrap_err();
    assert!(matches!(err, CafsError::Validation(ref m) if m == "empty payload"));
    assert!(svc.catalog().is_empty().unwrap());
    assert_eq!(count_files(tmp.path()), 0);
}

#[tokio::test]
async fn different_content_same_day_shares_partition() {
    let tmp = TempDir::new().unwrap();
    let svc = service(tmp.path());
    let origin = FixedOrigin(ORIGIN.into());

    let a = svc.upload(&b"one"[..], "1.txt", 0, &origin).await.unwrap();
    let b = svc.upload(&b"two"[..], "2.txt", 0, &origin).await.unwrap();
    assert_eq!(a.outcome, UploadOutcome::StoreNew);
    assert_eq!(b.outcome, UploadOutcome::StoreNew);
    assert_ne!(a.receipt.id, b.receipt.id);
    assert_eq!(count_files(&tmp.path().join("assets/2024/01/02")), 2);
}

#[tokio::test]
async fn concurrent_uploads_on_one_partition_all_succeed() {
    let tmp = TempDir::new().unwrap();
    let svc = Arc::new(service(tmp.path()));

    let handles: Vec<_> = (0..12u64)
        .map(|i| {
            let svc = svc.clone();
            tokio::spawn(async move {
                let origin = FixedOrigin(ORIGIN.into());
                let body = format!("distinct content {i}").into_bytes();
                svc.upload(&body[..], "f.txt", i, &origin).await
            })
        })
        .collect();

    for (i, h) in handles.into_iter().enumerate() {
        let report = h.await.unwrap().unwrap();
        assert_eq!(report.receipt.key, format!("file_{i}"));
    }
    assert_eq!(svc.catalog().len().unwrap(), 12);
}

#[tokio::test]
async fn correlation_key_is_echoed() {
    let tmp = TempDir::new().unwrap();
    let svc = service(tmp.path());
    let origin = FixedOrigin(ORIGIN.into());

    for k in [0u64, 1, 7, 1_000_000, u64::MAX] {
        let report = svc.upload(&b"same"[..], "s.txt", k, &origin).await.unwrap();
        assert_eq!(report.receipt.key, format!("file_{k}"));
    }
}

#[tokio::test]
async fn newest_duplicate_row_is_canonical() {
    let tmp = TempDir::new().unwrap();
    let catalog = Arc::new(JsonCatalog::in_memory());
    let op = cafs_storage::build_local_operator(tmp.path()).unwrap();
    let svc = UploadService::new(
        catalog.clone(),
        FileStore::new(op, StorageKind::Local),
        Arc::new(CafsConfig::default()),
    )
    .with_clock(jan_second);
    let origin = FixedOrigin(ORIGIN.into());
    let hash = hash_of(b"dup");

    // Simulate the accepted race: two rows for the same content
    let older = svc.upload(&b"dup"[..], "d.txt", 0, &origin).await.unwrap();
    let newer = catalog
        .insert(NewFileRecord {
            content_hash: hash.clone(),
            original_name: "d.txt".into(),
            extension: ".txt".into(),
            storage_path: "assets/2024/01/02/second-copy.txt".into(),
            size_bytes: 3,
            kind: StorageKind::Local,
        })
        .unwrap();
    std::fs::write(tmp.path().join(&newer.storage_path), b"dup").unwrap();

    let report = svc.upload(&b"dup"[..], "d.txt", 0, &origin).await.unwrap();
    assert_eq!(report.outcome, UploadOutcome::Reuse);
    assert_eq!(report.receipt.id, newer.id);
    assert_ne!(report.receipt.id, older.receipt.id);
    // Older duplicate is never purged
    assert_eq!(catalog.count_by_hash(&hash, StorageKind::Local).unwrap(), 2);
}

#[tokio::test]
async fn remote_kind_rows_do_not_satisfy_local_uploads() {
    let tmp = TempDir::new().unwrap();
    let catalog = Arc::new(JsonCatalog::in_memory());
    catalog
        .insert(NewFileRecord {
            content_hash: hash_of(b"xyz"),
            original_name: "x.txt".into(),
            extension: ".txt".into(),
            storage_path: "assets/2024/01/02/remote.txt".into(),
            size_bytes: 3,
            kind: StorageKind::Remote,
        })
        .unwrap();

    let op = cafs_storage::build_local_operator(tmp.path()).unwrap();
    let svc = UploadService::new(
        catalog.clone(),
        FileStore::new(op, StorageKind::Local),
        Arc::new(CafsConfig::default()),
    );
    let report = svc
        .upload(&b"xyz"[..], "x.txt", 0, &FixedOrigin(ORIGIN.into()))
        .await
        .unwrap();
    assert_eq!(report.outcome, UploadOutcome::StoreNew);
    assert_eq!(catalog.len().unwrap(), 2);
}

#[tokio::test]
async fn memory_backend_as_remote_kind() {
    let op = opendal::Operator::new(opendal::services::Memory::default())
        .unwrap()
        .finish();
    let svc = UploadService::new(
        Arc::new(JsonCatalog::in_memory()),
        FileStore::new(op.clone(), StorageKind::Remote),
        Arc::new(CafsConfig::default()),
    );
    let origin = FixedOrigin("https://cdn.example.com".into());

    let first = svc.upload(&b"blob"[..], "b.bin", 0, &origin).await.unwrap();
    let again = svc.upload(&b"blob"[..], "b.bin", 0, &origin).await.unwrap();
    assert_eq!(again.outcome, UploadOutcome::Reuse);

    op.delete(&first.receipt.path).await.unwrap();
    let healed = svc.upload(&b"blob"[..], "b.bin", 0, &origin).await.unwrap();
    assert_eq!(healed.outcome, UploadOutcome::RewriteStale);
    assert_eq!(healed.receipt.id, first.receipt.id);
    let stored = op.read(&healed.receipt.path).await.unwrap();
    assert_eq!(stored.to_bytes(), bytes::Bytes::from_static(b"blob"));
}

/// Returns one stale row for every lookup, but the row is gone by the time
/// the path update arrives. Records which threads served each call.
struct RowDeletedMidUpload {
    stale: FileRecord,
    threads: Mutex<Vec<ThreadId>>,
}

impl RowDeletedMidUpload {
    fn new(content: &[u8]) -> Self {
        RowDeletedMidUpload {
            stale: NewFileRecord {
                content_hash: hash_of(content),
                original_name: "gone.txt".into(),
                extension: ".txt".into(),
                storage_path: "assets/2024/01/01/deleted-out-of-band.txt".into(),
                size_bytes: content.len() as u64,
                kind: StorageKind::Local,
            }
            .into_record(41, Utc::now()),
            threads: Mutex::new(Vec::new()),
        }
    }

    fn served_on(&self) {
        self.threads.lock().unwrap().push(std::thread::current().id());
    }
}

impl Catalog for RowDeletedMidUpload {
    fn find_latest_by_hash_and_kind(
        &self,
        content_hash: &str,
        kind: StorageKind,
    ) -> CafsResult<Option<FileRecord>> {
        self.served_on();
        Ok((content_hash == self.stale.content_hash && kind == self.stale.kind)
            .then(|| self.stale.clone()))
    }

    fn insert(&self, _record: NewFileRecord) -> CafsResult<FileRecord> {
        self.served_on();
        Err(CafsError::Catalog("insert not expected".into()))
    }

    fn update_path_by_id(&self, id: u64, _new_path: &str) -> CafsResult<()> {
        self.served_on();
        Err(CafsError::NotFound(format!("record {id}")))
    }

    fn get(&self, _id: u64) -> CafsResult<Option<FileRecord>> {
        Ok(None)
    }

    fn count_by_hash(&self, _content_hash: &str, _kind: StorageKind) -> CafsResult<usize> {
        Ok(0)
    }

    fn len(&self) -> CafsResult<usize> {
        Ok(0)
    }
}

fn stub_service(web_root: &Path, catalog: Arc<RowDeletedMidUpload>) -> UploadService {
    let op = cafs_storage::build_local_operator(web_root).unwrap();
    UploadService::new(
        catalog,
        FileStore::new(op, StorageKind::Local),
        Arc::new(CafsConfig::default()),
    )
    .with_clock(jan_second)
}

#[tokio::test]
async fn heal_fails_with_not_found_when_row_vanished() {
    let tmp = TempDir::new().unwrap();
    let catalog = Arc::new(RowDeletedMidUpload::new(b"orphan"));
    let svc = stub_service(tmp.path(), catalog.clone());

    let err = svc
        .upload(&b"orphan"[..], "orphan.txt", 0, &FixedOrigin(ORIGIN.into()))
        .await
        .unwrap_err();
    assert!(matches!(err, CafsError::NotFound(_)), "{err}");
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(err.kind().as_str(), "not_found");
    // lookup, then the failed path update
    assert_eq!(catalog.threads.lock().unwrap().len(), 2);
}

#[tokio::test(flavor = "current_thread")]
async fn catalog_calls_leave_the_runtime_thread() {
    let tmp = TempDir::new().unwrap();
    let catalog = Arc::new(RowDeletedMidUpload::new(b"elsewhere"));
    let svc = stub_service(tmp.path(), catalog.clone());
    let runtime_thread = std::thread::current().id();

    // Unrelated content: lookup misses, insert is attempted.
    let err = svc
        .upload(&b"fresh"[..], "fresh.txt", 0, &FixedOrigin(ORIGIN.into()))
        .await
        .unwrap_err();
    assert!(matches!(err, CafsError::Catalog(_)), "{err}");

    let threads = catalog.threads.lock().unwrap();
    assert_eq!(threads.len(), 2);
    assert!(threads.iter().all(|t| *t != runtime_thread));
}
