use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::types::StorageKind;

/// Key under which the storage root directory is looked up
pub const STORE_DIR_KEY: &str = "storage.store_dir";

/// Top-level configuration (loaded from cafs.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CafsConfig {
    pub daemon: DaemonConfig,
    pub storage: StorageConfig,
    pub catalog: CatalogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// HTTP listen address (default: 127.0.0.1:8080)
    pub listen: String,
    /// Serve Prometheus text on /metrics
    pub metrics_enabled: bool,
    /// Largest accepted upload body in bytes
    pub max_upload_bytes: usize,
    /// Log level (default: info)
    pub log_level: String,
    /// Log format: "json" or "text"
    pub log_format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend holding uploaded files
    pub kind: StorageKind,
    /// Directory that relative storage paths resolve against (local kind)
    pub web_root: PathBuf,
    /// First segment of every allocated path, e.g. "assets"
    pub store_dir: String,
    /// Fixed scheme+host for locators; when unset the request origin is used
    pub public_origin: Option<String>,
    /// S3 endpoint (remote kind)
    pub endpoint: String,
    /// S3 region (default: us-east-1)
    pub region: String,
    /// S3 bucket (remote kind)
    pub bucket: String,
    /// Enforce HTTPS for S3 connections (warn/error on HTTP endpoints)
    pub enforce_tls: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Catalog location. `.json` selects the JSON backend, anything else RocksDB
    pub path: PathBuf,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:8080".into(),
            metrics_enabled: true,
            max_upload_bytes: 64 * 1024 * 1024,
            log_level: "info".into(),
            log_format: "json".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            kind: StorageKind::Local,
            web_root: PathBuf::from("wwwroot"),
            store_dir: "assets".into(),
            public_origin: None,
            endpoint: "http://localhost:8333".into(),
            region: "us-east-1".into(),
            bucket: "cafs".into(),
            enforce_tls: false,
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("~/.local/share/cafs/catalog.json"),
        }
    }
}

/// Read-only key lookup into configuration.
///
/// Keys are dotted `section.field` names.
pub trait ConfigProvider: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
}

impl ConfigProvider for CafsConfig {
    fn get(&self, key: &str) -> Option<String> {
        match key {
            STORE_DIR_KEY => Some(self.storage.store_dir.clone()),
            "storage.kind" => Some(self.storage.kind.as_str().to_string()),
            "storage.web_root" => Some(self.storage.web_root.to_string_lossy().into_owned()),
            "storage.public_origin" => self.storage.public_origin.clone(),
            "storage.endpoint" => Some(self.storage.endpoint.clone()),
            "storage.bucket" => Some(self.storage.bucket.clone()),
            "catalog.path" => Some(self.catalog.path.to_string_lossy().into_owned()),
            "daemon.listen" => Some(self.daemon.listen.clone()),
            _ => None,
        }
    }
}

impl ConfigProvider for std::collections::HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        std::collections::HashMap::get(self, key).cloned()
    }
}

/// Expand a leading `~/` using `$HOME`.
pub fn expand_tilde(path: &std::path::Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match std::env::var_os("HOME") {
            Some(home) => PathBuf::from(home).join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}
