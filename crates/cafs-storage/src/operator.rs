//! OpenDAL Operator factory for cafs storage backends

use anyhow::{Context, Result};
use cafs_core::config::StorageConfig;
use cafs_core::StorageKind;
use opendal::Operator;
use std::path::Path;

/// Connection settings for the remote (S3-compatible) backend
#[derive(Debug, Clone)]
pub struct S3Config {
    pub endpoint: String,
    pub region: String,
    pub bucket: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

/// Build an operator rooted at the local web root.
///
/// Relative storage paths resolve beneath `web_root`. No retry layer:
/// failed writes surface to the uploader, who resubmits.
pub fn build_local_operator(web_root: &Path) -> Result<Operator> {
    let root = web_root.to_string_lossy();
    let builder = opendal::services::Fs::default().root(&root);

    let op = Operator::new(builder)
        .with_context(|| format!("creating OpenDAL fs operator at {}", web_root.display()))?
        .layer(opendal::layers::LoggingLayer::default())
        .finish();

    Ok(op)
}

/// Build an operator for the remote kind. Writes are retried with jitter.
pub fn build_operator(cfg: &S3Config) -> Result<Operator> {
    let builder = opendal::services::S3::default()
        .endpoint(&cfg.endpoint)
        .region(&cfg.region)
        .bucket(&cfg.bucket)
        .access_key_id(&cfg.access_key_id)
        .secret_access_key(&cfg.secret_access_key);

    let op = Operator::new(builder)
        .with_context(|| format!("creating OpenDAL S3 operator for bucket {}", cfg.bucket))?
        .layer(opendal::layers::LoggingLayer::default())
        .layer(
            opendal::layers::RetryLayer::new()
                .with_max_times(5)
                .with_jitter(),
        )
        .finish();

    Ok(op)
}

/// Build the operator selected by `storage.kind`.
///
/// Credentials are only consulted for the remote kind. If `enforce_tls` is
/// true and the remote endpoint uses HTTP, this returns an error; otherwise a
/// warning is logged for non-HTTPS endpoints.
pub fn build_from_core_config(
    storage: &StorageConfig,
    credentials: Option<(&str, &str)>,
) -> Result<Operator> {
    match storage.kind {
        StorageKind::Local => build_local_operator(&storage.web_root),
        StorageKind::Remote => {
            let (access_key_id, secret_access_key) = credentials
                .context("remote storage selected but no S3 credentials were provided")?;

            if storage.endpoint.starts_with("http://") {
                if storage.enforce_tls {
                    anyhow::bail!(
                        "refusing plaintext remote endpoint {} while storage.enforce_tls is set",
                        storage.endpoint
                    );
                }
                tracing::warn!(
                    endpoint = %storage.endpoint,
                    "S3 endpoint uses plaintext HTTP, credentials are transmitted unencrypted"
                );
            }

            build_operator(&S3Config {
                endpoint: storage.endpoint.clone(),
                region: storage.region.clone(),
                bucket: storage.bucket.clone(),
                access_key_id: access_key_id.to_string(),
                secret_access_key: secret_access_key.to_string(),
            })
        }
    }
}
