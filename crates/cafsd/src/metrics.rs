//! Prometheus metrics for the upload path
//!
//! Endpoints (mounted by `server`):
//!   GET /metrics  Prometheus text format

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use prometheus_client::{
    encoding::text::encode,
    metrics::{counter::Counter, family::Family},
    registry::Registry,
};
use std::sync::Arc;

use cafs_core::{ErrorKind, UploadOutcome};

#[derive(Clone, Default)]
pub struct UploadMetrics {
    uploads: Family<Vec<(String, String)>, Counter>,
    failures: Family<Vec<(String, String)>, Counter>,
    bytes_written: Counter,
}

impl UploadMetrics {
    pub fn new(registry: &mut Registry) -> Self {
        let metrics = UploadMetrics::default();

        registry.register(
            "cafs_uploads",
            "Completed uploads by dedup outcome",
            metrics.uploads.clone(),
        );
        registry.register(
            "cafs_upload_failures",
            "Failed uploads by error kind",
            metrics.failures.clone(),
        );
        registry.register(
            "cafs_bytes_written",
            "Payload bytes written to storage",
            metrics.bytes_written.clone(),
        );

        metrics
    }

    pub fn record_success(&self, outcome: UploadOutcome, bytes_written: u64) {
        self.uploads
            .get_or_create(&vec![("outcome".to_string(), outcome.as_str().to_string())])
            .inc();
        self.bytes_written.inc_by(bytes_written);
    }

    pub fn record_failure(&self, kind: ErrorKind) {
        self.failures
            .get_or_create(&vec![("kind".to_string(), kind.as_str().to_string())])
            .inc();
    }
}

pub async fn metrics_handler(State(registry): State<Arc<Registry>>) -> impl IntoResponse {
    let mut body = String::new();
    match encode(&mut body, &registry) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            body,
        ),
        Err(e) => {
            tracing::error!("metrics encode failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                e.to_string(),
            )
        }
    }
}
