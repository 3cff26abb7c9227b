//! HTTP surface
//!
//! Endpoints:
//!   POST /cms/file?name=<file name>&key=<n>  raw payload body, JSON receipt
//!   GET  /{store_dir}/...                    stored files (local kind)
//!   GET  /healthz                            liveness
//!   GET  /readyz                             storage reachable
//!   GET  /metrics                            Prometheus text

use axum::{
    extract::{DefaultBodyLimit, Query, State},
    http::{header, HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use prometheus_client::registry::Registry;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::{services::ServeDir, trace::TraceLayer};

use cafs_core::{CafsError, UploadReceipt};
use cafs_fingerprint::Payload;
use cafs_upload::{FixedOrigin, OriginResolver, RequestOrigin, UploadService};

use crate::metrics::{metrics_handler, UploadMetrics};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<UploadService>,
    pub metrics: UploadMetrics,
    /// Overrides the request origin in locators when set
    pub public_origin: Option<String>,
}

/// Where `GET /{store_dir}/...` reads from; `None` for remote storage.
pub struct StaticFiles {
    pub web_root: PathBuf,
    pub store_dir: String,
}

pub fn router(
    state: AppState,
    registry: Option<Arc<Registry>>,
    static_files: Option<StaticFiles>,
    max_upload_bytes: usize,
) -> Router {
    let mut app = Router::new()
        .route("/cms/file", post(upload_handler))
        .route("/healthz", get(healthz_handler))
        .route("/readyz", get(readyz_handler))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state);

    if let Some(registry) = registry {
        app = app.merge(
            Router::new()
                .route("/metrics", get(metrics_handler))
                .with_state(registry),
        );
    }

    if let Some(files) = static_files {
        let store_dir = files.store_dir.trim_matches('/');
        if store_dir.is_empty() {
            app = app.fallback_service(ServeDir::new(&files.web_root));
        } else {
            app = app.nest_service(
                &format!("/{store_dir}"),
                ServeDir::new(files.web_root.join(store_dir)),
            );
        }
    }

    app.layer(TraceLayer::new_for_http())
}

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    /// File name as the uploader knows it
    #[serde(default)]
    pub name: String,
    /// Correlation key echoed back as `file_<key>`
    #[serde(default)]
    pub key: u64,
}

async fn upload_handler(
    State(state): State<AppState>,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    uri: Uri,
    body: Bytes,
) -> Result<Json<UploadReceipt>, ApiError> {
    let origin: Box<dyn OriginResolver> = match &state.public_origin {
        Some(fixed) => Box::new(FixedOrigin(fixed.clone())),
        None => Box::new(request_origin(&headers, &uri)),
    };

    let result = match Payload::from_bytes_blocking(body).await {
        Ok(payload) => {
            state
                .service
                .upload_payload(payload, &query.name, query.key, origin.as_ref())
                .await
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(report) => {
            state
                .metrics
                .record_success(report.outcome, report.bytes_written);
            Ok(Json(report.receipt))
        }
        Err(e) => {
            state.metrics.record_failure(e.kind());
            Err(ApiError(e))
        }
    }
}

/// HTTP/2 requests carry the host in `:authority`, which lands in the URI.
fn request_origin(headers: &HeaderMap, uri: &Uri) -> RequestOrigin {
    let header_str = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    let host = header_str(header::HOST.as_str())
        .or_else(|| uri.authority().map(|a| a.as_str()));
    RequestOrigin::new(header_str("x-forwarded-proto"), host)
}

/// Liveness probe: returns 200 if the process is running.
async fn healthz_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Readiness probe: returns 200 if storage is reachable, 503 otherwise.
async fn readyz_handler(State(state): State<AppState>) -> impl IntoResponse {
    match cafs_storage::check_health(state.service.store().operator()).await {
        Ok(()) => (StatusCode::OK, "ready"),
        Err(_) => (StatusCode::SERVICE_UNAVAILABLE, "storage unreachable"),
    }
}

/// Maps upload failures to HTTP responses.
pub struct ApiError(pub CafsError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let status = match &err {
            CafsError::Validation(_) => StatusCode::BAD_REQUEST,
            CafsError::NotFound(_) => {
                tracing::error!("upload invariant violated: {err}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => {
                tracing::error!(kind = %err.kind(), "upload failed: {err}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = serde_json::json!({
            "error": {
                "code": status.as_u16(),
                "kind": err.kind().as_str(),
                "message": err.to_string(),
            }
        });
        (status, Json(body)).into_response()
    }
}
