//! cafsd: content-addressed file upload daemon
//!
//! Usage:
//!   cafsd [--config /etc/cafs/config.toml] [--listen 0.0.0.0:8080]

mod metrics;
mod server;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use prometheus_client::registry::Registry;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use cafs_catalog::{Catalog, CatalogBackend};
use cafs_core::config::expand_tilde;
use cafs_core::{CafsConfig, StorageKind};
use cafs_storage::FileStore;
use cafs_upload::UploadService;

use crate::metrics::UploadMetrics;
use crate::server::{AppState, StaticFiles};

#[derive(Parser, Debug)]
#[command(name = "cafsd", version, about = "Content-addressed file upload daemon")]
struct Cli {
    /// Path to cafs.toml configuration file
    #[arg(
        long,
        short = 'c',
        env = "CAFS_CONFIG",
        default_value = "/etc/cafs/config.toml"
    )]
    config: PathBuf,

    /// HTTP listen address (overrides daemon.listen)
    #[arg(long, env = "CAFS_LISTEN")]
    listen: Option<String>,

    /// Log level (trace, debug, info, warn, error); overrides daemon.log_level
    #[arg(long, env = "CAFS_LOG")]
    log: Option<String>,

    /// Log format (json, text); overrides daemon.log_format
    #[arg(long, env = "CAFS_LOG_FORMAT")]
    log_format: Option<LogFormat>,
}

#[derive(Clone, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (mut config, found) = load_config(&cli.config).await?;

    let level = cli.log.unwrap_or_else(|| config.daemon.log_level.clone());
    let format = cli.log_format.unwrap_or_else(|| {
        LogFormat::from_str(&config.daemon.log_format, true).unwrap_or(LogFormat::Json)
    });
    init_logging(&level, &format);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "cafsd starting"
    );
    if !found {
        warn!("config file not found: {}  (using defaults)", cli.config.display());
    }

    if let Some(listen) = cli.listen {
        config.daemon.listen = listen;
    }

    run(config).await
}

/// Returns the parsed config and whether the file existed.
async fn load_config(path: &Path) -> Result<(CafsConfig, bool)> {
    if !path.exists() {
        return Ok((CafsConfig::default(), false));
    }
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading config {}", path.display()))?;
    let config =
        toml::from_str(&content).with_context(|| format!("parsing config {}", path.display()))?;
    Ok((config, true))
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json())
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer())
                .init();
        }
    }
}

/// S3 credentials from the environment, only needed for remote storage
fn s3_credentials() -> Option<(String, String)> {
    let access_key = std::env::var("AWS_ACCESS_KEY_ID")
        .or_else(|_| std::env::var("CAFS_ACCESS_KEY_ID"))
        .ok()?;
    let secret_key = std::env::var("AWS_SECRET_ACCESS_KEY")
        .or_else(|_| std::env::var("CAFS_SECRET_ACCESS_KEY"))
        .ok()?;
    Some((access_key, secret_key))
}

async fn run(mut config: CafsConfig) -> Result<()> {
    // ── Storage ──────────────────────────────────────────────────────────
    if config.storage.kind == StorageKind::Local {
        let web_root = expand_tilde(&config.storage.web_root);
        std::fs::create_dir_all(&web_root)
            .with_context(|| format!("creating web root {}", web_root.display()))?;
        config.storage.web_root = web_root
            .canonicalize()
            .with_context(|| format!("resolving web root {}", web_root.display()))?;
    }

    let creds = s3_credentials();
    let op = cafs_storage::operator::build_from_core_config(
        &config.storage,
        creds.as_ref().map(|(a, s)| (a.as_str(), s.as_str())),
    )?;

    match cafs_storage::check_health(&op).await {
        Ok(()) => info!(kind = config.storage.kind.as_str(), "storage: reachable"),
        Err(e) => warn!(kind = config.storage.kind.as_str(), "storage: {e}"),
    }

    // ── Catalog ──────────────────────────────────────────────────────────
    let catalog_path = expand_tilde(&config.catalog.path);
    let catalog = CatalogBackend::open(&catalog_path)
        .with_context(|| format!("opening catalog {}", catalog_path.display()))?;
    info!(
        backend = catalog.name(),
        path = %catalog_path.display(),
        records = catalog.len()?,
        "catalog: opened"
    );

    // ── Upload service ───────────────────────────────────────────────────
    let config = Arc::new(config);
    let service = UploadService::new(
        Arc::new(catalog),
        FileStore::new(op, config.storage.kind),
        config.clone(),
    );

    let mut registry = Registry::default();
    let metrics = UploadMetrics::new(&mut registry);
    let registry = config
        .daemon
        .metrics_enabled
        .then(|| Arc::new(registry));

    let static_files = (config.storage.kind == StorageKind::Local).then(|| StaticFiles {
        web_root: config.storage.web_root.clone(),
        store_dir: config.storage.store_dir.clone(),
    });

    let state = AppState {
        service: Arc::new(service),
        metrics,
        public_origin: config.storage.public_origin.clone(),
    };
    let app = server::router(state, registry, static_files, config.daemon.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(&config.daemon.listen)
        .await
        .with_context(|| format!("binding {}", config.daemon.listen))?;
    info!(addr = %config.daemon.listen, "http: listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server")?;

    info!("cafsd stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
