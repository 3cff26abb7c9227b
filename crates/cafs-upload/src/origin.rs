//! Where uploaded files are served from, as seen by the caller.

/// Supplies the scheme+host of the current request. Read-only.
pub trait OriginResolver: Send + Sync {
    fn origin(&self) -> String;
}

/// Always the same origin (configured public host, CDN, tests)
#[derive(Debug, Clone)]
pub struct FixedOrigin(pub String);

impl OriginResolver for FixedOrigin {
    fn origin(&self) -> String {
        self.0.clone()
    }
}

/// Origin reconstructed from an incoming request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOrigin {
    pub scheme: String,
    pub host: String,
}

impl RequestOrigin {
    /// `scheme` falls back to `http`, `host` to `localhost`.
    pub fn new(scheme: Option<&str>, host: Option<&str>) -> Self {
        let scheme = scheme
            .and_then(|s| s.split(',').next())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or("http");
        let host = host.map(str::trim).filter(|h| !h.is_empty()).unwrap_or("localhost");

        RequestOrigin {
            scheme: scheme.to_ascii_lowercase(),
            host: host.to_string(),
        }
    }
}

impl OriginResolver for RequestOrigin {
    fn origin(&self) -> String {
        format!("{}://{}", self.scheme, self.host)
    }
}
