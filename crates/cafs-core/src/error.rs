use thiserror::Error;

pub type CafsResult<T> = Result<T, CafsError>;

#[derive(Debug, Error)]
pub enum CafsError {
    /// Rejected input (e.g. an empty payload). Nothing was stored.
    #[error("validation error: {0}")]
    Validation(String),

    /// Stream read, disk write or directory creation failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A catalog row that was expected to exist is gone.
    #[error("not found: {0}")]
    NotFound(String),

    #[error("catalog error: {0}")]
    Catalog(String),

    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Stable, matchable classification of a [`CafsError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Io,
    NotFound,
    Catalog,
    Config,
    Other,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Io => "io",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Catalog => "catalog",
            ErrorKind::Config => "config",
            ErrorKind::Other => "other",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl CafsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CafsError::Validation(_) => ErrorKind::Validation,
            CafsError::Io(_) => ErrorKind::Io,
            CafsError::NotFound(_) => ErrorKind::NotFound,
            CafsError::Catalog(_) => ErrorKind::Catalog,
            CafsError::Config(_) => ErrorKind::Config,
            CafsError::Other(_) => ErrorKind::Other,
        }
    }

    /// True for failures the caller caused and can fix by changing the request.
    pub fn is_user_error(&self) -> bool {
        matches!(self, CafsError::Validation(_))
    }
}
