//! Cache and lock error types

use std::path::PathBuf;

use thiserror::Error;

/// Cache operation errors
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Corrupt cache entry: {message}")]
    Corrupt { message: String },

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Lock(#[from] LockError),
}

/// Lock marker errors
///
/// `Held` is the normal contention outcome and callers treat it as a cache
/// miss; `Io` is a genuine filesystem failure.
#[derive(Error, Debug)]
pub enum LockError {
    #[error("Lock already held: {}", path.display())]
    Held { path: PathBuf },

    #[error("Lock IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl LockError {
    /// Whether this error only reports contention
    pub fn is_held(&self) -> bool {
        matches!(self, LockError::Held { .. })
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LockError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;

/// Result type for lock operations
pub type LockResult<T> = std::result::Result<T, LockError>;
