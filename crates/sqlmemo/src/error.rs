//! Error types for the cache facade.

use sqlmemo_config::ConfigError;
use sqlmemo_storage::StorageError;
use thiserror::Error;

/// Boxed error from a codec implementation.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur in cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The storage engine failed, or the key had no live record.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A key or value could not be encoded or decoded.
    #[error("Codec error during {operation}: {source}")]
    Codec {
        operation: &'static str,
        #[source]
        source: BoxError,
    },

    /// The configuration was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl CacheError {
    /// Whether the key had no live record.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Storage(e) if e.is_not_found())
    }

    /// Whether the cache had already been closed.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Storage(e) if e.is_closed())
    }

    pub(crate) fn codec(operation: &'static str, source: impl Into<BoxError>) -> Self {
        Self::Codec {
            operation,
            source: source.into(),
        }
    }
}

/// Result type alias for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

/// Failure of a memoized call.
#[derive(Debug, Error)]
pub enum MemoizeError<E> {
    /// The wrapped function failed and no cached value replaced its error.
    #[error("{0}")]
    Call(E),

    /// Reading or writing the cache failed.
    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl<E> MemoizeError<E> {
    /// The wrapped function's error, if that is what failed.
    pub fn into_call_error(self) -> Option<E> {
        match self {
            Self::Call(e) => Some(e),
            Self::Cache(_) => None,
        }
    }
}
