//! Error types for the storage engine.

use std::fmt;

use thiserror::Error;

/// Errors that can occur in the storage engine.
#[derive(Debug, Error)]
pub enum StorageError {
    /// No live record exists for the key.
    #[error("Not found: {0}")]
    NotFound(KeyPreview),

    /// The engine was configured with an unknown policy or invalid option.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The engine was closed before the operation.
    #[error("Storage is closed")]
    Closed,

    /// The underlying SQLite engine failed.
    #[error("Database error during {operation}{}: {source}", key_suffix(.key))]
    Database {
        operation: &'static str,
        key: Option<KeyPreview>,
        #[source]
        source: rusqlite::Error,
    },

    /// Filesystem operation on the backing file failed.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    /// Whether this error means the key had no live record.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Whether the engine had already been closed.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    pub(crate) fn database(operation: &'static str, source: rusqlite::Error) -> Self {
        Self::Database {
            operation,
            key: None,
            source,
        }
    }

    pub(crate) fn database_for_key(
        operation: &'static str,
        key: &[u8],
        source: rusqlite::Error,
    ) -> Self {
        Self::Database {
            operation,
            key: Some(KeyPreview::new(key)),
            source,
        }
    }
}

fn key_suffix(key: &Option<KeyPreview>) -> String {
    match key {
        Some(k) => format!(" (key {k})"),
        None => String::new(),
    }
}

/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Bounded hex rendering of a binary key for error messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPreview {
    head: Vec<u8>,
    len: usize,
}

const PREVIEW_BYTES: usize = 16;

impl KeyPreview {
    pub fn new(key: &[u8]) -> Self {
        Self {
            head: key[..key.len().min(PREVIEW_BYTES)].to_vec(),
            len: key.len(),
        }
    }

    /// Length of the full key in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl fmt::Display for KeyPreview {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("0x")?;
        for b in &self.head {
            write!(f, "{b:02x}")?;
        }
        if self.len > self.head.len() {
            write!(f, "... ({} bytes)", self.len)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_preview_short() {
        let preview = KeyPreview::new(b"\x01\xab");
        assert_eq!(preview.to_string(), "0x01ab");
        assert_eq!(preview.len(), 2);
    }

    #[test]
    fn test_key_preview_truncates() {
        let key = vec![0xffu8; 40];
        let preview = KeyPreview::new(&key);
        let rendered = preview.to_string();
        assert!(rendered.starts_with("0xffff"));
        assert!(rendered.ends_with("... (40 bytes)"));
    }

    #[test]
    fn test_database_error_mentions_operation_and_key() {
        let err = StorageError::database_for_key(
            "get",
            b"k",
            rusqlite::Error::InvalidQuery,
        );
        let msg = err.to_string();
        assert!(msg.contains("during get"));
        assert!(msg.contains("key 0x6b"));
    }

    #[test]
    fn test_predicates() {
        assert!(StorageError::NotFound(KeyPreview::new(b"x")).is_not_found());
        assert!(StorageError::Closed.is_closed());
        assert!(!StorageError::Closed.is_not_found());
    }
}
