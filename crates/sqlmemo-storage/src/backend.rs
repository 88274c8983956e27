//! Storage backend trait.
//!
//! The cache facade talks to its engine through [`CacheStorage`] so other
//! engines (or test doubles) can stand in for [`SqliteStorage`].

use crate::error::{KeyPreview, Result, StorageError};
use crate::storage::{Items, SqliteStorage};

/// Binary key-value store with cache semantics.
///
/// Implementations must apply their expiry rules on every read and must
/// fail every operation with [`StorageError::Closed`] once closed.
pub trait CacheStorage: Send + Sync + std::fmt::Debug {
    /// Insert or replace a record.
    fn set(&self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Look up a live record.
    fn get_opt(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Remove a record; `NotFound` if absent.
    fn delete(&self, key: &[u8]) -> Result<()>;

    /// Remove every record.
    fn clear(&self) -> Result<()>;

    /// Live records, oldest first.
    fn items(&self) -> Result<Items>;

    /// Number of live records.
    fn len(&self) -> Result<usize>;

    /// Release resources. Idempotent.
    fn close(&self) -> Result<()>;

    /// Close and delete any persisted state.
    fn remove(&self) -> Result<()>;

    /// Look up a live record, failing with `NotFound` on a miss.
    fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        self.get_opt(key)?
            .ok_or_else(|| StorageError::NotFound(KeyPreview::new(key)))
    }

    /// Look up a live record, returning `default` on a miss.
    fn get_or(&self, key: &[u8], default: Vec<u8>) -> Result<Vec<u8>> {
        Ok(self.get_opt(key)?.unwrap_or(default))
    }

    /// Whether a live record exists.
    fn contains(&self, key: &[u8]) -> Result<bool> {
        Ok(self.get_opt(key)?.is_some())
    }

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl CacheStorage for SqliteStorage {
    fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        SqliteStorage::set(self, key, value)
    }

    fn get_opt(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        SqliteStorage::get_opt(self, key)
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        SqliteStorage::delete(self, key)
    }

    fn clear(&self) -> Result<()> {
        SqliteStorage::clear(self)
    }

    fn items(&self) -> Result<Items> {
        SqliteStorage::items(self)
    }

    fn len(&self) -> Result<usize> {
        SqliteStorage::len(self)
    }

    fn close(&self) -> Result<()> {
        SqliteStorage::close(self)
    }

    fn remove(&self) -> Result<()> {
        SqliteStorage::remove(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(backend: &dyn CacheStorage) {
        backend.set(b"k", b"v").unwrap();
        assert_eq!(backend.get(b"k").unwrap(), b"v");
        assert!(backend.contains(b"k").unwrap());
        assert_eq!(backend.get_or(b"nope", b"d".to_vec()).unwrap(), b"d");
        assert_eq!(backend.len().unwrap(), 1);

        backend.delete(b"k").unwrap();
        assert!(backend.is_empty().unwrap());
        assert!(backend.get(b"k").unwrap_err().is_not_found());
    }

    #[test]
    fn test_sqlite_through_trait_object() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        exercise(&storage);

        let boxed: Box<dyn CacheStorage> = Box::new(storage);
        boxed.close().unwrap();
        assert!(boxed.set(b"k", b"v").unwrap_err().is_closed());
    }
}
