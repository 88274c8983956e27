//! SQLite-backed storage engine for sqlmemo.
//!
//! Stores opaque binary keys and values in one table with optional
//! time-to-live expiry and a size bound enforced by FIFO, LRU or LFU
//! eviction.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  SqliteStorage                                                          │
//! │  - One connection, guarded by a mutex                                   │
//! │  - cache(key, ts, [used], value) WITHOUT ROWID                          │
//! │  - TTL predicate on every read                                          │
//! │  - AFTER INSERT trigger: delete expired rows, then overflow rows        │
//! │    in policy order                                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use sqlmemo_storage::{Policy, SqliteStorage, StorageOptions};
//!
//! let storage = SqliteStorage::open(
//!     StorageOptions::default()
//!         .with_path("/tmp/cache.db")
//!         .with_maxsize(100)
//!         .with_ttl(60.0)
//!         .with_policy(Policy::Lru),
//! )?;
//!
//! storage.set(b"answer", b"42")?;
//! assert_eq!(storage.get(b"answer")?, b"42");
//! # Ok::<(), sqlmemo_storage::StorageError>(())
//! ```

pub mod backend;
pub mod error;
pub mod options;
pub mod policy;
pub mod schema;
pub mod storage;

pub use backend::CacheStorage;
pub use error::{KeyPreview, Result, StorageError};
pub use options::{
    DEFAULT_MAXSIZE, DEFAULT_TTL, MEMORY_MARKER, StorageLocation, StorageOptions,
};
pub use policy::{Policy, PolicySpec};
pub use storage::{Items, SqliteStorage};
