//! Persistent memoization and key-value caching on SQLite.
//!
//! A [`Cache`] is both a dict-like store for serializable keys and values
//! and a memoizer for functions. Entries live in a SQLite table (in memory
//! or in a file) with an optional TTL and a size bound enforced by FIFO,
//! LRU or LFU eviction.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   encode/decode   ┌────────────────┐   SQL   ┌─────────┐
//! │ Cache /      │ ────────────────▶ │ SqliteStorage  │ ──────▶ │ cache   │
//! │ Memoized     │ ◀──────────────── │ (sqlmemo-      │ ◀────── │ table   │
//! │ (Codec)      │      bytes        │  storage)      │         │+trigger │
//! └──────────────┘                   └────────────────┘         └─────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use sqlmemo::{Cache, CacheConfig, ConfigOverrides};
//!
//! let cache = Cache::new(
//!     CacheConfig::new()
//!         .with_filepath("/tmp/memo.db")
//!         .with_maxsize(512)
//!         .with_ttl(3600.0)
//!         .with_policy("LRU"),
//! )?;
//!
//! // Key-value use
//! cache.set(&("user", 42), &"Ada")?;
//! let name: String = cache.get(&("user", 42))?;
//!
//! // Memoization
//! fn slow_square((n,): (u64,)) -> u64 {
//!     n * n
//! }
//! let square = cache.memoize(slow_square);
//! assert_eq!(square.call((12,))?, 144);
//!
//! // A copy with its own engine and different bounds
//! let short_lived = cache.copy(&ConfigOverrides::new().ttl(5.0).in_memory())?;
//! # Ok::<(), sqlmemo::CacheError>(())
//! ```

pub mod cache;
pub mod codec;
pub mod error;
pub mod key;
pub mod memoize;

pub use cache::{Cache, TypedItems};
pub use codec::{Codec, JsonCodec};
pub use error::{BoxError, CacheError, MemoizeError, Result};
pub use key::{
    Arg, Args, DefaultKey, IntoArgs, KeyFunction, function_name, make_key, type_key, type_name_of,
};
pub use memoize::{Memoized, OnlyOnErrors};

// Re-export configuration and storage types
pub use sqlmemo_config::{CacheConfig, ConfigError, ConfigOverrides, load_config_file};
pub use sqlmemo_storage::{
    CacheStorage, Items, Policy, SqliteStorage, StorageError, StorageLocation, StorageOptions,
};
