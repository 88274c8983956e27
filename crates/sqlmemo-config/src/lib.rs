//! Configuration for sqlmemo caches.
//!
//! A [`CacheConfig`] holds the construction-time options of a cache and can
//! be loaded from TOML:
//!
//! ```toml
//! maxsize = 1024        # <= 0 disables size eviction
//! ttl = -1.0            # seconds, <= 0 disables expiry
//! filepath = "cache.db" # omit (or ":memory:") for an in-memory cache
//! policy = "LRU"        # FIFO | LRU | LFU
//! typed = false
//! ```
//!
//! [`ConfigOverrides`] describes a partial change used when copying a cache.

pub mod error;
pub mod file;
pub mod types;

pub use error::{ConfigError, Result};
pub use file::{load_config_file, save_config};
pub use types::{CacheConfig, ConfigOverrides};
