//! Construction-time options for the storage engine.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::policy::Policy;

/// Default maximum number of records.
pub const DEFAULT_MAXSIZE: i64 = 1024;

/// Default TTL in seconds (disabled).
pub const DEFAULT_TTL: f64 = -1.0;

/// Path string that selects an in-memory database.
pub const MEMORY_MARKER: &str = ":memory:";

/// Where the cache table lives.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StorageLocation {
    /// Private in-memory database, gone when the engine closes.
    #[default]
    Memory,
    /// SQLite database file.
    File(PathBuf),
}

impl StorageLocation {
    /// Interpret a path, treating `:memory:` as the in-memory marker.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if path.as_os_str() == MEMORY_MARKER {
            Self::Memory
        } else {
            Self::File(path.to_path_buf())
        }
    }

    /// The backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Memory => None,
            Self::File(p) => Some(p),
        }
    }
}

impl fmt::Display for StorageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => f.write_str(MEMORY_MARKER),
            Self::File(p) => write!(f, "{}", p.display()),
        }
    }
}

/// Options for opening a [`SqliteStorage`](crate::SqliteStorage).
#[derive(Debug, Clone, PartialEq)]
pub struct StorageOptions {
    pub location: StorageLocation,
    /// Maximum number of records; `<= 0` disables size eviction.
    pub maxsize: i64,
    /// Seconds a record stays live; `<= 0` disables expiry.
    pub ttl: f64,
    pub policy: Policy,
}

impl Default for StorageOptions {
    fn default() -> Self {
        Self {
            location: StorageLocation::Memory,
            maxsize: DEFAULT_MAXSIZE,
            ttl: DEFAULT_TTL,
            policy: Policy::Fifo,
        }
    }
}

impl StorageOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_location(mut self, location: StorageLocation) -> Self {
        self.location = location;
        self
    }

    pub fn with_path(self, path: impl AsRef<Path>) -> Self {
        self.with_location(StorageLocation::from_path(path))
    }

    pub fn with_maxsize(mut self, maxsize: i64) -> Self {
        self.maxsize = maxsize;
        self
    }

    pub fn with_ttl(mut self, ttl: f64) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_policy(mut self, policy: Policy) -> Self {
        self.policy = policy;
        self
    }

    /// Whether inserts must delete expired rows.
    pub fn expires(&self) -> bool {
        self.ttl > 0.0
    }

    /// Whether inserts must trim the table to `maxsize`.
    pub fn bounded(&self) -> bool {
        self.maxsize > 0
    }
}
