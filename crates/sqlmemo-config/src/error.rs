//! Errors raised while reading, writing or checking a cache config.

use std::io;

use thiserror::Error;

/// Result of a config operation.
pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// The TOML file could not be opened or read.
    #[error("cannot read cache config at {path}: {source}")]
    ReadFile {
        path: String,
        #[source]
        source: io::Error,
    },

    /// The TOML file or its directory could not be written.
    #[error("cannot write cache config at {path}: {source}")]
    WriteFile {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("malformed cache config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("cannot encode cache config as TOML: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Policy name is not one of FIFO, LRU, LFU.
    #[error("invalid policy '{policy}' (expected FIFO, LRU or LFU)")]
    InvalidPolicy { policy: String },

    /// TTL is NaN or positive infinity.
    #[error("invalid ttl {ttl}: expected seconds, or <= 0 to disable expiry")]
    InvalidTtl { ttl: f64 },
}
