//! Cache configuration types.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sqlmemo_storage::{
    DEFAULT_MAXSIZE, DEFAULT_TTL, MEMORY_MARKER, Policy, StorageLocation, StorageOptions,
};

use crate::error::{ConfigError, Result};

/// Construction-time options of a cache.
///
/// The policy is kept as a name so that an unknown value is reported by
/// the storage engine when the cache is opened, not when the config is
/// built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of records; `<= 0` disables size eviction.
    pub maxsize: i64,

    /// Seconds a record stays live; `<= 0` disables expiry.
    pub ttl: f64,

    /// Database file; `None` or `:memory:` keeps the cache in memory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filepath: Option<PathBuf>,

    /// Eviction policy name: FIFO, LRU or LFU.
    pub policy: String,

    /// Include argument type names in memoization keys.
    pub typed: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            maxsize: DEFAULT_MAXSIZE,
            ttl: DEFAULT_TTL,
            filepath: None,
            policy: Policy::default().to_string(),
            typed: false,
        }
    }
}

impl fmt::Display for CacheConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let filepath = self
            .filepath
            .as_ref()
            .map(|p| format!("{:?}", p.display().to_string()))
            .unwrap_or_else(|| "None".to_string());
        write!(
            f,
            "maxsize={}, ttl={}, filepath={}, policy={:?}, typed={}",
            self.maxsize, self.ttl, filepath, self.policy, self.typed
        )
    }
}

impl CacheConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_maxsize(mut self, maxsize: i64) -> Self {
        self.maxsize = maxsize;
        self
    }

    pub fn with_ttl(mut self, ttl: f64) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_filepath(mut self, path: impl Into<PathBuf>) -> Self {
        self.filepath = Some(path.into());
        self
    }

    /// Keep the cache in memory.
    pub fn in_memory(mut self) -> Self {
        self.filepath = None;
        self
    }

    pub fn with_policy(mut self, policy: impl Into<String>) -> Self {
        self.policy = policy.into();
        self
    }

    pub fn with_typed(mut self, typed: bool) -> Self {
        self.typed = typed;
        self
    }

    /// Where the storage engine keeps its table.
    pub fn location(&self) -> StorageLocation {
        match &self.filepath {
            Some(path) => StorageLocation::from_path(path),
            None => StorageLocation::Memory,
        }
    }

    /// The configured file path unless the cache is in memory.
    pub fn file_path(&self) -> Option<&Path> {
        self.filepath
            .as_deref()
            .filter(|p| p.as_os_str() != MEMORY_MARKER)
    }

    /// Build storage options, resolving the policy name.
    pub fn storage_options(&self) -> sqlmemo_storage::Result<StorageOptions> {
        Ok(StorageOptions {
            location: self.location(),
            maxsize: self.maxsize,
            ttl: self.ttl,
            policy: self.policy.parse()?,
        })
    }

    /// Check the policy name and TTL.
    pub fn validate(&self) -> Result<()> {
        if self.policy.parse::<Policy>().is_err() {
            return Err(ConfigError::InvalidPolicy {
                policy: self.policy.clone(),
            });
        }
        self.validate_ttl()
    }

    /// Reject a TTL that is NaN or positive infinity. Any value `<= 0`,
    /// negative infinity included, disables expiry.
    pub fn validate_ttl(&self) -> Result<()> {
        if self.ttl.is_nan() || self.ttl == f64::INFINITY {
            return Err(ConfigError::InvalidTtl { ttl: self.ttl });
        }
        Ok(())
    }

    /// Parse a TOML document.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: CacheConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Partial configuration applied on top of an existing one.
///
/// Used when copying a cache with a few parameters changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrides {
    pub maxsize: Option<i64>,
    pub ttl: Option<f64>,
    /// `Some(None)` switches to an in-memory store.
    pub filepath: Option<Option<PathBuf>>,
    pub policy: Option<String>,
    pub typed: Option<bool>,
}

impl ConfigOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn maxsize(mut self, maxsize: i64) -> Self {
        self.maxsize = Some(maxsize);
        self
    }

    pub fn ttl(mut self, ttl: f64) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn filepath(mut self, path: impl Into<PathBuf>) -> Self {
        self.filepath = Some(Some(path.into()));
        self
    }

    pub fn in_memory(mut self) -> Self {
        self.filepath = Some(None);
        self
    }

    pub fn policy(mut self, policy: impl Into<String>) -> Self {
        self.policy = Some(policy.into());
        self
    }

    pub fn typed(mut self, typed: bool) -> Self {
        self.typed = Some(typed);
        self
    }

    /// Whether no field is overridden.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Merge onto `base`; overridden fields win.
    pub fn apply(&self, base: &CacheConfig) -> CacheConfig {
        CacheConfig {
            maxsize: self.maxsize.unwrap_or(base.maxsize),
            ttl: self.ttl.unwrap_or(base.ttl),
            filepath: self.filepath.clone().unwrap_or_else(|| base.filepath.clone()),
            policy: self.policy.clone().unwrap_or_else(|| base.policy.clone()),
            typed: self.typed.unwrap_or(base.typed),
        }
    }
}
