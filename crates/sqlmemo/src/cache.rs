//! Dict-like cache facade.

use std::fmt;
use std::marker::PhantomData;
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlmemo_config::{CacheConfig, ConfigOverrides};
use sqlmemo_storage::{CacheStorage, Items, SqliteStorage};
use tracing::debug;

use crate::codec::{Codec, JsonCodec};
use crate::error::Result;
use crate::memoize::Memoized;

/// Cache usable as a key-value store and as a function memoizer.
///
/// Keys and values go through the codec `C` before reaching the storage
/// engine. The engine is owned by this instance: dropping the cache or
/// calling [`close`](Self::close) releases it.
///
/// ```no_run
/// use sqlmemo::{Cache, CacheConfig};
///
/// let cache = Cache::new(CacheConfig::new().with_maxsize(100).with_policy("LRU"))?;
/// cache.set(&"greeting", &"hello")?;
/// let value: String = cache.get(&"greeting")?;
/// assert_eq!(value, "hello");
/// # Ok::<(), sqlmemo::CacheError>(())
/// ```
pub struct Cache<C: Codec = JsonCodec> {
    config: CacheConfig,
    storage: Box<dyn CacheStorage>,
    codec: C,
}

impl<C: Codec> fmt::Debug for Cache<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("config", &self.config)
            .field("storage", &self.storage)
            .finish_non_exhaustive()
    }
}

impl<C: Codec> fmt::Display for Cache<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cache({})", self.config)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Construction
// ─────────────────────────────────────────────────────────────────────────────

impl Cache<JsonCodec> {
    /// Open a cache with the JSON codec.
    ///
    /// Fails with an invalid-configuration error for an unknown policy.
    pub fn new(config: CacheConfig) -> Result<Self> {
        Self::with_codec(config, JsonCodec)
    }

    /// In-memory cache with default bounds.
    pub fn in_memory() -> Result<Self> {
        Self::new(CacheConfig::default())
    }

    /// File-backed cache with default bounds.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::new(CacheConfig::default().with_filepath(path.as_ref()))
    }
}

impl<C: Codec> Cache<C> {
    /// Open a cache on a SQLite engine built from `config`.
    ///
    /// A NaN or infinite TTL is a config error; an unknown policy is
    /// reported by the engine.
    pub fn with_codec(config: CacheConfig, codec: C) -> Result<Self> {
        config.validate_ttl()?;
        let storage = SqliteStorage::open(config.storage_options()?)?;
        Ok(Self::with_storage(config, codec, Box::new(storage)))
    }

    /// Wrap an already opened storage engine.
    ///
    /// `config` is kept for [`copy`](Self::copy) and display; the engine's
    /// own bounds are whatever it was opened with.
    pub fn with_storage(config: CacheConfig, codec: C, storage: Box<dyn CacheStorage>) -> Self {
        Self {
            config,
            storage,
            codec,
        }
    }

    /// New cache with the same configuration except `overrides`.
    ///
    /// The copy always opens its own storage engine.
    pub fn copy(&self, overrides: &ConfigOverrides) -> Result<Self>
    where
        C: Clone,
    {
        let config = overrides.apply(&self.config);
        debug!(%config, "Copying cache");
        Self::with_codec(config, self.codec.clone())
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// The underlying byte-level engine.
    pub fn storage(&self) -> &dyn CacheStorage {
        self.storage.as_ref()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Key-Value Operations
// ─────────────────────────────────────────────────────────────────────────────

impl<C: Codec> Cache<C> {
    /// Get a value, failing with a not-found error on a miss.
    pub fn get<K, V>(&self, key: &K) -> Result<V>
    where
        K: Serialize + ?Sized,
        V: DeserializeOwned,
    {
        let bytes = self.storage.get(&self.codec.encode(key)?)?;
        self.codec.decode(&bytes)
    }

    /// Get a value, `None` on a miss.
    pub fn get_opt<K, V>(&self, key: &K) -> Result<Option<V>>
    where
        K: Serialize + ?Sized,
        V: DeserializeOwned,
    {
        self.storage
            .get_opt(&self.codec.encode(key)?)?
            .map(|bytes| self.codec.decode(&bytes))
            .transpose()
    }

    /// Get a value, returning `default` as-is on a miss.
    pub fn get_or<K, V>(&self, key: &K, default: V) -> Result<V>
    where
        K: Serialize + ?Sized,
        V: DeserializeOwned,
    {
        Ok(self.get_opt(key)?.unwrap_or(default))
    }

    /// Insert or replace a value.
    pub fn set<K, V>(&self, key: &K, value: &V) -> Result<()>
    where
        K: Serialize + ?Sized,
        V: Serialize + ?Sized,
    {
        self.storage
            .set(&self.codec.encode(key)?, &self.codec.encode(value)?)?;
        Ok(())
    }

    /// Delete a value, failing with a not-found error if it was absent.
    pub fn delete<K: Serialize + ?Sized>(&self, key: &K) -> Result<()> {
        self.storage.delete(&self.codec.encode(key)?)?;
        Ok(())
    }

    /// Whether a live value exists for `key`.
    pub fn contains<K: Serialize + ?Sized>(&self, key: &K) -> Result<bool> {
        Ok(self.storage.contains(&self.codec.encode(key)?)?)
    }

    /// Decoded live entries, oldest first.
    pub fn items<K, V>(&self) -> Result<TypedItems<'_, K, V, C>>
    where
        K: DeserializeOwned,
        V: DeserializeOwned,
    {
        Ok(TypedItems {
            raw: self.storage.items()?,
            codec: &self.codec,
            _marker: PhantomData,
        })
    }

    /// Encoded live entries, oldest first.
    pub fn raw_items(&self) -> Result<Items> {
        Ok(self.storage.items()?)
    }

    /// Number of live entries.
    pub fn len(&self) -> Result<usize> {
        Ok(self.storage.len()?)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.storage.is_empty()?)
    }

    /// Remove every entry.
    pub fn clear(&self) -> Result<()> {
        Ok(self.storage.clear()?)
    }

    /// Release the storage engine. Idempotent.
    pub fn close(&self) -> Result<()> {
        Ok(self.storage.close()?)
    }

    /// Close and delete the backing file.
    pub fn remove(&self) -> Result<()> {
        Ok(self.storage.remove()?)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Memoization
// ─────────────────────────────────────────────────────────────────────────────

impl<C: Codec> Cache<C> {
    /// Memoize `func` in this cache.
    pub fn memoize<F>(&self, func: F) -> Memoized<F, &Self, C> {
        Memoized::new(self, func)
    }

    /// Memoize `func` in a copy of this cache with `overrides` applied.
    ///
    /// The returned wrapper owns the copy.
    pub fn memoize_with<F>(
        &self,
        overrides: &ConfigOverrides,
        func: F,
    ) -> Result<Memoized<F, Self, C>>
    where
        C: Clone,
    {
        Ok(Memoized::new(self.copy(overrides)?, func))
    }
}

/// Iterator over decoded entries returned by [`Cache::items`].
pub struct TypedItems<'a, K, V, C: Codec> {
    raw: Items,
    codec: &'a C,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V, C> Iterator for TypedItems<'_, K, V, C>
where
    K: DeserializeOwned,
    V: DeserializeOwned,
    C: Codec,
{
    type Item = Result<(K, V)>;

    fn next(&mut self) -> Option<Self::Item> {
        let (key, value) = self.raw.next()?;
        Some(
            self.codec
                .decode(&key)
                .and_then(|k| Ok((k, self.codec.decode(&value)?))),
        )
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.raw.size_hint()
    }
}
