//! Function memoization on top of [`Cache`].
//!
//! [`Memoized`] wraps a function and a reference to a cache. Each call
//! builds the key `[function identity, ...key parts]`, returns the cached
//! result on a hit and otherwise runs the function and stores its result.
//! [`OnlyOnErrors`] inverts this: the function always runs and the cache
//! is consulted only when it fails with a matching error.

use std::borrow::Borrow;
use std::fmt;
use std::marker::PhantomData;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, trace};

use crate::cache::Cache;
use crate::codec::{Codec, JsonCodec};
use crate::error::{MemoizeError, Result};
use crate::key::{DefaultKey, IntoArgs, KeyFunction, function_name, type_key};

/// A memoized function.
///
/// `B` is how the cache is held: `&Cache`, an owned `Cache` (see
/// [`Cache::memoize_with`]) or an `Arc<Cache>`.
///
/// ```no_run
/// use sqlmemo::Cache;
///
/// fn pow((base, exp): (i64, u32)) -> i64 {
///     base.pow(exp)
/// }
///
/// let cache = Cache::in_memory()?;
/// let pow = cache.memoize(pow);
/// assert_eq!(pow.call((2, 3))?, 8);
/// assert_eq!(pow.call((2, 3))?, 8); // served from the cache
/// # Ok::<(), sqlmemo::CacheError>(())
/// ```
pub struct Memoized<F, B, C: Codec = JsonCodec> {
    func: F,
    cache: B,
    name: String,
    key_fn: Box<dyn KeyFunction>,
    typed: bool,
    _codec: PhantomData<fn() -> C>,
}

impl<F, B, C: Codec> fmt::Debug for Memoized<F, B, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memoized")
            .field("name", &self.name)
            .field("typed", &self.typed)
            .finish_non_exhaustive()
    }
}

impl<F, B, C> Memoized<F, B, C>
where
    C: Codec,
    B: Borrow<Cache<C>>,
{
    /// Wrap `func`, identified by its type name, with the default key
    /// function. Type differentiation follows the cache's `typed` option.
    pub fn new(cache: B, func: F) -> Self {
        let typed = cache.borrow().config().typed;
        Self {
            func,
            cache,
            name: function_name::<F>().to_string(),
            key_fn: Box::new(DefaultKey),
            typed,
            _codec: PhantomData,
        }
    }

    /// Set the function identity used as the first key part.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Replace the key function.
    pub fn with_key(mut self, key_fn: impl KeyFunction + 'static) -> Self {
        self.key_fn = Box::new(key_fn);
        self
    }

    /// Include argument type names in keys.
    pub fn typed(mut self, typed: bool) -> Self {
        self.typed = typed;
        self
    }

    /// Fall back to cached results only when `predicate` accepts the error.
    pub fn only_on_errors<P>(self, predicate: P) -> OnlyOnErrors<F, B, C, P> {
        OnlyOnErrors {
            inner: self,
            predicate,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_typed(&self) -> bool {
        self.typed
    }

    /// The cache results are stored in.
    pub fn cache(&self) -> &Cache<C> {
        self.cache.borrow()
    }

    /// The cache key a call with `args` uses.
    pub fn key_for<A: IntoArgs + ?Sized>(&self, args: &A) -> Result<Vec<Value>> {
        let args = args.to_args()?;
        let mut key = Vec::with_capacity(1 + args.positional().len());
        key.push(Value::String(self.name.clone()));
        key.extend(self.key_fn.make_key(&args));
        if self.typed {
            key.extend(type_key(&args));
        }
        Ok(key)
    }

    /// Call an infallible function through the cache.
    pub fn call<A, R>(&self, args: A) -> Result<R>
    where
        F: Fn(A) -> R,
        A: IntoArgs,
        R: Serialize + DeserializeOwned,
    {
        let key = self.key_for(&args)?;
        let cache = self.cache();

        if let Some(hit) = cache.get_opt::<_, R>(&key)? {
            trace!(function = %self.name, "Memoized hit");
            return Ok(hit);
        }

        trace!(function = %self.name, "Memoized miss");
        let value = (self.func)(args);
        cache.set(&key, &value)?;
        Ok(value)
    }

    /// Call a fallible function through the cache.
    ///
    /// Errors are returned as [`MemoizeError::Call`] and never cached.
    pub fn try_call<A, R, E>(&self, args: A) -> std::result::Result<R, MemoizeError<E>>
    where
        F: Fn(A) -> std::result::Result<R, E>,
        A: IntoArgs,
        R: Serialize + DeserializeOwned,
    {
        let key = self.key_for(&args)?;
        let cache = self.cache();

        if let Some(hit) = cache.get_opt::<_, R>(&key)? {
            trace!(function = %self.name, "Memoized hit");
            return Ok(hit);
        }

        trace!(function = %self.name, "Memoized miss");
        let value = (self.func)(args).map_err(MemoizeError::Call)?;
        cache.set(&key, &value)?;
        Ok(value)
    }
}

/// A function whose cached results are used only to replace errors.
///
/// Every call runs the function. A success is cached (replacing any older
/// entry) and returned. An error accepted by the predicate is replaced by
/// the cached result for the same key, or returned unchanged if there is
/// none. Other errors are returned unchanged.
pub struct OnlyOnErrors<F, B, C: Codec, P> {
    inner: Memoized<F, B, C>,
    predicate: P,
}

impl<F, B, C: Codec, P> fmt::Debug for OnlyOnErrors<F, B, C, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnlyOnErrors")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

impl<F, B, C, P> OnlyOnErrors<F, B, C, P>
where
    C: Codec,
    B: Borrow<Cache<C>>,
{
    pub fn cache(&self) -> &Cache<C> {
        self.inner.cache()
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub fn key_for<A: IntoArgs + ?Sized>(&self, args: &A) -> Result<Vec<Value>> {
        self.inner.key_for(args)
    }

    pub fn call<A, R, E>(&self, args: A) -> std::result::Result<R, MemoizeError<E>>
    where
        F: Fn(A) -> std::result::Result<R, E>,
        P: Fn(&E) -> bool,
        A: IntoArgs,
        R: Serialize + DeserializeOwned,
    {
        let key = self.inner.key_for(&args)?;
        let cache = self.inner.cache();

        match (self.inner.func)(args) {
            Ok(value) => {
                cache.set(&key, &value)?;
                Ok(value)
            }
            Err(e) if (self.predicate)(&e) => match cache.get_opt::<_, R>(&key)? {
                Some(cached) => {
                    debug!(function = %self.inner.name, "Call failed, serving cached result");
                    Ok(cached)
                }
                None => Err(MemoizeError::Call(e)),
            },
            Err(e) => Err(MemoizeError::Call(e)),
        }
    }
}
