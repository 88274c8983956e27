//! Key and value serialization.
//!
//! The storage engine only sees bytes. A [`Codec`] turns keys and values
//! into those bytes and back; [`JsonCodec`] is the default.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{CacheError, Result};

/// Converts values to and from the binary payloads kept in storage.
///
/// Encoding must be deterministic for keys: equal keys have to produce
/// identical bytes or lookups will miss.
pub trait Codec: Send + Sync {
    /// Serialize a value.
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>>;

    /// Deserialize a value.
    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T>;
}

/// JSON codec backed by `serde_json`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>> {
        serde_json::to_vec(value).map_err(|e| CacheError::codec("encode", e))
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        serde_json::from_slice(bytes).map_err(|e| CacheError::codec("decode", e))
    }
}
