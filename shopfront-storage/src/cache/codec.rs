//! Codec boundary between typed entities and stored bytes.
//!
//! Serialization ([`Codec`]) and shape checking ([`Schema`]) are separate
//! steps. [`SchemaCodec`] composes them: strict on the way in, tolerant on the
//! way out.

use serde::de::DeserializeOwned;
use serde::Serialize;
use shopfront_core::{CacheError, Schema, ShopResult};
use tracing::warn;

use super::key::CacheKey;

/// Byte encoding for cached values.
pub trait Codec: Clone + Send + Sync + 'static {
    const NAME: &'static str;

    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CacheError>;

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CacheError>;
}

/// JSON text, the format other readers of the store expect.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    const NAME: &'static str = "json";

    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CacheError> {
        serde_json::to_vec(value).map_err(|e| CacheError::Codec {
            codec: Self::NAME.to_string(),
            reason: e.to_string(),
        })
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CacheError> {
        serde_json::from_slice(bytes).map_err(|e| CacheError::Codec {
            codec: Self::NAME.to_string(),
            reason: e.to_string(),
        })
    }
}

/// MessagePack with named fields. Smaller than JSON, but only readable by
/// clients that share the codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct MsgPackCodec;

impl Codec for MsgPackCodec {
    const NAME: &'static str = "msgpack";

    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CacheError> {
        rmp_serde::to_vec_named(value).map_err(|e| CacheError::Codec {
            codec: Self::NAME.to_string(),
            reason: e.to_string(),
        })
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CacheError> {
        rmp_serde::from_slice(bytes).map_err(|e| CacheError::Codec {
            codec: Self::NAME.to_string(),
            reason: e.to_string(),
        })
    }
}

/// A codec paired with schema checks.
#[derive(Debug, Clone, Default)]
pub struct SchemaCodec<C: Codec = JsonCodec> {
    codec: C,
}

impl<C: Codec> SchemaCodec<C> {
    pub fn new(codec: C) -> Self {
        Self { codec }
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Check then encode. A value that fails its schema is never encoded.
    pub fn encode<T: Schema>(&self, value: &T) -> ShopResult<Vec<u8>> {
        value.check()?;
        Ok(self.codec.encode(value)?)
    }

    /// Decode then check, failing on either step.
    pub fn decode<T: Schema>(&self, bytes: &[u8]) -> ShopResult<T> {
        let value: T = self.codec.decode(bytes)?;
        value.check()?;
        Ok(value)
    }

    /// Decode then check, treating any failure as absent.
    pub fn decode_tolerant<T: Schema>(&self, key: &CacheKey, bytes: &[u8]) -> Option<T> {
        match self.decode(bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(
                    key = %key,
                    schema = T::NAME,
                    error = %e,
                    "Discarding unreadable cache value"
                );
                None
            }
        }
    }
}
