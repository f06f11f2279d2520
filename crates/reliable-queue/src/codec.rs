//! Message codecs turning producer values into opaque list payloads.

use crate::error::CodecError;
use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};

/// Encodes and decodes messages stored in a queue
pub trait MessageCodec<T>: Send + Sync + 'static {
    /// Serialize a message into the bytes pushed onto the main list
    fn encode(&self, message: &T) -> Result<Bytes, CodecError>;

    /// Deserialize bytes claimed from the main list
    fn decode(&self, raw: &[u8]) -> Result<T, CodecError>;
}

/// JSON codec for any serde message type
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl<T> MessageCodec<T> for JsonCodec
where
    T: Serialize + DeserializeOwned,
{
    fn encode(&self, message: &T) -> Result<Bytes, CodecError> {
        Ok(Bytes::from(serde_json::to_vec(message)?))
    }

    fn decode(&self, raw: &[u8]) -> Result<T, CodecError> {
        if std::str::from_utf8(raw).is_err() {
            return Err(CodecError::InvalidUtf8);
        }
        Ok(serde_json::from_slice(raw)?)
    }
}

#[cfg(test)]
#[path = "codec_tests.rs"]
mod tests;
