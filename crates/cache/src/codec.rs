//! Durable value codec
//!
//! Blobs, external payloads and the file index all share one self-describing
//! structured binary format (CBOR), so a payload can be decoded without
//! knowing the Rust type that wrote it.

use crate::errors::{CacheError, Result, SerializationOp};
use serde::{de::DeserializeOwned, Serialize};

/// Serialize a value to bytes for cache storage
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    match ciborium::into_writer(value, &mut buf) {
        Ok(()) => Ok(buf),
        Err(e) => Err(CacheError::Serialization {
            key: String::new(),
            operation: SerializationOp::Encode,
            source: Box::new(e),
        }),
    }
}

/// Deserialize bytes from cache storage
///
/// Empty input is rejected as a decode failure, never reported as a miss.
pub fn decode<T: DeserializeOwned>(data: &[u8]) -> Result<T> {
    if data.is_empty() {
        return Err(CacheError::Serialization {
            key: String::new(),
            operation: SerializationOp::Decode,
            source: "empty payload".into(),
        });
    }

    match ciborium::from_reader(data) {
        Ok(value) => Ok(value),
        Err(e) => Err(CacheError::Serialization {
            key: String::new(),
            operation: SerializationOp::Decode,
            source: Box::new(e),
        }),
    }
}
