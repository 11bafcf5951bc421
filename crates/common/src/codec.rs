//! Canonical serialization for signed artifacts.
//!
//! Every byte string that gets hashed or signed in this crate goes through
//! DAG-CBOR with deterministic map ordering. Two devices that agree on a
//! value must agree on its bytes, otherwise signature checks would depend
//! on serializer quirks instead of content.

use std::fmt;
use std::ops::Deref;

use ipld_core::codec::Codec;
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize, Serializer};
use serde_ipld_dagcbor::codec::DagCborCodec;

/// Size of a content hash in bytes (BLAKE3 output)
pub const CONTENT_HASH_SIZE: usize = 32;

/// Errors that can occur during canonical encoding or decoding
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("canonical encode error: {0}")]
    Encode(String),
    #[error("canonical decode error: {0}")]
    Decode(String),
}

/// Canonical DAG-CBOR encoding for a type.
///
/// Implementors opt in with an empty `impl` block. The derived serde
/// representation must itself be deterministic (use `BTreeMap` over
/// `HashMap` for any map fields).
pub trait CanonicalEncode: Serialize + DeserializeOwned {
    /// Encode this value to its canonical byte representation.
    fn encode(&self) -> Result<Vec<u8>, CodecError> {
        DagCborCodec::encode_to_vec(self).map_err(|e| CodecError::Encode(e.to_string()))
    }

    /// Decode a value from its canonical byte representation.
    fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        DagCborCodec::decode_from_slice(bytes).map_err(|e| CodecError::Decode(e.to_string()))
    }
}

/// BLAKE3 hash of a byte payload.
///
/// Used both as the integrity commitment inside signed inode headers and
/// as the content address under which payloads are stored remotely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash([u8; CONTENT_HASH_SIZE]);

impl ContentHash {
    /// Hash a payload.
    pub fn of(bytes: &[u8]) -> Self {
        Self(*blake3::hash(bytes).as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; CONTENT_HASH_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(hex: &str) -> Result<Self, CodecError> {
        let mut buff = [0u8; CONTENT_HASH_SIZE];
        hex::decode_to_slice(hex, &mut buff)
            .map_err(|e| CodecError::Decode(format!("content hash hex: {}", e)))?;
        Ok(Self(buff))
    }
}

impl From<[u8; CONTENT_HASH_SIZE]> for ContentHash {
    fn from(bytes: [u8; CONTENT_HASH_SIZE]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for ContentHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        ContentHash::from_hex(&hex).map_err(serde::de::Error::custom)
    }
}

/// Opaque payload bytes carried on the wire as a hex string.
///
/// Payloads ride next to their signed headers in requests and responses;
/// the header commits to them through [`ContentHash`], not through this
/// encoding, so the hex framing is purely transport sugar.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HexBytes(pub Vec<u8>);

impl HexBytes {
    pub fn into_inner(self) -> Vec<u8> {
        self.0
    }

    pub fn content_hash(&self) -> ContentHash {
        ContentHash::of(&self.0)
    }
}

impl Deref for HexBytes {
    type Target = Vec<u8>;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<[u8]> for HexBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for HexBytes {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for HexBytes {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl Serialize for HexBytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for HexBytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        let bytes = hex::decode(hex).map_err(serde::de::Error::custom)?;
        Ok(Self(bytes))
    }
}
