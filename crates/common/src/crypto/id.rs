//! Identifiers derived from keys and chosen by devices.
//!
//! A datastore is named by the fingerprint of its owning public key, so
//! identifiers are self-certifying: given a descriptor, anyone can check
//! that the id really belongs to the key inside it. Device ids are plain
//! labels with no cryptographic weight of their own; they partition
//! version lineages, not authority.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Size of a datastore identifier in bytes
pub const DATASTORE_ID_SIZE: usize = 20;

/// Errors that can occur when parsing identifiers
#[derive(Debug, thiserror::Error)]
pub enum IdError {
    #[error("id error: {0}")]
    Default(#[from] anyhow::Error),
}

/// Address-style identifier of a datastore.
///
/// The leading [`DATASTORE_ID_SIZE`] bytes of the BLAKE3 hash of the
/// owner's raw Ed25519 public key, rendered as hex on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DatastoreId([u8; DATASTORE_ID_SIZE]);

impl DatastoreId {
    /// Derive an identifier from raw public key bytes.
    pub fn from_key_bytes(key_bytes: &[u8]) -> Self {
        let digest = blake3::hash(key_bytes);
        let mut buff = [0u8; DATASTORE_ID_SIZE];
        buff.copy_from_slice(&digest.as_bytes()[..DATASTORE_ID_SIZE]);
        Self(buff)
    }

    /// Parse an identifier from a hexadecimal string
    ///
    /// Accepts both plain hex and "0x"-prefixed hex strings.
    pub fn from_hex(hex: &str) -> Result<Self, IdError> {
        let hex = hex.strip_prefix("0x").unwrap_or(hex);
        let mut buff = [0u8; DATASTORE_ID_SIZE];
        hex::decode_to_slice(hex, &mut buff)
            .map_err(|_| anyhow::anyhow!("datastore id hex decode error"))?;
        Ok(Self(buff))
    }

    pub fn to_bytes(&self) -> [u8; DATASTORE_ID_SIZE] {
        self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl From<[u8; DATASTORE_ID_SIZE]> for DatastoreId {
    fn from(bytes: [u8; DATASTORE_ID_SIZE]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for DatastoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for DatastoreId {
    type Err = IdError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for DatastoreId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for DatastoreId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        DatastoreId::from_hex(&hex).map_err(serde::de::Error::custom)
    }
}

/// Label for one device participating in a datastore.
///
/// Each device writes its own strictly increasing version lineage per
/// inode, and deletions must be proven once per device, so the set of
/// device ids in a descriptor fixes how much bookkeeping every mutation
/// carries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DeviceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for DeviceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::crypto::SecretKey;

    #[test]
    fn test_datastore_id_hex_round_trip() {
        let id = SecretKey::generate().fingerprint();
        let hex = id.to_hex();
        assert_eq!(hex.len(), DATASTORE_ID_SIZE * 2);

        let recovered = DatastoreId::from_hex(&hex).unwrap();
        assert_eq!(id, recovered);

        let prefixed = format!("0x{}", hex);
        let recovered = DatastoreId::from_hex(&prefixed).unwrap();
        assert_eq!(id, recovered);
    }

    #[test]
    fn test_datastore_id_commits_to_key() {
        let key = SecretKey::generate().public();
        let first = DatastoreId::from_key_bytes(&key.to_bytes());
        let second = key.fingerprint();
        assert_eq!(first, second);
    }

    #[test]
    fn test_datastore_id_rejects_bad_hex() {
        assert!(DatastoreId::from_hex("not hex").is_err());
        // Wrong length
        assert!(DatastoreId::from_hex("abcd").is_err());
    }

    #[test]
    fn test_device_id_serde_is_transparent() {
        let device = DeviceId::new("laptop");
        let json = serde_json::to_string(&device).unwrap();
        assert_eq!(json, "\"laptop\"");

        let recovered: DeviceId = serde_json::from_str(&json).unwrap();
        assert_eq!(device, recovered);
    }
}
