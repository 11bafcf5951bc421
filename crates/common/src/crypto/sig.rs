//! Detached signatures and the bundles that carry them.
//!
//! Signed artifacts never embed their signatures. The canonical bytes of
//! a header or tombstone are signed detached, and the signatures travel
//! alongside in a [`SignatureBundle`] that records which key produced
//! each one. Verification binds a bundle to a datastore by checking that
//! some signing key fingerprints to the expected owner id.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::crypto::id::DatastoreId;
use crate::crypto::keys::{PublicKey, SecretKey};

/// Size of an Ed25519 signature in bytes
pub const SIGNATURE_SIZE: usize = 64;

/// Errors that can occur when parsing signatures
#[derive(Debug, thiserror::Error)]
pub enum SigError {
    #[error("signature error: {0}")]
    Default(#[from] anyhow::Error),
}

/// Detached Ed25519 signature.
///
/// Travels as a hex string on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature(ed25519_dalek::Signature);

impl Signature {
    /// Parse a signature from a hexadecimal string
    pub fn from_hex(hex: &str) -> Result<Self, SigError> {
        let hex = hex.strip_prefix("0x").unwrap_or(hex);
        let mut buff = [0u8; SIGNATURE_SIZE];
        hex::decode_to_slice(hex, &mut buff)
            .map_err(|_| anyhow::anyhow!("signature hex decode error"))?;
        Ok(Self(ed25519_dalek::Signature::from_bytes(&buff)))
    }

    pub fn to_bytes(&self) -> [u8; SIGNATURE_SIZE] {
        self.0.to_bytes()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    pub(crate) fn as_dalek(&self) -> &ed25519_dalek::Signature {
        &self.0
    }
}

impl From<ed25519_dalek::Signature> for Signature {
    fn from(sig: ed25519_dalek::Signature) -> Self {
        Self(sig)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        Signature::from_hex(&hex).map_err(serde::de::Error::custom)
    }
}

/// One signature together with the key that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureEntry {
    pub public_key: PublicKey,
    pub signature: Signature,
}

/// Signatures over one message, in signing order.
///
/// A bundle usually holds a single entry. More than one appears when a
/// message is co-signed, e.g. while a datastore is migrating between
/// keys; verification accepts the bundle as long as any entry checks out
/// against the expected owner.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignatureBundle(Vec<SignatureEntry>);

impl SignatureBundle {
    /// Sign a message, producing a single-entry bundle.
    pub fn sign(message: &[u8], key: &SecretKey) -> Self {
        Self(vec![SignatureEntry {
            public_key: key.public(),
            signature: key.sign(message),
        }])
    }

    /// Add a co-signature over the same message.
    pub fn append(&mut self, message: &[u8], key: &SecretKey) {
        self.0.push(SignatureEntry {
            public_key: key.public(),
            signature: key.sign(message),
        });
    }

    /// Verify this bundle over a message against the expected owner.
    ///
    /// Returns true when at least one entry's signature verifies and that
    /// entry's key fingerprints to `owner`. A signature from some other
    /// honest key is not enough: authority comes from the owner id, not
    /// from signature validity alone.
    pub fn verify(&self, message: &[u8], owner: &DatastoreId) -> bool {
        self.0.iter().any(|entry| {
            entry.public_key.fingerprint() == *owner
                && entry.public_key.verify(message, &entry.signature).is_ok()
        })
    }

    pub fn entries(&self) -> &[SignatureEntry] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_bundle_sign_and_verify() {
        let key = SecretKey::generate();
        let owner = key.fingerprint();
        let message = b"canonical header bytes";

        let bundle = SignatureBundle::sign(message, &key);
        assert_eq!(bundle.len(), 1);
        assert!(bundle.verify(message, &owner));
    }

    #[test]
    fn test_bundle_rejects_tampered_message() {
        let key = SecretKey::generate();
        let owner = key.fingerprint();

        let bundle = SignatureBundle::sign(b"original", &key);
        assert!(!bundle.verify(b"tampered", &owner));
    }

    #[test]
    fn test_bundle_rejects_wrong_owner() {
        let key = SecretKey::generate();
        let other_owner = SecretKey::generate().fingerprint();
        let message = b"message";

        // Valid signature, but the signing key does not fingerprint to
        // the expected owner.
        let bundle = SignatureBundle::sign(message, &key);
        assert!(!bundle.verify(message, &other_owner));
    }

    #[test]
    fn test_bundle_cosignatures() {
        let owner_key = SecretKey::generate();
        let other_key = SecretKey::generate();
        let message = b"co-signed";

        let mut bundle = SignatureBundle::sign(message, &other_key);
        assert!(!bundle.verify(message, &owner_key.fingerprint()));

        bundle.append(message, &owner_key);
        assert_eq!(bundle.len(), 2);
        assert!(bundle.verify(message, &owner_key.fingerprint()));
    }

    #[test]
    fn test_signature_hex_round_trip() {
        let key = SecretKey::generate();
        let signature = key.sign(b"bytes");

        let hex = signature.to_hex();
        assert_eq!(hex.len(), SIGNATURE_SIZE * 2);

        let recovered = Signature::from_hex(&hex).unwrap();
        assert_eq!(signature, recovered);
    }
}
