//! Signed deletion proofs
//!
//! Deleting data from an untrusted backend is itself an authenticated
//! operation: the backend must be able to show that the owner asked for
//! the removal, and every device's lineage must be covered so that no
//! device can later resurrect the object from its own version chain. A
//! tombstone is that proof. Deletions therefore ship one signed tombstone
//! per device in the datastore's device set.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::codec::{CanonicalEncode, CodecError};
use crate::crypto::{DatastoreId, DeviceId, SecretKey, SignatureBundle};

/// What a tombstone erases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TombstoneScope {
    /// One inode in a datastore's namespace
    Inode { datastore_id: DatastoreId, uuid: Uuid },
    /// One named mutable datum, e.g. a datastore descriptor
    MutableData { data_id: String },
}

/// An unsigned deletion claim for one device's lineage.
///
/// The timestamp and nonce make every tombstone's canonical bytes unique,
/// so a captured tombstone cannot be replayed as a proof for some later
/// object that happens to reuse the uuid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tombstone {
    pub scope: TombstoneScope,
    pub device_id: DeviceId,
    pub stamp_millis: u64,
    pub nonce: u64,
}

impl CanonicalEncode for Tombstone {}

impl Tombstone {
    /// Claim deletion of an inode on behalf of one device.
    pub fn new_inode(datastore_id: DatastoreId, uuid: Uuid, device_id: DeviceId) -> Self {
        Self {
            scope: TombstoneScope::Inode { datastore_id, uuid },
            device_id,
            stamp_millis: now_millis(),
            nonce: random_nonce(),
        }
    }

    /// Claim deletion of a mutable datum on behalf of one device.
    pub fn new_mutable_data(data_id: impl Into<String>, device_id: DeviceId) -> Self {
        Self {
            scope: TombstoneScope::MutableData {
                data_id: data_id.into(),
            },
            device_id,
            stamp_millis: now_millis(),
            nonce: random_nonce(),
        }
    }

    /// The byte string the deletion signature covers.
    pub fn signable_bytes(&self) -> Result<Vec<u8>, CodecError> {
        self.encode()
    }
}

/// A tombstone together with the owner's signature over it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTombstone {
    pub tombstone: Tombstone,
    pub signatures: SignatureBundle,
}

impl SignedTombstone {
    pub fn device_id(&self) -> &DeviceId {
        &self.tombstone.device_id
    }

    pub fn scope(&self) -> &TombstoneScope {
        &self.tombstone.scope
    }

    /// Check the deletion proof against the expected owner.
    pub fn verify(&self, owner: &DatastoreId) -> Result<bool, CodecError> {
        let bytes = self.tombstone.signable_bytes()?;
        Ok(self.signatures.verify(&bytes, owner))
    }
}

/// One inode tombstone per device.
pub fn inode_tombstones(
    datastore_id: DatastoreId,
    uuid: Uuid,
    device_ids: impl IntoIterator<Item = DeviceId>,
) -> Vec<Tombstone> {
    device_ids
        .into_iter()
        .map(|device_id| Tombstone::new_inode(datastore_id, uuid, device_id))
        .collect()
}

/// One mutable-data tombstone per device.
pub fn mutable_data_tombstones(
    data_id: &str,
    device_ids: impl IntoIterator<Item = DeviceId>,
) -> Vec<Tombstone> {
    device_ids
        .into_iter()
        .map(|device_id| Tombstone::new_mutable_data(data_id, device_id))
        .collect()
}

/// Sign a batch of tombstones with the owner key.
pub fn sign_tombstones(
    tombstones: Vec<Tombstone>,
    key: &SecretKey,
) -> Result<Vec<SignedTombstone>, CodecError> {
    tombstones
        .into_iter()
        .map(|tombstone| {
            let bytes = tombstone.signable_bytes()?;
            Ok(SignedTombstone {
                tombstone,
                signatures: SignatureBundle::sign(&bytes, key),
            })
        })
        .collect()
}

fn now_millis() -> u64 {
    chrono::Utc::now().timestamp_millis() as u64
}

fn random_nonce() -> u64 {
    let mut bytes = [0u8; 8];
    getrandom::getrandom(&mut bytes).expect("failed to generate random bytes");
    u64::from_le_bytes(bytes)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_one_tombstone_per_device() {
        let datastore_id = SecretKey::generate().fingerprint();
        let uuid = Uuid::new_v4();
        let devices = vec![DeviceId::new("d1"), DeviceId::new("d2")];

        let tombstones = inode_tombstones(datastore_id, uuid, devices.clone());
        assert_eq!(tombstones.len(), 2);

        let mut covered: Vec<&DeviceId> = tombstones.iter().map(|t| &t.device_id).collect();
        covered.sort();
        assert_eq!(covered, devices.iter().collect::<Vec<_>>());

        for tombstone in &tombstones {
            assert!(matches!(
                &tombstone.scope,
                TombstoneScope::Inode { datastore_id: id, uuid: u } if *id == datastore_id && *u == uuid
            ));
        }
    }

    #[test]
    fn test_signed_tombstones_verify_against_owner() {
        let key = SecretKey::generate();
        let owner = key.fingerprint();
        let tombstones = mutable_data_tombstones(
            "some-data-id",
            vec![DeviceId::new("d1"), DeviceId::new("d2")],
        );

        let signed = sign_tombstones(tombstones, &key).unwrap();
        assert_eq!(signed.len(), 2);
        for tombstone in &signed {
            assert!(tombstone.verify(&owner).unwrap());
        }

        let other_owner = SecretKey::generate().fingerprint();
        for tombstone in &signed {
            assert!(!tombstone.verify(&other_owner).unwrap());
        }
    }

    #[test]
    fn test_tombstones_are_unique_per_issue() {
        let datastore_id = SecretKey::generate().fingerprint();
        let uuid = Uuid::new_v4();
        let device = DeviceId::new("d1");

        // Same scope, same device, issued twice: the nonce keeps the
        // signable bytes distinct.
        let first = Tombstone::new_inode(datastore_id, uuid, device.clone());
        let second = Tombstone::new_inode(datastore_id, uuid, device);
        assert_ne!(
            first.signable_bytes().unwrap(),
            second.signable_bytes().unwrap()
        );
    }

    #[test]
    fn test_signed_tombstone_serde_round_trip() {
        let key = SecretKey::generate();
        let tombstone = Tombstone::new_inode(
            key.fingerprint(),
            Uuid::new_v4(),
            DeviceId::new("d1"),
        );
        let signed = sign_tombstones(vec![tombstone], &key)
            .unwrap()
            .remove(0);

        let json = serde_json::to_string(&signed).unwrap();
        let recovered: SignedTombstone = serde_json::from_str(&json).unwrap();
        assert_eq!(signed, recovered);
        assert!(recovered.verify(&key.fingerprint()).unwrap());
    }
}
