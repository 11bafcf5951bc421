//! Datastore descriptors
//!
//! The descriptor is the trust anchor of a datastore: it names the owning
//! public key, the devices allowed to write lineages, the storage drivers
//! the backend may use, and the uuid of the root directory. It travels as
//! the payload of a [`MutableDatum`] keyed by the datastore id, signed
//! like every other mutable artifact.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::codec::{CanonicalEncode, CodecError};
use crate::crypto::{DatastoreId, DeviceId, PublicKey};
use crate::inode::MutableDatum;

/// Errors that can occur when unpacking a descriptor
#[derive(Debug, thiserror::Error)]
pub enum DescriptorError {
    #[error("descriptor owner mismatch: datum owned by {datum_owner}, descriptor key fingerprints to {descriptor_owner}")]
    OwnerMismatch {
        datum_owner: DatastoreId,
        descriptor_owner: DatastoreId,
    },
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

/// Flavor of namespace a descriptor announces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatastoreKind {
    /// A single-owner hierarchical namespace
    Datastore,
    /// A flat grouping of datastores under one key
    Collection,
}

/// Root metadata of a datastore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatastoreDescriptor {
    pub kind: DatastoreKind,
    pub owner_public_key: PublicKey,
    /// Storage drivers the backend may place payloads on, in preference order
    pub drivers: Vec<String>,
    /// Devices allowed to write version lineages in this datastore
    pub device_ids: BTreeSet<DeviceId>,
    /// Uuid of the root directory inode
    pub root_uuid: Uuid,
}

impl CanonicalEncode for DatastoreDescriptor {}

impl DatastoreDescriptor {
    pub fn new(
        kind: DatastoreKind,
        owner_public_key: PublicKey,
        drivers: Vec<String>,
        device_ids: BTreeSet<DeviceId>,
        root_uuid: Uuid,
    ) -> Self {
        Self {
            kind,
            owner_public_key,
            drivers,
            device_ids,
            root_uuid,
        }
    }

    /// The id this descriptor belongs under: the owner key's fingerprint.
    pub fn datastore_id(&self) -> DatastoreId {
        self.owner_public_key.fingerprint()
    }

    pub fn contains_device(&self, device_id: &DeviceId) -> bool {
        self.device_ids.contains(device_id)
    }

    /// Package this descriptor as the payload of a mutable datum keyed by
    /// the datastore id.
    pub fn to_datum(&self, device_id: DeviceId, version: u64) -> Result<MutableDatum, CodecError> {
        let payload = self.encode()?;
        Ok(MutableDatum::new(
            self.datastore_id().to_hex(),
            self.datastore_id(),
            payload,
            device_id,
            version,
        ))
    }

    /// Unpack a descriptor from a fetched datum.
    ///
    /// Checks that the descriptor's own key fingerprints to the datum's
    /// recorded owner, so a datum cannot smuggle in a descriptor for a
    /// different key.
    pub fn from_datum(datum: &MutableDatum) -> Result<Self, DescriptorError> {
        let descriptor = Self::decode(&datum.payload)?;
        let descriptor_owner = descriptor.datastore_id();
        if descriptor_owner != datum.owner {
            return Err(DescriptorError::OwnerMismatch {
                datum_owner: datum.owner,
                descriptor_owner,
            });
        }
        Ok(descriptor)
    }
}
