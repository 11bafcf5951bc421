use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use common::codec::{ContentHash, HexBytes};
use common::crypto::{DatastoreId, DeviceId, SignatureBundle};
use common::descriptor::DatastoreDescriptor;
use common::inode::{InodeKind, InodeRecord, MutableDatum};
use common::tombstone::{SignedTombstone, TombstoneScope};

use super::{
    Ack, CreationBundle, DescriptorResponse, FileResponse, Gateway, InodeResponse, Mutation,
    Operation, TombstoneBundle, TypedResponse,
};
use crate::error::DatastoreError;

/// In-memory backend holding datastores in HashMaps.
///
/// This is not a mock: it enforces the same contract a real backend
/// does. Signatures must verify against the owner, payloads must hash to
/// their headers, versions must strictly advance per device lineage,
/// deletion proofs must cover every device, and a mutation applies all
/// of its records or none of them.
#[derive(Debug, Clone, Default)]
pub struct MemoryGateway {
    inner: Arc<RwLock<MemoryGatewayInner>>,
}

#[derive(Debug, Default)]
struct MemoryGatewayInner {
    datastores: HashMap<DatastoreId, StoredDatastore>,
}

#[derive(Debug)]
struct StoredDatastore {
    descriptor: DatastoreDescriptor,
    descriptor_datum: MutableDatum,
    descriptor_signatures: SignatureBundle,
    inodes: HashMap<Uuid, StoredInode>,
    /// Highest version accepted per (inode, device) lineage
    watermarks: HashMap<(Uuid, DeviceId), u64>,
    /// Pre-signed root deletion proofs handed over at creation
    root_tombstones: Vec<SignedTombstone>,
    /// Deletion proofs accepted through mutations
    applied_tombstones: Vec<SignedTombstone>,
    /// Uuids whose lineages are terminated
    tombstoned: HashSet<Uuid>,
}

#[derive(Debug, Clone)]
struct StoredInode {
    record: InodeRecord,
    payload: HexBytes,
    signatures: SignatureBundle,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a datastore is currently stored.
    pub fn contains_datastore(&self, datastore_id: &DatastoreId) -> bool {
        self.inner.read().datastores.contains_key(datastore_id)
    }

    /// Highest version accepted for one (inode, device) lineage.
    pub fn watermark(
        &self,
        datastore_id: &DatastoreId,
        uuid: Uuid,
        device_id: &DeviceId,
    ) -> Option<u64> {
        self.inner
            .read()
            .datastores
            .get(datastore_id)
            .and_then(|store| store.watermarks.get(&(uuid, device_id.clone())).copied())
    }

    /// Deletion proofs accepted for one inode, in arrival order.
    pub fn tombstones_for(&self, datastore_id: &DatastoreId, uuid: Uuid) -> Vec<SignedTombstone> {
        let inner = self.inner.read();
        let Some(store) = inner.datastores.get(datastore_id) else {
            return Vec::new();
        };
        store
            .applied_tombstones
            .iter()
            .filter(|tombstone| {
                matches!(
                    tombstone.scope(),
                    TombstoneScope::Inode { uuid: covered, .. } if *covered == uuid
                )
            })
            .cloned()
            .collect()
    }

    /// Overwrite one stored inode without touching watermarks or running
    /// any validation. Simulates a lagging or rolled-back replica serving
    /// an old version it once legitimately held.
    pub fn inject_inode(
        &self,
        datastore_id: &DatastoreId,
        record: InodeRecord,
        payload: HexBytes,
        signatures: SignatureBundle,
    ) {
        let mut inner = self.inner.write();
        if let Some(store) = inner.datastores.get_mut(datastore_id) {
            store.inodes.insert(
                record.header.uuid,
                StoredInode {
                    record,
                    payload,
                    signatures,
                },
            );
        }
    }

    fn create(&self, bundle: CreationBundle) -> Result<Ack, DatastoreError> {
        let descriptor = DatastoreDescriptor::from_datum(&bundle.descriptor_datum)?;
        let datastore_id = descriptor.datastore_id();
        if datastore_id != bundle.datastore_id {
            return Err(DatastoreError::InvalidRequest(format!(
                "bundle addressed to {}, descriptor fingerprints to {}",
                bundle.datastore_id, datastore_id
            )));
        }

        // Descriptor and root must both verify against the owner.
        let descriptor_bytes = bundle.descriptor_datum.header().signable_bytes()?;
        if !bundle
            .descriptor_signatures
            .verify(&descriptor_bytes, &datastore_id)
        {
            return Err(DatastoreError::AccessDenied(
                "descriptor signature does not verify against owner".to_string(),
            ));
        }

        if bundle.root_record.kind != InodeKind::Dir {
            return Err(DatastoreError::InvalidRequest(
                "root inode must be a directory".to_string(),
            ));
        }
        if bundle.root_record.header.uuid != descriptor.root_uuid {
            return Err(DatastoreError::InvalidRequest(
                "root record uuid does not match descriptor".to_string(),
            ));
        }
        verify_record(
            &bundle.root_record,
            &bundle.root_payload,
            &bundle.root_signatures,
            &datastore_id,
        )?;

        // Root deletion proofs: one valid tombstone per device.
        let expected_scope = TombstoneScope::Inode {
            datastore_id,
            uuid: descriptor.root_uuid,
        };
        verify_tombstone_coverage(
            &bundle.root_tombstones,
            &expected_scope,
            &descriptor,
            &datastore_id,
        )?;

        let mut inner = self.inner.write();
        if inner.datastores.contains_key(&datastore_id) {
            return Err(DatastoreError::Exists(format!(
                "datastore {} already exists",
                datastore_id
            )));
        }

        let mut watermarks = HashMap::new();
        watermarks.insert(
            (
                bundle.root_record.header.uuid,
                bundle.root_record.header.device_id.clone(),
            ),
            bundle.root_record.header.version,
        );
        watermarks.insert(
            (
                bundle.descriptor_datum.uuid,
                bundle.descriptor_datum.device_id.clone(),
            ),
            bundle.descriptor_datum.version,
        );

        let mut inodes = HashMap::new();
        inodes.insert(
            bundle.root_record.header.uuid,
            StoredInode {
                record: bundle.root_record,
                payload: bundle.root_payload,
                signatures: bundle.root_signatures,
            },
        );

        inner.datastores.insert(
            datastore_id,
            StoredDatastore {
                descriptor,
                descriptor_datum: bundle.descriptor_datum,
                descriptor_signatures: bundle.descriptor_signatures,
                inodes,
                watermarks,
                root_tombstones: bundle.root_tombstones,
                applied_tombstones: Vec::new(),
                tombstoned: HashSet::new(),
            },
        );

        Ok(Ack { datastore_id })
    }

    fn fetch_descriptor(
        &self,
        datastore_id: &DatastoreId,
    ) -> Result<DescriptorResponse, DatastoreError> {
        let inner = self.inner.read();
        let store = inner
            .datastores
            .get(datastore_id)
            .ok_or_else(|| DatastoreError::NotFound(format!("datastore {}", datastore_id)))?;

        Ok(DescriptorResponse {
            datum: store.descriptor_datum.clone(),
            signatures: store.descriptor_signatures.clone(),
        })
    }

    fn fetch_inode(
        &self,
        datastore_id: &DatastoreId,
        uuid: Uuid,
        extended: bool,
    ) -> Result<InodeResponse, DatastoreError> {
        let inner = self.inner.read();
        let store = inner
            .datastores
            .get(datastore_id)
            .ok_or_else(|| DatastoreError::NotFound(format!("datastore {}", datastore_id)))?;
        let stored = store
            .inodes
            .get(&uuid)
            .ok_or_else(|| DatastoreError::NotFound(format!("inode {}", uuid)))?;

        let payload = match stored.record.kind {
            InodeKind::Dir => Some(stored.payload.clone()),
            InodeKind::File => None,
        };

        Ok(InodeResponse {
            record: stored.record.clone(),
            payload,
            signatures: extended.then(|| stored.signatures.clone()),
        })
    }

    fn fetch_file(
        &self,
        datastore_id: &DatastoreId,
        uuid: Uuid,
        extended: bool,
    ) -> Result<FileResponse, DatastoreError> {
        let inner = self.inner.read();
        let store = inner
            .datastores
            .get(datastore_id)
            .ok_or_else(|| DatastoreError::NotFound(format!("datastore {}", datastore_id)))?;
        let stored = store
            .inodes
            .get(&uuid)
            .ok_or_else(|| DatastoreError::NotFound(format!("inode {}", uuid)))?;

        if stored.record.kind != InodeKind::File {
            return Err(DatastoreError::InvalidRequest(format!(
                "inode {} is not a file",
                uuid
            )));
        }

        Ok(FileResponse {
            record: stored.record.clone(),
            content: stored.payload.clone(),
            signatures: extended.then(|| stored.signatures.clone()),
        })
    }

    fn mutate(&self, mutation: Mutation) -> Result<Ack, DatastoreError> {
        mutation.validate_shape()?;

        let mut inner = self.inner.write();
        let store = inner
            .datastores
            .get_mut(&mutation.datastore_id)
            .ok_or_else(|| {
                DatastoreError::NotFound(format!("datastore {}", mutation.datastore_id))
            })?;

        if !store.descriptor.contains_device(&mutation.device_id) {
            return Err(DatastoreError::AccessDenied(format!(
                "device {} is not in the datastore device set",
                mutation.device_id
            )));
        }

        // Validate every artifact before touching any state, so a
        // rejected mutation leaves the datastore exactly as it was.
        let owner = store.descriptor.datastore_id();
        for (idx, record) in mutation.records.iter().enumerate() {
            if record.header.device_id != mutation.device_id {
                return Err(DatastoreError::InvalidRequest(format!(
                    "record {} stamped with device {}, request from {}",
                    idx, record.header.device_id, mutation.device_id
                )));
            }
            if store.tombstoned.contains(&record.header.uuid) {
                return Err(DatastoreError::InvalidRequest(format!(
                    "inode {} is tombstoned",
                    record.header.uuid
                )));
            }
            verify_record(
                record,
                &mutation.payloads[idx],
                &mutation.signatures[idx],
                &owner,
            )?;

            let lineage = (record.header.uuid, record.header.device_id.clone());
            if let Some(watermark) = store.watermarks.get(&lineage) {
                if record.header.version <= *watermark {
                    return Err(DatastoreError::StaleVersion(format!(
                        "inode {} version {} at or below watermark {} for device {}",
                        record.header.uuid, record.header.version, watermark, mutation.device_id
                    )));
                }
            }
        }

        for tombstone in &mutation.tombstones {
            match tombstone.scope() {
                TombstoneScope::Inode { datastore_id, .. }
                    if *datastore_id == mutation.datastore_id => {}
                _ => {
                    return Err(DatastoreError::InvalidRequest(
                        "mutation tombstone must cover an inode in this datastore".to_string(),
                    ))
                }
            }
            if !tombstone.verify(&owner)? {
                return Err(DatastoreError::AccessDenied(
                    "tombstone signature does not verify against owner".to_string(),
                ));
            }
        }

        // Commit.
        for (idx, record) in mutation.records.iter().enumerate() {
            store.watermarks.insert(
                (record.header.uuid, record.header.device_id.clone()),
                record.header.version,
            );
            store.inodes.insert(
                record.header.uuid,
                StoredInode {
                    record: record.clone(),
                    payload: mutation.payloads[idx].clone(),
                    signatures: mutation.signatures[idx].clone(),
                },
            );
        }
        for tombstone in mutation.tombstones {
            if let TombstoneScope::Inode { uuid, .. } = tombstone.scope() {
                store.inodes.remove(uuid);
                store.tombstoned.insert(*uuid);
            }
            store.applied_tombstones.push(tombstone);
        }

        Ok(Ack {
            datastore_id: mutation.datastore_id,
        })
    }

    fn delete_datastore(&self, bundle: TombstoneBundle) -> Result<Ack, DatastoreError> {
        let mut inner = self.inner.write();
        let store = inner.datastores.get(&bundle.datastore_id).ok_or_else(|| {
            DatastoreError::NotFound(format!("datastore {}", bundle.datastore_id))
        })?;

        let descriptor = store.descriptor.clone();
        let datastore_id = descriptor.datastore_id();

        let descriptor_scope = TombstoneScope::MutableData {
            data_id: datastore_id.to_hex(),
        };
        verify_tombstone_coverage(
            &bundle.descriptor_tombstones,
            &descriptor_scope,
            &descriptor,
            &datastore_id,
        )?;

        let root_scope = TombstoneScope::Inode {
            datastore_id,
            uuid: descriptor.root_uuid,
        };
        verify_tombstone_coverage(
            &bundle.root_tombstones,
            &root_scope,
            &descriptor,
            &datastore_id,
        )?;

        inner.datastores.remove(&bundle.datastore_id);
        Ok(Ack {
            datastore_id: bundle.datastore_id,
        })
    }
}

/// Payload must hash to the header's commitment and the signature must
/// verify against the owner.
fn verify_record(
    record: &InodeRecord,
    payload: &HexBytes,
    signatures: &SignatureBundle,
    owner: &DatastoreId,
) -> Result<(), DatastoreError> {
    let actual = ContentHash::of(payload);
    if actual != record.header.payload_hash {
        return Err(DatastoreError::InvalidRequest(format!(
            "payload for inode {} hashes to {}, header commits to {}",
            record.header.uuid, actual, record.header.payload_hash
        )));
    }

    let bytes = record.signable_bytes()?;
    if !signatures.verify(&bytes, owner) {
        return Err(DatastoreError::AccessDenied(format!(
            "signature for inode {} does not verify against owner",
            record.header.uuid
        )));
    }
    Ok(())
}

/// Every device in the descriptor must be covered by a verifying
/// tombstone of the expected scope.
fn verify_tombstone_coverage(
    tombstones: &[SignedTombstone],
    expected_scope: &TombstoneScope,
    descriptor: &DatastoreDescriptor,
    owner: &DatastoreId,
) -> Result<(), DatastoreError> {
    let mut covered: HashSet<&DeviceId> = HashSet::new();
    for tombstone in tombstones {
        if tombstone.scope() != expected_scope {
            return Err(DatastoreError::InvalidRequest(
                "tombstone scope does not match the object being deleted".to_string(),
            ));
        }
        if !tombstone.verify(owner)? {
            return Err(DatastoreError::AccessDenied(
                "tombstone signature does not verify against owner".to_string(),
            ));
        }
        covered.insert(tombstone.device_id());
    }

    for device_id in &descriptor.device_ids {
        if !covered.contains(device_id) {
            return Err(DatastoreError::InvalidRequest(format!(
                "no tombstone covers device {}",
                device_id
            )));
        }
    }
    Ok(())
}

#[async_trait]
impl Gateway for MemoryGateway {
    async fn submit(&self, operation: Operation) -> Result<TypedResponse, DatastoreError> {
        match operation {
            Operation::Create(bundle) => Ok(TypedResponse::Ack(self.create(bundle)?)),
            Operation::FetchDescriptor { datastore_id } => Ok(TypedResponse::Descriptor(
                self.fetch_descriptor(&datastore_id)?,
            )),
            Operation::FetchInode {
                datastore_id,
                uuid,
                extended,
            } => Ok(TypedResponse::Inode(
                self.fetch_inode(&datastore_id, uuid, extended)?,
            )),
            Operation::FetchFile {
                datastore_id,
                uuid,
                extended,
            } => Ok(TypedResponse::File(
                self.fetch_file(&datastore_id, uuid, extended)?,
            )),
            Operation::Mutate(mutation) => Ok(TypedResponse::Ack(self.mutate(mutation)?)),
            Operation::DeleteDatastore(bundle) => {
                Ok(TypedResponse::Ack(self.delete_datastore(bundle)?))
            }
        }
    }
}
