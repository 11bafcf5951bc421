//! Connected-datastore state shared across operations.

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use common::crypto::{DatastoreId, DeviceId, SecretKey};
use common::descriptor::{DatastoreDescriptor, DatastoreKind};

use crate::gateway::Gateway;
use crate::versions::VersionWatermarks;

/// Everything needed to connect to (or create) a datastore.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Owner key; its fingerprint is the datastore id unless one is given
    pub secret_key: SecretKey,
    /// The device this client writes lineages as
    pub device_id: DeviceId,
    /// Connect to a specific datastore instead of the key's own
    pub datastore_id: Option<DatastoreId>,
    /// Storage drivers to request at creation, in preference order
    pub drivers: Vec<String>,
    /// Full device set to enroll at creation
    pub all_device_ids: BTreeSet<DeviceId>,
    pub kind: DatastoreKind,
}

impl ConnectOptions {
    pub fn new(secret_key: SecretKey, device_id: DeviceId) -> Self {
        let mut all_device_ids = BTreeSet::new();
        all_device_ids.insert(device_id.clone());
        Self {
            secret_key,
            device_id,
            datastore_id: None,
            drivers: vec!["disk".to_string()],
            all_device_ids,
            kind: DatastoreKind::Datastore,
        }
    }

    pub fn with_datastore_id(mut self, datastore_id: DatastoreId) -> Self {
        self.datastore_id = Some(datastore_id);
        self
    }

    pub fn with_drivers(mut self, drivers: Vec<String>) -> Self {
        self.drivers = drivers;
        self
    }

    /// Enroll additional devices at creation. The connecting device is
    /// always part of the set.
    pub fn with_device_ids(mut self, device_ids: impl IntoIterator<Item = DeviceId>) -> Self {
        self.all_device_ids.extend(device_ids);
        self.all_device_ids.insert(self.device_id.clone());
        self
    }

    pub fn with_kind(mut self, kind: DatastoreKind) -> Self {
        self.kind = kind;
        self
    }

    /// The id this client will address: the explicit one if set, else the
    /// key's own fingerprint.
    pub fn target_datastore_id(&self) -> DatastoreId {
        self.datastore_id
            .unwrap_or_else(|| self.secret_key.fingerprint())
    }
}

/// A live connection to one datastore.
///
/// Cheap to clone; clones share the gateway and the watermark table, so
/// staleness observed through one handle protects every other handle.
#[derive(Debug, Clone)]
pub struct DatastoreContext {
    gateway: Arc<dyn Gateway>,
    datastore_id: DatastoreId,
    device_id: DeviceId,
    secret_key: SecretKey,
    descriptor: DatastoreDescriptor,
    watermarks: Arc<Mutex<VersionWatermarks>>,
}

impl DatastoreContext {
    pub(crate) fn new(
        gateway: Arc<dyn Gateway>,
        datastore_id: DatastoreId,
        device_id: DeviceId,
        secret_key: SecretKey,
        descriptor: DatastoreDescriptor,
    ) -> Self {
        Self {
            gateway,
            datastore_id,
            device_id,
            secret_key,
            descriptor,
            watermarks: Arc::new(Mutex::new(VersionWatermarks::new())),
        }
    }

    pub fn gateway(&self) -> &Arc<dyn Gateway> {
        &self.gateway
    }

    pub fn datastore_id(&self) -> DatastoreId {
        self.datastore_id
    }

    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    pub fn descriptor(&self) -> &DatastoreDescriptor {
        &self.descriptor
    }

    pub fn root_uuid(&self) -> Uuid {
        self.descriptor.root_uuid
    }

    pub(crate) fn secret_key(&self) -> &SecretKey {
        &self.secret_key
    }

    /// Identity stamped as the writer on records this client authors.
    pub fn writer(&self) -> DatastoreId {
        self.secret_key.fingerprint()
    }

    pub(crate) fn observe_version(&self, uuid: Uuid, device_id: &DeviceId, version: u64) {
        self.watermarks.lock().observe(uuid, device_id, version);
    }

    pub(crate) fn check_version(
        &self,
        uuid: Uuid,
        device_id: &DeviceId,
        version: u64,
    ) -> Result<(), crate::error::DatastoreError> {
        self.watermarks.lock().check(uuid, device_id, version)
    }

    pub(crate) fn version_at_least(&self, uuid: Uuid, device_id: &DeviceId, candidate: u64) -> u64 {
        self.watermarks.lock().at_least(uuid, device_id, candidate)
    }

    /// Highest version this client has observed for a lineage.
    pub fn observed_version(&self, uuid: Uuid, device_id: &DeviceId) -> Option<u64> {
        self.watermarks.lock().observed(uuid, device_id)
    }
}
