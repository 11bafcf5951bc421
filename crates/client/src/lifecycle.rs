//! Datastore lifecycle
//!
//! A datastore is born as three artifacts signed in one sitting: the
//! descriptor datum, an empty root directory at version 1, and one root
//! tombstone per enrolled device. Packaging the tombstones at creation
//! means deleting the datastore later needs no extra membership round
//! trip. Connecting fetches and verifies the descriptor, then checks the
//! connecting device is enrolled.

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use common::codec::HexBytes;
use common::crypto::SignatureBundle;
use common::descriptor::DatastoreDescriptor;
use common::inode::DirInode;
use common::tombstone::{inode_tombstones, mutable_data_tombstones, sign_tombstones};

use crate::context::{ConnectOptions, DatastoreContext};
use crate::error::DatastoreError;
use crate::gateway::{CreationBundle, Gateway, Operation, TombstoneBundle};

/// Assemble the signed artifacts that bring a datastore into existence.
///
/// The datastore id is always the key's own fingerprint; a key cannot
/// create a datastore it does not own.
pub fn create_request(options: &ConnectOptions) -> Result<CreationBundle, DatastoreError> {
    let datastore_id = options.secret_key.fingerprint();
    let root_uuid = Uuid::new_v4();

    let mut device_ids = options.all_device_ids.clone();
    device_ids.insert(options.device_id.clone());

    let descriptor = DatastoreDescriptor::new(
        options.kind,
        options.secret_key.public(),
        options.drivers.clone(),
        device_ids.clone(),
        root_uuid,
    );
    let descriptor_datum = descriptor.to_datum(options.device_id.clone(), 1)?;
    let descriptor_signatures = SignatureBundle::sign(
        &descriptor_datum.header().signable_bytes()?,
        &options.secret_key,
    );

    let root = DirInode::empty_root(
        datastore_id,
        datastore_id,
        root_uuid,
        options.device_id.clone(),
    );
    let root_record = root.record()?;
    let root_payload = HexBytes::from(root.payload_bytes()?);
    let root_signatures =
        SignatureBundle::sign(&root_record.signable_bytes()?, &options.secret_key);

    let root_tombstones = sign_tombstones(
        inode_tombstones(datastore_id, root_uuid, device_ids),
        &options.secret_key,
    )?;

    Ok(CreationBundle {
        datastore_id,
        descriptor_datum,
        descriptor_signatures,
        root_record,
        root_payload,
        root_signatures,
        root_tombstones,
    })
}

/// Connect to an existing datastore.
///
/// Fetches the descriptor, verifies its signature against the dialed id,
/// re-derives the id from the descriptor's own key, and checks the
/// connecting device is enrolled. Any of those failing is
/// [`DatastoreError::AccessDenied`], not a softer error: a descriptor
/// that does not verify is indistinguishable from a hostile backend.
pub async fn connect(
    gateway: Arc<dyn Gateway>,
    options: ConnectOptions,
) -> Result<DatastoreContext, DatastoreError> {
    let datastore_id = options.target_datastore_id();
    debug!(datastore_id = %datastore_id, device_id = %options.device_id, "connecting to datastore");

    let response = gateway
        .submit(Operation::FetchDescriptor { datastore_id })
        .await?
        .into_descriptor("fetch-descriptor")?;

    let bytes = response.datum.header().signable_bytes()?;
    if !response.signatures.verify(&bytes, &datastore_id) {
        return Err(DatastoreError::AccessDenied(format!(
            "descriptor for {} does not verify against its owner",
            datastore_id
        )));
    }

    let descriptor = DatastoreDescriptor::from_datum(&response.datum)?;
    if descriptor.datastore_id() != datastore_id {
        return Err(DatastoreError::AccessDenied(format!(
            "descriptor fingerprints to {}, expected {}",
            descriptor.datastore_id(),
            datastore_id
        )));
    }

    if !descriptor.contains_device(&options.device_id) {
        return Err(DatastoreError::AccessDenied(format!(
            "device {} is not enrolled in datastore {}",
            options.device_id, datastore_id
        )));
    }

    let context = DatastoreContext::new(
        gateway,
        datastore_id,
        options.device_id,
        options.secret_key,
        descriptor,
    );
    context.observe_version(
        response.datum.uuid,
        &response.datum.device_id,
        response.datum.version,
    );
    Ok(context)
}

/// Connect, creating the datastore first if it does not exist yet.
///
/// Creation only makes sense for the key's own datastore, so a missing
/// foreign datastore stays [`DatastoreError::NotFound`]. After a create
/// the connect is retried exactly once.
pub async fn connect_or_create(
    gateway: Arc<dyn Gateway>,
    options: ConnectOptions,
) -> Result<DatastoreContext, DatastoreError> {
    match connect(gateway.clone(), options.clone()).await {
        Err(DatastoreError::NotFound(_))
            if options.target_datastore_id() == options.secret_key.fingerprint() =>
        {
            debug!(datastore_id = %options.target_datastore_id(), "datastore missing, creating it");
            let bundle = create_request(&options)?;
            gateway
                .submit(Operation::Create(bundle))
                .await?
                .into_ack("create")?;
            connect(gateway, options).await
        }
        other => other,
    }
}

/// Assemble the deletion proofs for a whole datastore: its descriptor
/// datum and its root inode, each covered once per enrolled device.
pub fn delete_datastore_request(
    context: &DatastoreContext,
) -> Result<TombstoneBundle, DatastoreError> {
    let datastore_id = context.datastore_id();
    let device_ids = context.descriptor().device_ids.clone();

    let descriptor_tombstones = sign_tombstones(
        mutable_data_tombstones(&datastore_id.to_hex(), device_ids.clone()),
        context.secret_key(),
    )?;
    let root_tombstones = sign_tombstones(
        inode_tombstones(datastore_id, context.root_uuid(), device_ids),
        context.secret_key(),
    )?;

    Ok(TombstoneBundle {
        datastore_id,
        descriptor_tombstones,
        root_tombstones,
    })
}

/// Delete a datastore outright.
///
/// Callers that pre-built proofs (at creation time, say) can pass them
/// in; otherwise a fresh bundle is signed here.
pub async fn delete_datastore(
    context: &DatastoreContext,
    request: Option<TombstoneBundle>,
) -> Result<(), DatastoreError> {
    let bundle = match request {
        Some(bundle) => bundle,
        None => delete_datastore_request(context)?,
    };

    debug!(datastore_id = %bundle.datastore_id, "deleting datastore");
    context
        .gateway()
        .submit(Operation::DeleteDatastore(bundle))
        .await?
        .into_ack("delete-datastore")?;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::gateway::MemoryGateway;
    use common::crypto::{DeviceId, SecretKey};

    fn options_for(key: &SecretKey, device: &str) -> ConnectOptions {
        ConnectOptions::new(key.clone(), DeviceId::new(device))
    }

    #[tokio::test]
    async fn test_connect_missing_datastore() {
        let gateway = Arc::new(MemoryGateway::new());
        let key = SecretKey::generate();

        let err = connect(gateway, options_for(&key, "d1")).await.unwrap_err();
        assert!(matches!(err, DatastoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_connect_or_create_then_reconnect() {
        let gateway = Arc::new(MemoryGateway::new());
        let memory = gateway.as_ref().clone();
        let key = SecretKey::generate();

        let context = connect_or_create(gateway.clone(), options_for(&key, "d1"))
            .await
            .unwrap();
        assert_eq!(context.datastore_id(), key.fingerprint());
        assert!(memory.contains_datastore(&context.datastore_id()));

        // Second call finds the datastore and plainly connects.
        let again = connect_or_create(gateway, options_for(&key, "d1"))
            .await
            .unwrap();
        assert_eq!(again.root_uuid(), context.root_uuid());
    }

    #[tokio::test]
    async fn test_connect_rejects_unenrolled_device() {
        let gateway = Arc::new(MemoryGateway::new());
        let key = SecretKey::generate();

        connect_or_create(gateway.clone(), options_for(&key, "d1"))
            .await
            .unwrap();

        let err = connect(gateway, options_for(&key, "d2")).await.unwrap_err();
        assert!(matches!(err, DatastoreError::AccessDenied(_)));
    }

    #[tokio::test]
    async fn test_connect_or_create_does_not_create_foreign_datastores() {
        let gateway = Arc::new(MemoryGateway::new());
        let key = SecretKey::generate();
        let foreign = SecretKey::generate().fingerprint();

        let options = options_for(&key, "d1").with_datastore_id(foreign);
        let err = connect_or_create(gateway, options).await.unwrap_err();
        assert!(matches!(err, DatastoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_datastore() {
        let gateway = Arc::new(MemoryGateway::new());
        let memory = gateway.as_ref().clone();
        let key = SecretKey::generate();

        let context = connect_or_create(gateway, options_for(&key, "d1"))
            .await
            .unwrap();
        let datastore_id = context.datastore_id();

        delete_datastore(&context, None).await.unwrap();
        assert!(!memory.contains_datastore(&datastore_id));

        let err = delete_datastore(&context, None).await.unwrap_err();
        assert!(matches!(err, DatastoreError::NotFound(_)));
    }
}
