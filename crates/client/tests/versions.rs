//! Integration tests for version watermarks and the backend contract

mod common;

use ::common::codec::{ContentHash, HexBytes};
use ::common::crypto::{DeviceId, SecretKey, SignatureBundle};
use ::common::inode::{DirInode, FileInode, Inode, InodeKind, InodeRecord};
use client::context::DatastoreContext;
use client::error::DatastoreError;
use client::gateway::{Gateway, Mutation, MutationVerb, Operation};
use client::ops::FetchOptions;
use uuid::Uuid;

#[tokio::test]
async fn test_stale_root_is_rejected() {
    let (context, memory, _) = common::setup_datastore().await;

    // Capture the v1 root as the backend serves it today
    let stale = memory
        .submit(Operation::FetchInode {
            datastore_id: context.datastore_id(),
            uuid: context.root_uuid(),
            extended: true,
        })
        .await
        .unwrap()
        .into_inode("fetch-inode")
        .unwrap();

    // Move the namespace forward, then roll the backend back to v1
    context.mkdir("/docs").await.unwrap();
    memory.inject_inode(
        &context.datastore_id(),
        stale.record,
        stale.payload.unwrap(),
        stale.signatures.unwrap(),
    );

    let result = context.list_dir("/").await;
    assert!(matches!(result, Err(DatastoreError::StaleVersion(_))));
}

#[tokio::test]
async fn test_force_accepts_stale_root() {
    let (context, memory, _) = common::setup_datastore().await;

    let stale = memory
        .submit(Operation::FetchInode {
            datastore_id: context.datastore_id(),
            uuid: context.root_uuid(),
            extended: true,
        })
        .await
        .unwrap()
        .into_inode("fetch-inode")
        .unwrap();

    context.mkdir("/docs").await.unwrap();
    memory.inject_inode(
        &context.datastore_id(),
        stale.record,
        stale.payload.unwrap(),
        stale.signatures.unwrap(),
    );

    // Forcing swallows the rollback and serves the old, empty root
    let options = FetchOptions {
        force: true,
        ..Default::default()
    };
    let inode = context.lookup_with("/", options).await.unwrap();
    match inode {
        Inode::Dir(dir) => assert!(dir.is_empty()),
        Inode::File(_) => panic!("root resolved to a file"),
    }
}

#[tokio::test]
async fn test_watermarks_track_writes() {
    let (context, _, _) = common::setup_datastore().await;
    let device = DeviceId::new(common::DEVICE_ONE);

    assert_eq!(
        context.observed_version(context.root_uuid(), &device),
        None
    );

    context.mkdir("/docs").await.unwrap();

    assert_eq!(
        context.observed_version(context.root_uuid(), &device),
        Some(2)
    );
}

/// Hand-roll a put-file mutation against the current root, signed by the
/// given key. Lets the tests probe the backend contract directly.
fn craft_put(
    context: &DatastoreContext,
    key: &SecretKey,
    root: DirInode,
    name: &str,
    content: &[u8],
) -> Mutation {
    let uuid = Uuid::new_v4();
    let file = FileInode::new(
        context.datastore_id(),
        context.writer(),
        uuid,
        ContentHash::of(content),
        context.device_id().clone(),
        1,
    );
    let parent = root
        .link(InodeKind::File, name, uuid, false)
        .authored_by(context.writer(), context.device_id().clone());

    let file_record = file.record();
    let parent_record = parent.record().unwrap();
    let sign =
        |record: &InodeRecord| SignatureBundle::sign(&record.signable_bytes().unwrap(), key);

    Mutation {
        datastore_id: context.datastore_id(),
        device_id: context.device_id().clone(),
        verb: MutationVerb::PutFile,
        path: format!("/{}", name),
        records: vec![file_record.clone(), parent_record.clone()],
        payloads: vec![
            HexBytes::from(content),
            HexBytes::from(parent.payload_bytes().unwrap()),
        ],
        signatures: vec![sign(&file_record), sign(&parent_record)],
        tombstones: Vec::new(),
    }
}

async fn current_root(context: &DatastoreContext) -> DirInode {
    match context.lookup("/").await.unwrap() {
        Inode::Dir(dir) => dir,
        Inode::File(_) => panic!("root resolved to a file"),
    }
}

#[tokio::test]
async fn test_replayed_mutation_is_rejected() {
    let (context, memory, key) = common::setup_datastore().await;
    let root = current_root(&context).await;

    let mutation = craft_put(&context, &key, root, "f.bin", b"payload");

    memory
        .submit(Operation::Mutate(mutation.clone()))
        .await
        .unwrap();

    // Same versions again: the backend watermark refuses the replay
    let err = memory
        .submit(Operation::Mutate(mutation))
        .await
        .unwrap_err();
    assert!(matches!(err, DatastoreError::StaleVersion(_)));
}

#[tokio::test]
async fn test_tampered_payload_is_rejected() {
    let (context, memory, key) = common::setup_datastore().await;
    let root = current_root(&context).await;

    let mut mutation = craft_put(&context, &key, root, "f.bin", b"payload");
    mutation.payloads[0] = HexBytes::from(b"tampered".as_slice());

    let err = memory
        .submit(Operation::Mutate(mutation))
        .await
        .unwrap_err();
    assert!(matches!(err, DatastoreError::InvalidRequest(_)));
}

#[tokio::test]
async fn test_foreign_signature_is_rejected() {
    let (context, memory, _) = common::setup_datastore().await;
    let root = current_root(&context).await;

    let intruder = SecretKey::generate();
    let mutation = craft_put(&context, &intruder, root, "f.bin", b"payload");

    let err = memory
        .submit(Operation::Mutate(mutation))
        .await
        .unwrap_err();
    assert!(matches!(err, DatastoreError::AccessDenied(_)));
}

#[tokio::test]
async fn test_unenrolled_device_is_rejected() {
    let (context, memory, key) = common::setup_datastore().await;
    let root = current_root(&context).await;

    let mut mutation = craft_put(&context, &key, root, "f.bin", b"payload");
    mutation.device_id = DeviceId::new("intruder-device");

    let err = memory
        .submit(Operation::Mutate(mutation))
        .await
        .unwrap_err();
    assert!(matches!(err, DatastoreError::AccessDenied(_)));
}
