//! Integration tests for file writes and reads

mod common;

use ::common::crypto::DeviceId;
use ::common::inode::Inode;
use client::error::DatastoreError;

#[tokio::test]
async fn test_put_and_get() {
    let (context, _, _) = common::setup_datastore().await;

    context.put_file("/hello.txt", b"hello world").await.unwrap();

    let content = context.get_file("/hello.txt").await.unwrap();
    assert_eq!(content, b"hello world");

    let inode = context.lookup("/hello.txt").await.unwrap();
    assert!(matches!(inode, Inode::File(_)));
}

#[tokio::test]
async fn test_put_update_keeps_uuid_and_bumps_version() {
    let (context, _, _) = common::setup_datastore().await;

    let first = context.put_file("/config", b"v1 settings").await.unwrap();
    assert_eq!(first.version, 1);

    let second = context.put_file("/config", b"v2 settings").await.unwrap();
    assert_eq!(second.uuid, first.uuid);
    assert_eq!(second.version, 2);

    let content = context.get_file("/config").await.unwrap();
    assert_eq!(content, b"v2 settings");
}

#[tokio::test]
async fn test_put_into_subdirectory() {
    let (context, _, _) = common::setup_datastore().await;

    context.mkdir("/a").await.unwrap();
    context.put_file("/a/f.txt", b"nested").await.unwrap();

    // The write rewrote /a, not the root
    assert_eq!(context.stat("/a").await.unwrap().header.version, 2);
    assert_eq!(context.stat("/").await.unwrap().header.version, 2);
    assert_eq!(context.get_file("/a/f.txt").await.unwrap(), b"nested");
}

#[tokio::test]
async fn test_put_into_missing_directory() {
    let (context, _, _) = common::setup_datastore().await;

    let result = context.put_file("/missing/f.txt", b"x").await;
    assert!(matches!(result, Err(DatastoreError::NotFound(_))));
}

#[tokio::test]
async fn test_put_over_directory() {
    let (context, _, _) = common::setup_datastore().await;

    context.mkdir("/docs").await.unwrap();

    let result = context.put_file("/docs", b"not a file").await;
    assert!(matches!(result, Err(DatastoreError::NotADirectory(_))));
}

#[tokio::test]
async fn test_get_missing_file() {
    let (context, _, _) = common::setup_datastore().await;

    let result = context.get_file("/nope").await;
    assert!(matches!(result, Err(DatastoreError::NotFound(_))));
}

#[tokio::test]
async fn test_get_directory() {
    let (context, _, _) = common::setup_datastore().await;

    context.mkdir("/docs").await.unwrap();

    let result = context.get_file("/docs").await;
    assert!(matches!(result, Err(DatastoreError::NotADirectory(_))));
}

#[tokio::test]
async fn test_traversal_through_file() {
    let (context, _, _) = common::setup_datastore().await;

    context.put_file("/f.txt", b"leaf").await.unwrap();

    let result = context.list_dir("/f.txt/below").await;
    assert!(matches!(result, Err(DatastoreError::NotADirectory(_))));
}

#[tokio::test]
async fn test_put_from_second_device() {
    let (context, memory, secret_key) = common::setup_datastore().await;
    let second = common::connect_second_device(&memory, &secret_key).await;

    context.mkdir("/shared").await.unwrap();
    second.put_file("/shared/f.txt", b"from the laptop").await.unwrap();

    // The first device sees the write, stamped with the second's lineage
    let content = context.get_file("/shared/f.txt").await.unwrap();
    assert_eq!(content, b"from the laptop");

    let record = context.stat("/shared/f.txt").await.unwrap();
    assert_eq!(record.header.device_id, DeviceId::new(common::DEVICE_TWO));
    assert_eq!(record.header.version, 1);
}

#[tokio::test]
async fn test_stat_reports_content_hash() {
    let (context, _, _) = common::setup_datastore().await;

    let file = context.put_file("/blob", b"some bytes").await.unwrap();

    let record = context.stat("/blob").await.unwrap();
    assert_eq!(record.header.payload_hash, file.content_hash);
    assert_eq!(record.header.uuid, file.uuid);
}
