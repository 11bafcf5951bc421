//! Integration tests for directory creation

mod common;

use client::error::DatastoreError;

#[tokio::test]
async fn test_mkdir() {
    let (context, _, _) = common::setup_datastore().await;

    context.mkdir("/docs").await.unwrap();

    let children = context.list_dir("/").await.unwrap();
    assert_eq!(children.len(), 1);
    assert!(children.get("docs").unwrap().is_dir());
}

#[tokio::test]
async fn test_mkdir_bumps_root_version() {
    let (context, _, _) = common::setup_datastore().await;

    let before = context.stat("/").await.unwrap();
    assert_eq!(before.header.version, 1);

    context.mkdir("/docs").await.unwrap();

    let after = context.stat("/").await.unwrap();
    assert_eq!(after.header.version, 2);
}

#[tokio::test]
async fn test_mkdir_nested() {
    let (context, _, _) = common::setup_datastore().await;

    context.mkdir("/a").await.unwrap();
    context.mkdir("/a/b").await.unwrap();

    let children = context.list_dir("/a").await.unwrap();
    assert_eq!(children.len(), 1);
    assert!(children.get("b").unwrap().is_dir());

    // The second mkdir rewrote /a, not the root
    assert_eq!(context.stat("/a").await.unwrap().header.version, 2);
    assert_eq!(context.stat("/").await.unwrap().header.version, 2);
}

#[tokio::test]
async fn test_mkdir_already_exists() {
    let (context, _, _) = common::setup_datastore().await;

    context.mkdir("/docs").await.unwrap();

    let result = context.mkdir("/docs").await;
    assert!(matches!(result, Err(DatastoreError::Exists(_))));
}

#[tokio::test]
async fn test_mkdir_over_file() {
    let (context, _, _) = common::setup_datastore().await;

    context.put_file("/notes.txt", b"jotted down").await.unwrap();

    let result = context.mkdir("/notes.txt").await;
    assert!(matches!(result, Err(DatastoreError::Exists(_))));
}

#[tokio::test]
async fn test_mkdir_missing_parent() {
    let (context, _, _) = common::setup_datastore().await;

    // Parents are not created implicitly
    let result = context.mkdir("/a/b").await;
    assert!(matches!(result, Err(DatastoreError::NotFound(_))));
}

#[tokio::test]
async fn test_mkdir_root_is_rejected() {
    let (context, _, _) = common::setup_datastore().await;

    let result = context.mkdir("/").await;
    assert!(matches!(result, Err(DatastoreError::InvalidRequest(_))));

    // Path sanitization folds these onto the root too
    let result = context.mkdir("/../..").await;
    assert!(matches!(result, Err(DatastoreError::InvalidRequest(_))));
}

#[tokio::test]
async fn test_mkdir_sanitizes_paths() {
    let (context, _, _) = common::setup_datastore().await;

    context.mkdir("//docs/./").await.unwrap();

    let children = context.list_dir("/").await.unwrap();
    assert!(children.get("docs").is_some());
}
