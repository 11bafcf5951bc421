//! Shared test utilities for datastore integration tests
#![allow(dead_code)]

use std::sync::Arc;

use client::context::{ConnectOptions, DatastoreContext};
use client::gateway::{Gateway, MemoryGateway};
use client::lifecycle;
use common::crypto::{DeviceId, SecretKey};

pub const DEVICE_ONE: &str = "device-one";
pub const DEVICE_TWO: &str = "device-two";

/// Set up a two-device datastore on a fresh in-memory backend, connected
/// as the first device.
pub async fn setup_datastore() -> (DatastoreContext, MemoryGateway, SecretKey) {
    let memory = MemoryGateway::new();
    let gateway: Arc<dyn Gateway> = Arc::new(memory.clone());

    let secret_key = SecretKey::generate();
    let options = ConnectOptions::new(secret_key.clone(), DeviceId::new(DEVICE_ONE))
        .with_device_ids([DeviceId::new(DEVICE_TWO)]);

    let context = lifecycle::connect_or_create(gateway, options)
        .await
        .unwrap();
    (context, memory, secret_key)
}

/// Connect to the same datastore as the second device. The new context
/// has its own watermark table, like a separate process would.
pub async fn connect_second_device(
    memory: &MemoryGateway,
    secret_key: &SecretKey,
) -> DatastoreContext {
    let gateway: Arc<dyn Gateway> = Arc::new(memory.clone());
    let options = ConnectOptions::new(secret_key.clone(), DeviceId::new(DEVICE_TWO));
    lifecycle::connect(gateway, options).await.unwrap()
}
