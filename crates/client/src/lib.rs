/**
 * A connected datastore: gateway handle, device
 *  identity, owner key, descriptor, and the version
 *  watermarks shared across clones.
 */
pub mod context;
/**
 * The shared error taxonomy every operation
 *  resolves into.
 */
pub mod error;
/**
 * The remote operation gateway: one trait, one
 *  submit method, plus the HTTP implementation and
 *  an in-memory backend for tests.
 */
pub mod gateway;
/**
 * Datastore lifecycle: create, connect,
 *  connect-or-create, delete.
 */
pub mod lifecycle;
/**
 * Namespace operations on a connected datastore:
 *  lookup, stat, list_dir, get_file, put_file,
 *  mkdir, delete_file, rmdir.
 */
pub mod ops;
/**
 * Per-lineage version watermarks guarding against
 *  stale reads and replayed writes.
 */
pub mod versions;

pub mod prelude {
    pub use crate::context::{ConnectOptions, DatastoreContext};
    pub use crate::error::DatastoreError;
    pub use crate::gateway::{Gateway, GatewayConfig, HttpGateway, MemoryGateway};
    pub use crate::lifecycle::{connect, connect_or_create, delete_datastore};
    pub use crate::ops::FetchOptions;
}
