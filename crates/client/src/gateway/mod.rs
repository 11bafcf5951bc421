//! Remote operation gateway
//!
//! Everything the engine wants from the outside world funnels through one
//! trait with one method: [`Gateway::submit`]. Callers hand over a typed
//! [`Operation`] and get back a [`TypedResponse`] or one of the shared
//! semantic error codes; the gateway owns transport mechanics (sessions,
//! retries at the connection level, status mapping) and none of the
//! datastore semantics.
//!
//! Two implementations live here:
//! - **[`HttpGateway`]**: talks JSON over HTTP to a real backend
//! - **[`MemoryGateway`]**: an in-process backend that enforces the same
//!   contract (signatures, version order, atomicity), used by tests

mod http;
mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use common::codec::HexBytes;
use common::crypto::{DatastoreId, DeviceId, SignatureBundle};
use common::inode::{InodeRecord, MutableDatum};
use common::tombstone::SignedTombstone;

use crate::error::DatastoreError;

pub use http::{GatewayConfig, HttpGateway};
pub use memory::MemoryGateway;

/// Which mutation a [`Mutation`] request applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MutationVerb {
    Mkdir,
    PutFile,
    Rmdir,
    DeleteFile,
}

impl std::fmt::Display for MutationVerb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MutationVerb::Mkdir => write!(f, "mkdir"),
            MutationVerb::PutFile => write!(f, "put-file"),
            MutationVerb::Rmdir => write!(f, "rmdir"),
            MutationVerb::DeleteFile => write!(f, "delete-file"),
        }
    }
}

/// One atomic namespace mutation.
///
/// Every mutation ships the signed artifacts it produces as parallel
/// lists: `records`, `payloads`, and `signatures` line up index by index,
/// child artifact first, the rewritten parent directory last. The backend
/// applies all records or none of them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mutation {
    pub datastore_id: DatastoreId,
    pub device_id: DeviceId,
    pub verb: MutationVerb,
    /// Sanitized namespace path the mutation targets
    pub path: String,
    pub records: Vec<InodeRecord>,
    pub payloads: Vec<HexBytes>,
    pub signatures: Vec<SignatureBundle>,
    /// Deletion proofs, present only for delete verbs
    pub tombstones: Vec<SignedTombstone>,
}

impl Mutation {
    /// Check the parallel lists line up.
    pub fn validate_shape(&self) -> Result<(), DatastoreError> {
        if self.records.len() != self.payloads.len()
            || self.records.len() != self.signatures.len()
        {
            return Err(DatastoreError::InvalidRequest(format!(
                "mutation shape mismatch: {} records, {} payloads, {} signatures",
                self.records.len(),
                self.payloads.len(),
                self.signatures.len()
            )));
        }
        if self.records.is_empty() {
            return Err(DatastoreError::InvalidRequest(
                "mutation carries no records".to_string(),
            ));
        }
        Ok(())
    }
}

/// Everything a backend needs to bring a datastore into existence.
///
/// The root tombstones are pre-signed at creation time so that deleting
/// the datastore later does not require re-learning device membership.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreationBundle {
    pub datastore_id: DatastoreId,
    pub descriptor_datum: MutableDatum,
    pub descriptor_signatures: SignatureBundle,
    pub root_record: InodeRecord,
    pub root_payload: HexBytes,
    pub root_signatures: SignatureBundle,
    pub root_tombstones: Vec<SignedTombstone>,
}

/// Deletion proofs for an entire datastore: its descriptor datum and its
/// root inode, each covered once per device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TombstoneBundle {
    pub datastore_id: DatastoreId,
    pub descriptor_tombstones: Vec<SignedTombstone>,
    pub root_tombstones: Vec<SignedTombstone>,
}

/// A request to the backend.
#[derive(Debug, Clone)]
pub enum Operation {
    Create(CreationBundle),
    FetchDescriptor {
        datastore_id: DatastoreId,
    },
    FetchInode {
        datastore_id: DatastoreId,
        uuid: Uuid,
        extended: bool,
    },
    FetchFile {
        datastore_id: DatastoreId,
        uuid: Uuid,
        extended: bool,
    },
    Mutate(Mutation),
    DeleteDatastore(TombstoneBundle),
}

impl Operation {
    /// Wire name of this operation, used in routes and error reports.
    pub fn verb(&self) -> &'static str {
        match self {
            Operation::Create(_) => "create",
            Operation::FetchDescriptor { .. } => "fetch-descriptor",
            Operation::FetchInode { .. } => "fetch-inode",
            Operation::FetchFile { .. } => "fetch-file",
            Operation::Mutate(_) => "mutate",
            Operation::DeleteDatastore(_) => "delete-datastore",
        }
    }

    pub fn datastore_id(&self) -> DatastoreId {
        match self {
            Operation::Create(bundle) => bundle.datastore_id,
            Operation::FetchDescriptor { datastore_id } => *datastore_id,
            Operation::FetchInode { datastore_id, .. } => *datastore_id,
            Operation::FetchFile { datastore_id, .. } => *datastore_id,
            Operation::Mutate(mutation) => mutation.datastore_id,
            Operation::DeleteDatastore(bundle) => bundle.datastore_id,
        }
    }
}

/// Acknowledgement of an applied write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ack {
    pub datastore_id: DatastoreId,
}

/// A fetched descriptor datum and the signatures covering its header.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescriptorResponse {
    pub datum: MutableDatum,
    pub signatures: SignatureBundle,
}

/// A fetched inode record.
///
/// Directory inodes carry their children payload; file inodes do not
/// (content is fetched separately). Header signatures ride along only
/// when the fetch asked for them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InodeResponse {
    pub record: InodeRecord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<HexBytes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signatures: Option<SignatureBundle>,
}

/// A fetched file: its record and its content bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileResponse {
    pub record: InodeRecord,
    pub content: HexBytes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signatures: Option<SignatureBundle>,
}

/// A successful response, one shape per operation family.
#[derive(Debug, Clone)]
pub enum TypedResponse {
    Ack(Ack),
    Descriptor(DescriptorResponse),
    Inode(InodeResponse),
    File(FileResponse),
}

impl TypedResponse {
    fn shape(&self) -> &'static str {
        match self {
            TypedResponse::Ack(_) => "ack",
            TypedResponse::Descriptor(_) => "descriptor",
            TypedResponse::Inode(_) => "inode",
            TypedResponse::File(_) => "file",
        }
    }

    fn mismatch(&self, verb: &str, expected: &'static str) -> DatastoreError {
        DatastoreError::SchemaMismatch {
            verb: verb.to_string(),
            detail: format!("expected {} response, got {}", expected, self.shape()),
        }
    }

    pub fn into_ack(self, verb: &str) -> Result<Ack, DatastoreError> {
        match self {
            TypedResponse::Ack(ack) => Ok(ack),
            other => Err(other.mismatch(verb, "ack")),
        }
    }

    pub fn into_descriptor(self, verb: &str) -> Result<DescriptorResponse, DatastoreError> {
        match self {
            TypedResponse::Descriptor(descriptor) => Ok(descriptor),
            other => Err(other.mismatch(verb, "descriptor")),
        }
    }

    pub fn into_inode(self, verb: &str) -> Result<InodeResponse, DatastoreError> {
        match self {
            TypedResponse::Inode(inode) => Ok(inode),
            other => Err(other.mismatch(verb, "inode")),
        }
    }

    pub fn into_file(self, verb: &str) -> Result<FileResponse, DatastoreError> {
        match self {
            TypedResponse::File(file) => Ok(file),
            other => Err(other.mismatch(verb, "file")),
        }
    }
}

/// The engine's one seam to the outside world.
///
/// Implementations are transport adapters: they move operations across
/// and map failures into the shared error codes, but datastore semantics
/// (what to sign, what to verify, which version to write) stay with the
/// caller.
#[async_trait]
pub trait Gateway: Send + Sync + std::fmt::Debug {
    async fn submit(&self, operation: Operation) -> Result<TypedResponse, DatastoreError>;
}
