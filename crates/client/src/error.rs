use common::codec::CodecError;
use common::crypto::{IdError, KeyError, SigError};
use common::descriptor::DescriptorError;
use common::inode::InodeError;

/// Errors surfaced by datastore operations.
///
/// The first eight variants are the semantic failure codes shared across
/// every operation and both gateway implementations; the remainder wrap
/// construction-time failures from the core types. Operations fail fast:
/// an error is returned to the caller as-is, never retried internally.
#[derive(Debug, thiserror::Error)]
pub enum DatastoreError {
    /// Path, inode, or datastore that does not exist
    #[error("not found: {0}")]
    NotFound(String),
    /// The backend refused the credential or signature presented
    #[error("access denied: {0}")]
    AccessDenied(String),
    /// The request is malformed or structurally impossible to apply
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// Transport-level failure, or a fetched artifact that failed
    /// integrity verification
    #[error("remote i/o error: {0}")]
    RemoteIo(String),
    /// A create collided with something already present
    #[error("already exists: {0}")]
    Exists(String),
    /// A path segment or operand had the wrong inode kind
    #[error("not a directory: {0}")]
    NotADirectory(String),
    /// A version at or below an already observed watermark
    #[error("stale version: {0}")]
    StaleVersion(String),
    /// The response matched neither the expected nor the generic error
    /// shape; fatal for the operation
    #[error("schema mismatch for {verb}: {detail}")]
    SchemaMismatch { verb: String, detail: String },

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("inode error: {0}")]
    Inode(#[from] InodeError),
    #[error("key error: {0}")]
    Key(#[from] KeyError),
    #[error("id error: {0}")]
    Id(#[from] IdError),
    #[error("signature error: {0}")]
    Sig(#[from] SigError),
    #[error("descriptor error: {0}")]
    Descriptor(#[from] DescriptorError),
}

impl From<reqwest::Error> for DatastoreError {
    fn from(err: reqwest::Error) -> Self {
        DatastoreError::RemoteIo(err.to_string())
    }
}

impl From<url::ParseError> for DatastoreError {
    fn from(err: url::ParseError) -> Self {
        DatastoreError::InvalidRequest(format!("bad url: {}", err))
    }
}
