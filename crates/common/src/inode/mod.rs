//! Inode data structures for the datastore namespace
//!
//! This module defines the core types for Brig's signed, versioned
//! directory tree:
//!
//! - **[`DatumHeader`]**: Canonical commitment to one version of one object,
//!   the artifact that actually gets signed
//! - **[`MutableDatum`]**: A named, versioned blob; descriptors ride in datums
//! - **[`FileInode`]** / **[`DirInode`]**: The two node kinds of the namespace
//! - **[`InodeRecord`]**: Wire-side description of an inode version
//!
//! # Architecture
//!
//! ## Namespaces as signed trees
//!
//! A datastore is a tree of inodes hanging off one root directory:
//! ```text
//! Descriptor (signed datum) --root_uuid--> Root DirInode (signed)
//!                                               |
//!                            +------------------+------------------+
//!                            |                  |                  |
//!                         FileInode          DirInode           FileInode
//!                         (signed)           (signed)           (signed)
//!                                               |
//!                                       +-------+-------+
//!                                       |               |
//!                                    FileInode       FileInode
//! ```
//!
//! ## Versioning
//!
//! Every inode carries a `(device_id, version)` pair. Versions increase
//! strictly per device per inode, which is what lets clients detect a
//! backend replaying old state. Directory entries additionally carry a
//! per-name write counter so a name can be overwritten with a fresh uuid
//! without resetting its lineage.
//!
//! ## Provenance
//!
//! Inodes are never trusted on the backend's word. Each version's header
//! is signed by the owner key, directory payloads must hash to the value
//! committed in their header, and file bytes are checked against the
//! header's content hash after fetch.

mod datum;
mod node;

pub use datum::{DatumHeader, MutableDatum};
pub use node::{
    DirChildren, DirEntry, DirInode, FileInode, Inode, InodeError, InodeKind, InodeRecord,
};
