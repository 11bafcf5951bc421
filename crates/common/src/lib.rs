/**
 * Canonical serialization and content hashing.
 *  Everything signed in this crate is signed over
 *  these bytes.
 */
pub mod codec;
/**
 * Cryptographic types and operations.
 *  - Public and Private key implementations
 *  - Self-certifying datastore identifiers
 *  - Detached signatures and signature bundles
 */
pub mod crypto;
/**
 * Datastore descriptors: the signed root metadata
 *  naming the owner key, device set, and root inode
 *  of a datastore.
 */
pub mod descriptor;
/**
 * Common types that describe the contents of a
 *  datastore's namespace: file and directory inodes,
 *  the headers that version them, and the records
 *  they travel as.
 */
pub mod inode;
/**
 * Virtual path normalization and splitting for
 *  datastore namespaces.
 */
pub mod paths;
/**
 * Signed deletion proofs, one per device lineage.
 */
pub mod tombstone;

pub mod prelude {
    pub use crate::codec::{CanonicalEncode, ContentHash, HexBytes};
    pub use crate::crypto::{DatastoreId, DeviceId, PublicKey, SecretKey, SignatureBundle};
    pub use crate::descriptor::{DatastoreDescriptor, DatastoreKind};
    pub use crate::inode::{DirInode, FileInode, Inode, InodeKind, InodeRecord, MutableDatum};
    pub use crate::tombstone::{SignedTombstone, Tombstone};
}
