//! Cryptographic primitives for Brig
//!
//! This module provides the cryptographic foundation for Brig's trust model:
//!
//! - **Ownership**: Ed25519 keypairs own datastores; the key's fingerprint
//!   is the datastore identifier
//! - **Provenance**: every inode version and every deletion is signed by
//!   the owning key, so an untrusted backend can host data it cannot forge
//! - **Verification**: clients check fetched artifacts against the owner
//!   recorded in the artifact itself
//!
//! # Trust Model
//!
//! ## Self-certifying identifiers
//! A datastore id is derived from the owner's public key (leading bytes of
//! its BLAKE3 hash). Holding the descriptor is enough to check that the id
//! and the key belong together; no registry or certificate chain is
//! involved.
//!
//! ## Signed version lineages
//! Each inode version is committed to by a canonical header, and the
//! header is what gets signed. The backend orders versions and rejects
//! stale writes but never needs the private key, so a compromised backend
//! can at worst withhold or replay, never fabricate.
//!
//! ## Deletion proofs
//! Deletes are themselves signed artifacts (tombstones), one per device,
//! so every device can independently convince the backend that a deletion
//! was authorized by the owner.

mod id;
mod keys;
mod sig;

pub use id::{DatastoreId, DeviceId, IdError, DATASTORE_ID_SIZE};
pub use keys::{KeyError, PublicKey, SecretKey, PRIVATE_KEY_SIZE, PUBLIC_KEY_SIZE};
pub use sig::{SigError, Signature, SignatureBundle, SignatureEntry, SIGNATURE_SIZE};
