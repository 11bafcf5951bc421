use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::codec::{CanonicalEncode, CodecError, ContentHash};
use crate::crypto::{DatastoreId, DeviceId};

use super::datum::DatumHeader;

/**
 * Inodes
 * ======
 * Inodes are the building blocks of a datastore's namespace. An inode
 *  is either a file or a directory:
 *  - File inodes commit to their content by hash; the bytes themselves
 *    live in content-addressed storage next door
 *  - Directory inodes carry a name -> entry map, which IS their payload
 * Every inode version is pinned by a signed header, so the namespace a
 *  client walks is exactly the namespace the owner signed, even when
 *  the backend holding it is untrusted.
 */

/// What kind of object an inode names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InodeKind {
    File,
    Dir,
}

impl std::fmt::Display for InodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InodeKind::File => write!(f, "file"),
            InodeKind::Dir => write!(f, "dir"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InodeError {
    #[error("child not found: {0}")]
    ChildNotFound(String),
    #[error("directory inode is missing its payload")]
    MissingPayload,
    #[error("payload hash mismatch: header commits to {expected}, payload hashes to {actual}")]
    PayloadHashMismatch {
        expected: ContentHash,
        actual: ContentHash,
    },
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

// One name in a directory. The entry remembers the child's uuid, what
//  kind of inode it is, and the per-name write counter used to version
//  the next write of that child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    pub uuid: Uuid,
    pub kind: InodeKind,
    pub version: u64,
}

impl DirEntry {
    pub fn is_dir(&self) -> bool {
        matches!(self.kind, InodeKind::Dir)
    }

    pub fn is_file(&self) -> bool {
        matches!(self.kind, InodeKind::File)
    }
}

/// The payload of a directory inode: its name -> entry map.
///
/// This is the only structure whose canonical bytes double as a stored
/// payload, so it keeps `BTreeMap` ordering to stay deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct DirChildren {
    entries: BTreeMap<String, DirEntry>,
}

impl CanonicalEncode for DirChildren {}

impl DirChildren {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&DirEntry> {
        self.entries.get(name)
    }

    pub fn insert(&mut self, name: String, entry: DirEntry) -> Option<DirEntry> {
        self.entries.insert(name, entry)
    }

    pub fn remove(&mut self, name: &str) -> Option<DirEntry> {
        self.entries.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &DirEntry)> {
        self.entries.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A file inode: one version of a named file.
///
/// The content itself is not here. The inode commits to it through
/// `content_hash`, and the bytes are fetched separately from
/// content-addressed storage and checked against that hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInode {
    pub owner: DatastoreId,
    pub writer: DatastoreId,
    pub uuid: Uuid,
    pub device_id: DeviceId,
    pub version: u64,
    pub content_hash: ContentHash,
}

impl FileInode {
    pub fn new(
        owner: DatastoreId,
        writer: DatastoreId,
        uuid: Uuid,
        content_hash: ContentHash,
        device_id: DeviceId,
        version: u64,
    ) -> Self {
        Self {
            owner,
            writer,
            uuid,
            device_id,
            version,
            content_hash,
        }
    }

    /// The signed commitment to this version.
    pub fn header(&self) -> DatumHeader {
        DatumHeader {
            uuid: self.uuid,
            version: self.version,
            device_id: self.device_id.clone(),
            payload_hash: self.content_hash,
        }
    }

    /// The wire record describing this inode.
    pub fn record(&self) -> InodeRecord {
        InodeRecord {
            owner: self.owner,
            writer: self.writer,
            kind: InodeKind::File,
            header: self.header(),
        }
    }
}

/// A directory inode: one version of a named directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirInode {
    pub owner: DatastoreId,
    pub writer: DatastoreId,
    pub uuid: Uuid,
    pub device_id: DeviceId,
    pub version: u64,
    pub children: DirChildren,
}

impl DirInode {
    pub fn new(
        owner: DatastoreId,
        writer: DatastoreId,
        uuid: Uuid,
        children: DirChildren,
        device_id: DeviceId,
        version: u64,
    ) -> Self {
        Self {
            owner,
            writer,
            uuid,
            device_id,
            version,
            children,
        }
    }

    /// The empty root directory a datastore starts from, at version 1.
    pub fn empty_root(
        owner: DatastoreId,
        writer: DatastoreId,
        uuid: Uuid,
        device_id: DeviceId,
    ) -> Self {
        Self::new(owner, writer, uuid, DirChildren::new(), device_id, 1)
    }

    pub fn get(&self, name: &str) -> Option<&DirEntry> {
        self.children.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Version to assign the next write of child `name`.
    ///
    /// Per-name counter: existing entry version + 1, or 1 for a name this
    /// directory has never held.
    pub fn next_child_version(&self, name: &str) -> u64 {
        match self.children.get(name) {
            Some(entry) => entry.version + 1,
            None => 1,
        }
    }

    /// Successor directory with `name` pointing at `uuid`.
    ///
    /// Bumps the directory's own version by one. For an update the
    /// entry's write counter advances; for a fresh name it starts at 1.
    /// Whether the name may already exist is the caller's check, made
    /// against a freshly fetched copy, not something enforced here.
    pub fn link(&self, kind: InodeKind, name: &str, uuid: Uuid, is_update: bool) -> DirInode {
        let entry_version = if is_update {
            self.next_child_version(name)
        } else {
            1
        };

        let mut next = self.clone();
        next.children.insert(
            name.to_string(),
            DirEntry {
                uuid,
                kind,
                version: entry_version,
            },
        );
        next.version = self.version + 1;
        next
    }

    /// Successor directory without `name`.
    ///
    /// Bumps the directory's own version by one.
    pub fn unlink(&self, name: &str) -> Result<DirInode, InodeError> {
        if !self.children.contains(name) {
            return Err(InodeError::ChildNotFound(name.to_string()));
        }

        let mut next = self.clone();
        next.children.remove(name);
        next.version = self.version + 1;
        Ok(next)
    }

    /// Restamp authorship onto a successor built from a fetched copy.
    ///
    /// A directory fetched from the backend carries whichever device
    /// last wrote it; the successor this client submits must carry this
    /// client's own writer id and device.
    pub fn authored_by(mut self, writer: DatastoreId, device_id: DeviceId) -> DirInode {
        self.writer = writer;
        self.device_id = device_id;
        self
    }

    /// Canonical payload bytes: the encoded children map.
    pub fn payload_bytes(&self) -> Result<Vec<u8>, CodecError> {
        self.children.encode()
    }

    /// The signed commitment to this version.
    pub fn header(&self) -> Result<DatumHeader, CodecError> {
        Ok(DatumHeader {
            uuid: self.uuid,
            version: self.version,
            device_id: self.device_id.clone(),
            payload_hash: ContentHash::of(&self.payload_bytes()?),
        })
    }

    /// The wire record describing this inode.
    pub fn record(&self) -> Result<InodeRecord, CodecError> {
        Ok(InodeRecord {
            owner: self.owner,
            writer: self.writer,
            kind: InodeKind::Dir,
            header: self.header()?,
        })
    }
}

/// Either kind of inode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Inode {
    File(FileInode),
    Dir(DirInode),
}

impl Inode {
    pub fn kind(&self) -> InodeKind {
        match self {
            Inode::File(_) => InodeKind::File,
            Inode::Dir(_) => InodeKind::Dir,
        }
    }

    pub fn uuid(&self) -> Uuid {
        match self {
            Inode::File(file) => file.uuid,
            Inode::Dir(dir) => dir.uuid,
        }
    }

    pub fn version(&self) -> u64 {
        match self {
            Inode::File(file) => file.version,
            Inode::Dir(dir) => dir.version,
        }
    }

    pub fn device_id(&self) -> &DeviceId {
        match self {
            Inode::File(file) => &file.device_id,
            Inode::Dir(dir) => &dir.device_id,
        }
    }

    pub fn owner(&self) -> DatastoreId {
        match self {
            Inode::File(file) => file.owner,
            Inode::Dir(dir) => dir.owner,
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, Inode::Dir(_))
    }

    pub fn is_file(&self) -> bool {
        matches!(self, Inode::File(_))
    }

    pub fn as_dir(&self) -> Option<&DirInode> {
        match self {
            Inode::Dir(dir) => Some(dir),
            Inode::File(_) => None,
        }
    }

    pub fn as_file(&self) -> Option<&FileInode> {
        match self {
            Inode::File(file) => Some(file),
            Inode::Dir(_) => None,
        }
    }

    pub fn into_dir(self) -> Option<DirInode> {
        match self {
            Inode::Dir(dir) => Some(dir),
            Inode::File(_) => None,
        }
    }

    /// The wire record describing this inode.
    pub fn record(&self) -> Result<InodeRecord, CodecError> {
        match self {
            Inode::File(file) => Ok(file.record()),
            Inode::Dir(dir) => dir.record(),
        }
    }

    /// Rebuild an inode from its wire record and (for directories) its
    /// payload bytes.
    ///
    /// Directory payloads are checked against the header's hash before
    /// being decoded, so a backend cannot swap children out from under a
    /// signed header. File payloads are fetched and checked separately;
    /// any payload passed here for a file is ignored.
    pub fn from_wire(record: &InodeRecord, payload: Option<&[u8]>) -> Result<Inode, InodeError> {
        match record.kind {
            InodeKind::File => Ok(Inode::File(FileInode {
                owner: record.owner,
                writer: record.writer,
                uuid: record.header.uuid,
                device_id: record.header.device_id.clone(),
                version: record.header.version,
                content_hash: record.header.payload_hash,
            })),
            InodeKind::Dir => {
                let payload = payload.ok_or(InodeError::MissingPayload)?;
                let actual = ContentHash::of(payload);
                if actual != record.header.payload_hash {
                    return Err(InodeError::PayloadHashMismatch {
                        expected: record.header.payload_hash,
                        actual,
                    });
                }
                let children = DirChildren::decode(payload)?;
                Ok(Inode::Dir(DirInode {
                    owner: record.owner,
                    writer: record.writer,
                    uuid: record.header.uuid,
                    device_id: record.header.device_id.clone(),
                    version: record.header.version,
                    children,
                }))
            }
        }
    }
}

/// Wire description of one inode version: who owns it, who wrote it,
/// what kind it is, and the signed header pinning it down.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InodeRecord {
    pub owner: DatastoreId,
    pub writer: DatastoreId,
    pub kind: InodeKind,
    pub header: DatumHeader,
}

impl InodeRecord {
    /// The byte string signatures over this record cover.
    pub fn signable_bytes(&self) -> Result<Vec<u8>, CodecError> {
        self.header.signable_bytes()
    }
}
