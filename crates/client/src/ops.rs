//! Namespace operations
//!
//! Reads resolve a path segment by segment from the root directory, and
//! every fetched record passes the client-side staleness gate before it
//! is trusted. Writes all follow one shape:
//!
//! ```text
//!   fetch parent -> validate -> compute artifacts -> sign -> submit
//! ```
//!
//! A mutation ships the child artifact and the rewritten parent directory
//! in one request; the backend applies both or neither. Rejections are
//! terminal, the engine never retries on its own.

use tracing::{debug, warn};
use uuid::Uuid;

use common::codec::{ContentHash, HexBytes};
use common::crypto::{DeviceId, SignatureBundle};
use common::inode::{DirChildren, DirInode, FileInode, Inode, InodeKind, InodeRecord};
use common::paths;
use common::tombstone::{inode_tombstones, sign_tombstones, SignedTombstone};

use crate::context::DatastoreContext;
use crate::error::DatastoreError;
use crate::gateway::{Mutation, MutationVerb, Operation};

/// Knobs for fetch-side verification.
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchOptions {
    /// Ask the backend for signature bundles and verify them client-side
    pub extended: bool,
    /// Accept records older than the local watermark
    pub force: bool,
}

impl DatastoreContext {
    /// Resolve a path to its inode.
    pub async fn lookup(&self, path: &str) -> Result<Inode, DatastoreError> {
        self.lookup_with(path, FetchOptions::default()).await
    }

    pub async fn lookup_with(
        &self,
        path: &str,
        options: FetchOptions,
    ) -> Result<Inode, DatastoreError> {
        let sanitized = paths::sanitize(path);
        let (inode, _) = self.resolve(&sanitized, options).await?;
        Ok(inode)
    }

    /// Resolve a path to its wire record without decoding the payload.
    pub async fn stat(&self, path: &str) -> Result<InodeRecord, DatastoreError> {
        let sanitized = paths::sanitize(path);
        let (_, record) = self.resolve(&sanitized, FetchOptions::default()).await?;
        Ok(record)
    }

    /// List the children of a directory.
    pub async fn list_dir(&self, path: &str) -> Result<DirChildren, DatastoreError> {
        let sanitized = paths::sanitize(path);
        debug!(path = %sanitized, "listing directory");

        let (inode, _) = self.resolve(&sanitized, FetchOptions::default()).await?;
        match inode {
            Inode::Dir(dir) => Ok(dir.children),
            Inode::File(_) => Err(DatastoreError::NotADirectory(format!(
                "{} is a file",
                sanitized
            ))),
        }
    }

    /// Fetch a file's content.
    pub async fn get_file(&self, path: &str) -> Result<Vec<u8>, DatastoreError> {
        self.get_file_with(path, FetchOptions::default()).await
    }

    pub async fn get_file_with(
        &self,
        path: &str,
        options: FetchOptions,
    ) -> Result<Vec<u8>, DatastoreError> {
        let sanitized = paths::sanitize(path);
        let (inode, _) = self.resolve(&sanitized, options).await?;
        let file = match inode {
            Inode::File(file) => file,
            Inode::Dir(_) => {
                return Err(DatastoreError::NotADirectory(format!(
                    "{} is a directory",
                    sanitized
                )))
            }
        };

        let response = self
            .gateway()
            .submit(Operation::FetchFile {
                datastore_id: self.datastore_id(),
                uuid: file.uuid,
                extended: options.extended,
            })
            .await?
            .into_file("fetch-file")?;

        if options.extended {
            self.verify_served_record(&response.record, response.signatures.as_ref())?;
        }

        // The content must hash to what the signed header commits to.
        let actual = ContentHash::of(&response.content);
        if actual != response.record.header.payload_hash {
            warn!(path = %sanitized, uuid = %file.uuid, "served file content fails hash check");
            return Err(DatastoreError::RemoteIo(format!(
                "content for {} hashes to {}, header commits to {}",
                sanitized, actual, response.record.header.payload_hash
            )));
        }

        let header = &response.record.header;
        if !options.force {
            self.check_version(file.uuid, &header.device_id, header.version)?;
        }
        self.observe_version(file.uuid, &header.device_id, header.version);

        Ok(response.content.into_inner())
    }

    /// Write a file, creating it or replacing its content.
    ///
    /// An update keeps the file's uuid so the write extends the existing
    /// lineage; a create mints a fresh uuid at version 1.
    pub async fn put_file(&self, path: &str, content: &[u8]) -> Result<FileInode, DatastoreError> {
        let sanitized = paths::sanitize(path);
        let (parent, name) = self.resolve_parent(&sanitized).await?;

        let existing = parent.get(&name).copied();
        if let Some(entry) = existing {
            if entry.is_dir() {
                return Err(DatastoreError::NotADirectory(format!(
                    "{} is a directory",
                    sanitized
                )));
            }
        }
        let is_update = existing.is_some();
        let uuid = existing.map(|entry| entry.uuid).unwrap_or_else(Uuid::new_v4);
        let base_version = if is_update {
            parent.next_child_version(&name)
        } else {
            1
        };
        let version = self.version_at_least(uuid, self.device_id(), base_version);

        let file = FileInode::new(
            self.datastore_id(),
            self.writer(),
            uuid,
            ContentHash::of(content),
            self.device_id().clone(),
            version,
        );
        let next_parent = self.own_successor(parent.link(InodeKind::File, &name, uuid, is_update));

        let file_record = file.record();
        let parent_record = next_parent.record()?;
        let signatures = vec![
            self.sign_record(&file_record)?,
            self.sign_record(&parent_record)?,
        ];
        let payloads = vec![
            HexBytes::from(content),
            HexBytes::from(next_parent.payload_bytes()?),
        ];

        debug!(path = %sanitized, uuid = %uuid, version, is_update, "putting file");
        self.submit_mutation(Mutation {
            datastore_id: self.datastore_id(),
            device_id: self.device_id().clone(),
            verb: MutationVerb::PutFile,
            path: sanitized,
            records: vec![file_record, parent_record],
            payloads,
            signatures,
            tombstones: Vec::new(),
        })
        .await?;

        Ok(file)
    }

    /// Create an empty directory.
    pub async fn mkdir(&self, path: &str) -> Result<(), DatastoreError> {
        let sanitized = paths::sanitize(path);
        let (parent, name) = self.resolve_parent(&sanitized).await?;

        if parent.get(&name).is_some() {
            return Err(DatastoreError::Exists(format!(
                "{} already exists",
                sanitized
            )));
        }

        let uuid = Uuid::new_v4();
        let child = DirInode::new(
            self.datastore_id(),
            self.writer(),
            uuid,
            DirChildren::new(),
            self.device_id().clone(),
            1,
        );
        let next_parent = self.own_successor(parent.link(InodeKind::Dir, &name, uuid, false));

        let child_record = child.record()?;
        let parent_record = next_parent.record()?;
        let signatures = vec![
            self.sign_record(&child_record)?,
            self.sign_record(&parent_record)?,
        ];
        let payloads = vec![
            HexBytes::from(child.payload_bytes()?),
            HexBytes::from(next_parent.payload_bytes()?),
        ];

        debug!(path = %sanitized, uuid = %uuid, "creating directory");
        self.submit_mutation(Mutation {
            datastore_id: self.datastore_id(),
            device_id: self.device_id().clone(),
            verb: MutationVerb::Mkdir,
            path: sanitized,
            records: vec![child_record, parent_record],
            payloads,
            signatures,
            tombstones: Vec::new(),
        })
        .await
    }

    /// Delete a file and tombstone its lineage on every device.
    pub async fn delete_file(&self, path: &str) -> Result<(), DatastoreError> {
        self.remove_child(MutationVerb::DeleteFile, path).await
    }

    /// Delete an empty directory and tombstone its lineage on every device.
    pub async fn rmdir(&self, path: &str) -> Result<(), DatastoreError> {
        self.remove_child(MutationVerb::Rmdir, path).await
    }

    async fn remove_child(&self, verb: MutationVerb, path: &str) -> Result<(), DatastoreError> {
        let sanitized = paths::sanitize(path);
        let (parent, name) = self.resolve_parent(&sanitized).await?;
        let entry = parent
            .get(&name)
            .copied()
            .ok_or_else(|| DatastoreError::NotFound(format!("{} not found", sanitized)))?;

        match verb {
            MutationVerb::DeleteFile if entry.is_dir() => {
                return Err(DatastoreError::NotADirectory(format!(
                    "{} is a directory, not a file",
                    sanitized
                )));
            }
            MutationVerb::Rmdir if entry.is_file() => {
                return Err(DatastoreError::NotADirectory(format!(
                    "{} is a file, not a directory",
                    sanitized
                )));
            }
            MutationVerb::Rmdir => {
                let (child, _) = self.fetch_inode(entry.uuid, FetchOptions::default()).await?;
                match child {
                    Inode::Dir(dir) if !dir.is_empty() => {
                        return Err(DatastoreError::InvalidRequest(format!(
                            "{} is not empty",
                            sanitized
                        )));
                    }
                    Inode::Dir(_) => {}
                    Inode::File(_) => {
                        return Err(DatastoreError::NotADirectory(format!(
                            "{} is a file, not a directory",
                            sanitized
                        )));
                    }
                }
            }
            _ => {}
        }

        let next_parent = self.own_successor(parent.unlink(&name)?);
        let parent_record = next_parent.record()?;
        let signatures = vec![self.sign_record(&parent_record)?];
        let payloads = vec![HexBytes::from(next_parent.payload_bytes()?)];
        let tombstones = self.child_tombstones(entry.uuid)?;

        debug!(
            verb = %verb,
            path = %sanitized,
            uuid = %entry.uuid,
            tombstones = tombstones.len(),
            "removing child"
        );
        self.submit_mutation(Mutation {
            datastore_id: self.datastore_id(),
            device_id: self.device_id().clone(),
            verb,
            path: sanitized,
            records: vec![parent_record],
            payloads,
            signatures,
            tombstones,
        })
        .await
    }

    /// Fetch one inode by uuid, gate it on the watermark, and decode it.
    async fn fetch_inode(
        &self,
        uuid: Uuid,
        options: FetchOptions,
    ) -> Result<(Inode, InodeRecord), DatastoreError> {
        let response = self
            .gateway()
            .submit(Operation::FetchInode {
                datastore_id: self.datastore_id(),
                uuid,
                extended: options.extended,
            })
            .await?
            .into_inode("fetch-inode")?;

        if options.extended {
            self.verify_served_record(&response.record, response.signatures.as_ref())?;
        }

        let header = &response.record.header;
        if !options.force {
            self.check_version(uuid, &header.device_id, header.version)?;
        }

        let payload = response.payload.as_ref().map(|payload| payload.as_ref());
        let inode = Inode::from_wire(&response.record, payload)?;
        self.observe_version(uuid, &header.device_id, header.version);

        Ok((inode, response.record))
    }

    /// Walk a sanitized path from the root to its inode.
    async fn resolve(
        &self,
        sanitized: &str,
        options: FetchOptions,
    ) -> Result<(Inode, InodeRecord), DatastoreError> {
        let (mut inode, mut record) = self.fetch_inode(self.root_uuid(), options).await?;

        for segment in paths::segments(sanitized) {
            let dir = match inode {
                Inode::Dir(dir) => dir,
                Inode::File(_) => {
                    return Err(DatastoreError::NotADirectory(format!(
                        "cannot traverse a file while resolving {}",
                        sanitized
                    )))
                }
            };
            let entry = dir.get(segment).ok_or_else(|| {
                DatastoreError::NotFound(format!("{} not found in {}", segment, sanitized))
            })?;

            let (next_inode, next_record) = self.fetch_inode(entry.uuid, options).await?;
            inode = next_inode;
            record = next_record;
        }

        Ok((inode, record))
    }

    /// Fetch the directory a mutation target lives in.
    ///
    /// The parent is always re-fetched at mutation time so the successor
    /// builds on the freshest children the backend will admit.
    async fn resolve_parent(&self, sanitized: &str) -> Result<(DirInode, String), DatastoreError> {
        if paths::is_root(sanitized) {
            return Err(DatastoreError::InvalidRequest(
                "the namespace root cannot be the target of a mutation".to_string(),
            ));
        }

        let parent_path = paths::dirname(sanitized);
        let name = paths::basename(sanitized);
        let (inode, _) = self.resolve(&parent_path, FetchOptions::default()).await?;
        match inode {
            Inode::Dir(dir) => Ok((dir, name)),
            Inode::File(_) => Err(DatastoreError::NotADirectory(format!(
                "{} is not a directory",
                parent_path
            ))),
        }
    }

    /// Successor directories extend this device's lineage: restamp the
    /// authorship and lift the version past the local watermark.
    fn own_successor(&self, dir: DirInode) -> DirInode {
        let mut dir = dir.authored_by(self.writer(), self.device_id().clone());
        dir.version = self.version_at_least(dir.uuid, self.device_id(), dir.version);
        dir
    }

    fn sign_record(&self, record: &InodeRecord) -> Result<SignatureBundle, DatastoreError> {
        let bytes = record.signable_bytes()?;
        Ok(SignatureBundle::sign(&bytes, self.secret_key()))
    }

    /// One signed tombstone per device in the datastore's device set.
    fn child_tombstones(&self, uuid: Uuid) -> Result<Vec<SignedTombstone>, DatastoreError> {
        let tombstones = inode_tombstones(
            self.datastore_id(),
            uuid,
            self.descriptor().device_ids.clone(),
        );
        Ok(sign_tombstones(tombstones, self.secret_key())?)
    }

    fn verify_served_record(
        &self,
        record: &InodeRecord,
        signatures: Option<&SignatureBundle>,
    ) -> Result<(), DatastoreError> {
        let Some(signatures) = signatures else {
            warn!(uuid = %record.header.uuid, "extended fetch came back without signatures");
            return Err(DatastoreError::RemoteIo(
                "backend omitted signatures on an extended fetch".to_string(),
            ));
        };

        let bytes = record.signable_bytes()?;
        if !signatures.verify(&bytes, &self.datastore_id()) {
            warn!(uuid = %record.header.uuid, "served record fails signature verification");
            return Err(DatastoreError::RemoteIo(format!(
                "record for inode {} does not verify against the datastore owner",
                record.header.uuid
            )));
        }
        Ok(())
    }

    /// Submit a mutation and fold the written versions into the watermarks.
    async fn submit_mutation(&self, mutation: Mutation) -> Result<(), DatastoreError> {
        let written: Vec<(Uuid, DeviceId, u64)> = mutation
            .records
            .iter()
            .map(|record| {
                (
                    record.header.uuid,
                    record.header.device_id.clone(),
                    record.header.version,
                )
            })
            .collect();

        self.gateway()
            .submit(Operation::Mutate(mutation))
            .await?
            .into_ack("mutate")?;

        for (uuid, device_id, version) in written {
            self.observe_version(uuid, &device_id, version);
        }
        Ok(())
    }
}
