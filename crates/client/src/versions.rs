//! Client-side version watermarks.
//!
//! The backend can serve any version it holds, including ones older than
//! what this client has already seen or written. Watermarks remember the
//! highest version observed per (inode, device) lineage so fetches can
//! reject rollbacks and writes can stamp versions that are guaranteed to
//! advance their lineage.

use std::collections::BTreeMap;

use uuid::Uuid;

use common::crypto::DeviceId;

use crate::error::DatastoreError;

/// Highest observed version per (inode, device) lineage.
#[derive(Debug, Clone, Default)]
pub struct VersionWatermarks {
    seen: BTreeMap<(Uuid, DeviceId), u64>,
}

impl VersionWatermarks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a version that was observed on the wire. Keeps the maximum.
    pub fn observe(&mut self, uuid: Uuid, device_id: &DeviceId, version: u64) {
        let entry = self
            .seen
            .entry((uuid, device_id.clone()))
            .or_insert(version);
        if version > *entry {
            *entry = version;
        }
    }

    pub fn observed(&self, uuid: Uuid, device_id: &DeviceId) -> Option<u64> {
        self.seen.get(&(uuid, device_id.clone())).copied()
    }

    /// Reject a fetched version older than what this client already saw.
    ///
    /// Equal versions pass: re-reading the current version is normal.
    pub fn check(
        &self,
        uuid: Uuid,
        device_id: &DeviceId,
        version: u64,
    ) -> Result<(), DatastoreError> {
        if let Some(watermark) = self.observed(uuid, device_id) {
            if version < watermark {
                return Err(DatastoreError::StaleVersion(format!(
                    "inode {} served at version {}, already observed {} from device {}",
                    uuid, version, watermark, device_id
                )));
            }
        }
        Ok(())
    }

    /// Version to stamp on the next write of this lineage: at least one
    /// past the watermark, and never below the caller's candidate.
    pub fn at_least(&self, uuid: Uuid, device_id: &DeviceId, candidate: u64) -> u64 {
        match self.observed(uuid, device_id) {
            Some(watermark) => candidate.max(watermark + 1),
            None => candidate,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_observe_keeps_maximum() {
        let mut watermarks = VersionWatermarks::new();
        let uuid = Uuid::new_v4();
        let device = DeviceId::new("d1");

        watermarks.observe(uuid, &device, 3);
        watermarks.observe(uuid, &device, 1);
        assert_eq!(watermarks.observed(uuid, &device), Some(3));

        watermarks.observe(uuid, &device, 7);
        assert_eq!(watermarks.observed(uuid, &device), Some(7));
    }

    #[test]
    fn test_lineages_are_independent() {
        let mut watermarks = VersionWatermarks::new();
        let uuid = Uuid::new_v4();
        let d1 = DeviceId::new("d1");
        let d2 = DeviceId::new("d2");

        watermarks.observe(uuid, &d1, 5);
        assert_eq!(watermarks.observed(uuid, &d2), None);
        assert!(watermarks.check(uuid, &d2, 1).is_ok());
    }

    #[test]
    fn test_check_rejects_rollback() {
        let mut watermarks = VersionWatermarks::new();
        let uuid = Uuid::new_v4();
        let device = DeviceId::new("d1");

        watermarks.observe(uuid, &device, 4);
        assert!(watermarks.check(uuid, &device, 4).is_ok());
        assert!(watermarks.check(uuid, &device, 5).is_ok());

        let err = watermarks.check(uuid, &device, 3).unwrap_err();
        assert!(matches!(err, DatastoreError::StaleVersion(_)));
    }

    #[test]
    fn test_at_least_advances_past_watermark() {
        let mut watermarks = VersionWatermarks::new();
        let uuid = Uuid::new_v4();
        let device = DeviceId::new("d1");

        // Nothing observed yet: candidate stands.
        assert_eq!(watermarks.at_least(uuid, &device, 1), 1);

        watermarks.observe(uuid, &device, 6);
        assert_eq!(watermarks.at_least(uuid, &device, 2), 7);
        assert_eq!(watermarks.at_least(uuid, &device, 9), 9);
    }
}
