//! Versioned mutable data and the headers that commit to it.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::codec::{CanonicalEncode, CodecError, ContentHash, HexBytes};
use crate::crypto::{DatastoreId, DeviceId};

/// Canonical commitment to one version of a mutable datum.
///
/// The header is the signed artifact of the whole protocol: it binds a
/// datum's identity (`uuid`), its position in one device's lineage
/// (`device_id`, `version`), and its content (`payload_hash`) into a
/// single deterministic byte string. Everything else on the wire hangs
/// off a header signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatumHeader {
    pub uuid: Uuid,
    pub version: u64,
    pub device_id: DeviceId,
    pub payload_hash: ContentHash,
}

impl CanonicalEncode for DatumHeader {}

impl DatumHeader {
    /// The byte string that gets signed for this version.
    pub fn signable_bytes(&self) -> Result<Vec<u8>, CodecError> {
        self.encode()
    }
}

/// One version of a named piece of mutable data.
///
/// A datum is addressed by a caller-chosen `data_id` rather than a path;
/// datastore descriptors ride in datums keyed by the datastore id. The
/// payload is opaque here, the header's hash is what pins it down.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutableDatum {
    pub data_id: String,
    pub owner: DatastoreId,
    pub uuid: Uuid,
    pub device_id: DeviceId,
    pub version: u64,
    pub payload: HexBytes,
}

impl MutableDatum {
    /// Package a payload as a fresh datum with a newly minted uuid.
    pub fn new(
        data_id: impl Into<String>,
        owner: DatastoreId,
        payload: impl Into<HexBytes>,
        device_id: DeviceId,
        version: u64,
    ) -> Self {
        Self {
            data_id: data_id.into(),
            owner,
            uuid: Uuid::new_v4(),
            device_id,
            version,
            payload: payload.into(),
        }
    }

    /// Produce the next version of this datum with a new payload.
    ///
    /// Keeps the uuid, so the new datum extends the same lineage.
    pub fn successor(&self, payload: impl Into<HexBytes>, device_id: DeviceId) -> Self {
        Self {
            data_id: self.data_id.clone(),
            owner: self.owner,
            uuid: self.uuid,
            device_id,
            version: self.version + 1,
            payload: payload.into(),
        }
    }

    /// The header committing to this version.
    pub fn header(&self) -> DatumHeader {
        DatumHeader {
            uuid: self.uuid,
            version: self.version,
            device_id: self.device_id.clone(),
            payload_hash: self.payload.content_hash(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::crypto::{SecretKey, SignatureBundle};

    fn sample_datum() -> MutableDatum {
        let owner = SecretKey::generate().fingerprint();
        MutableDatum::new(
            "sample",
            owner,
            b"payload bytes".to_vec(),
            DeviceId::new("d1"),
            1,
        )
    }

    #[test]
    fn test_header_commits_to_payload() {
        let datum = sample_datum();
        let header = datum.header();
        assert_eq!(header.payload_hash, ContentHash::of(b"payload bytes"));
        assert_eq!(header.uuid, datum.uuid);
        assert_eq!(header.version, 1);

        let mut tampered = datum.clone();
        tampered.payload = HexBytes::from(b"other bytes".as_slice());
        assert_ne!(header, tampered.header());
    }

    #[test]
    fn test_header_bytes_are_deterministic() {
        let datum = sample_datum();
        let first = datum.header().signable_bytes().unwrap();
        let second = datum.header().signable_bytes().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_successor_extends_lineage() {
        let datum = sample_datum();
        let next = datum.successor(b"payload v2".to_vec(), DeviceId::new("d1"));

        assert_eq!(next.uuid, datum.uuid);
        assert_eq!(next.data_id, datum.data_id);
        assert_eq!(next.version, 2);
        assert_ne!(next.header().payload_hash, datum.header().payload_hash);
    }

    #[test]
    fn test_signed_header_round_trip() {
        let key = SecretKey::generate();
        let owner = key.fingerprint();
        let datum = MutableDatum::new("signed", owner, b"x".to_vec(), DeviceId::new("d1"), 3);

        let bytes = datum.header().signable_bytes().unwrap();
        let bundle = SignatureBundle::sign(&bytes, &key);
        assert!(bundle.verify(&bytes, &owner));

        // Decoding the header back yields the same signable bytes
        let decoded = DatumHeader::decode(&bytes).unwrap();
        assert_eq!(decoded, datum.header());
        assert_eq!(decoded.signable_bytes().unwrap(), bytes);
    }
}
