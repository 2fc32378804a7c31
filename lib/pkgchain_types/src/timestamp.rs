use serde::{Deserialize, Serialize};

use crate::{hash::Hash, merkle::MerkleProof};

/// Binds a wall-clock instant to the Merkle root over every tracked
/// repository's data-chain head.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampBundle {
    pub root_id: Hash,
    pub proofs: Vec<MerkleProof>,
    pub time: i64,
    pub signature: Vec<u8>,
}

/// Encodes `(time, root)` as 8-byte big-endian seconds-since-epoch followed
/// by the raw root bytes. This is the message signed by the cosigning fleet.
pub fn marshal_pair(time: i64, root: &Hash) -> Vec<u8> {
    let mut buf = Vec::with_capacity(8 + 32);
    buf.extend_from_slice(&time.to_be_bytes());
    buf.extend_from_slice(root.as_bytes());
    buf
}

/// Inverse of [`marshal_pair`]. The root length is implicit from the total
/// buffer length (anything past the first 8 bytes).
pub fn unmarshal_pair(buf: &[u8]) -> Option<(i64, Hash)> {
    if buf.len() < 8 {
        return None;
    }
    let (time_bytes, root_bytes) = buf.split_at(8);
    let time = i64::from_be_bytes(time_bytes.try_into().ok()?);
    let root = Hash::from_slice(root_bytes)?;
    Some((time, root))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_for_arbitrary_root_and_time() {
        for time in [-1_000_000_i64, 0, 1, 1_700_000_000, i64::MAX, i64::MIN] {
            let root = Hash([time as u8; 32]);
            let buf = marshal_pair(time, &root);
            let (got_time, got_root) = unmarshal_pair(&buf).unwrap();
            assert_eq!(got_time, time);
            assert_eq!(got_root, root);
        }
    }
}
