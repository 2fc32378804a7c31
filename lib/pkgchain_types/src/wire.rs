use serde::{Deserialize, Serialize};

use crate::{
    hash::Hash, release::Release, repository_chain::RepositoryChain, skipblock::SkipBlock,
    skipblock::Roster, timestamp::TimestampBundle,
};

/// Client-facing request set (spec §6). Internally tagged so the façade can
/// dispatch on `type` instead of a dynamic message registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    CreateRepository {
        roster: Roster,
        release: Release,
        base: u32,
        height: u32,
    },
    /// The repository to update is derived from `release.repository.identity()`;
    /// the service is the sole owner of `RepositoryChain` state, so the wire
    /// form need not echo it back (see DESIGN.md).
    UpdateRepository {
        release: Release,
    },
    LatestBlock {
        last_known_hash: Hash,
    },
    LatestBlocks {
        last_known_hashes: Vec<Hash>,
    },
    LatestBlockRepo {
        name: String,
    },
    RepositorySC {
        name: String,
    },
}

/// Matching response set. `LatestBlocksRetInternal` flattens the ragged
/// per-chain update paths into `updates`/`lengths` (spec §6, resolved in
/// SPEC_FULL.md §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    CreateRepositoryRet {
        repository_chain: RepositoryChain,
    },
    UpdateRepositoryRet {
        repository_chain: RepositoryChain,
    },
    LatestBlockRet {
        timestamp: TimestampBundle,
        update: Vec<SkipBlock>,
    },
    LatestBlocksRetInternal {
        timestamp: TimestampBundle,
        updates: Vec<SkipBlock>,
        lengths: Vec<usize>,
    },
    RepositorySCRet {
        first: SkipBlock,
        last: SkipBlock,
    },
}

impl Response {
    /// Splits a flattened `LatestBlocksRetInternal` back into per-request
    /// update paths, using `lengths` the way the wire-format decision
    /// documents.
    pub fn split_latest_blocks(
        updates: Vec<SkipBlock>,
        lengths: &[usize],
    ) -> Vec<Vec<SkipBlock>> {
        let mut out = Vec::with_capacity(lengths.len());
        let mut iter = updates.into_iter();
        for &len in lengths {
            let mut path = Vec::with_capacity(len);
            for _ in 0..len {
                if let Some(block) = iter.next() {
                    path.push(block);
                }
            }
            out.push(path);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_round_trips_through_json() {
        let req = Request::LatestBlock {
            last_known_hash: Hash::ZERO,
        };
        let s = serde_json::to_string(&req).unwrap();
        assert!(s.contains("\"type\":\"LatestBlock\""));
        let back: Request = serde_json::from_str(&s).unwrap();
        match back {
            Request::LatestBlock { last_known_hash } => assert_eq!(last_known_hash, Hash::ZERO),
            _ => panic!("wrong variant"),
        }
    }
}
