use serde::{Deserialize, Serialize};

use crate::{hash::Hash, release::Release};

/// Per-repository service state: the root (configuration) chain head, the
/// data chain head, and the Release carried by that data chain head.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryChain {
    pub root_chain_head: Hash,
    pub data_chain_head: Hash,
    pub latest_release: Release,
}
