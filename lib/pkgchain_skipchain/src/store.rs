use std::collections::HashMap;
use std::sync::Arc;

use pkgchain_types::{CosignDriver, ForwardLink, Hash, PkgchainError, Roster, SkipBlock};

use crate::traits::Verifier;

/// Largest `k` such that `index % base^k == 0`, capped at `max_height`.
/// The genesis block (`index == 0`) always saturates the cap.
fn decide_height(index: u64, base: u32, max_height: u32) -> u32 {
    let mut k = 0u32;
    let mut pow: u64 = 1;
    while k < max_height {
        let Some(next_pow) = pow.checked_mul(base as u64) else {
            break;
        };
        if index % next_pow == 0 {
            pow = next_pow;
            k += 1;
        } else {
            break;
        }
    }
    k
}

fn forward_link_message(pred: &Hash, succ: &Hash, level: u32) -> Vec<u8> {
    let mut buf = Vec::with_capacity(32 + 32 + 4);
    buf.extend_from_slice(pred.as_bytes());
    buf.extend_from_slice(succ.as_bytes());
    buf.extend_from_slice(&level.to_be_bytes());
    buf
}

/// Append-only, content-addressed store: once a `SkipBlock` is hashed and
/// inserted it is never mutated except for appending to its forward-link
/// list (the copy-on-write redesign from spec §9 — blocks live in one map
/// keyed by hash, forward links live in a parallel map keyed by the same
/// hash).
#[derive(Default)]
pub struct SkipchainStore {
    blocks: HashMap<Hash, SkipBlock>,
    forward_links: HashMap<Hash, Vec<ForwardLink>>,
    /// genesis hash -> block hashes ordered by index.
    chains: HashMap<Hash, Vec<Hash>>,
    /// genesis hash -> the `max_height` cap chosen when the chain was created.
    height_caps: HashMap<Hash, u32>,
    verifiers: HashMap<String, Arc<dyn Verifier>>,
}

impl SkipchainStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_verifier(&mut self, verifier_id: impl Into<String>, verifier: Arc<dyn Verifier>) {
        self.verifiers.insert(verifier_id.into(), verifier);
    }

    fn run_verifier(&self, verifier_id: &str, payload: &[u8]) -> Result<(), PkgchainError> {
        match self.verifiers.get(verifier_id) {
            Some(v) if v.check(payload) => Ok(()),
            Some(_) => Err(PkgchainError::VerifierRejected(format!(
                "payload rejected by verifier {verifier_id}"
            ))),
            None => Err(PkgchainError::VerifierRejected(format!(
                "no verifier registered for {verifier_id}"
            ))),
        }
    }

    pub fn block(&self, hash: &Hash) -> Option<&SkipBlock> {
        self.blocks.get(hash)
    }

    pub fn head(&self, genesis: &Hash) -> Option<&SkipBlock> {
        self.chains
            .get(genesis)
            .and_then(|c| c.last())
            .and_then(|h| self.blocks.get(h))
    }

    fn insert_genesis(&mut self, mut block: SkipBlock, max_height: u32) -> SkipBlock {
        block.hash = Hash::ZERO;
        block.genesis_hash = Hash::ZERO;
        let hash = pkgchain_merkle::h(&block.immutable_bytes());
        block.hash = hash;
        block.genesis_hash = hash;
        self.blocks.insert(hash, block.clone());
        self.chains.insert(hash, vec![hash]);
        self.height_caps.insert(hash, max_height);
        block
    }

    /// `CreateRoster` — builds the genesis block of a chain's root (config)
    /// anchor.
    pub fn create_roster(
        &mut self,
        roster: Roster,
        base: u32,
        max_height: u32,
        verifier_id: String,
    ) -> SkipBlock {
        let height = decide_height(0, base, max_height);
        let block = SkipBlock {
            index: 0,
            hash: Hash::ZERO,
            backward_links: Vec::new(),
            forward_links: Vec::new(),
            roster,
            height,
            base,
            verifier_id,
            data: Vec::new(),
            genesis_hash: Hash::ZERO,
        };
        self.insert_genesis(block, max_height)
    }

    /// `CreateData` — builds the genesis block of a repository's data chain,
    /// anchored to the same roster as `root_chain_genesis`. Returns the data
    /// chain genesis block; the root chain is returned unchanged by the
    /// caller (it is not mutated by this operation).
    pub fn create_data(
        &mut self,
        root_chain_genesis: &SkipBlock,
        base: u32,
        max_height: u32,
        verifier_id: String,
        payload: Vec<u8>,
    ) -> Result<SkipBlock, PkgchainError> {
        self.run_verifier(&verifier_id, &payload)?;
        let height = decide_height(0, base, max_height);
        let block = SkipBlock {
            index: 0,
            hash: Hash::ZERO,
            backward_links: Vec::new(),
            forward_links: Vec::new(),
            roster: root_chain_genesis.roster.clone(),
            height,
            base,
            verifier_id,
            data: payload,
            genesis_hash: Hash::ZERO,
        };
        Ok(self.insert_genesis(block, max_height))
    }

    /// `ProposeData` — appends one block to the data chain rooted at
    /// `genesis`. Fails atomically: nothing is persisted unless every
    /// fallible step (verifier, every forward-link signature) succeeds.
    pub async fn propose_data(
        &mut self,
        genesis: Hash,
        tail: &SkipBlock,
        payload: Vec<u8>,
        signer: &dyn CosignDriver,
    ) -> Result<SkipBlock, PkgchainError> {
        let chain = self
            .chains
            .get(&genesis)
            .ok_or_else(|| PkgchainError::UnknownRepository(genesis.to_hex()))?;
        let head_hash = *chain.last().expect("chain always has at least genesis");
        if head_hash != tail.hash {
            return Err(PkgchainError::NotOnChain(tail.hash.to_hex()));
        }

        let max_height = *self.height_caps.get(&genesis).unwrap_or(&tail.height.max(1));
        let index = tail.index + 1;
        let height = decide_height(index, tail.base, max_height);

        let mut backward_links = Vec::with_capacity(height as usize + 1);
        for k in 0..=height {
            let step = tail.base as u64;
            let pow = step.checked_pow(k).unwrap_or(u64::MAX);
            let target_index = index.saturating_sub(pow);
            let target_hash = chain
                .get(target_index as usize)
                .copied()
                .ok_or_else(|| PkgchainError::NotOnChain(format!("backlink index {target_index}")))?;
            backward_links.push(target_hash);
        }

        self.run_verifier(&tail.verifier_id, &payload)?;

        let mut new_block = SkipBlock {
            index,
            hash: Hash::ZERO,
            backward_links,
            forward_links: Vec::new(),
            roster: tail.roster.clone(),
            height,
            base: tail.base,
            verifier_id: tail.verifier_id.clone(),
            data: payload,
            genesis_hash: genesis,
        };
        let new_hash = pkgchain_merkle::h(&new_block.immutable_bytes());
        new_block.hash = new_hash;

        // Collect every forward-link signature before mutating any state.
        let mut pending_links = Vec::with_capacity(height as usize + 1);
        for k in 0..=height {
            let step = tail.base as u64;
            let pow = step.checked_pow(k).unwrap_or(u64::MAX);
            let target_index = index.saturating_sub(pow);
            let pred_hash = self
                .chains
                .get(&genesis)
                .and_then(|c| c.get(target_index as usize))
                .copied()
                .expect("backward link target was just validated to exist");
            let message = forward_link_message(&pred_hash, &new_hash, k);
            let signature = signer.sign(&message).await?;
            pending_links.push((
                pred_hash,
                ForwardLink {
                    level: k,
                    target: new_hash,
                    signature,
                },
            ));
        }

        self.blocks.insert(new_hash, new_block.clone());
        self.chains.get_mut(&genesis).unwrap().push(new_hash);
        for (pred_hash, link) in pending_links {
            if let Some(pred_block) = self.blocks.get_mut(&pred_hash) {
                pred_block.forward_links.push(link.clone());
            }
            self.forward_links.entry(pred_hash).or_default().push(link);
        }

        Ok(new_block)
    }

    /// `GetUpdateChain` — shortest forward-link path from `last_known_hash`
    /// to the current head, always starting with `last_known_hash`'s own
    /// block and ending with the head.
    pub fn get_update_chain(
        &self,
        genesis: Hash,
        last_known_hash: Hash,
    ) -> Result<Vec<SkipBlock>, PkgchainError> {
        let chain = self
            .chains
            .get(&genesis)
            .ok_or_else(|| PkgchainError::UnknownRepository(genesis.to_hex()))?;
        let start_block = self
            .blocks
            .get(&last_known_hash)
            .ok_or_else(|| PkgchainError::UnknownRepository(last_known_hash.to_hex()))?;
        if start_block.genesis_hash != genesis {
            return Err(PkgchainError::NotOnChain(last_known_hash.to_hex()));
        }

        let head_hash = *chain.last().expect("chain always has at least genesis");
        let head_index = self.blocks[&head_hash].index;

        let mut path = vec![start_block.clone()];
        let mut current_hash = last_known_hash;
        while current_hash != head_hash {
            let current_index = self.blocks[&current_hash].index;
            let links = self.forward_links.get(&current_hash);
            let best = links.into_iter().flatten().filter(|link| {
                self.blocks
                    .get(&link.target)
                    .map(|b| b.index <= head_index)
                    .unwrap_or(false)
            }).max_by_key(|link| link.level);

            let next_hash = match best {
                Some(link) => link.target,
                None => {
                    let next_index = (current_index + 1) as usize;
                    *chain
                        .get(next_index)
                        .ok_or_else(|| PkgchainError::NotOnChain(current_hash.to_hex()))?
                }
            };
            current_hash = next_hash;
            path.push(self.blocks[&current_hash].clone());
        }

        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkgchain_types::SignerIdentity;

    struct AlwaysTrue;
    impl Verifier for AlwaysTrue {
        fn check(&self, _payload: &[u8]) -> bool {
            true
        }
    }

    struct AlwaysFalse;
    impl Verifier for AlwaysFalse {
        fn check(&self, _payload: &[u8]) -> bool {
            false
        }
    }

    struct StubSigner;
    #[async_trait::async_trait]
    impl CosignDriver for StubSigner {
        async fn sign(&self, message: &[u8]) -> Result<Vec<u8>, PkgchainError> {
            Ok(message.to_vec())
        }
    }

    struct FailingSigner;
    #[async_trait::async_trait]
    impl CosignDriver for FailingSigner {
        async fn sign(&self, _message: &[u8]) -> Result<Vec<u8>, PkgchainError> {
            Err(PkgchainError::CosignFailed("stub refusal".into()))
        }
    }

    fn roster() -> Roster {
        Roster::new(vec![SignerIdentity {
            public_key: "pub1".into(),
            address: "127.0.0.1:9001".into(),
        }])
    }

    fn height_for_index(store: &SkipchainStore, genesis: Hash, idx: u64) -> u32 {
        let chain = &store.chains[&genesis];
        store.blocks[&chain[idx as usize]].height
    }

    #[test]
    fn decide_height_matches_largest_divisor_power() {
        assert_eq!(decide_height(4, 2, 10), 2);
        assert_eq!(decide_height(6, 2, 10), 1);
        assert_eq!(decide_height(8, 2, 10), 3);
        assert_eq!(decide_height(0, 2, 10), 10);
        assert_eq!(decide_height(5, 2, 10), 0);
    }

    #[tokio::test]
    async fn propose_data_links_to_predecessor_and_advances_index() {
        let mut store = SkipchainStore::new();
        store.register_verifier("release", Arc::new(AlwaysTrue));
        let genesis = store.create_data(
            &store.create_roster(roster(), 2, 10, "release".into()),
            2,
            10,
            "release".into(),
            b"payload-0".to_vec(),
        ).unwrap();

        let signer = StubSigner;
        let block1 = store
            .propose_data(genesis.genesis_hash, &genesis, b"payload-1".to_vec(), &signer)
            .await
            .unwrap();
        assert_eq!(block1.index, 1);
        assert_eq!(block1.backward_links[0], genesis.hash);

        let head = store.head(&genesis.genesis_hash).unwrap();
        assert_eq!(head.hash, block1.hash);
        assert_eq!(height_for_index(&store, genesis.genesis_hash, 1), 0);
    }

    #[tokio::test]
    async fn propose_data_rejects_stale_tail() {
        let mut store = SkipchainStore::new();
        store.register_verifier("release", Arc::new(AlwaysTrue));
        let root = store.create_roster(roster(), 2, 10, "release".into());
        let genesis = store
            .create_data(&root, 2, 10, "release".into(), b"payload-0".to_vec())
            .unwrap();
        let signer = StubSigner;
        let block1 = store
            .propose_data(genesis.genesis_hash, &genesis, b"payload-1".to_vec(), &signer)
            .await
            .unwrap();

        // Proposing against the now-stale genesis tail must fail, not fork.
        let err = store
            .propose_data(genesis.genesis_hash, &genesis, b"payload-2".to_vec(), &signer)
            .await
            .unwrap_err();
        assert!(matches!(err, PkgchainError::NotOnChain(_)));
        assert_eq!(store.head(&genesis.genesis_hash).unwrap().hash, block1.hash);
    }

    #[tokio::test]
    async fn propose_data_is_atomic_on_verifier_rejection() {
        let mut store = SkipchainStore::new();
        store.register_verifier("release", Arc::new(AlwaysFalse));
        let root = store.create_roster(roster(), 2, 10, "release".into());
        let err = store.create_data(&root, 2, 10, "release".into(), b"bad".to_vec());
        assert!(matches!(err, Err(PkgchainError::VerifierRejected(_))));
    }

    #[tokio::test]
    async fn propose_data_is_atomic_on_cosign_failure() {
        let mut store = SkipchainStore::new();
        store.register_verifier("release", Arc::new(AlwaysTrue));
        let root = store.create_roster(roster(), 2, 10, "release".into());
        let genesis = store
            .create_data(&root, 2, 10, "release".into(), b"payload-0".to_vec())
            .unwrap();

        let failing = FailingSigner;
        let err = store
            .propose_data(genesis.genesis_hash, &genesis, b"payload-1".to_vec(), &failing)
            .await
            .unwrap_err();
        assert!(matches!(err, PkgchainError::CosignFailed(_)));
        // Nothing committed: head is still genesis.
        assert_eq!(store.head(&genesis.genesis_hash).unwrap().hash, genesis.hash);
    }

    #[tokio::test]
    async fn get_update_chain_starts_at_request_and_ends_at_head() {
        let mut store = SkipchainStore::new();
        store.register_verifier("release", Arc::new(AlwaysTrue));
        let root = store.create_roster(roster(), 2, 10, "release".into());
        let genesis = store
            .create_data(&root, 2, 10, "release".into(), b"p0".to_vec())
            .unwrap();
        let signer = StubSigner;
        let mut tail = genesis.clone();
        for i in 1..=3u8 {
            tail = store
                .propose_data(genesis.genesis_hash, &tail, vec![i], &signer)
                .await
                .unwrap();
        }

        let path = store
            .get_update_chain(genesis.genesis_hash, genesis.hash)
            .unwrap();
        assert_eq!(path.first().unwrap().hash, genesis.hash);
        assert_eq!(path.last().unwrap().hash, tail.hash);
    }

    #[tokio::test]
    async fn get_update_chain_rejects_unknown_hash() {
        let mut store = SkipchainStore::new();
        store.register_verifier("release", Arc::new(AlwaysTrue));
        let root = store.create_roster(roster(), 2, 10, "release".into());
        let genesis = store
            .create_data(&root, 2, 10, "release".into(), b"p0".to_vec())
            .unwrap();
        let err = store
            .get_update_chain(genesis.genesis_hash, Hash([9u8; 32]))
            .unwrap_err();
        assert!(matches!(err, PkgchainError::UnknownRepository(_)));
    }

    #[tokio::test]
    async fn an_odd_index_still_gets_its_own_backward_and_forward_link() {
        // decide_height(1, 2, 10) == 0: the top (and only) level is level 0,
        // so the loop building links must still run once, not zero times.
        let mut store = SkipchainStore::new();
        store.register_verifier("release", Arc::new(AlwaysTrue));
        let root = store.create_roster(roster(), 2, 10, "release".into());
        let genesis = store
            .create_data(&root, 2, 10, "release".into(), b"p0".to_vec())
            .unwrap();
        let signer = StubSigner;
        let block1 = store
            .propose_data(genesis.genesis_hash, &genesis, b"p1".to_vec(), &signer)
            .await
            .unwrap();

        assert_eq!(block1.height, 0);
        assert_eq!(block1.backward_links.len(), 1);
        assert_eq!(block1.backward_links[0], genesis.hash);

        let genesis_with_link = store.block(&genesis.hash).unwrap();
        assert_eq!(genesis_with_link.forward_links.len(), 1);
        assert_eq!(genesis_with_link.forward_links[0].level, 0);
        assert_eq!(genesis_with_link.forward_links[0].target, block1.hash);
    }
}
