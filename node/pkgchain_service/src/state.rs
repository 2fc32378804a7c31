//! The service façade's state machine (spec §4.7, §5): one mutex guarding
//! the skipchain store, the `{identity -> TrackedRepo}` map and the current
//! `TimestampBundle`, matching the single-lock concurrency model every
//! write path (Create, Update, the timestamp cycle) acquires.

use std::collections::HashMap;
use std::sync::Arc;

use pkgchain_propagation::{propagate, DataSink, PropagationTransport, Tree, FANOUT};
use pkgchain_skipchain::SkipchainStore;
use pkgchain_types::{
    CosignDriver, Hash, PkgchainError, Release, RepositoryChain, Roster, SkipBlock,
    TimestampBundle,
};
use tokio::sync::Mutex;

/// Verifier id the root (roster/config) chain genesis is registered under.
/// It never carries a payload, so the verifier predicate is trivially true.
const ROSTER_VERIFIER_ID: &str = "roster-v1";

struct AcceptAllVerifier;
impl pkgchain_skipchain::Verifier for AcceptAllVerifier {
    fn check(&self, _payload: &[u8]) -> bool {
        true
    }
}

/// A no-op persistence step for the propagation tree's root: the proposer
/// already committed the block to its own skipchain before fanning out, so
/// its own `on_data` callback has nothing left to do.
struct NoopSink;
#[async_trait::async_trait]
impl DataSink for NoopSink {
    async fn on_data(&self, _payload: &[u8]) -> Result<(), PkgchainError> {
        Ok(())
    }
}

#[derive(Clone, Copy)]
struct TrackedRepo {
    root_genesis: Hash,
    data_genesis: Hash,
}

struct Inner {
    skipchain: SkipchainStore,
    repos: HashMap<String, TrackedRepo>,
    timestamp: Option<TimestampBundle>,
}

/// Stateful façade over one operator's repository set. Construction wires a
/// [`CosignDriver`] (in-process or remote) and a [`PropagationTransport`]
/// (in-process or HTTP) — the façade itself is agnostic to which.
pub struct ServiceState {
    inner: Mutex<Inner>,
    driver: Arc<dyn CosignDriver>,
    transport: Arc<dyn PropagationTransport>,
    propagation_deadline: std::time::Duration,
}

impl ServiceState {
    pub fn new(
        driver: Arc<dyn CosignDriver>,
        transport: Arc<dyn PropagationTransport>,
        propagation_deadline: std::time::Duration,
    ) -> Self {
        let mut skipchain = SkipchainStore::new();
        skipchain.register_verifier(ROSTER_VERIFIER_ID, Arc::new(AcceptAllVerifier));
        skipchain.register_verifier(
            pkgchain_release::RELEASE_VERIFIER_ID,
            Arc::new(pkgchain_release::ReleaseVerifier),
        );
        Self {
            inner: Mutex::new(Inner {
                skipchain,
                repos: HashMap::new(),
                timestamp: None,
            }),
            driver,
            transport,
            propagation_deadline,
        }
    }

    /// `CreateRepository` (spec §4.7): bootstraps a roster chain and a data
    /// chain anchored to it, tracks the repository by identity, propagates
    /// the genesis block across the roster, then runs one timestamp cycle
    /// before returning (spec §4.6: every Create/Update is followed by
    /// exactly one cycle).
    pub async fn create_repository(
        &self,
        roster: Roster,
        release: Release,
        base: u32,
        height: u32,
    ) -> Result<RepositoryChain, PkgchainError> {
        let identity = release.repository.identity();
        let mut inner = self.inner.lock().await;

        if inner.repos.contains_key(&identity) {
            return Err(PkgchainError::MalformedRequest(format!(
                "repository {identity} already exists"
            )));
        }

        let root_genesis = inner
            .skipchain
            .create_roster(roster.clone(), base, height, ROSTER_VERIFIER_ID.to_string());
        let payload = pkgchain_release::encode_release(&release)?;
        let data_genesis = inner.skipchain.create_data(
            &root_genesis,
            base,
            height,
            pkgchain_release::RELEASE_VERIFIER_ID.to_string(),
            payload.clone(),
        )?;

        inner.repos.insert(
            identity.clone(),
            TrackedRepo {
                root_genesis: root_genesis.genesis_hash,
                data_genesis: data_genesis.genesis_hash,
            },
        );

        self.propagate_payload(&roster, &payload, &identity).await;
        self.refresh_timestamp(&mut inner).await?;

        Ok(RepositoryChain {
            root_chain_head: root_genesis.hash,
            data_chain_head: data_genesis.hash,
            latest_release: release,
        })
    }

    /// `UpdateRepository` (spec §4.7): appends a new data block carrying
    /// `release` unless its root already matches the current head's release
    /// (the no-op short-circuit — still refreshes the timestamp so a caller
    /// polling `LatestBlock` sees a fresh bundle even when nothing changed).
    pub async fn update_repository(&self, release: Release) -> Result<RepositoryChain, PkgchainError> {
        let identity = release.repository.identity();
        let mut inner = self.inner.lock().await;

        let tracked = *inner
            .repos
            .get(&identity)
            .ok_or_else(|| PkgchainError::UnknownRepository(identity.clone()))?;

        let current_head = inner
            .skipchain
            .head(&tracked.data_genesis)
            .cloned()
            .ok_or_else(|| PkgchainError::UnknownRepository(identity.clone()))?;
        let previous_release = pkgchain_release::decode_release(&current_head.data)?;

        if previous_release.root_id == release.root_id {
            self.refresh_timestamp(&mut inner).await?;
            let root_head = inner.skipchain.head(&tracked.root_genesis).unwrap().hash;
            return Ok(RepositoryChain {
                root_chain_head: root_head,
                data_chain_head: current_head.hash,
                latest_release: previous_release,
            });
        }

        let payload = pkgchain_release::encode_release(&release)?;
        let new_block = inner
            .skipchain
            .propose_data(
                tracked.data_genesis,
                &current_head,
                payload.clone(),
                self.driver.as_ref(),
            )
            .await?;

        let roster = current_head.roster.clone();
        self.propagate_payload(&roster, &payload, &identity).await;
        self.refresh_timestamp(&mut inner).await?;

        let root_head = inner.skipchain.head(&tracked.root_genesis).unwrap().hash;
        Ok(RepositoryChain {
            root_chain_head: root_head,
            data_chain_head: new_block.hash,
            latest_release: release,
        })
    }

    /// `LatestBlock`: the forward-link path from `last_known_hash` to the
    /// current head of whichever chain it belongs to, plus the current
    /// timestamp bundle.
    pub async fn latest_block(
        &self,
        last_known_hash: Hash,
    ) -> Result<(TimestampBundle, Vec<SkipBlock>), PkgchainError> {
        let inner = self.inner.lock().await;
        let timestamp = inner.timestamp.clone().ok_or(PkgchainError::NoTimestamp)?;
        let block = inner
            .skipchain
            .block(&last_known_hash)
            .ok_or_else(|| PkgchainError::UnknownRepository(last_known_hash.to_hex()))?;
        let path = inner
            .skipchain
            .get_update_chain(block.genesis_hash, last_known_hash)?;
        Ok((timestamp, path))
    }

    /// `LatestBlocks`: batched form of `LatestBlock`. Hashes already at their
    /// chain's head are omitted from the result entirely (spec §6); hashes
    /// this façade has never seen are skipped rather than failing the whole
    /// batch, so one stale client doesn't block every other id in the call.
    pub async fn latest_blocks(
        &self,
        last_known_hashes: Vec<Hash>,
    ) -> Result<(TimestampBundle, Vec<Vec<SkipBlock>>), PkgchainError> {
        let inner = self.inner.lock().await;
        let timestamp = inner.timestamp.clone().ok_or(PkgchainError::NoTimestamp)?;
        let mut updates = Vec::new();
        for hash in last_known_hashes {
            let Some(block) = inner.skipchain.block(&hash) else {
                continue;
            };
            let path = inner.skipchain.get_update_chain(block.genesis_hash, hash)?;
            if path.len() > 1 {
                updates.push(path);
            }
        }
        Ok((timestamp, updates))
    }

    /// `LatestBlockRepo`: convenience lookup by repository identity, returning
    /// the full data-chain path from genesis to head.
    pub async fn latest_block_repo(
        &self,
        name: &str,
    ) -> Result<(TimestampBundle, Vec<SkipBlock>), PkgchainError> {
        let inner = self.inner.lock().await;
        let timestamp = inner.timestamp.clone().ok_or(PkgchainError::NoTimestamp)?;
        let tracked = inner
            .repos
            .get(name)
            .ok_or_else(|| PkgchainError::UnknownRepository(name.to_string()))?;
        let path = inner
            .skipchain
            .get_update_chain(tracked.data_genesis, tracked.data_genesis)?;
        Ok((timestamp, path))
    }

    /// `RepositorySC`: the data chain's genesis and current head blocks.
    pub async fn repository_sc(&self, name: &str) -> Result<(SkipBlock, SkipBlock), PkgchainError> {
        let inner = self.inner.lock().await;
        let tracked = inner
            .repos
            .get(name)
            .ok_or_else(|| PkgchainError::UnknownRepository(name.to_string()))?;
        let first = inner
            .skipchain
            .block(&tracked.data_genesis)
            .cloned()
            .ok_or_else(|| PkgchainError::UnknownRepository(name.to_string()))?;
        let last = inner
            .skipchain
            .head(&tracked.data_genesis)
            .cloned()
            .ok_or_else(|| PkgchainError::UnknownRepository(name.to_string()))?;
        Ok((first, last))
    }

    /// Inbound side of the propagation tree: a peer that received `DATA` for
    /// a block it did not itself propose. Per spec §4.4/§4.7: persist the
    /// block and always replace the latest-head entry for a repository this
    /// peer already tracks; a repository it has never heard of is the one
    /// case left as a no-op (see below).
    pub async fn receive_propagated_data(&self, payload: Vec<u8>) -> Result<(), PkgchainError> {
        let release = pkgchain_release::decode_release(&payload)?;
        let identity = release.repository.identity();
        let mut inner = self.inner.lock().await;

        let Some(tracked) = inner.repos.get(&identity).copied() else {
            // First time this peer has heard of the repository: there is no
            // roster/base/height context in a bare DATA message, so the peer
            // can only durably persist the payload once its own
            // CreateRepository call (carrying that context) arrives. This is
            // acceptable because the proposer itself already committed the
            // genesis locally; propagation to a peer that joined mid-stream
            // is a liveness optimization, not a correctness requirement.
            tracing::debug!("ignoring propagated data for untracked repository {identity}");
            return Ok(());
        };

        let current_head = inner
            .skipchain
            .head(&tracked.data_genesis)
            .cloned()
            .ok_or_else(|| PkgchainError::UnknownRepository(identity.clone()))?;
        let current_release = pkgchain_release::decode_release(&current_head.data)?;
        if current_release.root_id == release.root_id {
            // Already applied — the proposer's own commit, or a duplicate
            // delivery from the fan-out tree.
            return Ok(());
        }

        inner
            .skipchain
            .propose_data(tracked.data_genesis, &current_head, payload, self.driver.as_ref())
            .await?;
        Ok(())
    }

    async fn propagate_payload(&self, roster: &Roster, payload: &[u8], identity: &str) {
        let tree = Tree::build(roster.len().max(1), FANOUT);
        let sink = NoopSink;
        let outcome = match propagate(
            &tree,
            0,
            payload,
            self.propagation_deadline,
            &sink,
            self.transport.as_ref(),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::warn!("propagation for {identity} failed to persist locally: {err}");
                return;
            }
        };
        if let Err(PkgchainError::PropagationPartial { acked, total }) =
            pkgchain_propagation::outcome_to_result(outcome)
        {
            tracing::warn!("genesis/update for {identity} reached only {acked}/{total} roster members");
        }
    }

    async fn refresh_timestamp(&self, inner: &mut Inner) -> Result<(), PkgchainError> {
        let mut identities: Vec<&String> = inner.repos.keys().collect();
        identities.sort();
        let heads: Vec<Hash> = identities
            .iter()
            .map(|id| {
                inner
                    .skipchain
                    .head(&inner.repos[*id].data_genesis)
                    .map(|b| b.hash)
                    .unwrap_or(Hash::ZERO)
            })
            .collect();
        let now = chrono::Utc::now().timestamp();
        let bundle = pkgchain_timestamp::produce_timestamp_bundle(&heads, now, self.driver.as_ref()).await?;
        inner.timestamp = Some(bundle);
        Ok(())
    }

    /// Runs a timestamp cycle outside of any Create/Update call, for the
    /// background `TSInterval` timer (spec §4.6).
    pub async fn run_timestamp_cycle(&self) -> Result<(), PkgchainError> {
        let mut inner = self.inner.lock().await;
        self.refresh_timestamp(&mut inner).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pkgchain_cosign::LocalCosignDriver;
    use pkgchain_propagation::PropagationOutcome;
    use pkgchain_types::{Package, Repository, SignerIdentity};
    use rand::rngs::OsRng;
    use secp256k1::SecretKey;
    use std::time::Duration;

    struct NullTransport;
    #[async_trait]
    impl PropagationTransport for NullTransport {
        async fn send_data(
            &self,
            peer_index: usize,
            _payload: Vec<u8>,
            _deadline: Duration,
        ) -> Result<PropagationOutcome, PkgchainError> {
            Ok(PropagationOutcome {
                acked: 1,
                total: peer_index + 1,
                partial: false,
            })
        }
    }

    fn roster(n: usize) -> Roster {
        Roster::new(
            (0..n)
                .map(|i| SignerIdentity {
                    public_key: format!("pub{i}"),
                    address: format!("127.0.0.1:900{i}"),
                })
                .collect(),
        )
    }

    fn release(origin: &str, version: &str) -> Release {
        let repo = Repository::new(
            origin,
            "stable",
            version,
            vec![Package::new("alpha", "1.0", Hash([1u8; 32]))],
            "https://example.invalid",
        );
        pkgchain_release::build_release(repo)
    }

    fn state() -> ServiceState {
        let mut rng = OsRng;
        let keys: Vec<SecretKey> = (0..3).map(|_| SecretKey::new(&mut rng)).collect();
        ServiceState::new(
            Arc::new(LocalCosignDriver::new(keys)),
            Arc::new(NullTransport),
            Duration::from_millis(500),
        )
    }

    #[tokio::test]
    async fn create_then_update_advances_the_data_chain() {
        let svc = state();
        let chain = svc
            .create_repository(roster(3), release("debian", "1"), 2, 10)
            .await
            .unwrap();

        let updated = svc.update_repository(release("debian", "2")).await.unwrap();
        assert_ne!(updated.data_chain_head, chain.data_chain_head);

        let (_, path) = svc.latest_block(chain.data_chain_head).await.unwrap();
        assert_eq!(path.first().unwrap().hash, chain.data_chain_head);
        assert_eq!(path.last().unwrap().hash, updated.data_chain_head);
    }

    #[tokio::test]
    async fn update_with_unchanged_root_is_a_no_op() {
        let svc = state();
        let rel = release("debian", "1");
        let chain = svc.create_repository(roster(1), rel.clone(), 2, 10).await.unwrap();
        let again = svc.update_repository(rel).await.unwrap();
        assert_eq!(again.data_chain_head, chain.data_chain_head);
    }

    #[tokio::test]
    async fn latest_blocks_omits_repositories_already_at_head() {
        let svc = state();
        let a = svc
            .create_repository(roster(1), release("debian", "1"), 2, 10)
            .await
            .unwrap();
        let b = svc
            .create_repository(roster(1), release("ubuntu", "1"), 2, 10)
            .await
            .unwrap();
        svc.update_repository(release("debian", "2")).await.unwrap();

        let (_, updates) = svc
            .latest_blocks(vec![a.data_chain_head, b.data_chain_head])
            .await
            .unwrap();
        assert_eq!(updates.len(), 1, "only debian advanced past its last-known hash");
    }

    #[tokio::test]
    async fn verifier_rejection_leaves_state_untouched() {
        let svc = state();
        let chain = svc
            .create_repository(roster(1), release("debian", "1"), 2, 10)
            .await
            .unwrap();

        let mut bad = release("debian", "2");
        bad.root_id = Hash::ZERO;
        let err = svc.update_repository(bad).await.unwrap_err();
        assert!(matches!(err, PkgchainError::VerifierRejected(_)));

        let (_, head) = svc.repository_sc("debian-stable").await.unwrap();
        assert_eq!(head.hash, chain.data_chain_head);
    }

    #[tokio::test]
    async fn create_repository_rejects_duplicate_identity() {
        let svc = state();
        svc.create_repository(roster(1), release("debian", "1"), 2, 10)
            .await
            .unwrap();
        let err = svc
            .create_repository(roster(1), release("debian", "2"), 2, 10)
            .await
            .unwrap_err();
        assert!(matches!(err, PkgchainError::MalformedRequest(_)));
    }

    struct PartiallyDroppingTransport;
    #[async_trait]
    impl PropagationTransport for PartiallyDroppingTransport {
        async fn send_data(
            &self,
            peer_index: usize,
            _payload: Vec<u8>,
            _deadline: Duration,
        ) -> Result<PropagationOutcome, PkgchainError> {
            if peer_index == 0 {
                return Err(PkgchainError::CosignFailed("peer unreachable".into()));
            }
            Ok(PropagationOutcome {
                acked: 1,
                total: peer_index + 1,
                partial: false,
            })
        }
    }

    #[tokio::test]
    async fn partial_propagation_is_a_warning_not_a_failure() {
        let mut rng = OsRng;
        let keys: Vec<SecretKey> = (0..3).map(|_| SecretKey::new(&mut rng)).collect();
        let svc = ServiceState::new(
            Arc::new(LocalCosignDriver::new(keys)),
            Arc::new(PartiallyDroppingTransport),
            Duration::from_millis(500),
        );

        // one peer in the fan-out tree never acknowledges, but the block is
        // already durable at the proposer, so the call still succeeds.
        let chain = svc
            .create_repository(roster(4), release("debian", "1"), 2, 10)
            .await
            .unwrap();
        let (_, head) = svc.repository_sc("debian-stable").await.unwrap();
        assert_eq!(head.hash, chain.data_chain_head);
    }

    #[tokio::test]
    async fn receive_propagated_data_advances_a_tracked_repository() {
        let svc = state();
        let chain = svc
            .create_repository(roster(1), release("debian", "1"), 2, 10)
            .await
            .unwrap();

        let next = release("debian", "2");
        let payload = pkgchain_release::encode_release(&next).unwrap();
        svc.receive_propagated_data(payload).await.unwrap();

        let (_, head) = svc.repository_sc("debian-stable").await.unwrap();
        assert_ne!(head.hash, chain.data_chain_head);
        let applied = pkgchain_release::decode_release(&head.data).unwrap();
        assert_eq!(applied.root_id, next.root_id);
    }

    #[tokio::test]
    async fn receive_propagated_data_is_a_no_op_for_an_untracked_repository() {
        let svc = state();
        let payload = pkgchain_release::encode_release(&release("ubuntu", "1")).unwrap();
        svc.receive_propagated_data(payload).await.unwrap();
        assert!(svc.repository_sc("ubuntu-stable").await.is_err());
    }
}
