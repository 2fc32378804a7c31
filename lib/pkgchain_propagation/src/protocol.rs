use std::time::Duration;

use async_trait::async_trait;
use pkgchain_types::PkgchainError;

use crate::tree::Tree;

/// Result of propagating one payload through a subtree: how many nodes
/// (including the subtree's own root) acknowledged, how many nodes the
/// subtree contains in total, and whether any descendant failed to
/// acknowledge before its deadline (§7 `PropagationPartial`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropagationOutcome {
    pub acked: usize,
    pub total: usize,
    pub partial: bool,
}

/// The user-registered callback invoked exactly once per node per
/// propagation, before any child is asked to propagate (pre-order).
#[async_trait]
pub trait DataSink: Send + Sync {
    async fn on_data(&self, payload: &[u8]) -> Result<(), PkgchainError>;
}

/// Sends a `DATA` message to one child peer and returns that child's own
/// subtree outcome — for a remote peer this is an RPC that blocks until the
/// peer's own fan-out has finished or timed out.
#[async_trait]
pub trait PropagationTransport: Send + Sync {
    async fn send_data(
        &self,
        peer_index: usize,
        payload: Vec<u8>,
        deadline: Duration,
    ) -> Result<PropagationOutcome, PkgchainError>;
}

/// Drives the state machine for one node in the tree: persist, then (if
/// interior) fan out `DATA` to every child concurrently and fold their
/// replies. `node` is this node's position in `tree` (the proposing root is
/// always position 0 from the tree's own point of view).
pub async fn propagate(
    tree: &Tree,
    node: usize,
    payload: &[u8],
    deadline: Duration,
    sink: &dyn DataSink,
    transport: &dyn PropagationTransport,
) -> Result<PropagationOutcome, PkgchainError> {
    sink.on_data(payload).await?;

    let children = tree.children.get(node).cloned().unwrap_or_default();
    let total = tree.subtree_size(node);
    if children.is_empty() {
        return Ok(PropagationOutcome {
            acked: 1,
            total,
            partial: false,
        });
    }

    let sends = children.iter().map(|&child| {
        let payload = payload.to_vec();
        async move {
            match tokio::time::timeout(deadline, transport.send_data(child, payload, deadline)).await
            {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(_)) | Err(_) => PropagationOutcome {
                    acked: 0,
                    total: tree.subtree_size(child),
                    partial: true,
                },
            }
        }
    });
    let results = futures::future::join_all(sends).await;

    let mut acked = 1usize;
    let mut partial = false;
    for r in results {
        acked += r.acked;
        partial |= r.partial;
    }

    Ok(PropagationOutcome {
        acked,
        total,
        partial,
    })
}

/// Converts a propagation outcome into the §7 error/success split: fully
/// acknowledged subtrees return `Ok`, partial ones surface as the
/// non-fatal `PropagationPartial` warning (never an abort).
pub fn outcome_to_result(outcome: PropagationOutcome) -> Result<usize, PkgchainError> {
    if outcome.partial {
        Err(PkgchainError::PropagationPartial {
            acked: outcome.acked,
            total: outcome.total,
        })
    } else {
        Ok(outcome.acked)
    }
}
