//! HTTP-backed [`PropagationTransport`]: the genuinely network-distributed
//! counterpart to the in-process transport the façade's own tests use,
//! following the `POST` + JSON-body + status-check pattern
//! `pkgchain_client::PkgchainClient::call` uses against `/rpc`.

use std::time::Duration;

use async_trait::async_trait;
use pkgchain_propagation::{PropagationOutcome, PropagationTransport};
use pkgchain_types::PkgchainError;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize)]
pub(crate) struct PropagateRequest {
    pub(crate) payload: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
pub(crate) struct PropagateResponse {
    pub(crate) acked: usize,
    pub(crate) total: usize,
    pub(crate) partial: bool,
}

/// Sends `DATA` to each roster peer's `/propagate` endpoint. `peer_urls[i]`
/// is peer `i`'s base URL; this node's own position holds an empty string
/// and is never dialed (the tree only ever routes to children).
pub struct HttpPropagationTransport {
    http: reqwest::Client,
    peer_urls: Vec<String>,
}

impl HttpPropagationTransport {
    pub fn new(peer_urls: Vec<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            peer_urls,
        }
    }
}

#[async_trait]
impl PropagationTransport for HttpPropagationTransport {
    async fn send_data(
        &self,
        peer_index: usize,
        payload: Vec<u8>,
        deadline: Duration,
    ) -> Result<PropagationOutcome, PkgchainError> {
        let url = self
            .peer_urls
            .get(peer_index)
            .ok_or_else(|| PkgchainError::MalformedRequest(format!("no address for peer {peer_index}")))?;

        let resp = self
            .http
            .post(format!("{url}/propagate"))
            .timeout(deadline)
            .json(&PropagateRequest { payload })
            .send()
            .await
            .map_err(|e| PkgchainError::CosignFailed(format!("propagate to {url}: {e}")))?;

        if !resp.status().is_success() {
            return Err(PkgchainError::CosignFailed(format!(
                "peer {url} rejected propagated data: {}",
                resp.status()
            )));
        }

        let body: PropagateResponse = resp
            .json()
            .await
            .map_err(|e| PkgchainError::CosignFailed(format!("decoding propagate response: {e}")))?;
        Ok(PropagationOutcome {
            acked: body.acked,
            total: body.total,
            partial: body.partial,
        })
    }
}

/// Default transport for a single operator process that holds the entire
/// roster itself (the fixed, operator-configured roster this system assumes
/// — spec §1 Non-goals). There is no peer to dial: every roster position is
/// this same process, so every send is an immediate ack.
pub struct LoopbackTransport;

#[async_trait]
impl PropagationTransport for LoopbackTransport {
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
