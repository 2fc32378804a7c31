//! axum router: `/rpc` dispatches the tagged `Request`/`Response` wire
//! pair against [`ServiceState`]; `/propagate` and `/cosign/round1`,
//! `/cosign/round2` are the inbound legs of the network-distributed
//! propagation and cosigning transports. Grounded in
//! `via_verifier_coordinator::coordinator::api_decl::RestApi::into_router`'s
//! `Arc`-state + `ServiceBuilder` layering, with handlers in the
//! `State(Arc<Self>)` / `#[instrument(skip(self_))]` shape
//! `coordinator::api_impl` uses.

use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, routing::post, Json, Router};
use musig2::BinaryEncoding;
use pkgchain_types::{Request, Response};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer};
use tracing::instrument;

use crate::cosign_remote::{CosignSessions, Round1Request, Round1Response, Round2Request, Round2Response};
use crate::error::ApiError;
use crate::propagation_http::{PropagateRequest, PropagateResponse};
use crate::state::ServiceState;

const API_TIMEOUT: Duration = Duration::from_secs(30);

/// Application state shared across every route: the façade plus the
/// optional peer-side cosign session table (present only when this node
/// runs [`crate::cosign_remote::RemoteCosignDriver`] rather than
/// `LocalCosignDriver`).
pub struct AppState {
    pub service: Arc<ServiceState>,
    pub cosign_sessions: Option<Arc<CosignSessions>>,
}

pub fn into_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/rpc", post(rpc))
        .route("/propagate", post(propagate_inbound))
        .route("/cosign/round1", post(cosign_round1))
        .route("/cosign/round2", post(cosign_round2))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TimeoutLayer::new(API_TIMEOUT))
                .layer(CorsLayer::permissive()),
        )
}

#[instrument(skip(state))]
async fn rpc(
    State(state): State<Arc<AppState>>,
    Json(request): Json<Request>,
) -> Result<Json<Response>, ApiError> {
    let service = &state.service;
    let response = match request {
        Request::CreateRepository {
            roster,
            release,
            base,
            height,
        } => {
            let repository_chain = service.create_repository(roster, release, base, height).await?;
            Response::CreateRepositoryRet { repository_chain }
        }
        Request::UpdateRepository { release } => {
            let repository_chain = service.update_repository(release).await?;
            Response::UpdateRepositoryRet { repository_chain }
        }
        Request::LatestBlock { last_known_hash } => {
            let (timestamp, update) = service.latest_block(last_known_hash).await?;
            Response::LatestBlockRet { timestamp, update }
        }
        Request::LatestBlocks { last_known_hashes } => {
            let (timestamp, updates) = service.latest_blocks(last_known_hashes).await?;
            let lengths = updates.iter().map(Vec::len).collect();
            let updates = updates.into_iter().flatten().collect();
            Response::LatestBlocksRetInternal {
                timestamp,
                updates,
                lengths,
            }
        }
        Request::LatestBlockRepo { name } => {
            let (timestamp, update) = service.latest_block_repo(&name).await?;
            Response::LatestBlockRet { timestamp, update }
        }
        Request::RepositorySC { name } => {
            let (first, last) = service.repository_sc(&name).await?;
            Response::RepositorySCRet { first, last }
        }
    };
    Ok(Json(response))
}

#[instrument(skip(state))]
async fn propagate_inbound(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PropagateRequest>,
) -> Result<Json<PropagateResponse>, ApiError> {
    state.service.receive_propagated_data(req.payload).await?;
    Ok(Json(PropagateResponse {
        acked: 1,
        total: 1,
        partial: false,
    }))
}

#[instrument(skip(state))]
async fn cosign_round1(
    State(state): State<Arc<AppState>>,
    Json(req): Json<Round1Request>,
) -> Result<Json<Round1Response>, ApiError> {
    let sessions = state
        .cosign_sessions
        .as_ref()
        .ok_or_else(|| ApiError(pkgchain_types::PkgchainError::CosignFailed(
            "this node does not run a remote cosign session table".into(),
        )))?;
    let peer_nonce = hex::decode(&req.nonce)
        .ok()
        .and_then(|b| musig2::PubNonce::from_bytes(&b).ok())
        .ok_or_else(|| ApiError(pkgchain_types::PkgchainError::CosignFailed("bad nonce encoding".into())))?;
    let our_nonce = sessions.handle_round1(&req.message, req.signer_index, peer_nonce)?;
    Ok(Json(Round1Response {
        nonce: hex::encode(our_nonce.to_bytes()),
    }))
}

#[instrument(skip(state))]
async fn cosign_round2(
    State(state): State<Arc<AppState>>,
    Json(req): Json<Round2Request>,
) -> Result<Json<Round2Response>, ApiError> {
    let sessions = state
        .cosign_sessions
        .as_ref()
        .ok_or_else(|| ApiError(pkgchain_types::PkgchainError::CosignFailed(
            "this node does not run a remote cosign session table".into(),
        )))?;
    let peer_partial = hex::decode(&req.partial)
        .ok()
        .and_then(|b| musig2::PartialSignature::from_slice(&b).ok())
        .ok_or_else(|| ApiError(pkgchain_types::PkgchainError::CosignFailed("bad partial-signature encoding".into())))?;
    let our_partial = sessions.handle_round2(&req.message, req.signer_index, peer_partial)?;
    Ok(Json(Round2Response {
        partial: hex::encode(our_partial.serialize()),
    }))
}
