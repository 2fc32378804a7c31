//! RPC client for a service façade instance, plus client-side verification
//! helpers for proofs and timestamp cosignatures. Mirrors the
//! `reqwest::Client` request/response pattern
//! `via_verifier_coordinator::verifier`'s `ViaWithdrawalVerifier` uses
//! against its coordinator (`client.post(url).json(&body).send().await?`,
//! `anyhow::bail!` on a non-success status).

use anyhow::Context as _;
use pkgchain_types::{Hash, Release, Request, Response, Roster, SkipBlock, TimestampBundle};

pub mod verify;

/// Talks to one service façade's `POST /rpc` endpoint.
pub struct PkgchainClient {
    base_url: String,
    http: reqwest::Client,
}

impl PkgchainClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            http: reqwest::Client::new(),
        }
    }

    async fn call(&self, request: Request) -> anyhow::Result<Response> {
        let url = format!("{}/rpc", self.base_url);
        let resp = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("sending request to {url}"))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("facade returned {status} from {url}: {body}");
        }

        resp.json::<Response>()
            .await
            .context("decoding facade response")
    }

    pub async fn create_repository(
        &self,
        roster: Roster,
        release: Release,
        base: u32,
        height: u32,
    ) -> anyhow::Result<pkgchain_types::RepositoryChain> {
        match self
            .call(Request::CreateRepository {
                roster,
                release,
                base,
                height,
            })
            .await?
        {
            Response::CreateRepositoryRet { repository_chain } => Ok(repository_chain),
            other => Err(unexpected_response("CreateRepositoryRet", other)),
        }
    }

    pub async fn update_repository(
        &self,
        release: Release,
    ) -> anyhow::Result<pkgchain_types::RepositoryChain> {
        match self.call(Request::UpdateRepository { release }).await? {
            Response::UpdateRepositoryRet { repository_chain } => Ok(repository_chain),
            other => Err(unexpected_response("UpdateRepositoryRet", other)),
        }
    }

    pub async fn latest_block(
        &self,
        last_known_hash: Hash,
    ) -> anyhow::Result<(TimestampBundle, Vec<SkipBlock>)> {
        match self
            .call(Request::LatestBlock { last_known_hash })
            .await?
        {
            Response::LatestBlockRet { timestamp, update } => Ok((timestamp, update)),
            other => Err(unexpected_response("LatestBlockRet", other)),
        }
    }

    pub async fn latest_blocks(
        &self,
        last_known_hashes: Vec<Hash>,
    ) -> anyhow::Result<(TimestampBundle, Vec<Vec<SkipBlock>>)> {
        match self
            .call(Request::LatestBlocks { last_known_hashes })
            .await?
        {
            Response::LatestBlocksRetInternal {
                timestamp,
                updates,
                lengths,
            } => Ok((timestamp, Response::split_latest_blocks(updates, &lengths))),
            other => Err(unexpected_response("LatestBlocksRetInternal", other)),
        }
    }

    pub async fn latest_block_repo(
        &self,
        name: impl Into<String>,
    ) -> anyhow::Result<(TimestampBundle, Vec<SkipBlock>)> {
        match self
            .call(Request::LatestBlockRepo { name: name.into() })
            .await?
        {
            Response::LatestBlockRet { timestamp, update } => Ok((timestamp, update)),
            other => Err(unexpected_response("LatestBlockRet", other)),
        }
    }

    pub async fn repository_sc(
        &self,
        name: impl Into<String>,
    ) -> anyhow::Result<(SkipBlock, SkipBlock)> {
        match self
            .call(Request::RepositorySC { name: name.into() })
            .await?
        {
            Response::RepositorySCRet { first, last } => Ok((first, last)),
            other => Err(unexpected_response("RepositorySCRet", other)),
        }
    }
}

fn unexpected_response(expected: &str, got: Response) -> anyhow::Error {
    anyhow::anyhow!("expected {expected}, facade returned {got:?}")
}

pub use verify::{verify_inclusion, verify_timestamp};
