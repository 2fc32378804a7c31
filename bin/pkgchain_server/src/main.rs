//! Server binary: loads config (YAML file or environment, selected the same
//! way `verifier_server/src/main.rs` branches on `--config-path`), wires a
//! `LocalCosignDriver` over the operator's configured signer keys, and serves
//! the facade's HTTP API.

use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;
use pkgchain_cosign::LocalCosignDriver;
use pkgchain_propagation::PropagationTransport;
use pkgchain_service::api::AppState;
use pkgchain_service::ServiceState;
use secp256k1::SecretKey;

#[derive(Debug, Parser)]
#[command(author, version, about = "pkgchain service facade", long_about = None)]
struct Cli {
    /// Path to a YAML config file. If set, used instead of environment variables.
    #[arg(long)]
    config_path: Option<std::path::PathBuf>,
}

/// Comma-separated hex-encoded secp256k1 secret keys, one per roster signer
/// this process holds (the common single-operator deployment `LocalCosignDriver`
/// documents). Read directly from the environment rather than through
/// `pkgchain_config`, since key material is a secret, not ordinary config.
fn load_signer_keys() -> anyhow::Result<Vec<SecretKey>> {
    let raw = std::env::var("PKGCHAIN_SIGNER_KEYS_HEX")
        .context("PKGCHAIN_SIGNER_KEYS_HEX must list this operator's signer keys (comma-separated hex)")?;
    raw.split(',')
        .map(|s| {
            let bytes = hex::decode(s.trim()).context("signer key is not valid hex")?;
            SecretKey::from_slice(&bytes).context("signer key is not a valid secp256k1 scalar")
        })
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let cli = Cli::parse();
    let config = match cli.config_path {
        Some(path) => pkgchain_config::PkgchainConfig::from_yaml(&path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => pkgchain_config::PkgchainConfig::from_env().context("loading config from environment")?,
    };

    let signer_keys = load_signer_keys()?;
    let driver = Arc::new(LocalCosignDriver::new(signer_keys));
    let transport: Arc<dyn PropagationTransport> = Arc::new(pkgchain_service::propagation_http::LoopbackTransport);

    let service = Arc::new(ServiceState::new(
        driver,
        transport,
        config.propagation.deadline(),
    ));

    let timestamp_interval = config.timestamp.ts_interval();
    let background_service = service.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(timestamp_interval);
        loop {
            ticker.tick().await;
            if let Err(err) = background_service.run_timestamp_cycle().await {
                if !err.is_recoverable() {
                    tracing::warn!("background timestamp cycle failed: {err}");
                }
            }
        }
    });

    let app_state = Arc::new(AppState {
        service,
        cosign_sessions: None,
    });
    let router = pkgchain_service::into_router(app_state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.server.bind_addr))?;
    tracing::info!("pkgchain facade listening on {}", config.server.bind_addr);
    axum::serve(listener, router)
        .await
        .context("pkgchain facade server failed")?;

    Ok(())
}
