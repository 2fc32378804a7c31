//! Config structs for every layer, following
//! `zksync_config::configs::via_verifier::ViaVerifierConfig`'s shape: plain
//! fields in milliseconds/seconds plus a typed `Duration` accessor. Loaded
//! either from a YAML file or per-section from the environment via `envy`,
//! the same split `verifier_server/src/main.rs` makes between
//! `--config-path` and env vars.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context as _;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

pub trait FromEnv: Sized {
    fn from_env() -> anyhow::Result<Self>;
}

/// Loads `T` from environment variables carrying `prefix`, the same helper
/// `zksync_env_config::envy_load` provides.
pub fn envy_load<T: DeserializeOwned>(name: &str, prefix: &str) -> anyhow::Result<T> {
    envy::prefixed(prefix)
        .from_env()
        .with_context(|| format!("cannot load config <{name}>"))
}

/// HTTP bind address for the service façade's `/rpc`, `/propagate` and
/// `/cosign` routes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3030".to_string(),
        }
    }
}

impl FromEnv for ServerConfig {
    fn from_env() -> anyhow::Result<Self> {
        envy_load("server", "PKGCHAIN_SERVER_")
    }
}

/// Tree-broadcast timing (§4.4). `base`/`maxHeight` are per-repository
/// `CreateRepository` request parameters, not server config, so they live
/// on the wire type rather than here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PropagationConfig {
    /// Default deadline handed to the root of the broadcast tree (§4.4,
    /// §9: "default 120 s").
    pub deadline_ms: u64,
}

impl PropagationConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self {
            deadline_ms: 120_000,
        }
    }
}

impl FromEnv for PropagationConfig {
    fn from_env() -> anyhow::Result<Self> {
        envy_load("propagation", "PKGCHAIN_PROPAGATION_")
    }
}

/// Co-signing predicate tuning (§4.5).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CosignConfig {
    /// Maximum accepted gap between a signed timestamp and wall clock
    /// (§9 glossary: "default 1 hour").
    pub reasonable_skew_secs: u64,
}

impl CosignConfig {
    pub fn reasonable_skew(&self) -> Duration {
        Duration::from_secs(self.reasonable_skew_secs)
    }
}

impl Default for CosignConfig {
    fn default() -> Self {
        Self {
            reasonable_skew_secs: 3600,
        }
    }
}

impl FromEnv for CosignConfig {
    fn from_env() -> anyhow::Result<Self> {
        envy_load("cosign", "PKGCHAIN_COSIGN_")
    }
}

/// Periodic timestamp cycle (§4.6: "driven on every Create/Update and on a
/// timer of period TSInterval").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimestampConfig {
    pub ts_interval_ms: u64,
}

impl TimestampConfig {
    pub fn ts_interval(&self) -> Duration {
        Duration::from_millis(self.ts_interval_ms)
    }
}

impl Default for TimestampConfig {
    fn default() -> Self {
        Self {
            ts_interval_ms: 60_000,
        }
    }
}

impl FromEnv for TimestampConfig {
    fn from_env() -> anyhow::Result<Self> {
        envy_load("timestamp", "PKGCHAIN_TIMESTAMP_")
    }
}

/// Where the service façade persists the `{repoName -> RepositoryChain}`
/// map and the current timestamp bundle (§9's "Persisted state layout").
/// `None` means in-memory only, for tests and ad-hoc runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PersistenceConfig {
    pub state_dir: Option<PathBuf>,
}

impl FromEnv for PersistenceConfig {
    fn from_env() -> anyhow::Result<Self> {
        envy_load("persistence", "PKGCHAIN_PERSISTENCE_")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PkgchainConfig {
    pub server: ServerConfig,
    #[serde(default)]
    pub propagation: PropagationConfig,
    #[serde(default)]
    pub cosign: CosignConfig,
    #[serde(default)]
    pub timestamp: TimestampConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

impl PkgchainConfig {
    /// Reads the whole config from a single YAML file, the `--config-path`
    /// branch of `verifier_server/src/main.rs`.
    pub fn from_yaml(path: &std::path::Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    /// Reads each section from its own prefixed environment namespace, the
    /// env-var branch of `verifier_server/src/main.rs`.
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            server: ServerConfig::from_env().context("loading server config")?,
            propagation: PropagationConfig::from_env().context("loading propagation config")?,
            cosign: CosignConfig::from_env().context("loading cosign config")?,
            timestamp: TimestampConfig::from_env().context("loading timestamp config")?,
            persistence: PersistenceConfig::from_env().context("loading persistence config")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_accessors_match_spec_defaults() {
        let cfg = PkgchainConfig::default();
        assert_eq!(cfg.propagation.deadline(), Duration::from_secs(120));
        assert_eq!(cfg.cosign.reasonable_skew(), Duration::from_secs(3600));
    }

    #[test]
    fn yaml_round_trip() {
        let cfg = PkgchainConfig {
            server: ServerConfig {
                bind_addr: "0.0.0.0:9000".to_string(),
            },
            ..Default::default()
        };
        let yaml = serde_yaml::to_string(&cfg).unwrap();
        let parsed: PkgchainConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, cfg);
    }
}
