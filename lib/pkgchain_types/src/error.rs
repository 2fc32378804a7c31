use thiserror::Error;

/// Core error kinds surfaced by the skipchain store, service façade and
/// cosigning/propagation drivers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PkgchainError {
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    #[error("unknown repository: {0}")]
    UnknownRepository(String),

    #[error("block not on requested chain: {0}")]
    NotOnChain(String),

    #[error("verifier rejected payload: {0}")]
    VerifierRejected(String),

    #[error("propagation partial: {acked}/{total} nodes acknowledged")]
    PropagationPartial { acked: usize, total: usize },

    #[error("cosign failed: {0}")]
    CosignFailed(String),

    #[error("no timestamp bundle has been produced yet")]
    NoTimestamp,
}

impl PkgchainError {
    /// Whether a client may transparently recover without surfacing an error
    /// (spec: `NoTimestamp` and `PropagationPartial` are locally recoverable).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PkgchainError::NoTimestamp | PkgchainError::PropagationPartial { .. }
        )
    }
}
