//! Facade-level error type, grounded in
//! `withdrawal_service::coordinator::error::ApiError`'s status-code mapping
//! and `{error, message}` JSON body — wrapping [`PkgchainError`] instead of
//! duplicating its variants, since the orphan rule blocks implementing the
//! foreign `axum::response::IntoResponse` directly on the foreign
//! `PkgchainError`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use pkgchain_types::PkgchainError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
#[error(transparent)]
pub struct ApiError(pub PkgchainError);

impl From<PkgchainError> for ApiError {
    fn from(err: PkgchainError) -> Self {
        ApiError(err)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError(PkgchainError::MalformedRequest(err.to_string()))
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            PkgchainError::MalformedRequest(_) => StatusCode::BAD_REQUEST,
            PkgchainError::UnknownRepository(_) => StatusCode::NOT_FOUND,
            PkgchainError::NotOnChain(_) => StatusCode::CONFLICT,
            PkgchainError::VerifierRejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
            PkgchainError::PropagationPartial { .. } => StatusCode::OK,
            PkgchainError::CosignFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            PkgchainError::NoTimestamp => StatusCode::SERVICE_UNAVAILABLE,
        };
        let body = ErrorResponse {
            error: "pkgchain facade error".to_string(),
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
