//! Centralized error taxonomy used across every `ember` crate.
//!
//! Uses `thiserror` for ergonomic error definitions and provides an
//! `IntoResponse` impl that renders the standard Matrix `{errcode, error}`
//! JSON body at the HTTP boundary.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Top-level error aggregator for the HTTP boundary. Subsystem crates
/// (ember-model, ember-vm, ember-federation, ember-store, ember-http) define
/// their own error enums and convert into this one where they cross into
/// ember-api.
#[derive(Debug, thiserror::Error)]
pub enum EmberError {
    /// Malformed event, request, or wire data — caller's fault, not retryable.
    #[error("malformed: {0}")]
    Malformed(String),

    /// Signature, hash, or content-hash verification failed.
    #[error("cryptographic verification failed: {0}")]
    Cryptographic(String),

    /// Authorization check against room state/auth_events failed.
    #[error("not authorized: {0}")]
    Unauthorized(String),

    /// Requested resource does not exist locally and could not be fetched.
    #[error("{resource} not found")]
    NotFound { resource: String },

    /// Remote server unreachable, timed out, or returned a transient error.
    /// Distinguished from `Fatal` because callers should retry with backoff.
    #[error("transient remote failure: {0}")]
    TransientRemote(String),

    /// Local resource exhausted: queue full, depth budget spent, rate limited.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Store (RocksDB) I/O failure.
    #[error("store error: {0}")]
    Store(#[from] rocksdb::Error),

    /// Anything else — programmer error or an invariant violation.
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// JSON error response body, shaped like the Matrix `M_*` errcode convention.
#[derive(Serialize)]
struct ErrorResponse {
    errcode: String,
    error: String,
}

impl EmberError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Malformed(_) => StatusCode::BAD_REQUEST,
            Self::Cryptographic(_) => StatusCode::FORBIDDEN,
            Self::Unauthorized(_) => StatusCode::FORBIDDEN,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::TransientRemote(_) => StatusCode::BAD_GATEWAY,
            Self::ResourceExhausted(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::Store(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Matrix-style errcode for programmatic handling by clients/servers.
    pub fn errcode(&self) -> &str {
        match self {
            Self::Malformed(_) => "M_BAD_JSON",
            Self::Cryptographic(_) => "M_UNAUTHORIZED",
            Self::Unauthorized(_) => "M_FORBIDDEN",
            Self::NotFound { .. } => "M_NOT_FOUND",
            Self::TransientRemote(_) => "M_UNKNOWN",
            Self::ResourceExhausted(_) => "M_LIMIT_EXCEEDED",
            Self::Store(_) | Self::Internal(_) => "M_UNKNOWN",
        }
    }
}

impl IntoResponse for EmberError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = match &self {
            Self::Store(e) => {
                tracing::error!("store error: {e}");
                "an internal error occurred".to_string()
            }
            Self::Internal(e) => {
                tracing::error!("internal error: {e}");
                "an internal error occurred".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorResponse {
            errcode: self.errcode().to_string(),
            error: message,
        };

        (status, axum::Json(body)).into_response()
    }
}

/// Convenience type alias for Results using EmberError.
pub type EmberResult<T> = Result<T, EmberError>;
