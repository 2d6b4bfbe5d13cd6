//! Federation-specific error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FederationError {
    // ── Key management ──────────────────────────────────────────────────────
    #[error("failed to load signing key from storage: {0}")]
    KeyLoad(String),

    #[error("store error: {0}")]
    Store(#[from] ember_store::StoreError),

    // ── Signature verification ───────────────────────────────────────────────
    #[error("missing Authorization header on federated request")]
    MissingAuthHeader,

    #[error("malformed X-Matrix Authorization header: {0}")]
    MalformedAuthHeader(String),

    #[error("signature verification failed")]
    InvalidSignature,

    // ── Discovery ─────────────────────────────────────────────────────────────
    #[error("failed to resolve server '{0}': {1}")]
    DiscoveryFailed(String, String),

    #[error("server '{0}' returned a malformed .well-known/matrix/server response")]
    BadWellKnown(String),

    // ── Connection pool / circuit breaker ────────────────────────────────────
    #[error("destination '{0}' is marked errant until {1} (unix ms)")]
    Errant(String, i64),

    // ── Remote communication ─────────────────────────────────────────────────
    #[error("HTTP error communicating with remote server '{0}': {1}")]
    RemoteHttp(String, String),

    #[error("remote server '{0}' returned an unexpected response: {1}")]
    RemoteProtocol(String, String),

    #[error("transaction exceeds limits: {0}")]
    TransactionTooLarge(String),

    // ── General ──────────────────────────────────────────────────────────────
    #[error("serialisation error: {0}")]
    Serialisation(#[from] serde_json::Error),

    #[error("url parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("canonical json error: {0}")]
    CanonicalJson(#[from] ruma_common::CanonicalJsonError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<reqwest::Error> for FederationError {
    fn from(e: reqwest::Error) -> Self {
        let server = e.url().map(|u| u.host_str().unwrap_or("?").to_owned()).unwrap_or_default();
        FederationError::RemoteHttp(server, e.to_string())
    }
}

pub type FederationResult<T> = Result<T, FederationError>;
