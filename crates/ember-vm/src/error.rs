//! The VM's closed failure-kind enumeration. Each variant corresponds to a
//! phase failure code from `SPEC_FULL.md` §4.3; permanent failures (hash,
//! signature, auth) are final, transient ones (`FetchFailed`) are requeued
//! by the caller with backoff (see `retry.rs`).

#[derive(Debug, thiserror::Error)]
pub enum VmError {
    /// Phase 1: parse/shape failure.
    #[error("invalid event: {0}")]
    Invalid(String),

    /// Phase 2: content hash mismatch.
    #[error("bad hash: {0}")]
    BadHash(String),

    /// Phase 3: no signature in `signatures` verifies under the origin's
    /// current key set.
    #[error("bad signature: {0}")]
    BadSignature(String),

    /// Phase 4: already indexed. Not an error the caller should log or
    /// retry — callers match on this variant to short-circuit.
    #[error("event already exists")]
    Exists,

    /// Phase 5: an ancestor (`prev_events`/`auth_events`) could not be
    /// acquired within the configured depth budget. Transient; the pipeline
    /// requeues the event once prerequisites resolve or retry is exhausted.
    #[error("ancestor fetch failed: {0}")]
    FetchFailed(String),

    /// Phase 6: fails auth replayed against `auth_events` alone. Final.
    #[error("auth failed against auth_events: {0}")]
    Auth(String),

    /// Local resource exhaustion (queue full, lock timeout) — the caller
    /// may retry.
    #[error("overloaded: {0}")]
    Overloaded(String),

    #[error("store error: {0}")]
    Store(#[from] ember_store::StoreError),

    #[error("head tracker error: {0}")]
    Head(#[from] ember_head::HeadError),

    #[error("federation error: {0}")]
    Federation(#[from] ember_federation::FederationError),

    #[error("model error: {0}")]
    Model(#[from] ember_model::ModelError),

    #[error("state resolution error: {0}")]
    StateRes(String),

    #[error("canonical JSON error: {0}")]
    CanonicalJson(#[from] ruma_common::CanonicalJsonError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("identifier error: {0}")]
    Identifier(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type VmResult<T> = Result<T, VmError>;

impl VmError {
    /// Transient failures are requeued with backoff; everything else is
    /// final (logged and discarded per `SPEC_FULL.md` §7).
    pub fn is_transient(&self) -> bool {
        matches!(self, VmError::FetchFailed(_) | VmError::Overloaded(_) | VmError::Federation(_))
    }
}
