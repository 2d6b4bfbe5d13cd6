//! Errors raised while parsing, hashing, signing, or redacting an event.

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("event exceeds the {limit}-byte size limit ({actual} bytes)")]
    TooLarge { limit: usize, actual: usize },

    #[error("malformed event: {0}")]
    Malformed(String),

    #[error("content hash mismatch: expected {expected}, computed {computed}")]
    HashMismatch { expected: String, computed: String },

    #[error("no sha256 entry in hashes")]
    MissingContentHash,

    #[error("signature verification failed: {0}")]
    BadSignature(String),

    #[error("canonical JSON error: {0}")]
    CanonicalJson(#[from] ruma_common::CanonicalJsonError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("identifier error: {0}")]
    Identifier(String),
}

pub type ModelResult<T> = Result<T, ModelError>;
