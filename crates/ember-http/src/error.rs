//! The grammar's error shape: a rule name plus a bounded snippet of the
//! input that failed to match it, mirroring `construct`'s
//! `expectation_failure` (`ircd::http::throw_error`), which carries the
//! failing Spirit rule's name and the unconsumed input at the point of
//! failure.

/// Context is truncated to this many bytes so a malformed multi-megabyte
/// body never gets echoed whole into an error message or log line.
pub const MAX_CONTEXT_BYTES: usize = 512;

#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    /// Inbound grammar failure: this peer sent something we can't parse.
    #[error("bad request: expected {rule} near {context:?}")]
    BadRequest { rule: &'static str, context: String },

    /// Outbound response grammar failure: a peer we're calling sent back
    /// something their own stack should never have produced.
    #[error("internal server error: expected {rule} near {context:?}")]
    InternalServerError { rule: &'static str, context: String },

    #[error("HTTP version not supported: {0}")]
    VersionNotSupported(String),
}

/// Build the bounded context snippet `HttpError`'s variants carry.
pub(crate) fn context_snippet(input: &[u8]) -> String {
    let take = input.len().min(MAX_CONTEXT_BYTES);
    String::from_utf8_lossy(&input[..take]).into_owned()
}

pub(crate) fn bad_request(rule: &'static str, input: &[u8]) -> HttpError {
    HttpError::BadRequest { rule, context: context_snippet(input) }
}

pub(crate) fn internal(rule: &'static str, input: &[u8]) -> HttpError {
    HttpError::InternalServerError { rule, context: context_snippet(input) }
}

pub type HttpResult<T> = Result<T, HttpError>;
