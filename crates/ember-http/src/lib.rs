//! # ember-http
//!
//! The request/response/header/chunked-transfer grammar this workspace
//! would speak if it terminated HTTP itself. `ember-server` terminates HTTP
//! through axum/hyper instead, so this crate's role today is the error type
//! `ember-api` maps at its boundary and a grounding point for anything that
//! later needs to parse or emit raw framing (an embedded reverse proxy, a
//! non-axum listener). Hand-written recursive-descent, not generated —
//! grounded on `construct`'s own hand-rolled `ircd/http.cc` grammar, the
//! idiomatic choice here since the surrounding ecosystem's frameworks parse
//! HTTP beneath a layer this workspace doesn't control.

pub mod chunked;
pub mod error;
pub mod headers;
pub mod request;
pub mod response;
pub mod version;

pub use error::{HttpError, HttpResult};
pub use headers::{determine_framing, BodyFraming, HeaderMap};
pub use request::{parse_request, Request, RequestLine};
pub use response::{parse_response, write_response_head, Response, StatusLine};
pub use version::Version;
