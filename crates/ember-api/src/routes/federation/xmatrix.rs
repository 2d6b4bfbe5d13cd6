//! Verifying the `Authorization: X-Matrix ...` header every inbound
//! federation request (other than the key document and well-known lookup)
//! must carry, mirroring how `ember_vm::sig_check` verifies event
//! signatures: fetch the claimed origin's current verify keys, then check.

use axum::http::{HeaderMap, Method};
use ember_common::error::EmberError;
use serde_json::Value;

use crate::error::federation_err;
use crate::AppState;

/// Verify an inbound request's signature, returning the verified origin
/// server name on success.
pub async fn verify_origin(
    state: &AppState,
    method: &Method,
    uri: &str,
    body: Option<&Value>,
    headers: &HeaderMap,
) -> Result<String, EmberError> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| EmberError::Unauthorized("missing Authorization header".into()))?;

    let claimed_origin = ember_federation::auth::peek_origin(header).map_err(federation_err)?;

    let key_doc = state
        .federation
        .fetch_server_keys(&claimed_origin, None)
        .await
        .map_err(federation_err)?;

    // The header names exactly one key id; try each of the origin's
    // published verify keys until one matches (there is normally only one).
    let mut last_err = EmberError::Unauthorized("no verify key matched the request signature".into());
    for verify_key in key_doc.verify_keys.values() {
        match ember_federation::auth::verify_request(
            header,
            state.server_name(),
            method.as_str(),
            uri,
            body,
            &verify_key.key,
        ) {
            Ok(origin) => return Ok(origin),
            Err(e) => last_err = federation_err(e),
        }
    }
    Err(last_err)
}
