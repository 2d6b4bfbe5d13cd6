//! Request signing and verification for the `X-Matrix` Authorization scheme.
//!
//! Every server-to-server HTTP request carries:
//!
//! ```text
//! Authorization: X-Matrix origin=example.org,key="ed25519:a_1",sig="<base64url-sig>"
//! ```
//!
//! The signed object is the canonical JSON of
//! `{method, uri, origin, destination, content?}` — built and signed the
//! same way `ember-model::sign` signs events, via `ruma_signatures`, so a
//! request's signature and an event's signature share one code path.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::{FederationError, FederationResult};
use crate::keys::{verify_detached, ServerSigningKey};

/// A signed federation request, ready to render into an `Authorization`
/// header value.
#[derive(Debug, Clone)]
pub struct XMatrixAuth {
    pub origin: String,
    pub key_id: String,
    pub sig: String,
}

impl XMatrixAuth {
    pub fn to_header(&self) -> String {
        format!(r#"X-Matrix origin={},key="{}",sig="{}""#, self.origin, self.key_id, self.sig)
    }
}

/// Sign an outbound request.
///
/// * `key`         — this server's signing key
/// * `origin`      — this server's name
/// * `destination` — remote server's name
/// * `method`      — HTTP method, uppercase
/// * `uri`         — request path + query
/// * `content`     — request body (`None` for requests with no body)
pub fn sign_request(
    key: &ServerSigningKey,
    origin: &str,
    destination: &str,
    method: &str,
    uri: &str,
    content: Option<&Value>,
) -> FederationResult<XMatrixAuth> {
    let mut object = build_signing_object(origin, destination, method, uri, content)?;
    ruma_signatures::sign_json(origin, key.pair(), &mut object)
        .map_err(|e| FederationError::Other(anyhow::anyhow!("failed to sign federation request: {e}")))?;

    let signed = serde_json::to_value(&object)?;
    let sig = signed
        .get("signatures")
        .and_then(|v| v.get(origin))
        .and_then(|v| v.get(key.key_id()))
        .and_then(|v| v.as_str())
        .ok_or_else(|| FederationError::Other(anyhow::anyhow!("sign_json did not populate a signature")))?
        .to_owned();

    Ok(XMatrixAuth { origin: origin.to_owned(), key_id: key.key_id(), sig })
}

/// Verify an inbound request's `Authorization` header.
///
/// * `authorization` — raw header value
/// * `destination`   — this server's name, must match what was signed
/// * `method`, `uri`, `content` — as received
/// * `origin_pubkey_base64` — the origin's public key for `key_id`, fetched
///   via `/_matrix/key/v2/server` (or `key/v2/query`) and cached by the caller
///
/// Returns the verified origin server name on success.
pub fn verify_request(
    authorization: &str,
    destination: &str,
    method: &str,
    uri: &str,
    content: Option<&Value>,
    origin_pubkey_base64: &str,
) -> FederationResult<String> {
    let parsed = parse_auth_header(authorization)?;
    let object = build_signing_object(&parsed.origin, destination, method, uri, content)?;
    let canonical = ruma_common::CanonicalJsonValue::Object(object).to_string();
    verify_detached(origin_pubkey_base64, &parsed.sig, canonical.as_bytes())?;
    Ok(parsed.origin)
}

fn build_signing_object(
    origin: &str,
    destination: &str,
    method: &str,
    uri: &str,
    content: Option<&Value>,
) -> FederationResult<ruma_common::CanonicalJsonObject> {
    let mut map = serde_json::Map::new();
    map.insert("method".into(), Value::String(method.to_uppercase()));
    map.insert("uri".into(), Value::String(uri.to_owned()));
    map.insert("origin".into(), Value::String(origin.to_owned()));
    map.insert("destination".into(), Value::String(destination.to_owned()));
    if let Some(body) = content {
        map.insert("content".into(), body.clone());
    }
    Ok(ruma_common::canonical_json::try_from_json_map(map)?)
}

struct ParsedAuth {
    origin: String,
    #[allow(dead_code)]
    key_id: String,
    sig: String,
}

/// Read just the `origin` field out of an `X-Matrix` header, without
/// verifying anything. Callers serving inbound requests need this first —
/// the verify key to check the signature against is keyed by the origin
/// the header itself claims.
pub fn peek_origin(header: &str) -> FederationResult<String> {
    Ok(parse_auth_header(header)?.origin)
}

/// Parse the `X-Matrix origin=...,key="...",sig="..."` header.
fn parse_auth_header(header: &str) -> FederationResult<ParsedAuth> {
    let header = header
        .strip_prefix("X-Matrix ")
        .ok_or_else(|| FederationError::MalformedAuthHeader("must start with 'X-Matrix '".into()))?;

    let mut fields: BTreeMap<&str, String> = BTreeMap::new();
    for part in header.split(',') {
        let part = part.trim();
        let Some((key, value)) = part.split_once('=') else { continue };
        let value = value.trim().trim_matches('"').to_owned();
        fields.insert(key.trim(), value);
    }

    Ok(ParsedAuth {
        origin: fields.remove("origin").ok_or_else(|| FederationError::MalformedAuthHeader("missing 'origin'".into()))?,
        key_id: fields.remove("key").ok_or_else(|| FederationError::MalformedAuthHeader("missing 'key'".into()))?,
        sig: fields.remove("sig").ok_or_else(|| FederationError::MalformedAuthHeader("missing 'sig'".into()))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::ServerSigningKey;

    #[test]
    fn sign_then_verify_round_trips() {
        let (key, _der) = ServerSigningKey::generate("a_1").unwrap();
        let body = serde_json::json!({"pdus": [], "edus": []});

        let auth = sign_request(&key, "origin.example", "dest.example", "PUT", "/_matrix/federation/v1/send/1", Some(&body)).unwrap();
        let header = auth.to_header();
        assert!(header.starts_with("X-Matrix origin=origin.example"));

        let origin = verify_request(&header, "dest.example", "PUT", "/_matrix/federation/v1/send/1", Some(&body), &key.public_key_base64()).unwrap();
        assert_eq!(origin, "origin.example");
    }

    #[test]
    fn tampered_body_fails_verification() {
        let (key, _der) = ServerSigningKey::generate("a_1").unwrap();
        let body = serde_json::json!({"pdus": []});
        let auth = sign_request(&key, "origin.example", "dest.example", "PUT", "/_matrix/federation/v1/send/1", Some(&body)).unwrap();
        let header = auth.to_header();

        let tampered = serde_json::json!({"pdus": ["evil"]});
        let result = verify_request(&header, "dest.example", "PUT", "/_matrix/federation/v1/send/1", Some(&tampered), &key.public_key_base64());
        assert!(result.is_err());
    }
}
