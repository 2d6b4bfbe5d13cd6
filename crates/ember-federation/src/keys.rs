//! This server's Ed25519 signing key, and the server key document served at
//! `/_matrix/key/v2/server`.
//!
//! Signing itself is delegated to `ruma_signatures::Ed25519KeyPair` — the
//! same key type `ember-model::sign` uses to sign and verify events, so a
//! single key works for both event signatures and request signatures, as
//! Matrix requires.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use ruma_signatures::{Ed25519KeyPair, KeyPair};
use serde::{Deserialize, Serialize};

use crate::error::{FederationError, FederationResult};

/// How long a published key document remains valid before it should be
/// re-fetched by remote servers.
const KEY_VALID_FOR_SECS: i64 = 7 * 24 * 60 * 60;

/// This server's current signing key pair.
pub struct ServerSigningKey {
    pair: Ed25519KeyPair,
}

impl ServerSigningKey {
    /// Generate a fresh key pair with the given key `version` (the part
    /// after `ed25519:` in the key ID, e.g. `"a_1"`). Returns the key
    /// alongside its PKCS#8 DER encoding, which the caller persists.
    pub fn generate(version: impl Into<String>) -> FederationResult<(Self, Vec<u8>)> {
        let version = version.into();
        let der = Ed25519KeyPair::generate()
            .map_err(|e| FederationError::KeyLoad(format!("key generation failed: {e}")))?;
        let pair = Ed25519KeyPair::from_der(&der, version)
            .map_err(|e| FederationError::KeyLoad(format!("key reconstruction failed: {e}")))?;
        Ok((Self { pair }, der))
    }

    /// Reconstruct a key pair from its PKCS#8 DER encoding and key version,
    /// as persisted by [`ServerSigningKey::generate`].
    pub fn from_der(der: &[u8], version: impl Into<String>) -> FederationResult<Self> {
        let pair = Ed25519KeyPair::from_der(der, version.into())
            .map_err(|e| FederationError::KeyLoad(format!("key reconstruction failed: {e}")))?;
        Ok(Self { pair })
    }

    /// Key ID in the Matrix `ed25519:<version>` form.
    pub fn key_id(&self) -> String {
        format!("ed25519:{}", self.pair.version())
    }

    /// Base64url (unpadded) public key, as published in `verify_keys`.
    pub fn public_key_base64(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.pair.public_key())
    }

    pub fn pair(&self) -> &Ed25519KeyPair {
        &self.pair
    }

    /// Build the signed key document served at `/_matrix/key/v2/server`.
    ///
    /// Shape: `{server_name, valid_until_ts, verify_keys, old_verify_keys,
    /// signatures}`, per spec. The document is self-signed: the
    /// `signatures` field covers the canonical JSON of everything else.
    pub fn to_key_document(
        &self,
        server_name: &str,
        old_verify_keys: BTreeMap<String, OldVerifyKey>,
    ) -> FederationResult<ServerKeyDocument> {
        let mut verify_keys = BTreeMap::new();
        verify_keys.insert(self.key_id(), VerifyKey { key: self.public_key_base64() });

        let valid_until_ts = now_millis() + KEY_VALID_FOR_SECS * 1000;

        let unsigned = ServerKeyDocument {
            server_name: server_name.to_owned(),
            valid_until_ts,
            verify_keys,
            old_verify_keys,
            signatures: BTreeMap::new(),
        };

        let value = serde_json::to_value(&unsigned)?;
        let map = value
            .as_object()
            .cloned()
            .ok_or_else(|| FederationError::Other(anyhow::anyhow!("key document must serialize to an object")))?;
        let mut object = ruma_common::canonical_json::try_from_json_map(map)?;
        ruma_signatures::sign_json(server_name, &self.pair, &mut object)
            .map_err(|e| FederationError::Other(anyhow::anyhow!("failed to self-sign key document: {e}")))?;

        Ok(serde_json::from_value(serde_json::to_value(object)?)?)
    }
}

fn now_millis() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).expect("system clock before epoch").as_millis() as i64
}

// ─── Wire format ─────────────────────────────────────────────────────────────

/// A single public verify key entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyKey {
    /// Base64url-encoded (unpadded) Ed25519 public key bytes.
    pub key: String,
}

/// A retired verify key, kept published so events it signed in the past
/// still verify.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OldVerifyKey {
    pub key: String,
    pub expired_ts: i64,
}

/// The signed key document served at `GET /_matrix/key/v2/server`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerKeyDocument {
    pub server_name: String,
    pub valid_until_ts: i64,
    pub verify_keys: BTreeMap<String, VerifyKey>,
    #[serde(default)]
    pub old_verify_keys: BTreeMap<String, OldVerifyKey>,
    pub signatures: BTreeMap<String, BTreeMap<String, String>>,
}

/// Verify a detached Ed25519 signature against a base64url-encoded public
/// key, as fetched from a remote server's key document. Used for request
/// signatures, which (unlike events) aren't embedded in the object they
/// sign, so `ruma_signatures::verify_json`'s document-shaped API doesn't
/// apply here.
pub fn verify_detached(pubkey_base64: &str, sig_base64: &str, message: &[u8]) -> FederationResult<()> {
    use ed25519_dalek::{Signature, Verifier, VerifyingKey};

    let pubkey_bytes = URL_SAFE_NO_PAD.decode(pubkey_base64).map_err(|_| FederationError::InvalidSignature)?;
    let sig_bytes = URL_SAFE_NO_PAD.decode(sig_base64).map_err(|_| FederationError::InvalidSignature)?;
    let verifying_key = VerifyingKey::from_bytes(
        pubkey_bytes.as_slice().try_into().map_err(|_| FederationError::InvalidSignature)?,
    )
    .map_err(|_| FederationError::InvalidSignature)?;
    let signature =
        Signature::from_bytes(sig_bytes.as_slice().try_into().map_err(|_| FederationError::InvalidSignature)?);
    verifying_key.verify(message, &signature).map_err(|_| FederationError::InvalidSignature)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_and_reload_round_trips() {
        let (kp1, der) = ServerSigningKey::generate("a_1").unwrap();
        let kp2 = ServerSigningKey::from_der(&der, "a_1").unwrap();
        assert_eq!(kp1.key_id(), kp2.key_id());
        assert_eq!(kp1.public_key_base64(), kp2.public_key_base64());
    }

    #[test]
    fn key_document_is_self_signed() {
        let (kp, _der) = ServerSigningKey::generate("a_1").unwrap();
        let doc = kp.to_key_document("example.org", BTreeMap::new()).unwrap();
        assert_eq!(doc.server_name, "example.org");
        assert!(doc.signatures.contains_key("example.org"));
        assert!(doc.verify_keys.contains_key(&kp.key_id()));
    }
}
