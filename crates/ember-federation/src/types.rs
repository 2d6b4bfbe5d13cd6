//! Wire types for server-to-server federation: transactions, well-known
//! delegation, and the handful of endpoint responses worth a concrete shape
//! rather than a bare `serde_json::Value`.

use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{FederationError, FederationResult};

/// `GET /.well-known/matrix/server` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WellKnownServer {
    #[serde(rename = "m.server")]
    pub server: String,
}

/// `GET /_matrix/federation/v1/version` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerVersion {
    pub server: ServerVersionInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerVersionInfo {
    pub name: String,
    pub version: String,
}

/// A transaction batches PDUs and EDUs bound for one destination. Bodies are
/// left as `serde_json::Value` — the sender already has validated, signed
/// `ember_model::Event` JSON on hand, and the receiver hands raw PDU JSON
/// straight into the event pipeline without this crate re-parsing it.
pub const MAX_PDUS_PER_TRANSACTION: usize = 50;
pub const MAX_EDUS_PER_TRANSACTION: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub origin: String,
    pub origin_server_ts: i64,
    #[serde(default)]
    pub pdus: Vec<serde_json::Value>,
    #[serde(default)]
    pub edus: Vec<serde_json::Value>,
}

impl Transaction {
    pub fn new(origin: impl Into<String>, origin_server_ts: i64) -> Self {
        Self { origin: origin.into(), origin_server_ts, pdus: Vec::new(), edus: Vec::new() }
    }

    /// Enforce the ≤50 PDU / ≤100 EDU transaction limits.
    pub fn validate(&self) -> FederationResult<()> {
        if self.pdus.len() > MAX_PDUS_PER_TRANSACTION {
            return Err(FederationError::TransactionTooLarge(format!(
                "{} pdus exceeds limit of {MAX_PDUS_PER_TRANSACTION}",
                self.pdus.len()
            )));
        }
        if self.edus.len() > MAX_EDUS_PER_TRANSACTION {
            return Err(FederationError::TransactionTooLarge(format!(
                "{} edus exceeds limit of {MAX_EDUS_PER_TRANSACTION}",
                self.edus.len()
            )));
        }
        Ok(())
    }

    /// Derive a transaction id from the truncated SHA-256 of the transaction's
    /// canonical JSON body, base64-encoded.
    pub fn derive_txn_id(&self) -> FederationResult<String> {
        let value = serde_json::to_value(self)?;
        let map = value
            .as_object()
            .cloned()
            .ok_or_else(|| FederationError::Other(anyhow::anyhow!("transaction did not serialize to an object")))?;
        let object = ruma_common::canonical_json::try_from_json_map(map)?;
        let canonical = ruma_common::CanonicalJsonValue::Object(object).to_string();

        let digest = Sha256::digest(canonical.as_bytes());
        Ok(STANDARD_NO_PAD.encode(&digest[..16]))
    }
}

/// `GET /_matrix/federation/v1/make_join/{room}/{user}` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MakeJoinResponse {
    pub room_version: String,
    pub event: serde_json::Value,
}

/// `PUT /_matrix/federation/v2/send_join/{room}/{event}` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendJoinResponse {
    pub state: Vec<serde_json::Value>,
    pub auth_chain: Vec<serde_json::Value>,
    #[serde(default)]
    pub members_omitted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oversized_transaction_is_rejected() {
        let mut txn = Transaction::new("origin.example", 0);
        txn.pdus = vec![serde_json::json!({}); MAX_PDUS_PER_TRANSACTION + 1];
        assert!(txn.validate().is_err());
    }

    #[test]
    fn txn_id_is_deterministic() {
        let txn = Transaction::new("origin.example", 1234);
        assert_eq!(txn.derive_txn_id().unwrap(), txn.derive_txn_id().unwrap());
    }
}
