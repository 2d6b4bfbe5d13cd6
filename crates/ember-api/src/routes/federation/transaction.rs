//! `PUT /_matrix/federation/v1/send/{txnId}` — the one endpoint through
//! which almost all inbound room activity arrives. Each PDU in the
//! transaction is handed to [`ember_vm::Pipeline::process`] independently;
//! one bad PDU doesn't fail the whole transaction, matching how real
//! homeservers report per-PDU results.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, Method};
use axum::{routing::put, Json, Router};
use ember_common::error::EmberError;
use ember_vm::Origin;
use serde::Serialize;
use serde_json::Value;

use super::xmatrix::verify_origin;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/_matrix/federation/v1/send/{txn_id}", put(send_transaction))
}

#[derive(Serialize)]
struct TransactionResult {
    pdus: HashMap<String, PduResult>,
}

#[derive(Serialize)]
struct PduResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

async fn send_transaction(
    State(state): State<Arc<AppState>>,
    Path(txn_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<TransactionResult>, EmberError> {
    let uri = format!("/_matrix/federation/v1/send/{txn_id}");
    let origin = verify_origin(&state, &Method::PUT, &uri, Some(&body), &headers).await?;

    let pdus = body.get("pdus").and_then(Value::as_array).cloned().unwrap_or_default();
    let mut results = HashMap::with_capacity(pdus.len());

    for pdu in pdus {
        // The wire PDU carries no `event_id` for room versions >= 3 (the
        // common case here) — run it through the same well-formedness
        // phase the pipeline itself uses to key this PDU's result by the
        // id the pipeline will actually assign it, not a field the PDU
        // likely doesn't have.
        let fallback_id = pdu.get("event_id").and_then(Value::as_str).unwrap_or("unknown").to_string();
        let raw = match serde_json::to_vec(&pdu) {
            Ok(bytes) => bytes,
            Err(e) => {
                results.insert(fallback_id, PduResult { error: Some(e.to_string()) });
                continue;
            }
        };

        let event_id = match ember_vm::wellformed::parse_and_check(&state.store, &raw) {
            Ok((event, _)) => event.event_id.to_string(),
            Err(e) => {
                results.insert(fallback_id, PduResult { error: Some(e.to_string()) });
                continue;
            }
        };

        match state.pipeline.process(&raw, Origin::Remote(origin.clone())).await {
            Ok(_) => {
                results.insert(event_id, PduResult { error: None });
            }
            Err(e) if matches!(e, ember_vm::VmError::Exists) => {
                results.insert(event_id, PduResult { error: None });
            }
            Err(e) => {
                tracing::warn!(%event_id, origin = %origin, "rejected inbound PDU: {e}");
                results.insert(event_id, PduResult { error: Some(e.to_string()) });
            }
        }
    }

    Ok(Json(TransactionResult { pdus: results }))
}
