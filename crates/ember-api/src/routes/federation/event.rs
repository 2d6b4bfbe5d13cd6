//! `GET /_matrix/federation/v1/event/{eventId}` and
//! `GET /_matrix/federation/v1/event_auth/{roomId}/{eventId}`.

use std::collections::HashSet;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, Method};
use axum::{routing::get, Json, Router};
use ember_common::error::EmberError;
use ember_vm::room;
use ruma_common::OwnedEventId;
use serde::Serialize;
use serde_json::Value;

use super::xmatrix::verify_origin;
use crate::error::vm_err;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/_matrix/federation/v1/event/{event_id}", get(get_event))
        .route("/_matrix/federation/v1/event_auth/{room_id}/{event_id}", get(get_event_auth))
}

#[derive(Serialize)]
struct PduBatch {
    origin: String,
    origin_server_ts: i64,
    pdus: Vec<Value>,
}

async fn get_event(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<PduBatch>, EmberError> {
    let uri = format!("/_matrix/federation/v1/event/{event_id}");
    verify_origin(&state, &Method::GET, &uri, None, &headers).await?;

    let id: OwnedEventId =
        event_id.as_str().try_into().map_err(|_| EmberError::Malformed("invalid event id".into()))?;
    let event = room::fetch_event(&state.store, &id)
        .map_err(vm_err)?
        .ok_or_else(|| EmberError::NotFound { resource: format!("event {event_id}") })?;

    Ok(Json(PduBatch {
        origin: state.server_name().to_string(),
        origin_server_ts: i64::from(event.origin_server_ts.0),
        pdus: vec![serde_json::to_value(&event).map_err(|e| EmberError::Internal(anyhow::anyhow!(e)))?],
    }))
}

#[derive(Serialize)]
struct AuthChainResponse {
    auth_chain: Vec<Value>,
}

async fn get_event_auth(
    State(state): State<Arc<AppState>>,
    Path((room_id, event_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<AuthChainResponse>, EmberError> {
    let uri = format!("/_matrix/federation/v1/event_auth/{room_id}/{event_id}");
    verify_origin(&state, &Method::GET, &uri, None, &headers).await?;

    let id: OwnedEventId =
        event_id.as_str().try_into().map_err(|_| EmberError::Malformed("invalid event id".into()))?;
    let event = room::fetch_event(&state.store, &id)
        .map_err(vm_err)?
        .ok_or_else(|| EmberError::NotFound { resource: format!("event {event_id}") })?;

    let chain = collect_auth_chain(&state, event.auth_events.iter().cloned().collect())?;
    Ok(Json(AuthChainResponse { auth_chain: chain }))
}

/// Walk `auth_events` transitively from the given roots, returning every
/// reachable event's JSON (each id appears once).
fn collect_auth_chain(state: &AppState, roots: Vec<OwnedEventId>) -> Result<Vec<Value>, EmberError> {
    let mut seen: HashSet<OwnedEventId> = HashSet::new();
    let mut queue = roots;
    let mut chain = Vec::new();

    while let Some(id) = queue.pop() {
        if !seen.insert(id.clone()) {
            continue;
        }
        let Some(event) = room::fetch_event(&state.store, &id).map_err(vm_err)? else { continue };
        queue.extend(event.auth_events.iter().cloned());
        chain.push(serde_json::to_value(&event).map_err(|e| EmberError::Internal(anyhow::anyhow!(e)))?);
    }
    Ok(chain)
}
