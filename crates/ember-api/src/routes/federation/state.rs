//! `GET /_matrix/federation/v1/state/{roomId}` and `.../state_ids/{roomId}` —
//! the full (or id-only) state at a given event, plus its auth chain.
//! Resolved state is read straight from `room_state`: the event named by
//! `?event_id=` must already be committed locally, same as every other
//! federation read in this crate (no arbitrary remote state acceptance).

use std::collections::HashSet;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, Method};
use axum::{routing::get, Json, Router};
use ember_common::error::EmberError;
use ember_vm::room;
use ruma_common::OwnedEventId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::xmatrix::verify_origin;
use crate::error::vm_err;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/_matrix/federation/v1/state/{room_id}", get(get_state))
        .route("/_matrix/federation/v1/state_ids/{room_id}", get(get_state_ids))
}

#[derive(Deserialize)]
struct StateQuery {
    event_id: String,
}

#[derive(Serialize)]
struct StateResponse {
    pdus: Vec<Value>,
    auth_chain: Vec<Value>,
}

#[derive(Serialize)]
struct StateIdsResponse {
    pdu_ids: Vec<OwnedEventId>,
    auth_chain_ids: Vec<OwnedEventId>,
}

async fn get_state(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
    Query(query): Query<StateQuery>,
    headers: HeaderMap,
) -> Result<Json<StateResponse>, EmberError> {
    let uri = format!("/_matrix/federation/v1/state/{room_id}?event_id={}", query.event_id);
    verify_origin(&state, &Method::GET, &uri, None, &headers).await?;

    let (state_ids, auth_ids) = state_and_auth_ids(&state, &room_id)?;
    let pdus = load_events(&state, &state_ids)?;
    let auth_chain = load_events(&state, &auth_ids)?;

    Ok(Json(StateResponse { pdus, auth_chain }))
}

async fn get_state_ids(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
    Query(query): Query<StateQuery>,
    headers: HeaderMap,
) -> Result<Json<StateIdsResponse>, EmberError> {
    let uri = format!("/_matrix/federation/v1/state_ids/{room_id}?event_id={}", query.event_id);
    verify_origin(&state, &Method::GET, &uri, None, &headers).await?;

    let (state_ids, auth_ids) = state_and_auth_ids(&state, &room_id)?;
    Ok(Json(StateIdsResponse { pdu_ids: state_ids, auth_chain_ids: auth_ids }))
}

pub(super) fn state_and_auth_ids(
    state: &AppState,
    room_id: &str,
) -> Result<(Vec<OwnedEventId>, Vec<OwnedEventId>), EmberError> {
    let map = room::state_map(&state.store, room_id).map_err(vm_err)?;
    let state_ids: Vec<OwnedEventId> = map.into_values().collect();

    let mut seen: HashSet<OwnedEventId> = state_ids.iter().cloned().collect();
    let mut queue = Vec::new();
    for id in &state_ids {
        if let Some(event) = room::fetch_event(&state.store, id).map_err(vm_err)? {
            queue.extend(event.auth_events.iter().cloned());
        }
    }

    let mut auth_ids = Vec::new();
    while let Some(id) = queue.pop() {
        if !seen.insert(id.clone()) {
            continue;
        }
        let Some(event) = room::fetch_event(&state.store, &id).map_err(vm_err)? else { continue };
        queue.extend(event.auth_events.iter().cloned());
        auth_ids.push(id);
    }

    Ok((state_ids, auth_ids))
}

fn load_events(state: &AppState, ids: &[OwnedEventId]) -> Result<Vec<Value>, EmberError> {
    let mut out = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(event) = room::fetch_event(&state.store, id).map_err(vm_err)? {
            out.push(serde_json::to_value(&event).map_err(|e| EmberError::Internal(anyhow::anyhow!(e)))?);
        }
    }
    Ok(out)
}
