//! `GET /_matrix/federation/v1/make_join/{roomId}/{userId}` and
//! `PUT /_matrix/federation/v2/send_join/{roomId}/{eventId}` — the two-step
//! federated join handshake (end-to-end scenario 2: `@bob:b.test` joining
//! a room hosted on `a.test`).

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, Method};
use axum::routing::{get, put};
use axum::{Json, Router};
use ember_common::error::EmberError;
use ember_federation::types::{MakeJoinResponse, SendJoinResponse};
use ember_vm::{compose, room, Draft, Origin};
use ruma_common::{OwnedRoomId, OwnedUserId};
use serde::Deserialize;
use serde_json::Value;

use super::state::state_and_auth_ids;
use super::xmatrix::verify_origin;
use crate::error::vm_err;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/_matrix/federation/v1/make_join/{room_id}/{user_id}", get(make_join))
        .route("/_matrix/federation/v2/send_join/{room_id}/{event_id}", put(send_join))
}

#[derive(Deserialize)]
struct MakeJoinQuery {
    #[serde(default, rename = "ver")]
    #[allow(dead_code)]
    room_versions: Vec<String>,
}

async fn make_join(
    State(state): State<Arc<AppState>>,
    Path((room_id, user_id)): Path<(String, String)>,
    Query(_query): Query<MakeJoinQuery>,
    headers: HeaderMap,
) -> Result<Json<MakeJoinResponse>, EmberError> {
    let uri = format!("/_matrix/federation/v1/make_join/{room_id}/{user_id}");
    verify_origin(&state, &Method::GET, &uri, None, &headers).await?;

    let room_id: OwnedRoomId =
        room_id.as_str().try_into().map_err(|_| EmberError::Malformed("invalid room id".into()))?;
    let user_id: OwnedUserId =
        user_id.as_str().try_into().map_err(|_| EmberError::Malformed("invalid user id".into()))?;

    let draft = Draft {
        room_id: room_id.clone(),
        sender: user_id.clone(),
        event_type: "m.room.member".to_string(),
        state_key: Some(user_id.to_string()),
        content: serde_json::json!({"membership": "join"}),
    };
    let prototype = compose::build_unsigned(&state.store, &state.heads, state.server_name(), draft).map_err(vm_err)?;

    Ok(Json(MakeJoinResponse {
        room_version: ember_vm::LOCAL_ROOM_VERSION.as_str().to_string(),
        event: serde_json::to_value(&prototype).map_err(|e| EmberError::Internal(anyhow::anyhow!(e)))?,
    }))
}

async fn send_join(
    State(state): State<Arc<AppState>>,
    Path((room_id, event_id)): Path<(String, String)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<SendJoinResponse>, EmberError> {
    let uri = format!("/_matrix/federation/v2/send_join/{room_id}/{event_id}");
    let origin = verify_origin(&state, &Method::PUT, &uri, Some(&body), &headers).await?;

    let raw = serde_json::to_vec(&body).map_err(|e| EmberError::Internal(anyhow::anyhow!(e)))?;
    match state.pipeline.process(&raw, Origin::Remote(origin)).await {
        Ok(_) | Err(ember_vm::VmError::Exists) => {}
        Err(e) => return Err(vm_err(e)),
    }

    let (state_ids, auth_ids) = state_and_auth_ids(&state, &room_id)?;
    let pdus = state_ids
        .iter()
        .filter_map(|id| room::fetch_event(&state.store, id).ok().flatten())
        .map(|e| serde_json::to_value(&e))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| EmberError::Internal(anyhow::anyhow!(e)))?;
    let auth_chain = auth_ids
        .iter()
        .filter_map(|id| room::fetch_event(&state.store, id).ok().flatten())
        .map(|e| serde_json::to_value(&e))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| EmberError::Internal(anyhow::anyhow!(e)))?;

    Ok(Json(SendJoinResponse { state: pdus, auth_chain, members_omitted: false }))
}
