//! `POST /_matrix/client/v3/createRoom` and
//! `PUT /_matrix/client/v3/rooms/{roomId}/send/{eventType}/{txnId}` — the
//! local-authoring half of the pipeline. Each event is built with
//! [`ember_vm::compose`], signed with this server's key, and fed through
//! [`ember_vm::Pipeline::process`] with [`ember_vm::Origin::Local`] exactly
//! like an inbound federation event, so local authorship goes through the
//! same nine phases everything else does (end-to-end scenario 1: creating
//! a room commits `m.room.create`, the creator's `m.room.member`, and
//! `m.room.power_levels`, leaving the head set at the power_levels event).

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::{post, put};
use axum::{Json, Router};
use ember_common::error::EmberError;
use ember_vm::{compose, Draft, Origin};
use ruma_common::{OwnedRoomId, OwnedUserId, RoomId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::vm_err;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/_matrix/client/v3/createRoom", post(create_room))
        .route("/_matrix/client/v3/rooms/{room_id}/send/{event_type}/{txn_id}", put(send_event))
}

fn acting_user(headers: &HeaderMap) -> Result<OwnedUserId, EmberError> {
    let raw = headers
        .get("X-Ember-User-Id")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| EmberError::Unauthorized("missing X-Ember-User-Id header".into()))?;
    raw.try_into().map_err(|_| EmberError::Malformed(format!("invalid user id {raw}")))
}

#[derive(Deserialize, Default)]
struct CreateRoomBody {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    topic: Option<String>,
}

#[derive(Serialize)]
struct CreateRoomResponse {
    room_id: OwnedRoomId,
}

async fn create_room(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateRoomBody>,
) -> Result<Json<CreateRoomResponse>, EmberError> {
    let creator = acting_user(&headers)?;
    let server_name = state.server_name().to_string();
    let room_id = RoomId::new(
        server_name
            .as_str()
            .try_into()
            .map_err(|_| EmberError::Internal(anyhow::anyhow!("local server name is not a valid server name")))?,
    );

    let create_content = serde_json::json!({
        "creator": creator,
        "room_version": ember_vm::LOCAL_ROOM_VERSION.as_str(),
    });
    commit_event(
        &state,
        Draft {
            room_id: room_id.clone(),
            sender: creator.clone(),
            event_type: "m.room.create".to_string(),
            state_key: Some(String::new()),
            content: create_content,
        },
    )
    .await?;

    commit_event(
        &state,
        Draft {
            room_id: room_id.clone(),
            sender: creator.clone(),
            event_type: "m.room.member".to_string(),
            state_key: Some(creator.to_string()),
            content: serde_json::json!({"membership": "join"}),
        },
    )
    .await?;

    let mut power_levels_content = serde_json::json!({
        "users": { creator.as_str(): 100 },
        "users_default": 0,
        "events_default": 0,
        "state_default": 50,
        "ban": 50,
        "kick": 50,
        "redact": 50,
        "invite": 0,
    });
    if let Some(name) = &body.name {
        power_levels_content["room_name_hint"] = serde_json::Value::String(name.clone());
    }
    let _ = body.topic;
    commit_event(
        &state,
        Draft {
            room_id: room_id.clone(),
            sender: creator.clone(),
            event_type: "m.room.power_levels".to_string(),
            state_key: Some(String::new()),
            content: power_levels_content,
        },
    )
    .await?;

    Ok(Json(CreateRoomResponse { room_id }))
}

#[derive(Serialize)]
struct SendEventResponse {
    event_id: String,
}

async fn send_event(
    State(state): State<Arc<AppState>>,
    Path((room_id, event_type, _txn_id)): Path<(String, String, String)>,
    headers: HeaderMap,
    Json(content): Json<Value>,
) -> Result<Json<SendEventResponse>, EmberError> {
    let sender = acting_user(&headers)?;
    let room_id: OwnedRoomId =
        room_id.as_str().try_into().map_err(|_| EmberError::Malformed("invalid room id".into()))?;

    let event = commit_event(
        &state,
        Draft { room_id, sender, event_type, state_key: None, content },
    )
    .await?;

    Ok(Json(SendEventResponse { event_id: event.event_id.to_string() }))
}

async fn commit_event(state: &AppState, draft: Draft) -> Result<ember_model::Event, EmberError> {
    let event = compose::compose(&state.store, &state.heads, &state.signing_key, state.server_name(), draft)
        .map_err(vm_err)?;
    let raw = serde_json::to_vec(&event).map_err(|e| EmberError::Internal(anyhow::anyhow!(e)))?;
    match state.pipeline.process(&raw, Origin::Local).await {
        Ok(_) | Err(ember_vm::VmError::Exists) => Ok(event),
        Err(e) => Err(vm_err(e)),
    }
}
