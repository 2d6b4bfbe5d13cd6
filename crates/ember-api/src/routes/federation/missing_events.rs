//! `POST /_matrix/federation/v1/get_missing_events/{roomId}` — given a set
//! of `latest_events` and `earliest_events`, return the events between
//! them that the caller doesn't have yet, walking `prev_events` backwards
//! from `latest_events` until `earliest_events` or `limit` is hit.

use std::collections::HashSet;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, Method};
use axum::{routing::post, Json, Router};
use ember_common::error::EmberError;
use ember_vm::room;
use ruma_common::OwnedEventId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::xmatrix::verify_origin;
use crate::error::vm_err;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route(
        "/_matrix/federation/v1/get_missing_events/{room_id}",
        post(get_missing_events),
    )
}

#[derive(Deserialize)]
struct MissingEventsBody {
    earliest_events: Vec<OwnedEventId>,
    latest_events: Vec<OwnedEventId>,
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_limit() -> usize {
    10
}

#[derive(Serialize)]
struct MissingEventsResponse {
    events: Vec<Value>,
}

async fn get_missing_events(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<MissingEventsBody>,
) -> Result<Json<MissingEventsResponse>, EmberError> {
    let uri = format!("/_matrix/federation/v1/get_missing_events/{room_id}");
    let body_value = serde_json::to_value(&SerializableRequest {
        earliest_events: &body.earliest_events,
        latest_events: &body.latest_events,
        limit: body.limit,
    })
    .map_err(|e| EmberError::Internal(anyhow::anyhow!(e)))?;
    verify_origin(&state, &Method::POST, &uri, Some(&body_value), &headers).await?;

    let known: HashSet<OwnedEventId> = body.earliest_events.iter().cloned().collect();
    let mut seen: HashSet<OwnedEventId> = known.clone();
    let mut queue = body.latest_events;
    let mut events = Vec::new();

    while let Some(id) = queue.pop() {
        if events.len() >= body.limit {
            break;
        }
        if !seen.insert(id.clone()) {
            continue;
        }
        let Some(event) = room::fetch_event(&state.store, &id).map_err(vm_err)? else { continue };
        if known.contains(&id) {
            continue;
        }
        queue.extend(event.prev_events.iter().cloned());
        events.push(serde_json::to_value(&event).map_err(|e| EmberError::Internal(anyhow::anyhow!(e)))?);
    }

    Ok(Json(MissingEventsResponse { events }))
}

#[derive(Serialize)]
struct SerializableRequest<'a> {
    earliest_events: &'a [OwnedEventId],
    latest_events: &'a [OwnedEventId],
    limit: usize,
}
