//! `GET /_matrix/federation/v1/backfill/{roomId}?v=&limit=` — walk
//! backwards from the given events by depth, up to `limit` PDUs.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, Method};
use axum::routing::get;
use axum::{Json, Router};
use ember_common::error::EmberError;
use ember_store::{columns, keys};
use ember_vm::room;
use ruma_common::{MilliSecondsSinceUnixEpoch, OwnedEventId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::xmatrix::verify_origin;
use crate::error::{store_err, vm_err};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/_matrix/federation/v1/backfill/{room_id}", get(backfill))
}

#[derive(Deserialize)]
struct BackfillQuery {
    #[serde(default, rename = "v")]
    from: Vec<String>,
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_limit() -> usize {
    100
}

#[derive(Serialize)]
struct BackfillResponse {
    origin: String,
    origin_server_ts: i64,
    pdus: Vec<Value>,
}

async fn backfill(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
    Query(query): Query<BackfillQuery>,
    headers: HeaderMap,
) -> Result<Json<BackfillResponse>, EmberError> {
    let uri = format!("/_matrix/federation/v1/backfill/{room_id}");
    verify_origin(&state, &Method::GET, &uri, None, &headers).await?;

    let mut max_depth = u64::MAX;
    if !query.from.is_empty() {
        let mut depths = Vec::with_capacity(query.from.len());
        for id in &query.from {
            let event_id: OwnedEventId =
                id.as_str().try_into().map_err(|_| EmberError::Malformed(format!("invalid event id {id}")))?;
            let event = room::fetch_event(&state.store, &event_id)
                .map_err(vm_err)?
                .ok_or_else(|| EmberError::NotFound { resource: format!("event {id}") })?;
            depths.push(u64::from(event.depth));
        }
        max_depth = depths.into_iter().max().unwrap_or(u64::MAX);
    }

    let prefix = keys::room_events_prefix(&room_id);
    let rows = state.store.prefix_iter_rev(columns::ROOM_EVENTS, &prefix).map_err(store_err)?;

    let mut pdus = Vec::new();
    for (key, _state_root) in &rows {
        if pdus.len() >= query.limit {
            break;
        }
        let depth = {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(&key[key.len() - 16..key.len() - 8]);
            u64::from_be_bytes(buf)
        };
        if depth > max_depth {
            continue;
        }
        let event_idx = keys::decode_event_idx_key(&key[key.len() - 8..]);
        let json_key = keys::event_idx_key(event_idx);
        if let Some(json) = state.store.get_cf(columns::EVENT_JSON, &json_key).map_err(store_err)? {
            pdus.push(serde_json::from_slice(&json).map_err(|e| EmberError::Internal(anyhow::anyhow!(e)))?);
        }
    }

    Ok(Json(BackfillResponse {
        origin: state.server_name().to_string(),
        origin_server_ts: i64::from(MilliSecondsSinceUnixEpoch::now().0),
        pdus,
    }))
}
