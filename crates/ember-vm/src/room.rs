//! Shared store-lookup helpers used by more than one pipeline phase:
//! fetching an event by id, resolving a room's version, and reading the
//! committed state map. Kept separate from `commit.rs` (the only *writer*)
//! since these are read paths several phases need independently.

use std::collections::HashMap;

use ember_store::{columns, keys, Store};
use ruma_common::{OwnedEventId, RoomVersionId};

use crate::error::{VmError, VmResult};

/// Fetch a committed event by id, if indexed.
pub fn fetch_event(store: &Store, event_id: &OwnedEventId) -> VmResult<Option<ember_model::Event>> {
    let Some(idx_bytes) = store.get_cf(columns::EVENT_IDX, event_id.as_bytes())? else {
        return Ok(None);
    };
    let json = store
        .get_cf(columns::EVENT_JSON, &idx_bytes)?
        .ok_or_else(|| VmError::Invalid(format!("event_idx for {event_id} has no event_json entry")))?;
    Ok(Some(serde_json::from_slice(&json)?))
}

pub fn event_idx_for(store: &Store, event_id: &OwnedEventId) -> VmResult<Option<u64>> {
    let Some(idx_bytes) = store.get_cf(columns::EVENT_IDX, event_id.as_bytes())? else {
        return Ok(None);
    };
    Ok(Some(keys::decode_event_idx_key(&idx_bytes)))
}

/// Resolve a room's version. For the `m.room.create` event itself, the
/// version lives in its own content; for every other event, it's read back
/// from the room's already-committed create event via `room_state`.
pub fn room_version(store: &Store, room_id: &str, event: &ember_model::Event) -> VmResult<RoomVersionId> {
    if event.is_create_event() {
        return Ok(room_version_from_create_content(&event.content));
    }

    let key = keys::room_state_key(room_id, "m.room.create", "");
    let idx_bytes = store
        .get_cf(columns::ROOM_STATE, &key)?
        .ok_or_else(|| VmError::Invalid(format!("room {room_id} has no committed m.room.create")))?;
    let json = store
        .get_cf(columns::EVENT_JSON, &idx_bytes)?
        .ok_or_else(|| VmError::Invalid(format!("room {room_id}'s create event_idx has no event_json entry")))?;
    let create: ember_model::Event = serde_json::from_slice(&json)?;
    Ok(room_version_from_create_content(&create.content))
}

fn room_version_from_create_content(content: &serde_json::Value) -> RoomVersionId {
    content
        .get("room_version")
        .and_then(|v| v.as_str())
        .and_then(|v| RoomVersionId::try_from(v).ok())
        .unwrap_or(RoomVersionId::V1)
}

/// The full committed state map for a room: `(type, state_key) -> event_id`.
/// Used to seed state resolution's per-parent state sets and to replay auth
/// against resolved state (phase 8).
pub fn state_map(store: &Store, room_id: &str) -> VmResult<HashMap<(String, String), OwnedEventId>> {
    let prefix = {
        let mut p = Vec::with_capacity(room_id.len() + 2);
        p.extend_from_slice(&(room_id.len() as u16).to_be_bytes());
        p.extend_from_slice(room_id.as_bytes());
        p
    };

    let mut map = HashMap::new();
    for item in store.prefix_iter(columns::ROOM_STATE, &prefix)? {
        let (key, idx_bytes) = item?;
        let (event_type, state_key) = decode_room_state_suffix(&key, room_id.len());
        let idx = keys::decode_event_idx_key(&idx_bytes);
        let idx_key = keys::event_idx_key(idx);
        let event_json = store.get_cf(columns::EVENT_JSON, &idx_key)?;
        if let Some(json) = event_json {
            let event: ember_model::Event = serde_json::from_slice(&json)?;
            map.insert((event_type, state_key), event.event_id);
        }
    }
    Ok(map)
}

/// Decode the `(type, state_key)` suffix of a `room_state` key, given the
/// already-known `room_id` length prefix.
fn decode_room_state_suffix(key: &[u8], _room_id_len: usize) -> (String, String) {
    let mut cursor = 0usize;
    let room_id_len = u16::from_be_bytes([key[0], key[1]]) as usize;
    cursor += 2 + room_id_len;
    let type_len = u16::from_be_bytes([key[cursor], key[cursor + 1]]) as usize;
    cursor += 2;
    let event_type = String::from_utf8_lossy(&key[cursor..cursor + type_len]).into_owned();
    cursor += type_len;
    let state_key_len = u16::from_be_bytes([key[cursor], key[cursor + 1]]) as usize;
    cursor += 2;
    let state_key = String::from_utf8_lossy(&key[cursor..cursor + state_key_len]).into_owned();
    (event_type, state_key)
}
