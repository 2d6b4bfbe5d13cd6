//! The redaction algorithm: strip an event down to the fields every room
//! version agrees must survive redaction.
//!
//! Produces the *stripped-content projection* used both for computing the
//! reference hash (room versions >= 3) and for what gets served back to
//! clients/peers once `m.room.redaction` has been applied — the original
//! signed bytes are never mutated, only this projection is.

use ruma_common::RoomVersionId;
use serde_json::{json, Map, Value};

use crate::error::ModelResult;
use crate::event::Event;

/// Content keys preserved for a given `(event_type, room_version)` pair.
/// Mirrors the Matrix specification's per-room-version redaction table.
fn preserved_content_keys(event_type: &str, room_version: &RoomVersionId) -> &'static [&'static str] {
    use RoomVersionId::*;
    let pre_v11 = matches!(
        room_version,
        V1 | V2 | V3 | V4 | V5 | V6 | V7 | V8 | V9 | V10
    );

    match event_type {
        "m.room.member" if pre_v11 => &["membership"],
        "m.room.member" => &["membership", "join_authorised_via_users_server"],

        "m.room.create" if pre_v11 => &["creator", "m.federate", "room_version"],
        // v11 dropped the `creator` field requirement and preserves the whole
        // content; handled specially below since it isn't a fixed key list.
        "m.room.create" => &[],

        "m.room.join_rules" if pre_v11 => &["join_rule"],
        "m.room.join_rules" => &["join_rule", "allow"],

        "m.room.power_levels" if pre_v11 => &[
            "ban", "events", "events_default", "kick", "redact", "state_default", "users",
            "users_default",
        ],
        "m.room.power_levels" => &[
            "ban", "events", "events_default", "invite", "kick", "redact", "state_default",
            "users", "users_default",
        ],

        "m.room.history_visibility" => &["history_visibility"],

        "m.room.aliases" if pre_v11 => &["aliases"],
        "m.room.aliases" => &[],

        "m.room.redaction" if matches!(room_version, V11) => &["redacts"],

        _ => &[],
    }
}

fn redact_content(event_type: &str, content: &Value, room_version: &RoomVersionId) -> Value {
    if event_type == "m.room.create" && matches!(room_version, RoomVersionId::V11) {
        return content.clone();
    }
    let Some(content_obj) = content.as_object() else {
        return Value::Object(Map::new());
    };
    let mut preserved = Map::new();
    for key in preserved_content_keys(event_type, room_version) {
        if let Some(value) = content_obj.get(*key) {
            preserved.insert((*key).to_string(), value.clone());
        }
    }
    Value::Object(preserved)
}

/// Apply the redaction algorithm, returning the stripped JSON projection.
/// Does not touch `signatures`/`unsigned` — callers that need the reference
/// hash or signing preimage strip those separately (see `hash.rs`).
///
/// Room versions >= 3 never carry `event_id` as a PDU field at all — it's
/// derived from this very projection's hash — so it's only included for
/// the legacy v1/v2 wire shape.
pub fn redact_to_json(event: &Event, room_version: &RoomVersionId) -> ModelResult<Value> {
    let mut redacted = json!({
        "type": event.event_type,
        "room_id": event.room_id,
        "sender": event.sender,
        "origin_server_ts": event.origin_server_ts,
        "depth": event.depth,
        "prev_events": event.prev_events,
        "auth_events": event.auth_events,
        "hashes": event.hashes,
    });

    if matches!(room_version, RoomVersionId::V1 | RoomVersionId::V2) {
        redacted["event_id"] = Value::String(event.event_id.to_string());
    }

    if let Some(state_key) = &event.state_key {
        redacted["state_key"] = Value::String(state_key.clone());
    }
    if let Some(redacts) = &event.redacts {
        if matches!(room_version, RoomVersionId::V11) {
            redacted["redacts"] = Value::String(redacts.to_string());
        }
    }

    let preserved_content = redact_content(&event.event_type, &event.content, room_version);
    if preserved_content.as_object().is_some_and(|o| !o.is_empty()) {
        redacted["content"] = preserved_content;
    }

    Ok(redacted)
}
