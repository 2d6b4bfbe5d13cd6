//! Phases 6 and 8: authorization.
//!
//! Phase 6 replays the room version's auth rules against the hypothetical
//! state implied by the event's own `auth_events` list — the event's own
//! claim about what state justified it. Failure is final (`AUTH`).
//!
//! Phase 8 replays the same rules against the state resolution (phase 7)
//! actually produced for the event's parents. Failure here is a soft-fail:
//! the event is still committed and may be cited as a `prev_events`
//! target, it's just excluded from forward state.
//!
//! Both delegate to `ruma_state_res::event_auth::auth_check`, the auth
//! rules implementation itself — never reimplemented here.

use std::collections::HashMap;

use ember_store::Store;
use ruma_common::RoomVersionId;
use ruma_events::StateEventType;
use ruma_state_res::event_auth;

use crate::error::{VmError, VmResult};
use crate::pdu_event::PduEvent;
use crate::room;
use crate::state_res::ResolvedState;

/// Phase 6. Every id in `event.auth_events` must already be committed
/// (guaranteed by phase 5) — a missing one simply isn't found by
/// `fetch_state` below and `auth_check` rejects the event for lacking the
/// state it needs.
pub fn check_against_auth_events(
    store: &Store,
    room_version: &RoomVersionId,
    event: &ember_model::Event,
) -> VmResult<()> {
    let mut by_type_and_key: HashMap<(String, String), PduEvent> = HashMap::new();
    for id in &event.auth_events {
        if let Some(raw) = room::fetch_event(store, id)? {
            let pdu = PduEvent::new(raw)?;
            if let Some(state_key) = pdu.event().state_key.clone() {
                by_type_and_key.insert((pdu.event().event_type.clone(), state_key), pdu);
            }
        }
    }

    let fetch_state = |event_type: &StateEventType, state_key: &str| -> Option<PduEvent> {
        by_type_and_key.get(&(event_type.to_string(), state_key.to_string())).cloned()
    };

    run_auth_check(room_version, event, fetch_state)
        .map_err(|e| VmError::Auth(format!("{} failed auth against its own auth_events: {e}", event.event_id)))
}

/// Phase 8. Returns `Ok(true)` when the event is authorized by resolved
/// state, `Ok(false)` on a soft-fail (not an error — the caller commits
/// the event either way and only differs on whether it updates forward
/// state / the head set).
pub fn check_against_resolved_state(
    store: &Store,
    room_version: &RoomVersionId,
    event: &ember_model::Event,
    resolved: &ResolvedState,
) -> VmResult<bool> {
    let fetch_state = |event_type: &StateEventType, state_key: &str| -> Option<PduEvent> {
        let id = resolved.get(&(event_type.to_string(), state_key.to_string()))?;
        room::fetch_event(store, id).ok().flatten().and_then(|e| PduEvent::new(e).ok())
    };

    Ok(run_auth_check(room_version, event, fetch_state).is_ok())
}

fn run_auth_check(
    room_version: &RoomVersionId,
    event: &ember_model::Event,
    fetch_state: impl Fn(&StateEventType, &str) -> Option<PduEvent>,
) -> VmResult<()> {
    let rules = room_version
        .rules()
        .ok_or_else(|| VmError::Auth(format!("room version {room_version} has no known rules")))?;
    let pdu = PduEvent::new(event.clone())?;

    let allowed = event_auth::auth_check(&rules.authorization, &pdu, fetch_state)
        .map_err(|e| VmError::Auth(e.to_string()))?;

    if allowed {
        Ok(())
    } else {
        Err(VmError::Auth(format!("{} rejected by auth rules", event.event_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_model::event::EventHashes;
    use js_int::UInt;
    use ruma_common::{owned_event_id, room_id, user_id, MilliSecondsSinceUnixEpoch};
    use smallvec::SmallVec;
    use std::collections::BTreeMap;

    fn create_event() -> ember_model::Event {
        ember_model::Event {
            event_id: owned_event_id!("$create:example.org"),
            room_id: room_id!("!room:example.org").to_owned(),
            sender: user_id!("@alice:example.org").to_owned(),
            origin: None,
            origin_server_ts: MilliSecondsSinceUnixEpoch(UInt::from(1u32)),
            event_type: "m.room.create".into(),
            state_key: Some(String::new()),
            content: serde_json::json!({"creator": "@alice:example.org", "room_version": "10"}),
            prev_events: SmallVec::new(),
            auth_events: SmallVec::new(),
            depth: UInt::from(1u32),
            hashes: EventHashes { sha256: String::new() },
            signatures: BTreeMap::new(),
            redacts: None,
            prev_state: Vec::new(),
            unsigned: serde_json::Map::new(),
        }
    }

    #[test]
    fn create_event_with_no_auth_events_is_self_authorizing() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path(), &ember_store::StoreOptions::default()).unwrap();
        let event = create_event();
        assert!(check_against_auth_events(&store, &RoomVersionId::V10, &event).is_ok());
    }
}
