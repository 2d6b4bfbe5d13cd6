//! Composing a new locally-authored event: selecting `prev_events`,
//! `auth_events` and `depth` from the room's current state, then hashing,
//! deriving the event id, and signing it — the inverse of what `auth.rs`
//! and `hash.rs` check on the way in. Used by the client-facing room
//! creation and send-event routes; the composed event is handed to
//! [`crate::Pipeline::process`] with [`crate::Origin::Local`] like any
//! other event.

use ember_federation::ServerSigningKey;
use ember_head::HeadTracker;
use ember_model::event::{Event, EventHashes};
use ember_store::Store;
use js_int::UInt;
use ruma_common::{MilliSecondsSinceUnixEpoch, OwnedEventId, OwnedRoomId, OwnedUserId, RoomVersionId};
use smallvec::SmallVec;

use crate::error::{VmError, VmResult};
use crate::room;

/// Room version used for every room this server creates. Federated rooms
/// created elsewhere keep whatever version their `m.room.create` names;
/// this only governs the rooms we originate (see `DESIGN.md`).
pub const LOCAL_ROOM_VERSION: RoomVersionId = RoomVersionId::V11;

/// The unsigned fields a caller supplies; everything else (`prev_events`,
/// `auth_events`, `depth`, `hashes`, `event_id`, `signatures`) is derived.
pub struct Draft {
    pub room_id: OwnedRoomId,
    pub sender: OwnedUserId,
    pub event_type: String,
    pub state_key: Option<String>,
    pub content: serde_json::Value,
}

/// Select the `auth_events` a new event of this shape should point at,
/// per the server-server auth-events rule: always the room's create event;
/// for anything but the create event itself, also the current power_levels
/// and the sender's own membership; for a membership event, additionally
/// the target's current membership and the room's join_rules.
fn select_auth_events(
    state: &std::collections::HashMap<(String, String), OwnedEventId>,
    sender: &OwnedUserId,
    event_type: &str,
    state_key: Option<&str>,
) -> Vec<OwnedEventId> {
    let mut ids = Vec::new();
    if let Some(id) = state.get(&("m.room.create".to_string(), String::new())) {
        ids.push(id.clone());
    }
    if event_type == "m.room.create" {
        return ids;
    }
    if let Some(id) = state.get(&("m.room.power_levels".to_string(), String::new())) {
        ids.push(id.clone());
    }
    if let Some(id) = state.get(&("m.room.member".to_string(), sender.to_string())) {
        ids.push(id.clone());
    }
    if event_type == "m.room.member" {
        if let Some(target) = state_key {
            if target != sender.as_str() {
                if let Some(id) = state.get(&("m.room.member".to_string(), target.to_string())) {
                    ids.push(id.clone());
                }
            }
        }
        if let Some(id) = state.get(&("m.room.join_rules".to_string(), String::new())) {
            ids.push(id.clone());
        }
    }
    ids.sort();
    ids.dedup();
    ids
}

/// Compose, hash, derive the id for, and sign a new event. Does not commit
/// it — the caller feeds the serialized result into the pipeline so it
/// goes through the same nine phases as a remote event.
pub fn compose(
    store: &Store,
    heads: &HeadTracker,
    key: &ServerSigningKey,
    server_name: &str,
    draft: Draft,
) -> VmResult<Event> {
    let event = build_unsigned(store, heads, server_name, draft)?;
    ember_model::sign::sign_event(server_name, key.pair(), &event).map_err(|e| VmError::Invalid(e.to_string()))
}

/// Build and hash a new event's full shape (`prev_events`, `auth_events`,
/// `depth`, `hashes`, `event_id`) without signing it. Used directly by the
/// `make_join` federation route, which hands back an unsigned prototype
/// for the joining server to sign itself; [`compose`] is this plus the
/// local signature, for events we both author and sign.
pub fn build_unsigned(
    store: &Store,
    heads: &HeadTracker,
    server_name: &str,
    draft: Draft,
) -> VmResult<Event> {
    let parents = heads.parents_for_new(draft.room_id.as_str());

    let depth = if draft.event_type == "m.room.create" {
        1u64
    } else {
        let mut max_parent_depth = 0u64;
        for parent in &parents {
            if let Some(parent_event) = room::fetch_event(store, parent)? {
                max_parent_depth = max_parent_depth.max(u64::from(parent_event.depth));
            }
        }
        max_parent_depth + 1
    };

    let auth_events = if draft.event_type == "m.room.create" {
        Vec::new()
    } else {
        let state = room::state_map(store, draft.room_id.as_str())?;
        select_auth_events(&state, &draft.sender, &draft.event_type, draft.state_key.as_deref())
    };

    let mut event = Event {
        event_id: ember_model::event::placeholder_event_id(),
        room_id: draft.room_id,
        sender: draft.sender,
        origin: Some(
            server_name
                .try_into()
                .map_err(|e| VmError::Identifier(format!("server name: {e}")))?,
        ),
        origin_server_ts: MilliSecondsSinceUnixEpoch::now(),
        event_type: draft.event_type,
        state_key: draft.state_key,
        content: draft.content,
        prev_events: SmallVec::from_vec(parents),
        auth_events: SmallVec::from_vec(auth_events),
        depth: UInt::try_from(depth).unwrap_or(UInt::MAX),
        hashes: EventHashes { sha256: String::new() },
        signatures: Default::default(),
        redacts: None,
        prev_state: Vec::new(),
        unsigned: serde_json::Map::new(),
    };

    event.hashes.sha256 =
        ember_model::hash::content_hash(&event).map_err(|e| VmError::Invalid(e.to_string()))?;
    event.event_id = ember_model::hash::derive_event_id(&event, &LOCAL_ROOM_VERSION)
        .map_err(|e| VmError::Invalid(e.to_string()))?;

    Ok(event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_store::StoreOptions;
    use ruma_common::{room_id, user_id};

    fn signing_key() -> ServerSigningKey {
        let (key, _der) = ServerSigningKey::generate("a_1").unwrap();
        key
    }

    #[test]
    fn create_event_has_no_parents_and_depth_one() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path(), &StoreOptions::default()).unwrap();
        let heads = HeadTracker::new();
        let key = signing_key();

        let draft = Draft {
            room_id: room_id!("!room:a.test").to_owned(),
            sender: user_id!("@alice:a.test").to_owned(),
            event_type: "m.room.create".to_string(),
            state_key: Some(String::new()),
            content: serde_json::json!({"creator": "@alice:a.test", "room_version": "11"}),
        };

        let event = compose(&store, &heads, &key, "a.test", draft).unwrap();
        assert!(event.prev_events.is_empty());
        assert_eq!(u64::from(event.depth), 1);
        assert!(event.auth_events.is_empty());
        assert!(event.signatures.contains_key("a.test"));
    }
}
