//! Phase 9: commit. A single atomic [`CommitBatch`] persists the event
//! and every derived index; the in-memory head tracker and in-process
//! subscribers only update once that batch has landed, so a crash between
//! the two can under-notify subscribers on restart but never leave a
//! secondary index pointing at an uncommitted event.

use std::sync::Arc;

use ember_head::HeadTracker;
use ember_store::{CommitBatch, Store};
use ruma_common::OwnedEventId;
use sha2::{Digest, Sha256};

use crate::error::VmResult;
use crate::state_res::ResolvedState;
use crate::subscribe::CommitPublisher;

/// What phase 8 hands phase 9: the event, its chosen parents, the state
/// phase 7 resolved at those parents, and whether phase 8 accepted it.
pub struct CommitOutcome {
    pub event: ember_model::Event,
    pub parents: Vec<OwnedEventId>,
    pub resolved_state: ResolvedState,
    pub soft_failed: bool,
}

/// Commit `outcome`, returning the assigned `event_idx`.
pub fn commit(
    store: &Store,
    heads: &HeadTracker,
    publisher: &CommitPublisher,
    outcome: CommitOutcome,
) -> VmResult<u64> {
    let CommitOutcome { event, parents, resolved_state, soft_failed } = outcome;

    let event_idx = store.reserve_event_idx();
    let canonical_json = serde_json::to_vec(&event)?;
    let room_id = event.room_id.to_string();

    let mut batch = CommitBatch::new(store, event_idx);
    batch.advance_idx_counter()?;
    batch.insert_event(&event.event_id, &room_id, event.sender.as_str(), &event.event_type, &canonical_json)?;

    // `room_events`' state-root always reflects the state phase 7 resolved
    // at this event's parents — that's well-defined whether or not the
    // event itself went on to pass phase 8 against it.
    let serialized_state = serialize_state(&resolved_state)?;
    let state_root = state_root_digest(&serialized_state);
    batch.insert_state_node(&state_root, &serialized_state)?;
    batch.insert_room_events(&room_id, u64::from(event.depth), &state_root)?;

    if !soft_failed {
        if event.is_state_event() {
            let state_key = event.state_key.as_deref().unwrap_or_default();
            batch.set_room_state(&room_id, &event.event_type, state_key)?;
        }

        if event.event_type == "m.room.member" {
            if let (Some(state_key), Some(origin)) = (event.state_key.as_deref(), event.origin.as_ref()) {
                let membership = event.content.get("membership").and_then(|v| v.as_str()).unwrap_or("");
                if membership == "join" {
                    batch.set_room_joined(&room_id, origin.as_str(), state_key)?;
                } else {
                    batch.remove_room_joined(&room_id, origin.as_str(), state_key)?;
                }
            }
        }

        batch.advance_head(&room_id, event.event_id.as_str(), &parents)?;
    }

    batch.commit()?;

    if !soft_failed {
        heads.advance(&room_id, event.event_id.clone(), u64::from(event.depth), event_idx, &parents);
    }
    publisher.publish(Arc::new(event));

    Ok(event_idx)
}

/// Deterministic encoding of a resolved state map: sorted `(type,
/// state_key) -> event_id` triples, so two rooms with identical state
/// hash identically regardless of `HashMap` iteration order.
fn serialize_state(state: &ResolvedState) -> VmResult<Vec<u8>> {
    let mut sorted: Vec<_> = state.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    Ok(serde_json::to_vec(&sorted)?)
}

fn state_root_digest(serialized_state: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(serialized_state);
    hasher.finalize().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_model::event::EventHashes;
    use ember_store::StoreOptions;
    use js_int::UInt;
    use ruma_common::{owned_event_id, room_id, user_id, MilliSecondsSinceUnixEpoch};
    use smallvec::SmallVec;
    use std::collections::{BTreeMap, HashMap};

    fn create_event() -> ember_model::Event {
        ember_model::Event {
            event_id: owned_event_id!("$create:example.org"),
            room_id: room_id!("!room:example.org").to_owned(),
            sender: user_id!("@alice:example.org").to_owned(),
            origin: Some(ruma_common::server_name!("example.org").to_owned()),
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
    fn accepted_state_event_updates_room_state_and_head() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path(), &StoreOptions::default()).unwrap();
        let heads = HeadTracker::new();
        let publisher = CommitPublisher::new();

        let outcome = CommitOutcome {
            event: create_event(),
            parents: vec![],
            resolved_state: HashMap::new(),
            soft_failed: false,
        };
        commit(&store, &heads, &publisher, outcome).unwrap();

        assert_eq!(heads.parents_for_new("!room:example.org"), vec![owned_event_id!("$create:example.org")]);
        let state_idx = store
            .get_cf(ember_store::columns::ROOM_STATE, &ember_store::keys::room_state_key("!room:example.org", "m.room.create", ""))
            .unwrap();
        assert!(state_idx.is_some());
    }

    #[test]
    fn soft_failed_event_is_persisted_but_excluded_from_state_and_head() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path(), &StoreOptions::default()).unwrap();
        let heads = HeadTracker::new();
        let publisher = CommitPublisher::new();

        let outcome = CommitOutcome {
            event: create_event(),
            parents: vec![],
            resolved_state: HashMap::new(),
            soft_failed: true,
        };
        let idx = commit(&store, &heads, &publisher, outcome).unwrap();

        assert!(heads.parents_for_new("!room:example.org").is_empty());
        let json = store.get_cf(ember_store::columns::EVENT_JSON, &ember_store::keys::event_idx_key(idx)).unwrap();
        assert!(json.is_some());
        let state_idx = store
            .get_cf(ember_store::columns::ROOM_STATE, &ember_store::keys::room_state_key("!room:example.org", "m.room.create", ""))
            .unwrap();
        assert!(state_idx.is_none());
    }
}
