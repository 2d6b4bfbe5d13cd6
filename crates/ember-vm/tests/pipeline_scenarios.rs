//! End-to-end coverage of the pipeline's phases, driven directly rather than
//! through [`ember_vm::Pipeline::process`].
//!
//! `Pipeline::process` always runs phase 3 (signature verification), which
//! fetches the signer's current verify keys over HTTPS with no test hook —
//! true for a locally authored event as much as a remote one, since
//! `compose::compose` signs before handing anything to the pipeline. That
//! makes `Pipeline::process` itself impossible to exercise without a live
//! federation peer. `land()` below runs every other phase (1, 2, 4, 6, 7, 8,
//! 9) in the same order `Pipeline::try_process` does, so these tests cover
//! the same cross-phase wiring minus the two phases that need a network:
//! phase 3 has its own coverage in `sig_check.rs`, phase 5 in `ancestors.rs`.

use std::collections::BTreeMap;

use ember_head::HeadTracker;
use ember_model::event::EventHashes;
use ember_model::Event;
use ember_store::{Store, StoreOptions};
use ember_vm::commit::{self, CommitOutcome};
use ember_vm::state_res::ResolvedState;
use ember_vm::{auth, compose, room, state_res, Draft};
use ember_vm::LOCAL_ROOM_VERSION;
use js_int::UInt;
use ruma_common::{room_id, server_name, user_id, MilliSecondsSinceUnixEpoch, OwnedEventId, OwnedRoomId, OwnedUserId};
use ruma_signatures::PublicKeyMap;
use smallvec::SmallVec;

/// A fresh store, head tracker, and server key, backed by a temp directory
/// kept alive for the caller's whole test (RocksDB needs the path to stay
/// put for the handle's lifetime).
fn harness() -> (tempfile::TempDir, Store, HeadTracker, ember_federation::ServerSigningKey) {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(dir.path(), &StoreOptions::default()).unwrap();
    let heads = HeadTracker::new();
    let (key, _der) = ember_federation::ServerSigningKey::generate("a_1").unwrap();
    (dir, store, heads, key)
}

fn draft(room_id: &OwnedRoomId, sender: &OwnedUserId, event_type: &str, state_key: Option<&str>, content: serde_json::Value) -> Draft {
    Draft {
        room_id: room_id.clone(),
        sender: sender.clone(),
        event_type: event_type.to_string(),
        state_key: state_key.map(str::to_string),
        content,
    }
}

/// Reconstruct the state committed at `parent`, the same way the pipeline's
/// own (private) `parent_state` does: by the `room_events` state-root
/// recorded for that exact event, not the room's current state.
fn state_at(store: &Store, room_id: &str, parent: &OwnedEventId) -> ResolvedState {
    let parent_event = room::fetch_event(store, parent).unwrap().expect("parent committed");
    let parent_idx = room::event_idx_for(store, parent).unwrap().expect("parent indexed");
    let key = ember_store::keys::room_events_key(room_id, u64::from(parent_event.depth), parent_idx);
    let state_root = store.get_cf(ember_store::columns::ROOM_EVENTS, &key).unwrap().expect("state root recorded");
    let serialized = store.get_cf(ember_store::columns::STATE_NODE, &state_root).unwrap().expect("state node recorded");
    let entries: Vec<((String, String), OwnedEventId)> = serde_json::from_slice(&serialized).unwrap();
    entries.into_iter().collect()
}

/// Drive `event` through every phase but 3 (signature) and 5 (ancestor
/// fetch), exactly as `Pipeline::try_process` sequences them. Returns the
/// assigned `event_idx` and whether phase 8 soft-failed it.
fn land(store: &Store, heads: &HeadTracker, publisher: &ember_vm::CommitPublisher, room_version: &ruma_common::RoomVersionId, event: Event) -> (u64, bool) {
    ember_model::hash::verify_content_hash(&event).expect("content hash must verify");

    auth::check_against_auth_events(store, room_version, &event).expect("must authorize against its own auth_events");

    let mut parent_states = Vec::with_capacity(event.prev_events.len());
    for parent in &event.prev_events {
        parent_states.push(state_at(store, event.room_id.as_str(), parent));
    }
    let resolved_state = state_res::resolve_state(store, room_version, &parent_states).unwrap();

    let soft_failed = !auth::check_against_resolved_state(store, room_version, &event, &resolved_state).unwrap();

    let parents = event.prev_events.iter().cloned().collect();
    let idx = commit::commit(store, heads, publisher, CommitOutcome { event, parents, resolved_state, soft_failed }).unwrap();
    (idx, soft_failed)
}

/// `land` against this server's fixed local room version, the shape every
/// call site below actually wants.
fn land_local(store: &Store, heads: &HeadTracker, publisher: &ember_vm::CommitPublisher, event: Event) -> (u64, bool) {
    land(store, heads, publisher, &LOCAL_ROOM_VERSION, event)
}

#[test]
fn scenario_1_create_room_commits_three_events_and_sets_head() {
    let (_dir, store, heads, key) = harness();
    let publisher = ember_vm::CommitPublisher::new();
    let room_id = room_id!("!room:a.test").to_owned();
    let alice = user_id!("@alice:a.test").to_owned();

    let create = compose::compose(
        &store,
        &heads,
        &key,
        "a.test",
        draft(&room_id, &alice, "m.room.create", Some(""), serde_json::json!({
            "creator": alice,
            "room_version": LOCAL_ROOM_VERSION.as_str(),
        })),
    )
    .unwrap();
    let (_, create_soft_failed) = land_local(&store, &heads, &publisher, create.clone());
    assert!(!create_soft_failed);

    let alice_join = compose::compose(
        &store,
        &heads,
        &key,
        "a.test",
        draft(&room_id, &alice, "m.room.member", Some(alice.as_str()), serde_json::json!({"membership": "join"})),
    )
    .unwrap();
    let (_, join_soft_failed) = land_local(&store, &heads, &publisher, alice_join);
    assert!(!join_soft_failed);

    let power_levels = compose::compose(
        &store,
        &heads,
        &key,
        "a.test",
        draft(&room_id, &alice, "m.room.power_levels", Some(""), serde_json::json!({
            "users": {alice.as_str(): 100},
            "users_default": 0,
            "events_default": 0,
            "state_default": 50,
            "ban": 50,
            "kick": 50,
            "redact": 50,
            "invite": 0,
        })),
    )
    .unwrap();
    let (_, pl_soft_failed) = land_local(&store, &heads, &publisher, power_levels.clone());
    assert!(!pl_soft_failed);

    assert_eq!(heads.parents_for_new(room_id.as_str()), vec![power_levels.event_id.clone()]);

    let state = room::state_map(&store, room_id.as_str()).unwrap();
    assert_eq!(state.get(&("m.room.create".to_string(), String::new())), Some(&create.event_id));
    assert_eq!(state.get(&("m.room.power_levels".to_string(), String::new())), Some(&power_levels.event_id));
}

#[test]
fn scenario_2_federated_join_lands_bobs_member_event_and_updates_state() {
    let (_dir, store, heads, alice_key) = harness();
    let publisher = ember_vm::CommitPublisher::new();
    let room_id = room_id!("!room:a.test").to_owned();
    let alice = user_id!("@alice:a.test").to_owned();
    let bob = user_id!("@bob:b.test").to_owned();

    let create = compose::compose(
        &store,
        &heads,
        &alice_key,
        "a.test",
        draft(&room_id, &alice, "m.room.create", Some(""), serde_json::json!({
            "creator": alice,
            "room_version": LOCAL_ROOM_VERSION.as_str(),
        })),
    )
    .unwrap();
    land_local(&store, &heads, &publisher, create);

    let alice_join = compose::compose(
        &store,
        &heads,
        &alice_key,
        "a.test",
        draft(&room_id, &alice, "m.room.member", Some(alice.as_str()), serde_json::json!({"membership": "join"})),
    )
    .unwrap();
    land_local(&store, &heads, &publisher, alice_join);

    let power_levels = compose::compose(
        &store,
        &heads,
        &alice_key,
        "a.test",
        draft(&room_id, &alice, "m.room.power_levels", Some(""), serde_json::json!({
            "users": {alice.as_str(): 100},
            "users_default": 0,
            "events_default": 0,
            "state_default": 50,
            "ban": 50,
            "kick": 50,
            "redact": 50,
            "invite": 0,
        })),
    )
    .unwrap();
    land_local(&store, &heads, &publisher, power_levels);

    // Without this the default join_rule is effectively private and bob's
    // join would be rejected outright rather than accepted.
    let join_rules = compose::compose(
        &store,
        &heads,
        &alice_key,
        "a.test",
        draft(&room_id, &alice, "m.room.join_rules", Some(""), serde_json::json!({"join_rule": "public"})),
    )
    .unwrap();
    land_local(&store, &heads, &publisher, join_rules);

    // make_join: build the unsigned prototype the way the federation route does.
    let prototype = compose::build_unsigned(
        &store,
        &heads,
        "b.test",
        draft(&room_id, &bob, "m.room.member", Some(bob.as_str()), serde_json::json!({"membership": "join"})),
    )
    .unwrap();

    // send_join: the joining server signs the prototype with its own key.
    let (bob_key, _der) = ember_federation::ServerSigningKey::generate("b_1").unwrap();
    let bob_signed = ember_model::sign::sign_event("b.test", bob_key.pair(), &prototype).unwrap();

    let (_, soft_failed) = land_local(&store, &heads, &publisher, bob_signed.clone());
    assert!(!soft_failed);

    assert_eq!(heads.parents_for_new(room_id.as_str()), vec![bob_signed.event_id.clone()]);
    let state = room::state_map(&store, room_id.as_str()).unwrap();
    assert_eq!(state.get(&("m.room.member".to_string(), bob.to_string())), Some(&bob_signed.event_id));
}

#[test]
fn scenario_3_child_event_commits_deeper_than_its_prev_event() {
    let (_dir, store, heads, key) = harness();
    let publisher = ember_vm::CommitPublisher::new();
    let room_id = room_id!("!room:a.test").to_owned();
    let alice = user_id!("@alice:a.test").to_owned();

    let create = compose::compose(
        &store,
        &heads,
        &key,
        "a.test",
        draft(&room_id, &alice, "m.room.create", Some(""), serde_json::json!({
            "creator": alice,
            "room_version": LOCAL_ROOM_VERSION.as_str(),
        })),
    )
    .unwrap();
    land_local(&store, &heads, &publisher, create);

    let alice_join = compose::compose(
        &store,
        &heads,
        &key,
        "a.test",
        draft(&room_id, &alice, "m.room.member", Some(alice.as_str()), serde_json::json!({"membership": "join"})),
    )
    .unwrap();
    let ancestor = alice_join.clone();
    let (_, ancestor_soft_failed) = land_local(&store, &heads, &publisher, alice_join);
    assert!(!ancestor_soft_failed);

    let child = compose::compose(
        &store,
        &heads,
        &key,
        "a.test",
        draft(&room_id, &alice, "m.room.message", None, serde_json::json!({"msgtype": "m.text", "body": "hi"})),
    )
    .unwrap();
    assert_eq!(child.prev_events.iter().cloned().collect::<Vec<_>>(), vec![ancestor.event_id.clone()]);
    let (_, child_soft_failed) = land_local(&store, &heads, &publisher, child.clone());
    assert!(!child_soft_failed);

    assert!(room::fetch_event(&store, &ancestor.event_id).unwrap().is_some());
    assert!(room::fetch_event(&store, &child.event_id).unwrap().is_some());
    assert!(u64::from(child.depth) > u64::from(ancestor.depth));
}

#[test]
fn scenario_4_tampered_signature_fails_verification_but_the_original_still_verifies() {
    let (_dir, store, heads, key) = harness();
    let room_id = room_id!("!room:a.test").to_owned();
    let alice = user_id!("@alice:a.test").to_owned();

    let create = compose::compose(
        &store,
        &heads,
        &key,
        "a.test",
        draft(&room_id, &alice, "m.room.create", Some(""), serde_json::json!({
            "creator": alice,
            "room_version": LOCAL_ROOM_VERSION.as_str(),
        })),
    )
    .unwrap();

    let mut public_key_map: PublicKeyMap = BTreeMap::new();
    let mut verify_keys = BTreeMap::new();
    verify_keys.insert(key.key_id(), ruma_common::serde::Base64::parse(key.public_key_base64()).unwrap());
    public_key_map.insert("a.test".to_string(), verify_keys);

    assert!(ember_model::sign::verify_event(&public_key_map, &create, &LOCAL_ROOM_VERSION).is_ok());

    let mut tampered = create.clone();
    let sig = tampered.signatures.get_mut("a.test").unwrap().values_mut().next().unwrap();
    let mut chars: Vec<char> = sig.chars().collect();
    chars[0] = if chars[0] == 'A' { 'B' } else { 'A' };
    *sig = chars.into_iter().collect();

    let result = ember_model::sign::verify_event(&public_key_map, &tampered, &LOCAL_ROOM_VERSION);
    assert!(result.is_err());
}

#[test]
fn scenario_5_event_authorized_by_stale_auth_events_soft_fails_against_its_real_parent() {
    let (_dir, store, heads, key) = harness();
    let publisher = ember_vm::CommitPublisher::new();
    let room_id = room_id!("!room:a.test").to_owned();
    let alice = user_id!("@alice:a.test").to_owned();
    let bob = user_id!("@bob:a.test").to_owned();

    let create = compose::compose(
        &store,
        &heads,
        &key,
        "a.test",
        draft(&room_id, &alice, "m.room.create", Some(""), serde_json::json!({
            "creator": alice,
            "room_version": LOCAL_ROOM_VERSION.as_str(),
        })),
    )
    .unwrap();
    land_local(&store, &heads, &publisher, create);

    let alice_join = compose::compose(
        &store,
        &heads,
        &key,
        "a.test",
        draft(&room_id, &alice, "m.room.member", Some(alice.as_str()), serde_json::json!({"membership": "join"})),
    )
    .unwrap();
    land_local(&store, &heads, &publisher, alice_join);

    let power_levels = compose::compose(
        &store,
        &heads,
        &key,
        "a.test",
        draft(&room_id, &alice, "m.room.power_levels", Some(""), serde_json::json!({
            "users": {alice.as_str(): 100},
            "users_default": 0,
            "events_default": 0,
            "state_default": 50,
            "ban": 50,
            "kick": 50,
            "redact": 50,
            "invite": 0,
        })),
    )
    .unwrap();
    land_local(&store, &heads, &publisher, power_levels);

    let bob_join = compose::compose(
        &store,
        &heads,
        &key,
        "a.test",
        draft(&room_id, &bob, "m.room.member", Some(bob.as_str()), serde_json::json!({"membership": "join"})),
    )
    .unwrap();
    land_local(&store, &heads, &publisher, bob_join.clone());

    // The DAG parent every subsequent event in this test references: the
    // room's frontier right after bob joined, before the kick below.
    let pre_kick_parent = bob_join.event_id.clone();

    // `auth_events` frozen at this point: bob still shows up as joined.
    let mut stale_auth_events: Vec<OwnedEventId> = {
        let state = room::state_map(&store, room_id.as_str()).unwrap();
        vec![
            state[&("m.room.create".to_string(), String::new())].clone(),
            state[&("m.room.power_levels".to_string(), String::new())].clone(),
            state[&("m.room.member".to_string(), alice.to_string())].clone(),
        ]
    };
    stale_auth_events.sort();
    stale_auth_events.dedup();

    let kick = compose::compose(
        &store,
        &heads,
        &key,
        "a.test",
        draft(&room_id, &alice, "m.room.member", Some(bob.as_str()), serde_json::json!({"membership": "leave"})),
    )
    .unwrap();
    let (_, kick_soft_failed) = land_local(&store, &heads, &publisher, kick.clone());
    assert!(!kick_soft_failed);
    assert_eq!(heads.parents_for_new(room_id.as_str()), vec![kick.event_id.clone()]);

    // A message whose real parent predates the kick: resolving state at its
    // actual parent (not the room's current global state, which already
    // reflects the kick by now) must show bob still joined, so this is
    // authorized despite landing after the kick.
    let pre_kick_message = build_message(&store, &room_id, &bob, "hello before the kick", vec![pre_kick_parent.clone()], stale_auth_events.clone());
    let (_, pre_kick_soft_failed) = land_local(&store, &heads, &publisher, pre_kick_message);
    assert!(!pre_kick_soft_failed, "state at the message's real parent predates the kick and must authorize it");

    // Same stale auth_events, but this one's real parent *is* the kick: its
    // resolved state shows bob already removed, so it must soft-fail.
    let post_kick_message = build_message(&store, &room_id, &bob, "hello after the kick", vec![kick.event_id.clone()], stale_auth_events);
    let (_, post_kick_soft_failed) = land_local(&store, &heads, &publisher, post_kick_message.clone());
    assert!(post_kick_soft_failed, "state at the message's real parent already reflects the kick and must soft-fail it");

    // Soft-failed events are still on disk, they just don't move state or heads.
    assert!(room::fetch_event(&store, &post_kick_message.event_id).unwrap().is_some());
    assert_eq!(heads.parents_for_new(room_id.as_str()), vec![kick.event_id.clone()]);
    let state = room::state_map(&store, room_id.as_str()).unwrap();
    assert_eq!(state.get(&("m.room.member".to_string(), bob.to_string())), Some(&kick.event_id));
}

#[test]
fn scenario_6_redaction_projects_stripped_content_without_mutating_the_original() {
    let (_dir, store, heads, key) = harness();
    let publisher = ember_vm::CommitPublisher::new();
    let room_id = room_id!("!room:a.test").to_owned();
    let alice = user_id!("@alice:a.test").to_owned();

    let create = compose::compose(
        &store,
        &heads,
        &key,
        "a.test",
        draft(&room_id, &alice, "m.room.create", Some(""), serde_json::json!({
            "creator": alice,
            "room_version": LOCAL_ROOM_VERSION.as_str(),
        })),
    )
    .unwrap();
    land_local(&store, &heads, &publisher, create);

    let alice_join = compose::compose(
        &store,
        &heads,
        &key,
        "a.test",
        draft(&room_id, &alice, "m.room.member", Some(alice.as_str()), serde_json::json!({"membership": "join"})),
    )
    .unwrap();
    land_local(&store, &heads, &publisher, alice_join);

    let power_levels = compose::compose(
        &store,
        &heads,
        &key,
        "a.test",
        draft(&room_id, &alice, "m.room.power_levels", Some(""), serde_json::json!({
            "users": {alice.as_str(): 100},
            "users_default": 0,
            "events_default": 0,
            "state_default": 50,
            "ban": 50,
            "kick": 50,
            "redact": 50,
            "invite": 0,
        })),
    )
    .unwrap();
    land_local(&store, &heads, &publisher, power_levels);

    let message = compose::compose(
        &store,
        &heads,
        &key,
        "a.test",
        draft(&room_id, &alice, "m.room.message", None, serde_json::json!({"msgtype": "m.text", "body": "oops"})),
    )
    .unwrap();
    land_local(&store, &heads, &publisher, message.clone());

    let auth_events: Vec<OwnedEventId> = {
        let state = room::state_map(&store, room_id.as_str()).unwrap();
        let mut ids = vec![
            state[&("m.room.create".to_string(), String::new())].clone(),
            state[&("m.room.power_levels".to_string(), String::new())].clone(),
            state[&("m.room.member".to_string(), alice.to_string())].clone(),
        ];
        ids.sort();
        ids.dedup();
        ids
    };
    let mut redaction = build_message(&store, &room_id, &alice, "", heads.parents_for_new(room_id.as_str()), auth_events);
    redaction.event_type = "m.room.redaction".to_string();
    redaction.content = serde_json::json!({});
    redaction.redacts = Some(message.event_id.clone());
    redaction.hashes.sha256 = ember_model::hash::content_hash(&redaction).unwrap();
    redaction.event_id = ember_model::hash::derive_event_id(&redaction, &LOCAL_ROOM_VERSION).unwrap();

    let (_, redaction_soft_failed) = land_local(&store, &heads, &publisher, redaction.clone());
    assert!(!redaction_soft_failed);

    let stored_message = room::fetch_event(&store, &message.event_id).unwrap().unwrap();
    assert_eq!(stored_message.event_id, message.event_id);
    assert_eq!(stored_message.content, message.content, "the stored original is never mutated by a redaction");

    let projected = ember_model::redact::redact_to_json(&stored_message, &LOCAL_ROOM_VERSION).unwrap();
    assert!(
        projected.get("content").is_none(),
        "m.room.message has no preserved content keys, so the redacted projection must carry none"
    );

    assert!(room::fetch_event(&store, &redaction.event_id).unwrap().is_some());
}

/// Build an `m.room.message` with explicit `prev_events`/`auth_events`
/// rather than deriving them from the room's current heads/state — used by
/// the scenarios that need an event whose claimed auth state and real DAG
/// parent deliberately diverge.
fn build_message(
    store: &Store,
    room_id: &OwnedRoomId,
    sender: &OwnedUserId,
    body: &str,
    prev_events: Vec<OwnedEventId>,
    auth_events: Vec<OwnedEventId>,
) -> Event {
    let depth = prev_events
        .iter()
        .filter_map(|id| room::fetch_event(store, id).ok().flatten())
        .map(|e| u64::from(e.depth))
        .max()
        .map(|d| d + 1)
        .unwrap_or(1);

    let mut event = Event {
        event_id: ember_model::event::placeholder_event_id(),
        room_id: room_id.clone(),
        sender: sender.clone(),
        origin: Some(server_name!("a.test").to_owned()),
        origin_server_ts: MilliSecondsSinceUnixEpoch::now(),
        event_type: "m.room.message".to_string(),
        state_key: None,
        content: serde_json::json!({"msgtype": "m.text", "body": body}),
        prev_events: SmallVec::from_vec(prev_events),
        auth_events: SmallVec::from_vec(auth_events),
        depth: UInt::try_from(depth).unwrap_or(UInt::MAX),
        hashes: EventHashes { sha256: String::new() },
        signatures: Default::default(),
        redacts: None,
        prev_state: Vec::new(),
        unsigned: serde_json::Map::new(),
    };
    event.hashes.sha256 = ember_model::hash::content_hash(&event).unwrap();
    event.event_id = ember_model::hash::derive_event_id(&event, &LOCAL_ROOM_VERSION).unwrap();
    event
}
