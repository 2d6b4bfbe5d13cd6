//! Phase 7: state resolution. Computes the room state at an event from
//! the states at each of its `prev_events` parents. By the time this runs,
//! phase 5 has already pulled every required auth-chain ancestor into the
//! store, so every lookup here is a synchronous point read — no
//! suspension, matching `ruma_state_res::resolve`'s synchronous signature.
//!
//! Room versions 2 and up delegate entirely to the crate's iterative
//! auth-difference algorithm. Version 1 predates it; `ruma_state_res`
//! itself exposes no v1 resolver; a v1 room whose DAG actually forks is a
//! degenerate case the wire protocol makes vanishingly rare in practice,
//! so we fall back to the most recently advanced candidate set rather
//! than hand-rolling the legacy linear rule.

use std::collections::{HashMap, HashSet};

use ember_store::Store;
use ruma_common::{OwnedEventId, RoomVersionId};
use ruma_events::StateEventType;
use ruma_state_res::{resolve, StateMap};

use crate::error::{VmError, VmResult};
use crate::pdu_event::PduEvent;
use crate::room;

/// A room's state at some point in its history: `(type, state_key) -> event_id`.
pub type ResolvedState = HashMap<(String, String), OwnedEventId>;

/// Resolve state across the candidate sets at an event's parents. A single
/// parent (the overwhelmingly common case — a linear timeline) short-circuits
/// without invoking the resolver at all.
pub fn resolve_state(
    store: &Store,
    room_version: &RoomVersionId,
    state_sets: &[ResolvedState],
) -> VmResult<ResolvedState> {
    match state_sets.len() {
        0 => Ok(HashMap::new()),
        1 => Ok(state_sets[0].clone()),
        _ => resolve_conflicted(store, room_version, state_sets),
    }
}

fn resolve_conflicted(
    store: &Store,
    room_version: &RoomVersionId,
    state_sets: &[ResolvedState],
) -> VmResult<ResolvedState> {
    let rules = room_version
        .rules()
        .ok_or_else(|| VmError::StateRes(format!("room version {room_version} has no known rules")))?;

    let Some(state_res_rules) = rules.state_res.v2_rules() else {
        return Ok(state_sets.last().cloned().unwrap_or_default());
    };

    let get = |id: &OwnedEventId| -> Option<PduEvent> {
        room::fetch_event(store, id).ok().flatten().and_then(|e| PduEvent::new(e).ok())
    };

    let typed_sets: Vec<StateMap<OwnedEventId>> = state_sets
        .iter()
        .map(|set| {
            set.iter()
                .map(|((event_type, state_key), id)| {
                    let event_type: StateEventType = event_type.as_str().into();
                    ((event_type, state_key.clone()), id.clone())
                })
                .collect()
        })
        .collect();

    let mut auth_chain_sets = Vec::with_capacity(typed_sets.len());
    for set in &typed_sets {
        let mut chain = HashSet::new();
        for id in set.values() {
            if let Some(pdu) = get(id) {
                collect_auth_chain(&pdu, &get, &mut chain);
            }
        }
        auth_chain_sets.push(chain);
    }

    let resolved = resolve(
        &rules.authorization,
        state_res_rules,
        &typed_sets,
        auth_chain_sets,
        get,
        |_conflicted| conflicted_state_subgraph(),
    )
    .map_err(|e| VmError::StateRes(e.to_string()))?;

    Ok(resolved.into_iter().map(|((t, k), id)| ((t.to_string(), k), id)).collect())
}

/// Walks an event's `auth_events` transitively, recording every ancestor
/// (not the event itself) — mirrors the auth-chain DFS state resolution
/// needs to seed the resolver's conflict set.
fn collect_auth_chain(
    pdu: &PduEvent,
    get: &impl Fn(&OwnedEventId) -> Option<PduEvent>,
    out: &mut HashSet<OwnedEventId>,
) {
    let mut stack: Vec<OwnedEventId> = pdu.event().auth_events.iter().cloned().collect();
    while let Some(id) = stack.pop() {
        if out.contains(&id) {
            continue;
        }
        out.insert(id.clone());
        if let Some(next) = get(&id) {
            stack.extend(next.event().auth_events.iter().cloned());
        }
    }
}

/// The optional `consider_conflicted_state_subgraph` shortcut. We don't
/// implement it: returning `None` tells the resolver to fall back to its
/// own full computation, which is always correct, just not the fast path.
fn conflicted_state_subgraph() -> Option<HashSet<OwnedEventId>> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_parent_short_circuits_without_resolver() {
        let store_dir = tempfile::tempdir().unwrap();
        let store = Store::open(store_dir.path(), &ember_store::StoreOptions::default()).unwrap();
        let mut set = HashMap::new();
        set.insert(
            ("m.room.create".to_string(), String::new()),
            ruma_common::owned_event_id!("$create:example.org"),
        );
        let resolved = resolve_state(&store, &RoomVersionId::V10, std::slice::from_ref(&set)).unwrap();
        assert_eq!(resolved, set);
    }

    #[test]
    fn empty_state_sets_resolve_to_empty() {
        let store_dir = tempfile::tempdir().unwrap();
        let store = Store::open(store_dir.path(), &ember_store::StoreOptions::default()).unwrap();
        let resolved = resolve_state(&store, &RoomVersionId::V10, &[]).unwrap();
        assert!(resolved.is_empty());
    }
}
