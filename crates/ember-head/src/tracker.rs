//! The frontier (head) tracker: `map<event_id, depth>` of accepted events
//! with no accepted descendant, per room.

use std::collections::{BTreeSet, HashMap, HashSet};

use ember_store::{columns, keys, Store};
use ruma_common::OwnedEventId;

use crate::error::{HeadError, HeadResult};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct HeadEntry {
    depth: u64,
    event_idx: u64,
    event_id: OwnedEventId,
}

#[derive(Default)]
struct RoomHeads {
    /// Ordered by `(depth, event_idx)` so `top()` is the last element.
    by_depth: BTreeSet<HeadEntry>,
    by_id: HashMap<OwnedEventId, (u64, u64)>,
}

impl RoomHeads {
    fn insert(&mut self, event_id: OwnedEventId, depth: u64, event_idx: u64) {
        self.by_id.insert(event_id.clone(), (depth, event_idx));
        self.by_depth.insert(HeadEntry { depth, event_idx, event_id });
    }

    fn remove(&mut self, event_id: &OwnedEventId) {
        if let Some((depth, event_idx)) = self.by_id.remove(event_id) {
            self.by_depth.remove(&HeadEntry { depth, event_idx, event_id: event_id.clone() });
        }
    }

    fn top(&self) -> Option<(&OwnedEventId, u64, u64)> {
        self.by_depth.iter().next_back().map(|e| (&e.event_id, e.depth, e.event_idx))
    }
}

/// Tracks, for every room, the set of committed events with no committed
/// child. Guarded by a plain sync `RwLock` rather than the fiber runtime's
/// async `SharedMutex`: head-set operations never block on I/O, so taking
/// the lock never suspends a fiber.
pub struct HeadTracker {
    rooms: parking_lot::RwLock<HashMap<String, RoomHeads>>,
}

impl HeadTracker {
    pub fn new() -> Self {
        Self { rooms: parking_lot::RwLock::new(HashMap::new()) }
    }

    /// Greatest-depth head, tie-broken by largest `event_idx`.
    pub fn top(&self, room_id: &str) -> Option<(OwnedEventId, u64, u64)> {
        let rooms = self.rooms.read();
        rooms.get(room_id).and_then(|r| r.top()).map(|(id, d, i)| (id.clone(), d, i))
    }

    /// Snapshot of current head ids, used as `prev_events` for a new local event.
    pub fn parents_for_new(&self, room_id: &str) -> Vec<OwnedEventId> {
        let rooms = self.rooms.read();
        rooms.get(room_id).map(|r| r.by_id.keys().cloned().collect()).unwrap_or_default()
    }

    /// Remove `parents` from the head set, insert `event_id`.
    pub fn advance(&self, room_id: &str, event_id: OwnedEventId, depth: u64, event_idx: u64, parents: &[OwnedEventId]) {
        let mut rooms = self.rooms.write();
        let heads = rooms.entry(room_id.to_string()).or_default();
        for parent in parents {
            heads.remove(parent);
        }
        heads.insert(event_id, depth, event_idx);
    }

    /// Cold-start derivation: scan `room_events` backwards, subtract every
    /// referenced parent, and seed the in-memory set from what's left.
    pub fn fetch(&self, store: &Store, room_id: &str) -> HeadResult<()> {
        let prefix = keys::room_events_prefix(room_id);
        let entries = store.prefix_iter_rev(columns::ROOM_EVENTS, &prefix)?;

        if entries.is_empty() {
            return Ok(());
        }

        let mut candidates: Vec<(OwnedEventId, u64, u64)> = Vec::with_capacity(entries.len());
        let mut referenced: HashSet<OwnedEventId> = HashSet::new();

        for (key, _state_root) in &entries {
            let event_idx = keys::decode_event_idx_key(&key[key.len() - 8..]);
            let depth = {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(&key[key.len() - 16..key.len() - 8]);
                u64::from_be_bytes(buf)
            };

            let idx_key = keys::event_idx_key(event_idx);
            let json = store
                .get_cf(columns::EVENT_JSON, &idx_key)?
                .ok_or(HeadError::MissingEventJson(event_idx))?;
            let event: ember_model::Event = serde_json::from_slice(&json)
                .map_err(|source| HeadError::CorruptEventJson { idx: event_idx, source })?;

            for parent in &event.prev_events {
                referenced.insert(parent.clone());
            }
            candidates.push((event.event_id.clone(), depth, event_idx));
        }

        let mut rooms = self.rooms.write();
        let heads = rooms.entry(room_id.to_string()).or_default();
        for (event_id, depth, event_idx) in candidates {
            if !referenced.contains(&event_id) {
                heads.insert(event_id, depth, event_idx);
            }
        }

        if heads.by_id.is_empty() {
            return Err(HeadError::EmptyHeadForNonEmptyRoom(room_id.to_string()));
        }

        Ok(())
    }
}

impl Default for HeadTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ruma_common::owned_event_id;

    #[test]
    fn advance_removes_parents_and_adds_child() {
        let tracker = HeadTracker::new();
        let parent = owned_event_id!("$parent:x");
        tracker.advance("!room:x", parent.clone(), 1, 1, &[]);
        assert_eq!(tracker.parents_for_new("!room:x"), vec![parent.clone()]);

        let child = owned_event_id!("$child:x");
        tracker.advance("!room:x", child.clone(), 2, 2, &[parent.clone()]);
        assert_eq!(tracker.parents_for_new("!room:x"), vec![child.clone()]);
    }

    #[test]
    fn top_breaks_ties_on_event_idx() {
        let tracker = HeadTracker::new();
        tracker.advance("!room:x", owned_event_id!("$a:x"), 5, 10, &[]);
        tracker.advance("!room:x", owned_event_id!("$b:x"), 5, 11, &[]);
        let (top_id, depth, idx) = tracker.top("!room:x").unwrap();
        assert_eq!(top_id, owned_event_id!("$b:x"));
        assert_eq!(depth, 5);
        assert_eq!(idx, 11);
    }
}
