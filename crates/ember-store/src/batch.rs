//! Atomic multi-column commit batch — the only way events enter the store.
//!
//! One `CommitBatch` backs exactly one VM phase-9 commit: the raw event
//! bytes, the `event_id -> event_idx` mapping, every secondary index, and
//! the head-set update all land in a single `rocksdb::WriteBatch`, so a
//! crash mid-commit can never leave a secondary index pointing at a missing
//! `event_idx` (the invariant `SPEC_FULL.md` §4.4 requires).

use ruma_common::OwnedEventId;

use crate::columns;
use crate::error::StoreResult;
use crate::keys;
use crate::store::Store;

pub struct CommitBatch<'a> {
    store: &'a Store,
    batch: rocksdb::WriteBatch,
    event_idx: u64,
}

impl<'a> CommitBatch<'a> {
    /// Start a batch for the given (already-reserved) `event_idx`.
    pub fn new(store: &'a Store, event_idx: u64) -> Self {
        Self { store, batch: rocksdb::WriteBatch::default(), event_idx }
    }

    pub fn event_idx(&self) -> u64 {
        self.event_idx
    }

    /// Persist the event counter so a restart doesn't reuse `event_idx`
    /// values below this one.
    pub fn advance_idx_counter(&mut self) -> StoreResult<()> {
        let meta = self.store.cf(columns::META)?;
        self.batch.put_cf(meta, columns::META_NEXT_EVENT_IDX, (self.event_idx + 1).to_be_bytes());
        Ok(())
    }

    /// `event_json`, `event_idx` (id -> idx), and the per-field columns.
    pub fn insert_event(
        &mut self,
        event_id: &OwnedEventId,
        room_id: &str,
        sender: &str,
        event_type: &str,
        canonical_json: &[u8],
    ) -> StoreResult<()> {
        let idx_key = keys::event_idx_key(self.event_idx);

        let event_json = self.store.cf(columns::EVENT_JSON)?;
        self.batch.put_cf(event_json, idx_key, canonical_json);

        let event_idx_col = self.store.cf(columns::EVENT_IDX)?;
        self.batch.put_cf(event_idx_col, event_id.as_bytes(), idx_key);

        let event_room = self.store.cf(columns::EVENT_ROOM)?;
        self.batch.put_cf(event_room, idx_key, room_id.as_bytes());

        let event_sender = self.store.cf(columns::EVENT_SENDER)?;
        self.batch.put_cf(event_sender, idx_key, sender.as_bytes());

        let event_type_col = self.store.cf(columns::EVENT_TYPE)?;
        self.batch.put_cf(event_type_col, idx_key, event_type.as_bytes());

        Ok(())
    }

    /// `room_events`: ordered by `(room_id, depth, event_idx)`.
    pub fn insert_room_events(&mut self, room_id: &str, depth: u64, state_root_digest: &[u8]) -> StoreResult<()> {
        let cf = self.store.cf(columns::ROOM_EVENTS)?;
        let key = keys::room_events_key(room_id, depth, self.event_idx);
        self.batch.put_cf(cf, key, state_root_digest);
        Ok(())
    }

    /// `room_state`: only called for state events not flagged `soft_failed`.
    pub fn set_room_state(&mut self, room_id: &str, event_type: &str, state_key: &str) -> StoreResult<()> {
        let cf = self.store.cf(columns::ROOM_STATE)?;
        let key = keys::room_state_key(room_id, event_type, state_key);
        self.batch.put_cf(cf, key, keys::event_idx_key(self.event_idx));
        Ok(())
    }

    /// `room_joined`: only called for `m.room.member` events.
    pub fn set_room_joined(&mut self, room_id: &str, origin: &str, user_id: &str) -> StoreResult<()> {
        let cf = self.store.cf(columns::ROOM_JOINED)?;
        let key = keys::room_joined_key(room_id, origin, user_id);
        self.batch.put_cf(cf, key, keys::event_idx_key(self.event_idx));
        Ok(())
    }

    pub fn remove_room_joined(&mut self, room_id: &str, origin: &str, user_id: &str) -> StoreResult<()> {
        let cf = self.store.cf(columns::ROOM_JOINED)?;
        let key = keys::room_joined_key(room_id, origin, user_id);
        self.batch.delete_cf(cf, key);
        Ok(())
    }

    /// `state_node`: a resolved state snapshot keyed by its digest, shared
    /// across every event whose resolved state hashes to the same value.
    /// Idempotent — callers don't need to check existence first, RocksDB
    /// simply overwrites with byte-identical content.
    pub fn insert_state_node(&mut self, root_id: &[u8], serialized_state: &[u8]) -> StoreResult<()> {
        let cf = self.store.cf(columns::STATE_NODE)?;
        self.batch.put_cf(cf, root_id, serialized_state);
        Ok(())
    }

    /// Advance the head set: drop this event's parents, add this event.
    pub fn advance_head(&mut self, room_id: &str, event_id: &str, parents: &[OwnedEventId]) -> StoreResult<()> {
        let cf = self.store.cf(columns::ROOM_HEAD)?;
        for parent in parents {
            self.batch.delete_cf(cf, keys::room_head_key(room_id, parent.as_str()));
        }
        self.batch.put_cf(cf, keys::room_head_key(room_id, event_id), keys::event_idx_key(self.event_idx));
        Ok(())
    }

    pub fn commit(self) -> StoreResult<()> {
        self.store.db().write(self.batch)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Store, StoreOptions};
    use ruma_common::owned_event_id;

    #[test]
    fn commit_writes_every_column_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path(), &StoreOptions::default()).unwrap();

        let idx = store.reserve_event_idx();
        let event_id = owned_event_id!("$abc:example.org");
        let mut batch = CommitBatch::new(&store, idx);
        batch.advance_idx_counter().unwrap();
        batch.insert_event(&event_id, "!room:x", "@alice:x", "m.room.message", b"{}").unwrap();
        batch.insert_room_events("!room:x", 2, b"root").unwrap();
        batch.advance_head("!room:x", event_id.as_str(), &[]).unwrap();
        batch.commit().unwrap();

        let idx_key = store.get_cf(columns::EVENT_IDX, event_id.as_bytes()).unwrap();
        assert!(idx_key.is_some());
        let json = store.get_cf(columns::EVENT_JSON, &keys::event_idx_key(idx)).unwrap();
        assert_eq!(json.unwrap(), b"{}");
    }
}
