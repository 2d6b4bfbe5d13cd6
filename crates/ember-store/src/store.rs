//! The embedded content-addressed store: a thin, typed wrapper over a
//! RocksDB handle exposing the column table from `SPEC_FULL.md` §4.4.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rocksdb::{ColumnFamilyDescriptor, Options, DB};

use crate::columns;
use crate::error::{StoreError, StoreResult};

/// Tuning knobs the caller (via `ember_common::config::StoreConfig` and
/// friends) can vary; kept separate from the raw `rocksdb::Options` so
/// callers never need to reach for the `rocksdb` crate directly.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub create_if_missing: bool,
    pub direct_io: bool,
    /// Read-ahead size in bytes applied to sequential iterators (the
    /// `room_events` backward scan on cold-start head derivation, notably).
    pub readahead_bytes: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self { create_if_missing: true, direct_io: false, readahead_bytes: 2 * 1024 * 1024 }
    }
}

/// Handle to the embedded store. Cheaply cloneable — `rocksdb::DB` is
/// already internally synchronized for concurrent column-family access, and
/// the VM's single-writer discipline (see `ember-vm`) is what actually
/// serializes commits, not a lock here.
#[derive(Clone)]
pub struct Store {
    db: Arc<DB>,
    next_event_idx: Arc<AtomicU64>,
    readahead_bytes: usize,
}

impl Store {
    pub fn open(path: impl AsRef<Path>, opts: &StoreOptions) -> StoreResult<Self> {
        let mut db_opts = Options::default();
        db_opts.create_if_missing(opts.create_if_missing);
        db_opts.create_missing_column_families(true);
        db_opts.set_use_direct_io_for_flush_and_compaction(opts.direct_io);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = columns::ALL
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect();

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        let next_event_idx = {
            let meta = cf_handle(&db, columns::META)?;
            let stored = db
                .get_cf(meta, columns::META_NEXT_EVENT_IDX)?
                .map(|bytes| {
                    let mut buf = [0u8; 8];
                    buf.copy_from_slice(&bytes[..8]);
                    u64::from_be_bytes(buf)
                })
                .unwrap_or(0);
            Arc::new(AtomicU64::new(stored))
        };

        Ok(Self { db: Arc::new(db), next_event_idx, readahead_bytes: opts.readahead_bytes })
    }

    pub fn cf(&self, name: &'static str) -> StoreResult<&rocksdb::ColumnFamily> {
        cf_handle(&self.db, name)
    }

    pub fn db(&self) -> &DB {
        &self.db
    }

    /// Reserve the next `event_idx`. Durability of the counter itself is the
    /// caller's responsibility — it's written as part of the same batch
    /// that commits the event (see `batch::CommitBatch::reserve_event_idx`),
    /// so a crash between reservation and commit just means the idx is
    /// skipped, not reused.
    pub fn reserve_event_idx(&self) -> u64 {
        self.next_event_idx.fetch_add(1, Ordering::AcqRel)
    }

    pub fn get_cf(&self, cf: &'static str, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        let handle = self.cf(cf)?;
        Ok(self.db.get_cf(handle, key)?)
    }

    /// Point read with readahead/fill-cache hints applied, for the
    /// sequential scans the head tracker and backfill perform.
    pub fn get_cf_prefetched(&self, cf: &'static str, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        let handle = self.cf(cf)?;
        let mut read_opts = rocksdb::ReadOptions::default();
        read_opts.set_readahead_size(self.readahead_bytes);
        Ok(self.db.get_cf_opt(handle, key, &read_opts)?)
    }

    /// Forward iterator over every key with the given prefix.
    pub fn prefix_iter(
        &self,
        cf: &'static str,
        prefix: &[u8],
    ) -> StoreResult<impl Iterator<Item = StoreResult<(Box<[u8]>, Box<[u8]>)>> + '_> {
        let handle = self.cf(cf)?;
        let mut read_opts = rocksdb::ReadOptions::default();
        read_opts.set_readahead_size(self.readahead_bytes);
        let prefix = prefix.to_vec();
        let iter = self.db.iterator_cf_opt(
            handle,
            read_opts,
            rocksdb::IteratorMode::From(&prefix, rocksdb::Direction::Forward),
        );
        let prefix_for_filter = prefix.clone();
        Ok(iter
            .take_while(move |item| match item {
                Ok((key, _)) => key.starts_with(&prefix_for_filter),
                Err(_) => true,
            })
            .map(|item| item.map_err(StoreError::from)))
    }

    /// Every key with the given prefix, in reverse order. Used by the head
    /// tracker's cold-start scan (`room_events`, descending by depth).
    pub fn prefix_iter_rev(&self, cf: &'static str, prefix: &[u8]) -> StoreResult<Vec<(Box<[u8]>, Box<[u8]>)>> {
        let mut items: Vec<_> = self.prefix_iter(cf, prefix)?.collect::<StoreResult<_>>()?;
        items.reverse();
        Ok(items)
    }
}

fn cf_handle<'a>(db: &'a DB, name: &'static str) -> StoreResult<&'a rocksdb::ColumnFamily> {
    db.cf_handle(name).ok_or(StoreError::UnknownColumn(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_temp() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path(), &StoreOptions::default()).unwrap();
        (dir, store)
    }

    #[test]
    fn reserved_event_idx_increments() {
        let (_dir, store) = open_temp();
        let a = store.reserve_event_idx();
        let b = store.reserve_event_idx();
        assert_eq!(b, a + 1);
    }

    #[test]
    fn prefix_iteration_only_yields_matching_keys() {
        let (_dir, store) = open_temp();
        let cf = store.cf(columns::ROOM_HEAD).unwrap();
        let mut batch = rocksdb::WriteBatch::default();
        batch.put_cf(cf, crate::keys::room_head_key("!a:x", "$1"), [0u8]);
        batch.put_cf(cf, crate::keys::room_head_key("!a:x", "$2"), [0u8]);
        batch.put_cf(cf, crate::keys::room_head_key("!b:x", "$3"), [0u8]);
        store.db.write(batch).unwrap();

        let prefix = crate::keys::room_head_prefix("!a:x");
        let items: Vec<_> = store.prefix_iter(columns::ROOM_HEAD, &prefix).unwrap().collect::<StoreResult<_>>().unwrap();
        assert_eq!(items.len(), 2);
    }
}
