//! The in-flight de-duplication set guarding phase entry.
//!
//! Mirrors the original implementation's `vm::pipe`/`vm::fronts` globals
//! (`original_source/ircd/m_vm.cc`): a small set of event ids currently
//! mid-flight through the pipeline, consulted before phase 1 so two fibers
//! racing to process the same event (received from two federation peers at
//! once) don't both pay for signature verification before the phase-4
//! duplicate check could have rejected the second for free.
//!
//! Not a substitute for phase 4 (which checks the durable store): this set
//! only rules out *concurrent* duplicates of events not yet committed.

use std::collections::HashSet;

use parking_lot::Mutex;
use ruma_common::OwnedEventId;

/// RAII guard: removes the event id from the in-flight set on drop, so a
/// failure or early return never leaves the id stuck.
pub struct InFlightGuard<'a> {
    set: &'a InFlightSet,
    event_id: OwnedEventId,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.set.inner.lock().remove(&self.event_id);
    }
}

#[derive(Default)]
pub struct InFlightSet {
    inner: Mutex<HashSet<OwnedEventId>>,
}

impl InFlightSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to enter the pipeline for `event_id`. Returns `None` if another
    /// fiber is already processing it.
    pub fn enter(&self, event_id: &OwnedEventId) -> Option<InFlightGuard<'_>> {
        let mut inner = self.inner.lock();
        if !inner.insert(event_id.clone()) {
            return None;
        }
        drop(inner);
        Some(InFlightGuard { set: self, event_id: event_id.clone() })
    }

    pub fn contains(&self, event_id: &OwnedEventId) -> bool {
        self.inner.lock().contains(event_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ruma_common::owned_event_id;

    #[test]
    fn second_concurrent_entry_is_rejected() {
        let set = InFlightSet::new();
        let id = owned_event_id!("$a:example.org");
        let guard = set.enter(&id);
        assert!(guard.is_some());
        assert!(set.enter(&id).is_none());
    }

    #[test]
    fn dropping_the_guard_frees_the_slot() {
        let set = InFlightSet::new();
        let id = owned_event_id!("$a:example.org");
        {
            let _guard = set.enter(&id).unwrap();
            assert!(set.contains(&id));
        }
        assert!(!set.contains(&id));
        assert!(set.enter(&id).is_some());
    }
}
