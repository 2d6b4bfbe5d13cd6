//! The bounded inbound staging queue. Producers (the federation receiver,
//! the client API) suspend when it's full rather than growing it
//! unboundedly — the backpressure mechanism named in `SPEC_FULL.md` §4.3.
//!
//! Backed directly by `tokio::sync::mpsc`'s bounded channel: `ember_fiber`
//! wraps the reactor's suspension contract (timers, deadlines) but doesn't
//! provide its own channel type, and a bounded `mpsc` already gives exactly
//! the "suspend the sender when full" semantics this queue needs.

use ember_model::Event;
use tokio::sync::mpsc;

use crate::error::{VmError, VmResult};

pub struct StagingQueue {
    tx: mpsc::Sender<Event>,
    rx: parking_lot::Mutex<mpsc::Receiver<Event>>,
}

impl StagingQueue {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        Self { tx, rx: parking_lot::Mutex::new(rx) }
    }

    /// Submit an event, suspending the caller while the queue is full.
    pub async fn submit(&self, event: Event) -> VmResult<()> {
        self.tx.send(event).await.map_err(|_| VmError::Overloaded("staging queue closed".into()))
    }

    /// Non-blocking submit used where the caller must not suspend (e.g. a
    /// reactor callback) — surfaces `Overloaded` immediately instead of
    /// queuing the wait.
    pub fn try_submit(&self, event: Event) -> VmResult<()> {
        self.tx.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => VmError::Overloaded("staging queue full".into()),
            mpsc::error::TrySendError::Closed(_) => VmError::Overloaded("staging queue closed".into()),
        })
    }

    /// Receive the next staged event. `None` once every sender has dropped.
    pub async fn recv(&self) -> Option<Event> {
        self.rx.lock().recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_model::event::EventHashes;
    use ruma_common::{owned_event_id, room_id, user_id, MilliSecondsSinceUnixEpoch};
    use js_int::UInt;
    use smallvec::SmallVec;
    use std::collections::BTreeMap;

    fn sample() -> Event {
        Event {
            event_id: owned_event_id!("$a:example.org"),
            room_id: room_id!("!room:example.org").to_owned(),
            sender: user_id!("@alice:example.org").to_owned(),
            origin: None,
            origin_server_ts: MilliSecondsSinceUnixEpoch(UInt::from(1u32)),
            event_type: "m.room.message".into(),
            state_key: None,
            content: serde_json::json!({}),
            prev_events: SmallVec::new(),
            auth_events: SmallVec::new(),
            depth: UInt::from(2u32),
            hashes: EventHashes { sha256: String::new() },
            signatures: BTreeMap::new(),
            redacts: None,
            prev_state: Vec::new(),
            unsigned: serde_json::Map::new(),
        }
    }

    #[tokio::test]
    async fn submitted_event_is_received_in_order() {
        let queue = StagingQueue::new(4);
        queue.submit(sample()).await.unwrap();
        let received = queue.recv().await.unwrap();
        assert_eq!(received.event_id, sample().event_id);
    }

    #[test]
    fn try_submit_reports_overloaded_when_full() {
        let queue = StagingQueue::new(1);
        queue.try_submit(sample()).unwrap();
        assert!(matches!(queue.try_submit(sample()), Err(VmError::Overloaded(_))));
    }
}
