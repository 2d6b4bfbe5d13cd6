//! In-process publish/subscribe for newly committed events — the
//! replacement for legacy global hook registries named in `SPEC_FULL.md`
//! §9: components that want to react to commits (a `/sync` long-poll, a
//! metrics sink) register a receiver at startup rather than the core
//! looking anything up by string at commit time.

use std::sync::Arc;

use tokio::sync::broadcast;

/// Bounded so a stalled subscriber can only ever lag, never backpressure
/// the commit path itself — `tokio::sync::broadcast` drops the oldest
/// unread message for a lagging receiver rather than blocking the sender.
const CHANNEL_CAPACITY: usize = 1024;

#[derive(Clone)]
pub struct CommitPublisher {
    tx: broadcast::Sender<Arc<ember_model::Event>>,
}

impl CommitPublisher {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<ember_model::Event>> {
        self.tx.subscribe()
    }

    /// Broadcast a newly committed event. A send with no subscribers
    /// isn't an error — nothing was listening yet, which is fine.
    pub fn publish(&self, event: Arc<ember_model::Event>) {
        let _ = self.tx.send(event);
    }
}

impl Default for CommitPublisher {
    fn default() -> Self {
        Self::new()
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

    fn sample() -> ember_model::Event {
        ember_model::Event {
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

    #[test]
    fn subscriber_receives_published_event() {
        let publisher = CommitPublisher::new();
        let mut rx = publisher.subscribe();
        publisher.publish(Arc::new(sample()));
        let received = rx.try_recv().unwrap();
        assert_eq!(received.event_id, sample().event_id);
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let publisher = CommitPublisher::new();
        publisher.publish(Arc::new(sample()));
    }
}
