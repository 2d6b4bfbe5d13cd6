//! An adapter from [`ember_model::Event`] to `ruma_state_res::Event` —
//! state resolution's own event view, which wants a typed `event_type`
//! and raw (unparsed) content rather than the `serde_json::Value` our
//! store keeps. Precomputed once at construction, then cheaply `Clone`d
//! (via `Arc`) into every state set / auth chain the resolver touches,
//! matching the shape reference `Pdu` adapters in the ecosystem use.

use std::sync::Arc;

use ruma_common::{MilliSecondsSinceUnixEpoch, OwnedEventId, RoomId, UserId};
use ruma_events::TimelineEventType;
use ruma_state_res::Event;
use serde_json::value::RawValue as RawJsonValue;

use crate::error::{VmError, VmResult};

struct Inner {
    event: ember_model::Event,
    event_type: TimelineEventType,
    content: Box<RawJsonValue>,
}

/// Cheaply cloneable wrapper around a committed or staged event, used only
/// during state resolution / auth replay (phases 6-8). Never the
/// long-lived representation of an event — that's `ember_model::Event`.
#[derive(Clone)]
pub struct PduEvent(Arc<Inner>);

impl PduEvent {
    pub fn new(event: ember_model::Event) -> VmResult<Self> {
        let event_type = TimelineEventType::from(event.event_type.clone());
        let content = RawJsonValue::from_string(event.content.to_string())
            .map_err(|e| VmError::Invalid(format!("event content is not valid JSON: {e}")))?;
        Ok(Self(Arc::new(Inner { event, event_type, content })))
    }

    pub fn event(&self) -> &ember_model::Event {
        &self.0.event
    }

    pub fn into_event(self) -> ember_model::Event {
        match Arc::try_unwrap(self.0) {
            Ok(inner) => inner.event,
            Err(shared) => shared.event.clone(),
        }
    }
}

impl Event for PduEvent {
    type Id = OwnedEventId;

    fn event_id(&self) -> &Self::Id {
        &self.0.event.event_id
    }

    fn room_id(&self) -> Option<&RoomId> {
        Some(&self.0.event.room_id)
    }

    fn sender(&self) -> &UserId {
        &self.0.event.sender
    }

    fn origin_server_ts(&self) -> MilliSecondsSinceUnixEpoch {
        self.0.event.origin_server_ts
    }

    fn event_type(&self) -> &TimelineEventType {
        &self.0.event_type
    }

    fn content(&self) -> &RawJsonValue {
        &self.0.content
    }

    fn state_key(&self) -> Option<&str> {
        self.0.event.state_key.as_deref()
    }

    fn prev_events(&self) -> Box<dyn DoubleEndedIterator<Item = &Self::Id> + '_> {
        Box::new(self.0.event.prev_events.iter())
    }

    fn auth_events(&self) -> Box<dyn DoubleEndedIterator<Item = &Self::Id> + '_> {
        Box::new(self.0.event.auth_events.iter())
    }

    fn redacts(&self) -> Option<&Self::Id> {
        self.0.event.redacts.as_ref()
    }

    fn rejected(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_model::event::EventHashes;
    use js_int::UInt;
    use ruma_common::{owned_event_id, room_id, user_id};
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
            content: serde_json::json!({"body": "hi"}),
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
    fn adapter_exposes_event_type_and_content() {
        let pdu = PduEvent::new(sample()).unwrap();
        assert_eq!(pdu.event_type().to_string(), "m.room.message");
        assert_eq!(pdu.content().get(), r#"{"body":"hi"}"#);
    }

    #[test]
    fn round_trips_back_into_ember_model_event() {
        let original = sample();
        let pdu = PduEvent::new(original.clone()).unwrap();
        assert_eq!(pdu.into_event().event_id, original.event_id);
    }
}
