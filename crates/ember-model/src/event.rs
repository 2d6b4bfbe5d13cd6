//! The signed event: an immutable mapping of fixed top-level keys.

use std::collections::BTreeMap;

use js_int::UInt;
use ruma_common::{MilliSecondsSinceUnixEpoch, OwnedEventId, OwnedRoomId, OwnedServerName, OwnedUserId};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::{ModelError, ModelResult};

/// Tuned `prev_events` vector: most events have exactly one parent.
pub type PrevEvents = SmallVec<[OwnedEventId; 1]>;

/// Tuned `auth_events` vector: average events cite three auth events.
pub type AuthEvents = SmallVec<[OwnedEventId; 3]>;

/// Hard protocol limit on a serialized event's size.
pub const MAX_PDU_BYTES: usize = 65_535;

/// Matrix server-server API limit on `prev_events` entries.
pub const MAX_PREV_EVENTS: usize = 20;

/// Matrix server-server API limit on `auth_events` entries.
pub const MAX_AUTH_EVENTS: usize = 10;

/// The `hashes` block: content-hash of the event, keyed by algorithm.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventHashes {
    pub sha256: String,
}

/// `server_name -> key_id -> base64(signature)`.
pub type Signatures = BTreeMap<String, BTreeMap<String, String>>;

/// Placeholder `event_id` for a wire PDU that omits the field entirely (room
/// versions >= 3). Overwritten by `ember-vm`'s well-formedness phase before
/// any other phase sees the event; never appears in a hash preimage since
/// `hash.rs`/`redact.rs` strip `event_id` before hashing.
pub fn placeholder_event_id() -> OwnedEventId {
    OwnedEventId::try_from("$pending:placeholder").expect("static event id is valid")
}

/// An immutable, signed event.
///
/// `event_id` is carried on the struct for convenience but is never trusted
/// at face value — callers that accept events from the wire must re-derive
/// it via [`crate::hash::derive_event_id`] and compare (see
/// `ember-vm`'s well-formedness phase). Room versions >= 3 omit `event_id`
/// from the wire entirely, hence `#[serde(default)]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    #[serde(default = "placeholder_event_id")]
    pub event_id: OwnedEventId,
    pub room_id: OwnedRoomId,
    pub sender: OwnedUserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<OwnedServerName>,
    pub origin_server_ts: MilliSecondsSinceUnixEpoch,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_key: Option<String>,
    pub content: serde_json::Value,
    pub prev_events: PrevEvents,
    pub auth_events: AuthEvents,
    pub depth: UInt,
    pub hashes: EventHashes,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub signatures: Signatures,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redacts: Option<OwnedEventId>,

    /// Legacy field some pre-v6 room versions still emit alongside
    /// `prev_events`: the state event ids being overridden. Accepted and
    /// round-tripped for wire compatibility; never populated on events this
    /// server authors for room versions that have dropped it.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub prev_state: Vec<OwnedEventId>,

    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub unsigned: serde_json::Map<String, serde_json::Value>,
}

impl Event {
    pub fn is_state_event(&self) -> bool {
        self.state_key.is_some()
    }

    pub fn is_create_event(&self) -> bool {
        self.event_type == "m.room.create" && self.prev_events.is_empty()
    }

    /// Phase 1 (well-formedness) shape checks that don't require crypto or
    /// the store: size, depth, and array-length invariants.
    pub fn validate_shape(&self, serialized_len: usize) -> ModelResult<()> {
        if serialized_len > MAX_PDU_BYTES {
            return Err(ModelError::TooLarge { limit: MAX_PDU_BYTES, actual: serialized_len });
        }
        if self.prev_events.len() > MAX_PREV_EVENTS {
            return Err(ModelError::Malformed(format!(
                "prev_events has {} entries, max is {MAX_PREV_EVENTS}",
                self.prev_events.len()
            )));
        }
        if self.auth_events.len() > MAX_AUTH_EVENTS {
            return Err(ModelError::Malformed(format!(
                "auth_events has {} entries, max is {MAX_AUTH_EVENTS}",
                self.auth_events.len()
            )));
        }
        if self.is_create_event() {
            if self.depth != UInt::from(1u32) {
                return Err(ModelError::Malformed("m.room.create must have depth 1".into()));
            }
        } else if self.depth < UInt::from(1u32) {
            return Err(ModelError::Malformed("depth must be >= 1 for non-create events".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ruma_common::owned_event_id;

    fn sample() -> Event {
        Event {
            event_id: owned_event_id!("$abc:example.org"),
            room_id: ruma_common::room_id!("!room:example.org").to_owned(),
            sender: ruma_common::user_id!("@alice:example.org").to_owned(),
            origin: Some(ruma_common::server_name!("example.org").to_owned()),
            origin_server_ts: MilliSecondsSinceUnixEpoch(UInt::from(1u32)),
            event_type: "m.room.message".into(),
            state_key: None,
            content: serde_json::json!({"body": "hi"}),
            prev_events: smallvec::smallvec![owned_event_id!("$parent:example.org")],
            auth_events: SmallVec::new(),
            depth: UInt::from(2u32),
            hashes: EventHashes { sha256: "x".into() },
            signatures: BTreeMap::new(),
            redacts: None,
            prev_state: Vec::new(),
            unsigned: serde_json::Map::new(),
        }
    }

    #[test]
    fn non_create_event_with_depth_one_is_valid() {
        let event = sample();
        assert!(event.validate_shape(100).is_ok());
    }

    #[test]
    fn oversized_event_is_rejected() {
        let event = sample();
        assert!(matches!(
            event.validate_shape(MAX_PDU_BYTES + 1),
            Err(ModelError::TooLarge { .. })
        ));
    }

    #[test]
    fn too_many_prev_events_is_rejected() {
        let mut event = sample();
        for i in 0..MAX_PREV_EVENTS {
            event.prev_events.push(
                ruma_common::OwnedEventId::try_from(format!("$p{i}:example.org")).unwrap(),
            );
        }
        assert!(matches!(event.validate_shape(100), Err(ModelError::Malformed(_))));
    }
}
