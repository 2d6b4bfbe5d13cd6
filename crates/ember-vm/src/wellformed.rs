//! Phase 1: well-formedness. Parse the incoming JSON into an
//! [`ember_model::Event`] — identifier shape, required-key presence, and
//! key types are all enforced by `serde`/`ruma_common`'s identifier
//! newtypes during deserialization — then check the remaining shape
//! invariants (size, depth, array lengths) that aren't expressible in the
//! type itself.
//!
//! Room versions >= 3 carry no `event_id` on the wire at all, so the parsed
//! struct's `event_id` is a placeholder until this phase re-derives the
//! real one from the event's reference hash and overwrites it — every
//! later phase (the in-flight guard, the duplicate check, signing) only
//! ever sees the derived id, never the wire value.

use ember_model::Event;
use ember_store::Store;
use ruma_common::RoomVersionId;

use crate::error::{VmError, VmResult};
use crate::room;

/// Parse, shape-check, and re-derive the `event_id` of a raw PDU. `raw` is
/// the exact bytes as received (over the wire or from local storage) so the
/// size check matches what will actually be hashed/stored. Returns the
/// event alongside the room version used to derive its id, so the caller
/// doesn't need to look it up again.
pub fn parse_and_check(store: &Store, raw: &[u8]) -> VmResult<(Event, RoomVersionId)> {
    if raw.len() > ember_model::MAX_PDU_BYTES {
        return Err(VmError::Invalid(format!(
            "event is {} bytes, exceeds the {}-byte limit",
            raw.len(),
            ember_model::MAX_PDU_BYTES
        )));
    }

    let mut event: Event = serde_json::from_slice(raw).map_err(|e| VmError::Invalid(e.to_string()))?;
    event.validate_shape(raw.len()).map_err(VmError::from)?;

    let room_version = room::room_version(store, event.room_id.as_str(), &event)?;
    event.event_id = ember_model::hash::derive_event_id(&event, &room_version).map_err(VmError::from)?;

    Ok((event, room_version))
}
