//! Signing and signature verification, delegated to `ruma-signatures` rather
//! than re-implemented — see `DESIGN.md` for why a hand-rolled verifier was
//! rejected.

use ruma_common::{CanonicalJsonObject, RoomVersionId};
use ruma_signatures::{Ed25519KeyPair, PublicKeyMap};

use crate::error::{ModelError, ModelResult};
use crate::event::Event;

fn to_canonical_object(event: &Event) -> ModelResult<CanonicalJsonObject> {
    let value = serde_json::to_value(event)?;
    let map = value
        .as_object()
        .cloned()
        .ok_or_else(|| ModelError::Malformed("event did not serialize to a JSON object".into()))?;
    Ok(ruma_common::canonical_json::try_from_json_map(map)?)
}

/// Sign an event in place with this server's key, adding an entry under
/// `signatures.<server_name>`.
pub fn sign_event(server_name: &str, key: &Ed25519KeyPair, event: &Event) -> ModelResult<Event> {
    let mut object = to_canonical_object(event)?;
    ruma_signatures::sign_json(server_name, key, &mut object)
        .map_err(|e| ModelError::BadSignature(e.to_string()))?;
    let value = serde_json::to_value(object)?;
    Ok(serde_json::from_value(value)?)
}

/// Verify every origin's signature plus the content hash, per
/// `ruma_signatures::verify_event`. `public_key_map` must already contain
/// the current verify keys for every server named in `signatures`.
pub fn verify_event(
    public_key_map: &PublicKeyMap,
    event: &Event,
    room_version: &RoomVersionId,
) -> ModelResult<ruma_signatures::Verified> {
    let object = to_canonical_object(event)?;
    ruma_signatures::verify_event(public_key_map, &object, room_version)
        .map_err(|e| ModelError::BadSignature(e.to_string()))
}
