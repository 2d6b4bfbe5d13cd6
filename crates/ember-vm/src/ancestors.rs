//! Phase 5: ancestor fetch. Phases 6-8 assume every `prev_events`/
//! `auth_events` ancestor is already committed and readable from the
//! store without suspension — this phase is what makes that true,
//! walking the transitive closure over federation one hop at a time.
//!
//! An ancestor fetched this way is never trusted on the wire alone: the
//! caller (`pipeline.rs`) re-runs each one through phases 1-9 like any
//! other inbound event before depending on it.

use std::collections::HashSet;

use ember_federation::FederationClient;
use ember_store::Store;
use ruma_common::OwnedEventId;

use crate::error::{VmError, VmResult};
use crate::room;

/// Walk the transitive closure of `ids` over `prev_events ∪ auth_events`,
/// fetching from `origin` whatever isn't already committed locally, up to
/// `depth_budget` hops. Returns the missing ancestors' raw JSON, in an
/// order the caller can safely replay bottom-up (each entry only
/// references ancestors earlier in the list or already in the store).
pub async fn ensure_ancestors(
    store: &Store,
    federation: &FederationClient,
    origin: &str,
    ids: &[OwnedEventId],
    depth_budget: u32,
) -> VmResult<Vec<serde_json::Value>> {
    let mut fetched = Vec::new();
    let mut frontier: Vec<OwnedEventId> = ids.to_vec();
    let mut seen: HashSet<OwnedEventId> = HashSet::new();
    let mut hops = 0u32;

    while let Some(id) = frontier.pop() {
        if !seen.insert(id.clone()) {
            continue;
        }
        if room::event_idx_for(store, &id)?.is_some() {
            continue;
        }
        if hops >= depth_budget {
            return Err(VmError::FetchFailed(format!(
                "ancestor fetch depth budget ({depth_budget}) exhausted before reaching {id}"
            )));
        }
        hops += 1;

        let raw = fetch_one(federation, origin, &id).await?;
        frontier.extend(extract_ids(&raw, "prev_events"));
        frontier.extend(extract_ids(&raw, "auth_events"));
        fetched.push(raw);
    }

    // Replay order: children-first discovery, so reverse to get
    // ancestors-first — each event's own ancestors were pushed after it
    // and so sit later in `fetched`.
    fetched.reverse();
    Ok(fetched)
}

async fn fetch_one(federation: &FederationClient, origin: &str, event_id: &OwnedEventId) -> VmResult<serde_json::Value> {
    let resp = federation
        .get_event(origin, event_id.as_str())
        .await
        .map_err(|e| VmError::FetchFailed(format!("fetching {event_id} from {origin} failed: {e}")))?;

    resp.get("pdus")
        .and_then(|p| p.as_array())
        .and_then(|arr| arr.first())
        .cloned()
        .ok_or_else(|| VmError::FetchFailed(format!("{origin} returned no pdus for {event_id}")))
}

fn extract_ids(raw: &serde_json::Value, field: &str) -> Vec<OwnedEventId> {
    raw.get(field)
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str()).filter_map(|s| OwnedEventId::try_from(s).ok()).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_ids_skips_malformed_entries() {
        let raw = serde_json::json!({"prev_events": ["$good:example.org", 5, "not-an-event-id"]});
        let ids = extract_ids(&raw, "prev_events");
        assert_eq!(ids.len(), 1);
        assert_eq!(ids[0].as_str(), "$good:example.org");
    }

    #[test]
    fn missing_field_yields_empty() {
        let raw = serde_json::json!({});
        assert!(extract_ids(&raw, "prev_events").is_empty());
    }
}
