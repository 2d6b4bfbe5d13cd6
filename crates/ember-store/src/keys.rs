//! Composite key encodings for the secondary-index columns.
//!
//! Keys are big-endian-encoded so lexicographic byte order (RocksDB's
//! native iteration order) matches numeric/ASCII order, letting range
//! scans double as `ORDER BY` without a secondary sort step.

/// `event_idx` as an 8-byte big-endian key — the primary key for
/// `event_json`/per-field columns.
pub fn event_idx_key(event_idx: u64) -> [u8; 8] {
    event_idx.to_be_bytes()
}

pub fn decode_event_idx_key(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[..8]);
    u64::from_be_bytes(buf)
}

/// `(room_id, depth, event_idx)` for `room_events`: room_id length-prefixed
/// so it sorts before the fixed-width depth/idx suffix.
pub fn room_events_key(room_id: &str, depth: u64, event_idx: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(room_id.len() + 2 + 16);
    key.extend_from_slice(&(room_id.len() as u16).to_be_bytes());
    key.extend_from_slice(room_id.as_bytes());
    key.extend_from_slice(&depth.to_be_bytes());
    key.extend_from_slice(&event_idx.to_be_bytes());
    key
}

/// Prefix matching every `room_events` entry for a room, for reverse
/// iteration from the high end.
pub fn room_events_prefix(room_id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(room_id.len() + 2);
    key.extend_from_slice(&(room_id.len() as u16).to_be_bytes());
    key.extend_from_slice(room_id.as_bytes());
    key
}

/// `(room_id, type, state_key)` for `room_state`.
pub fn room_state_key(room_id: &str, event_type: &str, state_key: &str) -> Vec<u8> {
    encode_parts(&[room_id, event_type, state_key])
}

/// `(room_id, origin, user_id)` for `room_joined`.
pub fn room_joined_key(room_id: &str, origin: &str, user_id: &str) -> Vec<u8> {
    encode_parts(&[room_id, origin, user_id])
}

/// Prefix matching every `room_joined` entry for `(room_id, origin)`, used
/// by the federation client to decide which local rooms have members
/// joined from a given remote server.
pub fn room_joined_origin_prefix(room_id: &str, origin: &str) -> Vec<u8> {
    encode_parts(&[room_id, origin])
}

/// `(room_id, event_id)` for `room_head`.
pub fn room_head_key(room_id: &str, event_id: &str) -> Vec<u8> {
    encode_parts(&[room_id, event_id])
}

pub fn room_head_prefix(room_id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(room_id.len() + 2);
    key.extend_from_slice(&(room_id.len() as u16).to_be_bytes());
    key.extend_from_slice(room_id.as_bytes());
    key
}

/// Length-prefix every part so no part's bytes can bleed into the next
/// part's range during a prefix scan (a plain `"a" + "bc"` vs `"ab" + "c"`
/// collision).
fn encode_parts(parts: &[&str]) -> Vec<u8> {
    let mut key = Vec::new();
    for part in parts {
        key.extend_from_slice(&(part.len() as u16).to_be_bytes());
        key.extend_from_slice(part.as_bytes());
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_events_key_sorts_by_depth_then_idx() {
        let a = room_events_key("!room:x", 1, 5);
        let b = room_events_key("!room:x", 1, 6);
        let c = room_events_key("!room:x", 2, 1);
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn prefix_is_a_true_prefix_of_full_key() {
        let prefix = room_events_prefix("!room:x");
        let full = room_events_key("!room:x", 3, 9);
        assert!(full.starts_with(&prefix));
    }

    #[test]
    fn length_prefixing_prevents_part_boundary_collisions() {
        let a = encode_parts(&["ab", "c"]);
        let b = encode_parts(&["a", "bc"]);
        assert_ne!(a, b);
    }
}
