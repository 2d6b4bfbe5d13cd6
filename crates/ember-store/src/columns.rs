//! Column family names. Part of the on-disk contract — renaming one is a
//! breaking change to any existing database.

/// `event_idx -> canonical JSON of event`.
pub const EVENT_JSON: &str = "event_json";
/// `event_id -> event_idx`.
pub const EVENT_IDX: &str = "event_idx";
/// `event_idx -> room_id`, split out for selective reads that only need the
/// room an event belongs to without deserializing the full JSON blob.
pub const EVENT_ROOM: &str = "event_room";
/// `event_idx -> sender`, same rationale as `EVENT_ROOM`.
pub const EVENT_SENDER: &str = "event_sender";
/// `event_idx -> type`, same rationale.
pub const EVENT_TYPE: &str = "event_type";
/// `(room_id, depth, event_idx) -> state-root digest`.
pub const ROOM_EVENTS: &str = "room_events";
/// `(room_id, type, state_key) -> event_idx`.
pub const ROOM_STATE: &str = "room_state";
/// `(room_id, origin, user_id) -> event_idx`.
pub const ROOM_JOINED: &str = "room_joined";
/// `(room_id, event_id) -> event_idx`.
pub const ROOM_HEAD: &str = "room_head";
/// `state_root_id -> serialised state-tree node`.
pub const STATE_NODE: &str = "state_node";
/// Single-row metadata column: highest `event_idx` allocated so far, the
/// schema version, and similar process-wide counters. Not named in the
/// column table directly but required to make `event_idx` allocation
/// durable across restarts.
pub const META: &str = "meta";

pub const ALL: &[&str] = &[
    EVENT_JSON,
    EVENT_IDX,
    EVENT_ROOM,
    EVENT_SENDER,
    EVENT_TYPE,
    ROOM_EVENTS,
    ROOM_STATE,
    ROOM_JOINED,
    ROOM_HEAD,
    STATE_NODE,
    META,
];

/// Key into the `meta` column holding the next unallocated `event_idx`.
pub const META_NEXT_EVENT_IDX: &[u8] = b"next_event_idx";
