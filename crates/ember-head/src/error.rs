#[derive(Debug, thiserror::Error)]
pub enum HeadError {
    #[error("store error: {0}")]
    Store(#[from] ember_store::StoreError),

    #[error("corrupt event json for event_idx {idx}: {source}")]
    CorruptEventJson { idx: u64, source: serde_json::Error },

    #[error("room_events references missing event_idx {0}")]
    MissingEventJson(u64),

    #[error("room {0} has committed events but an empty head set")]
    EmptyHeadForNonEmptyRoom(String),
}

pub type HeadResult<T> = Result<T, HeadError>;
