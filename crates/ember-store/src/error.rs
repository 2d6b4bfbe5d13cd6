//! Store-level errors.

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("rocksdb error: {0}")]
    Rocks(#[from] rocksdb::Error),

    #[error("unknown column family: {0}")]
    UnknownColumn(&'static str),

    #[error("event json corrupt at idx {idx}: {source}")]
    CorruptEventJson { idx: u64, source: serde_json::Error },

    #[error("invariant violated: {0}")]
    InvariantViolated(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
