use std::time::Duration;

use thiserror::Error;

/// Failure of one retrieval channel. The ranker recovers from these by
/// treating the channel as having returned nothing.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("index unavailable: {0}")]
    Unavailable(String),
    #[error("malformed index response: {0}")]
    Malformed(String),
    #[error("query embedding has {actual} dimensions, index expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("retrieval timed out after {} ms", .0.as_millis())]
    TimedOut(Duration),
    #[error("retrieval task aborted: {0}")]
    Aborted(String),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Failures surfaced by `hybrid_search` as a whole.
#[derive(Debug, Error)]
pub enum HybridSearchError {
    #[error("invalid fusion config: {0}")]
    InvalidConfig(String),
    #[error("both retrieval sources unavailable (text: {text}; vector: {vector})")]
    BothSourcesUnavailable {
        text: RetrievalError,
        vector: RetrievalError,
    },
}
