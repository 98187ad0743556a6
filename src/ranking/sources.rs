use std::collections::HashMap;

use super::error::RetrievalError;
use super::types::{CandidateList, DocumentId};

/// Lexical retrieval channel. Rank 1 is the index's single best match.
pub trait TextIndex: Send + Sync {
    fn search(&self, query_text: &str, limit: usize) -> Result<CandidateList, RetrievalError>;
}

/// Embedding similarity channel. Rank 1 is the closest document.
pub trait VectorIndex: Send + Sync {
    fn dimensions(&self) -> usize;

    fn search(&self, query_embedding: &[f32], limit: usize)
        -> Result<CandidateList, RetrievalError>;
}

/// Maps identifiers to full records. Ids it does not know are absent from
/// the returned map rather than an error.
pub trait DocumentStore: Send + Sync {
    type Record: Send + 'static;

    fn fetch_many(
        &self,
        ids: &[DocumentId],
    ) -> Result<HashMap<DocumentId, Self::Record>, RetrievalError>;
}
