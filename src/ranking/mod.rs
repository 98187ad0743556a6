//! Hybrid ranking: two independent top-K retrievals (lexical and embedding
//! similarity) merged with weighted reciprocal rank fusion.
//!
//! ```text
//!   query text ──► TextIndex ──┐
//!                              ├─► rank_fused ─► truncate ─► DocumentStore ─► results
//!   embedding ──► VectorIndex ─┘
//! ```
//!
//! Only ranks are fused, never raw scores, so BM25 values and inner
//! products never need to share a scale.

mod config;
mod error;
mod fusion;
mod ranker;
mod sources;
mod types;

pub use config::{
    DEFAULT_FULL_TEXT_WEIGHT, DEFAULT_MATCH_COUNT, DEFAULT_PER_SOURCE_LIMIT, DEFAULT_RRF_K,
    DEFAULT_SEMANTIC_WEIGHT, FusionConfig,
};
pub use error::{HybridSearchError, RetrievalError};
pub use fusion::{fuse_rrf, fused_score, rank_fused};
pub use ranker::{HybridRanker, SearchReport, SourceOutcome};
pub use sources::{DocumentStore, TextIndex, VectorIndex};
pub use types::{Candidate, CandidateList, DocumentId, FusedScore, RankedResult, SourceKind};
