use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

/// Opaque, stable identifier of one document in the corpus.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for DocumentId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Retrieval channel a candidate list came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Text,
    Vector,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Vector => "vector",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub document_id: DocumentId,
    /// 1-based position in the source list; 1 is the best match.
    pub rank: usize,
}

/// Ranked output of one retrieval channel for one query.
///
/// Ranks are always `1..=len` in list order and a document id appears at
/// most once; both hold by construction since the only way in is
/// [`CandidateList::from_ranked_ids`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateList {
    source: SourceKind,
    candidates: Vec<Candidate>,
}

impl CandidateList {
    pub fn empty(source: SourceKind) -> Self {
        Self {
            source,
            candidates: Vec::new(),
        }
    }

    /// Builds a list from ids ordered best-first. Repeated ids keep their
    /// first (best) position, and the list stops at `limit` entries.
    pub fn from_ranked_ids<I>(source: SourceKind, ids: I, limit: usize) -> Self
    where
        I: IntoIterator<Item = DocumentId>,
    {
        let mut seen = HashSet::<DocumentId>::new();
        let mut candidates = Vec::<Candidate>::new();

        for document_id in ids {
            if candidates.len() >= limit {
                break;
            }
            if !seen.insert(document_id.clone()) {
                continue;
            }
            candidates.push(Candidate {
                document_id,
                rank: candidates.len() + 1,
            });
        }

        Self { source, candidates }
    }

    pub fn source(&self) -> SourceKind {
        self.source
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Drops everything ranked below `limit`.
    pub fn truncate(&mut self, limit: usize) {
        self.candidates.truncate(limit);
    }

    pub fn rank_of(&self, document_id: &DocumentId) -> Option<usize> {
        self.candidates
            .iter()
            .find(|candidate| &candidate.document_id == document_id)
            .map(|candidate| candidate.rank)
    }
}

/// Fused relevance of one document across both channels.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FusedScore {
    pub document_id: DocumentId,
    pub score: f64,
    pub text_rank: Option<usize>,
    pub vector_rank: Option<usize>,
}

/// Final, hydrated output unit handed to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct RankedResult<R> {
    pub document_id: DocumentId,
    pub score: f64,
    pub text_rank: Option<usize>,
    pub vector_rank: Option<usize>,
    pub record: R,
}
