use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::semantic::EmbeddingProvider;

use super::config::FusionConfig;
use super::error::{HybridSearchError, RetrievalError};
use super::fusion::rank_fused;
use super::sources::{DocumentStore, TextIndex, VectorIndex};
use super::types::{CandidateList, DocumentId, FusedScore, RankedResult, SourceKind};


/// What happened to one retrieval channel during a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SourceOutcome {
    Retrieved { candidates: usize },
    /// Nothing to search with: blank query text or empty embedding.
    Skipped,
    Failed { reason: String },
    TimedOut { timeout_ms: u64 },
}

impl SourceOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Retrieved { .. } => "retrieved",
            Self::Skipped => "skipped",
            Self::Failed { .. } => "failed",
            Self::TimedOut { .. } => "timed_out",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchReport<R> {
    pub results: Vec<RankedResult<R>>,
    pub text: SourceOutcome,
    pub vector: SourceOutcome,
    pub text_candidates: usize,
    pub vector_candidates: usize,
    pub fused_candidates: usize,
    pub output_cap: usize,
    pub hydration_gaps: usize,
    pub duration_ms: f64,
}

enum VectorQuery {
    Embedding(Vec<f32>),
    Text(String),
}

/// Runs both retrieval channels concurrently, fuses their rankings and
/// hydrates the winners from the document store.
///
/// Holds no per-query state, so one ranker can serve concurrent queries.
/// Dropping a search future abandons the query: in-flight channel results
/// are discarded and nothing partial is returned.
pub struct HybridRanker<S> {
    text_index: Arc<dyn TextIndex>,
    vector_index: Arc<dyn VectorIndex>,
    store: Arc<S>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    source_timeout: Option<Duration>,
}

impl<S> HybridRanker<S>
where
    S: DocumentStore + 'static,
{
    pub fn new(
        text_index: Arc<dyn TextIndex>,
        vector_index: Arc<dyn VectorIndex>,
        store: Arc<S>,
    ) -> Self {
        Self {
            text_index,
            vector_index,
            store,
            embedder: None,
            source_timeout: None,
        }
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Independent deadline for each channel; `None` waits indefinitely.
    pub fn with_source_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.source_timeout = timeout;
        self
    }

    pub fn embedding_dimensions(&self) -> usize {
        self.vector_index.dimensions()
    }

    pub async fn hybrid_search(
        &self,
        query_text: &str,
        query_embedding: &[f32],
        config: &FusionConfig,
    ) -> Result<Vec<RankedResult<S::Record>>, HybridSearchError> {
        let report = self
            .hybrid_search_report(query_text, query_embedding, config)
            .await?;
        Ok(report.results)
    }

    pub async fn hybrid_search_report(
        &self,
        query_text: &str,
        query_embedding: &[f32],
        config: &FusionConfig,
    ) -> Result<SearchReport<S::Record>, HybridSearchError> {
        self.execute(
            query_text,
            VectorQuery::Embedding(query_embedding.to_vec()),
            config,
        )
        .await
    }

    /// Like [`Self::hybrid_search_report`], with the query embedding computed
    /// by the injected provider inside the vector branch. Without a provider
    /// the vector channel is skipped.
    pub async fn search_text(
        &self,
        query_text: &str,
        config: &FusionConfig,
    ) -> Result<SearchReport<S::Record>, HybridSearchError> {
        self.execute(query_text, VectorQuery::Text(query_text.to_string()), config)
            .await
    }

    async fn execute(
        &self,
        query_text: &str,
        vector_query: VectorQuery,
        config: &FusionConfig,
    ) -> Result<SearchReport<S::Record>, HybridSearchError> {
        config.validate()?;
        let started = Instant::now();
        let limit = config.per_source_limit;

        let (text_branch, vector_branch) = tokio::join!(
            self.retrieve_text(query_text, limit),
            self.retrieve_vector(vector_query, limit),
        );

        let (text_branch, vector_branch) = match (text_branch, vector_branch) {
            (Err(text), Err(vector)) => {
                warn!(
                    text_error = %text,
                    vector_error = %vector,
                    "both retrieval sources failed"
                );
                return Err(HybridSearchError::BothSourcesUnavailable { text, vector });
            }
            branches => branches,
        };

        let (text_list, text_outcome) = settle(SourceKind::Text, text_branch);
        let (vector_list, vector_outcome) = settle(SourceKind::Vector, vector_branch);

        let mut fused = rank_fused(&text_list, &vector_list, config);
        let fused_candidates = fused.len();
        let output_cap = config.output_cap();
        fused.truncate(output_cap);

        let (results, hydration_gaps) = self.hydrate(fused).await;
        if hydration_gaps > 0 {
            warn!(
                hydration_gaps,
                returned = results.len(),
                "fused documents missing from document store; dropped"
            );
        }

        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
        info!(
            text_status = text_outcome.label(),
            vector_status = vector_outcome.label(),
            text_candidates = text_list.len(),
            vector_candidates = vector_list.len(),
            fused_candidates,
            output_cap,
            returned = results.len(),
            duration_ms,
            "hybrid search completed"
        );

        Ok(SearchReport {
            results,
            text: text_outcome,
            vector: vector_outcome,
            text_candidates: text_list.len(),
            vector_candidates: vector_list.len(),
            fused_candidates,
            output_cap,
            hydration_gaps,
            duration_ms,
        })
    }

    async fn retrieve_text(
        &self,
        query_text: &str,
        limit: usize,
    ) -> Result<Option<CandidateList>, RetrievalError> {
        let trimmed = query_text.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }

        let index = Arc::clone(&self.text_index);
        let query = trimmed.to_string();
        run_source(SourceKind::Text, limit, self.source_timeout, move || {
            index.search(&query, limit)
        })
        .await
        .map(Some)
    }

    async fn retrieve_vector(
        &self,
        vector_query: VectorQuery,
        limit: usize,
    ) -> Result<Option<CandidateList>, RetrievalError> {
        let index = Arc::clone(&self.vector_index);

        match vector_query {
            VectorQuery::Embedding(embedding) => {
                if embedding.is_empty() {
                    return Ok(None);
                }
                run_source(SourceKind::Vector, limit, self.source_timeout, move || {
                    index.search(&embedding, limit)
                })
                .await
                .map(Some)
            }
            VectorQuery::Text(text) => {
                let Some(embedder) = self.embedder.clone() else {
                    return Ok(None);
                };
                if text.trim().is_empty() {
                    return Ok(None);
                }
                run_source(SourceKind::Vector, limit, self.source_timeout, move || {
                    let embedding = embedder.embed(&text)?;
                    if embedding.is_empty() {
                        return Ok(CandidateList::empty(SourceKind::Vector));
                    }
                    index.search(&embedding, limit)
                })
                .await
                .map(Some)
            }
        }
    }

    async fn hydrate(&self, fused: Vec<FusedScore>) -> (Vec<RankedResult<S::Record>>, usize) {
        if fused.is_empty() {
            return (Vec::new(), 0);
        }

        let ids = fused
            .iter()
            .map(|value| value.document_id.clone())
            .collect::<Vec<DocumentId>>();
        let store = Arc::clone(&self.store);
        let fetched = tokio::task::spawn_blocking(move || store.fetch_many(&ids)).await;

        let mut records = match fetched {
            Ok(Ok(records)) => records,
            Ok(Err(err)) => {
                warn!(error = %err, "document store fetch failed");
                HashMap::new()
            }
            Err(err) => {
                warn!(error = %err, "document store task aborted");
                HashMap::new()
            }
        };

        let mut gaps = 0usize;
        let mut out = Vec::with_capacity(fused.len());
        for value in fused {
            let Some(record) = records.remove(&value.document_id) else {
                debug!(document_id = %value.document_id, "document missing from store");
                gaps += 1;
                continue;
            };
            out.push(RankedResult {
                document_id: value.document_id,
                score: value.score,
                text_rank: value.text_rank,
                vector_rank: value.vector_rank,
                record,
            });
        }

        (out, gaps)
    }
}

async fn run_source<F>(
    source: SourceKind,
    limit: usize,
    timeout: Option<Duration>,
    task: F,
) -> Result<CandidateList, RetrievalError>
where
    F: FnOnce() -> Result<CandidateList, RetrievalError> + Send + 'static,
{
    let handle = tokio::task::spawn_blocking(task);
    let joined = match timeout {
        Some(deadline) => match tokio::time::timeout(deadline, handle).await {
            Ok(joined) => joined,
            Err(_) => return Err(RetrievalError::TimedOut(deadline)),
        },
        None => handle.await,
    };

    let mut list = joined.map_err(|err| RetrievalError::Aborted(err.to_string()))??;
    if list.source() != source {
        return Err(RetrievalError::Malformed(format!(
            "{} index returned a {} candidate list",
            source.as_str(),
            list.source().as_str()
        )));
    }
    list.truncate(limit);
    Ok(list)
}

/// Turns a branch result into the list fed to fusion. A failed channel
/// contributes an empty list.
fn settle(
    source: SourceKind,
    branch: Result<Option<CandidateList>, RetrievalError>,
) -> (CandidateList, SourceOutcome) {
    match branch {
        Ok(Some(list)) => {
            let outcome = SourceOutcome::Retrieved {
                candidates: list.len(),
            };
            (list, outcome)
        }
        Ok(None) => (CandidateList::empty(source), SourceOutcome::Skipped),
        Err(RetrievalError::TimedOut(deadline)) => {
            warn!(
                source = source.as_str(),
                timeout_ms = deadline.as_millis() as u64,
                "retrieval timed out; continuing without it"
            );
            (
                CandidateList::empty(source),
                SourceOutcome::TimedOut {
                    timeout_ms: deadline.as_millis() as u64,
                },
            )
        }
        Err(err) => {
            warn!(
                source = source.as_str(),
                error = %err,
                "retrieval failed; continuing without it"
            );
            (
                CandidateList::empty(source),
                SourceOutcome::Failed {
                    reason: err.to_string(),
                },
            )
        }
    }
}
