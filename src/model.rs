use serde::Serialize;

use crate::ranking::SourceOutcome;

/// Issue metadata joined onto a page. Absent when the page has no parent
/// issue or the issue row is gone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssueSummary {
    pub id: String,
    pub filename: Option<String>,
    pub description: Option<String>,
    pub issue_url: Option<String>,
    pub collection: Option<String>,
    pub pub_date: Option<String>,
}

/// Hydrated payload for one search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageRecord {
    pub id: String,
    pub parent_issue_id: Option<String>,
    pub page_number: String,
    pub ocr_result: Option<String>,
    pub image_url: Option<String>,
    pub created_at: Option<String>,
    pub issue: Option<IssueSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FusionSettings {
    pub match_count: usize,
    pub per_source_limit: usize,
    pub full_text_weight: f64,
    pub semantic_weight: f64,
    pub rrf_k: f64,
    pub timeout_ms: u64,
    pub embedding: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RetrievalSummary {
    pub text: SourceOutcome,
    pub vector: SourceOutcome,
    pub text_candidates: usize,
    pub vector_candidates: usize,
    pub fused_candidates: usize,
    pub output_cap: usize,
    pub hydration_gaps: usize,
    pub duration_ms: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryHit {
    pub rank: usize,
    pub page_id: String,
    pub score: f64,
    pub text_rank: Option<usize>,
    pub vector_rank: Option<usize>,
    pub page: PageRecord,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub generated_at: String,
    pub query: String,
    pub settings: FusionSettings,
    pub retrieval: RetrievalSummary,
    pub returned: usize,
    pub results: Vec<QueryHit>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub generated_at: String,
    pub db_path: String,
    pub db_exists: bool,
    pub missing_tables: Vec<String>,
    pub issues: i64,
    pub pages: i64,
    pub pages_with_embedding: i64,
    pub embedding_dim: usize,
    pub embedding_dim_mismatches: i64,
}
