use serde::Serialize;

use super::error::HybridSearchError;

pub const DEFAULT_MATCH_COUNT: usize = 10;
pub const DEFAULT_PER_SOURCE_LIMIT: usize = 20;
pub const DEFAULT_FULL_TEXT_WEIGHT: f64 = 1.0;
pub const DEFAULT_SEMANTIC_WEIGHT: f64 = 1.0;
pub const DEFAULT_RRF_K: f64 = 50.0;

/// Per-query tuning of the rank fusion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FusionConfig {
    /// Upper bound on the number of results returned.
    pub match_count: usize,
    /// Retrieval breadth requested from each channel.
    pub per_source_limit: usize,
    pub full_text_weight: f64,
    pub semantic_weight: f64,
    /// Smoothing constant added to every rank; larger values flatten the curve.
    pub rrf_k: f64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            match_count: DEFAULT_MATCH_COUNT,
            per_source_limit: DEFAULT_PER_SOURCE_LIMIT,
            full_text_weight: DEFAULT_FULL_TEXT_WEIGHT,
            semantic_weight: DEFAULT_SEMANTIC_WEIGHT,
            rrf_k: DEFAULT_RRF_K,
        }
    }
}

impl FusionConfig {
    pub fn validate(&self) -> Result<(), HybridSearchError> {
        if self.match_count == 0 {
            return Err(invalid("match_count must be at least 1"));
        }
        if self.per_source_limit == 0 {
            return Err(invalid("per_source_limit must be at least 1"));
        }
        if !self.full_text_weight.is_finite() || self.full_text_weight < 0.0 {
            return Err(invalid(format!(
                "full_text_weight must be a finite value >= 0 (got {})",
                self.full_text_weight
            )));
        }
        if !self.semantic_weight.is_finite() || self.semantic_weight < 0.0 {
            return Err(invalid(format!(
                "semantic_weight must be a finite value >= 0 (got {})",
                self.semantic_weight
            )));
        }
        if !self.rrf_k.is_finite() || self.rrf_k <= 0.0 {
            return Err(invalid(format!(
                "rrf_k must be a finite value > 0 (got {})",
                self.rrf_k
            )));
        }
        Ok(())
    }

    /// Output never extends past what either channel was asked to retrieve.
    pub fn output_cap(&self) -> usize {
        self.match_count.min(self.per_source_limit)
    }
}

fn invalid(message: impl Into<String>) -> HybridSearchError {
    HybridSearchError::InvalidConfig(message.into())
}
