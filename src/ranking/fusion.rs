use std::collections::HashMap;

use super::config::FusionConfig;
use super::types::{CandidateList, DocumentId, FusedScore};

struct FusionEntry {
    document_id: DocumentId,
    text_rank: Option<usize>,
    vector_rank: Option<usize>,
}

/// Weighted reciprocal rank fusion of the text and vector lists, truncated
/// to [`FusionConfig::output_cap`].
pub fn fuse_rrf(
    text: &CandidateList,
    vector: &CandidateList,
    config: &FusionConfig,
) -> Vec<FusedScore> {
    let mut fused = rank_fused(text, vector, config);
    fused.truncate(config.output_cap());
    fused
}

/// Full outer join of both lists, scored and ordered best-first.
///
/// Equal scores keep first-seen order (text list, then vector list).
/// Documents that only appear through a zero-weighted channel score 0 and
/// are left out.
pub fn rank_fused(
    text: &CandidateList,
    vector: &CandidateList,
    config: &FusionConfig,
) -> Vec<FusedScore> {
    let mut entries = Vec::<FusionEntry>::with_capacity(text.len() + vector.len());
    let mut positions = HashMap::<DocumentId, usize>::new();

    for candidate in text.candidates() {
        let position = entry_position(&mut entries, &mut positions, &candidate.document_id);
        entries[position].text_rank = Some(candidate.rank);
    }

    for candidate in vector.candidates() {
        let position = entry_position(&mut entries, &mut positions, &candidate.document_id);
        entries[position].vector_rank = Some(candidate.rank);
    }

    let mut out = entries
        .into_iter()
        .map(|entry| FusedScore {
            score: fused_score(entry.text_rank, entry.vector_rank, config),
            document_id: entry.document_id,
            text_rank: entry.text_rank,
            vector_rank: entry.vector_rank,
        })
        .filter(|fused| fused.score > 0.0)
        .collect::<Vec<FusedScore>>();

    // `sort_by` is stable, which is what keeps the first-seen tie order.
    out.sort_by(|left, right| right.score.total_cmp(&left.score));
    out
}

/// Sum of both weighted reciprocal-rank terms; a missing rank contributes 0.
pub fn fused_score(
    text_rank: Option<usize>,
    vector_rank: Option<usize>,
    config: &FusionConfig,
) -> f64 {
    let text_term = text_rank
        .map(|rank| config.full_text_weight * reciprocal_rank(rank, config.rrf_k))
        .unwrap_or(0.0);
    let vector_term = vector_rank
        .map(|rank| config.semantic_weight * reciprocal_rank(rank, config.rrf_k))
        .unwrap_or(0.0);
    text_term + vector_term
}

fn reciprocal_rank(rank: usize, rrf_k: f64) -> f64 {
    1.0 / (rrf_k + rank as f64)
}

fn entry_position(
    entries: &mut Vec<FusionEntry>,
    positions: &mut HashMap<DocumentId, usize>,
    document_id: &DocumentId,
) -> usize {
    if let Some(position) = positions.get(document_id) {
        return *position;
    }

    let position = entries.len();
    entries.push(FusionEntry {
        document_id: document_id.clone(),
        text_rank: None,
        vector_rank: None,
    });
    positions.insert(document_id.clone(), position);
    position
}
