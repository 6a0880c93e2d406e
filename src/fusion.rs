//! Reciprocal Rank Fusion of the vector and lexical result lists.
//!
//! Cosine similarities and full-text relevance scores live on different
//! scales, so the two lists are merged by *position*, not by raw score:
//!
//! `fused(chunk) = Σ 1/(k + rank_i)` over every list the chunk appears in,
//! where `rank_i` is its 1-based position in list `i` and `k` is a
//! smoothing constant (default 60).
//!
//! A chunk found by both paths sums both contributions, which is what
//! pushes agreement between the two signals to the top of the ranking.

use std::collections::HashMap;

use crate::models::{LexicalHit, SearchResult, VectorHit};

/// Merge the two ranked lists into one fused ranking.
///
/// The first list to surface a chunk seeds its result record (similarity
/// for the vector path, rank for the lexical path); when the other list
/// surfaces the same chunk later, the record gains the other field. The
/// returned list is sorted descending by fused score, with chunk id as a
/// stable tie-break, and is not truncated further — each input list was
/// already capped by its own engine.
pub fn reciprocal_rank_fusion(
    vector_hits: &[VectorHit],
    lexical_hits: &[LexicalHit],
    k: u32,
) -> Vec<SearchResult> {
    let mut fused: HashMap<String, SearchResult> = HashMap::new();

    for (idx, hit) in vector_hits.iter().enumerate() {
        let contribution = rrf_contribution(k, idx);
        match fused.get_mut(&hit.chunk_id) {
            Some(existing) => {
                existing.score += contribution;
                existing.similarity = Some(hit.similarity);
            }
            None => {
                fused.insert(
                    hit.chunk_id.clone(),
                    SearchResult {
                        chunk_id: hit.chunk_id.clone(),
                        document_id: hit.document_id.clone(),
                        text: hit.text.clone(),
                        document_title: hit.document_title.clone(),
                        document_status: hit.document_status,
                        similarity: Some(hit.similarity),
                        rank: None,
                        score: contribution,
                    },
                );
            }
        }
    }

    for (idx, hit) in lexical_hits.iter().enumerate() {
        let contribution = rrf_contribution(k, idx);
        match fused.get_mut(&hit.chunk_id) {
            Some(existing) => {
                existing.score += contribution;
                existing.rank = Some(hit.rank);
            }
            None => {
                fused.insert(
                    hit.chunk_id.clone(),
                    SearchResult {
                        chunk_id: hit.chunk_id.clone(),
                        document_id: hit.document_id.clone(),
                        text: hit.text.clone(),
                        document_title: hit.document_title.clone(),
                        document_status: hit.document_status,
                        similarity: None,
                        rank: Some(hit.rank),
                        score: contribution,
                    },
                );
            }
        }
    }

    let mut results: Vec<SearchResult> = fused.into_values().collect();
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });
    results
}

/// Contribution of the item at zero-based position `idx`: `1/(k + idx + 1)`.
fn rrf_contribution(k: u32, idx: usize) -> f64 {
    1.0 / (k as f64 + (idx + 1) as f64)
}
