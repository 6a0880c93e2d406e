//! Hybrid retrieval facade.
//!
//! Given raw query text: embed the query, run the vector and lexical
//! searches concurrently, and fuse the two ranked lists with reciprocal
//! rank fusion. Both signals are required — a failed query embedding or a
//! failed lexical call fails the whole search rather than silently
//! degrading to a single-signal ranking.

use anyhow::{Context, Result};

use crate::config::RetrievalConfig;
use crate::embedding::EmbeddingProvider;
use crate::fusion::reciprocal_rank_fusion;
use crate::models::SearchResult;
use crate::store::Store;

/// Retrieval tuning knobs, decoupled from application config.
#[derive(Debug, Clone)]
pub struct SearchParams {
    /// Minimum cosine similarity for a vector hit.
    pub similarity_threshold: f64,
    /// Cap on vector candidates.
    pub vector_limit: i64,
    /// Cap on full-text candidates.
    pub lexical_limit: i64,
    /// Rank-fusion smoothing constant.
    pub rrf_k: u32,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.3,
            vector_limit: 10,
            lexical_limit: 10,
            rrf_k: 60,
        }
    }
}

impl From<&RetrievalConfig> for SearchParams {
    fn from(cfg: &RetrievalConfig) -> Self {
        Self {
            similarity_threshold: cfg.similarity_threshold,
            vector_limit: cfg.vector_limit,
            lexical_limit: cfg.lexical_limit,
            rrf_k: cfg.rrf_k,
        }
    }
}

/// Run a full hybrid search.
///
/// An empty query is rejected before any provider call. A query that
/// matches nothing in either path returns an empty list, not an error.
pub async fn hybrid_search(
    store: &dyn Store,
    provider: &dyn EmbeddingProvider,
    query: &str,
    params: &SearchParams,
) -> Result<Vec<SearchResult>> {
    if query.trim().is_empty() {
        anyhow::bail!("search query must not be empty");
    }

    let query_vec = provider
        .embed(query)
        .await
        .context("query embedding failed")?;

    // The two paths share no mutable state; issue them together.
    let (vector, lexical) = tokio::join!(
        store.vector_search(&query_vec, params.similarity_threshold, params.vector_limit),
        store.lexical_search(query, params.lexical_limit),
    );

    let vector_hits = vector.context("vector search failed")?;
    let lexical_hits = lexical.context("lexical search failed")?;

    Ok(reciprocal_rank_fusion(
        &vector_hits,
        &lexical_hits,
        params.rrf_k,
    ))
}
