//! Core data models for the retrieval pipeline.
//!
//! These types represent the policy documents, chunks, and search results
//! that flow through ingestion and retrieval.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

/// Lifecycle status of a policy document.
///
/// Documents are never physically deleted; retiring one means moving it to
/// [`DocumentStatus::Archived`], which removes it from search results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Draft,
    Review,
    Published,
    Archived,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Draft => "draft",
            DocumentStatus::Review => "review",
            DocumentStatus::Published => "published",
            DocumentStatus::Archived => "archived",
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(DocumentStatus::Draft),
            "review" => Ok(DocumentStatus::Review),
            "published" => Ok(DocumentStatus::Published),
            "archived" => Ok(DocumentStatus::Archived),
            other => anyhow::bail!(
                "unknown document status: '{}'. Use draft, review, published, or archived.",
                other
            ),
        }
    }
}

/// A policy document with extracted plain-text body.
///
/// The body is produced by the upstream text-extraction service before the
/// document reaches this pipeline; binary formats never enter the store.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub status: DocumentStatus,
    pub description: Option<String>,
    pub version: Option<String>,
    /// Date the policy takes effect (YYYY-MM-DD).
    pub effective_date: Option<String>,
    /// Date the policy is due for review (YYYY-MM-DD).
    pub review_date: Option<String>,
    /// Locator of the original upload in external storage.
    pub storage_path: Option<String>,
    pub body: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// An ordered slice of a document's extracted text.
///
/// Indices for a document form a contiguous 0..N-1 sequence and are stable
/// once written; workflow links and citations reference chunk ids.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub chunk_index: i64,
    pub text: String,
    pub hash: String,
}

/// Embedding progress for one document, derived on demand from its chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EmbeddingStatus {
    /// Chunks with a stored vector.
    pub embedded: i64,
    /// Total chunks for the document.
    pub total: i64,
    /// True iff every chunk is embedded and there is at least one chunk.
    pub complete: bool,
}

impl EmbeddingStatus {
    pub fn from_counts(embedded: i64, total: i64) -> Self {
        Self {
            embedded,
            total,
            complete: embedded == total && total > 0,
        }
    }
}

/// A chunk matched by the vector path, annotated with cosine similarity.
#[derive(Debug, Clone)]
pub struct VectorHit {
    pub chunk_id: String,
    pub document_id: String,
    pub text: String,
    pub document_title: String,
    pub document_status: DocumentStatus,
    /// Cosine similarity to the query vector, in [0, 1] for normalized embeddings.
    pub similarity: f64,
}

/// A chunk matched by the full-text path, annotated with its relevance score.
#[derive(Debug, Clone)]
pub struct LexicalHit {
    pub chunk_id: String,
    pub document_id: String,
    pub text: String,
    pub document_title: String,
    pub document_status: DocumentStatus,
    /// Native relevance score of the full-text engine; higher is better.
    pub rank: f64,
}

/// A fused search result.
///
/// `similarity` and `rank` record which path(s) produced the chunk; a chunk
/// found by both carries both. `score` is the accumulated fusion total.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub chunk_id: String,
    pub document_id: String,
    pub text: String,
    pub document_title: String,
    pub document_status: DocumentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank: Option<f64>,
    pub score: f64,
}

/// Per-document embedding run summary.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EmbedReport {
    pub successful: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

/// Three-way classification of an embedding run.
///
/// Partial results are never collapsed into either full success or full
/// failure; callers branch on this to pick an exit code or HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedOutcome {
    /// Every chunk embedded (including the zero-pending no-op).
    Success,
    /// Some chunks embedded, some failed.
    Partial,
    /// Every chunk failed.
    Failure,
}

impl EmbedReport {
    pub fn outcome(&self) -> EmbedOutcome {
        if self.failed == 0 {
            EmbedOutcome::Success
        } else if self.successful == 0 {
            EmbedOutcome::Failure
        } else {
            EmbedOutcome::Partial
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_roundtrip() {
        for s in ["draft", "review", "published", "archived"] {
            let parsed: DocumentStatus = s.parse().unwrap();
            assert_eq!(parsed.as_str(), s);
        }
        assert!("deleted".parse::<DocumentStatus>().is_err());
    }

    #[test]
    fn embedding_status_complete_requires_chunks() {
        assert!(!EmbeddingStatus::from_counts(0, 0).complete);
        assert!(!EmbeddingStatus::from_counts(4, 5).complete);
        assert!(EmbeddingStatus::from_counts(5, 5).complete);
    }

    #[test]
    fn report_outcome_classification() {
        let ok = EmbedReport {
            successful: 3,
            failed: 0,
            errors: vec![],
        };
        assert_eq!(ok.outcome(), EmbedOutcome::Success);

        let noop = EmbedReport::default();
        assert_eq!(noop.outcome(), EmbedOutcome::Success);

        let partial = EmbedReport {
            successful: 4,
            failed: 1,
            errors: vec!["chunk 3: boom".into()],
        };
        assert_eq!(partial.outcome(), EmbedOutcome::Partial);

        let failure = EmbedReport {
            successful: 0,
            failed: 2,
            errors: vec!["chunk 0: boom".into(), "chunk 1: boom".into()],
        };
        assert_eq!(failure.outcome(), EmbedOutcome::Failure);
    }
}
