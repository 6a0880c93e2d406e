//! Storage abstraction for the retrieval pipeline.
//!
//! The [`Store`] trait defines every persistence operation the ingestion
//! and search paths need, enabling pluggable backends: SQLite for
//! production, in-memory for tests.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Chunk, Document, DocumentStatus, LexicalHit, VectorHit};

/// Abstract storage backend.
///
/// Chunk rows are immutable once written except for the single allowed
/// transition: a null embedding becoming a stored vector. Archived
/// documents stay in the store but are excluded from both search paths.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`insert_document`](Store::insert_document) | Register a document with extracted body text |
/// | [`get_document`](Store::get_document) | Fetch a document by id |
/// | [`update_document_status`](Store::update_document_status) | Apply a lifecycle transition |
/// | [`chunk_count`](Store::chunk_count) | Number of chunks for a document |
/// | [`insert_chunks`](Store::insert_chunks) | Write a document's chunk rows (once) |
/// | [`document_chunks`](Store::document_chunks) | All chunks of a document, in order |
/// | [`pending_chunks`](Store::pending_chunks) | Chunks still lacking an embedding |
/// | [`set_chunk_embedding`](Store::set_chunk_embedding) | Attach a vector to one chunk |
/// | [`embedding_counts`](Store::embedding_counts) | `(embedded, total)` for a document |
/// | [`vector_search`](Store::vector_search) | Cosine-similarity top-K above a threshold |
/// | [`lexical_search`](Store::lexical_search) | Full-text top-K by relevance |
#[async_trait]
pub trait Store: Send + Sync {
    /// Register a document. Overwrites metadata for an existing id.
    async fn insert_document(&self, doc: &Document) -> Result<()>;

    /// Fetch a document by id.
    async fn get_document(&self, id: &str) -> Result<Option<Document>>;

    /// Apply a lifecycle transition. Returns false for an unknown id.
    async fn update_document_status(&self, id: &str, status: DocumentStatus) -> Result<bool>;

    /// Number of chunks stored for a document.
    async fn chunk_count(&self, document_id: &str) -> Result<i64>;

    /// Write a document's chunks. Callers only invoke this when the
    /// document has no chunks yet; indices are expected to be contiguous
    /// from 0.
    async fn insert_chunks(&self, chunks: &[Chunk]) -> Result<()>;

    /// All chunks of a document, ordered by index.
    async fn document_chunks(&self, document_id: &str) -> Result<Vec<Chunk>>;

    /// Chunks of a document without a stored embedding, ordered by index.
    async fn pending_chunks(&self, document_id: &str) -> Result<Vec<Chunk>>;

    /// Store the embedding vector for one chunk.
    async fn set_chunk_embedding(&self, chunk_id: &str, vector: &[f32]) -> Result<()>;

    /// `(embedded, total)` chunk counts for a document.
    async fn embedding_counts(&self, document_id: &str) -> Result<(i64, i64)>;

    /// Chunks whose cosine similarity to `query_vec` is >= `threshold`,
    /// descending by similarity, at most `limit` results. Archived
    /// documents are excluded.
    async fn vector_search(
        &self,
        query_vec: &[f32],
        threshold: f64,
        limit: i64,
    ) -> Result<Vec<VectorHit>>;

    /// Chunks matching `query` under the full-text relevance model,
    /// descending by rank, at most `limit` results. Archived documents
    /// are excluded.
    async fn lexical_search(&self, query: &str, limit: i64) -> Result<Vec<LexicalHit>>;
}
