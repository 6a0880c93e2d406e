//! Per-document embedding indexer.
//!
//! Selects the chunks of one document that still lack a vector, requests
//! an embedding for each, and persists the result. Chunks are processed
//! in bounded batches with a short pause in between, a cooperative nod to
//! provider rate limits. One failing chunk never aborts the run; the
//! outcome is a [`EmbedReport`] the caller classifies via
//! [`EmbedReport::outcome`].

use std::time::Duration;

use anyhow::Result;

use crate::embedding::{truncate_for_embedding, EmbeddingProvider, MAX_EMBED_CHARS};
use crate::models::EmbedReport;
use crate::store::Store;

/// Runs embedding for the not-yet-embedded chunks of a document.
pub struct EmbeddingIndexer<'a> {
    store: &'a dyn Store,
    provider: &'a dyn EmbeddingProvider,
    batch_size: usize,
    batch_delay: Duration,
}

impl<'a> EmbeddingIndexer<'a> {
    pub fn new(
        store: &'a dyn Store,
        provider: &'a dyn EmbeddingProvider,
        batch_size: usize,
        batch_delay: Duration,
    ) -> Self {
        Self {
            store,
            provider,
            batch_size: batch_size.max(1),
            batch_delay,
        }
    }

    /// Embed every pending chunk of `document_id`.
    ///
    /// Already-embedded chunks are untouched, so a re-run after a partial
    /// failure picks up exactly the remainder; a fully embedded document
    /// is a no-op reported as `{successful: 0, failed: 0, errors: []}`.
    pub async fn run(&self, document_id: &str) -> Result<EmbedReport> {
        let pending = self.store.pending_chunks(document_id).await?;

        let mut report = EmbedReport::default();

        for (batch_no, batch) in pending.chunks(self.batch_size).enumerate() {
            if batch_no > 0 && !self.batch_delay.is_zero() {
                tokio::time::sleep(self.batch_delay).await;
            }

            for chunk in batch {
                let text = truncate_for_embedding(&chunk.text, MAX_EMBED_CHARS);

                match self.provider.embed(text).await {
                    Ok(vector) => {
                        if self.provider.dims() > 0 && vector.len() != self.provider.dims() {
                            report.failed += 1;
                            report.errors.push(format!(
                                "chunk {}: provider returned {} dims, expected {}",
                                chunk.chunk_index,
                                vector.len(),
                                self.provider.dims()
                            ));
                            continue;
                        }
                        match self.store.set_chunk_embedding(&chunk.id, &vector).await {
                            Ok(()) => report.successful += 1,
                            Err(e) => {
                                report.failed += 1;
                                report
                                    .errors
                                    .push(format!("chunk {}: {}", chunk.chunk_index, e));
                            }
                        }
                    }
                    Err(e) => {
                        report.failed += 1;
                        report
                            .errors
                            .push(format!("chunk {}: {}", chunk.chunk_index, e));
                    }
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::chunk_text;
    use crate::models::{Document, DocumentStatus, EmbedOutcome, EmbeddingStatus};
    use crate::store::memory::InMemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Test provider: fails any text containing "FAIL", embeds the rest
    /// as a fixed-dimensionality vector.
    struct FakeProvider {
        dims: usize,
        calls: AtomicUsize,
    }

    impl FakeProvider {
        fn new(dims: usize) -> Self {
            Self {
                dims,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for FakeProvider {
        fn model_name(&self) -> &str {
            "fake"
        }
        fn dims(&self) -> usize {
            self.dims
        }
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if text.contains("FAIL") {
                anyhow::bail!("provider rejected input");
            }
            let mut v = vec![0.0f32; self.dims];
            v[0] = text.len() as f32;
            Ok(v)
        }
    }

    fn doc(id: &str) -> Document {
        Document {
            id: id.to_string(),
            title: "Medication Policy".to_string(),
            status: DocumentStatus::Published,
            description: None,
            version: None,
            effective_date: None,
            review_date: None,
            storage_path: None,
            body: String::new(),
            created_at: 0,
            updated_at: 0,
        }
    }

    // Paragraphs sized so each becomes exactly one chunk at max_tokens=10
    // (40-char budget): no pair fits together, none needs a hard split.
    const BODY_3: &str = "Wash hands before patient contact.\n\n\
                          Wear gloves when handling samples.\n\n\
                          Dispose of sharps in yellow bins.";
    const BODY_5: &str = "Wash hands before patient contact.\n\n\
                          Wear gloves when handling samples.\n\n\
                          Dispose of sharps in yellow bins.\n\n\
                          FAIL embedding for this paragraph.\n\n\
                          Report incidents within one day.";

    async fn seed(store: &InMemoryStore, document_id: &str, body: &str) -> usize {
        store.insert_document(&doc(document_id)).await.unwrap();
        let chunks = chunk_text(document_id, body, 10);
        store.insert_chunks(&chunks).await.unwrap();
        chunks.len()
    }

    #[tokio::test]
    async fn all_chunks_embed_successfully() {
        let store = InMemoryStore::new();
        let n = seed(&store, "d1", BODY_3).await;
        assert_eq!(n, 3);

        let provider = FakeProvider::new(4);
        let indexer = EmbeddingIndexer::new(&store, &provider, 20, Duration::ZERO);
        let report = indexer.run("d1").await.unwrap();

        assert_eq!(report.successful, n);
        assert_eq!(report.failed, 0);
        assert!(report.errors.is_empty());
        assert_eq!(report.outcome(), EmbedOutcome::Success);

        let (embedded, total) = store.embedding_counts("d1").await.unwrap();
        assert!(EmbeddingStatus::from_counts(embedded, total).complete);
    }

    #[tokio::test]
    async fn one_failing_chunk_does_not_abort_the_run() {
        let store = InMemoryStore::new();
        // 5 chunks, the fourth (index 3) poisoned.
        let n = seed(&store, "d1", BODY_5).await;
        assert_eq!(n, 5);

        let provider = FakeProvider::new(4);
        let indexer = EmbeddingIndexer::new(&store, &provider, 2, Duration::ZERO);
        let report = indexer.run("d1").await.unwrap();

        assert_eq!(report.successful, 4);
        assert_eq!(report.failed, 1);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].starts_with("chunk 3:"));
        assert_eq!(report.outcome(), EmbedOutcome::Partial);

        let (embedded, total) = store.embedding_counts("d1").await.unwrap();
        let status = EmbeddingStatus::from_counts(embedded, total);
        assert_eq!(status.embedded, 4);
        assert_eq!(status.total, 5);
        assert!(!status.complete);
    }

    #[tokio::test]
    async fn rerun_on_fully_embedded_document_is_a_noop() {
        let store = InMemoryStore::new();
        seed(&store, "d1", BODY_3).await;

        let provider = FakeProvider::new(4);
        let indexer = EmbeddingIndexer::new(&store, &provider, 20, Duration::ZERO);
        indexer.run("d1").await.unwrap();

        let calls_after_first = provider.calls.load(Ordering::SeqCst);
        let report = indexer.run("d1").await.unwrap();

        assert_eq!(report.successful, 0);
        assert_eq!(report.failed, 0);
        assert!(report.errors.is_empty());
        assert_eq!(report.outcome(), EmbedOutcome::Success);
        assert_eq!(provider.calls.load(Ordering::SeqCst), calls_after_first);
    }

    #[tokio::test]
    async fn rerun_after_partial_failure_picks_up_remainder() {
        let store = InMemoryStore::new();
        seed(
            &store,
            "d1",
            "Wash hands before patient contact.\n\n\
             FAIL embedding for this paragraph.\n\n\
             Dispose of sharps in yellow bins.",
        )
        .await;

        let provider = FakeProvider::new(4);
        let indexer = EmbeddingIndexer::new(&store, &provider, 20, Duration::ZERO);
        let first = indexer.run("d1").await.unwrap();
        assert_eq!(first.outcome(), EmbedOutcome::Partial);

        // Second run only sees the failed chunk.
        let second = indexer.run("d1").await.unwrap();
        assert_eq!(second.successful + second.failed, 1);
    }

    #[tokio::test]
    async fn every_chunk_failing_is_a_failure_outcome() {
        let store = InMemoryStore::new();
        let n = seed(
            &store,
            "d1",
            "FAIL hygiene protocol paragraph one.\n\n\
             FAIL hygiene protocol paragraph two.",
        )
        .await;
        assert_eq!(n, 2);

        let provider = FakeProvider::new(4);
        let indexer = EmbeddingIndexer::new(&store, &provider, 20, Duration::ZERO);
        let report = indexer.run("d1").await.unwrap();

        assert_eq!(report.successful, 0);
        assert_eq!(report.failed, 2);
        assert_eq!(report.outcome(), EmbedOutcome::Failure);
    }

    #[tokio::test]
    async fn dimensionality_mismatch_is_recorded_per_chunk() {
        /// Provider that claims 8 dims but returns 4.
        struct LyingProvider;

        #[async_trait]
        impl EmbeddingProvider for LyingProvider {
            fn model_name(&self) -> &str {
                "lying"
            }
            fn dims(&self) -> usize {
                8
            }
            async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
                Ok(vec![0.0; 4])
            }
        }

        let store = InMemoryStore::new();
        seed(&store, "d1", "Only paragraph.").await;

        let indexer = EmbeddingIndexer::new(&store, &LyingProvider, 20, Duration::ZERO);
        let report = indexer.run("d1").await.unwrap();

        assert_eq!(report.failed, 1);
        assert!(report.errors[0].contains("dims"));
    }
}
