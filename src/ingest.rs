//! Ingestion orchestration.
//!
//! Coordinates the per-document flow: extracted body → chunks → embeddings.
//! Chunking happens at most once per document — existing chunk rows are
//! never rewritten, so chunk ids and indices stay valid for workflow links
//! and citations across retries. The embedding step is always safe to
//! re-run; it only touches chunks without a stored vector.

use anyhow::{bail, Result};
use uuid::Uuid;

use crate::chunk::chunk_text;
use crate::config::Config;
use crate::embedding::EmbeddingProvider;
use crate::index::EmbeddingIndexer;
use crate::models::{Document, DocumentStatus, EmbedReport, EmbeddingStatus};
use crate::store::Store;

/// Fields supplied when registering a new document.
#[derive(Debug, Clone, Default)]
pub struct NewDocument {
    pub title: String,
    pub status: Option<DocumentStatus>,
    pub description: Option<String>,
    pub version: Option<String>,
    pub effective_date: Option<String>,
    pub review_date: Option<String>,
    pub storage_path: Option<String>,
}

/// Register a document whose body has already been extracted to plain text.
///
/// Returns the stored document. Rejects an empty title or body.
pub async fn register_document(
    store: &dyn Store,
    new: NewDocument,
    body: String,
) -> Result<Document> {
    if new.title.trim().is_empty() {
        bail!("document title must not be empty");
    }
    if body.trim().is_empty() {
        bail!("document body must not be empty");
    }

    let now = chrono::Utc::now().timestamp();
    let doc = Document {
        id: Uuid::new_v4().to_string(),
        title: new.title,
        status: new.status.unwrap_or(DocumentStatus::Draft),
        description: new.description,
        version: new.version,
        effective_date: new.effective_date,
        review_date: new.review_date,
        storage_path: new.storage_path,
        body,
        created_at: now,
        updated_at: now,
    };

    store.insert_document(&doc).await?;
    Ok(doc)
}

/// Chunk (if not already chunked) and embed one document.
///
/// Missing documents are rejected before any provider call. Re-running on
/// a fully embedded document is a no-op reported as success.
pub async fn run_ingest(
    store: &dyn Store,
    provider: &dyn EmbeddingProvider,
    config: &Config,
    document_id: &str,
) -> Result<EmbedReport> {
    let doc = match store.get_document(document_id).await? {
        Some(doc) => doc,
        None => bail!("document not found: {}", document_id),
    };

    if store.chunk_count(document_id).await? == 0 {
        let chunks = chunk_text(document_id, &doc.body, config.chunking.max_tokens);
        store.insert_chunks(&chunks).await?;
    }

    let indexer = EmbeddingIndexer::new(
        store,
        provider,
        config.embedding.batch_size,
        std::time::Duration::from_millis(config.embedding.batch_delay_ms),
    );
    indexer.run(document_id).await
}

/// Derived embedding progress for one document.
///
/// Recomputed from the chunk set on every call; nothing is cached.
pub async fn embedding_status(store: &dyn Store, document_id: &str) -> Result<EmbeddingStatus> {
    if store.get_document(document_id).await?.is_none() {
        bail!("document not found: {}", document_id);
    }
    let (embedded, total) = store.embedding_counts(document_id).await?;
    Ok(EmbeddingStatus::from_counts(embedded, total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryStore;
    use async_trait::async_trait;

    struct UnitProvider;

    #[async_trait]
    impl EmbeddingProvider for UnitProvider {
        fn model_name(&self) -> &str {
            "unit"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0, 0.0])
        }
    }

    fn test_config() -> Config {
        let toml_str = r#"
[db]
path = "/tmp/unused.sqlite"

[server]
bind = "127.0.0.1:0"
"#;
        toml::from_str(toml_str).unwrap()
    }

    fn new_doc(title: &str) -> NewDocument {
        NewDocument {
            title: title.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn register_rejects_empty_title_and_body() {
        let store = InMemoryStore::new();
        assert!(
            register_document(&store, new_doc("  "), "body".to_string())
                .await
                .is_err()
        );
        assert!(
            register_document(&store, new_doc("Visitor Policy"), "  \n".to_string())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn ingest_unknown_document_is_rejected() {
        let store = InMemoryStore::new();
        let err = run_ingest(&store, &UnitProvider, &test_config(), "nope")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("document not found"));
    }

    #[tokio::test]
    async fn ingest_chunks_once_and_embeds() {
        let store = InMemoryStore::new();
        let doc = register_document(
            &store,
            new_doc("Visitor Policy"),
            "Visitors sign in at reception.\n\nBadges must be worn at all times.".to_string(),
        )
        .await
        .unwrap();

        let report = run_ingest(&store, &UnitProvider, &test_config(), &doc.id)
            .await
            .unwrap();
        assert!(report.successful > 0);
        assert_eq!(report.failed, 0);

        let status = embedding_status(&store, &doc.id).await.unwrap();
        assert!(status.complete);

        // Second ingest neither re-chunks nor re-embeds.
        let chunk_count_before = store.chunk_count(&doc.id).await.unwrap();
        let rerun = run_ingest(&store, &UnitProvider, &test_config(), &doc.id)
            .await
            .unwrap();
        assert_eq!(rerun.successful, 0);
        assert_eq!(rerun.failed, 0);
        assert_eq!(store.chunk_count(&doc.id).await.unwrap(), chunk_count_before);
    }

    #[tokio::test]
    async fn status_for_unknown_document_is_an_error() {
        let store = InMemoryStore::new();
        assert!(embedding_status(&store, "missing").await.is_err());
    }

    #[tokio::test]
    async fn status_for_unchunked_document_is_incomplete() {
        let store = InMemoryStore::new();
        let doc = register_document(
            &store,
            new_doc("Empty-ish"),
            "Some body text.".to_string(),
        )
        .await
        .unwrap();

        let status = embedding_status(&store, &doc.id).await.unwrap();
        assert_eq!(status.total, 0);
        assert!(!status.complete);
    }
}
