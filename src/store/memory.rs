//! In-memory [`Store`] implementation for tests.
//!
//! Uses `HashMap` and `Vec` behind `std::sync::RwLock` for thread safety.
//! Vector search is brute-force cosine similarity over all stored vectors;
//! lexical search scores by matched-term count, a rough stand-in for the
//! FTS5 relevance the SQLite backend provides.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::models::{Chunk, Document, DocumentStatus, LexicalHit, VectorHit};

use super::Store;

struct StoredChunk {
    chunk: Chunk,
    embedding: Option<Vec<f32>>,
}

/// In-memory store for unit and pipeline tests.
#[derive(Default)]
pub struct InMemoryStore {
    docs: RwLock<HashMap<String, Document>>,
    chunks: RwLock<Vec<StoredChunk>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn insert_document(&self, doc: &Document) -> Result<()> {
        let mut docs = self.docs.write().unwrap();
        docs.insert(doc.id.clone(), doc.clone());
        Ok(())
    }

    async fn get_document(&self, id: &str) -> Result<Option<Document>> {
        let docs = self.docs.read().unwrap();
        Ok(docs.get(id).cloned())
    }

    async fn update_document_status(&self, id: &str, status: DocumentStatus) -> Result<bool> {
        let mut docs = self.docs.write().unwrap();
        match docs.get_mut(id) {
            Some(doc) => {
                doc.status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn chunk_count(&self, document_id: &str) -> Result<i64> {
        let chunks = self.chunks.read().unwrap();
        Ok(chunks
            .iter()
            .filter(|sc| sc.chunk.document_id == document_id)
            .count() as i64)
    }

    async fn insert_chunks(&self, chunks: &[Chunk]) -> Result<()> {
        let mut stored = self.chunks.write().unwrap();
        for c in chunks {
            stored.push(StoredChunk {
                chunk: c.clone(),
                embedding: None,
            });
        }
        Ok(())
    }

    async fn document_chunks(&self, document_id: &str) -> Result<Vec<Chunk>> {
        let chunks = self.chunks.read().unwrap();
        let mut all: Vec<Chunk> = chunks
            .iter()
            .filter(|sc| sc.chunk.document_id == document_id)
            .map(|sc| sc.chunk.clone())
            .collect();
        all.sort_by_key(|c| c.chunk_index);
        Ok(all)
    }

    async fn pending_chunks(&self, document_id: &str) -> Result<Vec<Chunk>> {
        let chunks = self.chunks.read().unwrap();
        let mut pending: Vec<Chunk> = chunks
            .iter()
            .filter(|sc| sc.chunk.document_id == document_id && sc.embedding.is_none())
            .map(|sc| sc.chunk.clone())
            .collect();
        pending.sort_by_key(|c| c.chunk_index);
        Ok(pending)
    }

    async fn set_chunk_embedding(&self, chunk_id: &str, vector: &[f32]) -> Result<()> {
        let mut chunks = self.chunks.write().unwrap();
        match chunks.iter_mut().find(|sc| sc.chunk.id == chunk_id) {
            Some(sc) => {
                sc.embedding = Some(vector.to_vec());
                Ok(())
            }
            None => anyhow::bail!("chunk not found: {}", chunk_id),
        }
    }

    async fn embedding_counts(&self, document_id: &str) -> Result<(i64, i64)> {
        let chunks = self.chunks.read().unwrap();
        let mut embedded = 0i64;
        let mut total = 0i64;
        for sc in chunks.iter() {
            if sc.chunk.document_id == document_id {
                total += 1;
                if sc.embedding.is_some() {
                    embedded += 1;
                }
            }
        }
        Ok((embedded, total))
    }

    async fn vector_search(
        &self,
        query_vec: &[f32],
        threshold: f64,
        limit: i64,
    ) -> Result<Vec<VectorHit>> {
        let docs = self.docs.read().unwrap();
        let chunks = self.chunks.read().unwrap();

        let mut hits: Vec<VectorHit> = chunks
            .iter()
            .filter_map(|sc| {
                let embedding = sc.embedding.as_ref()?;
                let doc = docs.get(&sc.chunk.document_id)?;
                if doc.status == DocumentStatus::Archived {
                    return None;
                }
                let similarity = cosine_similarity(query_vec, embedding) as f64;
                if similarity < threshold {
                    return None;
                }
                Some(VectorHit {
                    chunk_id: sc.chunk.id.clone(),
                    document_id: sc.chunk.document_id.clone(),
                    text: sc.chunk.text.clone(),
                    document_title: doc.title.clone(),
                    document_status: doc.status,
                    similarity,
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(limit as usize);
        Ok(hits)
    }

    async fn lexical_search(&self, query: &str, limit: i64) -> Result<Vec<LexicalHit>> {
        let query_lower = query.to_lowercase();
        let terms: Vec<&str> = query_lower.split_whitespace().collect();
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let docs = self.docs.read().unwrap();
        let chunks = self.chunks.read().unwrap();

        let mut hits: Vec<LexicalHit> = chunks
            .iter()
            .filter_map(|sc| {
                let doc = docs.get(&sc.chunk.document_id)?;
                if doc.status == DocumentStatus::Archived {
                    return None;
                }
                let text_lower = sc.chunk.text.to_lowercase();
                let matches = terms.iter().filter(|t| text_lower.contains(*t)).count();
                if matches == 0 {
                    return None;
                }
                Some(LexicalHit {
                    chunk_id: sc.chunk.id.clone(),
                    document_id: sc.chunk.document_id.clone(),
                    text: sc.chunk.text.clone(),
                    document_title: doc.title.clone(),
                    document_status: doc.status,
                    rank: matches as f64,
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            b.rank
                .partial_cmp(&a.rank)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(limit as usize);
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::chunk_text;

    fn doc(id: &str, title: &str, status: DocumentStatus) -> Document {
        Document {
            id: id.to_string(),
            title: title.to_string(),
            status,
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

    // Each paragraph is exactly one chunk at max_tokens=10 (40-char budget).
    const BODY_3: &str = "Wash hands before patient contact.\n\n\
                          Wear gloves when handling samples.\n\n\
                          Dispose of sharps in yellow bins.";

    #[tokio::test]
    async fn embedding_counts_track_set_vectors() {
        let store = InMemoryStore::new();
        store
            .insert_document(&doc("d1", "Hand Hygiene", DocumentStatus::Published))
            .await
            .unwrap();
        let chunks = chunk_text("d1", BODY_3, 10);
        assert_eq!(chunks.len(), 3);
        store.insert_chunks(&chunks).await.unwrap();

        assert_eq!(store.embedding_counts("d1").await.unwrap(), (0, 3));

        store
            .set_chunk_embedding(&chunks[0].id, &[1.0, 0.0])
            .await
            .unwrap();
        assert_eq!(store.embedding_counts("d1").await.unwrap(), (1, 3));
        assert_eq!(store.pending_chunks("d1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn vector_search_applies_threshold_and_limit() {
        let store = InMemoryStore::new();
        store
            .insert_document(&doc("d1", "Visitor Policy", DocumentStatus::Published))
            .await
            .unwrap();
        let chunks = chunk_text("d1", BODY_3, 10);
        assert_eq!(chunks.len(), 3);
        store.insert_chunks(&chunks).await.unwrap();

        // Similarities against [1, 0]: 1.0, ~0.707, 0.0
        store
            .set_chunk_embedding(&chunks[0].id, &[1.0, 0.0])
            .await
            .unwrap();
        store
            .set_chunk_embedding(&chunks[1].id, &[1.0, 1.0])
            .await
            .unwrap();
        store
            .set_chunk_embedding(&chunks[2].id, &[0.0, 1.0])
            .await
            .unwrap();

        let hits = store.vector_search(&[1.0, 0.0], 0.3, 10).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits[0].similarity > hits[1].similarity);
        for hit in &hits {
            assert!(hit.similarity >= 0.3);
        }

        let capped = store.vector_search(&[1.0, 0.0], 0.3, 1).await.unwrap();
        assert_eq!(capped.len(), 1);
    }

    #[tokio::test]
    async fn archived_documents_are_invisible_to_search() {
        let store = InMemoryStore::new();
        store
            .insert_document(&doc("d1", "Old Policy", DocumentStatus::Published))
            .await
            .unwrap();
        let chunks = chunk_text("d1", "Incident reporting procedure.", 700);
        store.insert_chunks(&chunks).await.unwrap();
        store
            .set_chunk_embedding(&chunks[0].id, &[1.0, 0.0])
            .await
            .unwrap();

        assert_eq!(
            store.lexical_search("incident", 10).await.unwrap().len(),
            1
        );

        store
            .update_document_status("d1", DocumentStatus::Archived)
            .await
            .unwrap();

        assert!(store.lexical_search("incident", 10).await.unwrap().is_empty());
        assert!(store
            .vector_search(&[1.0, 0.0], 0.0, 10)
            .await
            .unwrap()
            .is_empty());
    }
}
