//! SQLite-backed [`Store`] implementation.
//!
//! Documents and chunks live in plain tables; lexical search runs over an
//! FTS5 virtual table (`chunks_fts`) kept in the same transaction as the
//! chunk rows, and vector search decodes the embedding BLOBs and scores
//! cosine similarity in Rust.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use std::str::FromStr;

use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::models::{Chunk, Document, DocumentStatus, LexicalHit, VectorHit};

use super::Store;

/// SQLite implementation of the [`Store`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn row_to_document(row: &sqlx::sqlite::SqliteRow) -> Result<Document> {
    let status_text: String = row.get("status");
    Ok(Document {
        id: row.get("id"),
        title: row.get("title"),
        status: DocumentStatus::from_str(&status_text)?,
        description: row.get("description"),
        version: row.get("version"),
        effective_date: row.get("effective_date"),
        review_date: row.get("review_date"),
        storage_path: row.get("storage_path"),
        body: row.get("body"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[async_trait]
impl Store for SqliteStore {
    async fn insert_document(&self, doc: &Document) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO documents (id, title, status, description, version,
                                   effective_date, review_date, storage_path,
                                   body, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                status = excluded.status,
                description = excluded.description,
                version = excluded.version,
                effective_date = excluded.effective_date,
                review_date = excluded.review_date,
                storage_path = excluded.storage_path,
                body = excluded.body,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&doc.id)
        .bind(&doc.title)
        .bind(doc.status.as_str())
        .bind(&doc.description)
        .bind(&doc.version)
        .bind(&doc.effective_date)
        .bind(&doc.review_date)
        .bind(&doc.storage_path)
        .bind(&doc.body)
        .bind(doc.created_at)
        .bind(doc.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_document(&self, id: &str) -> Result<Option<Document>> {
        let row = sqlx::query("SELECT * FROM documents WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(row_to_document(&row)?)),
            None => Ok(None),
        }
    }

    async fn update_document_status(&self, id: &str, status: DocumentStatus) -> Result<bool> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query("UPDATE documents SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn chunk_count(&self, document_id: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks WHERE document_id = ?")
            .bind(document_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn insert_chunks(&self, chunks: &[Chunk]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for chunk in chunks {
            sqlx::query(
                "INSERT INTO chunks (id, document_id, chunk_index, text, hash) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&chunk.id)
            .bind(&chunk.document_id)
            .bind(chunk.chunk_index)
            .bind(&chunk.text)
            .bind(&chunk.hash)
            .execute(&mut *tx)
            .await?;

            sqlx::query("INSERT INTO chunks_fts (chunk_id, document_id, text) VALUES (?, ?, ?)")
                .bind(&chunk.id)
                .bind(&chunk.document_id)
                .bind(&chunk.text)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn document_chunks(&self, document_id: &str) -> Result<Vec<Chunk>> {
        let rows = sqlx::query(
            r#"
            SELECT id, document_id, chunk_index, text, hash
            FROM chunks
            WHERE document_id = ?
            ORDER BY chunk_index
            "#,
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| Chunk {
                id: row.get("id"),
                document_id: row.get("document_id"),
                chunk_index: row.get("chunk_index"),
                text: row.get("text"),
                hash: row.get("hash"),
            })
            .collect())
    }

    async fn pending_chunks(&self, document_id: &str) -> Result<Vec<Chunk>> {
        let rows = sqlx::query(
            r#"
            SELECT id, document_id, chunk_index, text, hash
            FROM chunks
            WHERE document_id = ? AND embedding IS NULL
            ORDER BY chunk_index
            "#,
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| Chunk {
                id: row.get("id"),
                document_id: row.get("document_id"),
                chunk_index: row.get("chunk_index"),
                text: row.get("text"),
                hash: row.get("hash"),
            })
            .collect())
    }

    async fn set_chunk_embedding(&self, chunk_id: &str, vector: &[f32]) -> Result<()> {
        let blob = vec_to_blob(vector);
        let result = sqlx::query("UPDATE chunks SET embedding = ? WHERE id = ?")
            .bind(&blob)
            .bind(chunk_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            anyhow::bail!("chunk not found: {}", chunk_id);
        }
        Ok(())
    }

    async fn embedding_counts(&self, document_id: &str) -> Result<(i64, i64)> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(embedding) AS embedded, COUNT(*) AS total
            FROM chunks
            WHERE document_id = ?
            "#,
        )
        .bind(document_id)
        .fetch_one(&self.pool)
        .await?;

        Ok((row.get("embedded"), row.get("total")))
    }

    async fn vector_search(
        &self,
        query_vec: &[f32],
        threshold: f64,
        limit: i64,
    ) -> Result<Vec<VectorHit>> {
        let rows = sqlx::query(
            r#"
            SELECT c.id AS chunk_id, c.document_id, c.text, c.embedding,
                   d.title AS document_title, d.status AS document_status
            FROM chunks c
            JOIN documents d ON d.id = c.document_id
            WHERE c.embedding IS NOT NULL AND d.status != 'archived'
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut hits: Vec<VectorHit> = Vec::with_capacity(rows.len());
        for row in &rows {
            let blob: Vec<u8> = row.get("embedding");
            let vec = blob_to_vec(&blob);
            let similarity = cosine_similarity(query_vec, &vec) as f64;
            if similarity < threshold {
                continue;
            }
            let status_text: String = row.get("document_status");
            hits.push(VectorHit {
                chunk_id: row.get("chunk_id"),
                document_id: row.get("document_id"),
                text: row.get("text"),
                document_title: row.get("document_title"),
                document_status: DocumentStatus::from_str(&status_text)?,
                similarity,
            });
        }

        hits.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(limit as usize);
        Ok(hits)
    }

    async fn lexical_search(&self, query: &str, limit: i64) -> Result<Vec<LexicalHit>> {
        let rows = sqlx::query(
            r#"
            SELECT chunks_fts.chunk_id, chunks_fts.document_id, c.text, chunks_fts.rank,
                   d.title AS document_title, d.status AS document_status
            FROM chunks_fts
            JOIN chunks c ON c.id = chunks_fts.chunk_id
            JOIN documents d ON d.id = chunks_fts.document_id
            WHERE chunks_fts MATCH ? AND d.status != 'archived'
            ORDER BY chunks_fts.rank
            LIMIT ?
            "#,
        )
        .bind(query)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut hits = Vec::with_capacity(rows.len());
        for row in &rows {
            let rank: f64 = row.get("rank");
            let status_text: String = row.get("document_status");
            hits.push(LexicalHit {
                chunk_id: row.get("chunk_id"),
                document_id: row.get("document_id"),
                text: row.get("text"),
                document_title: row.get("document_title"),
                document_status: DocumentStatus::from_str(&status_text)?,
                rank: -rank, // FTS5 bm25 rank is ascending-better; negate so higher = better
            });
        }

        Ok(hits)
    }
}
