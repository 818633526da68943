//! PostgreSQL + pgvector chunk store
//!
//! Vector columns go through raw SQL (`$n::vector` casts); the upsert is a
//! single atomic `INSERT .. ON CONFLICT .. DO UPDATE`, which is the only
//! consistency mechanism concurrent sync and retrieval need.

use super::{format_vector, ChunkFields, ChunkStore, ScoredChunk};
use crate::db::models::ChunkType;
use crate::db::DbPool;
use crate::errors::Result;
use async_trait::async_trait;
use sea_orm::{ConnectionTrait, DbBackend, Statement};
use uuid::Uuid;

/// Chunk store backed by the `knowledge_chunks` table
#[derive(Clone)]
pub struct PgChunkStore {
    pool: DbPool,
}

impl PgChunkStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Ping the underlying database
    pub async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }
}

#[async_trait]
impl ChunkStore for PgChunkStore {
    async fn upsert(
        &self,
        tenant_id: Uuid,
        chunk_type: ChunkType,
        source_id: Option<Uuid>,
        fields: ChunkFields,
    ) -> Result<Uuid> {
        let chunk_id = Uuid::new_v4();
        let summary_embedding = fields.summary_embedding.as_deref().map(format_vector);
        let full_embedding = fields.full_embedding.as_deref().map(format_vector);

        // A missing source id (ad-hoc note) has no conflict target and
        // degrades to a plain insert.
        let sql = if source_id.is_some() {
            r#"
            INSERT INTO knowledge_chunks (
                id, tenant_id, chunk_type, source_id, document_group_id,
                title, summary_text, full_text,
                summary_embedding, full_embedding,
                language, word_count, metadata, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9::vector, $10::vector, $11, $12, $13, NOW(), NOW())
            ON CONFLICT (tenant_id, chunk_type, source_id) DO UPDATE SET
                document_group_id = EXCLUDED.document_group_id,
                title = EXCLUDED.title,
                summary_text = EXCLUDED.summary_text,
                full_text = EXCLUDED.full_text,
                summary_embedding = EXCLUDED.summary_embedding,
                full_embedding = EXCLUDED.full_embedding,
                language = EXCLUDED.language,
                word_count = EXCLUDED.word_count,
                metadata = EXCLUDED.metadata,
                updated_at = NOW()
            RETURNING id
            "#
        } else {
            r#"
            INSERT INTO knowledge_chunks (
                id, tenant_id, chunk_type, source_id, document_group_id,
                title, summary_text, full_text,
                summary_embedding, full_embedding,
                language, word_count, metadata, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9::vector, $10::vector, $11, $12, $13, NOW(), NOW())
            RETURNING id
            "#
        };

        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            sql,
            vec![
                chunk_id.into(),
                tenant_id.into(),
                chunk_type.as_str().into(),
                source_id.into(),
                fields.document_group_id.into(),
                fields.title.into(),
                fields.summary_text.into(),
                fields.full_text.into(),
                summary_embedding.into(),
                full_embedding.into(),
                fields.language.into(),
                fields.word_count.into(),
                fields.metadata.into(),
            ],
        );

        let row = self
            .pool
            .write()
            .query_one(stmt)
            .await?
            .ok_or_else(|| crate::errors::EngineError::StoreConnection {
                message: "Upsert returned no row".to_string(),
            })?;

        Ok(row.try_get::<Uuid>("", "id")?)
    }

    async fn delete_by_source(
        &self,
        tenant_id: Uuid,
        chunk_type: ChunkType,
        source_id: Uuid,
    ) -> Result<bool> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            DELETE FROM knowledge_chunks
            WHERE tenant_id = $1 AND chunk_type = $2 AND source_id = $3
            "#,
            vec![
                tenant_id.into(),
                chunk_type.as_str().into(),
                source_id.into(),
            ],
        );

        let result = self.pool.write().execute(stmt).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_by_document_group(&self, tenant_id: Uuid, group_id: Uuid) -> Result<u64> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            DELETE FROM knowledge_chunks
            WHERE tenant_id = $1 AND document_group_id = $2
            "#,
            vec![tenant_id.into(), group_id.into()],
        );

        let result = self.pool.write().execute(stmt).await?;
        Ok(result.rows_affected())
    }

    async fn search(
        &self,
        tenant_id: Uuid,
        chunk_type: ChunkType,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        let embedding_str = format_vector(query_vector);

        let sql = format!(
            r#"
            SELECT
                id as chunk_id,
                chunk_type,
                source_id,
                title,
                full_text,
                word_count,
                metadata,
                1 - (summary_embedding <=> '{embedding}'::vector) as similarity
            FROM knowledge_chunks
            WHERE tenant_id = $1
              AND chunk_type = $2
              AND summary_embedding IS NOT NULL
            ORDER BY summary_embedding <=> '{embedding}'::vector
            LIMIT $3
            "#,
            embedding = embedding_str
        );

        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            &sql,
            vec![
                tenant_id.into(),
                chunk_type.as_str().into(),
                (top_k as i64).into(),
            ],
        );

        let rows = self.pool.read().query_all(stmt).await?;

        let chunks = rows
            .into_iter()
            .filter_map(|row| {
                let chunk_type: ChunkType =
                    row.try_get::<String>("", "chunk_type").ok()?.parse().ok()?;
                Some(ScoredChunk {
                    chunk_id: row.try_get::<Uuid>("", "chunk_id").ok()?,
                    chunk_type,
                    source_id: row.try_get::<Option<Uuid>>("", "source_id").ok()?,
                    title: row.try_get::<String>("", "title").ok()?,
                    full_text: row.try_get::<String>("", "full_text").ok()?,
                    word_count: row.try_get::<i32>("", "word_count").ok()?,
                    metadata: row
                        .try_get::<serde_json::Value>("", "metadata")
                        .unwrap_or(serde_json::Value::Null),
                    similarity: row.try_get::<f64>("", "similarity").ok()?,
                })
            })
            .collect();

        Ok(chunks)
    }
}
