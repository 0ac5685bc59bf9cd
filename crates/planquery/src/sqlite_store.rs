//! SQLite-backed [`VectorIndex`] implementation.
//!
//! Chunks and their embedding blobs live in one table; similarity is
//! computed brute-force in Rust over all rows, which is comfortably
//! fast for a corpus of a few thousand planning applications.
//!
//! A rebuild writes into a staging table and swaps it in inside a
//! single transaction, so concurrent readers never observe a
//! half-built index.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use planquery_core::classify::{DevelopmentCategory, LandType, Scale, RULESET_VERSION};
use planquery_core::embedding::{blob_to_vec, unit_similarity, vec_to_blob};
use planquery_core::error::IndexError;
use planquery_core::models::{ChunkMetadata, PlanningChunk, ScoredChunk};
use planquery_core::store::{MetadataFilter, VectorIndex};

/// Build provenance stored in `index_meta`. A searcher refuses to use
/// an index built with a different embedding model or dimensionality.
#[derive(Debug, Clone)]
pub struct IndexMeta {
    pub embedding_model: String,
    pub embedding_dims: i64,
    pub ruleset_version: String,
    pub built_at: i64,
    pub chunk_count: i64,
}

/// SQLite implementation of the [`VectorIndex`] trait.
#[derive(Debug)]
pub struct SqliteIndex {
    pool: SqlitePool,
}

fn backend(e: sqlx::Error) -> IndexError {
    IndexError::Backend(e.into())
}

impl SqliteIndex {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Open an existing index for querying, verifying that it was built
    /// with the given embedding model and dimensionality.
    pub async fn open(pool: SqlitePool, model: &str, dims: usize) -> Result<Self, IndexError> {
        let index = Self::new(pool);
        match index.read_meta().await? {
            None => Err(IndexError::Empty),
            Some(meta) => {
                if meta.embedding_model != model {
                    return Err(IndexError::Corrupt(format!(
                        "index was built with embedding model '{}', config names '{}'",
                        meta.embedding_model, model
                    )));
                }
                if meta.embedding_dims != dims as i64 {
                    return Err(IndexError::Corrupt(format!(
                        "index was built with {} dims, config names {}",
                        meta.embedding_dims, dims
                    )));
                }
                Ok(index)
            }
        }
    }

    pub async fn read_meta(&self) -> Result<Option<IndexMeta>, IndexError> {
        let row = sqlx::query(
            "SELECT embedding_model, embedding_dims, ruleset_version, built_at, chunk_count
             FROM index_meta WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        Ok(row.map(|r| IndexMeta {
            embedding_model: r.get("embedding_model"),
            embedding_dims: r.get("embedding_dims"),
            ruleset_version: r.get("ruleset_version"),
            built_at: r.get("built_at"),
            chunk_count: r.get("chunk_count"),
        }))
    }

    /// Replace the entire index contents atomically.
    ///
    /// All rows land in a staging table first; the swap — drop old,
    /// rename staging, update meta — happens in one transaction.
    pub async fn rebuild(
        &self,
        chunks: &[PlanningChunk],
        vectors: &[Vec<f32>],
        model: &str,
        dims: usize,
    ) -> Result<(), IndexError> {
        if chunks.len() != vectors.len() {
            return Err(IndexError::Corrupt(format!(
                "{} chunks with {} vectors",
                chunks.len(),
                vectors.len()
            )));
        }

        let mut tx = self.pool.begin().await.map_err(backend)?;

        sqlx::query("DROP TABLE IF EXISTS chunks_new")
            .execute(&mut *tx)
            .await
            .map_err(backend)?;

        sqlx::query(
            r#"
            CREATE TABLE chunks_new (
                id TEXT PRIMARY KEY,
                record_ref TEXT NOT NULL,
                chunk_index INTEGER NOT NULL,
                text TEXT NOT NULL,
                hash TEXT NOT NULL,
                location TEXT NOT NULL,
                category TEXT NOT NULL,
                land_type TEXT NOT NULL,
                scale TEXT NOT NULL,
                decision TEXT NOT NULL,
                submitted TEXT,
                has_appeal INTEGER NOT NULL DEFAULT 0,
                embedding BLOB NOT NULL,
                UNIQUE(record_ref, chunk_index)
            )
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        for (chunk, vector) in chunks.iter().zip(vectors.iter()) {
            insert_chunk(&mut tx, "chunks_new", chunk, vector).await?;
        }

        sqlx::query("DROP TABLE IF EXISTS chunks")
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        sqlx::query("ALTER TABLE chunks_new RENAME TO chunks")
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_record_ref ON chunks(record_ref)")
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_category ON chunks(category)")
            .execute(&mut *tx)
            .await
            .map_err(backend)?;

        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO index_meta (id, embedding_model, embedding_dims, ruleset_version,
                                    built_at, chunk_count)
            VALUES (1, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                embedding_model = excluded.embedding_model,
                embedding_dims = excluded.embedding_dims,
                ruleset_version = excluded.ruleset_version,
                built_at = excluded.built_at,
                chunk_count = excluded.chunk_count
            "#,
        )
        .bind(model)
        .bind(dims as i64)
        .bind(RULESET_VERSION)
        .bind(now)
        .bind(chunks.len() as i64)
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        tx.commit().await.map_err(backend)?;
        Ok(())
    }
}

async fn insert_chunk(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    table: &str,
    chunk: &PlanningChunk,
    vector: &[f32],
) -> Result<(), IndexError> {
    let blob = vec_to_blob(vector);
    let submitted = chunk
        .metadata
        .submitted
        .map(|d| d.format("%Y-%m-%d").to_string());

    sqlx::query(&format!(
        r#"
        INSERT INTO {table} (id, record_ref, chunk_index, text, hash, location,
                             category, land_type, scale, decision, submitted,
                             has_appeal, embedding)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            record_ref = excluded.record_ref,
            chunk_index = excluded.chunk_index,
            text = excluded.text,
            hash = excluded.hash,
            location = excluded.location,
            category = excluded.category,
            land_type = excluded.land_type,
            scale = excluded.scale,
            decision = excluded.decision,
            submitted = excluded.submitted,
            has_appeal = excluded.has_appeal,
            embedding = excluded.embedding
        "#
    ))
    .bind(&chunk.id)
    .bind(&chunk.record_ref)
    .bind(chunk.chunk_index)
    .bind(&chunk.text)
    .bind(&chunk.hash)
    .bind(&chunk.metadata.location)
    .bind(chunk.metadata.category.as_str())
    .bind(chunk.metadata.land_type.as_str())
    .bind(chunk.metadata.scale.as_str())
    .bind(&chunk.metadata.decision)
    .bind(submitted)
    .bind(chunk.metadata.has_appeal as i64)
    .bind(&blob)
    .execute(&mut **tx)
    .await
    .map_err(backend)?;

    Ok(())
}

fn row_to_chunk(row: &SqliteRow) -> PlanningChunk {
    let category: String = row.get("category");
    let land_type: String = row.get("land_type");
    let scale: String = row.get("scale");
    let submitted: Option<String> = row.get("submitted");
    let has_appeal: i64 = row.get("has_appeal");

    PlanningChunk {
        id: row.get("id"),
        record_ref: row.get("record_ref"),
        chunk_index: row.get("chunk_index"),
        text: row.get("text"),
        hash: row.get("hash"),
        metadata: ChunkMetadata {
            reference: row.get("record_ref"),
            location: row.get("location"),
            category: DevelopmentCategory::parse(&category),
            land_type: LandType::parse(&land_type),
            scale: Scale::parse(&scale),
            decision: row.get("decision"),
            submitted: submitted.and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()),
            has_appeal: has_appeal != 0,
        },
    }
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    async fn upsert(
        &self,
        chunks: &[PlanningChunk],
        vectors: &[Vec<f32>],
    ) -> Result<(), IndexError> {
        if chunks.len() != vectors.len() {
            return Err(IndexError::Corrupt(format!(
                "{} chunks with {} vectors",
                chunks.len(),
                vectors.len()
            )));
        }

        let mut tx = self.pool.begin().await.map_err(backend)?;
        for (chunk, vector) in chunks.iter().zip(vectors.iter()) {
            insert_chunk(&mut tx, "chunks", chunk, vector).await?;
        }
        tx.commit().await.map_err(backend)?;
        Ok(())
    }

    async fn search(
        &self,
        query_vec: &[f32],
        limit: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredChunk>, IndexError> {
        let rows = sqlx::query(
            "SELECT id, record_ref, chunk_index, text, hash, location, category,
                    land_type, scale, decision, submitted, has_appeal, embedding
             FROM chunks",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        if rows.is_empty() {
            return Err(IndexError::Empty);
        }

        let expected_blob_len = query_vec.len() * 4;
        let mut scored = Vec::with_capacity(rows.len());
        for row in &rows {
            let chunk = row_to_chunk(row);
            if !filter.map_or(true, |f| f.matches(&chunk.metadata)) {
                continue;
            }
            let blob: Vec<u8> = row.get("embedding");
            if blob.len() != expected_blob_len {
                return Err(IndexError::Corrupt(format!(
                    "chunk {} has a {}-byte embedding, expected {}",
                    chunk.id,
                    blob.len(),
                    expected_blob_len
                )));
            }
            let vector = blob_to_vec(&blob);
            scored.push(ScoredChunk {
                score: unit_similarity(query_vec, &vector),
                chunk,
            });
        }

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.chunk.metadata.submitted.cmp(&a.chunk.metadata.submitted))
        });
        scored.truncate(limit);
        Ok(scored)
    }

    async fn count(&self) -> Result<u64, IndexError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await
            .map_err(backend)?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::{db, migrate};
    use planquery_core::models::ChunkMetadata;
    use tempfile::TempDir;

    fn chunk(id: &str) -> PlanningChunk {
        PlanningChunk {
            id: id.to_string(),
            record_ref: id.trim_end_matches("-0").to_string(),
            chunk_index: 0,
            text: format!("chunk {}", id),
            hash: String::new(),
            metadata: ChunkMetadata {
                reference: id.to_string(),
                location: "Dublin".to_string(),
                category: DevelopmentCategory::Residential,
                land_type: LandType::PrivateLand,
                scale: Scale::Single,
                decision: "Pending".to_string(),
                submitted: NaiveDate::from_ymd_opt(2024, 1, 1),
                has_appeal: false,
            },
        }
    }

    async fn migrated_pool(dir: &TempDir) -> SqlitePool {
        let config: Config = toml::from_str(&format!(
            "[db]\npath = \"{}\"\n",
            dir.path().join("index.db").display()
        ))
        .unwrap();
        migrate::run_migrations(&config).await.unwrap();
        db::connect(&config).await.unwrap()
    }

    #[tokio::test]
    async fn test_open_before_any_build_is_empty() {
        let dir = TempDir::new().unwrap();
        let pool = migrated_pool(&dir).await;

        let err = SqliteIndex::open(pool, "hash-v1", 4).await.unwrap_err();
        assert!(matches!(err, IndexError::Empty), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_open_refuses_model_and_dims_mismatch() {
        let dir = TempDir::new().unwrap();
        let pool = migrated_pool(&dir).await;
        let index = SqliteIndex::new(pool.clone());
        index
            .rebuild(&[chunk("1/24-0")], &[vec![0.5, 0.5, 0.5, 0.5]], "hash-v1", 4)
            .await
            .unwrap();

        let err = SqliteIndex::open(pool.clone(), "text-embedding-3-small", 4)
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::Corrupt(_)), "got {:?}", err);

        let err = SqliteIndex::open(pool.clone(), "hash-v1", 8)
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::Corrupt(_)), "got {:?}", err);

        // Matching provenance still opens.
        assert!(SqliteIndex::open(pool, "hash-v1", 4).await.is_ok());
    }

    #[tokio::test]
    async fn test_truncated_embedding_blob_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let pool = migrated_pool(&dir).await;
        let index = SqliteIndex::new(pool.clone());
        index
            .rebuild(&[chunk("1/24-0")], &[vec![0.5, 0.5, 0.5, 0.5]], "hash-v1", 4)
            .await
            .unwrap();

        sqlx::query("UPDATE chunks SET embedding = zeroblob(3)")
            .execute(&pool)
            .await
            .unwrap();

        let err = index
            .search(&[0.5, 0.5, 0.5, 0.5], 5, None)
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::Corrupt(_)), "got {:?}", err);
    }
}
