use anyhow::Result;

use crate::config::Config;
use crate::db;

/// Create the index schema if it doesn't exist.
///
/// Two tables: `index_meta` pins the embedding model, its dimensionality,
/// and the classifier ruleset version a build was made with; `chunks`
/// holds one row per searchable chunk with its metadata columns and the
/// embedding blob inline.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS index_meta (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            embedding_model TEXT NOT NULL,
            embedding_dims INTEGER NOT NULL,
            ruleset_version TEXT NOT NULL,
            built_at INTEGER NOT NULL,
            chunk_count INTEGER NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunks (
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
    .execute(&pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_record_ref ON chunks(record_ref)")
        .execute(&pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_category ON chunks(category)")
        .execute(&pool)
        .await?;

    pool.close().await;
    Ok(())
}
