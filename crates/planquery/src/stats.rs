//! Index statistics and health overview.
//!
//! Gives a quick summary of what's indexed: chunk counts, build
//! provenance, and category/decision breakdowns. Used by `plq stats`
//! to sanity-check a build before serving queries.

use anyhow::Result;
use sqlx::Row;

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteIndex;

/// Run the stats command: query the index and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let index = SqliteIndex::new(pool);

    let meta = match index.read_meta().await? {
        Some(meta) => meta,
        None => {
            println!("The index is empty. Run `plq build <feed.json>` first.");
            index.pool().close().await;
            return Ok(());
        }
    };

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    let record_count: i64 = sqlx::query_scalar("SELECT COUNT(DISTINCT record_ref) FROM chunks")
        .fetch_one(index.pool())
        .await?;
    let appeal_count: i64 =
        sqlx::query_scalar("SELECT COUNT(DISTINCT record_ref) FROM chunks WHERE has_appeal = 1")
            .fetch_one(index.pool())
            .await?;

    let built_at = chrono::DateTime::from_timestamp(meta.built_at, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| meta.built_at.to_string());

    println!("planquery — Index Stats");
    println!("=======================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!(
        "  Model:       {} ({} dims)",
        meta.embedding_model, meta.embedding_dims
    );
    println!("  Ruleset:     {}", meta.ruleset_version);
    println!("  Built:       {}", built_at);
    println!();
    println!("  Records:     {}", record_count);
    println!("  Chunks:      {}", meta.chunk_count);
    println!("  Appealed:    {}", appeal_count);

    // Category breakdown over primary chunks only, so each record
    // counts once.
    let category_rows = sqlx::query(
        "SELECT category, COUNT(*) AS n FROM chunks WHERE chunk_index = 0
         GROUP BY category ORDER BY n DESC",
    )
    .fetch_all(index.pool())
    .await?;

    println!();
    println!("  By category:");
    for row in &category_rows {
        let category: String = row.get("category");
        let n: i64 = row.get("n");
        println!("    {:<22} {}", category, n);
    }

    let decision_rows = sqlx::query(
        "SELECT decision, COUNT(*) AS n FROM chunks WHERE chunk_index = 0
         GROUP BY decision ORDER BY n DESC LIMIT 10",
    )
    .fetch_all(index.pool())
    .await?;

    println!();
    println!("  By decision:");
    for row in &decision_rows {
        let decision: String = row.get("decision");
        let n: i64 = row.get("n");
        println!("    {:<40} {}", decision, n);
    }

    index.pool().close().await;
    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }
}
