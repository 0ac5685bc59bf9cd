//! Index build pipeline orchestration.
//!
//! Coordinates the full build flow: feed file → cleaning → classification
//! → chunk synthesis → batch embedding → atomic index swap. Records that
//! fail cleaning are skipped and counted, never fatal.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::Path;

use planquery_core::classify::classify;
use planquery_core::document::build_chunks;
use planquery_core::models::{AppealRecord, FurtherInfoRequest, PlanningChunk, RawRecord};

use crate::config::Config;
use crate::db;
use crate::embedder::create_embedder;
use crate::migrate;
use crate::sqlite_store::SqliteIndex;

/// Proposals shorter than this carry no useful signal and are skipped.
const MIN_PROPOSAL_LEN: usize = 20;

/// One record as it appears in the cleaned feed export (JSON array).
#[derive(Debug, Deserialize)]
struct FeedRecord {
    #[serde(rename = "ref", default)]
    reference: String,
    #[serde(default)]
    location: String,
    #[serde(default)]
    proposal: String,
    #[serde(default)]
    long_proposal: String,
    #[serde(default)]
    app_type: String,
    #[serde(default)]
    app_status: String,
    #[serde(default)]
    decision: String,
    #[serde(default)]
    reg_date: String,
    #[serde(default)]
    dec_date: String,
    #[serde(default)]
    grant_date: String,
    #[serde(default)]
    appeal_ref: String,
    #[serde(default)]
    appeal_status: String,
    #[serde(default)]
    appeal_decision: String,
    #[serde(default)]
    appeal_decision_date: String,
    #[serde(default)]
    fi_request_date: String,
    #[serde(default)]
    fi_received_date: String,
    #[serde(default)]
    num_units: Option<serde_json::Value>,
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lon: Option<f64>,
}

fn parse_feed_date(s: &str) -> Option<NaiveDate> {
    if s.trim().is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}

fn parse_unit_field(value: &Option<serde_json::Value>) -> Option<u32> {
    match value {
        Some(serde_json::Value::Number(n)) => n.as_u64().map(|u| u as u32),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
}

impl FeedRecord {
    fn into_raw(self) -> RawRecord {
        let proposal = if self.long_proposal.len() > self.proposal.len() {
            self.long_proposal.clone()
        } else {
            self.proposal.clone()
        };

        let appeals = if !self.appeal_ref.is_empty() || !self.appeal_status.is_empty() {
            vec![AppealRecord {
                reference: self.appeal_ref.clone(),
                status: self.appeal_status.clone(),
                decision: self.appeal_decision.clone(),
                decided: parse_feed_date(&self.appeal_decision_date),
            }]
        } else {
            Vec::new()
        };

        let further_information =
            if !self.fi_request_date.is_empty() || !self.fi_received_date.is_empty() {
                vec![FurtherInfoRequest {
                    requested: parse_feed_date(&self.fi_request_date),
                    received: parse_feed_date(&self.fi_received_date),
                }]
            } else {
                Vec::new()
            };

        RawRecord {
            reference: self.reference.trim().to_string(),
            location: self.location.trim().to_string(),
            proposal: proposal.trim().to_string(),
            application_type: self.app_type.trim().to_string(),
            status: self.app_status.trim().to_string(),
            decision: self.decision.trim().to_string(),
            submitted: parse_feed_date(&self.reg_date),
            decided: parse_feed_date(&self.dec_date),
            granted: parse_feed_date(&self.grant_date),
            latitude: self.lat,
            longitude: self.lon,
            residential_units: parse_unit_field(&self.num_units),
            appeals,
            further_information,
        }
    }
}

/// Build (or rebuild) the vector index from a feed export file.
pub async fn run_build(config: &Config, input: &Path, limit: Option<usize>) -> Result<()> {
    let content = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read feed file: {}", input.display()))?;
    let feed: Vec<FeedRecord> =
        serde_json::from_str(&content).with_context(|| "Failed to parse feed JSON")?;

    println!("Loaded {} feed records from {}", feed.len(), input.display());

    let mut records: Vec<RawRecord> = Vec::with_capacity(feed.len());
    let mut skipped = 0usize;
    for raw in feed {
        let record = raw.into_raw();
        if record.reference.is_empty() || record.proposal.len() < MIN_PROPOSAL_LEN {
            skipped += 1;
            continue;
        }
        records.push(record);
    }
    if let Some(lim) = limit {
        records.truncate(lim);
    }
    if skipped > 0 {
        println!("Skipped {} records (missing reference or short proposal)", skipped);
    }
    if records.is_empty() {
        anyhow::bail!("No usable records in feed file");
    }

    let mut chunks: Vec<PlanningChunk> = Vec::new();
    for record in &records {
        let classified = classify(record);
        chunks.extend(build_chunks(&classified));
    }
    println!(
        "Classified {} records into {} chunks",
        records.len(),
        chunks.len()
    );

    let embedder = create_embedder(&config.embedding)?;
    println!(
        "Embedding with {} ({} dims), batch size {}",
        embedder.model_name(),
        embedder.dims(),
        config.embedding.batch_size
    );

    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(texts.len());
    for (i, batch) in texts.chunks(config.embedding.batch_size.max(1)).enumerate() {
        let batch_vecs = embedder
            .embed(batch)
            .await
            .with_context(|| format!("Embedding batch {} failed", i + 1))?;
        if batch_vecs.len() != batch.len() {
            anyhow::bail!(
                "Embedding batch {} returned {} vectors for {} texts",
                i + 1,
                batch_vecs.len(),
                batch.len()
            );
        }
        vectors.extend(batch_vecs);
        println!("  embedded {}/{} chunks", vectors.len(), texts.len());
    }

    migrate::run_migrations(config).await?;
    let pool = db::connect(config).await?;
    let index = SqliteIndex::new(pool);
    index
        .rebuild(&chunks, &vectors, embedder.model_name(), embedder.dims())
        .await?;
    index.pool().close().await;

    println!(
        "Index built: {} chunks ({} records) → {}",
        chunks.len(),
        records.len(),
        config.db.path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_record_into_raw() {
        let json = r#"{
            "ref": "2458/24",
            "location": "12 Griffith Avenue, Dublin 9",
            "proposal": "Construction of a two storey dwelling",
            "app_type": "Permission",
            "app_status": "APPLICATION FINALISED",
            "decision": "GRANT PERMISSION",
            "reg_date": "2024-06-02",
            "dec_date": "2025-01-10",
            "appeal_ref": "",
            "num_units": "4"
        }"#;
        let feed: FeedRecord = serde_json::from_str(json).unwrap();
        let raw = feed.into_raw();
        assert_eq!(raw.reference, "2458/24");
        assert_eq!(raw.submitted, NaiveDate::from_ymd_opt(2024, 6, 2));
        assert_eq!(raw.residential_units, Some(4));
        assert!(raw.appeals.is_empty());
    }

    #[test]
    fn test_feed_record_appeal_and_numeric_units() {
        let json = r#"{
            "ref": "3001/24",
            "location": "Rathmines Road",
            "proposal": "Demolition of existing structures and construction of apartments",
            "appeal_ref": "ABP-12345",
            "appeal_status": "Appeal Decided",
            "appeal_decision": "Refused",
            "appeal_decision_date": "2025-03-01",
            "num_units": 12
        }"#;
        let feed: FeedRecord = serde_json::from_str(json).unwrap();
        let raw = feed.into_raw();
        assert_eq!(raw.appeals.len(), 1);
        assert_eq!(raw.appeals[0].reference, "ABP-12345");
        assert_eq!(raw.residential_units, Some(12));
    }

    #[test]
    fn test_bad_dates_become_none() {
        let json = r#"{"ref": "1/24", "proposal": "Retention of single storey extension", "reg_date": "not-a-date"}"#;
        let feed: FeedRecord = serde_json::from_str(json).unwrap();
        assert_eq!(feed.into_raw().submitted, None);
    }
}
