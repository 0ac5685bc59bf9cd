//! In-memory [`VectorIndex`] implementation.
//!
//! Backs unit and scenario tests without touching SQLite. Brute-force
//! cosine similarity over all stored vectors behind a `std::sync::RwLock`.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::embedding::unit_similarity;
use crate::error::IndexError;
use crate::models::{PlanningChunk, ScoredChunk};

use super::{MetadataFilter, VectorIndex};

struct Entry {
    chunk: PlanningChunk,
    vector: Vec<f32>,
}

/// In-memory index for tests and ephemeral use.
#[derive(Default)]
pub struct MemoryIndex {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
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
        let mut entries = self.entries.write().unwrap();
        for (chunk, vector) in chunks.iter().zip(vectors.iter()) {
            entries.insert(
                chunk.id.clone(),
                Entry {
                    chunk: chunk.clone(),
                    vector: vector.clone(),
                },
            );
        }
        Ok(())
    }

    async fn search(
        &self,
        query_vec: &[f32],
        limit: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredChunk>, IndexError> {
        let entries = self.entries.read().unwrap();
        if entries.is_empty() {
            return Err(IndexError::Empty);
        }

        let mut scored: Vec<ScoredChunk> = entries
            .values()
            .filter(|entry| filter.map_or(true, |f| f.matches(&entry.chunk.metadata)))
            .map(|entry| ScoredChunk {
                chunk: entry.chunk.clone(),
                score: unit_similarity(query_vec, &entry.vector),
            })
            .collect();

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
        Ok(self.entries.read().unwrap().len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{DevelopmentCategory, LandType, Scale};
    use crate::models::ChunkMetadata;
    use chrono::NaiveDate;

    fn chunk(id: &str, category: DevelopmentCategory) -> PlanningChunk {
        PlanningChunk {
            id: id.to_string(),
            record_ref: id.trim_end_matches("-0").to_string(),
            chunk_index: 0,
            text: format!("chunk {}", id),
            hash: String::new(),
            metadata: ChunkMetadata {
                reference: id.to_string(),
                location: "Dublin".to_string(),
                category,
                land_type: LandType::PrivateLand,
                scale: Scale::Single,
                decision: "Pending".to_string(),
                submitted: NaiveDate::from_ymd_opt(2024, 1, 1),
                has_appeal: false,
            },
        }
    }

    #[tokio::test]
    async fn test_empty_index_errors() {
        let index = MemoryIndex::new();
        let err = index.search(&[1.0, 0.0], 5, None).await.unwrap_err();
        assert!(matches!(err, IndexError::Empty));
    }

    #[tokio::test]
    async fn test_upsert_replaces_same_id() {
        let index = MemoryIndex::new();
        let c = chunk("1/24-0", DevelopmentCategory::Residential);
        index.upsert(&[c.clone()], &[vec![1.0, 0.0]]).await.unwrap();
        index.upsert(&[c], &[vec![0.0, 1.0]]).await.unwrap();
        assert_eq!(index.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_mismatched_vectors_rejected() {
        let index = MemoryIndex::new();
        let c = chunk("1/24-0", DevelopmentCategory::Residential);
        let err = index.upsert(&[c], &[]).await.unwrap_err();
        assert!(matches!(err, IndexError::Corrupt(_)));
    }

    #[tokio::test]
    async fn test_round_trip_top_result() {
        let index = MemoryIndex::new();
        index
            .upsert(
                &[
                    chunk("1/24-0", DevelopmentCategory::Residential),
                    chunk("2/24-0", DevelopmentCategory::Commercial),
                ],
                &[vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]],
            )
            .await
            .unwrap();

        let results = index.search(&[1.0, 0.0, 0.0], 1, None).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.id, "1/24-0");
        assert!(results[0].score > 0.9);
    }

    #[tokio::test]
    async fn test_filter_never_leaks() {
        let index = MemoryIndex::new();
        index
            .upsert(
                &[
                    chunk("1/24-0", DevelopmentCategory::Residential),
                    chunk("2/24-0", DevelopmentCategory::Commercial),
                ],
                &[vec![1.0, 0.0], vec![1.0, 0.0]],
            )
            .await
            .unwrap();

        let filter = MetadataFilter {
            categories: vec![DevelopmentCategory::Commercial],
            ..Default::default()
        };
        let results = index.search(&[1.0, 0.0], 10, Some(&filter)).await.unwrap();
        assert!(results
            .iter()
            .all(|r| r.chunk.metadata.category == DevelopmentCategory::Commercial));
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn test_filter_matching_nothing_is_empty_not_error() {
        let index = MemoryIndex::new();
        index
            .upsert(
                &[chunk("1/24-0", DevelopmentCategory::Residential)],
                &[vec![1.0, 0.0]],
            )
            .await
            .unwrap();

        let filter = MetadataFilter {
            categories: vec![DevelopmentCategory::Industrial],
            ..Default::default()
        };
        let results = index.search(&[1.0, 0.0], 10, Some(&filter)).await.unwrap();
        assert!(results.is_empty());
    }
}
