//! Vector index abstraction.
//!
//! The [`VectorIndex`] trait defines the storage operations the
//! retrieval pipeline needs, enabling pluggable backends (SQLite,
//! in-memory for tests). Implementations must be `Send + Sync`.
//!
//! Invariants every backend upholds:
//!
//! - a chunk is never stored without its embedding vector;
//! - `search` on a zero-chunk index fails with [`IndexError::Empty`];
//! - `search` with a filter matching nothing returns an empty result,
//!   not an error;
//! - similarity scores are on the `[0, 1]` unit scale
//!   ([`unit_similarity`](crate::embedding::unit_similarity)) and are
//!   comparable across calls within one build generation.

pub mod memory;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::classify::{DevelopmentCategory, LandType, Scale};
use crate::error::IndexError;
use crate::models::{ChunkMetadata, PlanningChunk, ScoredChunk};

/// Predicate over a chunk's structured metadata.
///
/// Empty fields match everything, so `MetadataFilter::default()` is a
/// pass-through. Used by `search` to narrow candidates before ranking;
/// role boosting deliberately does NOT use hard filters.
#[derive(Debug, Clone, Default)]
pub struct MetadataFilter {
    pub categories: Vec<DevelopmentCategory>,
    pub land_types: Vec<LandType>,
    pub scales: Vec<Scale>,
    /// Only chunks submitted on or after this date.
    pub since: Option<NaiveDate>,
    /// Only chunks from appealed applications.
    pub appeals_only: bool,
}

impl MetadataFilter {
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
            && self.land_types.is_empty()
            && self.scales.is_empty()
            && self.since.is_none()
            && !self.appeals_only
    }

    /// True when the chunk satisfies every populated field.
    pub fn matches(&self, meta: &ChunkMetadata) -> bool {
        if !self.categories.is_empty() && !self.categories.contains(&meta.category) {
            return false;
        }
        if !self.land_types.is_empty() && !self.land_types.contains(&meta.land_type) {
            return false;
        }
        if !self.scales.is_empty() && !self.scales.contains(&meta.scale) {
            return false;
        }
        if let Some(since) = self.since {
            match meta.submitted {
                Some(date) if date >= since => {}
                _ => return false,
            }
        }
        if self.appeals_only && !meta.has_appeal {
            return false;
        }
        true
    }
}

/// Abstract vector index over planning chunks.
///
/// Read-many/write-rarely: `upsert` runs only during a batch build,
/// which completes before query traffic is served.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Persist chunks with their embedding vectors, replacing any
    /// existing chunk with the same id.
    ///
    /// `chunks` and `vectors` must be parallel slices; a length
    /// mismatch is [`IndexError::Corrupt`], since it would strand a
    /// chunk without an embedding.
    async fn upsert(
        &self,
        chunks: &[PlanningChunk],
        vectors: &[Vec<f32>],
    ) -> Result<(), IndexError>;

    /// Nearest-neighbour search by unit-scale cosine similarity among
    /// chunks satisfying `filter`, best first, at most `limit` results.
    async fn search(
        &self,
        query_vec: &[f32],
        limit: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredChunk>, IndexError>;

    /// Number of chunks currently indexed.
    async fn count(&self) -> Result<u64, IndexError>;
}
