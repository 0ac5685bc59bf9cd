//! Core data models for the planning-record pipeline.
//!
//! These types represent the records, chunks, and answers that flow
//! through classification, indexing, and retrieval.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::classify::{DevelopmentCategory, LandType, Scale};

/// One government planning filing as supplied by the data feed,
/// after field cleaning. Immutable once materialized.
#[derive(Debug, Clone, Default)]
pub struct RawRecord {
    /// Planning reference (e.g. `"2458/24"`). Unique within the corpus.
    pub reference: String,
    /// Development address as free text.
    pub location: String,
    /// Free-text proposal description.
    pub proposal: String,
    /// Application type field (e.g. `"Permission"`, `"Retention"`).
    pub application_type: String,
    /// Current application status / stage.
    pub status: String,
    /// Decision text as recorded by the authority.
    pub decision: String,
    /// Registration (submission) date.
    pub submitted: Option<NaiveDate>,
    /// Decision date.
    pub decided: Option<NaiveDate>,
    /// Final grant date.
    pub granted: Option<NaiveDate>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Residential unit count from the feed, when stated.
    pub residential_units: Option<u32>,
    /// Appeal sub-records, if the application was appealed.
    pub appeals: Vec<AppealRecord>,
    /// Further-information request sub-records.
    pub further_information: Vec<FurtherInfoRequest>,
}

/// An appeal lodged against a planning decision.
#[derive(Debug, Clone, Default)]
pub struct AppealRecord {
    pub reference: String,
    pub status: String,
    pub decision: String,
    pub decided: Option<NaiveDate>,
}

/// A further-information request issued during assessment.
#[derive(Debug, Clone, Default)]
pub struct FurtherInfoRequest {
    pub requested: Option<NaiveDate>,
    pub received: Option<NaiveDate>,
}

/// A [`RawRecord`] plus the attributes derived by the classifier.
///
/// Exists only during a batch build pass; only the chunks built from it
/// are persisted.
#[derive(Debug, Clone)]
pub struct ClassifiedRecord {
    pub record: RawRecord,
    pub category: DevelopmentCategory,
    pub land_type: LandType,
    pub scale: Scale,
    /// Decision text after normalization (withdrawn statuses folded in,
    /// blanks resolved to `"Pending"`).
    pub decision: String,
}

/// Structured attributes stored alongside each chunk, used for
/// filtering and role-aware boosting at query time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub reference: String,
    pub location: String,
    pub category: DevelopmentCategory,
    pub land_type: LandType,
    pub scale: Scale,
    pub decision: String,
    pub submitted: Option<NaiveDate>,
    pub has_appeal: bool,
}

/// Unit of retrieval: a natural-language synthesis of one aspect of a
/// planning record, plus the metadata needed to filter and rank it.
///
/// Chunk ids are `{reference}-{index}` and therefore stable across
/// rebuilds given the same source records.
#[derive(Debug, Clone)]
pub struct PlanningChunk {
    pub id: String,
    pub record_ref: String,
    pub chunk_index: i64,
    pub text: String,
    /// SHA-256 of the text, for staleness detection.
    pub hash: String,
    pub metadata: ChunkMetadata,
}

/// The stakeholder role attached to a query. Maps to a
/// [`RoleProfile`](crate::retrieve::RoleProfile) that shapes both
/// ranking boosts and answer framing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StakeholderRole {
    Developer,
    Architect,
    Solicitor,
    EstateAgent,
    Homeowner,
    Journalist,
    None,
}

impl StakeholderRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Developer => "developer",
            Self::Architect => "architect",
            Self::Solicitor => "solicitor",
            Self::EstateAgent => "estate_agent",
            Self::Homeowner => "homeowner",
            Self::Journalist => "journalist",
            Self::None => "none",
        }
    }
}

impl fmt::Display for StakeholderRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StakeholderRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "developer" => Ok(Self::Developer),
            "architect" => Ok(Self::Architect),
            "solicitor" => Ok(Self::Solicitor),
            "estate_agent" | "estate-agent" => Ok(Self::EstateAgent),
            "homeowner" => Ok(Self::Homeowner),
            "journalist" => Ok(Self::Journalist),
            "none" | "" => Ok(Self::None),
            other => Err(format!(
                "unknown role '{}': use developer, architect, solicitor, estate_agent, homeowner, journalist, or none",
                other
            )),
        }
    }
}

/// A user question plus the optional stakeholder role asking it.
#[derive(Debug, Clone)]
pub struct Query {
    pub text: String,
    pub role: StakeholderRole,
}

impl Query {
    pub fn new(text: impl Into<String>, role: StakeholderRole) -> Self {
        Self {
            text: text.into(),
            role,
        }
    }
}

/// A retrieved chunk with its similarity score in `[0, 1]`.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: PlanningChunk,
    pub score: f64,
}

/// A generated answer with the chunk ids that ground it.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub text: String,
    /// Chunk ids the answer is grounded on, for traceability.
    pub cited: Vec<String>,
    pub role: StakeholderRole,
}
