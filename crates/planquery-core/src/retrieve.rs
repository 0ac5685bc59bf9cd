//! Role-aware semantic retrieval.
//!
//! Turns a user question into a ranked, deduplicated set of chunks:
//!
//! 1. Embed the query with the same pinned model used at index time.
//! 2. Look up the stakeholder role's [`RoleProfile`] once.
//! 3. Oversample `k × oversample_factor` candidates from the index.
//! 4. Add soft role boosts, re-sort by boosted score (ties broken by
//!    newer submission date), dedupe by chunk id, truncate to `k`.
//!
//! Role boosts only reorder the oversampled candidate set — they never
//! remove a candidate, so a role can never silently hide a true answer.
//! [`IndexError::Empty`] propagates unchanged: the index has not been
//! built yet, which the caller can fix by triggering a build.

use crate::classify::{DevelopmentCategory, LandType, Scale};
use crate::embedding::{embed_query, Embedder};
use crate::error::RetrieveError;
use crate::models::{ChunkMetadata, Query, ScoredChunk, StakeholderRole};
use crate::store::VectorIndex;

/// Retrieval tuning parameters.
#[derive(Debug, Clone)]
pub struct RetrievalParams {
    /// Maximum results to return.
    pub top_k: usize,
    /// Candidate multiplier fetched before re-ranking.
    pub oversample_factor: usize,
    /// Score added per matching boost rule.
    pub role_boost: f64,
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self {
            top_k: 10,
            oversample_factor: 4,
            role_boost: 0.05,
        }
    }
}

/// A soft preference over chunk metadata. Every populated field must
/// match for the rule to fire.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoostRule {
    pub category: Option<DevelopmentCategory>,
    pub land_type: Option<LandType>,
    pub scale: Option<Scale>,
    pub has_appeal: Option<bool>,
}

impl BoostRule {
    fn matches(&self, meta: &ChunkMetadata) -> bool {
        self.category.map_or(true, |c| c == meta.category)
            && self.land_type.map_or(true, |l| l == meta.land_type)
            && self.scale.map_or(true, |s| s == meta.scale)
            && self.has_appeal.map_or(true, |a| a == meta.has_appeal)
    }
}

/// Ranking boosts plus answer framing for one stakeholder role,
/// looked up once per query.
#[derive(Debug, Clone)]
pub struct RoleProfile {
    pub role: StakeholderRole,
    pub boosts: &'static [BoostRule],
    /// Framing text appended to the generation system prompt.
    pub framing: &'static str,
}

const DEVELOPER_BOOSTS: &[BoostRule] = &[
    BoostRule {
        scale: Some(Scale::Medium),
        category: None,
        land_type: None,
        has_appeal: None,
    },
    BoostRule {
        scale: Some(Scale::Large),
        category: None,
        land_type: None,
        has_appeal: None,
    },
    BoostRule {
        land_type: Some(LandType::PublicLand),
        category: None,
        scale: None,
        has_appeal: None,
    },
];

const ARCHITECT_BOOSTS: &[BoostRule] = &[
    BoostRule {
        category: Some(DevelopmentCategory::Modification),
        land_type: None,
        scale: None,
        has_appeal: None,
    },
    BoostRule {
        category: Some(DevelopmentCategory::Residential),
        land_type: None,
        scale: None,
        has_appeal: None,
    },
];

const SOLICITOR_BOOSTS: &[BoostRule] = &[BoostRule {
    has_appeal: Some(true),
    category: None,
    land_type: None,
    scale: None,
}];

const ESTATE_AGENT_BOOSTS: &[BoostRule] = &[
    BoostRule {
        category: Some(DevelopmentCategory::Residential),
        land_type: None,
        scale: None,
        has_appeal: None,
    },
    BoostRule {
        land_type: Some(LandType::PrivateLand),
        category: None,
        scale: None,
        has_appeal: None,
    },
];

const HOMEOWNER_BOOSTS: &[BoostRule] = &[
    BoostRule {
        category: Some(DevelopmentCategory::Modification),
        land_type: None,
        scale: None,
        has_appeal: None,
    },
    BoostRule {
        scale: Some(Scale::Single),
        category: None,
        land_type: None,
        has_appeal: None,
    },
];

const JOURNALIST_BOOSTS: &[BoostRule] = &[
    BoostRule {
        has_appeal: Some(true),
        category: None,
        land_type: None,
        scale: None,
    },
    BoostRule {
        scale: Some(Scale::Large),
        category: None,
        land_type: None,
        has_appeal: None,
    },
];

/// Look up the profile for a role.
pub fn role_profile(role: StakeholderRole) -> RoleProfile {
    let (boosts, framing): (&'static [BoostRule], &'static str) = match role {
        StakeholderRole::Developer => (
            DEVELOPER_BOOSTS,
            "The reader is a property developer. Emphasize site scale, unit counts, \
             decision outcomes, and signals about what gets permitted in the area.",
        ),
        StakeholderRole::Architect => (
            ARCHITECT_BOOSTS,
            "The reader is an architect. Emphasize the nature of proposals, conditions \
             attached to grants, and what design precedents the records show.",
        ),
        StakeholderRole::Solicitor => (
            SOLICITOR_BOOSTS,
            "The reader is a solicitor. Be precise with reference numbers, dates, \
             decision wording, and appeal status.",
        ),
        StakeholderRole::EstateAgent => (
            ESTATE_AGENT_BOOSTS,
            "The reader is an estate agent. Emphasize locations, residential outcomes, \
             and anything affecting property marketability.",
        ),
        StakeholderRole::Homeowner => (
            HOMEOWNER_BOOSTS,
            "The reader is a homeowner with no planning background. Use plain language \
             and explain planning terms when they appear.",
        ),
        StakeholderRole::Journalist => (
            JOURNALIST_BOOSTS,
            "The reader is a journalist. Emphasize patterns, contested decisions, \
             appeals, and large schemes, citing references for verification.",
        ),
        StakeholderRole::None => (&[], ""),
    };
    RoleProfile {
        role,
        boosts,
        framing,
    }
}

/// Retrieve the top-k chunks for a query.
///
/// See the module docs for the algorithm. Scores in the result are the
/// boosted scores used for ranking.
pub async fn retrieve(
    index: &dyn VectorIndex,
    embedder: &dyn Embedder,
    query: &Query,
    params: &RetrievalParams,
) -> Result<Vec<ScoredChunk>, RetrieveError> {
    let query_vec = embed_query(embedder, &query.text).await?;
    let profile = role_profile(query.role);

    let oversample = params.top_k * params.oversample_factor.max(1);
    let candidates = index.search(&query_vec, oversample, None).await?;

    Ok(rerank(candidates, &profile, params))
}

/// Boost, re-sort, dedupe, truncate. Pure; exercised directly by tests.
pub fn rerank(
    candidates: Vec<ScoredChunk>,
    profile: &RoleProfile,
    params: &RetrievalParams,
) -> Vec<ScoredChunk> {
    let mut boosted: Vec<ScoredChunk> = candidates
        .into_iter()
        .map(|mut sc| {
            let hits = profile
                .boosts
                .iter()
                .filter(|rule| rule.matches(&sc.chunk.metadata))
                .count();
            sc.score += hits as f64 * params.role_boost;
            sc
        })
        .collect();

    boosted.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.chunk.metadata.submitted.cmp(&a.chunk.metadata.submitted))
    });

    let mut seen = std::collections::HashSet::new();
    boosted.retain(|sc| seen.insert(sc.chunk.id.clone()));
    boosted.truncate(params.top_k);
    boosted
}
