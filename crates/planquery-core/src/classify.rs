//! Keyword-ruleset classifier for planning records.
//!
//! [`classify`] is a pure function: the same record text always yields
//! the same [`ClassifiedRecord`], so index rebuilds are reproducible.
//! Malformed or ambiguous input never fails a record — unrecognized
//! fields resolve to the `Unknown`/`Other` variants.
//!
//! # Category priority
//!
//! Proposal texts routinely match several keyword sets ("demolition of
//! existing garage and construction of new dwelling"). The first match
//! wins under a fixed priority order:
//!
//! demolition > modification > industrial > commercial > education >
//! public_institutional > residential > other
//!
//! The keyword lists and this ordering form a versioned ruleset
//! ([`RULESET_VERSION`]); changing either requires a version bump and
//! a full index rebuild.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::{ClassifiedRecord, RawRecord};

/// Version of the keyword ruleset below. Recorded in the index metadata
/// at build time.
pub const RULESET_VERSION: &str = "2025.1";

/// Broad development category derived from proposal text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DevelopmentCategory {
    Residential,
    Commercial,
    Industrial,
    Education,
    PublicInstitutional,
    Modification,
    Demolition,
    Other,
}

/// Public/private land signal derived from location and proposal text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LandType {
    PublicLand,
    PublicHousing,
    PrivateLand,
    Unknown,
}

/// Development scale bucketed from unit-count signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scale {
    Single,
    SmallMultiUnit,
    Medium,
    Large,
    Unknown,
}

impl DevelopmentCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Residential => "residential",
            Self::Commercial => "commercial",
            Self::Industrial => "industrial",
            Self::Education => "education",
            Self::PublicInstitutional => "public_institutional",
            Self::Modification => "modification",
            Self::Demolition => "demolition",
            Self::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "residential" => Self::Residential,
            "commercial" => Self::Commercial,
            "industrial" => Self::Industrial,
            "education" => Self::Education,
            "public_institutional" => Self::PublicInstitutional,
            "modification" => Self::Modification,
            "demolition" => Self::Demolition,
            _ => Self::Other,
        }
    }
}

impl LandType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PublicLand => "public_land",
            Self::PublicHousing => "public_housing",
            Self::PrivateLand => "private_land",
            Self::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "public_land" => Self::PublicLand,
            "public_housing" => Self::PublicHousing,
            "private_land" => Self::PrivateLand,
            _ => Self::Unknown,
        }
    }
}

impl Scale {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::SmallMultiUnit => "small_multi_unit",
            Self::Medium => "medium",
            Self::Large => "large",
            Self::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "single" => Self::Single,
            "small_multi_unit" => Self::SmallMultiUnit,
            "medium" => Self::Medium,
            "large" => Self::Large,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for DevelopmentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for LandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Keyword lists. All matching is on lowercased text.

const DEMOLITION_KEYWORDS: &[&str] = &["demolition", "demolish"];
const MODIFICATION_KEYWORDS: &[&str] = &[
    "extension",
    "conversion",
    "alteration",
    "renovation",
    "refurbishment",
];
const INDUSTRIAL_KEYWORDS: &[&str] = &["industrial", "warehouse", "factory", "storage"];
const COMMERCIAL_KEYWORDS: &[&str] = &[
    "office",
    "commercial",
    "retail",
    "shop",
    "restaurant",
    "cafe",
    "hotel",
];
const EDUCATION_KEYWORDS: &[&str] = &["school", "college", "university", "creche", "childcare"];
const PUBLIC_INSTITUTIONAL_KEYWORDS: &[&str] =
    &["church", "hospital", "clinic", "community centre", "civic"];
const RESIDENTIAL_KEYWORDS: &[&str] = &[
    "dwelling",
    "house",
    "residential",
    "apartment",
    "flat",
    "duplex",
];

/// Location keywords suggesting development on public land.
const PUBLIC_LAND_KEYWORDS: &[&str] = &["council", "public", "park", "civic", "library", "garda"];

/// Known public-body names checked against location and proposal text.
const PUBLIC_BODIES: &[&str] = &[
    "dublin city council",
    "office of public works",
    "health service executive",
    "land development agency",
];

/// Proposal keywords indicating public/social housing schemes.
const PUBLIC_HOUSING_KEYWORDS: &[&str] = &[
    "social housing",
    "affordable housing",
    "council housing",
    "part v",
];

/// Proposal keywords indicating large-scale schemes regardless of the
/// stated unit count.
const LARGE_SCALE_KEYWORDS: &[&str] = &["strategic housing development", "large-scale"];

/// Words that, following a number, mark it as a unit count
/// ("24 no. apartments", "12 houses").
const UNIT_WORDS: &[&str] = &[
    "apartment",
    "apartments",
    "dwelling",
    "dwellings",
    "house",
    "houses",
    "unit",
    "units",
    "flat",
    "flats",
    "duplex",
    "duplexes",
];

/// Application statuses that override a blank or `N/A` decision.
const WITHDRAWN_STATUSES: &[&str] = &["DEEMED WITHDRAWN", "WITHDRAWN", "INCOMPLETED APPLICATION"];

fn contains_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|kw| text.contains(kw))
}

/// Derive classification attributes for a record.
///
/// Deterministic, never fails, no I/O. Ambiguity resolves through the
/// documented priority order; absent signals resolve to
/// `Other`/`Unknown` rather than aborting the batch.
pub fn classify(raw: &RawRecord) -> ClassifiedRecord {
    let proposal = format!("{} {}", raw.proposal, raw.application_type).to_lowercase();
    let location = raw.location.to_lowercase();

    let category = classify_category(&proposal);
    let land_type = classify_land_type(&proposal, &location);
    let scale = classify_scale(raw, &proposal, category);
    let decision = normalize_decision(&raw.decision, &raw.status);

    ClassifiedRecord {
        record: raw.clone(),
        category,
        land_type,
        scale,
        decision,
    }
}

/// First matching category wins, in priority order.
fn classify_category(proposal: &str) -> DevelopmentCategory {
    if contains_any(proposal, DEMOLITION_KEYWORDS) {
        DevelopmentCategory::Demolition
    } else if contains_any(proposal, MODIFICATION_KEYWORDS) {
        DevelopmentCategory::Modification
    } else if contains_any(proposal, INDUSTRIAL_KEYWORDS) {
        DevelopmentCategory::Industrial
    } else if contains_any(proposal, COMMERCIAL_KEYWORDS) {
        DevelopmentCategory::Commercial
    } else if contains_any(proposal, EDUCATION_KEYWORDS) {
        DevelopmentCategory::Education
    } else if contains_any(proposal, PUBLIC_INSTITUTIONAL_KEYWORDS) {
        DevelopmentCategory::PublicInstitutional
    } else if contains_any(proposal, RESIDENTIAL_KEYWORDS) {
        DevelopmentCategory::Residential
    } else {
        DevelopmentCategory::Other
    }
}

fn classify_land_type(proposal: &str, location: &str) -> LandType {
    if contains_any(proposal, PUBLIC_HOUSING_KEYWORDS) {
        return LandType::PublicHousing;
    }
    if contains_any(location, PUBLIC_LAND_KEYWORDS)
        || contains_any(proposal, PUBLIC_BODIES)
        || contains_any(location, PUBLIC_BODIES)
    {
        return LandType::PublicLand;
    }
    if location.trim().is_empty() {
        LandType::Unknown
    } else {
        LandType::PrivateLand
    }
}

fn classify_scale(raw: &RawRecord, proposal: &str, category: DevelopmentCategory) -> Scale {
    if contains_any(proposal, LARGE_SCALE_KEYWORDS) {
        return Scale::Large;
    }

    let units = raw.residential_units.or_else(|| parse_unit_count(proposal));

    match units {
        Some(n) if n >= 50 => Scale::Large,
        Some(n) if n >= 10 => Scale::Medium,
        Some(n) if n >= 2 => Scale::SmallMultiUnit,
        Some(_) => Scale::Single,
        None => {
            // Residential proposals at a single address with no unit
            // signal are one-off works.
            if category == DevelopmentCategory::Residential
                || category == DevelopmentCategory::Modification
            {
                if raw.location.trim().is_empty() {
                    Scale::Unknown
                } else {
                    Scale::Single
                }
            } else {
                Scale::Unknown
            }
        }
    }
}

/// Scan for a number directly followed by a unit word, or by a
/// `"no."`-style count marker and then a unit word, e.g.
/// `"24 no. apartments"` or `"12 houses"`. Returns the largest such
/// count found. Intervening descriptive words disqualify the number:
/// `"4 bedroom dwelling"` describes one house, not four.
fn parse_unit_count(proposal: &str) -> Option<u32> {
    let tokens: Vec<&str> = proposal.split_whitespace().collect();
    let clean = |t: &str| -> String {
        t.trim_matches(|c: char| !c.is_ascii_alphanumeric())
            .to_string()
    };
    let mut best: Option<u32> = None;

    for (i, token) in tokens.iter().enumerate() {
        let cleaned = token.trim_matches(|c: char| !c.is_ascii_digit());
        let Ok(n) = cleaned.parse::<u32>() else {
            continue;
        };
        if n == 0 {
            continue;
        }

        let Some(next) = tokens.get(i + 1).map(|&t| clean(t)) else {
            continue;
        };
        let is_count = if UNIT_WORDS.contains(&next.as_str()) {
            true
        } else if matches!(next.as_str(), "no" | "nr" | "number") {
            tokens[i + 2..tokens.len().min(i + 4)]
                .iter()
                .any(|&t| UNIT_WORDS.contains(&clean(t).as_str()))
        } else {
            false
        };

        if is_count {
            best = Some(best.map_or(n, |b| b.max(n)));
        }
    }

    best
}

/// Resolve blank or `N/A` decisions from the application status,
/// falling back to `"Pending"`.
pub fn normalize_decision(decision: &str, status: &str) -> String {
    let decision = decision.trim();
    if !decision.is_empty() && decision != "N/A" {
        return decision.to_string();
    }
    let status = status.trim();
    if WITHDRAWN_STATUSES.contains(&status.to_uppercase().as_str()) {
        return status.to_string();
    }
    "Pending".to_string()
}
