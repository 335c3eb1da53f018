//! Wire types for the profile API
//!
//! The detail payload carries ~35 top-level fields plus nested sub-records
//! (skills, work experience, education, certifications, memberships,
//! publications, patents, OSS contributions). Only the fields the pipeline
//! itself touches are typed; everything else rides along in a flattened map
//! so the persisted record is byte-complete without modelling the
//! destination schema here.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request body for the search endpoint
#[derive(Debug, Clone, Serialize)]
pub struct SearchRequest {
    pub page: u64,
    pub seniority: Vec<String>,
    pub size: u32,
}

/// Response body of the search endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub results: Vec<SearchHit>,
}

/// One search result: a lightweight profile plus ranking side-channel
#[derive(Debug, Clone, Deserialize)]
pub struct SearchHit {
    pub profile: HitProfile,
    #[serde(default)]
    pub weight: Option<i64>,
    #[serde(default)]
    pub match_score: Option<Value>,
}

/// The profile portion of a search hit
#[derive(Debug, Clone, Deserialize)]
pub struct HitProfile {
    pub id: i64,
    #[serde(default)]
    pub is_first_name_female: Option<bool>,
    #[serde(default)]
    pub sub_region: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
}

/// Ephemeral per-page work item: profile id plus the search-only fields
/// that must be merged into the detail record.
#[derive(Debug, Clone)]
pub struct SearchStub {
    pub profile_id: i64,
    pub is_first_name_female: Option<bool>,
    pub sub_region: Option<String>,
    pub region: Option<String>,
    pub weight: Option<i64>,
    pub match_score: Option<Value>,
}

impl From<SearchHit> for SearchStub {
    fn from(hit: SearchHit) -> Self {
        Self {
            profile_id: hit.profile.id,
            is_first_name_female: hit.profile.is_first_name_female,
            sub_region: hit.profile.sub_region,
            region: hit.profile.region,
            weight: hit.weight,
            match_score: hit.match_score,
        }
    }
}

/// Response body of the detail endpoint
///
/// A successful-looking call can still deliver a payload without the nested
/// `profile` object; the normalizer treats that as malformed.
#[derive(Debug, Clone, Deserialize)]
pub struct DetailEnvelope {
    #[serde(default)]
    pub profile: Option<ProfileDetail>,
}

/// Full profile record as returned by the detail endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileDetail {
    pub id: i64,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Unit of persistence: the detail record with every stub-derived field
/// attached, keyed by profile id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub profile_id: i64,
    pub payload: Value,
}
