use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::HazardError;

// --- Hazard vocabulary ---

/// Closed hazard vocabulary. The first eight variants drive search queries;
/// `Other` only appears in incident extractions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Hazard {
    Tsunami,
    StormSurge,
    Cyclone,
    HighTide,
    HighWaves,
    CoastalFlooding,
    CoastalErosion,
    RoughSea,
    Other,
}

impl Hazard {
    /// Hazards used to build the search space, in query order.
    pub const SEARCHABLE: [Hazard; 8] = [
        Hazard::Tsunami,
        Hazard::StormSurge,
        Hazard::Cyclone,
        Hazard::HighTide,
        Hazard::HighWaves,
        Hazard::CoastalFlooding,
        Hazard::CoastalErosion,
        Hazard::RoughSea,
    ];

    /// Human phrasing, as typed into a search box.
    pub fn label(self) -> &'static str {
        match self {
            Hazard::Tsunami => "tsunami",
            Hazard::StormSurge => "storm surge",
            Hazard::Cyclone => "cyclone",
            Hazard::HighTide => "high tide",
            Hazard::HighWaves => "high waves",
            Hazard::CoastalFlooding => "coastal flooding",
            Hazard::CoastalErosion => "coastal erosion",
            Hazard::RoughSea => "rough sea",
            Hazard::Other => "other",
        }
    }

    /// Storage form (matches the serde representation).
    pub fn slug(self) -> &'static str {
        match self {
            Hazard::Tsunami => "tsunami",
            Hazard::StormSurge => "storm_surge",
            Hazard::Cyclone => "cyclone",
            Hazard::HighTide => "high_tide",
            Hazard::HighWaves => "high_waves",
            Hazard::CoastalFlooding => "coastal_flooding",
            Hazard::CoastalErosion => "coastal_erosion",
            Hazard::RoughSea => "rough_sea",
            Hazard::Other => "other",
        }
    }
}

impl fmt::Display for Hazard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Hazard {
    type Err = HazardError;

    /// Accepts either the label ("storm surge") or the slug ("storm_surge"),
    /// case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['_', '-'], " ");
        Hazard::SEARCHABLE
            .iter()
            .chain(std::iter::once(&Hazard::Other))
            .copied()
            .find(|h| h.label() == normalized)
            .ok_or_else(|| HazardError::Schema(format!("unknown hazard type: {s:?}")))
    }
}

// --- Query ---

/// One (hazard, location) search. Ephemeral, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub hazard: Hazard,
    pub location: String,
    pub text: String,
}

impl Query {
    pub fn new(hazard: Hazard, location: impl Into<String>) -> Self {
        let location = location.into();
        let text = format!("{} {}", hazard.label(), location);
        Self {
            hazard,
            location,
            text,
        }
    }
}

// --- Content source DTOs ---

/// A search hit from the content source, before persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcePost {
    pub external_id: String,
    pub title: String,
    pub body: String,
    pub url: String,
    pub score: i64,
    pub subcommunity: String,
}

/// A top-level discussion entry on a source post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceComment {
    pub external_id: String,
    pub text: String,
    pub score: i64,
}

// --- Persisted records ---

/// Candidate social content. `verified` only carries meaning once `tested`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub external_id: String,
    pub url: String,
    pub title: String,
    pub body: String,
    pub location: String,
    /// Provenance of the query that found this post, not ground truth.
    pub hazard: Hazard,
    pub fetched_at: DateTime<Utc>,
    pub tested: bool,
    pub verified: bool,
}

impl Post {
    /// The query text that surfaced this post.
    pub fn search_query(&self) -> String {
        format!("{} {}", self.hazard.label(), self.location)
    }

    /// Classified and judged relevant.
    pub fn is_verified(&self) -> bool {
        self.tested && self.verified
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPost {
    pub external_id: String,
    pub url: String,
    pub title: String,
    pub body: String,
    pub location: String,
    pub hazard: Hazard,
}

impl NewPost {
    pub fn from_source(hit: SourcePost, query: &Query) -> Self {
        Self {
            external_id: hit.external_id,
            url: hit.url,
            title: hit.title,
            body: hit.body,
            location: query.location.clone(),
            hazard: query.hazard,
        }
    }
}

/// A discussion entry attached to a verified post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub external_id: String,
    pub text: String,
    pub score: i64,
    /// Reply parent. Always `None` for top-level entries.
    pub parent_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewComment {
    pub post_id: i64,
    pub external_id: String,
    pub text: String,
    pub score: i64,
    pub parent_id: Option<i64>,
}

impl NewComment {
    pub fn top_level(post_id: i64, entry: SourceComment) -> Self {
        Self {
            post_id,
            external_id: entry.external_id,
            text: entry.text,
            score: entry.score,
            parent_id: None,
        }
    }
}

/// A verified post with its highest-scored comments, as fed to extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct EvidencePost {
    pub post: Post,
    pub comments: Vec<Comment>,
}

/// A validated incident record, ready to persist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentDraft {
    pub life_loss: String,
    pub infra_lost: String,
    pub hazard_type: Hazard,
    /// Always within 1..=10.
    pub intensity: u8,
    pub emotion: String,
    pub description: String,
    pub keywords: String,
}

/// One synthesized incident per aggregation run. Never updated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentExtraction {
    pub id: i64,
    pub location: String,
    pub life_loss: String,
    pub infra_lost: String,
    pub hazard_type: Hazard,
    pub intensity: u8,
    pub emotion: String,
    pub description: String,
    pub keywords: String,
    /// Contributing posts (non-owning).
    pub post_ids: Vec<i64>,
    pub created_at: DateTime<Utc>,
}

impl IncidentExtraction {
    pub fn keyword_list(&self) -> Vec<&str> {
        self.keywords
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hazard_parses_label_and_slug() {
        assert_eq!("storm surge".parse::<Hazard>().unwrap(), Hazard::StormSurge);
        assert_eq!("storm_surge".parse::<Hazard>().unwrap(), Hazard::StormSurge);
        assert_eq!("Coastal-Flooding".parse::<Hazard>().unwrap(), Hazard::CoastalFlooding);
        assert_eq!("other".parse::<Hazard>().unwrap(), Hazard::Other);
        assert!("earthquake".parse::<Hazard>().is_err());
    }

    #[test]
    fn hazard_serde_uses_slug() {
        let json = serde_json::to_string(&Hazard::HighWaves).unwrap();
        assert_eq!(json, "\"high_waves\"");
        for h in Hazard::SEARCHABLE {
            assert_eq!(format!("\"{}\"", h.slug()), serde_json::to_string(&h).unwrap());
        }
    }

    #[test]
    fn query_text_is_hazard_then_location() {
        let q = Query::new(Hazard::RoughSea, "Port Blair");
        assert_eq!(q.text, "rough sea Port Blair");
    }

    #[test]
    fn untested_post_is_never_verified() {
        let post = Post {
            id: 1,
            external_id: "abc".into(),
            url: "https://example.com/a".into(),
            title: "t".into(),
            body: String::new(),
            location: "Puri".into(),
            hazard: Hazard::Cyclone,
            fetched_at: Utc::now(),
            tested: false,
            verified: true,
        };
        assert!(!post.is_verified());
        assert_eq!(post.search_query(), "cyclone Puri");
    }

    #[test]
    fn keyword_list_splits_and_trims() {
        let incident = IncidentExtraction {
            id: 1,
            location: "Digha".into(),
            life_loss: "unknown".into(),
            infra_lost: String::new(),
            hazard_type: Hazard::Tsunami,
            intensity: 8,
            emotion: "fear".into(),
            description: String::new(),
            keywords: "tsunami, evacuation,, flooding ".into(),
            post_ids: vec![1],
            created_at: Utc::now(),
        };
        assert_eq!(incident.keyword_list(), vec!["tsunami", "evacuation", "flooding"]);
    }
}
