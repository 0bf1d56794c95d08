use hazard_common::{
    EvidencePost, Hazard, HazardError, IncidentDraft, IncidentExtraction, PipelineConfig, Result,
};
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::pipeline::stats::{Stage, StageSummary};
use crate::traits::{HazardStore, IncidentExtractor};

const MAX_LIFE_LOSS_CHARS: usize = 20;

/// One incident synthesized across all supplied posts, as the LLM returns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RawIncident {
    /// Number of lives lost, or "unknown". At most 20 characters.
    #[serde(deserialize_with = "string_or_number")]
    #[schemars(with = "String")]
    pub life_loss: String,
    /// Infrastructure damaged or lost.
    pub infra_lost: String,
    /// Hazard type across all posts.
    #[schemars(with = "Hazard")]
    pub hazard_type: String,
    /// Overall intensity on a 1-10 scale.
    #[serde(deserialize_with = "int_or_numeric_string")]
    #[schemars(with = "i64")]
    pub intensity: i64,
    /// Single word for the dominant emotion (fear, panic, sadness...).
    #[serde(alias = "emotions")]
    pub emotion: String,
    /// Summary of the hazard event.
    #[serde(alias = "hazard_description")]
    pub description: String,
    /// Comma-separated keywords relevant to the event.
    #[serde(deserialize_with = "keyword_text")]
    #[schemars(with = "String")]
    pub keywords: String,
}

fn string_or_number<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<String, D::Error> {
    match Value::deserialize(d)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

fn int_or_numeric_string<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<i64, D::Error> {
    let parsed = match Value::deserialize(d)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Value::String(s) => s.trim().parse::<f64>().ok().map(|f| f.round() as i64),
        _ => None,
    };
    parsed.ok_or_else(|| serde::de::Error::custom("intensity must be an integer"))
}

fn keyword_text<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<String, D::Error> {
    match Value::deserialize(d)? {
        Value::String(s) => Ok(s),
        Value::Array(items) => Ok(items
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(", ")),
        other => Err(serde::de::Error::custom(format!(
            "keywords must be text, got {other}"
        ))),
    }
}

/// Normalize a raw reply into a storable record, or reject it.
pub fn validate_incident(raw: RawIncident) -> Result<IncidentDraft> {
    let hazard_type: Hazard = raw.hazard_type.parse()?;

    let description = raw.description.trim().to_string();
    if description.is_empty() {
        return Err(HazardError::Schema("empty hazard description".into()));
    }

    let emotion = raw
        .emotion
        .split_whitespace()
        .next()
        .map(|w| w.trim_matches(|c: char| !c.is_alphabetic()).to_lowercase())
        .filter(|w| !w.is_empty())
        .ok_or_else(|| HazardError::Schema("empty emotion".into()))?;

    let life_loss = match raw.life_loss.trim() {
        "" => "unknown".to_string(),
        s => s.chars().take(MAX_LIFE_LOSS_CHARS).collect(),
    };

    let keywords = raw
        .keywords
        .split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .collect::<Vec<_>>()
        .join(", ");

    Ok(IncidentDraft {
        life_loss,
        infra_lost: raw.infra_lost.trim().to_string(),
        hazard_type,
        intensity: raw.intensity.clamp(1, 10) as u8,
        emotion,
        description,
        keywords,
    })
}

/// Evidence as serialized into the extraction request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvidenceItem {
    pub title: String,
    pub body: String,
    pub hazard: String,
    pub url: String,
    pub comments: Vec<EvidenceComment>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvidenceComment {
    pub text: String,
    pub score: i64,
}

pub fn evidence_payload(evidence: &[EvidencePost]) -> Vec<EvidenceItem> {
    evidence
        .iter()
        .map(|e| EvidenceItem {
            title: e.post.title.clone(),
            body: e.post.body.clone(),
            hazard: e.post.hazard.label().to_string(),
            url: e.post.url.clone(),
            comments: e
                .comments
                .iter()
                .map(|c| EvidenceComment {
                    text: c.text.clone(),
                    score: c.score,
                })
                .collect(),
        })
        .collect()
}

/// How much evidence one extraction sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvidenceLimits {
    pub posts: usize,
    pub comments: usize,
}

impl From<&PipelineConfig> for EvidenceLimits {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            posts: config.evidence_post_limit(),
            comments: config.evidence_comments,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AggregateOutcome {
    /// No verified posts for the location. Nothing was written.
    NoSignal,
    Created(IncidentExtraction),
}

/// Synthesize one incident for a location from its most recent verified
/// posts. A reply that fails validation writes nothing.
pub async fn aggregate_location(
    extractor: &dyn IncidentExtractor,
    store: &dyn HazardStore,
    location: &str,
    limits: EvidenceLimits,
) -> Result<AggregateOutcome> {
    // A zero post limit would hide real evidence behind a no-signal result.
    let evidence: Vec<EvidencePost> = store
        .evidence_for_location(location, limits.posts.max(1), limits.comments)
        .await?
        .into_iter()
        .filter(|e| e.post.is_verified())
        .collect();

    if evidence.is_empty() {
        info!(location, "No verified posts, no signal");
        return Ok(AggregateOutcome::NoSignal);
    }

    let raw = extractor.extract(&evidence).await?;
    let draft = validate_incident(raw)?;
    let post_ids: Vec<i64> = evidence.iter().map(|e| e.post.id).collect();

    let incident = store.create_incident(location, &draft, &post_ids).await?;
    info!(
        location,
        incident_id = incident.id,
        hazard = %incident.hazard_type,
        intensity = incident.intensity,
        "Incident extracted"
    );
    Ok(AggregateOutcome::Created(incident))
}

pub async fn aggregate_locations<I, S>(
    extractor: &dyn IncidentExtractor,
    store: &dyn HazardStore,
    locations: I,
    limits: EvidenceLimits,
) -> StageSummary
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut summary = StageSummary::new(Stage::Aggregate);

    for location in locations {
        let location = location.as_ref();
        match aggregate_location(extractor, store, location, limits).await {
            Ok(AggregateOutcome::Created(_)) => summary.succeeded += 1,
            Ok(AggregateOutcome::NoSignal) => summary.no_signal += 1,
            Err(e) => {
                warn!(location, error = %e, "Aggregation failed");
                summary.record_failure(format!("location {location:?}"), &e);
            }
        }
    }

    summary
}
