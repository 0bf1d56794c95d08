// Claude-backed implementations of the two LLM capabilities.

use ai_client::{AiError, Claude};
use async_trait::async_trait;
use hazard_common::{EvidencePost, HazardError, Result};
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::debug;

use crate::aggregator::{evidence_payload, RawIncident};
use crate::classifier::{ClassificationItem, Verdict};
use crate::traits::{IncidentExtractor, RelevanceClassifier};

const CLASSIFIER_SYSTEM: &str = "\
You are a classifier that analyzes social media posts to determine whether they report \
real, ongoing ocean-related hazards anywhere in the world.

Instructions:
1. Only classify a post as a hazard if it refers to a real, current, or very recent ocean \
disaster (e.g. tsunami, storm surge, high waves, coastal flooding, or dangerous coastal currents).
2. Do NOT classify posts as hazards if they:
   - talk about past events or historical disasters
   - are fictional stories, books, or movies
   - are hypothetical, speculative, or personal memories
   - refer to simulations, reports, or educational content without immediate danger
3. Each post carries the `search_query` that surfaced it. Use it only as context to \
disambiguate the post, never as evidence of a hazard by itself.
4. Return exactly one verdict per post: its `id` and `is_hazard` (true only for a real, \
ongoing ocean disaster). Do not skip or repeat ids.";

const EXTRACTOR_SYSTEM: &str = "\
You are given social media posts and comments about ocean-related hazards. \
Carefully extract structured information about the event they describe.

The posts are all about the same hazard. Return a single record giving the overall \
details. Never return separate information for each post.

- life_loss: number of lives lost, or \"unknown\" (at most 20 characters)
- infra_lost: infrastructure damaged or lost
- hazard_type: one value from the allowed list; use \"other\" if none fits
- intensity: integer from 1 (minor) to 10 (catastrophic)
- emotion: a single word for the general emotion (fear, panic, sadness, ...)
- description: summary of the hazard event
- keywords: comma-separated keywords relevant to the event";

/// Wire shape of a classification reply. Tool inputs must be objects, so the
/// verdict array is wrapped.
#[derive(Debug, Deserialize, JsonSchema)]
struct VerdictReply {
    /// One entry per submitted post.
    verdicts: Vec<Verdict>,
}

/// Malformed model output is a schema failure; everything else is transport.
fn ai_error(err: AiError) -> HazardError {
    if err.is_malformed_output() {
        HazardError::Schema(err.to_string())
    } else {
        HazardError::Transport(err.to_string())
    }
}

pub struct ClaudeClassifier {
    claude: Claude,
}

impl ClaudeClassifier {
    pub fn new(claude: Claude) -> Self {
        Self { claude }
    }
}

#[async_trait]
impl RelevanceClassifier for ClaudeClassifier {
    async fn classify(&self, items: &[ClassificationItem]) -> Result<Vec<Verdict>> {
        let payload = serde_json::to_string_pretty(items)?;
        let user = format!("Classify these posts.\n\nInput JSON:\n{payload}");
        debug!(posts = items.len(), model = self.claude.model(), "Classification request");

        let reply: VerdictReply = self
            .claude
            .extract(CLASSIFIER_SYSTEM, user)
            .await
            .map_err(ai_error)?;
        Ok(reply.verdicts)
    }
}

pub struct ClaudeExtractor {
    claude: Claude,
}

impl ClaudeExtractor {
    pub fn new(claude: Claude) -> Self {
        Self { claude }
    }
}

#[async_trait]
impl IncidentExtractor for ClaudeExtractor {
    async fn extract(&self, evidence: &[EvidencePost]) -> Result<RawIncident> {
        let payload = serde_json::to_string_pretty(&evidence_payload(evidence))?;
        let user = format!("Here are the posts:\n{payload}");
        debug!(posts = evidence.len(), model = self.claude.model(), "Extraction request");

        self.claude
            .extract(EXTRACTOR_SYSTEM, user)
            .await
            .map_err(ai_error)
    }
}
