use std::collections::{HashMap, HashSet};

use ai_client::truncate_to_char_boundary;
use hazard_common::{HazardError, Post, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::pipeline::stats::{Stage, StageSummary};
use crate::traits::{HazardStore, RelevanceClassifier};

/// Post bodies are cut to this many bytes before they go to the classifier.
const MAX_BODY_BYTES: usize = 2_000;

/// One post as the classifier sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassificationItem {
    pub id: i64,
    pub title: String,
    pub body: String,
    /// The query that surfaced the post. Context only.
    pub search_query: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Verdict {
    pub id: i64,
    pub is_hazard: bool,
}

pub fn classification_items(page: &[Post]) -> Vec<ClassificationItem> {
    page.iter()
        .map(|post| ClassificationItem {
            id: post.id,
            title: post.title.clone(),
            body: truncate_to_char_boundary(&post.body, MAX_BODY_BYTES).to_string(),
            search_query: post.search_query(),
        })
        .collect()
}

/// Check a reply against the page it answers: every id exactly once, no
/// strangers. Returns the verdicts in page order.
pub fn validate_verdicts(page: &[Post], verdicts: Vec<Verdict>) -> Result<Vec<Verdict>> {
    let expected: HashSet<i64> = page.iter().map(|p| p.id).collect();
    let mut by_id: HashMap<i64, Verdict> = HashMap::with_capacity(verdicts.len());

    for verdict in verdicts {
        if !expected.contains(&verdict.id) {
            return Err(HazardError::Schema(format!(
                "verdict for id {} which was not submitted",
                verdict.id
            )));
        }
        if by_id.insert(verdict.id, verdict).is_some() {
            return Err(HazardError::Schema(format!(
                "id {} judged more than once",
                verdict.id
            )));
        }
    }

    let missing: Vec<i64> = page
        .iter()
        .map(|p| p.id)
        .filter(|id| !by_id.contains_key(id))
        .collect();
    if !missing.is_empty() {
        return Err(HazardError::Schema(format!("no verdict for ids {missing:?}")));
    }

    Ok(page.iter().filter_map(|p| by_id.remove(&p.id)).collect())
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct PageOutcome {
    classified: usize,
    verified: usize,
    /// Claimed by a concurrent run between selection and write.
    already_tested: usize,
}

/// Verdicts are written one at a time; `outcome` counts the writes that
/// landed even when a later one fails.
async fn classify_page(
    classifier: &dyn RelevanceClassifier,
    store: &dyn HazardStore,
    page: &[Post],
    outcome: &mut PageOutcome,
) -> Result<()> {
    let items = classification_items(page);
    let verdicts = classifier.classify(&items).await?;
    let verdicts = validate_verdicts(page, verdicts)?;

    for verdict in verdicts {
        if store.record_verdict(verdict.id, verdict.is_hazard).await? {
            outcome.classified += 1;
            if verdict.is_hazard {
                outcome.verified += 1;
            }
        } else {
            outcome.already_tested += 1;
        }
    }
    Ok(())
}

/// Classify every untested post, one page at a time. A page whose reply
/// fails validation is left entirely untested and the next page still runs.
/// If the store fails partway through a page, verdicts already written stay
/// and are counted.
pub async fn classify_untested(
    classifier: &dyn RelevanceClassifier,
    store: &dyn HazardStore,
    batch_size: usize,
) -> StageSummary {
    let mut summary = StageSummary::new(Stage::Classify);

    let posts = match store.untested_posts().await {
        Ok(posts) => posts,
        Err(e) => {
            warn!(error = %e, "Could not load untested posts");
            summary.record_failure("untested posts", &e);
            return summary;
        }
    };

    let page_size = batch_size.max(1);
    info!(posts = posts.len(), page_size, "Classifying untested posts");

    for (index, page) in posts.chunks(page_size).enumerate() {
        let number = index + 1;
        let mut outcome = PageOutcome::default();
        let result = classify_page(classifier, store, page, &mut outcome).await;
        summary.succeeded += outcome.classified;
        summary.skipped_duplicate += outcome.already_tested;

        match result {
            Ok(()) => info!(
                page = number,
                classified = outcome.classified,
                verified = outcome.verified,
                "Page classified"
            ),
            Err(e) => {
                let ids: Vec<i64> = page.iter().map(|p| p.id).collect();
                warn!(
                    page = number,
                    ?ids,
                    written = outcome.classified,
                    error = %e,
                    "Page failed; posts without a recorded verdict stay untested"
                );
                summary.record_failure(format!("page {number} (posts {ids:?})"), &e);
            }
        }
    }

    summary
}
