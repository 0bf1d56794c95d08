use hazard_common::{NewPost, PipelineConfig, Query, RecencyWindow, Result};
use tracing::{info, warn};

use crate::pipeline::stats::{Stage, StageSummary};
use crate::traits::{ContentSource, HazardStore};

/// Search limits applied to every query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchBounds {
    pub result_limit: u32,
    pub recency_window: RecencyWindow,
}

impl From<&PipelineConfig> for FetchBounds {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            result_limit: config.result_limit,
            recency_window: config.recency_window,
        }
    }
}

/// What one query did to the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOutcome {
    /// Ids of posts created by this query.
    pub created: Vec<i64>,
    pub skipped_duplicate: usize,
}

/// Search once and store every hit whose url is new. Known urls are left
/// untouched.
pub async fn fetch_query(
    source: &dyn ContentSource,
    store: &dyn HazardStore,
    query: &Query,
    bounds: FetchBounds,
) -> Result<QueryOutcome> {
    info!(query = %query.text, window = %bounds.recency_window, "Searching");

    let hits = source
        .search(&query.text, bounds.recency_window, bounds.result_limit)
        .await?;

    let mut outcome = QueryOutcome::default();
    for hit in hits.into_iter().take(bounds.result_limit as usize) {
        if store.find_post_by_url(&hit.url).await?.is_some() {
            info!(url = %hit.url, "Skipping duplicate post");
            outcome.skipped_duplicate += 1;
            continue;
        }

        let title = hit.title.clone();
        let score = hit.score;
        let subcommunity = hit.subcommunity.clone();
        match store.insert_post(&NewPost::from_source(hit, query)).await? {
            Some(post) => {
                info!(post_id = post.id, %title, score, %subcommunity, "Stored post");
                outcome.created.push(post.id);
            }
            // Lost a race with another writer for the same url.
            None => outcome.skipped_duplicate += 1,
        }
    }

    Ok(outcome)
}

/// Run every query in order. A failing query is recorded and the rest still run.
pub async fn fetch_queries<I>(
    source: &dyn ContentSource,
    store: &dyn HazardStore,
    queries: I,
    bounds: FetchBounds,
) -> StageSummary
where
    I: IntoIterator<Item = Query>,
{
    let mut summary = StageSummary::new(Stage::Fetch);

    for query in queries {
        match fetch_query(source, store, &query, bounds).await {
            Ok(outcome) => {
                summary.succeeded += outcome.created.len();
                summary.skipped_duplicate += outcome.skipped_duplicate;
            }
            Err(e) => {
                warn!(query = %query.text, error = %e, "Query failed");
                summary.record_failure(format!("query {:?}", query.text), &e);
            }
        }
    }

    info!(
        stored = summary.succeeded,
        duplicates = summary.skipped_duplicate,
        failed = summary.failed.len(),
        "Fetch complete"
    );
    summary
}
