use hazard_common::{HazardError, NewComment, Result};
use tracing::{debug, info, warn};

use crate::pipeline::stats::{Stage, StageSummary};
use crate::traits::{ContentSource, HazardStore};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpandOutcome {
    pub post_id: i64,
    pub created: usize,
    pub skipped_duplicate: usize,
}

/// Pull up to `cap` top-level comments for one verified post. Anything not
/// yet stored for the post is appended; existing comments are never touched.
///
/// Rejects posts that are missing, unclassified, or judged irrelevant with
/// [`HazardError::NotEligible`] before any network call.
pub async fn expand_post(
    source: &dyn ContentSource,
    store: &dyn HazardStore,
    post_id: i64,
    cap: u32,
) -> Result<ExpandOutcome> {
    let post = store
        .get_post(post_id)
        .await?
        .ok_or_else(|| HazardError::not_eligible(post_id, "no such post"))?;
    if !post.tested {
        return Err(HazardError::not_eligible(post_id, "not yet classified"));
    }
    if !post.verified {
        return Err(HazardError::not_eligible(post_id, "classified as not a hazard"));
    }

    let entries = source.top_comments(&post.external_id, cap).await?;

    let mut outcome = ExpandOutcome {
        post_id,
        ..Default::default()
    };
    for entry in entries.into_iter().take(cap as usize) {
        if store.comment_exists(post_id, &entry.external_id).await? {
            debug!(post_id, comment = %entry.external_id, "Comment already stored");
            outcome.skipped_duplicate += 1;
            continue;
        }
        match store.insert_comment(&NewComment::top_level(post_id, entry)).await? {
            Some(_) => outcome.created += 1,
            None => outcome.skipped_duplicate += 1,
        }
    }

    info!(
        post_id,
        created = outcome.created,
        duplicates = outcome.skipped_duplicate,
        "Expanded comments"
    );
    Ok(outcome)
}

/// Expand every verified post, optionally for one location only.
pub async fn expand_verified(
    source: &dyn ContentSource,
    store: &dyn HazardStore,
    location: Option<&str>,
    cap: u32,
) -> StageSummary {
    let mut summary = StageSummary::new(Stage::Expand);

    let posts = match store.verified_posts(location).await {
        Ok(posts) => posts,
        Err(e) => {
            warn!(error = %e, "Could not load verified posts");
            summary.record_failure("verified posts", &e);
            return summary;
        }
    };

    for post in posts {
        match expand_post(source, store, post.id, cap).await {
            Ok(outcome) => {
                summary.succeeded += outcome.created;
                summary.skipped_duplicate += outcome.skipped_duplicate;
            }
            Err(e) => {
                warn!(post_id = post.id, error = %e, "Comment expansion failed");
                summary.record_failure(format!("post {}", post.id), &e);
            }
        }
    }

    summary
}
