// Trait abstractions for the pipeline's external boundaries.
//
// ContentSource: search + top-level thread fetch against the social platform.
// RelevanceClassifier / IncidentExtractor: the two LLM calls.
// HazardStore: persisted posts, comments and incidents.
//
// Stages take `&dyn Trait` so tests run against the mocks in `testing`
// with no network and no database.

use async_trait::async_trait;

use hazard_common::{
    Comment, EvidencePost, HazardError, IncidentDraft, IncidentExtraction, NewComment, NewPost,
    Post, RecencyWindow, Result, SourceComment, SourcePost,
};
use hazard_store::PgStore;
use reddit_client::{RedditClient, RedditError};

use crate::aggregator::RawIncident;
use crate::classifier::{ClassificationItem, Verdict};

// ---------------------------------------------------------------------------
// ContentSource
// ---------------------------------------------------------------------------

#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Best matches for `query` within `window`, at most `limit` of them.
    async fn search(
        &self,
        query: &str,
        window: RecencyWindow,
        limit: u32,
    ) -> Result<Vec<SourcePost>>;

    /// Highest-ranked top-level entries of a post's discussion thread.
    async fn top_comments(&self, external_id: &str, limit: u32) -> Result<Vec<SourceComment>>;
}

#[async_trait]
impl ContentSource for RedditClient {
    async fn search(
        &self,
        query: &str,
        window: RecencyWindow,
        limit: u32,
    ) -> Result<Vec<SourcePost>> {
        let posts = RedditClient::search(self, query, window.as_str(), limit)
            .await
            .map_err(transport)?;

        Ok(posts
            .into_iter()
            .take(limit as usize)
            .map(|p| {
                let url = if p.url.is_empty() {
                    format!("https://www.reddit.com{}", p.permalink)
                } else {
                    p.url
                };
                SourcePost {
                    external_id: p.id,
                    title: p.title,
                    body: p.selftext,
                    url,
                    score: p.score,
                    subcommunity: p.subreddit,
                }
            })
            .collect())
    }

    async fn top_comments(&self, external_id: &str, limit: u32) -> Result<Vec<SourceComment>> {
        let comments = RedditClient::top_comments(self, external_id, limit)
            .await
            .map_err(transport)?;

        Ok(comments
            .into_iter()
            .map(|c| SourceComment {
                external_id: c.id,
                text: c.body,
                score: c.score,
            })
            .collect())
    }
}

/// Every content-source failure, auth included, is a transport failure.
fn transport(err: RedditError) -> HazardError {
    HazardError::Transport(err.to_string())
}

// ---------------------------------------------------------------------------
// LLM capabilities
// ---------------------------------------------------------------------------

#[async_trait]
pub trait RelevanceClassifier: Send + Sync {
    /// One verdict per submitted item. Callers validate the shape.
    async fn classify(&self, items: &[ClassificationItem]) -> Result<Vec<Verdict>>;
}

#[async_trait]
pub trait IncidentExtractor: Send + Sync {
    /// Synthesize one incident across all the supplied evidence.
    async fn extract(&self, evidence: &[EvidencePost]) -> Result<RawIncident>;
}

// ---------------------------------------------------------------------------
// HazardStore
// ---------------------------------------------------------------------------

#[async_trait]
pub trait HazardStore: Send + Sync {
    async fn find_post_by_url(&self, url: &str) -> Result<Option<Post>>;

    /// `None` when the url is already stored.
    async fn insert_post(&self, post: &NewPost) -> Result<Option<Post>>;

    async fn get_post(&self, id: i64) -> Result<Option<Post>>;

    /// Posts with `tested = false`, oldest first.
    async fn untested_posts(&self) -> Result<Vec<Post>>;

    async fn verified_posts(&self, location: Option<&str>) -> Result<Vec<Post>>;

    /// Sets `tested` and `verified` together, only on an untested post.
    /// Returns whether the post changed.
    async fn record_verdict(&self, post_id: i64, verified: bool) -> Result<bool>;

    async fn comment_exists(&self, post_id: i64, external_id: &str) -> Result<bool>;

    /// `None` when the post is not verified or the comment already exists.
    async fn insert_comment(&self, comment: &NewComment) -> Result<Option<Comment>>;

    async fn evidence_for_location(
        &self,
        location: &str,
        post_limit: usize,
        comment_limit: usize,
    ) -> Result<Vec<EvidencePost>>;

    /// Incident row plus evidence links, all or nothing.
    async fn create_incident(
        &self,
        location: &str,
        draft: &IncidentDraft,
        post_ids: &[i64],
    ) -> Result<IncidentExtraction>;

    async fn recent_incidents(&self, limit: usize) -> Result<Vec<IncidentExtraction>>;
}

#[async_trait]
impl HazardStore for PgStore {
    async fn find_post_by_url(&self, url: &str) -> Result<Option<Post>> {
        Ok(PgStore::find_post_by_url(self, url).await?)
    }

    async fn insert_post(&self, post: &NewPost) -> Result<Option<Post>> {
        Ok(PgStore::insert_post(self, post).await?)
    }

    async fn get_post(&self, id: i64) -> Result<Option<Post>> {
        Ok(PgStore::get_post(self, id).await?)
    }

    async fn untested_posts(&self) -> Result<Vec<Post>> {
        Ok(PgStore::untested_posts(self).await?)
    }

    async fn verified_posts(&self, location: Option<&str>) -> Result<Vec<Post>> {
        Ok(PgStore::verified_posts(self, location).await?)
    }

    async fn record_verdict(&self, post_id: i64, verified: bool) -> Result<bool> {
        Ok(PgStore::record_verdict(self, post_id, verified).await?)
    }

    async fn comment_exists(&self, post_id: i64, external_id: &str) -> Result<bool> {
        Ok(PgStore::comment_exists(self, post_id, external_id).await?)
    }

    async fn insert_comment(&self, comment: &NewComment) -> Result<Option<Comment>> {
        Ok(PgStore::insert_comment(self, comment).await?)
    }

    async fn evidence_for_location(
        &self,
        location: &str,
        post_limit: usize,
        comment_limit: usize,
    ) -> Result<Vec<EvidencePost>> {
        Ok(PgStore::evidence_for_location(self, location, post_limit, comment_limit).await?)
    }

    async fn create_incident(
        &self,
        location: &str,
        draft: &IncidentDraft,
        post_ids: &[i64],
    ) -> Result<IncidentExtraction> {
        Ok(PgStore::create_incident(self, location, draft, post_ids).await?)
    }

    async fn recent_incidents(&self, limit: usize) -> Result<Vec<IncidentExtraction>> {
        Ok(PgStore::recent_incidents(self, limit).await?)
    }
}
