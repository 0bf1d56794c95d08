use serde::Deserialize;

use crate::error::{RedditError, Result};

/// App-only OAuth credentials plus the identity used in the User-Agent.
#[derive(Debug, Clone)]
pub struct RedditCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    /// Platform tag Reddit asks for at the front of the User-Agent.
    pub platform: String,
}

impl RedditCredentials {
    /// `<platform>:oceanhazard:1.0 (by u/<username>)`
    pub fn user_agent(&self) -> String {
        format!("{}:oceanhazard:1.0 (by u/{})", self.platform, self.username)
    }
}

/// Response from `POST /api/v1/access_token`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_expiry")]
    pub expires_in: u64,
}

fn default_expiry() -> u64 {
    3600
}

/// Reddit's generic envelope: `{kind, data}`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Thing<T> {
    pub kind: String,
    pub data: T,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ListingData<T> {
    pub children: Vec<Thing<T>>,
}

pub(crate) type Listing<T> = Thing<ListingData<T>>;

/// A submission (`t3`).
#[derive(Debug, Clone, Deserialize)]
pub struct RedditPost {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub selftext: String,
    pub url: String,
    #[serde(default)]
    pub permalink: String,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub subreddit: String,
}

/// A comment (`t1`).
#[derive(Debug, Clone, Deserialize)]
pub struct RedditComment {
    pub id: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub parent_id: String,
}

impl RedditComment {
    /// Replies to the submission itself carry a `t3_` parent.
    pub fn is_top_level(&self) -> bool {
        self.parent_id.is_empty() || self.parent_id.starts_with("t3_")
    }
}

/// Pull submissions out of a search listing.
pub(crate) fn parse_search_listing(value: serde_json::Value) -> Result<Vec<RedditPost>> {
    let listing: Listing<serde_json::Value> = serde_json::from_value(value)?;
    if listing.kind != "Listing" {
        return Err(RedditError::Parse(format!(
            "expected Listing, got {}",
            listing.kind
        )));
    }

    listing
        .data
        .children
        .into_iter()
        .filter(|child| child.kind == "t3")
        .map(|child| serde_json::from_value(child.data).map_err(RedditError::from))
        .collect()
}

/// Pull up to `limit` top-level comments out of a `/comments/{id}` response,
/// which is `[submission listing, comment listing]`. "Load more" stubs are
/// dropped; their contents are never expanded.
pub(crate) fn parse_comment_thread(
    value: serde_json::Value,
    limit: usize,
) -> Result<Vec<RedditComment>> {
    let mut listings: Vec<Listing<serde_json::Value>> = serde_json::from_value(value)?;
    if listings.len() < 2 {
        return Err(RedditError::Parse(format!(
            "comment thread should hold 2 listings, got {}",
            listings.len()
        )));
    }
    let comments = listings.swap_remove(1);

    let mut out = Vec::new();
    for child in comments.data.children {
        if child.kind != "t1" {
            continue;
        }
        let comment: RedditComment = serde_json::from_value(child.data)?;
        if comment.is_top_level() && !comment.body.is_empty() {
            out.push(comment);
        }
        if out.len() >= limit {
            break;
        }
    }
    Ok(out)
}
