pub mod error;
pub mod types;

pub use error::{RedditError, Result};
pub use types::{RedditComment, RedditCredentials, RedditPost};

use std::time::{Duration, Instant};

use reqwest::header::{HeaderMap, CONTENT_TYPE, USER_AGENT};
use reqwest::{RequestBuilder, Response};
use tokio::sync::Mutex;

use types::{parse_comment_thread, parse_search_listing, TokenResponse};

const AUTH_URL: &str = "https://www.reddit.com/api/v1/access_token";
const API_URL: &str = "https://oauth.reddit.com";

/// Refresh the token this long before Reddit says it expires.
const TOKEN_SLACK: Duration = Duration::from_secs(60);

struct AccessToken {
    token: String,
    expires_at: Instant,
}

pub struct RedditClient {
    client: reqwest::Client,
    credentials: RedditCredentials,
    token: Mutex<Option<AccessToken>>,
}

impl RedditClient {
    pub fn new(credentials: RedditCredentials) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            client,
            credentials,
            token: Mutex::new(None),
        }
    }

    /// Search all of Reddit for `query` within `time_filter`
    /// (`hour|day|week|month|year|all`), best matches first.
    pub async fn search(&self, query: &str, time_filter: &str, limit: u32) -> Result<Vec<RedditPost>> {
        tracing::info!(query, time_filter, limit, "reddit: searching");

        let url = format!("{API_URL}/r/all/search");
        let limit = limit.to_string();
        let request = self.client.get(&url).query(&[
            ("q", query),
            ("t", time_filter),
            ("limit", limit.as_str()),
            ("sort", "relevance"),
            ("type", "link"),
            ("raw_json", "1"),
        ]);

        let body = self.send_authorized(request).await?;
        let posts = parse_search_listing(body)?;
        tracing::info!(query, count = posts.len(), "reddit: search complete");
        Ok(posts)
    }

    /// Highest-ranked top-level comments on a submission. Nested replies
    /// are not requested.
    pub async fn top_comments(&self, post_id: &str, limit: u32) -> Result<Vec<RedditComment>> {
        tracing::debug!(post_id, limit, "reddit: fetching comments");

        let url = format!("{API_URL}/comments/{post_id}");
        let limit_param = limit.to_string();
        let request = self.client.get(&url).query(&[
            ("sort", "top"),
            ("limit", limit_param.as_str()),
            ("depth", "1"),
            ("raw_json", "1"),
        ]);

        let body = self.send_authorized(request).await?;
        parse_comment_thread(body, limit as usize)
    }

    /// Cheap authenticated read to confirm credentials work.
    pub async fn probe(&self) -> Result<()> {
        let url = format!("{API_URL}/r/test/hot");
        let request = self.client.get(&url).query(&[("limit", "1")]);
        let body = self.send_authorized(request).await?;
        parse_search_listing(body)?;
        tracing::info!(user_agent = %self.credentials.user_agent(), "reddit: credentials verified");
        Ok(())
    }

    async fn send_authorized(&self, request: RequestBuilder) -> Result<serde_json::Value> {
        let token = self.access_token().await?;
        let resp = request
            .bearer_auth(token)
            .header(USER_AGENT, self.credentials.user_agent())
            .send()
            .await?;

        log_rate_limit(resp.headers());

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            // Token revoked or expired early; force a fresh exchange next call.
            *self.token.lock().await = None;
            return Err(RedditError::Auth("access token rejected".into()));
        }
        let resp = ensure_success(resp).await?;
        Ok(resp.json().await?)
    }

    async fn access_token(&self) -> Result<String> {
        let mut slot = self.token.lock().await;
        if let Some(token) = slot.as_ref() {
            if Instant::now() < token.expires_at {
                return Ok(token.token.clone());
            }
        }

        tracing::debug!("reddit: exchanging client credentials for token");
        let resp = self
            .client
            .post(AUTH_URL)
            .basic_auth(&self.credentials.client_id, Some(&self.credentials.client_secret))
            .header(USER_AGENT, self.credentials.user_agent())
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body("grant_type=client_credentials")
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RedditError::Auth(format!("token exchange returned {status}: {body}")));
        }

        let token: TokenResponse = resp.json().await?;
        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_SLACK);
        *slot = Some(AccessToken {
            token: token.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });
        Ok(token.access_token)
    }
}

async fn ensure_success(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(RedditError::Api {
        status: status.as_u16(),
        message: body,
    })
}

fn log_rate_limit(headers: &HeaderMap) {
    let remaining = headers
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<f64>().ok());
    if let Some(remaining) = remaining {
        if remaining < 5.0 {
            let reset = headers
                .get("x-ratelimit-reset")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("?");
            tracing::warn!(remaining, reset_secs = reset, "reddit: rate limit nearly exhausted");
        } else {
            tracing::debug!(remaining, "reddit: rate limit");
        }
    }
}
