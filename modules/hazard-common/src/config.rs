use std::env;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::info;
use typed_builder::TypedBuilder;

use crate::error::{HazardError, Result};

const DEFAULT_MODEL: &str = "claude-haiku-4-5-20251001";
const DEFAULT_PLATFORM: &str = "linux";

/// How far back a content search reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecencyWindow {
    Hour,
    Day,
    Week,
    Month,
    Year,
    All,
}

impl RecencyWindow {
    pub fn as_str(self) -> &'static str {
        match self {
            RecencyWindow::Hour => "hour",
            RecencyWindow::Day => "day",
            RecencyWindow::Week => "week",
            RecencyWindow::Month => "month",
            RecencyWindow::Year => "year",
            RecencyWindow::All => "all",
        }
    }
}

impl fmt::Display for RecencyWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecencyWindow {
    type Err = HazardError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "hour" => Ok(RecencyWindow::Hour),
            "day" => Ok(RecencyWindow::Day),
            "week" => Ok(RecencyWindow::Week),
            "month" => Ok(RecencyWindow::Month),
            "year" => Ok(RecencyWindow::Year),
            "all" => Ok(RecencyWindow::All),
            other => Err(HazardError::Config(format!(
                "recency window must be one of hour|day|week|month|year|all, got {other:?}"
            ))),
        }
    }
}

/// Caller-supplied knobs for a pipeline run.
#[derive(Debug, Clone, PartialEq, TypedBuilder)]
pub struct PipelineConfig {
    /// Posts per classification request.
    #[builder(default = 5)]
    pub batch_size: usize,
    /// Max search hits per query.
    #[builder(default = 5)]
    pub result_limit: u32,
    #[builder(default = RecencyWindow::Day)]
    pub recency_window: RecencyWindow,
    /// Max top-level comments pulled per verified post.
    #[builder(default = 10)]
    pub comment_cap: u32,
    /// Most-recent verified posts fed to one extraction.
    #[builder(default = 5)]
    pub evidence_posts: usize,
    /// Highest-scored comments attached to each evidence post.
    #[builder(default = 10)]
    pub evidence_comments: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl PipelineConfig {
    /// Page size actually used; a zero batch would never make progress.
    pub fn page_size(&self) -> usize {
        self.batch_size.max(1)
    }

    /// Evidence posts per extraction; zero would turn real evidence into no signal.
    pub fn evidence_post_limit(&self) -> usize {
        self.evidence_posts.max(1)
    }
}

/// Credentials and endpoints, loaded from the environment.
#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub anthropic_api_key: String,
    pub anthropic_model: String,
    pub reddit_client_id: String,
    pub reddit_client_secret: String,
    pub reddit_username: String,
    pub reddit_platform: String,
}

impl Config {
    /// Load from environment variables, after folding in `./.env` if present.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Ok(Self {
            database_url: required_env("DATABASE_URL")?,
            anthropic_api_key: required_env("ANTHROPIC_API_KEY")?,
            anthropic_model: env::var("ANTHROPIC_MODEL")
                .unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            reddit_client_id: required_env("REDDIT_CLIENT_ID")?,
            reddit_client_secret: required_env("REDDIT_CLIENT_SECRET")?,
            reddit_username: required_env("REDDIT_USERNAME")?,
            reddit_platform: env::var("REDDIT_PLATFORM")
                .unwrap_or_else(|_| DEFAULT_PLATFORM.to_string()),
        })
    }

    /// Only the database is needed for seeding and listing.
    pub fn store_from_env() -> Result<String> {
        dotenvy::dotenv().ok();
        required_env("DATABASE_URL")
    }

    /// Log which settings are present without printing secrets.
    pub fn log_redacted(&self) {
        info!(
            database_url = redact(&self.database_url),
            anthropic_api_key = redact(&self.anthropic_api_key),
            anthropic_model = %self.anthropic_model,
            reddit_client_id = redact(&self.reddit_client_id),
            reddit_client_secret = redact(&self.reddit_client_secret),
            reddit_username = %self.reddit_username,
            reddit_platform = %self.reddit_platform,
            "Loaded configuration"
        );
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &redact(&self.database_url))
            .field("anthropic_api_key", &redact(&self.anthropic_api_key))
            .field("anthropic_model", &self.anthropic_model)
            .field("reddit_client_id", &redact(&self.reddit_client_id))
            .field("reddit_client_secret", &redact(&self.reddit_client_secret))
            .field("reddit_username", &self.reddit_username)
            .field("reddit_platform", &self.reddit_platform)
            .finish()
    }
}

fn redact(value: &str) -> &'static str {
    if value.is_empty() {
        "<missing>"
    } else {
        "<set>"
    }
}

fn required_env(key: &str) -> Result<String> {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| HazardError::Config(format!("{key} environment variable is required")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_defaults() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.batch_size, 5);
        assert_eq!(cfg.result_limit, 5);
        assert_eq!(cfg.recency_window, RecencyWindow::Day);
        assert_eq!(cfg.comment_cap, 10);
        assert_eq!(cfg.evidence_posts, 5);
        assert_eq!(cfg.evidence_comments, 10);
    }

    #[test]
    fn zero_batch_size_still_pages() {
        let cfg = PipelineConfig::builder().batch_size(0).build();
        assert_eq!(cfg.page_size(), 1);

        let cfg = PipelineConfig::builder().evidence_posts(0).build();
        assert_eq!(cfg.evidence_post_limit(), 1);
    }

    #[test]
    fn recency_window_round_trips_through_text() {
        for w in ["hour", "day", "week", "month", "year", "all"] {
            assert_eq!(w.parse::<RecencyWindow>().unwrap().to_string(), w);
        }
        assert!("fortnight".parse::<RecencyWindow>().is_err());
    }

    #[test]
    fn debug_never_prints_secrets() {
        let cfg = Config {
            database_url: "postgres://u:hunter2@db/x".into(),
            anthropic_api_key: "sk-ant-secret".into(),
            anthropic_model: DEFAULT_MODEL.into(),
            reddit_client_id: "id".into(),
            reddit_client_secret: "shh".into(),
            reddit_username: "coastwatch".into(),
            reddit_platform: DEFAULT_PLATFORM.into(),
        };
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("sk-ant-secret"));
        assert!(!rendered.contains("shh"));
        assert!(rendered.contains("coastwatch"));
    }
}
