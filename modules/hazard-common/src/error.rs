use std::fmt;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, HazardError>;

#[derive(Error, Debug)]
pub enum HazardError {
    /// Content source or LLM unreachable, timed out, rejected credentials.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Classifier or extractor output failed validation.
    #[error("Schema violation: {0}")]
    Schema(String),

    #[error("Post {post_id} is not eligible: {reason}")]
    NotEligible { post_id: i64, reason: String },

    #[error("Store error: {0}")]
    Store(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// Failure classes reported per unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    Schema,
    Precondition,
    Store,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Transport => "transport",
            ErrorKind::Schema => "schema",
            ErrorKind::Precondition => "precondition",
            ErrorKind::Store => "store",
        };
        f.write_str(s)
    }
}

impl HazardError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            HazardError::Transport(_) => ErrorKind::Transport,
            HazardError::Schema(_) => ErrorKind::Schema,
            HazardError::NotEligible { .. } => ErrorKind::Precondition,
            HazardError::Store(_) | HazardError::Config(_) => ErrorKind::Store,
            HazardError::Anyhow(_) => ErrorKind::Transport,
        }
    }

    pub fn not_eligible(post_id: i64, reason: impl Into<String>) -> Self {
        HazardError::NotEligible {
            post_id,
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for HazardError {
    fn from(err: serde_json::Error) -> Self {
        HazardError::Schema(err.to_string())
    }
}
