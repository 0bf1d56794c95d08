use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use tracing::debug;

use super::types::*;
use crate::error::{AiError, Result};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub(crate) struct ClaudeClient {
    api_key: String,
    http: reqwest::Client,
    base_url: String,
}

impl ClaudeClient {
    pub fn new(api_key: &str, http: reqwest::Client) -> Self {
        Self {
            api_key: api_key.to_string(),
            http,
            base_url: ANTHROPIC_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&self.api_key)
                .map_err(|e| AiError::Config(format!("invalid API key header: {e}")))?,
        );
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let url = format!("{}/messages", self.base_url);

        debug!(model = %request.model, tools = request.tools.len(), "Claude chat request");

        let response = self
            .http
            .post(&url)
            .headers(self.headers()?)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AiError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let text = response.text().await?;
        let body = decode_response(&text)?;
        if let Some(usage) = &body.usage {
            debug!(
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                "Claude usage"
            );
        }
        Ok(body)
    }
}

/// A 2xx body that is not a Messages reply is bad output, not a network fault.
fn decode_response(text: &str) -> Result<ChatResponse> {
    serde_json::from_str(text)
        .map_err(|e| AiError::Parse(format!("undecodable reply body: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undecodable_success_body_is_malformed_output() {
        let err = decode_response("<html>gateway hiccup</html>").unwrap_err();
        assert!(matches!(err, AiError::Parse(_)));
        assert!(err.is_malformed_output());

        let err = decode_response(r#"{"content": "not a list"}"#).unwrap_err();
        assert!(err.is_malformed_output());
    }

    #[test]
    fn well_formed_body_decodes() {
        let body = r#"{"content": [{"type": "text", "text": "hi"}], "stop_reason": "end_turn"}"#;
        let response = decode_response(body).unwrap();
        assert_eq!(response.text(), Some("hi"));
    }
}
