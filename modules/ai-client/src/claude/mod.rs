mod client;
pub(crate) mod types;

use std::time::Duration;

use tracing::warn;

use crate::error::{AiError, Result};
use crate::schema::StructuredOutput;
use crate::util::strip_code_blocks;

use client::ClaudeClient;
use types::*;

const STRUCTURED_TOOL: &str = "structured_response";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

// =============================================================================
// Claude
// =============================================================================

#[derive(Clone)]
pub struct Claude {
    api_key: String,
    pub(crate) model: String,
    base_url: Option<String>,
    max_tokens: u32,
    http: reqwest::Client,
}

impl Claude {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: None,
            max_tokens: 4096,
            http,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn client(&self) -> ClaudeClient {
        let client = ClaudeClient::new(&self.api_key, self.http.clone());
        match self.base_url {
            Some(ref url) => client.with_base_url(url),
            None => client,
        }
    }

    /// Ask for a reply shaped like `T`, forcing a single tool call whose input
    /// schema is `T`'s JSON schema. Any reply that does not deserialize into `T`
    /// is an `AiError::Parse`.
    pub async fn extract<T: StructuredOutput>(
        &self,
        system_prompt: impl Into<String>,
        user_prompt: impl Into<String>,
    ) -> Result<T> {
        let request = ChatRequest::new(&self.model)
            .system(system_prompt)
            .message(WireMessage::user(user_prompt))
            .max_tokens(self.max_tokens)
            .temperature(0.0)
            .forced_tool(ToolDefinitionWire {
                name: STRUCTURED_TOOL.to_string(),
                description: format!("Record the answer as a {}.", T::type_name()),
                input_schema: T::tool_schema(),
            });

        let response = self.client().chat(&request).await?;

        if response.truncated() {
            return Err(AiError::Parse(format!(
                "reply hit max_tokens ({}) before completing",
                self.max_tokens
            )));
        }

        if let Some(input) = response.tool_input(STRUCTURED_TOOL) {
            return serde_json::from_value(input.clone())
                .map_err(|e| AiError::Parse(format!("reply does not match schema: {e}")));
        }

        // Some models ignore tool_choice and answer in prose-wrapped JSON.
        match response.text() {
            Some(text) => {
                warn!(model = %self.model, "No tool call in reply, parsing text body");
                serde_json::from_str(strip_code_blocks(text))
                    .map_err(|e| AiError::Parse(format!("text reply is not valid JSON: {e}")))
            }
            None => Err(AiError::Parse("no structured output in Claude reply".into())),
        }
    }

    pub async fn chat_completion(
        &self,
        system: impl Into<String>,
        user: impl Into<String>,
    ) -> Result<String> {
        let request = ChatRequest::new(&self.model)
            .system(system)
            .message(WireMessage::user(user))
            .max_tokens(self.max_tokens)
            .temperature(0.0);

        let response = self.client().chat(&request).await?;

        response
            .text()
            .map(str::to_string)
            .ok_or_else(|| AiError::Parse("no text in Claude reply".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claude_new() {
        let ai = Claude::new("sk-ant-test", "claude-haiku-4-5-20251001");
        assert_eq!(ai.model(), "claude-haiku-4-5-20251001");
        assert_eq!(ai.max_tokens, 4096);
        assert!(ai.base_url.is_none());
    }

    #[test]
    fn claude_builders() {
        let ai = Claude::new("sk-ant-test", "m")
            .with_base_url("http://localhost:9999")
            .with_max_tokens(1024);
        assert_eq!(ai.base_url.as_deref(), Some("http://localhost:9999"));
        assert_eq!(ai.max_tokens, 1024);
    }
}
