//! `OpenAI` and `OpenAI`-compatible chat-completions provider

use super::streaming::{decode_sse, EventStream};
use super::types::{ChatRequest, ToolDefinition};
use super::{ChatProvider, LlmError};
use crate::conversation::Message;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Streaming client for one `/chat/completions` endpoint
pub struct OpenAIProvider {
    client: Client,
    api_key: String,
    endpoint: String,
}

impl OpenAIProvider {
    /// `base_url` points at an `OpenAI`-compatible API root (the part before
    /// `/chat/completions`); `None` means api.openai.com.
    pub fn new(api_key: impl Into<String>, base_url: Option<&str>) -> Result<Self, LlmError> {
        let root = base_url
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/');

        // Connect timeout only: a streamed turn may legitimately run long.
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| LlmError::unknown(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            endpoint: format!("{root}/chat/completions"),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn translate_request(request: &ChatRequest) -> WireRequest<'_> {
        WireRequest {
            model: &request.model,
            messages: &request.messages,
            tools: request
                .tools
                .iter()
                .map(|tool| WireTool {
                    r#type: "function",
                    function: tool,
                })
                .collect(),
            stream: true,
        }
    }
}

#[async_trait]
impl ChatProvider for OpenAIProvider {
    async fn stream_chat(&self, request: &ChatRequest) -> Result<EventStream, LlmError> {
        let body = Self::translate_request(request);

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::network(format!("Request timeout: {e}"))
                } else if e.is_connect() {
                    LlmError::network(format!("Connection failed: {e}"))
                } else {
                    LlmError::unknown(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .map_err(|e| LlmError::network(format!("Failed to read response: {e}")))?;
            let message = serde_json::from_str::<WireErrorResponse>(&body)
                .map_or(body, |resp| resp.error.message);
            return Err(LlmError::from_status(status.as_u16(), &message));
        }

        Ok(decode_sse(response.bytes_stream()))
    }

    fn name(&self) -> &str {
        &self.endpoint
    }
}

// Wire types

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool<'a>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct WireTool<'a> {
    r#type: &'static str,
    function: &'a ToolDefinition,
}

#[derive(Debug, Deserialize)]
struct WireErrorResponse {
    error: WireError,
}

#[derive(Debug, Deserialize)]
struct WireError {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::game_tool_definitions;

    #[test]
    fn test_endpoint_from_base_url() {
        let default = OpenAIProvider::new("sk", None).unwrap();
        assert_eq!(default.endpoint(), "https://api.openai.com/v1/chat/completions");

        let custom = OpenAIProvider::new("sk", Some("https://openrouter.ai/api/v1/")).unwrap();
        assert_eq!(custom.endpoint(), "https://openrouter.ai/api/v1/chat/completions");

        let blank = OpenAIProvider::new("sk", Some("  ")).unwrap();
        assert_eq!(blank.endpoint(), "https://api.openai.com/v1/chat/completions");
    }

    #[test]
    fn test_request_wire_shape() {
        let request = ChatRequest::new("gpt-5-mini", vec![Message::user("Hello")])
            .with_tools(game_tool_definitions());
        let json = serde_json::to_value(OpenAIProvider::translate_request(&request)).unwrap();

        assert_eq!(json["model"], "gpt-5-mini");
        assert_eq!(json["stream"], true);
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "Hello");
        assert_eq!(json["tools"][0]["type"], "function");
        assert_eq!(json["tools"][0]["function"]["name"], "eliminateCharacter");
        assert!(json["tools"][1]["function"]["parameters"].is_object());
    }
}
