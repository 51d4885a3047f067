//! Anthropic Messages API backend
//!
//! Talks to any server exposing `/v1/messages` with tool use: the hosted
//! Anthropic API, or a local server (Ollama 0.14+) speaking the same protocol.
//! Tool choice is always forced to the single offered tool.
//!
//! # Configuration
//!
//! Environment variables:
//! - `ANTHROPIC_COMPATIBLE_HOST`: Server URL (e.g., `http://mac:11434`)
//! - `ANTHROPIC_COMPATIBLE_MODEL`: Model to use (default: `qwen3-coder`)
//! - `ANTHROPIC_COMPATIBLE_API_KEY`: Sent as `x-api-key` (optional)

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::TokenUsage;

use super::{AIBackend, ForcedToolRequest, ToolCall, ToolCallOutcome, ToolSpec};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic Messages API request
#[derive(Debug, Serialize)]
pub struct MessagesRequest {
    pub model: String,
    pub max_tokens: u32,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Tool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
}

/// Message in conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: text.into(),
        }
    }
}

/// Forces the model to call one named tool
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolChoice {
    Tool { name: String },
}

/// Content block types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },

    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },

    /// Block types this client doesn't use (thinking, etc.)
    #[serde(other)]
    Other,
}

/// Tool definition (Anthropic format)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

impl From<&ToolSpec> for Tool {
    fn from(spec: &ToolSpec) -> Self {
        Self {
            name: spec.name.clone(),
            description: spec.description.clone(),
            input_schema: spec.input_schema.clone(),
        }
    }
}

/// Anthropic Messages API response
#[derive(Debug, Deserialize)]
pub struct MessagesResponse {
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub model: Option<String>,
    /// "end_turn", "tool_use", "max_tokens"
    pub stop_reason: Option<String>,
    pub usage: Option<Usage>,
}

/// Token usage information
#[derive(Debug, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl MessagesResponse {
    /// Extract all tool use blocks
    pub fn tool_uses(&self) -> Vec<(&str, &str, &serde_json::Value)> {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolUse { id, name, input } => {
                    Some((id.as_str(), name.as_str(), input))
                }
                _ => None,
            })
            .collect()
    }

    /// Extract text content from the response
    pub fn text(&self) -> Option<String> {
        let texts: Vec<_> = self
            .content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();

        if texts.is_empty() {
            None
        } else {
            Some(texts.join("\n"))
        }
    }

    fn into_outcome(self) -> ToolCallOutcome {
        let text = self.text();
        let usage = self
            .usage
            .as_ref()
            .map(|u| TokenUsage {
                input_tokens: u.input_tokens,
                output_tokens: u.output_tokens,
            })
            .unwrap_or_default();
        let tool_calls = self
            .content
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::ToolUse { name, input, .. } => Some(ToolCall {
                    name,
                    arguments: input,
                }),
                _ => None,
            })
            .collect();

        ToolCallOutcome {
            tool_calls,
            text,
            usage,
        }
    }
}

/// Backend for servers speaking the Anthropic Messages API
#[derive(Clone)]
pub struct AnthropicCompatBackend {
    http_client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl AnthropicCompatBackend {
    /// Create a new Anthropic-compatible backend
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: None,
        }
    }

    /// Create with an API key
    pub fn with_api_key(base_url: &str, model: &str, api_key: &str) -> Self {
        Self {
            api_key: Some(api_key.to_string()),
            ..Self::new(base_url, model)
        }
    }

    /// Create from environment (`ANTHROPIC_COMPATIBLE_*`)
    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var("ANTHROPIC_COMPATIBLE_HOST").ok()?;
        let model = std::env::var("ANTHROPIC_COMPATIBLE_MODEL")
            .unwrap_or_else(|_| "qwen3-coder".to_string());
        let mut backend = Self::new(&base_url, &model);
        backend.api_key = std::env::var("ANTHROPIC_COMPATIBLE_API_KEY").ok();
        Some(backend)
    }

    /// Build the wire request for a forced tool call
    pub fn build_request(&self, request: &ForcedToolRequest) -> MessagesRequest {
        MessagesRequest {
            model: self.model.clone(),
            max_tokens: request.max_tokens,
            messages: vec![Message::user(request.user.clone())],
            system: Some(request.system.clone()),
            tools: Some(vec![Tool::from(&request.tool)]),
            tool_choice: Some(ToolChoice::Tool {
                name: request.tool.name.clone(),
            }),
        }
    }

    /// Send a messages request
    pub async fn messages(&self, request: &MessagesRequest) -> Result<MessagesResponse> {
        debug!(
            model = %self.model,
            tools_count = request.tools.as_ref().map_or(0, |t| t.len()),
            "Sending Anthropic-compat request"
        );

        let response = self
            .http_client
            .post(format!("{}/v1/messages", self.base_url))
            // Local servers ignore the key but some require the header
            .header("x-api-key", self.api_key.as_deref().unwrap_or("ollama"))
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::ModelApi { status, body });
        }

        let messages_response: MessagesResponse = response.json().await?;

        debug!(
            stop_reason = ?messages_response.stop_reason,
            tool_uses = messages_response.tool_uses().len(),
            "Received Anthropic-compat response"
        );

        Ok(messages_response)
    }
}

#[async_trait]
impl AIBackend for AnthropicCompatBackend {
    async fn call_forced_tool(&self, request: &ForcedToolRequest) -> Result<ToolCallOutcome> {
        let wire = self.build_request(request);
        Ok(self.messages(&wire).await?.into_outcome())
    }

    async fn health_check(&self) -> bool {
        let mut req = self
            .http_client
            .get(format!("{}/v1/models", self.base_url))
            .header("anthropic-version", ANTHROPIC_VERSION);
        if let Some(key) = &self.api_key {
            req = req.header("x-api-key", key);
        }
        match req.send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn host(&self) -> &str {
        &self.base_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn forced() -> ForcedToolRequest {
        ForcedToolRequest {
            system: "Today is 2024-06-15.".into(),
            user: "coffee last week".into(),
            tool: ToolSpec::new("extract_search_filters", "d", json!({"type": "object"})),
            max_tokens: 1024,
        }
    }

    #[test]
    fn test_request_forces_tool() {
        let backend = AnthropicCompatBackend::new("http://localhost:11434/", "m");
        assert_eq!(backend.host(), "http://localhost:11434");

        let wire = serde_json::to_value(backend.build_request(&forced())).unwrap();
        assert_eq!(
            wire["tool_choice"],
            json!({"type": "tool", "name": "extract_search_filters"})
        );
        assert_eq!(wire["tools"][0]["name"], "extract_search_filters");
        assert_eq!(wire["tools"][0]["input_schema"]["type"], "object");
        assert_eq!(wire["system"], "Today is 2024-06-15.");
        assert_eq!(wire["messages"][0]["role"], "user");
        assert_eq!(wire["max_tokens"], 1024);
    }

    #[test]
    fn test_response_to_outcome() {
        let response: MessagesResponse = serde_json::from_value(json!({
            "id": "msg_1",
            "type": "message",
            "role": "assistant",
            "model": "m",
            "content": [
                {"type": "thinking", "thinking": "..."},
                {"type": "text", "text": "Searching."},
                {"type": "tool_use", "id": "t1", "name": "extract_search_filters",
                 "input": {"summary": "s", "resultType": "transactions"}}
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 321, "output_tokens": 45}
        }))
        .unwrap();

        assert_eq!(response.tool_uses().len(), 1);
        let outcome = response.into_outcome();
        assert_eq!(outcome.tool_calls.len(), 1);
        assert_eq!(outcome.tool_calls[0].name, "extract_search_filters");
        assert_eq!(outcome.tool_calls[0].arguments["resultType"], "transactions");
        assert_eq!(outcome.text.as_deref(), Some("Searching."));
        assert_eq!(outcome.usage.input_tokens, 321);
        assert_eq!(outcome.usage.output_tokens, 45);
    }

    #[test]
    fn test_text_only_response() {
        let response: MessagesResponse = serde_json::from_value(json!({
            "content": [{"type": "text", "text": "I can't help with that."}],
            "stop_reason": "end_turn"
        }))
        .unwrap();
        let outcome = response.into_outcome();
        assert!(outcome.first_call().is_none());
        assert_eq!(outcome.usage, TokenUsage::default());
    }

    #[tokio::test]
    async fn test_health_check_unreachable() {
        let backend = AnthropicCompatBackend::new("http://127.0.0.1:1", "test-model");
        assert!(!backend.health_check().await);
    }

    #[tokio::test]
    async fn test_connect_failure_is_transient() {
        let backend = AnthropicCompatBackend::new("http://127.0.0.1:1", "test-model");
        let err = backend.call_forced_tool(&forced()).await.unwrap_err();
        assert!(err.is_transient());
    }
}
