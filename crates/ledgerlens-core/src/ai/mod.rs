//! Pluggable model backend abstraction
//!
//! The query engine needs exactly one capability from a language model: answer
//! a prompt by calling one named tool whose argument schema we supply.
//!
//! # Architecture
//!
//! - `AIBackend` trait: the single forced-tool-call operation plus health info
//! - `AIClient` enum: concrete wrapper providing Clone + compile-time dispatch
//! - Backend implementations: `AnthropicCompatBackend`, `OpenAICompatibleBackend`,
//!   `MockBackend`
//!
//! # Configuration
//!
//! Environment variables:
//! - `AI_BACKEND`: Backend to use (anthropic_compatible, openai_compatible, mock).
//!   Default: anthropic_compatible
//! - `ANTHROPIC_COMPATIBLE_HOST` / `_MODEL` / `_API_KEY`: Messages API server
//! - `OPENAI_COMPATIBLE_HOST` / `_MODEL` / `_API_KEY`: chat completions server

pub mod anthropic_compat;
mod mock;
mod openai_compatible;

pub use anthropic_compat::AnthropicCompatBackend;
pub use mock::{MockBackend, MockReply};
pub use openai_compatible::OpenAICompatibleBackend;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::TokenUsage;

/// A tool offered to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON Schema for the tool's arguments
    pub input_schema: serde_json::Value,
}

impl ToolSpec {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

/// One prompt whose answer must be a call to `tool`
#[derive(Debug, Clone)]
pub struct ForcedToolRequest {
    pub system: String,
    pub user: String,
    pub tool: ToolSpec,
    pub max_tokens: u32,
}

/// A tool invocation returned by the model
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub name: String,
    /// Raw arguments; not yet checked against any schema
    pub arguments: serde_json::Value,
}

/// Everything a backend got back from one forced-tool request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolCallOutcome {
    pub tool_calls: Vec<ToolCall>,
    /// Any free text the model produced alongside (or instead of) a call
    pub text: Option<String>,
    pub usage: TokenUsage,
}

impl ToolCallOutcome {
    /// The first tool call, which is the only one a forced request should yield
    pub fn first_call(&self) -> Option<&ToolCall> {
        self.tool_calls.first()
    }
}

/// Trait defining the interface for all model backends
///
/// Backends should be Send + Sync to allow use across async tasks. They do
/// not retry or time out on their own; callers own that policy.
#[async_trait]
pub trait AIBackend: Send + Sync {
    /// Send the prompt and force a call to the request's tool
    async fn call_forced_tool(&self, request: &ForcedToolRequest) -> Result<ToolCallOutcome>;

    /// Check if the backend is reachable
    async fn health_check(&self) -> bool;

    /// Get the model name (for logging)
    fn model(&self) -> &str;

    /// Get the host URL (for logging)
    fn host(&self) -> &str;
}

/// Concrete AI client enum
///
/// Provides Clone and compile-time dispatch without Box<dyn> overhead.
#[derive(Clone)]
pub enum AIClient {
    /// Anthropic Messages API (`/v1/messages`)
    AnthropicCompat(AnthropicCompatBackend),
    /// OpenAI chat completions API (vLLM, LocalAI, llama-server, hosted APIs)
    OpenAICompatible(OpenAICompatibleBackend),
    /// Mock backend for testing
    Mock(MockBackend),
}

impl AIClient {
    /// Create an AI client from environment variables
    ///
    /// Checks `AI_BACKEND` to determine which backend to use. Returns None if
    /// the chosen backend's host variable is not set.
    pub fn from_env() -> Option<Self> {
        let backend =
            std::env::var("AI_BACKEND").unwrap_or_else(|_| "anthropic_compatible".to_string());

        match backend.to_lowercase().as_str() {
            "anthropic_compatible" | "anthropic" => {
                AnthropicCompatBackend::from_env().map(AIClient::AnthropicCompat)
            }
            "openai_compatible" | "openai" | "vllm" | "localai" | "llamacpp" => {
                OpenAICompatibleBackend::from_env().map(AIClient::OpenAICompatible)
            }
            "mock" => Some(AIClient::Mock(MockBackend::new())),
            _ => {
                tracing::warn!(
                    backend = %backend,
                    "Unknown AI_BACKEND, falling back to anthropic_compatible"
                );
                AnthropicCompatBackend::from_env().map(AIClient::AnthropicCompat)
            }
        }
    }

    /// Create a mock backend for testing
    pub fn mock() -> Self {
        AIClient::Mock(MockBackend::new())
    }

    /// Short backend name for logs and banners
    pub fn kind(&self) -> &'static str {
        match self {
            AIClient::AnthropicCompat(_) => "anthropic_compatible",
            AIClient::OpenAICompatible(_) => "openai_compatible",
            AIClient::Mock(_) => "mock",
        }
    }
}

// Implement AIBackend for AIClient by delegating to the inner backend
#[async_trait]
impl AIBackend for AIClient {
    async fn call_forced_tool(&self, request: &ForcedToolRequest) -> Result<ToolCallOutcome> {
        match self {
            AIClient::AnthropicCompat(b) => b.call_forced_tool(request).await,
            AIClient::OpenAICompatible(b) => b.call_forced_tool(request).await,
            AIClient::Mock(b) => b.call_forced_tool(request).await,
        }
    }

    async fn health_check(&self) -> bool {
        match self {
            AIClient::AnthropicCompat(b) => b.health_check().await,
            AIClient::OpenAICompatible(b) => b.health_check().await,
            AIClient::Mock(b) => b.health_check().await,
        }
    }

    fn model(&self) -> &str {
        match self {
            AIClient::AnthropicCompat(b) => b.model(),
            AIClient::OpenAICompatible(b) => b.model(),
            AIClient::Mock(b) => b.model(),
        }
    }

    fn host(&self) -> &str {
        match self {
            AIClient::AnthropicCompat(b) => b.host(),
            AIClient::OpenAICompatible(b) => b.host(),
            AIClient::Mock(b) => b.host(),
        }
    }
}
