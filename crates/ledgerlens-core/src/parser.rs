//! Natural-language query to `ParsedFilters`
//!
//! The parser asks a model to call `extract_search_filters`, then treats the
//! arguments as untrusted: they must name the right tool, deserialize into
//! `ParsedFilters` without unknown fields, and pass `validate`. Anything less
//! is a parse failure, never a best-effort guess.
//!
//! Each model call is bounded by a timeout. Transient failures (timeout,
//! connection error, 429/5xx) get exactly one retry after a short backoff.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::ai::{AIBackend, ForcedToolRequest, ToolCallOutcome, ToolSpec};
use crate::config::ModelSettings;
use crate::error::{Error, Result};
use crate::filters::{filter_tool_schema, ParsedFilters, FILTER_TOOL_DESCRIPTION, FILTER_TOOL_NAME};
use crate::models::TokenUsage;
use crate::prompts::{Prompt, PromptId, PromptLibrary};

/// Token budget for the filter tool call
const MAX_TOKENS: u32 = 1024;

/// The model collaborator: one forced tool call per question
#[async_trait]
pub trait FilterExtractor: Send + Sync {
    async fn extract(&self, query: &str, as_of: NaiveDate) -> Result<ToolCallOutcome>;
}

/// Extractor that renders the filter prompt and sends it to a backend
pub struct PromptedExtractor<B> {
    backend: B,
    prompt: Prompt,
    tool: ToolSpec,
}

impl<B: AIBackend> PromptedExtractor<B> {
    /// Use the `extract_search_filters` prompt from `prompts`
    pub fn new(backend: B, prompts: &PromptLibrary) -> Result<Self> {
        let prompt = prompts.load(PromptId::ExtractSearchFilters)?;
        Ok(Self::with_prompt(backend, prompt))
    }

    pub fn with_prompt(backend: B, prompt: Prompt) -> Self {
        Self {
            backend,
            prompt,
            tool: ToolSpec::new(FILTER_TOOL_NAME, FILTER_TOOL_DESCRIPTION, filter_tool_schema()),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The request sent for `query`, with relative dates anchored at `as_of`
    pub fn build_request(&self, query: &str, as_of: NaiveDate) -> ForcedToolRequest {
        let mut vars = HashMap::new();
        vars.insert("today", as_of.format("%Y-%m-%d").to_string());
        vars.insert("weekday", as_of.weekday().to_string());
        vars.insert("query", query.to_string());

        ForcedToolRequest {
            system: self.prompt.render_system(&vars),
            user: self.prompt.render_user(&vars),
            tool: self.tool.clone(),
            max_tokens: MAX_TOKENS,
        }
    }
}

#[async_trait]
impl<B: AIBackend> FilterExtractor for PromptedExtractor<B> {
    async fn extract(&self, query: &str, as_of: NaiveDate) -> Result<ToolCallOutcome> {
        let request = self.build_request(query, as_of);
        debug!(
            model = self.backend.model(),
            host = self.backend.host(),
            "Requesting filter extraction"
        );
        self.backend.call_forced_tool(&request).await
    }
}

/// A successfully parsed question
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedQuery {
    pub filters: ParsedFilters,
    /// Tokens reported for the answering call
    pub usage: TokenUsage,
}

/// Why a question could not be turned into filters
#[derive(Error, Debug)]
pub enum ParseError {
    /// The model answered, or timed out, without producing usable filters
    #[error("Could not understand query: {reason}")]
    ParseFailure { reason: String, usage: TokenUsage },

    /// The model provider could not be reached or refused the request
    #[error("Model transport failed: {0}")]
    TransportFailure(String),
}

impl ParseError {
    fn failure(reason: impl Into<String>, usage: TokenUsage) -> Self {
        Self::ParseFailure {
            reason: reason.into(),
            usage,
        }
    }

    /// Tokens spent before the failure, if any
    pub fn usage(&self) -> TokenUsage {
        match self {
            Self::ParseFailure { usage, .. } => *usage,
            Self::TransportFailure(_) => TokenUsage::default(),
        }
    }
}

/// Turns questions into validated filters
#[derive(Clone)]
pub struct QueryParser {
    extractor: Arc<dyn FilterExtractor>,
    timeout: Duration,
    retry_backoff: Duration,
}

impl QueryParser {
    pub fn new(extractor: Arc<dyn FilterExtractor>, settings: ModelSettings) -> Self {
        Self {
            extractor,
            timeout: settings.timeout,
            retry_backoff: settings.retry_backoff,
        }
    }

    /// Parser over a backend using the given prompt library
    pub fn from_backend<B: AIBackend + 'static>(
        backend: B,
        prompts: &PromptLibrary,
        settings: ModelSettings,
    ) -> Result<Self> {
        let extractor = PromptedExtractor::new(backend, prompts)?;
        Ok(Self::new(Arc::new(extractor), settings))
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Parse `query`, resolving relative dates against `as_of`
    pub async fn parse(
        &self,
        query: &str,
        as_of: NaiveDate,
    ) -> std::result::Result<ParsedQuery, ParseError> {
        let outcome = self.extract_with_retry(query, as_of).await?;
        let parsed = interpret(outcome)?;
        info!(
            result_type = parsed.filters.result_type.as_str(),
            input_tokens = parsed.usage.input_tokens,
            output_tokens = parsed.usage.output_tokens,
            "Query parsed"
        );
        Ok(parsed)
    }

    async fn extract_with_retry(
        &self,
        query: &str,
        as_of: NaiveDate,
    ) -> std::result::Result<ToolCallOutcome, ParseError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let error = match tokio::time::timeout(self.timeout, self.extractor.extract(query, as_of))
                .await
            {
                Ok(Ok(outcome)) => return Ok(outcome),
                Ok(Err(e)) => e,
                Err(_) => Error::Timeout(self.timeout),
            };

            if attempt == 1 && error.is_transient() {
                warn!(error = %error, backoff_ms = self.retry_backoff.as_millis() as u64, "Model call failed, retrying once");
                tokio::time::sleep(self.retry_backoff).await;
                continue;
            }

            return Err(classify_failure(error));
        }
    }
}

/// Timeouts mean the model never gave an answer we could use; everything else
/// is the transport's fault
fn classify_failure(error: Error) -> ParseError {
    let timed_out = match &error {
        Error::Timeout(_) => true,
        Error::Http(e) => e.is_timeout(),
        _ => false,
    };

    if timed_out {
        warn!(error = %error, "Model call timed out");
        ParseError::failure(format!("model did not answer in time: {}", error), TokenUsage::default())
    } else {
        warn!(error = %error, "Model transport failure");
        ParseError::TransportFailure(error.to_string())
    }
}

/// Check a model outcome and turn its tool call into validated filters
pub fn interpret(outcome: ToolCallOutcome) -> std::result::Result<ParsedQuery, ParseError> {
    let usage = outcome.usage;

    let Some(call) = outcome.tool_calls.into_iter().next() else {
        debug!(text = ?outcome.text, "Model returned no tool call");
        return Err(ParseError::failure("model did not call the filter tool", usage));
    };

    if call.name != FILTER_TOOL_NAME {
        return Err(ParseError::failure(
            format!("model called unexpected tool '{}'", call.name),
            usage,
        ));
    }

    let filters: ParsedFilters = serde_json::from_value(call.arguments)
        .map_err(|e| ParseError::failure(format!("tool arguments did not match schema: {}", e), usage))?;

    filters
        .validate()
        .map_err(|e| ParseError::failure(e.to_string(), usage))?;

    Ok(ParsedQuery { filters, usage })
}
