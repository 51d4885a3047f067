//! Mock backend for testing
//!
//! Replies come from a script queued by the test. With an empty script the
//! backend answers with a small keyword heuristic, which is enough to run the
//! whole pipeline locally without a model server.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::error::{Error, Result};
use crate::models::TokenUsage;

use super::{AIBackend, ForcedToolRequest, ToolCall, ToolCallOutcome};

/// One scripted reply
#[derive(Debug, Clone)]
pub enum MockReply {
    /// The model calls a tool with these arguments
    Call {
        name: String,
        arguments: serde_json::Value,
    },
    /// The model answers in prose and calls nothing
    Text(String),
    /// The provider answers with an HTTP error status
    Status(u16),
    /// The call never finishes (until the caller's timeout fires)
    Hang,
}

impl MockReply {
    /// A call to `name` with `arguments`
    pub fn call(name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self::Call {
            name: name.into(),
            arguments,
        }
    }
}

/// Mock AI backend for testing
#[derive(Clone)]
pub struct MockBackend {
    /// Whether health_check should return true
    pub healthy: bool,
    script: Arc<Mutex<VecDeque<MockReply>>>,
    calls: Arc<AtomicUsize>,
    usage: TokenUsage,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// Create a new mock backend (healthy by default)
    pub fn new() -> Self {
        Self {
            healthy: true,
            script: Arc::new(Mutex::new(VecDeque::new())),
            calls: Arc::new(AtomicUsize::new(0)),
            usage: TokenUsage {
                input_tokens: 100,
                output_tokens: 20,
            },
        }
    }

    /// Create an unhealthy mock backend
    pub fn unhealthy() -> Self {
        Self {
            healthy: false,
            ..Self::new()
        }
    }

    /// Queue replies, consumed one per call in order
    pub fn with_replies(self, replies: impl IntoIterator<Item = MockReply>) -> Self {
        self.push_replies(replies);
        self
    }

    pub fn push_replies(&self, replies: impl IntoIterator<Item = MockReply>) {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend(replies);
    }

    /// Number of calls made so far (shared across clones)
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_reply(&self) -> Option<MockReply> {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
    }

    /// Keyword guess used when nothing is scripted
    fn heuristic(&self, request: &ForcedToolRequest) -> MockReply {
        let query = request.user.trim();
        let lower = query.to_lowercase();

        let arguments = if lower.starts_with("how much") || lower.contains("total") {
            json!({
                "summary": format!("Total spending matching \"{}\"", query),
                "resultType": "summary",
                "aggregation": "sum",
                "transactionType": "expense"
            })
        } else if lower.starts_with("how many") {
            json!({
                "summary": format!("Number of transactions matching \"{}\"", query),
                "resultType": "summary",
                "aggregation": "count"
            })
        } else {
            json!({
                "summary": format!("Transactions matching \"{}\"", query),
                "resultType": "transactions",
                "sortBy": "date",
                "sortOrder": "desc"
            })
        };

        MockReply::call(request.tool.name.clone(), arguments)
    }
}

#[async_trait]
impl AIBackend for MockBackend {
    async fn call_forced_tool(&self, request: &ForcedToolRequest) -> Result<ToolCallOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let reply = self
            .next_reply()
            .unwrap_or_else(|| self.heuristic(request));

        match reply {
            MockReply::Call { name, arguments } => Ok(ToolCallOutcome {
                tool_calls: vec![ToolCall { name, arguments }],
                text: None,
                usage: self.usage,
            }),
            MockReply::Text(text) => Ok(ToolCallOutcome {
                tool_calls: Vec::new(),
                text: Some(text),
                usage: self.usage,
            }),
            MockReply::Status(status) => Err(Error::ModelApi {
                status,
                body: format!("mock status {}", status),
            }),
            MockReply::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(Error::Timeout(Duration::from_secs(3600)))
            }
        }
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    fn model(&self) -> &str {
        "mock"
    }

    fn host(&self) -> &str {
        "mock://"
    }
}
