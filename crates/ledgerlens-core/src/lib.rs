//! Ledgerlens Core Library
//!
//! Natural-language questions over a personal transaction ledger:
//! - Filter model shared by the model tool schema and the executor
//! - Quota gate (per user, per feature, per UTC day)
//! - Query parser driving a forced model tool call
//! - Deterministic query executor over a user-scoped ledger
//! - Response assembly and the search pipeline tying it together
//! - Pluggable model backends (Anthropic-compatible, OpenAI-compatible, mock)
//! - Encrypted SQLite storage, CSV import, prompt and quota configuration

pub mod ai;
pub mod config;
pub mod db;
pub mod error;
pub mod executor;
pub mod filters;
pub mod import;
pub mod ledger;
pub mod models;
pub mod parser;
pub mod prompts;
pub mod quota;
pub mod response;
pub mod search;

pub use ai::{
    AIBackend, AIClient, AnthropicCompatBackend, MockBackend, MockReply, OpenAICompatibleBackend,
};
pub use config::{LedgerlensConfig, ModelSettings, QuotaLimits};
pub use db::Database;
pub use error::{Error, Result};
pub use executor::{execute, ExecutionResult};
pub use filters::{filter_tool_schema, ParsedFilters, ResultType};
pub use import::{import_ledger, ImportStats};
pub use ledger::{LedgerAccess, UserLedger, VecLedger};
pub use models::{Feature, SubscriptionTier, TokenUsage, Transaction};
pub use parser::{FilterExtractor, ParseError, ParsedQuery, QueryParser};
pub use prompts::{Prompt, PromptId, PromptLibrary};
pub use quota::{today_utc, QuotaDecision, QuotaGate, UsageReport};
pub use response::{Reply, ReplyBody, SearchResponse};
pub use search::{SearchError, SearchService};
