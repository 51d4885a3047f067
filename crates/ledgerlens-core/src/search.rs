//! The natural-language search pipeline
//!
//! One request runs: input check, identity, entitlement, quota, parse,
//! execute, assemble. Each step can stop the request with a `SearchError`,
//! which the response layer maps to a fixed status and body. Quota is only
//! consumed once the caller is known to be entitled, and is not refunded when
//! a later step fails.

use chrono::NaiveDate;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::ai::AIBackend;
use crate::config::{LedgerlensConfig, QuotaLimits};
use crate::db::Database;
use crate::executor::execute;
use crate::ledger::UserLedger;
use crate::models::{Feature, TokenUsage};
use crate::parser::{ParseError, QueryParser};
use crate::prompts::PromptLibrary;
use crate::quota::{today_utc, QuotaGate};
use crate::response::{Reply, SearchResponse};

/// Longest question accepted, in characters
pub const MAX_QUERY_CHARS: usize = 500;

/// Why a search request did not produce an answer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SearchError {
    #[error("authentication required")]
    AuthRequired,

    #[error("feature not included in the caller's plan")]
    FeatureNotEntitled,

    #[error("daily quota of {limit} exhausted (pro: {is_pro})")]
    QuotaExceeded { limit: u32, is_pro: bool },

    #[error("could not understand query: {0}")]
    ParseFailure(String),

    #[error("model transport failed: {0}")]
    TransportFailure(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ParseError> for SearchError {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::ParseFailure { reason, .. } => Self::ParseFailure(reason),
            ParseError::TransportFailure(reason) => Self::TransportFailure(reason),
        }
    }
}

/// Store failures are internal; the detail goes to the log only
fn internal(stage: &'static str, err: crate::Error) -> SearchError {
    error!(stage, error = %err, "Search failed");
    SearchError::Internal(format!("{}: {}", stage, err))
}

/// Answers natural-language questions about one user's ledger
#[derive(Clone)]
pub struct SearchService {
    db: Database,
    quota: QuotaGate,
    parser: QueryParser,
}

impl SearchService {
    pub fn new(db: Database, limits: QuotaLimits, parser: QueryParser) -> Self {
        Self {
            quota: QuotaGate::new(db.clone(), limits),
            db,
            parser,
        }
    }

    /// Service over `backend`, with limits and model settings from `config`
    pub fn with_backend<B: AIBackend + 'static>(
        db: Database,
        backend: B,
        config: &LedgerlensConfig,
        prompts: &PromptLibrary,
    ) -> crate::Result<Self> {
        let parser = QueryParser::from_backend(backend, prompts, config.model)?;
        Ok(Self::new(db, config.quotas.clone(), parser))
    }

    pub fn quota(&self) -> &QuotaGate {
        &self.quota
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Run the pipeline and render the outcome as status + body
    pub async fn handle(&self, user_id: Option<&str>, query: &str) -> Reply {
        self.handle_on(user_id, query, today_utc()).await
    }

    /// As [`SearchService::handle`], metering against `today`
    pub async fn handle_on(&self, user_id: Option<&str>, query: &str, today: NaiveDate) -> Reply {
        Reply::from_outcome(self.search_on(user_id, query, today).await)
    }

    /// Run the pipeline for today (UTC)
    pub async fn search(
        &self,
        user_id: Option<&str>,
        query: &str,
    ) -> std::result::Result<SearchResponse, SearchError> {
        self.search_on(user_id, query, today_utc()).await
    }

    /// Run the pipeline with `today` as the quota day and the date relative
    /// phrases resolve against
    pub async fn search_on(
        &self,
        user_id: Option<&str>,
        query: &str,
        today: NaiveDate,
    ) -> std::result::Result<SearchResponse, SearchError> {
        let query = validate_query(query)?;
        let user_id = user_id
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or(SearchError::AuthRequired)?;

        let is_pro = self
            .db
            .is_pro(user_id)
            .map_err(|e| internal("tier lookup", e))?;

        if !self.quota.is_entitled(Feature::Search, is_pro) {
            info!(user_id, is_pro, "Search not entitled");
            return Err(SearchError::FeatureNotEntitled);
        }

        let decision = self
            .quota
            .check_and_consume_on(user_id, Feature::Search, is_pro, today)
            .map_err(|e| internal("quota", e))?;
        if !decision.allowed {
            return Err(SearchError::QuotaExceeded {
                limit: decision.limit,
                is_pro,
            });
        }

        let parsed = match self.parser.parse(query, today).await {
            Ok(parsed) => parsed,
            Err(e) => {
                self.record_tokens(user_id, e.usage(), today);
                warn!(user_id, error = %e, "Query not parsed");
                return Err(e.into());
            }
        };
        self.record_tokens(user_id, parsed.usage, today);

        let ledger = UserLedger::new(self.db.clone(), user_id);
        let result = execute(&parsed.filters, &ledger).map_err(|e| {
            error!(
                user_id,
                error = %e,
                filters = ?parsed.filters,
                "Executor failed on validated filters"
            );
            SearchError::Internal(e.to_string())
        })?;

        debug!(
            user_id,
            result_type = parsed.filters.result_type.as_str(),
            remaining = decision.remaining,
            "Search answered"
        );
        Ok(SearchResponse::success(parsed.filters, result))
    }

    /// Token accounting is best effort; a failure here never fails the request
    fn record_tokens(&self, user_id: &str, usage: TokenUsage, day: NaiveDate) {
        if let Err(e) = self
            .quota
            .record_tokens_on(user_id, Feature::Search, usage, day)
        {
            warn!(user_id, error = %e, "Failed to record token usage");
        }
    }
}

/// Trimmed, non-empty, bounded question text
pub fn validate_query(query: &str) -> std::result::Result<&str, SearchError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(SearchError::InvalidInput("Query is required".into()));
    }
    if query.chars().count() > MAX_QUERY_CHARS {
        return Err(SearchError::InvalidInput(format!(
            "Query must be at most {} characters",
            MAX_QUERY_CHARS
        )));
    }
    Ok(query)
}
