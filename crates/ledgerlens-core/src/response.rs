//! Response assembly
//!
//! Turns a search outcome into the status code and JSON body the API returns.
//! Successful answers carry the interpretation next to the (rounded) result;
//! every `SearchError` has a fixed status and body shape.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::executor::{ExecutionResult, TransactionsResult};
use crate::filters::ParsedFilters;
use crate::search::SearchError;

/// Interpretation shown when the question could not be parsed
pub const PARSE_FAILED_SUMMARY: &str = "Could not understand query";

/// Suggestion returned with a parse failure
pub const PARSE_FAILED_HINT: &str = "Try rephrasing with a time period or category, for example: \
     \"How much did I spend on groceries last month?\"";

/// What the engine understood the question to mean
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Interpretation {
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters: Option<ParsedFilters>,
}

/// Body of a search answer (200) or of a parse failure (400)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub interpretation: Interpretation,
    #[serde(flatten)]
    pub result: ExecutionResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl SearchResponse {
    /// Successful answer; money is rounded to cents, percentages to whole numbers
    pub fn success(filters: ParsedFilters, result: ExecutionResult) -> Self {
        Self {
            interpretation: Interpretation {
                summary: filters.summary.clone(),
                filters: Some(filters),
            },
            result: rounded(result),
            error: None,
            hint: None,
        }
    }

    /// Empty transaction list explaining that the question was not understood
    pub fn parse_failed() -> Self {
        Self {
            interpretation: Interpretation {
                summary: PARSE_FAILED_SUMMARY.to_string(),
                filters: None,
            },
            result: ExecutionResult::Transactions(TransactionsResult {
                items: Vec::new(),
                total_count: 0,
                has_more: false,
            }),
            error: Some("parse_failed".to_string()),
            hint: Some(PARSE_FAILED_HINT.to_string()),
        }
    }
}

/// Error body for everything except parse failures
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_pro: Option<bool>,
}

impl ErrorBody {
    fn new(error: &str, message: impl Into<String>) -> Self {
        Self {
            error: error.to_string(),
            message: message.into(),
            limit: None,
            is_pro: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ReplyBody {
    Search(Box<SearchResponse>),
    Error(ErrorBody),
}

/// Status code and body for one request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reply {
    pub status: u16,
    pub body: ReplyBody,
}

impl Reply {
    pub fn ok(response: SearchResponse) -> Self {
        Self {
            status: 200,
            body: ReplyBody::Search(Box::new(response)),
        }
    }

    pub fn from_error(error: &SearchError) -> Self {
        let status = status_code(error);
        let body = match error {
            SearchError::ParseFailure(_) => ReplyBody::Search(Box::new(SearchResponse::parse_failed())),
            other => ReplyBody::Error(error_body(other)),
        };
        Self { status, body }
    }

    pub fn from_outcome(outcome: std::result::Result<SearchResponse, SearchError>) -> Self {
        match outcome {
            Ok(response) => Self::ok(response),
            Err(e) => Self::from_error(&e),
        }
    }
}

/// HTTP status for each error kind
pub fn status_code(error: &SearchError) -> u16 {
    match error {
        SearchError::InvalidInput(_) | SearchError::ParseFailure(_) => 400,
        SearchError::AuthRequired => 401,
        SearchError::FeatureNotEntitled => 403,
        SearchError::QuotaExceeded { .. } => 429,
        SearchError::TransportFailure(_) | SearchError::Internal(_) => 500,
    }
}

/// Client-facing body; internal details never leave the process
pub fn error_body(error: &SearchError) -> ErrorBody {
    match error {
        SearchError::InvalidInput(reason) => ErrorBody::new("invalid_input", reason.clone()),
        SearchError::AuthRequired => ErrorBody::new("unauthorized", "Authentication required"),
        SearchError::FeatureNotEntitled => ErrorBody::new(
            "upgrade_required",
            "Natural-language search is not included in your plan. Upgrade to use it.",
        ),
        SearchError::QuotaExceeded { limit, is_pro } => {
            let message = if *is_pro {
                format!(
                    "You've reached your daily limit of {} searches. Your quota resets at midnight UTC.",
                    limit
                )
            } else {
                format!(
                    "You've used all {} free searches for today. Upgrade to Pro for more searches.",
                    limit
                )
            };
            ErrorBody {
                limit: Some(*limit),
                is_pro: Some(*is_pro),
                ..ErrorBody::new("rate_limit_exceeded", message)
            }
        }
        SearchError::ParseFailure(_) => ErrorBody::new("parse_failed", PARSE_FAILED_SUMMARY),
        SearchError::TransportFailure(_) | SearchError::Internal(_) => {
            ErrorBody::new("internal_error", "Search failed. Please try again later.")
        }
    }
}

fn money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn percent(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}

fn rounded(result: ExecutionResult) -> ExecutionResult {
    match result {
        ExecutionResult::Transactions(mut list) => {
            for tx in &mut list.items {
                tx.amount = money(tx.amount);
            }
            ExecutionResult::Transactions(list)
        }
        ExecutionResult::Summary(mut summary) => {
            summary.value = money(summary.value);
            summary.total = money(summary.total);
            summary.average = money(summary.average);
            if let Some(buckets) = summary.breakdown.as_mut() {
                for bucket in buckets {
                    bucket.total = money(bucket.total);
                    bucket.percentage = percent(bucket.percentage);
                }
            }
            ExecutionResult::Summary(summary)
        }
        ExecutionResult::Comparison(mut comparison) => {
            comparison.period1.total = money(comparison.period1.total);
            comparison.period2.total = money(comparison.period2.total);
            comparison.difference = money(comparison.difference);
            comparison.percentage_change = comparison.percentage_change.map(percent);
            ExecutionResult::Comparison(comparison)
        }
    }
}
