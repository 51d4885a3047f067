//! Filter model for natural-language transaction queries
//!
//! `ParsedFilters` is the contract between the query parser (which fills it
//! from a model tool call) and the executor (which runs it against a ledger).
//! The same types generate the JSON Schema handed to the model as the
//! `extract_search_filters` tool, so field doc comments double as the
//! descriptions the model sees.
//!
//! A `ParsedFilters` value coming out of a model is untrusted input. Call
//! [`ParsedFilters::validate`] before acting on it; the executor does so again
//! on its own.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Name of the tool the model is forced to call
pub const FILTER_TOOL_NAME: &str = "extract_search_filters";

/// Description attached to the filter tool
pub const FILTER_TOOL_DESCRIPTION: &str =
    "Extract structured search filters from a natural-language question about the user's \
     financial transactions.";

/// Default number of transactions returned by a list query
pub const DEFAULT_LIMIT: u32 = 50;

/// Hard cap on transactions returned by a list query
pub const MAX_LIMIT: u32 = 500;

/// Which executor branch answers the question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ResultType {
    /// A list of matching transactions
    Transactions,
    /// A single aggregate (total, average, count), optionally broken down
    Summary,
    /// Totals for two periods side by side
    Comparison,
}

impl ResultType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transactions => "transactions",
            Self::Summary => "summary",
            Self::Comparison => "comparison",
        }
    }
}

/// Inclusive calendar date range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct DateRange {
    /// First day of the range, YYYY-MM-DD (inclusive)
    #[schemars(with = "String")]
    pub start: NaiveDate,
    /// Last day of the range, YYYY-MM-DD (inclusive)
    #[schemars(with = "String")]
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    fn validate(&self, field: &str) -> Result<()> {
        if self.start > self.end {
            return Err(Error::InvalidFilters(format!(
                "{}: start {} is after end {}",
                field, self.start, self.end
            )));
        }
        Ok(())
    }
}

/// Comparison applied to a transaction's absolute amount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum AmountOperator {
    Gt,
    Lt,
    Eq,
    Gte,
    Lte,
    /// Inclusive on both ends; requires value2
    Between,
}

/// Amount predicate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct AmountFilter {
    pub operator: AmountOperator,
    /// Amount in currency units as a positive number (spending of $40 is 40)
    #[schemars(with = "f64")]
    pub value: Decimal,
    /// Upper bound, required only when operator is "between"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<f64>")]
    pub value2: Option<Decimal>,
}

impl AmountFilter {
    /// Whether `amount` (already made non-negative) satisfies the predicate
    ///
    /// Assumes the filter has been validated.
    pub fn matches(&self, amount: Decimal) -> bool {
        match self.operator {
            AmountOperator::Gt => amount > self.value,
            AmountOperator::Lt => amount < self.value,
            AmountOperator::Eq => amount == self.value,
            AmountOperator::Gte => amount >= self.value,
            AmountOperator::Lte => amount <= self.value,
            AmountOperator::Between => match self.value2 {
                Some(upper) => amount >= self.value && amount <= upper,
                None => false,
            },
        }
    }

    fn validate(&self) -> Result<()> {
        if self.value.is_sign_negative() && !self.value.is_zero() {
            return Err(Error::InvalidFilters(
                "amount.value must not be negative".into(),
            ));
        }
        match (self.operator, self.value2) {
            (AmountOperator::Between, None) => Err(Error::InvalidFilters(
                "amount.value2 is required when operator is between".into(),
            )),
            (AmountOperator::Between, Some(upper)) if upper < self.value => {
                Err(Error::InvalidFilters(format!(
                    "amount.value2 ({}) must be >= amount.value ({})",
                    upper, self.value
                )))
            }
            (AmountOperator::Between, Some(_)) => Ok(()),
            (_, Some(_)) => Err(Error::InvalidFilters(
                "amount.value2 is only allowed when operator is between".into(),
            )),
            (_, None) => Ok(()),
        }
    }
}

/// Direction of money flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// Money in (positive ledger amounts)
    Income,
    /// Money out (negative ledger amounts)
    Expense,
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    None,
    Sum,
    Average,
    Count,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
    Category,
    Merchant,
    Month,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    Date,
    Amount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Structured search filters extracted from a natural-language question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ParsedFilters {
    /// One-sentence restatement of what the user asked for
    pub summary: String,

    /// "transactions" to list matches, "summary" for a total/average/count,
    /// "comparison" to compare two periods
    pub result_type: ResultType,

    /// Date range to search; omit for all time. For comparisons this is the
    /// first (earlier) period
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRange>,

    /// Filter on the transaction amount (absolute value)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<AmountFilter>,

    /// Merchant name or part of it, matched case-insensitively
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merchant: Option<String>,

    /// Categories to include; a transaction matches if it matches any of them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Vec<String>>,

    /// Restrict to income or expenses
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_type: Option<TransactionType>,

    /// Aggregate to compute for summary questions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<Aggregation>,

    /// Break a summary down by category, merchant or month
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_by: Option<GroupBy>,

    /// Second period, required for comparisons
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compare_to: Option<DateRange>,

    /// Maximum transactions to return (lists only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,

    /// Sort field for transaction lists
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<SortBy>,

    /// Sort direction for transaction lists
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<SortOrder>,
}

impl ParsedFilters {
    /// Bare filters of the given shape, used by builders and fallbacks
    pub fn new(summary: impl Into<String>, result_type: ResultType) -> Self {
        Self {
            summary: summary.into(),
            result_type,
            date_range: None,
            amount: None,
            merchant: None,
            category: None,
            transaction_type: None,
            aggregation: None,
            group_by: None,
            compare_to: None,
            limit: None,
            sort_by: None,
            sort_order: None,
        }
    }

    /// Check every invariant of the filter contract
    pub fn validate(&self) -> Result<()> {
        if self.summary.trim().is_empty() {
            return Err(Error::InvalidFilters("summary must not be empty".into()));
        }

        if let Some(range) = &self.date_range {
            range.validate("dateRange")?;
        }
        if let Some(range) = &self.compare_to {
            range.validate("compareTo")?;
        }

        match (self.result_type, &self.compare_to) {
            (ResultType::Comparison, None) => {
                return Err(Error::InvalidFilters(
                    "compareTo is required for comparison queries".into(),
                ));
            }
            (ResultType::Comparison, Some(_)) if self.date_range.is_none() => {
                return Err(Error::InvalidFilters(
                    "dateRange is required for comparison queries".into(),
                ));
            }
            (ResultType::Transactions | ResultType::Summary, Some(_)) => {
                return Err(Error::InvalidFilters(format!(
                    "compareTo is only allowed for comparison queries, not {}",
                    self.result_type.as_str()
                )));
            }
            _ => {}
        }

        if let Some(amount) = &self.amount {
            amount.validate()?;
        }

        if self.limit == Some(0) {
            return Err(Error::InvalidFilters("limit must be at least 1".into()));
        }

        Ok(())
    }

    /// Effective list limit after defaulting and capping
    pub fn effective_limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT) as usize
    }

    /// Category filter with blank entries dropped; `None` means unrestricted
    pub fn categories(&self) -> Option<Vec<String>> {
        let categories: Vec<String> = self
            .category
            .as_ref()?
            .iter()
            .map(|c| c.trim().to_lowercase())
            .filter(|c| !c.is_empty())
            .collect();
        if categories.is_empty() {
            None
        } else {
            Some(categories)
        }
    }

    /// The same question with the two comparison periods swapped
    pub fn swapped_periods(&self) -> Self {
        let mut swapped = self.clone();
        swapped.date_range = self.compare_to;
        swapped.compare_to = self.date_range;
        swapped
    }
}

/// JSON Schema for the filter tool's arguments
///
/// Subschemas are inlined so providers that do not resolve `$ref` still see
/// the full shape.
pub fn filter_tool_schema() -> serde_json::Value {
    let generator = schemars::generate::SchemaSettings::draft07()
        .with(|settings| settings.inline_subschemas = true)
        .into_generator();
    let mut schema: serde_json::Value = generator.into_root_schema_for::<ParsedFilters>().into();
    if let Some(obj) = schema.as_object_mut() {
        obj.remove("$schema");
        obj.remove("title");
    }
    schema
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_deserialize_full_filter() {
        let filters: ParsedFilters = serde_json::from_value(json!({
            "summary": "Grocery spending last month",
            "resultType": "summary",
            "dateRange": {"start": "2024-05-01", "end": "2024-05-31"},
            "category": ["Groceries"],
            "transactionType": "expense",
            "aggregation": "sum",
            "groupBy": "merchant"
        }))
        .unwrap();

        assert_eq!(filters.result_type, ResultType::Summary);
        assert_eq!(filters.aggregation, Some(Aggregation::Sum));
        assert_eq!(filters.group_by, Some(GroupBy::Merchant));
        assert_eq!(
            filters.date_range,
            Some(DateRange::new(date("2024-05-01"), date("2024-05-31")))
        );
        assert!(filters.validate().is_ok());
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let result: std::result::Result<ParsedFilters, _> = serde_json::from_value(json!({
            "summary": "x",
            "resultType": "transactions",
            "colour": "blue"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_malformed_date_rejected() {
        let result: std::result::Result<ParsedFilters, _> = serde_json::from_value(json!({
            "summary": "x",
            "resultType": "transactions",
            "dateRange": {"start": "May 1st", "end": "2024-05-31"}
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_between_requires_value2() {
        let mut filters = ParsedFilters::new("between", ResultType::Transactions);
        filters.amount = Some(AmountFilter {
            operator: AmountOperator::Between,
            value: dec!(10),
            value2: None,
        });
        assert!(filters.validate().is_err());

        filters.amount = Some(AmountFilter {
            operator: AmountOperator::Between,
            value: dec!(50),
            value2: Some(dec!(10)),
        });
        assert!(filters.validate().is_err());

        filters.amount = Some(AmountFilter {
            operator: AmountOperator::Between,
            value: dec!(10),
            value2: Some(dec!(50)),
        });
        assert!(filters.validate().is_ok());
    }

    #[test]
    fn test_value2_without_between_rejected() {
        let mut filters = ParsedFilters::new("gt", ResultType::Transactions);
        filters.amount = Some(AmountFilter {
            operator: AmountOperator::Gt,
            value: dec!(10),
            value2: Some(dec!(20)),
        });
        assert!(filters.validate().is_err());
    }

    #[test]
    fn test_negative_amount_rejected() {
        let mut filters = ParsedFilters::new("neg", ResultType::Transactions);
        filters.amount = Some(AmountFilter {
            operator: AmountOperator::Gt,
            value: dec!(-5),
            value2: None,
        });
        assert!(filters.validate().is_err());
    }

    #[test]
    fn test_between_inclusive() {
        let filter = AmountFilter {
            operator: AmountOperator::Between,
            value: dec!(10),
            value2: Some(dec!(50)),
        };
        assert!(filter.matches(dec!(10)));
        assert!(filter.matches(dec!(50)));
        assert!(filter.matches(dec!(27.35)));
        assert!(!filter.matches(dec!(9.99)));
        assert!(!filter.matches(dec!(50.01)));
    }

    #[test]
    fn test_operators() {
        let make = |operator| AmountFilter {
            operator,
            value: dec!(100),
            value2: None,
        };
        assert!(make(AmountOperator::Gt).matches(dec!(100.01)));
        assert!(!make(AmountOperator::Gt).matches(dec!(100)));
        assert!(make(AmountOperator::Gte).matches(dec!(100)));
        assert!(make(AmountOperator::Lt).matches(dec!(99.99)));
        assert!(!make(AmountOperator::Lt).matches(dec!(100)));
        assert!(make(AmountOperator::Lte).matches(dec!(100)));
        assert!(make(AmountOperator::Eq).matches(dec!(100.00)));
        assert!(!make(AmountOperator::Eq).matches(dec!(100.10)));
    }

    #[test]
    fn test_comparison_requires_both_periods() {
        let mut filters = ParsedFilters::new("June vs July", ResultType::Comparison);
        filters.date_range = Some(DateRange::new(date("2024-06-01"), date("2024-06-30")));
        assert!(filters.validate().is_err());

        filters.compare_to = Some(DateRange::new(date("2024-07-01"), date("2024-07-31")));
        assert!(filters.validate().is_ok());

        filters.date_range = None;
        assert!(filters.validate().is_err());
    }

    #[test]
    fn test_compare_to_only_for_comparison() {
        let mut filters = ParsedFilters::new("list", ResultType::Transactions);
        filters.compare_to = Some(DateRange::new(date("2024-07-01"), date("2024-07-31")));
        assert!(filters.validate().is_err());
    }

    #[test]
    fn test_inverted_date_range_rejected() {
        let mut filters = ParsedFilters::new("backwards", ResultType::Transactions);
        filters.date_range = Some(DateRange::new(date("2024-07-31"), date("2024-07-01")));
        assert!(filters.validate().is_err());
    }

    #[test]
    fn test_empty_summary_rejected() {
        let filters = ParsedFilters::new("   ", ResultType::Transactions);
        assert!(filters.validate().is_err());
    }

    #[test]
    fn test_limit_bounds() {
        let mut filters = ParsedFilters::new("list", ResultType::Transactions);
        assert_eq!(filters.effective_limit(), 50);

        filters.limit = Some(0);
        assert!(filters.validate().is_err());

        filters.limit = Some(10_000);
        assert!(filters.validate().is_ok());
        assert_eq!(filters.effective_limit(), 500);
    }

    #[test]
    fn test_categories_normalized() {
        let mut filters = ParsedFilters::new("cats", ResultType::Summary);
        assert!(filters.categories().is_none());

        filters.category = Some(vec![" ".to_string()]);
        assert!(filters.categories().is_none());

        filters.category = Some(vec!["Groceries".to_string(), " Dining ".to_string()]);
        assert_eq!(
            filters.categories().unwrap(),
            vec!["groceries".to_string(), "dining".to_string()]
        );
    }

    #[test]
    fn test_serialization_is_camel_case_and_sparse() {
        let mut filters = ParsedFilters::new("list", ResultType::Transactions);
        filters.sort_by = Some(SortBy::Amount);
        let value = serde_json::to_value(&filters).unwrap();
        assert_eq!(value["resultType"], "transactions");
        assert_eq!(value["sortBy"], "amount");
        assert!(value.get("dateRange").is_none());
        assert!(value.get("compareTo").is_none());
    }

    #[test]
    fn test_tool_schema_shape() {
        let schema = filter_tool_schema();
        assert_eq!(schema["type"], "object");
        assert!(schema.get("$schema").is_none());

        let props = schema["properties"].as_object().unwrap();
        for key in ["summary", "resultType", "dateRange", "amount", "compareTo", "groupBy"] {
            assert!(props.contains_key(key), "schema missing {}", key);
        }

        let required: Vec<&str> = schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|v| v.as_str())
            .collect();
        assert!(required.contains(&"summary"));
        assert!(required.contains(&"resultType"));
        assert!(!required.contains(&"dateRange"));
    }
}
