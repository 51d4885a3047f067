//! Deterministic execution of `ParsedFilters` against a ledger
//!
//! Filtering runs in a fixed order, each stage skipped when its filter is
//! absent: date range, amount (on the absolute value), merchant, category,
//! transaction type. The surviving rows then feed one of three branches:
//! a sorted, truncated list; an aggregate with optional breakdown; or a
//! two-period comparison.
//!
//! Money is `Decimal` throughout. Aggregates are signed sums: a set restricted
//! to expenses reports spending as a positive total, an unrestricted set reports
//! income net of expenses. Nothing here rounds; presentation rounding happens
//! when the response is assembled.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::filters::{
    Aggregation, DateRange, GroupBy, ParsedFilters, ResultType, SortBy, SortOrder, TransactionType,
};
use crate::ledger::LedgerAccess;
use crate::models::Transaction;

/// Bucket label for transactions without a category
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Output of the executor, tagged by `resultType`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "resultType", rename_all = "camelCase")]
pub enum ExecutionResult {
    Transactions(TransactionsResult),
    Summary(SummaryResult),
    Comparison(ComparisonResult),
}

impl ExecutionResult {
    pub fn result_type(&self) -> ResultType {
        match self {
            Self::Transactions(_) => ResultType::Transactions,
            Self::Summary(_) => ResultType::Summary,
            Self::Comparison(_) => ResultType::Comparison,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionsResult {
    pub items: Vec<Transaction>,
    /// Matches before the limit was applied
    pub total_count: usize,
    pub has_more: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryResult {
    /// The aggregate `value` holds
    pub aggregation: Aggregation,
    pub value: Decimal,
    /// Sum of absolute amounts
    pub total: Decimal,
    pub count: usize,
    pub average: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_by: Option<GroupBy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<Vec<BreakdownBucket>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakdownBucket {
    pub key: String,
    pub total: Decimal,
    pub count: usize,
    /// Share of the overall total, 0-100
    pub percentage: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodTotals {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub total: Decimal,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResult {
    pub period1: PeriodTotals,
    pub period2: PeriodTotals,
    /// period2 total minus period1 total
    pub difference: Decimal,
    /// `None` when period1's total is zero
    pub percentage_change: Option<Decimal>,
}

/// Run `filters` against `ledger`
///
/// The filters are validated again here; invalid filters are an error, not an
/// empty result.
pub fn execute(filters: &ParsedFilters, ledger: &dyn LedgerAccess) -> Result<ExecutionResult> {
    filters.validate()?;

    let result = match filters.result_type {
        ResultType::Transactions => {
            let rows = matching(filters, ledger, filters.date_range.as_ref())?;
            ExecutionResult::Transactions(list(filters, rows))
        }
        ResultType::Summary => {
            let rows = matching(filters, ledger, filters.date_range.as_ref())?;
            ExecutionResult::Summary(summarize(filters, &rows))
        }
        ResultType::Comparison => ExecutionResult::Comparison(compare(filters, ledger)?),
    };

    debug!(result_type = filters.result_type.as_str(), "Filters executed");
    Ok(result)
}

/// Rows in `range` that pass every non-date filter
fn matching(
    filters: &ParsedFilters,
    ledger: &dyn LedgerAccess,
    range: Option<&DateRange>,
) -> Result<Vec<Transaction>> {
    let merchant = filters
        .merchant
        .as_deref()
        .map(|m| m.trim().to_lowercase())
        .filter(|m| !m.is_empty());
    let categories = filters.categories();

    Ok(ledger
        .transactions(range)?
        .into_iter()
        // Ledgers may return a superset; clip again
        .filter(|tx| range.map_or(true, |r| r.contains(tx.date)))
        .filter(|tx| {
            filters
                .amount
                .as_ref()
                .map_or(true, |a| a.matches(tx.amount.abs()))
        })
        .filter(|tx| {
            merchant
                .as_deref()
                .map_or(true, |m| tx.merchant_or_name().to_lowercase().contains(m))
        })
        .filter(|tx| {
            categories.as_ref().map_or(true, |wanted| {
                tx.category.as_deref().is_some_and(|c| {
                    let c = c.to_lowercase();
                    wanted.iter().any(|w| c.contains(w.as_str()))
                })
            })
        })
        .filter(|tx| match filters.transaction_type {
            Some(TransactionType::Expense) => tx.is_expense(),
            Some(TransactionType::Income) => tx.is_inflow(),
            Some(TransactionType::All) | None => true,
        })
        .collect())
}

fn list(filters: &ParsedFilters, mut rows: Vec<Transaction>) -> TransactionsResult {
    let sort_by = filters.sort_by.unwrap_or(SortBy::Date);
    let order = filters.sort_order.unwrap_or(SortOrder::Desc);

    rows.sort_by(|a, b| {
        let primary = match sort_by {
            SortBy::Date => a.date.cmp(&b.date),
            SortBy::Amount => a.amount.abs().cmp(&b.amount.abs()),
        };
        let primary = match order {
            SortOrder::Asc => primary,
            SortOrder::Desc => primary.reverse(),
        };
        primary
            .then_with(|| b.date.cmp(&a.date))
            .then_with(|| b.id.cmp(&a.id))
    });

    let limit = filters.effective_limit();
    let total_count = rows.len();
    rows.truncate(limit);

    TransactionsResult {
        items: rows,
        total_count,
        has_more: total_count > limit,
    }
}

/// Signed sum of `rows`, as seen from the requested transaction type
///
/// Expense-only sets report spending as a positive number; unrestricted sets
/// report the net of income and expenses.
fn signed_total<'a>(
    transaction_type: Option<TransactionType>,
    rows: impl IntoIterator<Item = &'a Transaction>,
) -> Decimal {
    let net: Decimal = rows.into_iter().map(|tx| tx.amount).sum();
    match transaction_type {
        Some(TransactionType::Expense) => -net,
        _ => net,
    }
}

/// Total and row count
fn totals(filters: &ParsedFilters, rows: &[Transaction]) -> (Decimal, usize) {
    (signed_total(filters.transaction_type, rows), rows.len())
}

fn average(total: Decimal, count: usize) -> Decimal {
    if count == 0 {
        Decimal::ZERO
    } else {
        total / Decimal::from(count)
    }
}

fn summarize(filters: &ParsedFilters, rows: &[Transaction]) -> SummaryResult {
    let (total, count) = totals(filters, rows);
    let average = average(total, count);

    let aggregation = match filters.aggregation {
        Some(Aggregation::None) | None => Aggregation::Sum,
        Some(other) => other,
    };
    let value = match aggregation {
        Aggregation::Sum | Aggregation::None => total,
        Aggregation::Average => average,
        Aggregation::Count => Decimal::from(count),
    };

    SummaryResult {
        aggregation,
        value,
        total,
        count,
        average,
        group_by: filters.group_by,
        breakdown: filters.group_by.map(|g| breakdown(filters, g, rows, total)),
    }
}

/// Display label for the bucket `tx` falls in
fn bucket_label(group_by: GroupBy, tx: &Transaction) -> String {
    match group_by {
        GroupBy::Category => tx
            .category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(UNCATEGORIZED)
            .to_string(),
        GroupBy::Merchant => tx.merchant_or_name().trim().to_string(),
        GroupBy::Month => tx.date.format("%Y-%m").to_string(),
    }
}

fn breakdown(
    filters: &ParsedFilters,
    group_by: GroupBy,
    rows: &[Transaction],
    overall: Decimal,
) -> Vec<BreakdownBucket> {
    // Keyed case-insensitively, like the category and merchant filters; the
    // first spelling seen becomes the label
    let mut groups: BTreeMap<String, (String, Vec<&Transaction>)> = BTreeMap::new();
    for tx in rows {
        let label = bucket_label(group_by, tx);
        groups
            .entry(label.to_lowercase())
            .or_insert_with(|| (label, Vec::new()))
            .1
            .push(tx);
    }

    let mut buckets: Vec<BreakdownBucket> = groups
        .into_values()
        .map(|(key, members)| {
            let total = signed_total(filters.transaction_type, members.iter().copied());
            BreakdownBucket {
                key,
                total,
                count: members.len(),
                percentage: if overall.is_zero() {
                    Decimal::ZERO
                } else {
                    total * Decimal::ONE_HUNDRED / overall
                },
            }
        })
        .collect();

    // Largest contributors first, whatever their sign
    buckets.sort_by(|a, b| match b.total.abs().cmp(&a.total.abs()) {
        Ordering::Equal => a.key.cmp(&b.key),
        other => other,
    });
    buckets
}

fn compare(filters: &ParsedFilters, ledger: &dyn LedgerAccess) -> Result<ComparisonResult> {
    // validate() guarantees both ranges for comparisons
    let (Some(first), Some(second)) = (filters.date_range, filters.compare_to) else {
        return Err(crate::error::Error::InvalidFilters(
            "comparison requires dateRange and compareTo".into(),
        ));
    };

    let period = |range: DateRange| -> Result<PeriodTotals> {
        let rows = matching(filters, ledger, Some(&range))?;
        let (total, count) = totals(filters, &rows);
        Ok(PeriodTotals {
            start: range.start,
            end: range.end,
            total,
            count,
        })
    };

    let period1 = period(first)?;
    let period2 = period(second)?;
    let difference = period2.total - period1.total;
    let percentage_change = if period1.total.is_zero() {
        None
    } else {
        Some(difference * Decimal::ONE_HUNDRED / period1.total.abs())
    };

    Ok(ComparisonResult {
        period1,
        period2,
        difference,
        percentage_change,
    })
}
