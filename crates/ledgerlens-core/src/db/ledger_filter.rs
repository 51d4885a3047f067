//! Builder for user-scoped ledger reads
//!
//! Every read goes through the owning user's accounts, so one user's query
//! can never see another user's rows.

use chrono::NaiveDate;

/// Columns selected for a `Transaction`, in `row_to_transaction` order
pub(crate) const TRANSACTION_COLUMNS: &str =
    "t.id, t.account_id, t.date, t.name, t.merchant_name, t.amount, t.category, t.is_income, t.pending";

/// Builder for constructing ledger query filters
pub struct LedgerFilter<'query> {
    user_id: &'query str,
    date_range: Option<(NaiveDate, NaiveDate)>,
}

/// SQL components and parameters produced by [`LedgerFilter::build`]
pub struct LedgerQuery {
    /// WHERE clause including "WHERE" keyword
    pub where_clause: String,
    /// Parameters for the query (boxed for rusqlite compatibility)
    pub params: Vec<Box<dyn rusqlite::ToSql>>,
}

impl<'query> LedgerFilter<'query> {
    /// Filter scoped to one user's ledger
    pub fn for_user(user_id: &'query str) -> Self {
        Self {
            user_id,
            date_range: None,
        }
    }

    /// Restrict to an inclusive date range
    pub fn date_range(mut self, range: Option<(NaiveDate, NaiveDate)>) -> Self {
        self.date_range = range;
        self
    }

    /// Build the filter components
    pub fn build(self) -> LedgerQuery {
        let mut conditions = vec!["a.user_id = ?".to_string()];
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(self.user_id.to_string())];

        // ISO dates compare correctly as text
        if let Some((from_date, to_date)) = self.date_range {
            conditions.push("t.date >= ? AND t.date <= ?".to_string());
            params.push(Box::new(from_date.to_string()));
            params.push(Box::new(to_date.to_string()));
        }

        LedgerQuery {
            where_clause: format!("WHERE {}", conditions.join(" AND ")),
            params,
        }
    }
}

impl LedgerQuery {
    /// Build the row query, newest first
    pub fn build_select_query(&self) -> String {
        format!(
            "SELECT {} FROM transactions t JOIN accounts a ON t.account_id = a.id {} \
             ORDER BY t.date DESC, t.id DESC",
            TRANSACTION_COLUMNS, self.where_clause
        )
    }

    /// Get parameter references for query execution
    pub fn params_refs(&self) -> Vec<&dyn rusqlite::ToSql> {
        self.params.iter().map(|p| p.as_ref()).collect()
    }
}
