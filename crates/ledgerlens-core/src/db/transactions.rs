//! Transaction operations

use std::str::FromStr;

use rusqlite::params;
use rust_decimal::Decimal;

use super::{Database, LedgerFilter};
use crate::error::Result;
use crate::models::{NewTransaction, Transaction};

impl Database {
    /// Insert a transaction (returns None if duplicate)
    ///
    /// Duplicates are detected by `import_hash` within the account.
    pub fn insert_transaction(&self, account_id: i64, tx: &NewTransaction) -> Result<Option<i64>> {
        let conn = self.conn()?;

        let inserted = conn.execute(
            r#"
            INSERT INTO transactions
                (account_id, date, name, merchant_name, amount, category, is_income, pending, import_hash)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(account_id, import_hash) DO NOTHING
            "#,
            params![
                account_id,
                tx.date.to_string(),
                tx.name,
                tx.merchant_name,
                tx.amount.to_string(),
                tx.category,
                tx.amount > Decimal::ZERO,
                tx.pending,
                tx.import_hash,
            ],
        )?;

        if inserted == 0 {
            return Ok(None);
        }
        Ok(Some(conn.last_insert_rowid()))
    }

    /// List transactions matching a filter, newest first
    pub fn list_transactions(&self, filter: LedgerFilter<'_>) -> Result<Vec<Transaction>> {
        let query = filter.build();
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&query.build_select_query())?;

        let transactions = stmt
            .query_map(query.params_refs().as_slice(), Self::row_to_transaction)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(transactions)
    }

    /// Map a row selected with `TRANSACTION_COLUMNS`
    pub(crate) fn row_to_transaction(row: &rusqlite::Row) -> rusqlite::Result<Transaction> {
        let date_str: String = row.get(2)?;
        let amount_str: String = row.get(5)?;

        let date = chrono::NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
        })?;
        let amount = Decimal::from_str(&amount_str).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
        })?;

        Ok(Transaction {
            id: row.get(0)?,
            account_id: row.get(1)?,
            date,
            name: row.get(3)?,
            merchant_name: row.get(4)?,
            amount,
            category: row.get(6)?,
            is_income: row.get(7)?,
            pending: row.get(8)?,
        })
    }
}
