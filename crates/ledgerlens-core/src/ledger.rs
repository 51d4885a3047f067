//! Read access to one user's transaction ledger
//!
//! The executor only ever sees a `LedgerAccess`, already scoped to the caller.

use crate::db::{Database, LedgerFilter};
use crate::error::Result;
use crate::filters::DateRange;
use crate::models::Transaction;

/// A user-scoped, read-only view of a transaction ledger
pub trait LedgerAccess: Send + Sync {
    /// Transactions inside `range` (inclusive), or all of them when `None`
    fn transactions(&self, range: Option<&DateRange>) -> Result<Vec<Transaction>>;
}

/// Ledger backed by the SQLite store
#[derive(Clone)]
pub struct UserLedger {
    db: Database,
    user_id: String,
}

impl UserLedger {
    pub fn new(db: Database, user_id: impl Into<String>) -> Self {
        Self {
            db,
            user_id: user_id.into(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }
}

impl LedgerAccess for UserLedger {
    fn transactions(&self, range: Option<&DateRange>) -> Result<Vec<Transaction>> {
        let filter =
            LedgerFilter::for_user(&self.user_id).date_range(range.map(|r| (r.start, r.end)));
        self.db.list_transactions(filter)
    }
}

/// Ledger held in memory
#[derive(Debug, Clone, Default)]
pub struct VecLedger {
    transactions: Vec<Transaction>,
}

impl VecLedger {
    pub fn new(transactions: Vec<Transaction>) -> Self {
        Self { transactions }
    }
}

impl LedgerAccess for VecLedger {
    fn transactions(&self, range: Option<&DateRange>) -> Result<Vec<Transaction>> {
        Ok(self
            .transactions
            .iter()
            .filter(|tx| range.map_or(true, |r| r.contains(tx.date)))
            .cloned()
            .collect())
    }
}
