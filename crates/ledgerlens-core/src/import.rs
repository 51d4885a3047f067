//! CSV ledger import
//!
//! Expected header (order free, names case-insensitive):
//! `date,name,merchant,amount,category,pending`. Only `date`, `name` and
//! `amount` are required. Amounts are signed: negative = expense.
//!
//! Each row gets a SHA-256 import hash, so importing the same file twice adds
//! nothing the second time.

use std::collections::HashMap;
use std::io::Read;
use std::str::FromStr;

use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord};
use rust_decimal::Decimal;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::NewTransaction;

/// Outcome of one import run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportStats {
    pub parsed: usize,
    pub imported: usize,
    pub skipped_duplicates: usize,
}

/// Column positions resolved from the header row
struct Columns {
    date: usize,
    name: usize,
    amount: usize,
    merchant: Option<usize>,
    category: Option<usize>,
    pending: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &StringRecord) -> Result<Self> {
        let index: HashMap<String, usize> = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.trim().to_lowercase(), i))
            .collect();
        let required = |name: &str| {
            index
                .get(name)
                .copied()
                .ok_or_else(|| Error::Import(format!("Missing required column: {}", name)))
        };

        Ok(Self {
            date: required("date")?,
            name: required("name")?,
            amount: required("amount")?,
            merchant: index.get("merchant").copied(),
            category: index.get("category").copied(),
            pending: index.get("pending").copied(),
        })
    }
}

/// Non-empty trimmed value of an optional column
fn optional_field(record: &StringRecord, column: Option<usize>) -> Option<String> {
    column
        .and_then(|i| record.get(i))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// Parse a ledger CSV into transactions ready for insertion
pub fn parse_ledger_csv<R: Read>(reader: R) -> Result<Vec<NewTransaction>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let columns = Columns::from_headers(rdr.headers()?)?;
    let mut occurrences: HashMap<(NaiveDate, String, Decimal), u32> = HashMap::new();
    let mut transactions = Vec::new();

    for (row, result) in rdr.records().enumerate() {
        let record = result?;
        // Header is line 1
        let line = row + 2;
        let field = |i: usize, what: &str| {
            record
                .get(i)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .ok_or_else(|| Error::Import(format!("Line {}: missing {}", line, what)))
        };

        let date = parse_date(field(columns.date, "date")?)
            .map_err(|e| Error::Import(format!("Line {}: {}", line, e)))?;
        let name = field(columns.name, "name")?.to_string();
        let amount = parse_amount(field(columns.amount, "amount")?)
            .map_err(|e| Error::Import(format!("Line {}: {}", line, e)))?;
        let pending = match optional_field(&record, columns.pending) {
            Some(value) => parse_flag(&value)
                .map_err(|e| Error::Import(format!("Line {}: {}", line, e)))?,
            None => false,
        };

        // Identical rows in one file are distinct purchases
        let occurrence = occurrences
            .entry((date, name.clone(), amount))
            .and_modify(|n| *n += 1)
            .or_insert(0);

        transactions.push(NewTransaction {
            import_hash: import_hash(date, &name, amount, *occurrence),
            date,
            name,
            merchant_name: optional_field(&record, columns.merchant),
            amount,
            category: optional_field(&record, columns.category),
            pending,
        });
    }

    debug!(rows = transactions.len(), "Parsed ledger CSV");
    Ok(transactions)
}

/// Import a CSV into `account` of `user_id`, creating the account if needed
pub fn import_ledger<R: Read>(
    db: &Database,
    user_id: &str,
    account: &str,
    reader: R,
) -> Result<ImportStats> {
    let transactions = parse_ledger_csv(reader)?;
    let account_id = db.upsert_account(user_id, account)?;

    let mut stats = ImportStats {
        parsed: transactions.len(),
        ..Default::default()
    };
    for tx in &transactions {
        match db.insert_transaction(account_id, tx)? {
            Some(_) => stats.imported += 1,
            None => stats.skipped_duplicates += 1,
        }
    }

    info!(
        user_id,
        account,
        imported = stats.imported,
        skipped = stats.skipped_duplicates,
        "Ledger import complete"
    );
    Ok(stats)
}

/// Stable hash identifying a row for deduplication
fn import_hash(date: NaiveDate, name: &str, amount: Decimal, occurrence: u32) -> String {
    let mut hasher = Sha256::new();
    hasher.update(date.to_string().as_bytes());
    hasher.update([0]);
    hasher.update(name.as_bytes());
    hasher.update([0]);
    // normalize() so 5.5 and 5.50 hash alike
    hasher.update(amount.normalize().to_string().as_bytes());
    hasher.update(occurrence.to_be_bytes());
    hex::encode(hasher.finalize())
}

/// Parse a date string in the formats bank exports commonly use
fn parse_date(s: &str) -> Result<NaiveDate> {
    let formats = [
        "%Y-%m-%d", // 2024-01-15
        "%m/%d/%Y", // 01/15/2024
        "%m/%d/%y", // 01/15/24
    ];

    formats
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s.trim(), fmt).ok())
        .ok_or_else(|| Error::Import(format!("Unable to parse date: {}", s)))
}

/// Parse an amount, handling currency symbols, thousands separators and
/// accounting-style parentheses
fn parse_amount(s: &str) -> Result<Decimal> {
    let cleaned: String = s
        .trim()
        .replace(['$', ',', ' '], "")
        .replace('(', "-")
        .replace(')', "");

    Decimal::from_str(&cleaned).map_err(|_| Error::Import(format!("Unable to parse amount: {}", s)))
}

fn parse_flag(s: &str) -> Result<bool> {
    match s.to_lowercase().as_str() {
        "true" | "yes" | "y" | "1" => Ok(true),
        "false" | "no" | "n" | "0" => Ok(false),
        _ => Err(Error::Import(format!("Unable to parse pending flag: {}", s))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::LedgerFilter;
    use rust_decimal_macros::dec;

    const LEDGER: &str = "date,name,merchant,amount,category,pending
2024-05-03,WHOLEFDS #123,Whole Foods,-42.10,Groceries,false
2024-05-10,TRADER JOE'S,,-18.50,Groceries,
05/31/2024,ACME PAYROLL,,\"$2,500.00\",Income,no
2024-06-02,BLUE BOTTLE,Blue Bottle,-6.25,,true
";

    #[test]
    fn test_parse_date() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        assert_eq!(parse_date("2024-01-15").unwrap(), expected);
        assert_eq!(parse_date("01/15/2024").unwrap(), expected);
        assert!(parse_date("15.01.2024").is_err());
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("$1,234.56").unwrap(), dec!(1234.56));
        assert_eq!(parse_amount("-123.45").unwrap(), dec!(-123.45));
        assert_eq!(parse_amount("(100.00)").unwrap(), dec!(-100.00));
        assert!(parse_amount("twelve").is_err());
    }

    #[test]
    fn test_parse_ledger_csv() {
        let txs = parse_ledger_csv(LEDGER.as_bytes()).unwrap();
        assert_eq!(txs.len(), 4);

        assert_eq!(txs[0].merchant_name.as_deref(), Some("Whole Foods"));
        assert_eq!(txs[0].amount, dec!(-42.10));
        assert_eq!(txs[1].merchant_name, None);
        assert!(!txs[1].pending);
        assert_eq!(txs[2].amount, dec!(2500.00));
        assert_eq!(txs[2].date, NaiveDate::from_ymd_opt(2024, 5, 31).unwrap());
        assert_eq!(txs[3].category, None);
        assert!(txs[3].pending);
    }

    #[test]
    fn test_columns_in_any_order() {
        let csv = "Amount,Name,Date\n-5.00,COFFEE,2024-06-01\n";
        let txs = parse_ledger_csv(csv.as_bytes()).unwrap();
        assert_eq!(txs[0].name, "COFFEE");
        assert_eq!(txs[0].amount, dec!(-5.00));
    }

    #[test]
    fn test_missing_column_and_bad_row() {
        let err = parse_ledger_csv("date,name\n2024-06-01,X\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("amount"));

        let err = parse_ledger_csv("date,name,amount\n2024-06-01,X,abc\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("Line 2"));
    }

    #[test]
    fn test_identical_rows_hash_differently() {
        let csv = "date,name,amount\n2024-06-01,COFFEE,-4.50\n2024-06-01,COFFEE,-4.5\n";
        let txs = parse_ledger_csv(csv.as_bytes()).unwrap();
        assert_ne!(txs[0].import_hash, txs[1].import_hash);

        // Same row, same position: same hash
        let again = parse_ledger_csv(csv.as_bytes()).unwrap();
        assert_eq!(txs[0].import_hash, again[0].import_hash);
    }

    #[test]
    fn test_import_is_idempotent() {
        let db = Database::in_memory().unwrap();

        let first = import_ledger(&db, "alice", "Checking", LEDGER.as_bytes()).unwrap();
        assert_eq!(first.parsed, 4);
        assert_eq!(first.imported, 4);

        let second = import_ledger(&db, "alice", "Checking", LEDGER.as_bytes()).unwrap();
        assert_eq!(second.imported, 0);
        assert_eq!(second.skipped_duplicates, 4);

        let stored = db.list_transactions(LedgerFilter::for_user("alice")).unwrap();
        assert_eq!(stored.len(), 4);
        assert!(db
            .list_transactions(LedgerFilter::for_user("bob"))
            .unwrap()
            .is_empty());
    }
}
