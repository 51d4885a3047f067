//! Database tests

use super::*;
use crate::models::*;
use chrono::NaiveDate;
use rust_decimal_macros::dec;
use std::sync::Arc;

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn new_tx(day: &str, name: &str, amount: rust_decimal::Decimal, hash: &str) -> NewTransaction {
    NewTransaction {
        date: date(day),
        name: name.to_string(),
        merchant_name: None,
        amount,
        category: Some("Groceries".to_string()),
        pending: false,
        import_hash: hash.to_string(),
    }
}

#[test]
fn test_in_memory_db() {
    let db = Database::in_memory().unwrap();
    assert!(db.list_accounts("alice").unwrap().is_empty());
    assert!(db.path().contains("ledgerlens_test_"));
}

#[test]
fn test_account_upsert_is_per_user() {
    let db = Database::in_memory().unwrap();

    let a1 = db.upsert_account("alice", "Checking").unwrap();
    let a2 = db.upsert_account("alice", "Checking").unwrap();
    let b1 = db.upsert_account("bob", "Checking").unwrap();

    assert_eq!(a1, a2);
    assert_ne!(a1, b1);
    assert_eq!(db.list_accounts("alice").unwrap().len(), 1);
}

#[test]
fn test_transaction_dedup_and_decimal_roundtrip() {
    let db = Database::in_memory().unwrap();
    let account = db.upsert_account("alice", "Checking").unwrap();

    let tx = new_tx("2024-05-03", "WHOLE FOODS", dec!(-42.10), "h1");
    assert!(db.insert_transaction(account, &tx).unwrap().is_some());
    assert!(db.insert_transaction(account, &tx).unwrap().is_none());

    let rows = db.list_transactions(LedgerFilter::for_user("alice")).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].amount, dec!(-42.10));
    assert!(!rows[0].is_income);
    assert_eq!(rows[0].date, date("2024-05-03"));
}

#[test]
fn test_reads_are_user_scoped() {
    let db = Database::in_memory().unwrap();
    let alice = db.upsert_account("alice", "Checking").unwrap();
    let bob = db.upsert_account("bob", "Checking").unwrap();

    db.insert_transaction(alice, &new_tx("2024-05-03", "A", dec!(-1), "a"))
        .unwrap();
    db.insert_transaction(bob, &new_tx("2024-05-03", "B", dec!(-2), "b"))
        .unwrap();

    let rows = db.list_transactions(LedgerFilter::for_user("alice")).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].name, "A");
    assert!(db
        .list_transactions(LedgerFilter::for_user("carol"))
        .unwrap()
        .is_empty());
}

#[test]
fn test_date_range_filter_inclusive() {
    let db = Database::in_memory().unwrap();
    let account = db.upsert_account("alice", "Checking").unwrap();
    for (i, day) in ["2024-04-30", "2024-05-01", "2024-05-31", "2024-06-01"]
        .iter()
        .enumerate()
    {
        db.insert_transaction(account, &new_tx(day, "X", dec!(-1), &format!("h{}", i)))
            .unwrap();
    }

    let filter = LedgerFilter::for_user("alice")
        .date_range(Some((date("2024-05-01"), date("2024-05-31"))));
    let rows = db.list_transactions(filter).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].date, date("2024-05-31"));
}

#[test]
fn test_tier_defaults_to_free() {
    let db = Database::in_memory().unwrap();
    assert_eq!(db.get_tier("nobody").unwrap(), SubscriptionTier::Free);

    db.set_tier("alice", SubscriptionTier::Pro).unwrap();
    assert!(db.is_pro("alice").unwrap());

    db.set_tier("alice", SubscriptionTier::Free).unwrap();
    assert!(!db.is_pro("alice").unwrap());
}

#[test]
fn test_try_consume_stops_at_limit() {
    let db = Database::in_memory().unwrap();
    let day = date("2024-06-01");

    assert_eq!(
        db.try_consume("alice", Feature::Search, day, 2).unwrap(),
        ConsumeOutcome::Consumed(1)
    );
    assert_eq!(
        db.try_consume("alice", Feature::Search, day, 2).unwrap(),
        ConsumeOutcome::Consumed(2)
    );
    assert_eq!(
        db.try_consume("alice", Feature::Search, day, 2).unwrap(),
        ConsumeOutcome::AtLimit
    );
    assert_eq!(db.usage_count("alice", Feature::Search, day).unwrap(), 2);

    // New day, fresh counter
    assert_eq!(
        db.try_consume("alice", Feature::Search, date("2024-06-02"), 2)
            .unwrap(),
        ConsumeOutcome::Consumed(1)
    );
}

#[test]
fn test_zero_limit_writes_nothing() {
    let db = Database::in_memory().unwrap();
    let day = date("2024-06-01");
    assert_eq!(
        db.try_consume("alice", Feature::Search, day, 0).unwrap(),
        ConsumeOutcome::AtLimit
    );
    assert!(db.usage_for_day("alice", day).unwrap().is_empty());
}

#[test]
fn test_record_tokens_needs_existing_row() {
    let db = Database::in_memory().unwrap();
    let day = date("2024-06-01");

    assert!(!db
        .record_tokens("alice", Feature::Search, day, 100, 20)
        .unwrap());

    db.try_consume("alice", Feature::Search, day, 5).unwrap();
    assert!(db
        .record_tokens("alice", Feature::Search, day, 100, 20)
        .unwrap());
    assert!(db
        .record_tokens("alice", Feature::Search, day, 50, 5)
        .unwrap());

    let records = db.usage_for_day("alice", day).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].count, 1);
    assert_eq!(records[0].input_tokens, 150);
    assert_eq!(records[0].output_tokens, 25);
    assert_eq!(records[0].feature, Feature::Search);
}

#[test]
fn test_concurrent_consume_never_exceeds_limit() {
    let db = Arc::new(Database::in_memory().unwrap());
    let day = date("2024-06-01");
    let limit = 5;

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let db = Arc::clone(&db);
            std::thread::spawn(move || db.try_consume("alice", Feature::Search, day, limit).unwrap())
        })
        .collect();

    let consumed = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|outcome| matches!(outcome, ConsumeOutcome::Consumed(_)))
        .count();

    assert_eq!(consumed, 5);
    assert_eq!(db.usage_count("alice", Feature::Search, day).unwrap(), 5);
}
