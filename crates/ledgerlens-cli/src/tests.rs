//! CLI command tests

use std::io::Write;

use ledgerlens_core::quota::today_utc;
use ledgerlens_core::{AIClient, Database, Feature, LedgerlensConfig, SubscriptionTier};
use tempfile::NamedTempFile;

use crate::commands;

const LEDGER_CSV: &str = "\
date,name,merchant,amount,category,pending
2024-05-02,WHOLE FOODS #123,Whole Foods,-42.10,Groceries,false
2024-05-09,TRADER JOES,Trader Joe's,-27.50,Groceries,false
2024-05-11,PAYROLL ACME,,2500.00,Income,false
2024-05-15,BLUE BOTTLE,Blue Bottle Coffee,-6.25,Coffee,false
";

fn setup_test_db() -> Database {
    Database::in_memory().unwrap()
}

fn write_temp(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn mock_service(db: &Database) -> ledgerlens_core::SearchService {
    let config = LedgerlensConfig::embedded().unwrap();
    commands::build_service(db.clone(), AIClient::mock(), &config).unwrap()
}

fn body_json(reply: &ledgerlens_core::Reply) -> serde_json::Value {
    serde_json::to_value(&reply.body).unwrap()
}

// ========== Init / Open Tests ==========

#[test]
fn test_cmd_init_unencrypted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledgerlens.db");

    commands::cmd_init(&path, true).unwrap();
    assert!(path.exists());

    // Reopening runs migrations again without error
    let db = commands::open_db(&path, true).unwrap();
    assert!(db.list_accounts("alice").unwrap().is_empty());
}

// ========== Import Tests ==========

#[test]
fn test_cmd_import_counts_rows() {
    let db = setup_test_db();
    let csv = write_temp(LEDGER_CSV);

    let stats = commands::cmd_import(&db, csv.path(), "alice", "Checking").unwrap();
    assert_eq!(stats.parsed, 4);
    assert_eq!(stats.imported, 4);
    assert_eq!(stats.skipped_duplicates, 0);

    let accounts = db.list_accounts("alice").unwrap();
    assert_eq!(accounts.len(), 1);
    assert_eq!(accounts[0].name, "Checking");
}

#[test]
fn test_cmd_import_twice_skips_duplicates() {
    let db = setup_test_db();
    let csv = write_temp(LEDGER_CSV);

    commands::cmd_import(&db, csv.path(), "alice", "Checking").unwrap();
    let stats = commands::cmd_import(&db, csv.path(), "alice", "Checking").unwrap();

    assert_eq!(stats.imported, 0);
    assert_eq!(stats.skipped_duplicates, 4);
}

#[test]
fn test_cmd_import_missing_file() {
    let db = setup_test_db();
    let dir = tempfile::tempdir().unwrap();

    let result = commands::cmd_import(&db, &dir.path().join("nope.csv"), "alice", "Checking");
    assert!(result.is_err());
}

#[test]
fn test_cmd_import_rejects_bad_amount() {
    let db = setup_test_db();
    let csv = write_temp("date,name,amount\n2024-05-02,WHOLE FOODS,lots\n");

    let result = commands::cmd_import(&db, csv.path(), "alice", "Checking");
    assert!(result.is_err());
    assert!(db.list_accounts("alice").unwrap().is_empty());
}

// ========== Ask Tests ==========

#[tokio::test]
async fn test_cmd_ask_summarizes_spending() {
    let db = setup_test_db();
    let csv = write_temp(LEDGER_CSV);
    commands::cmd_import(&db, csv.path(), "alice", "Checking").unwrap();

    let service = mock_service(&db);
    let reply = commands::cmd_ask(&service, "alice", "How much did I spend?")
        .await
        .unwrap();

    assert_eq!(reply.status, 200);
    let body = body_json(&reply);
    assert_eq!(body["resultType"], "summary");
    // Expenses only: 42.10 + 27.50 + 6.25
    assert_eq!(body["total"], 75.85);
    assert_eq!(body["count"], 3);
}

#[tokio::test]
async fn test_cmd_ask_only_sees_own_ledger() {
    let db = setup_test_db();
    let csv = write_temp(LEDGER_CSV);
    commands::cmd_import(&db, csv.path(), "alice", "Checking").unwrap();

    let service = mock_service(&db);
    let reply = commands::cmd_ask(&service, "bob", "show my transactions")
        .await
        .unwrap();

    assert_eq!(reply.status, 200);
    let body = body_json(&reply);
    assert_eq!(body["resultType"], "transactions");
    assert_eq!(body["totalCount"], 0);
}

#[tokio::test]
async fn test_cmd_ask_empty_question_is_not_metered() {
    let db = setup_test_db();
    let service = mock_service(&db);

    let reply = commands::cmd_ask(&service, "alice", "   ").await.unwrap();
    assert_eq!(reply.status, 400);
    assert_eq!(body_json(&reply)["error"], "invalid_input");

    assert_eq!(db.usage_count("alice", Feature::Search, today_utc()).unwrap(), 0);
}

// ========== Usage / Tier Tests ==========

#[tokio::test]
async fn test_cmd_usage_reflects_searches() {
    let db = setup_test_db();
    let service = mock_service(&db);
    commands::cmd_ask(&service, "alice", "coffee").await.unwrap();

    let config = LedgerlensConfig::embedded().unwrap();
    let report = commands::cmd_usage(&db, &config, "alice").unwrap();

    assert_eq!(report.tier, SubscriptionTier::Free);
    let search = report
        .features
        .iter()
        .find(|f| f.feature == Feature::Search)
        .unwrap();
    assert_eq!(search.used, 1);
    assert_eq!(search.limit, Some(20));
    assert_eq!(search.remaining, 19);
    assert_eq!(search.input_tokens, 100);
}

#[test]
fn test_cmd_tier_raises_limit() {
    let db = setup_test_db();
    let config = LedgerlensConfig::embedded().unwrap();

    commands::cmd_tier(&db, "alice", SubscriptionTier::Pro).unwrap();
    assert!(db.is_pro("alice").unwrap());

    let report = commands::cmd_usage(&db, &config, "alice").unwrap();
    assert_eq!(report.tier, SubscriptionTier::Pro);
    assert_eq!(report.features[0].limit, Some(1000));

    commands::cmd_tier(&db, "alice", SubscriptionTier::Free).unwrap();
    assert!(!db.is_pro("alice").unwrap());
}

// ========== Config / Schema Tests ==========

#[test]
fn test_load_config_from_file() {
    let file = write_temp("[tiers.free]\nsearch = 3\n\n[tiers.pro]\nsearch = 50\n");

    let config = commands::load_config(Some(file.path())).unwrap();
    assert_eq!(
        config.quotas.limit_for(SubscriptionTier::Free, Feature::Search),
        Some(3)
    );
    assert_eq!(
        config.quotas.limit_for(SubscriptionTier::Pro, Feature::Search),
        Some(50)
    );
}

#[test]
fn test_load_config_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    assert!(commands::load_config(Some(&dir.path().join("missing.toml"))).is_err());
}

#[test]
fn test_tool_definition() {
    let definition = commands::tool_definition();
    assert_eq!(definition["name"], "extract_search_filters");
    assert!(definition["description"].as_str().unwrap().len() > 10);
    assert_eq!(definition["input_schema"]["type"], "object");
    assert!(commands::cmd_schema().is_ok());
}
