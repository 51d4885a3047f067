//! Integration tests for ledgerlens-core
//!
//! These tests exercise the full import → parse → quota → execute workflow
//! against a file-backed database.

use chrono::NaiveDate;
use ledgerlens_core::{
    ai::MockBackend,
    filters::FILTER_TOOL_NAME,
    import_ledger,
    models::{Feature, SubscriptionTier},
    Database, LedgerlensConfig, MockReply, PromptLibrary, QuotaLimits, SearchError,
    SearchService,
};
use serde_json::json;

/// Two months of a small household ledger
fn household_csv() -> &'static str {
    r#"date,name,merchant,amount,category,pending
2024-04-03,BLUE BOTTLE 0042,Blue Bottle Coffee,-5.00,Coffee,false
2024-04-17,BLUE BOTTLE 0042,Blue Bottle Coffee,-5.00,Coffee,false
2024-04-20,SAFEWAY #1182,Safeway,-88.40,Groceries,false
2024-04-30,PAYROLL ACME CORP,,3200.00,Income,false
2024-05-02,BLUE BOTTLE 0042,Blue Bottle Coffee,-6.25,Coffee,false
2024-05-09,BLUE BOTTLE 0042,Blue Bottle Coffee,-6.25,Coffee,false
2024-05-21,PEETS COFFEE,Peet's,-2.50,Coffee,false
2024-05-22,SAFEWAY #1182,Safeway,-61.15,Groceries,false"#
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
}

fn file_db(dir: &tempfile::TempDir) -> Database {
    let path = dir.path().join("ledgerlens.db");
    Database::new_unencrypted(path.to_str().unwrap()).expect("Failed to open database")
}

fn service(db: &Database, backend: MockBackend, limits: QuotaLimits) -> SearchService {
    let config = LedgerlensConfig {
        quotas: limits,
        ..LedgerlensConfig::embedded().unwrap()
    };
    SearchService::with_backend(db.clone(), backend, &config, &PromptLibrary::embedded_only())
        .expect("Failed to build search service")
}

// =============================================================================
// Import → Search Workflow
// =============================================================================

#[tokio::test]
async fn test_import_then_compare_months() {
    let dir = tempfile::tempdir().unwrap();
    let db = file_db(&dir);

    let stats = import_ledger(&db, "alice", "Checking", household_csv().as_bytes()).unwrap();
    assert_eq!(stats.imported, 8);

    let backend = MockBackend::new().with_replies([MockReply::call(
        FILTER_TOOL_NAME,
        json!({
            "summary": "Coffee spending in April vs May 2024",
            "resultType": "comparison",
            "category": ["coffee"],
            "transactionType": "expense",
            "dateRange": {"start": "2024-04-01", "end": "2024-04-30"},
            "compareTo": {"start": "2024-05-01", "end": "2024-05-31"}
        }),
    )]);
    let search = service(&db, backend, QuotaLimits::default());

    let response = search
        .search_on(Some("alice"), "Did I spend more on coffee in May than April?", today())
        .await
        .unwrap();
    let body = serde_json::to_value(&response).unwrap();

    assert_eq!(body["resultType"], "comparison");
    assert_eq!(body["period1"]["total"], 10.0);
    assert_eq!(body["period1"]["count"], 2);
    assert_eq!(body["period2"]["total"], 15.0);
    assert_eq!(body["period2"]["count"], 3);
    assert_eq!(body["difference"], 5.0);
    assert_eq!(body["percentageChange"], 50.0);
    assert_eq!(
        body["interpretation"]["summary"],
        "Coffee spending in April vs May 2024"
    );
}

#[tokio::test]
async fn test_reimport_does_not_double_totals() {
    let dir = tempfile::tempdir().unwrap();
    let db = file_db(&dir);

    import_ledger(&db, "alice", "Checking", household_csv().as_bytes()).unwrap();
    let again = import_ledger(&db, "alice", "Checking", household_csv().as_bytes()).unwrap();
    assert_eq!(again.imported, 0);
    assert_eq!(again.skipped_duplicates, 8);

    let backend = MockBackend::new().with_replies([MockReply::call(
        FILTER_TOOL_NAME,
        json!({
            "summary": "Total grocery spending",
            "resultType": "summary",
            "aggregation": "sum",
            "category": ["Groceries"],
            "transactionType": "expense"
        }),
    )]);
    let search = service(&db, backend, QuotaLimits::default());

    let response = search
        .search_on(Some("alice"), "How much have I spent on groceries?", today())
        .await
        .unwrap();
    let body = serde_json::to_value(&response).unwrap();

    assert_eq!(body["total"], 149.55);
    assert_eq!(body["count"], 2);
}

// =============================================================================
// Quota Under Concurrency
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_searches_never_exceed_limit() {
    let dir = tempfile::tempdir().unwrap();
    let db = file_db(&dir);
    import_ledger(&db, "alice", "Checking", household_csv().as_bytes()).unwrap();

    let limits = QuotaLimits::new().with_limit(SubscriptionTier::Free, Feature::Search, 5);
    let search = service(&db, MockBackend::new(), limits);

    let mut handles = Vec::new();
    for i in 0..20 {
        let search = search.clone();
        handles.push(tokio::spawn(async move {
            search
                .search_on(Some("alice"), &format!("show coffee purchases {}", i), today())
                .await
        }));
    }

    let mut allowed = 0;
    let mut denied = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => allowed += 1,
            Err(SearchError::QuotaExceeded { limit, is_pro }) => {
                assert_eq!(limit, 5);
                assert!(!is_pro);
                denied += 1;
            }
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }

    assert_eq!(allowed, 5);
    assert_eq!(denied, 15);
    assert_eq!(db.usage_count("alice", Feature::Search, today()).unwrap(), 5);
}

#[tokio::test]
async fn test_upgrade_lifts_exhausted_quota() {
    let dir = tempfile::tempdir().unwrap();
    let db = file_db(&dir);

    let limits = QuotaLimits::new()
        .with_limit(SubscriptionTier::Free, Feature::Search, 1)
        .with_limit(SubscriptionTier::Pro, Feature::Search, 3);
    let search = service(&db, MockBackend::new(), limits);

    search.search_on(Some("alice"), "coffee", today()).await.unwrap();
    let err = search
        .search_on(Some("alice"), "coffee", today())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        SearchError::QuotaExceeded {
            limit: 1,
            is_pro: false
        }
    );

    db.set_tier("alice", SubscriptionTier::Pro).unwrap();
    search.search_on(Some("alice"), "coffee", today()).await.unwrap();
    assert_eq!(db.usage_count("alice", Feature::Search, today()).unwrap(), 2);
}

#[tokio::test]
async fn test_quota_resets_on_next_utc_day() {
    let dir = tempfile::tempdir().unwrap();
    let db = file_db(&dir);

    let limits = QuotaLimits::new().with_limit(SubscriptionTier::Free, Feature::Search, 1);
    let search = service(&db, MockBackend::new(), limits);

    search.search_on(Some("alice"), "coffee", today()).await.unwrap();
    assert!(search.search_on(Some("alice"), "coffee", today()).await.is_err());

    let tomorrow = today().succ_opt().unwrap();
    search.search_on(Some("alice"), "coffee", tomorrow).await.unwrap();
    assert_eq!(db.usage_count("alice", Feature::Search, tomorrow).unwrap(), 1);
}
