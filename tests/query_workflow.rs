//! End-to-end query invocations: mock provider, temp-file store, real export.

use dehasher_core::query::SearchField;
use dehasher_core::{
    ApiCredentials, ClientSettings, Database, Dehasher, ExportOutcome, OutputFormat,
    ProviderClient, QueryOptions, RecordQuery, ResultStore, SearchFilter,
};
use serde_json::{Value, json};
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn entries(count: usize) -> Vec<Value> {
    (0..count)
        .map(|i| {
            json!({
                "id": format!("rec-{i}"),
                "username": [format!("alice{i}")],
                "email": [format!("alice{i}@example.com")],
                "database_name": "Example"
            })
        })
        .collect()
}

async fn file_store(dir: &TempDir) -> ResultStore {
    let db = Database::new(&dir.path().join("db").join("dehasher.sqlite"))
        .await
        .expect("database should open");
    ResultStore::new(db)
}

fn client(server: &MockServer) -> ProviderClient {
    ProviderClient::new(
        ApiCredentials::new("test-key", None),
        &ClientSettings::with_base_url(server.uri()),
    )
    .expect("client should build")
}

fn alice_options(dir: &TempDir) -> QueryOptions {
    let mut filter = SearchFilter::new();
    filter.insert(SearchField::Username, "alice");
    QueryOptions {
        filter,
        output_file: dir.path().join("query").to_string_lossy().into_owned(),
        ..QueryOptions::default()
    }
}

#[tokio::test]
async fn test_fifty_results_take_one_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/search"))
        .and(body_partial_json(json!({"query": "username:alice", "page": 1})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "balance": 99,
            "entries": entries(50),
            "success": true,
            "total": 50
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let store = file_store(&dir).await;
    let client = client(&server);
    let dehasher = Dehasher::new(&client, store.clone(), alice_options(&dir));

    let report = dehasher.run(|_| {}).await.expect("query should succeed");

    assert_eq!(report.requests_issued, 1);
    assert_eq!(report.records_fetched, 50);
    assert_eq!(report.balance, 99);
    assert_eq!(report.persisted.expect("persisted").inserted, 50);
    assert_eq!(store.count(&RecordQuery::new()).await.unwrap(), 50);

    let ExportOutcome::Written(path) = report.export else {
        panic!("expected a written export");
    };
    assert_eq!(path, dir.path().join("query.json"));
    let exported: Vec<Value> = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
    assert_eq!(exported.len(), 50);
}

#[tokio::test]
async fn test_repeated_query_does_not_duplicate_rows() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "entries": entries(5),
            "total": 5
        })))
        .expect(2)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let store = file_store(&dir).await;
    let client = client(&server);

    for _ in 0..2 {
        Dehasher::new(&client, store.clone(), alice_options(&dir))
            .run(|_| {})
            .await
            .expect("query should succeed");
    }

    assert_eq!(store.count(&RecordQuery::new()).await.unwrap(), 5);
}

#[tokio::test]
async fn test_creds_only_exports_records_with_passwords() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "entries": [
                {"id": "c1", "username": ["alice"], "password": ["hunter2"]},
                {"id": "c2", "email": ["bob@example.com"], "password": ["swordfish"]},
                {"id": "c3", "username": ["carol"]}
            ],
            "total": 3
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let store = file_store(&dir).await;
    let client = client(&server);
    let options = QueryOptions {
        creds_only: true,
        output_format: OutputFormat::Text,
        ..alice_options(&dir)
    };

    let report = Dehasher::new(&client, store.clone(), options)
        .run(|_| {})
        .await
        .expect("query should succeed");

    assert_eq!(report.credentials, Some(2));
    assert_eq!(store.list_credentials().await.unwrap().len(), 2);
    assert_eq!(store.count(&RecordQuery::new()).await.unwrap(), 3);

    let ExportOutcome::Written(path) = report.export else {
        panic!("expected a written export");
    };
    assert_eq!(
        std::fs::read_to_string(path).unwrap(),
        "alice:hunter2\nbob@example.com:swordfish\n"
    );
}

#[tokio::test]
async fn test_provider_error_is_fatal_and_stores_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let store = file_store(&dir).await;
    let client = client(&server);

    let err = Dehasher::new(&client, store.clone(), alice_options(&dir))
        .run(|_| {})
        .await
        .expect_err("403 should abort the query");

    assert!(err.to_string().contains("insufficient credits"));
    assert_eq!(store.count(&RecordQuery::new()).await.unwrap(), 0);
    assert!(!dir.path().join("query.json").exists());
}
