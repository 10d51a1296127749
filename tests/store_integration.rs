//! Integration tests for the file-backed result store.

use dehasher_core::store::StoreDbErrorKind;
use dehasher_core::{Database, Record, RecordField, RecordQuery, ResultStore, StoredCredential};
use tempfile::TempDir;

fn record(id: &str, username: &str, password: Option<&str>) -> Record {
    Record {
        username: vec![username.to_string()],
        email: vec![format!("{username}@example.com")],
        password: password.map(|p| vec![p.to_string()]).unwrap_or_default(),
        ..Record::with_id(id)
    }
}

#[tokio::test]
async fn test_rows_survive_reopen_and_stay_unique() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("db").join("dehasher.sqlite");

    let db = Database::new(&path).await.unwrap();
    assert!(db.is_wal_enabled().await.unwrap());
    let store = ResultStore::new(db.clone());
    let report = store
        .persist(&[record("1", "alice", Some("pw")), record("2", "bob", None)])
        .await
        .unwrap();
    assert_eq!(report.inserted, 2);
    db.close().await;

    let store = ResultStore::new(Database::new(&path).await.unwrap());
    let report = store
        .persist(&[record("1", "alice", Some("pw")), record("3", "carol", None)])
        .await
        .unwrap();
    assert_eq!(report.inserted, 1);
    assert_eq!(report.skipped(), 1);
    assert_eq!(store.count(&RecordQuery::new()).await.unwrap(), 3);
}

#[tokio::test]
async fn test_substring_and_exact_filters_on_disk() {
    let dir = TempDir::new().unwrap();
    let store = ResultStore::new(
        Database::new(&dir.path().join("results.sqlite"))
            .await
            .unwrap(),
    );
    store
        .persist(&[
            record("1", "alice", Some("pw1")),
            record("2", "alice_smith", None),
            record("3", "bob", Some("pw3")),
        ])
        .await
        .unwrap();

    let like = RecordQuery::new().filter(RecordField::Username, "alice");
    assert_eq!(store.count(&like).await.unwrap(), 2);

    let exact = like.clone().exact(true);
    let found = store.query(&exact).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, "1");

    let with_password = RecordQuery::new().non_empty(RecordField::Password);
    assert_eq!(store.count(&with_password).await.unwrap(), 2);
}

#[tokio::test]
async fn test_credentials_reject_empty_password() {
    let dir = TempDir::new().unwrap();
    let store = ResultStore::new(
        Database::new(&dir.path().join("results.sqlite"))
            .await
            .unwrap(),
    );

    let err = store
        .persist_credentials(&[StoredCredential {
            record_id: "1".to_string(),
            username: "alice".to_string(),
            email: String::new(),
            password: String::new(),
        }])
        .await
        .unwrap_err();

    assert_eq!(
        err.database_kind(),
        Some(StoreDbErrorKind::ConstraintViolation)
    );
    assert!(store.list_credentials().await.unwrap().is_empty());
}
