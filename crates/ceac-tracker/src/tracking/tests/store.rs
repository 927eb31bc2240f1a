use super::common::utc;
use crate::tracking::{JsonFileStore, StatusRecord, StatusStore, StoreError};
use serde_json::Value;
use std::fs;
use tempfile::TempDir;

fn test_store() -> (TempDir, JsonFileStore) {
    let dir = TempDir::new().expect("temp dir");
    let store = JsonFileStore::new(dir.path().join("status_record.json"));
    (dir, store)
}

#[test]
fn missing_file_is_an_empty_history() {
    let (_dir, store) = test_store();
    let history = store.load().expect("absent store is not an error");
    assert!(history.is_empty());
    assert!(store.last().expect("last loads").is_none());
}

#[test]
fn appended_records_load_back_in_order() {
    let (_dir, store) = test_store();
    let records = vec![
        StatusRecord::new("Administrative Processing", utc(8, 0)),
        StatusRecord::new("Refused", utc(9, 15)),
        StatusRecord::new("Issued", utc(10, 30)),
    ];
    for record in &records {
        store.append(record.clone()).expect("append succeeds");
    }

    let history = store.load().expect("history loads");
    assert_eq!(history.records(), records.as_slice());
    assert_eq!(store.last().expect("last loads"), records.last().cloned());
}

#[test]
fn persisted_document_uses_statuses_and_date_keys() {
    let (_dir, store) = test_store();
    store
        .append(StatusRecord::new("Refused", utc(20, 0)))
        .expect("append succeeds");

    let raw = fs::read_to_string(store.path()).expect("file written");
    let document: Value = serde_json::from_str(&raw).expect("valid json");
    assert_eq!(document["statuses"][0]["status"], "Refused");
    assert_eq!(document["statuses"][0]["date"], "2025-06-02T20:00:00Z");
}

#[test]
fn document_without_statuses_key_is_empty() {
    let (_dir, store) = test_store();
    fs::write(store.path(), r#"{"version": 1}"#).expect("seed file");

    let history = store.load().expect("lenient load");
    assert!(history.is_empty());

    store
        .append(StatusRecord::new("Issued", utc(8, 0)))
        .expect("append succeeds");
    assert_eq!(store.load().expect("history loads").len(), 1);
}

#[test]
fn corrupt_document_is_reported_and_left_untouched() {
    let (_dir, store) = test_store();
    fs::write(store.path(), "{\"statuses\": [").expect("seed file");

    assert!(matches!(store.load(), Err(StoreError::Corrupt { .. })));
    let err = store
        .append(StatusRecord::new("Issued", utc(8, 0)))
        .unwrap_err();
    assert!(matches!(err, StoreError::Corrupt { .. }));
    assert_eq!(
        fs::read_to_string(store.path()).expect("file still present"),
        "{\"statuses\": ["
    );
}

#[test]
fn reads_offset_less_timestamps_from_older_files() {
    let (_dir, store) = test_store();
    fs::write(
        store.path(),
        r#"{"statuses": [{"status": "Administrative Processing", "date": "2024-05-01T10:00:00.123456"}]}"#,
    )
    .expect("seed file");

    let history = store.load().expect("legacy timestamps parse");
    assert_eq!(history.len(), 1);
    assert_eq!(history.records()[0].status, "Administrative Processing");
}

#[test]
fn unparseable_timestamp_is_corrupt() {
    let (_dir, store) = test_store();
    fs::write(
        store.path(),
        r#"{"statuses": [{"status": "Issued", "date": "yesterday"}]}"#,
    )
    .expect("seed file");

    assert!(matches!(store.load(), Err(StoreError::Corrupt { .. })));
}

#[test]
fn append_leaves_no_staging_files_behind() {
    let (dir, store) = test_store();
    store
        .append(StatusRecord::new("Issued", utc(8, 0)))
        .expect("append succeeds");
    store
        .append(StatusRecord::new("Issued", utc(9, 0)))
        .expect("append succeeds");

    let entries: Vec<_> = fs::read_dir(dir.path())
        .expect("dir readable")
        .map(|entry| entry.expect("entry").file_name())
        .collect();
    assert_eq!(entries, vec![std::ffi::OsString::from("status_record.json")]);
}
