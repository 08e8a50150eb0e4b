use markdeck_core::model::tags::tag_set;
use markdeck_core::{ItemStatus, Snapshot, SnapshotError};

const EXPORT: &str = r#"{
    "status": 1,
    "complete": 1,
    "since": 1700000500,
    "list": {
        "101": {
            "item_id": "101",
            "given_url": "https://example.com/rust",
            "given_title": "Rust",
            "resolved_title": "Rust in production",
            "favorite": "1",
            "status": "0",
            "time_added": "1700000000",
            "time_updated": "1700000300",
            "time_favorited": "1700000200",
            "word_count": "2300",
            "time_to_read": 11,
            "tags": {"rust": {"item_id": "101", "tag": "rust"}},
            "authors": {"9": {"author_id": "9", "item_id": "101", "name": "Ferris"}}
        },
        "102": {
            "item_id": "102",
            "given_url": "https://example.com/old",
            "favorite": "0",
            "status": "1",
            "time_added": "1600000000",
            "authors": []
        }
    }
}"#;

#[test]
fn export_document_decodes_into_typed_items() {
    let snapshot = Snapshot::from_json(EXPORT).unwrap();
    assert_eq!(snapshot.list.len(), 2);

    let rust = &snapshot.list["101"];
    assert!(rust.favorite);
    assert!(rust.is_unread());
    assert_eq!(rust.time_favorited, 1_700_000_200);
    assert_eq!(rust.time_to_read, Some(11));
    assert_eq!(rust.tags, tag_set(["rust"]));
    assert_eq!(rust.note_fields()["authors"], "Ferris");

    let old = &snapshot.list["102"];
    assert_eq!(old.status, ItemStatus::Archived);
    assert!(old.tags.is_empty());
    assert_eq!(old.word_count, None);
}

#[test]
fn save_then_load_keeps_items_and_unknown_keys() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("export.json");

    let snapshot = Snapshot::from_json(EXPORT).unwrap();
    snapshot.save(&path).unwrap();
    let reloaded = Snapshot::load(&path).unwrap();

    assert_eq!(reloaded, snapshot);
    assert_eq!(reloaded.extra["since"], serde_json::json!(1_700_000_500));
}

#[test]
fn new_ids_are_the_set_difference_with_the_previous_snapshot() {
    let current = Snapshot::from_json(EXPORT).unwrap();
    let previous =
        Snapshot::from_json(r#"{"list": {"101": {"item_id": "101", "given_url": "u"}}}"#).unwrap();

    let new_ids: Vec<String> = current.new_ids_since(&previous).into_iter().collect();
    assert_eq!(new_ids, vec!["102".to_string()]);
    assert!(current.new_ids_since(&current).is_empty());
}

#[test]
fn load_reports_missing_files_and_bad_documents() {
    let dir = tempfile::tempdir().unwrap();

    let missing = Snapshot::load(dir.path().join("nope.json")).unwrap_err();
    assert!(matches!(missing, SnapshotError::Io { .. }));

    let bad = dir.path().join("bad.json");
    std::fs::write(&bad, "{not json").unwrap();
    assert!(matches!(
        Snapshot::load(&bad).unwrap_err(),
        SnapshotError::Json(_)
    ));

    let no_list = dir.path().join("no_list.json");
    std::fs::write(&no_list, r#"{"status": 2}"#).unwrap();
    assert!(matches!(
        Snapshot::load(&no_list).unwrap_err(),
        SnapshotError::MissingList
    ));
}
