use std::fs;

use chrono::{TimeZone, Utc};
use dashboard_client::{ensure_dir, export_filename, AtomicFileWriter, PersistError, StateStore};
use dashboard_core::{JobId, SiteConfig, SiteConfigs, TaskOptions};
use serde_json::{json, Map};
use tempfile::TempDir;

#[test]
fn creates_missing_dir() {
    let temp = TempDir::new().unwrap();
    let new_dir = temp.path().join("state");
    assert!(!new_dir.exists());
    ensure_dir(&new_dir).unwrap();
    assert!(new_dir.is_dir());
}

#[test]
fn atomic_write_replaces_existing() {
    let temp = TempDir::new().unwrap();
    let writer = AtomicFileWriter::new(temp.path().to_path_buf());

    let first = writer.write("configs.json", b"{}").unwrap();
    assert_eq!(first.file_name().unwrap(), "configs.json");
    assert_eq!(fs::read_to_string(&first).unwrap(), "{}");

    let second = writer.write("configs.json", b"{\"a\":1}").unwrap();
    assert_eq!(first, second);
    assert_eq!(fs::read_to_string(&second).unwrap(), "{\"a\":1}");
}

#[test]
fn no_partial_file_when_dir_is_a_file() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("not_a_dir");
    fs::write(&file_path, "x").unwrap();

    let writer = AtomicFileWriter::new(file_path.clone());
    let result = writer.write("configs.json", b"{}");
    assert!(matches!(result, Err(PersistError::Dir(_))));
    assert!(!file_path.with_file_name("configs.json").exists());
}

#[test]
fn missing_site_configs_load_as_empty() {
    let temp = TempDir::new().unwrap();
    let store = StateStore::new(temp.path().join("state"), temp.path().join("exports"));

    let configs = store.load_site_configs().unwrap();
    assert!(configs.is_empty());
}

#[test]
fn site_configs_survive_a_restart() {
    let temp = TempDir::new().unwrap();
    let store = StateStore::new(temp.path().join("state"), temp.path().join("exports"));
    let mut form_data = Map::new();
    form_data.insert("url".to_string(), json!("https://example.org"));
    let mut configs = SiteConfigs::new();
    configs.save(
        Some(12),
        Some("https://example.org"),
        SiteConfig {
            harvester: "generic".to_string(),
            form_data,
            task_options: TaskOptions {
                download: true,
                analyze: true,
            },
        },
    );

    let path = store.save_site_configs(&configs).unwrap();
    assert_eq!(path.file_name().unwrap(), "harvesterSiteConfigs.json");

    let reloaded = StateStore::new(temp.path().join("state"), temp.path().join("exports"))
        .load_site_configs()
        .unwrap();
    assert_eq!(reloaded, configs);
}

#[test]
fn corrupt_site_configs_are_reported() {
    let temp = TempDir::new().unwrap();
    let store = StateStore::new(temp.path(), temp.path().join("exports"));
    fs::write(store.site_configs_path(), "{not json").unwrap();

    let err = store.load_site_configs().unwrap_err();
    assert!(matches!(err, PersistError::Corrupt { .. }));
}

#[test]
fn export_filename_uses_iso_timestamp_without_separators() {
    let at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap()
        + chrono::Duration::milliseconds(42);

    assert_eq!(
        export_filename(&JobId::from("h1"), at),
        "harvest-h1-2024-03-09T14-05-07-042Z.json"
    );
    assert_eq!(
        export_filename(&JobId::from("../x"), at),
        "harvest-___x-2024-03-09T14-05-07-042Z.json"
    );
}

#[test]
fn export_is_pretty_json_in_export_dir() {
    let temp = TempDir::new().unwrap();
    let store = StateStore::new(temp.path().join("state"), temp.path().join("exports"));
    let at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();

    let path = store
        .save_export(&JobId::from("h7"), &json!({ "documents": [] }), at)
        .unwrap();

    assert_eq!(path.parent().unwrap(), temp.path().join("exports"));
    let content = fs::read_to_string(&path).unwrap();
    assert!(content.contains("\n"));
    let value: serde_json::Value = serde_json::from_str(&content).unwrap();
    assert_eq!(value, json!({ "documents": [] }));
}
