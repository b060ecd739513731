//! End-to-end tests of the CLI against a directory-backed service.

mod common;

use common::{Env, ids, json_lines};

fn upload(env: &Env, id: &str, rank: i64) {
    env.run_success(&[
        "upload",
        "--type",
        "note",
        "--id",
        id,
        "--field",
        &format!("rank={}", rank),
        "--field",
        "title=str:hello",
    ]);
}

#[test]
fn test_upload_then_fetch() {
    let env = Env::new();

    let stdout = env.run_success(&[
        "upload", "--type", "note", "--id", "n1", "--field", "rank=1",
    ]);
    let stored: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(stored["id"], "n1");
    assert!(stored["metadata"]["changeTag"].is_string());

    let fetched = env.run_success(&["fetch", "--type", "note"]);
    let records = json_lines(&fetched);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["fields"]["rank"]["value"], 1);
}

#[test]
fn test_fetch_all_pages_and_sorts() {
    let env = Env::new();
    for (id, rank) in [("c", 3), ("a", 1), ("e", 5), ("b", 2), ("d", 4)] {
        upload(&env, id, rank);
    }

    let stdout = env.run_success(&[
        "--page-size",
        "2",
        "fetch",
        "--type",
        "note",
        "--sort",
        "rank:desc",
        "--all",
    ]);
    assert_eq!(ids(&stdout), vec!["e", "d", "c", "b", "a"]);
}

#[test]
fn test_single_fetch_reports_cursor() {
    let env = Env::new();
    for i in 0..3 {
        upload(&env, &format!("n{}", i), i);
    }

    let output = env.run(&["--page-size", "2", "fetch", "--type", "note"]);
    assert!(output.status.success());
    assert_eq!(json_lines(&String::from_utf8_lossy(&output.stdout)).len(), 2);

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Cursor"));
    assert!(stderr.contains("more"));
}

#[test]
fn test_where_filter() {
    let env = Env::new();
    upload(&env, "one", 1);
    upload(&env, "two", 2);

    let stdout = env.run_success(&["fetch", "--type", "note", "--where", "rank=2"]);
    assert_eq!(ids(&stdout), vec!["two"]);
}

#[test]
fn test_offline_upload_is_queued_and_flushed() {
    let env = Env::new();

    let output = env.run(&[
        "--offline", "upload", "--type", "note", "--id", "later", "--field", "rank=7",
    ]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("queued"));

    let pending = env.run_success(&["pending", "--json"]);
    let pending: serde_json::Value = serde_json::from_str(&pending).unwrap();
    assert_eq!(pending["uploads"][0]["id"], "later");

    // The queued record shows up in a fetch before it reaches the service.
    let fetched = env.run_success(&["fetch", "--type", "note"]);
    assert_eq!(ids(&fetched), vec!["later"]);
    assert!(!env.service.path().join("records").join("later.json").exists());

    let report = env.run_success(&["flush"]);
    let report: serde_json::Value = serde_json::from_str(&report).unwrap();
    assert_eq!(report["uploaded"][0], "later");

    let pending = env.run_success(&["pending"]);
    assert!(pending.contains("Nothing pending"));
    assert!(env.service.path().join("records").join("later.json").exists());
}

#[test]
fn test_offline_delete_is_queued_and_flushed() {
    let env = Env::new();
    upload(&env, "gone", 1);

    env.run_success(&["--offline", "delete", "gone"]);
    let fetched = env.run_success(&["fetch", "--type", "note"]);
    assert!(ids(&fetched).is_empty());

    let pending = env.run_success(&["pending"]);
    assert!(pending.contains("delete gone"));

    let report = env.run_success(&["flush"]);
    let report: serde_json::Value = serde_json::from_str(&report).unwrap();
    assert_eq!(report["deleted"][0], "gone");
    assert!(!env.service.path().join("records").join("gone.json").exists());
}

#[test]
fn test_delete_online() {
    let env = Env::new();
    upload(&env, "n1", 1);

    let stdout = env.run_success(&["delete", "n1"]);
    assert!(stdout.contains("Deleted n1"));

    let fetched = env.run_success(&["fetch", "--type", "note"]);
    assert!(ids(&fetched).is_empty());
}

#[test]
fn test_offline_without_support_fails() {
    let env = Env::new();

    let output = env.run(&[
        "--offline",
        "--no-offline-support",
        "upload",
        "--type",
        "note",
        "--field",
        "rank=1",
    ]);
    assert!(!output.status.success());

    let pending = env.run_success(&["pending"]);
    assert!(pending.contains("Nothing pending"));
}

#[test]
fn test_asset_upload() {
    let env = Env::new();
    let blob = env.data_dir().join("photo.bin");
    std::fs::write(&blob, b"pixels").unwrap();

    env.run_success(&[
        "upload",
        "--type",
        "photo",
        "--id",
        "p1",
        "--asset",
        &format!("image={}", blob.display()),
    ]);

    let fetched = env.run_success(&["fetch", "--type", "photo"]);
    let records = json_lines(&fetched);
    let path = records[0]["fields"]["image"]["value"]["path"]
        .as_str()
        .unwrap()
        .to_string();
    assert_eq!(std::fs::read(path).unwrap(), b"pixels");
}

#[test]
fn test_reset_requires_confirmation() {
    let env = Env::new();
    env.run_success(&["--offline", "upload", "--type", "note", "--id", "x"]);

    assert!(!env.run(&["reset"]).status.success());
    assert!(env.run_success(&["pending"]).contains("upload x"));

    env.run_success(&["reset", "--yes"]);
    assert!(env.run_success(&["pending"]).contains("Nothing pending"));
}

#[test]
fn test_missing_service_is_an_error() {
    let env = Env::new();
    let output = std::process::Command::new(env!("CARGO_BIN_EXE_recsync"))
        .args(["fetch", "--type", "note"])
        .env_remove("RECSYNC_SERVICE")
        .env("RECSYNC_DATA_DIR", env.data_dir())
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("RECSYNC_SERVICE"));
}
