//! Integration tests for r2up
//!
//! These tests require a running S3-compatible server with an existing
//! bucket.
//!
//! Run with:
//! ```bash
//! export TEST_S3_ENDPOINT=http://localhost:9000
//! export TEST_S3_ACCESS_KEY=accesskey
//! export TEST_S3_SECRET_KEY=secretkey
//! export TEST_S3_BUCKET=r2up-test
//! cargo test -p r2up --features integration
//! ```

#![cfg(feature = "integration")]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

/// S3 settings read from the environment
struct TestStore {
    endpoint: String,
    access_key: String,
    secret_key: String,
    bucket: String,
}

fn test_store() -> Option<TestStore> {
    Some(TestStore {
        endpoint: std::env::var("TEST_S3_ENDPOINT").ok()?,
        access_key: std::env::var("TEST_S3_ACCESS_KEY").ok()?,
        secret_key: std::env::var("TEST_S3_SECRET_KEY").ok()?,
        bucket: std::env::var("TEST_S3_BUCKET").ok()?,
    })
}

fn r2up_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_r2up"))
}

/// Run r2up with an isolated config directory and the test store settings
fn run(store: &TestStore, config_dir: &Path, args: &[&str]) -> Output {
    Command::new(r2up_binary())
        .args(args)
        .env("R2UP_CONFIG_DIR", config_dir)
        .env("R2_ACCOUNT_ID", "integration")
        .env("R2_ENDPOINT", &store.endpoint)
        .env("R2_ACCESS_KEY_ID", &store.access_key)
        .env("R2_SECRET_ACCESS_KEY", &store.secret_key)
        .env("R2_BUCKET", &store.bucket)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute r2up")
}

fn json(output: &Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).unwrap_or_else(|e| {
        panic!(
            "invalid JSON ({e}): {}\nstderr: {}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        )
    })
}

/// Unique key prefix per test run
fn unique_prefix(name: &str) -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    format!("it-{name}-{:x}", nanos % 0xFFFF_FFFF)
}

macro_rules! require_store {
    () => {
        match test_store() {
            Some(store) => store,
            None => {
                eprintln!("Skipping: TEST_S3_* variables not set");
                return;
            }
        }
    };
}

#[test]
fn test_upload_stat_share_rm() {
    let store = require_store!();
    let config_dir = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let file = work.path().join("hello.txt");
    std::fs::write(&file, b"hello world").unwrap();
    let key = format!("{}/hello.txt", unique_prefix("single"));

    let output = run(
        &store,
        config_dir.path(),
        &["--json", "upload", file.to_str().unwrap(), &key, "--meta", "author=it"],
    );
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let result = json(&output);
    assert_eq!(result["success"], true);
    assert_eq!(result["upload_type"], "single");
    assert_eq!(result["metadata"]["file-hash"], "5eb63bbbe01eeed093cb22bb8f5acdc3");

    let output = run(&store, config_dir.path(), &["--json", "stat", &key]);
    assert!(output.status.success());
    let info = json(&output);
    assert_eq!(info["size_bytes"], 11);
    assert_eq!(info["metadata"]["author"], "it");

    let output = run(&store, config_dir.path(), &["--json", "share", &key, "--expires", "600"]);
    assert!(output.status.success());
    assert!(json(&output)["url"].as_str().unwrap().contains("X-Amz-Signature"));

    let output = run(&store, config_dir.path(), &["rm", &key]);
    assert!(output.status.success());

    let output = run(&store, config_dir.path(), &["stat", &key]);
    assert_eq!(output.status.code(), Some(5));
}

#[test]
fn test_multipart_upload() {
    let store = require_store!();
    let config_dir = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let file = work.path().join("big.bin");
    std::fs::write(&file, vec![42u8; 12 * 1024 * 1024]).unwrap();
    let key = format!("{}/big.bin", unique_prefix("multi"));

    let output = run(
        &store,
        config_dir.path(),
        &["--json", "upload", file.to_str().unwrap(), &key, "--multipart"],
    );
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let result = json(&output);
    assert_eq!(result["upload_type"], "multipart");
    assert_eq!(result["parts_count"], 3);
    assert_eq!(result["file_size"], 12 * 1024 * 1024);

    run(&store, config_dir.path(), &["rm", &key]);
}

#[test]
fn test_sync_with_filters_then_list() {
    let store = require_store!();
    let config_dir = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    for name in ["a.txt", "b.tmp", "sub/c.txt", "sub/d.jpg"] {
        let path = work.path().join(name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, name).unwrap();
    }
    let prefix = unique_prefix("sync");

    let output = run(
        &store,
        config_dir.path(),
        &[
            "--json",
            "sync",
            work.path().to_str().unwrap(),
            &prefix,
            "--include",
            "*.txt",
            "--exclude",
            "*.tmp",
        ],
    );
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let batch = json(&output);
    assert_eq!(batch["succeeded"], 2);
    assert_eq!(batch["failed"], 0);

    let output = run(&store, config_dir.path(), &["--json", "ls", &format!("{prefix}/")]);
    assert!(output.status.success());
    let listing = json(&output);
    let keys: Vec<&str> = listing["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["key"].as_str().unwrap())
        .collect();
    assert_eq!(
        keys,
        vec![format!("{prefix}/a.txt"), format!("{prefix}/sub/c.txt")]
    );

    let a = format!("{prefix}/a.txt");
    let c = format!("{prefix}/sub/c.txt");
    run(&store, config_dir.path(), &["rm", &a, &c]);
}

#[test]
fn test_error_exit_codes() {
    let store = require_store!();
    let config_dir = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();

    let missing = work.path().join("missing.txt");
    let output = run(&store, config_dir.path(), &["upload", missing.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(5));

    let output = run(&store, config_dir.path(), &["share", "any-key", "--expires", "0"]);
    assert_eq!(output.status.code(), Some(2));

    let file = work.path().join("dup.txt");
    std::fs::write(&file, b"dup").unwrap();
    let key = format!("{}/dup.txt", unique_prefix("conflict"));
    let output = run(&store, config_dir.path(), &["upload", file.to_str().unwrap(), &key]);
    assert!(output.status.success());
    let output = run(
        &store,
        config_dir.path(),
        &["upload", file.to_str().unwrap(), &key, "--no-overwrite"],
    );
    assert_eq!(output.status.code(), Some(6));

    run(&store, config_dir.path(), &["rm", &key]);
}

#[test]
fn test_config_init_and_show_masks_secrets() {
    let store = require_store!();
    let config_dir = TempDir::new().unwrap();

    let output = run(&store, config_dir.path(), &["config", "init"]);
    assert!(output.status.success());
    assert!(config_dir.path().join("config.toml").exists());

    let output = run(&store, config_dir.path(), &["--json", "config", "show"]);
    assert!(output.status.success());
    let shown = json(&output);
    assert_ne!(shown["store"]["secret_key"], store.secret_key.as_str());
    assert_eq!(shown["store"]["bucket"], store.bucket.as_str());
}
