//! Integration tests for the codeindex binary

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn codeindex_cmd(db_dir: &TempDir, config: &Path) -> Command {
    let mut cmd = Command::cargo_bin("codeindex").unwrap();
    cmd.env("CODEINDEX_DB", db_dir.path().join("index.sqlite"))
        .env_remove("CODEINDEX_EMBEDDING_URL")
        .env_remove("CODEINDEX_EMBEDDING_DIMS")
        .env_remove("CODEINDEX_EMBEDDING_MODEL")
        .arg("--config")
        .arg(config);
    cmd
}

fn write_config(dir: &TempDir, yaml: &str) -> std::path::PathBuf {
    let path = dir.path().join("config.yml");
    fs::write(&path, yaml).unwrap();
    path
}

fn create_workspace() -> TempDir {
    let dir = TempDir::new().unwrap();
    let files = [
        ("src/lib.rs", "pub fn hello() -> &'static str {\n    \"hello\"\n}\n"),
        ("src/main.rs", "fn main() {\n    println!(\"{}\", 1);\n}\n"),
        ("scripts/tool.py", "def run():\n    return 1\n"),
        ("README.md", "# Project\n\nSome notes.\n"),
    ];
    for (path, content) in files {
        let full_path = dir.path().join(path);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(full_path, content).unwrap();
    }
    dir
}

const HASH_CONFIG: &str = "embeddings:\n  provider: hash\n  dimensions: 16\n";

#[test]
fn test_refresh_completes() {
    let workspace = create_workspace();
    let db_dir = TempDir::new().unwrap();
    let config = write_config(&db_dir, HASH_CONFIG);

    codeindex_cmd(&db_dir, &config)
        .arg("refresh")
        .arg(workspace.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Indexing Complete"));
}

#[test]
fn test_refresh_json_lines() {
    let workspace = create_workspace();
    let db_dir = TempDir::new().unwrap();
    let config = write_config(&db_dir, HASH_CONFIG);

    let output = codeindex_cmd(&db_dir, &config)
        .arg("refresh")
        .arg(workspace.path())
        .arg("--format")
        .arg("json")
        .output()
        .unwrap();
    assert!(output.status.success());

    let updates: Vec<serde_json::Value> = String::from_utf8(output.stdout)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(updates[0]["status"], "loading");
    let last = updates.last().unwrap();
    assert_eq!(last["status"], "done");
    assert_eq!(last["progress"], 1.0);
}

#[test]
fn test_status_after_refresh() {
    let workspace = create_workspace();
    let db_dir = TempDir::new().unwrap();
    let config = write_config(&db_dir, HASH_CONFIG);

    codeindex_cmd(&db_dir, &config)
        .arg("refresh")
        .arg(workspace.path())
        .assert()
        .success();

    codeindex_cmd(&db_dir, &config)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("chunks"))
        .stdout(predicate::str::contains("sqliteFts"))
        .stdout(predicate::str::contains("codeSnippets"))
        .stdout(predicate::str::contains("vectordb::hash-16"))
        .stdout(predicate::str::contains("files: 4"));
}

#[test]
fn test_status_json_empty() {
    let db_dir = TempDir::new().unwrap();
    let config = write_config(&db_dir, HASH_CONFIG);

    codeindex_cmd(&db_dir, &config)
        .arg("status")
        .arg("--format")
        .arg("json")
        .assert()
        .success()
        .stdout(predicate::str::contains("[]"));
}

#[test]
fn test_refresh_disabled_by_config() {
    let workspace = create_workspace();
    let db_dir = TempDir::new().unwrap();
    let config = write_config(&db_dir, "disable_indexing: true\n");

    codeindex_cmd(&db_dir, &config)
        .arg("refresh")
        .arg(workspace.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Indexing is disabled in config.yml"));
}

#[test]
fn test_refresh_missing_directory_fails() {
    let db_dir = TempDir::new().unwrap();
    let config = write_config(&db_dir, HASH_CONFIG);

    codeindex_cmd(&db_dir, &config)
        .arg("refresh")
        .arg(db_dir.path().join("does-not-exist"))
        .assert()
        .code(1)
        .stdout(predicate::str::contains("failed"));
}

#[test]
fn test_invalid_config_exits_with_input_error() {
    let workspace = create_workspace();
    let db_dir = TempDir::new().unwrap();
    let config = write_config(
        &db_dir,
        "embeddings:\n  provider: hash\n  dimensions: 0\n",
    );

    codeindex_cmd(&db_dir, &config)
        .arg("refresh")
        .arg(workspace.path())
        .assert()
        .code(3)
        .stderr(predicate::str::contains("dimensions must be at least 1"));
}

#[test]
fn test_cleanup() {
    let db_dir = TempDir::new().unwrap();
    let config = write_config(&db_dir, HASH_CONFIG);

    codeindex_cmd(&db_dir, &config)
        .arg("cleanup")
        .assert()
        .success()
        .stdout(predicate::str::contains("vacuumed"));
}
