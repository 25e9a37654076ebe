//! Integration tests for the taskhero CLI
//!
//! These tests drive the compiled binary against throwaway project roots.
//! They verify that commands work end-to-end without mocking.

use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

/// Helper to run taskhero against a project root
fn run_taskhero(args: &[&str], root: &Path) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_taskhero"))
        .arg("--root")
        .arg(root)
        .args(args)
        .env_remove("TASKHERO_DB_PATH")
        .env("RUST_LOG", "off")
        .output()
        .expect("Failed to execute taskhero")
}

/// Helper to get stdout as string
fn stdout(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

/// Helper to get stderr as string
fn stderr(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

fn write_tasks_json(root: &Path, contents: &str) {
    let dir = root.join(".taskmaster");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("tasks.json"), contents).unwrap();
}

// =============================================================================
// Basic Command Tests
// =============================================================================

#[test]
fn test_help_command() {
    let output = Command::new(env!("CARGO_BIN_EXE_taskhero"))
        .arg("--help")
        .output()
        .expect("Failed to execute");

    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("taskhero"));
    assert!(out.contains("backup"));
}

#[test]
fn test_version_command() {
    let output = Command::new(env!("CARGO_BIN_EXE_taskhero"))
        .arg("--version")
        .output()
        .expect("Failed to execute");

    assert!(output.status.success());
    assert!(stdout(&output).contains("taskhero"));
}

// =============================================================================
// Shell Completion Tests
// =============================================================================

#[test]
fn test_completion_zsh() {
    let output = Command::new(env!("CARGO_BIN_EXE_taskhero"))
        .args(["completion", "zsh"])
        .output()
        .expect("Failed to execute");

    assert!(
        output.status.success(),
        "completion zsh failed: {}",
        stderr(&output)
    );
    assert!(
        stdout(&output).contains("#compdef taskhero"),
        "zsh completion should contain #compdef"
    );
}

#[test]
fn test_completion_bash() {
    let output = Command::new(env!("CARGO_BIN_EXE_taskhero"))
        .args(["completion", "bash"])
        .output()
        .expect("Failed to execute");

    assert!(output.status.success());
    assert!(stdout(&output).contains("_taskhero"));
}

// =============================================================================
// Init / Status Tests
// =============================================================================

#[test]
fn test_init_fresh_project() {
    let tmp = TempDir::new().unwrap();
    let output = run_taskhero(&["init"], tmp.path());

    assert!(output.status.success(), "init failed: {}", stderr(&output));
    assert!(stdout(&output).contains("TaskHero store ready"));
    assert!(tmp.path().join(".taskmaster").join("taskhero.db").exists());
}

#[test]
fn test_init_twice_skips() {
    let tmp = TempDir::new().unwrap();
    assert!(run_taskhero(&["init"], tmp.path()).status.success());

    let output = run_taskhero(&["init"], tmp.path());
    assert!(output.status.success());
    assert!(stdout(&output).contains("already initialized"));
}

#[test]
fn test_init_imports_legacy_tasks() {
    let tmp = TempDir::new().unwrap();
    write_tasks_json(
        tmp.path(),
        r#"{"tasks": [
            {"id": 1, "title": "Set up", "status": "done"},
            {"id": 2, "title": "Build", "dependencies": [1], "subtasks": [{"id": 1, "title": "Part"}]}
        ]}"#,
    );

    let output = run_taskhero(&["init"], tmp.path());
    assert!(output.status.success(), "init failed: {}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("2 task(s), 1 subtask(s)"), "unexpected output: {}", out);
    assert!(out.contains("1 dependency edge(s)"));

    let status = stdout(&run_taskhero(&["status"], tmp.path()));
    assert!(status.contains("1.0.0"));
    assert!(status.contains("tasks"));
}

#[test]
fn test_init_with_broken_legacy_file_fails() {
    let tmp = TempDir::new().unwrap();
    write_tasks_json(tmp.path(), r#"{"tasks": [{"id": 1}]}"#);

    let output = run_taskhero(&["init"], tmp.path());
    assert!(!output.status.success());
    assert!(stderr(&output).contains("no title"));
}

// =============================================================================
// Next Task Tests
// =============================================================================

#[test]
fn test_next_respects_dependencies() {
    let tmp = TempDir::new().unwrap();
    write_tasks_json(
        tmp.path(),
        r#"[
            {"id": 1, "title": "Foundation", "priority": "low"},
            {"id": 2, "title": "Roof", "priority": "high", "dependencies": [1]}
        ]"#,
    );
    assert!(run_taskhero(&["init"], tmp.path()).status.success());

    let output = run_taskhero(&["next"], tmp.path());
    assert!(output.status.success(), "next failed: {}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("Foundation"), "unexpected next task: {}", out);
}

#[test]
fn test_next_before_init_fails() {
    let tmp = TempDir::new().unwrap();
    let output = run_taskhero(&["next"], tmp.path());
    assert!(!output.status.success());
    assert!(stderr(&output).contains("taskhero init"));
}

// =============================================================================
// Backup Tests
// =============================================================================

#[test]
fn test_backup_create_list_cleanup() {
    let tmp = TempDir::new().unwrap();
    assert!(run_taskhero(&["init"], tmp.path()).status.success());

    for _ in 0..3 {
        let output = run_taskhero(&["backup", "create"], tmp.path());
        assert!(output.status.success(), "backup failed: {}", stderr(&output));
        assert!(stdout(&output).contains("taskhero-manual-"));
    }

    let list = stdout(&run_taskhero(&["backup", "list"], tmp.path()));
    assert_eq!(list.lines().filter(|l| l.contains("taskhero-manual-")).count(), 3);

    let output = run_taskhero(&["backup", "cleanup", "--keep", "1"], tmp.path());
    assert!(output.status.success());
    assert!(stdout(&output).contains("2 backup(s) removed"));

    let list = stdout(&run_taskhero(&["backup", "list"], tmp.path()));
    assert_eq!(list.lines().filter(|l| l.contains("taskhero-manual-")).count(), 1);
}

#[test]
fn test_backup_restore_unknown_file_fails() {
    let tmp = TempDir::new().unwrap();
    assert!(run_taskhero(&["init"], tmp.path()).status.success());

    let output = run_taskhero(&["backup", "restore", "taskhero-manual-missing.db"], tmp.path());
    assert!(!output.status.success());
    assert!(stderr(&output).contains("not found"));
}

// =============================================================================
// Database Path Override
// =============================================================================

#[test]
fn test_db_path_env_override() {
    let tmp = TempDir::new().unwrap();
    let db_path = tmp.path().join("elsewhere").join("custom.db");

    let output = Command::new(env!("CARGO_BIN_EXE_taskhero"))
        .arg("--root")
        .arg(tmp.path())
        .arg("init")
        .env("TASKHERO_DB_PATH", &db_path)
        .env("RUST_LOG", "off")
        .output()
        .expect("Failed to execute");

    assert!(output.status.success(), "init failed: {}", stderr(&output));
    assert!(db_path.exists());
    assert!(!tmp.path().join(".taskmaster").join("taskhero.db").exists());
}
