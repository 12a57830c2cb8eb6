//! Integration tests for the `tg` CLI.
//!
//! Each test creates a temp workspace, runs `tg` as a subprocess,
//! and verifies stdout and/or the tree file.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use pretty_assertions::assert_eq;

fn tg_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_tg"))
}

/// A workspace with A[B, C], D where D is a milestone.
fn create_test_workspace(root: &Path) {
    fs::write(
        root.join("treegrid.toml"),
        r#"[project]
name = "Roadmap"

[grid]
indentation_width = 2
"#,
    )
    .unwrap();

    fs::write(
        root.join("tree.json"),
        r#"{
  "nodes": [
    {
      "id": "N-001",
      "data": { "title": "Plan", "status": "active" },
      "children": [
        { "id": "N-002", "data": { "title": "Outline" } },
        { "id": "N-003", "data": { "title": "Research", "due": "2026-02-01" } }
      ]
    },
    { "id": "N-004", "data": { "title": "Ship", "kind": "milestone" } }
  ]
}
"#,
    )
    .unwrap();
}

/// Run `tg` with the given args in the given directory, returning (stdout, stderr, success).
fn run_tg(dir: &Path, args: &[&str]) -> (String, String, bool) {
    let output = Command::new(tg_bin())
        .args(args)
        .current_dir(dir)
        .output()
        .expect("failed to run tg");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

/// Run `tg` expecting success, return stdout.
fn run_tg_ok(dir: &Path, args: &[&str]) -> String {
    let (stdout, stderr, success) = run_tg(dir, args);
    if !success {
        panic!(
            "tg {:?} failed:\nstdout: {}\nstderr: {}",
            args, stdout, stderr
        );
    }
    stdout
}

/// Run `tg` expecting failure, return stderr.
fn run_tg_err(dir: &Path, args: &[&str]) -> String {
    let (stdout, stderr, success) = run_tg(dir, args);
    if success {
        panic!("tg {:?} unexpectedly succeeded:\nstdout: {}", args, stdout);
    }
    stderr
}

fn list_lines(dir: &Path) -> Vec<String> {
    run_tg_ok(dir, &["list"])
        .lines()
        .map(str::to_string)
        .collect()
}

// ---------------------------------------------------------------------------
// Init
// ---------------------------------------------------------------------------

#[test]
fn test_init_then_add() {
    let tmp = tempfile::TempDir::new().unwrap();
    let out = run_tg_ok(tmp.path(), &["init", "--name", "Q3 Plan"]);
    assert!(out.contains("Q3 Plan"));
    assert!(tmp.path().join("treegrid.toml").exists());
    assert!(tmp.path().join("tree.json").exists());

    assert_eq!(run_tg_ok(tmp.path(), &["add", "First"]).trim(), "N-001");
    assert_eq!(
        run_tg_ok(tmp.path(), &["add", "Nested", "--parent", "N-001"]).trim(),
        "N-002"
    );
    assert_eq!(
        run_tg_ok(tmp.path(), &["add", "Launch", "--milestone"]).trim(),
        "N-003"
    );
    assert_eq!(
        list_lines(tmp.path()),
        vec!["[ ] N-001 First", "  [ ] N-002 Nested", "[◇] N-003 Launch"]
    );
}

#[test]
fn test_init_refuses_existing() {
    let tmp = tempfile::TempDir::new().unwrap();
    run_tg_ok(tmp.path(), &["init"]);
    let err = run_tg_err(tmp.path(), &["init"]);
    assert!(err.contains("already exists"));
    run_tg_ok(tmp.path(), &["init", "--force"]);
}

#[test]
fn test_commands_outside_workspace_fail() {
    let tmp = tempfile::TempDir::new().unwrap();
    let err = run_tg_err(tmp.path(), &["list"]);
    assert!(err.contains("treegrid.toml"));
}

// ---------------------------------------------------------------------------
// Read commands
// ---------------------------------------------------------------------------

#[test]
fn test_list_tree() {
    let tmp = tempfile::TempDir::new().unwrap();
    create_test_workspace(tmp.path());
    assert_eq!(
        list_lines(tmp.path()),
        vec![
            "[>] N-001 Plan",
            "  [ ] N-002 Outline",
            "  [ ] N-003 Research  (due 2026-02-01)",
            "[◇] N-004 Ship",
        ]
    );
}

#[test]
fn test_list_filter_keeps_ancestors() {
    let tmp = tempfile::TempDir::new().unwrap();
    create_test_workspace(tmp.path());
    let out = run_tg_ok(tmp.path(), &["list", "--filter", "^Res"]);
    assert!(out.contains("N-001"));
    assert!(out.contains("N-003"));
    assert!(!out.contains("N-002"));
    assert!(!out.contains("N-004"));
}

#[test]
fn test_list_json() {
    let tmp = tempfile::TempDir::new().unwrap();
    create_test_workspace(tmp.path());
    let out = run_tg_ok(tmp.path(), &["list", "--json"]);
    let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
    let rows = parsed.as_array().unwrap();
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[2]["id"], "N-003");
    assert_eq!(rows[2]["depth"], 1);
    assert_eq!(rows[2]["parent"], "N-001");
    assert_eq!(rows[3]["kind"], "milestone");
}

#[test]
fn test_count_json() {
    let tmp = tempfile::TempDir::new().unwrap();
    create_test_workspace(tmp.path());
    let out = run_tg_ok(tmp.path(), &["count", "--json"]);
    let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(parsed["total"], 4);
    assert_eq!(parsed["active"], 1);
    assert_eq!(parsed["milestones"], 1);
}

#[test]
fn test_show_record() {
    let tmp = tempfile::TempDir::new().unwrap();
    create_test_workspace(tmp.path());
    let out = run_tg_ok(tmp.path(), &["show", "N-003"]);
    assert!(out.contains("status: todo"));
    assert!(out.contains("due: 2026-02-01"));
    assert!(out.contains("path: N-001"));

    let err = run_tg_err(tmp.path(), &["show", "N-404"]);
    assert!(err.contains("record not found: N-404"));
}

#[test]
fn test_check_reports_duplicates() {
    let tmp = tempfile::TempDir::new().unwrap();
    create_test_workspace(tmp.path());
    run_tg_ok(tmp.path(), &["check"]);

    fs::write(
        tmp.path().join("tree.json"),
        r#"{"nodes":[{"id":"X","data":{"title":"a"}},{"id":"X","data":{"title":"b"}}]}"#,
    )
    .unwrap();
    let (stdout, _, success) = run_tg(tmp.path(), &["check"]);
    assert!(!success);
    assert!(stdout.contains("duplicate id X"));
}

#[test]
fn test_workspace_dir_flag() {
    let tmp = tempfile::TempDir::new().unwrap();
    let ws = tmp.path().join("ws");
    fs::create_dir(&ws).unwrap();
    create_test_workspace(&ws);
    let out = run_tg_ok(tmp.path(), &["-C", ws.to_str().unwrap(), "count"]);
    assert!(out.starts_with("4 records"));
}

// ---------------------------------------------------------------------------
// Write commands
// ---------------------------------------------------------------------------

#[test]
fn test_add_under_milestone_rejected() {
    let tmp = tempfile::TempDir::new().unwrap();
    create_test_workspace(tmp.path());
    let err = run_tg_err(tmp.path(), &["add", "Nope", "--parent", "N-004"]);
    assert!(err.contains("milestone"));
    assert_eq!(list_lines(tmp.path()).len(), 4);
}

#[test]
fn test_edit_fields() {
    let tmp = tempfile::TempDir::new().unwrap();
    create_test_workspace(tmp.path());
    let out = run_tg_ok(
        tmp.path(),
        &["edit", "N-002", "--status", "done", "--due", "2026-03-01"],
    );
    assert_eq!(out.trim(), "updated N-002");
    assert!(list_lines(tmp.path())[1].contains("[x] N-002 Outline  (due 2026-03-01)"));

    assert_eq!(
        run_tg_ok(tmp.path(), &["edit", "N-002", "--status", "done"]).trim(),
        "no changes"
    );

    let err = run_tg_err(tmp.path(), &["edit", "N-002", "--status", "later"]);
    assert!(err.contains("unknown status 'later'"));
    let err = run_tg_err(tmp.path(), &["edit", "N-002", "--title", "  "]);
    assert!(err.contains("title is required"));
}

#[test]
fn test_project_json() {
    let tmp = tempfile::TempDir::new().unwrap();
    create_test_workspace(tmp.path());
    let out = run_tg_ok(
        tmp.path(),
        &["project", "N-003", "N-003", "--offset", "-1", "--json"],
    );
    let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(parsed["depth"], 0);
    assert_eq!(parsed["parent"], serde_json::Value::Null);
    assert_eq!(parsed["order"], 2);
    assert_eq!(parsed["can_drop"], true);

    // Projection never writes
    assert_eq!(list_lines(tmp.path()).len(), 4);
    assert!(list_lines(tmp.path())[2].starts_with("  "));
}

#[test]
fn test_project_onto_milestone_blocked() {
    let tmp = tempfile::TempDir::new().unwrap();
    create_test_workspace(tmp.path());
    let out = run_tg_ok(tmp.path(), &["project", "N-002", "N-004", "--offset", "1"]);
    assert!(out.contains("parent N-004"));
    assert!(out.contains("cannot drop: N-004 is a milestone"));
}

#[test]
fn test_mv_outdent() {
    let tmp = tempfile::TempDir::new().unwrap();
    create_test_workspace(tmp.path());
    let out = run_tg_ok(tmp.path(), &["mv", "N-003", "N-003", "--offset", "-1"]);
    assert_eq!(out.trim(), "moved N-003 under (root) at position 2");
    assert_eq!(
        list_lines(tmp.path()),
        vec![
            "[>] N-001 Plan",
            "  [ ] N-002 Outline",
            "[ ] N-003 Research  (due 2026-02-01)",
            "[◇] N-004 Ship",
        ]
    );
}

#[test]
fn test_mv_into_own_subtree_rejected() {
    let tmp = tempfile::TempDir::new().unwrap();
    create_test_workspace(tmp.path());
    let before = fs::read_to_string(tmp.path().join("tree.json")).unwrap();
    let err = run_tg_err(tmp.path(), &["mv", "N-001", "N-003", "--offset", "2"]);
    assert!(err.contains("cannot move N-001"));
    assert_eq!(fs::read_to_string(tmp.path().join("tree.json")).unwrap(), before);
}

#[test]
fn test_mv_in_place_is_noop() {
    let tmp = tempfile::TempDir::new().unwrap();
    create_test_workspace(tmp.path());
    let out = run_tg_ok(tmp.path(), &["mv", "N-002", "N-002"]);
    assert_eq!(out.trim(), "N-002 is already there");
}
