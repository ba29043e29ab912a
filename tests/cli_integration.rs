//! Integration tests for the CLI
//!
//! Tests the command-line interface for apply, status, verify, and list

use std::fs;
use std::process::Command;
use tempfile::TempDir;

/// Helper to create a test workspace with patches
fn setup_test_workspace() -> TempDir {
    let dir = TempDir::new().unwrap();

    // Create a mock front-end source file
    fs::create_dir_all(dir.path().join("src/components")).unwrap();
    fs::write(
        dir.path().join("src/components/EntityPanel.js"),
        r#"export function EntityPanel({ entities, zoom }) {
  const dx = entities.length;
  const dy = zoom * 2;
  const offset = clamp(dx, dy);
  return offset;
}
"#,
    )
    .unwrap();

    // Create package.json
    fs::write(
        dir.path().join("package.json"),
        r#"{
  "name": "test-app",
  "version": "1.2.0"
}
"#,
    )
    .unwrap();

    // Create patches directory
    let patches_dir = dir.path().join("patches");
    fs::create_dir(&patches_dir).unwrap();

    // Create a patch file
    fs::write(
        patches_dir.join("test-patch.toml"),
        r#"[meta]
name = "test-patches"
description = "Test patch set"
workspace_relative = true

[[patches]]
id = "scale-offset"
file = "src/components/EntityPanel.js"

[patches.locator]
type = "exact"
anchor = "clamp(dx, dy)"

[patches.edit]
type = "replace"
text = "clampScaled(dx, dy, zoom)"
"#,
    )
    .unwrap();

    dir
}

fn run_cli(args: &[&str]) -> std::process::Output {
    Command::new("cargo")
        .args(["run", "--quiet", "--"])
        .args(args)
        .output()
        .unwrap()
}

#[test]
fn test_apply_help() {
    let output = run_cli(&["apply", "--help"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Apply patches to a workspace"));
}

#[test]
fn test_apply_basic() {
    let workspace = setup_test_workspace();

    let output = run_cli(&["apply", "--workspace", workspace.path().to_str().unwrap()]);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert!(stdout.contains("Workspace:"));
    assert!(stdout.contains("Version: 1.2.0"));
    assert!(stdout.contains("Loading patches"));
    assert!(stdout.contains("Summary:"));
    assert!(stdout.contains("scale-offset"));

    let content =
        fs::read_to_string(workspace.path().join("src/components/EntityPanel.js")).unwrap();
    assert!(content.contains("clampScaled(dx, dy, zoom)"));
}

#[test]
fn test_apply_idempotent() {
    let workspace = setup_test_workspace();

    // Apply once
    let output1 = run_cli(&["apply", "--workspace", workspace.path().to_str().unwrap()]);
    assert!(output1.status.success());

    // Apply again - should report already applied
    let output = run_cli(&["apply", "--workspace", workspace.path().to_str().unwrap()]);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert!(stdout.contains("Already applied"));
}

#[test]
fn test_apply_dry_run_does_not_modify_files() {
    let workspace = setup_test_workspace();
    let original_content =
        fs::read_to_string(workspace.path().join("src/components/EntityPanel.js")).unwrap();

    let output = run_cli(&[
        "apply",
        "--workspace",
        workspace.path().to_str().unwrap(),
        "--dry-run",
    ]);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert!(stdout.contains("DRY RUN"));
    assert!(stdout.contains("Would apply"));

    let content =
        fs::read_to_string(workspace.path().join("src/components/EntityPanel.js")).unwrap();
    assert_eq!(content, original_content);
}

#[test]
fn test_apply_with_diff() {
    let workspace = setup_test_workspace();

    let output = run_cli(&[
        "apply",
        "--workspace",
        workspace.path().to_str().unwrap(),
        "--diff",
    ]);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert!(stdout.contains("Summary:"));
    assert!(stdout.contains("clampScaled"));
}

#[test]
fn test_apply_failure_exits_nonzero() {
    let workspace = setup_test_workspace();

    // Rewrite the source so the anchor no longer exists (and the
    // replacement is absent too)
    fs::write(
        workspace.path().join("src/components/EntityPanel.js"),
        "export function EntityPanel() { return null; }\n",
    )
    .unwrap();

    let output = run_cli(&["apply", "--workspace", workspace.path().to_str().unwrap()]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Anchor matched no locations"));
}

#[test]
fn test_status_command() {
    let workspace = setup_test_workspace();

    let output = run_cli(&["status", "--workspace", workspace.path().to_str().unwrap()]);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert!(stdout.contains("Patch Status Report"));
    assert!(stdout.contains("NOT APPLIED"));

    // Status is read-only
    let content =
        fs::read_to_string(workspace.path().join("src/components/EntityPanel.js")).unwrap();
    assert!(content.contains("clamp(dx, dy)"));
}

#[test]
fn test_verify_command() {
    let workspace = setup_test_workspace();

    // Verify before applying - should report a mismatch
    let output = run_cli(&["verify", "--workspace", workspace.path().to_str().unwrap()]);
    assert!(!output.status.success());

    // Apply, then verify again
    run_cli(&["apply", "--workspace", workspace.path().to_str().unwrap()]);
    let output = run_cli(&["verify", "--workspace", workspace.path().to_str().unwrap()]);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert!(stdout.contains("Verified"));
}

#[test]
fn test_list_command() {
    let workspace = setup_test_workspace();

    let output = run_cli(&["list", "--workspace", workspace.path().to_str().unwrap()]);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert!(stdout.contains("test-patches"));
    assert!(stdout.contains("scale-offset"));
}

#[test]
fn test_missing_workspace() {
    let output = run_cli(&["apply", "--workspace", "/nonexistent/workspace"]);
    assert!(!output.status.success());
}
