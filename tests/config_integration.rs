//! Integration tests for the patch config layer
//!
//! Tests TOML loading, validation, version filtering, idempotency checks,
//! and full patch application against a mock workspace

use anchor_patch::config::{
    apply_patches, check_patches, load_from_path, load_from_str, ApplicationError, ConfigError,
    EditSpec, LocatorSpec, PatchResult,
};
use anchor_patch::EditVerification;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Helper to create a temp dir with a mock front-end source file
fn setup_test_workspace() -> TempDir {
    let dir = TempDir::new().unwrap();

    fs::create_dir_all(dir.path().join("src/components")).unwrap();
    fs::write(
        dir.path().join("src/components/EntityPanel.js"),
        r#"import React from 'react';

export function EntityPanel({ entities, zoom }) {
  const dx = entities.length;
  const dy = zoom * 2;
  const offset = clamp(dx, dy);
  return (
    <table className="entity-panel">
      <thead>
        <tr>
          <th
            style={{
              textAlign: 'left',
            }}
          >
          Color
          </th>
        </tr>
      </thead>
    </table>
  );
}
"#,
    )
    .unwrap();

    dir
}

const FULL_CONFIG: &str = r#"
[meta]
name = "entity-panel-fixes"
description = "Layout fixes for the entity panel"
version_range = ">=1.0.0, <2.0.0"
workspace_relative = true

[[patches]]
id = "scale-offset-formula"
file = "src/components/EntityPanel.js"

[patches.locator]
type = "exact"
anchor = "const offset = clamp(dx, dy);"

[patches.edit]
type = "replace"
text = "const offset = clampScaled(dx, dy, zoom);"

[[patches]]
id = "add-actions-column"
file = "src/components/EntityPanel.js"

[patches.locator]
type = "line-predicate"
equals_trimmed = "</tr>"
window_contains = "Color"
window = 20

[patches.edit]
type = "insert-lines"
position = "before"
lines = ["          <th>Actions</th>"]
"#;

#[test]
fn test_load_full_config() {
    let config = load_from_str(FULL_CONFIG).unwrap();

    assert_eq!(config.meta.name, "entity-panel-fixes");
    assert_eq!(
        config.meta.version_range.as_deref(),
        Some(">=1.0.0, <2.0.0")
    );
    assert!(config.meta.workspace_relative);
    assert_eq!(config.patches.len(), 2);

    assert!(matches!(
        config.patches[0].locator,
        LocatorSpec::Exact { .. }
    ));
    assert!(matches!(config.patches[0].edit, EditSpec::Replace { .. }));

    let LocatorSpec::LinePredicate {
        ref equals_trimmed,
        ref window_contains,
        window,
        ..
    } = config.patches[1].locator
    else {
        panic!("expected a line-predicate locator");
    };
    assert_eq!(equals_trimmed.as_deref(), Some("</tr>"));
    assert_eq!(window_contains.as_deref(), Some("Color"));
    assert_eq!(window, 20);
}

#[test]
fn test_load_invalid_toml_fails() {
    let result = load_from_str("this is not [valid toml");
    assert!(matches!(result, Err(ConfigError::Toml { .. })));
}

#[test]
fn test_load_rejects_empty_patch_list() {
    let result = load_from_str("[meta]\nname = \"empty\"\n");
    assert!(matches!(result, Err(ConfigError::Validation { .. })));
}

#[test]
fn test_load_rejects_conditionless_predicate() {
    let toml = r#"
[meta]
name = "bad"

[[patches]]
id = "p1"
file = "a.js"

[patches.locator]
type = "line-predicate"

[patches.edit]
type = "replace"
text = "x"
"#;
    let err = load_from_str(toml).unwrap_err();
    assert!(err.to_string().contains("at least one condition"));
}

#[test]
fn test_load_from_path_missing_file() {
    let result = load_from_path("/nonexistent/patches.toml");
    assert!(matches!(result, Err(ConfigError::Io { .. })));
}

#[test]
fn test_apply_patches_end_to_end() {
    let workspace = setup_test_workspace();
    let config = load_from_str(FULL_CONFIG).unwrap();

    let results = apply_patches(&config, workspace.path(), "1.2.0");
    assert_eq!(results.len(), 2);
    for (id, result) in &results {
        assert!(
            matches!(result, Ok(PatchResult::Applied { .. })),
            "patch {id} should apply: {result:?}"
        );
    }

    let content =
        fs::read_to_string(workspace.path().join("src/components/EntityPanel.js")).unwrap();
    assert!(content.contains("clampScaled(dx, dy, zoom)"));
    assert!(!content.contains("clamp(dx, dy);"));
    assert!(content.contains("<th>Actions</th>"));

    // The inserted column lands inside the header row
    let actions_pos = content.find("<th>Actions</th>").unwrap();
    let row_close_pos = content.find("</tr>").unwrap();
    assert!(actions_pos < row_close_pos);
}

#[test]
fn test_apply_patches_is_rerun_safe() {
    let workspace = setup_test_workspace();
    let config = load_from_str(FULL_CONFIG).unwrap();

    apply_patches(&config, workspace.path(), "1.2.0");
    let after_first =
        fs::read_to_string(workspace.path().join("src/components/EntityPanel.js")).unwrap();

    let results = apply_patches(&config, workspace.path(), "1.2.0");
    for (id, result) in &results {
        assert!(
            matches!(result, Ok(PatchResult::AlreadyApplied { .. })),
            "patch {id} should be already applied on re-run: {result:?}"
        );
    }

    let after_second =
        fs::read_to_string(workspace.path().join("src/components/EntityPanel.js")).unwrap();
    assert_eq!(after_first, after_second);
}

#[test]
fn test_version_filtering_skips_out_of_range() {
    let workspace = setup_test_workspace();
    let config = load_from_str(FULL_CONFIG).unwrap();

    let results = apply_patches(&config, workspace.path(), "2.1.0");
    assert!(results
        .iter()
        .all(|(_, r)| matches!(r, Ok(PatchResult::SkippedVersion { .. }))));

    let content =
        fs::read_to_string(workspace.path().join("src/components/EntityPanel.js")).unwrap();
    assert!(content.contains("clamp(dx, dy)"));
}

#[test]
fn test_check_patches_reports_without_writing() {
    let workspace = setup_test_workspace();
    let config = load_from_str(FULL_CONFIG).unwrap();
    let before =
        fs::read_to_string(workspace.path().join("src/components/EntityPanel.js")).unwrap();

    let results = check_patches(&config, workspace.path(), "1.2.0");
    assert!(results
        .iter()
        .all(|(_, r)| matches!(r, Ok(PatchResult::Applied { .. }))));

    let after =
        fs::read_to_string(workspace.path().join("src/components/EntityPanel.js")).unwrap();
    assert_eq!(before, after);
}

#[test]
fn test_drifted_anchor_reports_not_found() {
    let workspace = setup_test_workspace();
    let config = load_from_str(
        r#"
[meta]
name = "drifted"
workspace_relative = true

[[patches]]
id = "renamed-upstream"
file = "src/components/EntityPanel.js"

[patches.locator]
type = "exact"
anchor = "const offset = computeOffset(dx, dy);"

[patches.edit]
type = "replace"
text = "const offset = computeOffsetScaled(dx, dy, zoom);"
"#,
    )
    .unwrap();

    let results = apply_patches(&config, workspace.path(), "1.2.0");
    let (_, result) = &results[0];
    let Err(ApplicationError::AnchorNotFound { file, locator }) = result else {
        panic!("expected AnchorNotFound, got {result:?}");
    };
    assert!(file.ends_with(Path::new("src/components/EntityPanel.js")));
    assert!(locator.contains("computeOffset"));
}

#[test]
fn test_hash_verification_accepts_expected_span() {
    let workspace = setup_test_workspace();

    let anchor = "const offset = clamp(dx, dy);";
    let expected = EditVerification::from_text(anchor).hash();
    let toml = format!(
        r#"
[meta]
name = "verified"
workspace_relative = true

[[patches]]
id = "scale-offset-formula"
file = "src/components/EntityPanel.js"

[patches.locator]
type = "exact"
anchor = "{anchor}"

[patches.edit]
type = "replace"
text = "const offset = clampScaled(dx, dy, zoom);"

[patches.verify]
method = "hash"
algorithm = "xxh3"
expected = "0x{expected:x}"
"#
    );

    let config = load_from_str(&toml).unwrap();
    let results = apply_patches(&config, workspace.path(), "1.2.0");
    assert!(matches!(results[0].1, Ok(PatchResult::Applied { .. })));
}

#[test]
fn test_exact_match_verification_rejects_drifted_span() {
    let workspace = setup_test_workspace();

    let toml = r#"
[meta]
name = "verified"
workspace_relative = true

[[patches]]
id = "scale-offset-formula"
file = "src/components/EntityPanel.js"

[patches.locator]
type = "exact"
anchor = "const offset = clamp(dx, dy);"

[patches.edit]
type = "replace"
text = "const offset = clampScaled(dx, dy, zoom);"

[patches.verify]
method = "exact_match"
expected_text = "const offset = clamp(dx, dz);"
"#;

    let config = load_from_str(toml).unwrap();
    let results = apply_patches(&config, workspace.path(), "1.2.0");
    assert!(matches!(results[0].1, Err(ApplicationError::Edit { .. })));

    let content =
        fs::read_to_string(workspace.path().join("src/components/EntityPanel.js")).unwrap();
    assert!(content.contains("clamp(dx, dy)"));
}
