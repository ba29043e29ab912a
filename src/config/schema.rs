use crate::edit::{EditAction, EditVerification, Placement};
use crate::locator::{ExactAnchor, LinePredicate, Locator};
use serde::Deserialize;
use std::fmt;

#[derive(Debug, Deserialize, Default, Clone)]
pub struct PatchConfig {
    #[serde(default)]
    pub meta: Metadata,
    #[serde(default)]
    pub patches: Vec<PatchDefinition>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Metadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Semver requirement against the target app's package.json version.
    #[serde(default)]
    pub version_range: Option<String>,
    #[serde(default)]
    pub workspace_relative: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PatchDefinition {
    pub id: String,
    pub file: String,
    pub locator: LocatorSpec,
    pub edit: EditSpec,
    #[serde(default)]
    pub verify: Option<Verify>,
}

/// Locator as written in a patch file.
#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum LocatorSpec {
    /// Literal text that must appear exactly once.
    Exact { anchor: String },
    /// First line satisfying all supplied conditions, scanning forward.
    LinePredicate {
        #[serde(default)]
        equals_trimmed: Option<String>,
        #[serde(default)]
        contains: Option<String>,
        #[serde(default)]
        window_contains: Option<String>,
        /// How many preceding lines the window covers.
        #[serde(default = "default_window")]
        window: usize,
    },
}

fn default_window() -> usize {
    1
}

impl LocatorSpec {
    pub fn to_locator(&self) -> Locator {
        match self {
            LocatorSpec::Exact { anchor } => Locator::Exact(ExactAnchor::new(anchor.clone())),
            LocatorSpec::LinePredicate {
                equals_trimmed,
                contains,
                window_contains,
                window,
            } => Locator::Predicate(LinePredicate {
                equals_trimmed: equals_trimmed.clone(),
                contains: contains.clone(),
                window_contains: window_contains.clone(),
                window: *window,
            }),
        }
    }
}

/// Edit as written in a patch file.
#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum EditSpec {
    Replace {
        text: String,
    },
    InsertLines {
        lines: Vec<String>,
        #[serde(default)]
        position: Position,
    },
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Position {
    Before,
    #[default]
    After,
}

impl EditSpec {
    pub fn to_action(&self) -> EditAction {
        match self {
            EditSpec::Replace { text } => EditAction::Replace { text: text.clone() },
            EditSpec::InsertLines { lines, position } => EditAction::InsertLines {
                lines: lines.clone(),
                placement: match position {
                    Position::Before => Placement::Before,
                    Position::After => Placement::After,
                },
            },
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Verify {
    ExactMatch {
        expected_text: String,
    },
    Hash {
        algorithm: Option<HashAlgorithm>,
        expected: String,
    },
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum HashAlgorithm {
    Xxh3,
}

impl Verify {
    /// Convert to the edit-level verification strategy.
    pub fn to_verification(&self) -> Result<EditVerification, String> {
        match self {
            Verify::ExactMatch { expected_text } => {
                Ok(EditVerification::ExactMatch(expected_text.clone()))
            }
            Verify::Hash { expected, .. } => {
                let hash = u64::from_str_radix(expected.trim_start_matches("0x"), 16)
                    .map_err(|_| format!("invalid hash value: {expected}"))?;
                Ok(EditVerification::Hash(hash))
            }
        }
    }
}

impl PatchConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self.patches.is_empty() {
            issues.push(ValidationIssue::EmptyPatchList);
        }

        for patch in &self.patches {
            if patch.id.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    patch_id: None,
                    field: "id",
                });
            }
            if patch.file.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    patch_id: Some(patch.id.clone()),
                    field: "file",
                });
            }

            match &patch.locator {
                LocatorSpec::Exact { anchor } => {
                    if anchor.is_empty() {
                        issues.push(ValidationIssue::MissingField {
                            patch_id: Some(patch.id.clone()),
                            field: "locator.anchor",
                        });
                    }
                }
                LocatorSpec::LinePredicate {
                    equals_trimmed,
                    contains,
                    window_contains,
                    window,
                } => {
                    if equals_trimmed.is_none() && contains.is_none() && window_contains.is_none() {
                        issues.push(ValidationIssue::InvalidCombo {
                            patch_id: Some(patch.id.clone()),
                            message: "line-predicate locator needs at least one condition"
                                .to_string(),
                        });
                    }
                    if window_contains.is_some() && *window == 0 {
                        issues.push(ValidationIssue::InvalidCombo {
                            patch_id: Some(patch.id.clone()),
                            message: "window_contains requires window >= 1".to_string(),
                        });
                    }
                }
            }

            match &patch.edit {
                EditSpec::Replace { text } => {
                    if text.is_empty() {
                        issues.push(ValidationIssue::MissingField {
                            patch_id: Some(patch.id.clone()),
                            field: "edit.text",
                        });
                    }
                }
                EditSpec::InsertLines { lines, .. } => {
                    if lines.is_empty() {
                        issues.push(ValidationIssue::MissingField {
                            patch_id: Some(patch.id.clone()),
                            field: "edit.lines",
                        });
                    }
                }
            }

            if let Some(verify) = &patch.verify {
                if !matches!(patch.edit, EditSpec::Replace { .. }) {
                    issues.push(ValidationIssue::InvalidCombo {
                        patch_id: Some(patch.id.clone()),
                        message: "verify only applies to replace edits".to_string(),
                    });
                }
                if let Err(message) = verify.to_verification() {
                    issues.push(ValidationIssue::InvalidCombo {
                        patch_id: Some(patch.id.clone()),
                        message,
                    });
                }
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone)]
pub enum ValidationIssue {
    EmptyPatchList,
    MissingField {
        patch_id: Option<String>,
        field: &'static str,
    },
    InvalidCombo {
        patch_id: Option<String>,
        message: String,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::EmptyPatchList => write!(f, "patch config contains no patches"),
            ValidationIssue::MissingField { patch_id, field } => match patch_id {
                Some(id) => write!(f, "patch '{id}' missing required field '{field}'"),
                None => write!(f, "patch missing required field '{field}'"),
            },
            ValidationIssue::InvalidCombo { patch_id, message } => match patch_id {
                Some(id) => write!(f, "patch '{id}' has invalid configuration: {message}"),
                None => write!(f, "invalid patch configuration: {message}"),
            },
        }
    }
}
