//! Patch applicator - applies patch set definitions with idempotency checks
//!
//! This module provides high-level patch application that:
//! - Filters patch sets by version constraints
//! - Reads each target file once, runs its patches in declaration order
//!   against the in-memory document, and writes the file back at most once
//! - Detects already-applied patches instead of double-applying
//! - Reports detailed results for each patch

use crate::config::schema::{EditSpec, PatchConfig, PatchDefinition};
use crate::config::version::{matches_requirement, VersionError};
use crate::document::{Document, DocumentError};
use crate::edit::EditError;
use crate::locator::LocatorError;
use crate::patcher::{patch_with_verification, PatchError, PatchOutcome};
use crate::safety::{SafetyError, WorkspaceGuard};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result of applying a single patch
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "PatchResult should be checked for success/failure"]
pub enum PatchResult {
    /// Patch was successfully applied
    Applied { file: PathBuf },
    /// Patch was already applied (idempotent check passed)
    AlreadyApplied { file: PathBuf },
    /// Patch was skipped due to version constraint
    SkippedVersion { reason: String },
    /// Patch failed after its edit had landed in memory
    Failed { file: PathBuf, reason: String },
}

impl fmt::Display for PatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatchResult::Applied { file } => {
                write!(f, "Applied patch to {}", file.display())
            }
            PatchResult::AlreadyApplied { file } => {
                write!(f, "Already applied to {}", file.display())
            }
            PatchResult::SkippedVersion { reason } => {
                write!(f, "Skipped (version): {reason}")
            }
            PatchResult::Failed { file, reason } => {
                write!(f, "Failed on {}: {reason}", file.display())
            }
        }
    }
}

/// Errors during patch application
#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("version error: {0}")]
    Version(#[from] VersionError),

    #[error("target file does not exist: {}", path.display())]
    MissingFile { path: PathBuf },

    #[error("failed to load {}: {source}", path.display())]
    Document {
        path: PathBuf,
        #[source]
        source: DocumentError,
    },

    #[error("anchor not found in {}: {locator}", file.display())]
    AnchorNotFound { file: PathBuf, locator: String },

    #[error("ambiguous anchor in {} ({count} matches, expected 1): {locator}", file.display())]
    AmbiguousAnchor {
        file: PathBuf,
        locator: String,
        count: usize,
    },

    #[error("edit failed on {}: {source}", file.display())]
    Edit {
        file: PathBuf,
        #[source]
        source: EditError,
    },

    #[error("invalid verification for {}: {reason}", file.display())]
    Verification { file: PathBuf, reason: String },

    #[error("unsafe target path {}: {source}", path.display())]
    UnsafePath {
        path: PathBuf,
        #[source]
        source: SafetyError,
    },
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum WriteMode {
    Persist,
    CheckOnly,
}

/// Apply a patch set to a workspace
///
/// # Arguments
///
/// * `config` - The patch set to apply
/// * `workspace_root` - Root directory of the target workspace
/// * `workspace_version` - Version of the target app (e.g. "1.2.0")
///
/// # Returns
///
/// A vector of results, one per patch, in declaration order.
pub fn apply_patches(
    config: &PatchConfig,
    workspace_root: &Path,
    workspace_version: &str,
) -> Vec<(String, Result<PatchResult, ApplicationError>)> {
    run_patches(config, workspace_root, workspace_version, WriteMode::Persist)
}

/// Check patch status without mutating the workspace.
///
/// Result semantics mirror [`apply_patches`] (`Applied` means "would apply")
/// but nothing is written; all evaluation happens on in-memory documents.
pub fn check_patches(
    config: &PatchConfig,
    workspace_root: &Path,
    workspace_version: &str,
) -> Vec<(String, Result<PatchResult, ApplicationError>)> {
    run_patches(
        config,
        workspace_root,
        workspace_version,
        WriteMode::CheckOnly,
    )
}

fn run_patches(
    config: &PatchConfig,
    workspace_root: &Path,
    workspace_version: &str,
    mode: WriteMode,
) -> Vec<(String, Result<PatchResult, ApplicationError>)> {
    match matches_requirement(workspace_version, config.meta.version_range.as_deref()) {
        Ok(true) => {}
        Ok(false) => {
            let range = config.meta.version_range.as_deref().unwrap_or("").trim();
            let reason = format!(
                "workspace version {workspace_version} does not satisfy version_range '{range}'"
            );
            return config
                .patches
                .iter()
                .map(|patch| {
                    (
                        patch.id.clone(),
                        Ok(PatchResult::SkippedVersion {
                            reason: reason.clone(),
                        }),
                    )
                })
                .collect();
        }
        Err(e) => {
            return config
                .patches
                .iter()
                .map(|patch| (patch.id.clone(), Err(ApplicationError::Version(e.clone()))))
                .collect();
        }
    }

    // Workspace-relative patch sets stay inside the workspace; symlinks and
    // .. components cannot escape, and dependency/build dirs are off limits.
    let guard = if config.meta.workspace_relative {
        match WorkspaceGuard::new(workspace_root) {
            Ok(guard) => Some(guard),
            Err(source) => {
                let message = source.to_string();
                return config
                    .patches
                    .iter()
                    .map(|patch| {
                        (
                            patch.id.clone(),
                            Err(ApplicationError::UnsafePath {
                                path: workspace_root.to_path_buf(),
                                source: SafetyError::Canonicalize(std::io::Error::new(
                                    std::io::ErrorKind::InvalidInput,
                                    message.clone(),
                                )),
                            }),
                        )
                    })
                    .collect();
            }
        }
    } else {
        None
    };

    // Documents evolve in memory as each patch lands; a file is written back
    // at most once, after all of its patches have run.
    let mut documents: HashMap<PathBuf, Document> = HashMap::new();
    let mut dirty: HashSet<PathBuf> = HashSet::new();
    let mut results = Vec::with_capacity(config.patches.len());

    for patch_def in &config.patches {
        let file_path = resolve_target(config, workspace_root, patch_def);

        if !documents.contains_key(&file_path) {
            if !file_path.exists() {
                results.push((
                    patch_def.id.clone(),
                    Err(ApplicationError::MissingFile {
                        path: file_path.clone(),
                    }),
                ));
                continue;
            }
            if let Some(guard) = &guard {
                if let Err(source) = guard.validate_path(&file_path) {
                    results.push((
                        patch_def.id.clone(),
                        Err(ApplicationError::UnsafePath {
                            path: file_path.clone(),
                            source,
                        }),
                    ));
                    continue;
                }
            }
            match Document::load(&file_path) {
                Ok(document) => {
                    documents.insert(file_path.clone(), document);
                }
                Err(source) => {
                    results.push((
                        patch_def.id.clone(),
                        Err(ApplicationError::Document {
                            path: file_path.clone(),
                            source,
                        }),
                    ));
                    continue;
                }
            }
        }

        let document = &documents[&file_path];

        match run_single(patch_def, &file_path, document) {
            Ok(PatchOutcome::Applied(patched)) => {
                documents.insert(file_path.clone(), patched);
                dirty.insert(file_path.clone());
                results.push((
                    patch_def.id.clone(),
                    Ok(PatchResult::Applied {
                        file: file_path.clone(),
                    }),
                ));
            }
            Ok(PatchOutcome::AlreadyApplied) => {
                results.push((
                    patch_def.id.clone(),
                    Ok(PatchResult::AlreadyApplied {
                        file: file_path.clone(),
                    }),
                ));
            }
            Err(error) => results.push((patch_def.id.clone(), Err(error))),
        }
    }

    if mode == WriteMode::Persist {
        for path in &dirty {
            // Re-check the boundary right before the write to narrow the
            // TOCTOU window.
            let write_result = match guard.as_ref().map(|g| g.revalidate(path)) {
                Some(Err(source)) => Err(DocumentError::Io(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    source.to_string(),
                ))),
                _ => documents[path].save(path),
            };
            if let Err(source) = write_result {
                // The patched text never reached disk; downgrade this file's
                // "Applied" entries so the caller sees the truth.
                let reason = format!("failed to write patched file: {source}");
                for (_, result) in results.iter_mut() {
                    if matches!(result, Ok(PatchResult::Applied { file }) if file == path) {
                        *result = Ok(PatchResult::Failed {
                            file: path.clone(),
                            reason: reason.clone(),
                        });
                    }
                }
            }
        }
    }

    results
}

/// Run one patch against an in-memory document.
fn run_single(
    patch_def: &PatchDefinition,
    file_path: &Path,
    document: &Document,
) -> Result<PatchOutcome, ApplicationError> {
    let locator = patch_def.locator.to_locator();
    let action = patch_def.edit.to_action();

    let verification = match &patch_def.verify {
        Some(verify) => Some(verify.to_verification().map_err(|reason| {
            ApplicationError::Verification {
                file: file_path.to_path_buf(),
                reason,
            }
        })?),
        None => None,
    };

    match patch_with_verification(document, &locator, &action, verification) {
        Ok(outcome) => Ok(outcome),
        Err(error) => {
            // Re-run friendliness: a replace whose anchor was consumed by a
            // previous run, with the replacement text already in place, counts
            // as already applied. The core stays strict; only this layer
            // downgrades.
            if error.is_anchor_not_found() && replacement_already_present(patch_def, document) {
                return Ok(PatchOutcome::AlreadyApplied);
            }
            Err(from_patch_error(error, file_path))
        }
    }
}

fn replacement_already_present(patch_def: &PatchDefinition, document: &Document) -> bool {
    matches!(&patch_def.edit, EditSpec::Replace { text } if document.text().contains(text.as_str()))
}

fn resolve_target(
    config: &PatchConfig,
    workspace_root: &Path,
    patch_def: &PatchDefinition,
) -> PathBuf {
    if config.meta.workspace_relative {
        workspace_root.join(&patch_def.file)
    } else {
        PathBuf::from(&patch_def.file)
    }
}

fn from_patch_error(error: PatchError, file: &Path) -> ApplicationError {
    match error {
        PatchError::Locator(LocatorError::AnchorNotFound { locator }) => {
            ApplicationError::AnchorNotFound {
                file: file.to_path_buf(),
                locator,
            }
        }
        PatchError::Locator(LocatorError::AmbiguousAnchor { locator, count }) => {
            ApplicationError::AmbiguousAnchor {
                file: file.to_path_buf(),
                locator,
                count,
            }
        }
        PatchError::Edit(source) => ApplicationError::Edit {
            file: file.to_path_buf(),
            source,
        },
    }
}
