use crate::document::Document;
use crate::edit::{CompiledEdit, EditAction, EditOutcome, EditVerification};
use crate::locator::{Locator, LocatorError};
use thiserror::Error;

/// Errors from the anchored patch operation.
///
/// Never recovered internally: a locator that resolves to zero or ambiguous
/// matches aborts the run before any edit is built, so a failed patch can
/// never leave a partially edited document behind.
#[derive(Error, Debug)]
pub enum PatchError {
    #[error(transparent)]
    Locator(#[from] LocatorError),

    #[error("edit error: {0}")]
    Edit(#[from] crate::edit::EditError),
}

impl PatchError {
    pub fn is_anchor_not_found(&self) -> bool {
        matches!(
            self,
            PatchError::Locator(LocatorError::AnchorNotFound { .. })
        )
    }
}

/// Result of a successful patch.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "PatchOutcome should be checked for applied/already-applied"]
pub enum PatchOutcome {
    /// The edit was applied; this is the new document.
    Applied(Document),
    /// The document already carries the edit's result.
    AlreadyApplied,
}

/// Resolve a locator against a document and apply one bounded edit.
///
/// The input document is never mutated; on success the transformed text comes
/// back as a new [`Document`]. An anchor that has drifted (or was already
/// consumed by a previous run's replace) fails with
/// [`LocatorError::AnchorNotFound`] rather than guessing: re-applying on top
/// of an earlier run must stop, not double-apply.
pub fn patch(
    document: &Document,
    locator: &Locator,
    action: &EditAction,
) -> Result<PatchOutcome, PatchError> {
    patch_with_verification(document, locator, action, None)
}

/// Like [`patch`], but with the before-text verification supplied by the
/// caller instead of captured from the document.
///
/// A compiled replace normally verifies against whatever the anchor span
/// currently holds; passing an explicit [`EditVerification`] pins the edit to
/// externally recorded expected text, so a drifted span fails with
/// [`EditError::BeforeTextMismatch`] instead of being silently rewritten.
///
/// [`EditError::BeforeTextMismatch`]: crate::edit::EditError::BeforeTextMismatch
pub fn patch_with_verification(
    document: &Document,
    locator: &Locator,
    action: &EditAction,
    verification: Option<EditVerification>,
) -> Result<PatchOutcome, PatchError> {
    let anchor = locator.resolve(document)?;

    match action.compile(document, &anchor)? {
        CompiledEdit::AlreadyApplied => Ok(PatchOutcome::AlreadyApplied),
        CompiledEdit::Pending(mut edit) => {
            if let Some(expected) = verification {
                edit.expected_before = expected;
            }
            match edit.apply(document)? {
                EditOutcome::Applied(patched) => Ok(PatchOutcome::Applied(patched)),
                EditOutcome::AlreadyApplied => Ok(PatchOutcome::AlreadyApplied),
            }
        }
    }
}
