//! Anchor Patch: anchored text patching for web app workspaces
//!
//! Locates an anchor inside a UTF-8 source file and applies one bounded edit
//! at the resolved position. Anchors are either exact substrings (which must
//! occur exactly once) or line predicates (first line satisfying conditions
//! over the line and a window of preceding lines).
//!
//! # Architecture
//!
//! Both edit kinds compile down to a single primitive: [`SpanEdit`], a
//! verified byte-span replacement (an insertion is a zero-width span).
//! Intelligence lives in anchor resolution, not in the application logic.
//!
//! # Safety
//!
//! - A locator resolving to zero or ambiguous matches aborts before any edit
//! - Span edits verify expected before-text before applying
//! - Atomic file writes (tempfile + fsync + rename)
//! - Workspace boundary enforcement
//! - UTF-8 validation
//! - Re-runs report already-applied instead of double-applying
//!
//! # Example
//!
//! ```
//! use anchor_patch::{patch, Document, EditAction, Locator, PatchOutcome};
//!
//! let doc = Document::new("const p = clamp(dx, dy);\n");
//! let outcome = patch(
//!     &doc,
//!     &Locator::exact("clamp(dx, dy)"),
//!     &EditAction::replace("clampScaled(dx, dy)"),
//! )?;
//!
//! let PatchOutcome::Applied(patched) = outcome else { unreachable!() };
//! assert_eq!(patched.text(), "const p = clampScaled(dx, dy);\n");
//! # Ok::<(), anchor_patch::PatchError>(())
//! ```

pub mod config;
pub mod document;
pub mod edit;
pub mod locator;
pub mod patcher;
pub mod safety;

// Re-exports
pub use config::{
    apply_patches, check_patches, load_from_path, load_from_str, ApplicationError, ConfigError,
    PatchConfig, PatchResult,
};
pub use config::version::matches_requirement;
pub use document::{Document, DocumentError};
pub use edit::{EditAction, EditError, EditVerification, Placement, SpanEdit};
pub use locator::{Anchor, ExactAnchor, LinePredicate, Locator, LocatorError};
pub use patcher::{patch, patch_with_verification, PatchError, PatchOutcome};
pub use safety::{SafetyError, WorkspaceGuard};
