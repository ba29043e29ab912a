//! TOML patch set support
//!
//! Patch sets describe anchored edits declaratively:
//!
//! ```toml
//! [meta]
//! name = "entity-panel-fixes"
//! version_range = ">=1.2.0, <2.0.0"
//! workspace_relative = true
//!
//! [[patches]]
//! id = "fix-offset-formula"
//! file = "src/components/EntityPanel.js"
//!
//! [patches.locator]
//! type = "exact"
//! anchor = "clamp(dx, dy)"
//!
//! [patches.edit]
//! type = "replace"
//! text = "clampScaled(dx, dy)"
//! ```

pub mod applicator;
pub mod loader;
pub mod schema;
pub mod version;

pub use applicator::{apply_patches, check_patches, ApplicationError, PatchResult};
pub use loader::{load_from_path, load_from_str, ConfigError};
pub use schema::{EditSpec, LocatorSpec, PatchConfig, PatchDefinition, Position, Verify};
