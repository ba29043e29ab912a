//! Version filtering for patch sets using semver constraints
//!
//! Patch sets can declare a version range like ">=1.2.0, <2.0.0" against the
//! target application's version, so a patch set for a redesigned component
//! never fires on an older checkout.

use semver::{Version, VersionReq};
use thiserror::Error;

/// Errors during version filtering
#[derive(Error, Debug, Clone)]
pub enum VersionError {
    #[error("invalid version '{value}': {reason}")]
    InvalidVersion { value: String, reason: String },

    #[error("invalid version requirement '{value}': {reason}")]
    InvalidRequirement { value: String, reason: String },
}

/// Check if a version matches a requirement string
///
/// # Examples
///
/// ```
/// use anchor_patch::config::version::matches_requirement;
///
/// assert!(matches_requirement("1.2.0", Some(">=1.2.0")).unwrap());
/// assert!(matches_requirement("1.3.0", Some(">=1.2.0, <2.0.0")).unwrap());
/// assert!(!matches_requirement("1.1.0", Some(">=1.2.0")).unwrap());
///
/// // None requirement means "apply to all versions"
/// assert!(matches_requirement("1.0.0", None).unwrap());
/// ```
pub fn matches_requirement(
    version: &str,
    requirement: Option<&str>,
) -> Result<bool, VersionError> {
    // No requirement means "apply to all versions"
    let Some(req_str) = requirement else {
        return Ok(true);
    };

    let req_str = req_str.trim();
    if req_str.is_empty() {
        return Ok(true);
    }

    let version = Version::parse(version).map_err(|e| VersionError::InvalidVersion {
        value: version.to_string(),
        reason: e.to_string(),
    })?;

    let req = VersionReq::parse(req_str).map_err(|e| VersionError::InvalidRequirement {
        value: req_str.to_string(),
        reason: e.to_string(),
    })?;

    Ok(req.matches(&version))
}
