use std::borrow::Borrow;
use std::fmt::{Display, Formatter};

use cradleguard_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Maximum length of a permission or capability slug.
pub const SLUG_MAX_LENGTH: usize = 64;

/// A validated permission or capability slug.
///
/// Slugs are lowercase dotted identifiers such as `device.control` or
/// `control_limited`. The same slug vocabulary identifies global permissions
/// and device-scoped capabilities; only mutation paths require a slug to be
/// registered, read-side checks treat unknown slugs as absent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PermissionSlug(String);

impl PermissionSlug {
    /// Creates a validated slug.
    ///
    /// Accepts `[a-z0-9._-]` with no leading or trailing separator and no
    /// empty segments, up to [`SLUG_MAX_LENGTH`] characters.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        validate_slug(value.as_str(), "permission slug")?;
        Ok(Self(value))
    }

    /// Builds a slug from a catalog constant known to be valid.
    pub(crate) fn from_static(value: &'static str) -> Self {
        Self(value.to_owned())
    }

    /// Returns the underlying slug string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Borrow<str> for PermissionSlug {
    fn borrow(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for PermissionSlug {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

impl From<PermissionSlug> for String {
    fn from(value: PermissionSlug) -> Self {
        value.0
    }
}

/// A registered permission and its administrative metadata.
///
/// The parent link is hierarchical grouping only; holding a parent permission
/// never implies the child grant, and the reverse also does not hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionDefinition {
    /// Globally unique slug identifying the permission.
    pub slug: PermissionSlug,
    /// Human-readable name shown in administrative views.
    pub display_name: String,
    /// Description of what the permission allows.
    pub description: String,
    /// Optional group tag for administrative listings.
    pub group: Option<String>,
    /// Optional parent permission used for grouping.
    pub parent_slug: Option<PermissionSlug>,
    /// System-flagged permissions cannot be deleted.
    pub is_system: bool,
}

pub(crate) fn validate_slug(value: &str, kind: &str) -> AppResult<()> {
    if value.is_empty() {
        return Err(AppError::Validation(format!("{kind} must not be empty")));
    }

    if value.len() > SLUG_MAX_LENGTH {
        return Err(AppError::Validation(format!(
            "{kind} must not exceed {SLUG_MAX_LENGTH} characters"
        )));
    }

    let valid_chars = value
        .chars()
        .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || matches!(ch, '.' | '_' | '-'));
    if !valid_chars {
        return Err(AppError::Validation(format!(
            "{kind} '{value}' must contain only lowercase letters, digits, '.', '_' or '-'"
        )));
    }

    let separator = |ch: char| matches!(ch, '.' | '_' | '-');
    if value.starts_with(separator) || value.ends_with(separator) {
        return Err(AppError::Validation(format!(
            "{kind} '{value}' must not start or end with a separator"
        )));
    }

    if value.split('.').any(str::is_empty) {
        return Err(AppError::Validation(format!(
            "{kind} '{value}' must not contain empty segments"
        )));
    }

    Ok(())
}
