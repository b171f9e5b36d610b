use std::borrow::Borrow;
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

use cradleguard_core::AppResult;
use serde::{Deserialize, Serialize};

use crate::permission::{PermissionSlug, validate_slug};

/// A validated role slug such as `parent` or `night_nurse`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoleSlug(String);

impl RoleSlug {
    /// Creates a validated role slug using the shared slug rules.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        validate_slug(value.as_str(), "role slug")?;
        Ok(Self(value))
    }

    pub(crate) fn from_static(value: &'static str) -> Self {
        Self(value.to_owned())
    }

    /// Returns the underlying slug string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Borrow<str> for RoleSlug {
    fn borrow(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for RoleSlug {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

impl From<RoleSlug> for String {
    fn from(value: RoleSlug) -> Self {
        value.0
    }
}

/// A named role and its granted permission set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDefinition {
    /// Unique role slug.
    pub slug: RoleSlug,
    /// Human-readable role name.
    pub name: String,
    /// Description of the role's intent.
    pub description: String,
    /// Indicates a system-managed role installed by seed data.
    pub is_system: bool,
    /// Permissions granted through this role, order-irrelevant.
    pub permissions: BTreeSet<PermissionSlug>,
}

impl RoleDefinition {
    /// Returns whether the role grants the permission.
    #[must_use]
    pub fn has_permission(&self, slug: &str) -> bool {
        self.permissions.contains(slug)
    }
}

/// The three roles every deployment starts with.
///
/// Priority only matters for the role-collapse maintenance operation; live
/// authorization unions the permissions of every role a user holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuiltinRole {
    /// Full administrative access.
    Admin,
    /// A cradle owner's day-to-day access.
    Parent,
    /// Limited access delegated by a parent.
    Babysitter,
}

impl BuiltinRole {
    /// Returns a stable storage value for this role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Parent => "parent",
            Self::Babysitter => "babysitter",
        }
    }

    /// Returns the role slug for this builtin role.
    #[must_use]
    pub fn slug(&self) -> RoleSlug {
        RoleSlug::from_static(self.as_str())
    }

    /// Returns all builtin roles.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[BuiltinRole] = &[
            BuiltinRole::Admin,
            BuiltinRole::Parent,
            BuiltinRole::Babysitter,
        ];

        ALL
    }

    /// Parses a storage value into a builtin role, if it matches one.
    #[must_use]
    pub fn from_slug(value: &str) -> Option<Self> {
        match value {
            "admin" => Some(Self::Admin),
            "parent" => Some(Self::Parent),
            "babysitter" => Some(Self::Babysitter),
            _ => None,
        }
    }

    /// Collapse priority; higher wins. Custom roles rank at zero.
    #[must_use]
    pub fn priority(&self) -> u8 {
        match self {
            Self::Admin => 3,
            Self::Parent => 2,
            Self::Babysitter => 1,
        }
    }
}
