use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use cradleguard_core::{AppError, AppResult, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::permission::PermissionSlug;

/// Unique identifier for a cradle device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceId(Uuid);

impl DeviceId {
    /// Creates a random device identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a device identifier from an existing UUID value.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for DeviceId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for DeviceId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Category of a user's association with a device.
///
/// A device has at most one owner at any time; assigning a new owner
/// replaces the previous owner relationship atomically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipType {
    /// The single accountable owner of the device.
    Owner,
    /// A trusted adult with broad day-to-day access.
    Caretaker,
    /// Read-only access to the device.
    Viewer,
    /// Delegated, typically time-limited access.
    Babysitter,
}

impl RelationshipType {
    /// Returns a stable storage value for this relationship type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Caretaker => "caretaker",
            Self::Viewer => "viewer",
            Self::Babysitter => "babysitter",
        }
    }

    /// Returns all relationship types.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[RelationshipType] = &[
            RelationshipType::Owner,
            RelationshipType::Caretaker,
            RelationshipType::Viewer,
            RelationshipType::Babysitter,
        ];

        ALL
    }
}

impl FromStr for RelationshipType {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "owner" => Ok(Self::Owner),
            "caretaker" => Ok(Self::Caretaker),
            "viewer" => Ok(Self::Viewer),
            "babysitter" => Ok(Self::Babysitter),
            _ => Err(AppError::Validation(format!(
                "unknown relationship type '{value}'"
            ))),
        }
    }
}

/// A user's relationship to one device and the capabilities scoped to it.
///
/// The capability subset is independent of the user's global permissions:
/// it can authorize device-scoped actions on its own and a global grant
/// never widens it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRelationship {
    /// User holding the relationship.
    pub user_id: UserId,
    /// Relationship category.
    pub relationship_type: RelationshipType,
    /// Capability slugs granted on this device only.
    pub capabilities: BTreeSet<PermissionSlug>,
}

impl DeviceRelationship {
    /// Returns whether the relationship grants the capability on its device.
    #[must_use]
    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.contains(capability)
    }
}
