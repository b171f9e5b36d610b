use cradleguard_core::UserId;
use serde::{Deserialize, Serialize};

use crate::device::DeviceId;

/// Machine-readable reason attached to a denied decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// Neither a global grant nor a device-scoped capability matched.
    MissingPermission,
    /// The actor neither owns the resource nor holds an overriding grant.
    NotOwnerOrPermission,
    /// Refusal to remove the last remaining admin-role user.
    LastAdminProtected,
}

impl DenyReason {
    /// Returns a stable wire value for this reason.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingPermission => "missing_permission",
            Self::NotOwnerOrPermission => "not_owner_or_permission",
            Self::LastAdminProtected => "last_admin_protected",
        }
    }
}

/// Outcome of a single authorization evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    /// At least one grant source allows the action.
    Allow,
    /// No grant source allows the action.
    Deny(DenyReason),
}

impl AccessDecision {
    /// Returns whether the decision allows the action.
    #[must_use]
    pub fn is_allow(&self) -> bool {
        matches!(self, Self::Allow)
    }

    /// Returns the deny reason, if the decision denies the action.
    #[must_use]
    pub fn deny_reason(&self) -> Option<DenyReason> {
        match self {
            Self::Allow => None,
            Self::Deny(reason) => Some(*reason),
        }
    }
}

/// Optional target of an action evaluated by the decision engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionTarget {
    /// A device; device-scoped capabilities apply in addition to
    /// global grants.
    Device(DeviceId),
    /// A non-device resource owned by a user, such as an alert or a
    /// babysitter profile.
    OwnedResource {
        /// Owner of the targeted resource.
        owner_id: UserId,
    },
    /// Another user's account, targeted by administrative actions.
    UserAccount(UserId),
}
