use serde::{Deserialize, Serialize};

/// Stable audit actions emitted by administrative use-cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Emitted when a permission is registered.
    PermissionRegistered,
    /// Emitted when a permission is deleted from the registry.
    PermissionDeleted,
    /// Emitted when a custom role is created.
    RoleCreated,
    /// Emitted when a permission is granted to a role.
    RolePermissionGranted,
    /// Emitted when a permission is revoked from a role.
    RolePermissionRevoked,
    /// Emitted when a role is assigned to a user.
    RoleAssigned,
    /// Emitted when a role is removed from a user.
    RoleUnassigned,
    /// Emitted when a permission is granted directly to a user.
    UserPermissionGranted,
    /// Emitted when a direct user permission is revoked.
    UserPermissionRevoked,
    /// Emitted when a device relationship is assigned or replaced.
    DeviceRelationshipAssigned,
    /// Emitted when a device relationship is removed.
    DeviceRelationshipRemoved,
    /// Emitted when a multi-role user is collapsed to one role.
    UserRolesCollapsed,
}

impl AuditAction {
    /// Returns a stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PermissionRegistered => "security.permission.registered",
            Self::PermissionDeleted => "security.permission.deleted",
            Self::RoleCreated => "security.role.created",
            Self::RolePermissionGranted => "security.role.permission_granted",
            Self::RolePermissionRevoked => "security.role.permission_revoked",
            Self::RoleAssigned => "security.role.assigned",
            Self::RoleUnassigned => "security.role.unassigned",
            Self::UserPermissionGranted => "security.user.permission_granted",
            Self::UserPermissionRevoked => "security.user.permission_revoked",
            Self::DeviceRelationshipAssigned => "security.device.relationship_assigned",
            Self::DeviceRelationshipRemoved => "security.device.relationship_removed",
            Self::UserRolesCollapsed => "security.user.roles_collapsed",
        }
    }
}
