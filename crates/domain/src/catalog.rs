//! System permissions and builtin roles installed by seed data.
//!
//! The catalog is the closed vocabulary mutation paths validate against;
//! deployments extend it at runtime through the permission registry.

use std::collections::BTreeSet;

use crate::permission::{PermissionDefinition, PermissionSlug};
use crate::role::{BuiltinRole, RoleDefinition, RoleSlug};

/// Stable slugs for the system permission catalog.
pub mod slugs {
    /// View device state and sensor history.
    pub const DEVICE_VIEW: &str = "device.view";
    /// Operate device actuators.
    pub const DEVICE_CONTROL: &str = "device.control";
    /// Manage device settings and sharing.
    pub const DEVICE_MANAGE: &str = "device.manage";
    /// View user accounts.
    pub const USER_VIEW: &str = "user.view";
    /// Manage user accounts and their grants.
    pub const USER_MANAGE: &str = "user.manage";
    /// Delete user accounts.
    pub const USER_DELETE: &str = "user.delete";
    /// View alerts.
    pub const ALERT_VIEW: &str = "alert.view";
    /// Manage alert settings.
    pub const ALERT_MANAGE: &str = "alert.manage";
    /// View babysitter profiles.
    pub const BABYSITTER_VIEW: &str = "babysitter.view";
    /// Manage babysitter profiles.
    pub const BABYSITTER_MANAGE: &str = "babysitter.manage";
    /// Manage roles and role grants.
    pub const ROLE_MANAGE: &str = "role.manage";
    /// Manage the permission registry.
    pub const PERMISSION_MANAGE: &str = "permission.manage";
    /// Read the audit log.
    pub const AUDIT_VIEW: &str = "audit.view";
}

/// Device-scoped capability slugs used in relationship subsets.
pub mod capabilities {
    /// Read device state on one device.
    pub const VIEW: &str = "view";
    /// Operate actuators on one device.
    pub const CONTROL: &str = "control";
    /// Manage settings and sharing on one device.
    pub const MANAGE: &str = "manage";
}

struct CatalogEntry {
    slug: &'static str,
    display_name: &'static str,
    description: &'static str,
    group: &'static str,
}

const CATALOG: &[CatalogEntry] = &[
    CatalogEntry {
        slug: slugs::DEVICE_VIEW,
        display_name: "View devices",
        description: "Read cradle state and sensor history for any device.",
        group: "device",
    },
    CatalogEntry {
        slug: slugs::DEVICE_CONTROL,
        display_name: "Control devices",
        description: "Operate rocking, sound and light actuators on any device.",
        group: "device",
    },
    CatalogEntry {
        slug: slugs::DEVICE_MANAGE,
        display_name: "Manage devices",
        description: "Change settings and sharing for any device.",
        group: "device",
    },
    CatalogEntry {
        slug: slugs::USER_VIEW,
        display_name: "View users",
        description: "List and inspect user accounts.",
        group: "user",
    },
    CatalogEntry {
        slug: slugs::USER_MANAGE,
        display_name: "Manage users",
        description: "Edit user accounts, roles and direct grants.",
        group: "user",
    },
    CatalogEntry {
        slug: slugs::USER_DELETE,
        display_name: "Delete users",
        description: "Remove user accounts.",
        group: "user",
    },
    CatalogEntry {
        slug: slugs::ALERT_VIEW,
        display_name: "View alerts",
        description: "Read alerts raised by cradle sensors.",
        group: "alert",
    },
    CatalogEntry {
        slug: slugs::ALERT_MANAGE,
        display_name: "Manage alerts",
        description: "Acknowledge alerts and edit alert settings.",
        group: "alert",
    },
    CatalogEntry {
        slug: slugs::BABYSITTER_VIEW,
        display_name: "View babysitters",
        description: "Read babysitter profiles.",
        group: "babysitter",
    },
    CatalogEntry {
        slug: slugs::BABYSITTER_MANAGE,
        display_name: "Manage babysitters",
        description: "Create and edit babysitter profiles.",
        group: "babysitter",
    },
    CatalogEntry {
        slug: slugs::ROLE_MANAGE,
        display_name: "Manage roles",
        description: "Create roles and change role grants.",
        group: "security",
    },
    CatalogEntry {
        slug: slugs::PERMISSION_MANAGE,
        display_name: "Manage permissions",
        description: "Register and delete permission definitions.",
        group: "security",
    },
    CatalogEntry {
        slug: slugs::AUDIT_VIEW,
        display_name: "View audit log",
        description: "Read the administrative audit trail.",
        group: "security",
    },
];

/// Returns the system permission definitions in catalog order.
#[must_use]
pub fn builtin_permissions() -> Vec<PermissionDefinition> {
    CATALOG
        .iter()
        .map(|entry| PermissionDefinition {
            slug: PermissionSlug::from_static(entry.slug),
            display_name: entry.display_name.to_owned(),
            description: entry.description.to_owned(),
            group: Some(entry.group.to_owned()),
            parent_slug: None,
            is_system: true,
        })
        .collect()
}

/// Returns the default grant slugs for a builtin role.
#[must_use]
pub fn default_role_grants(role: BuiltinRole) -> &'static [&'static str] {
    match role {
        BuiltinRole::Admin => &[
            slugs::DEVICE_VIEW,
            slugs::DEVICE_CONTROL,
            slugs::DEVICE_MANAGE,
            slugs::USER_VIEW,
            slugs::USER_MANAGE,
            slugs::USER_DELETE,
            slugs::ALERT_VIEW,
            slugs::ALERT_MANAGE,
            slugs::BABYSITTER_VIEW,
            slugs::BABYSITTER_MANAGE,
            slugs::ROLE_MANAGE,
            slugs::PERMISSION_MANAGE,
            slugs::AUDIT_VIEW,
        ],
        BuiltinRole::Parent => &[
            slugs::DEVICE_VIEW,
            slugs::DEVICE_CONTROL,
            slugs::ALERT_VIEW,
            slugs::BABYSITTER_VIEW,
            slugs::BABYSITTER_MANAGE,
        ],
        BuiltinRole::Babysitter => &[slugs::DEVICE_VIEW, slugs::ALERT_VIEW],
    }
}

/// Returns the builtin role definitions with their default grants.
#[must_use]
pub fn builtin_roles() -> Vec<RoleDefinition> {
    BuiltinRole::all()
        .iter()
        .map(|role| {
            let permissions: BTreeSet<PermissionSlug> = default_role_grants(*role)
                .iter()
                .map(|slug| PermissionSlug::from_static(slug))
                .collect();

            RoleDefinition {
                slug: role.slug(),
                name: builtin_role_name(*role).to_owned(),
                description: builtin_role_description(*role).to_owned(),
                is_system: true,
                permissions,
            }
        })
        .collect()
}

fn builtin_role_name(role: BuiltinRole) -> &'static str {
    match role {
        BuiltinRole::Admin => "Administrator",
        BuiltinRole::Parent => "Parent",
        BuiltinRole::Babysitter => "Babysitter",
    }
}

fn builtin_role_description(role: BuiltinRole) -> &'static str {
    match role {
        BuiltinRole::Admin => "Full access to devices, users and security settings.",
        BuiltinRole::Parent => "Day-to-day access to owned cradles and family settings.",
        BuiltinRole::Babysitter => "Limited access delegated by a parent.",
    }
}
