//! Application services and ports for the Cradleguard authorization core.

#![forbid(unsafe_code)]

mod audit;
mod authorization_service;
mod device_relationship_service;
mod permission_registry_service;
mod role_service;
mod security_admin_service;
mod seed;

pub use audit::{AuditEvent, AuditLogEntry, AuditLogQuery, AuditLogRepository, AuditRepository};
pub use authorization_service::{AuthorizationService, EffectivePermissions, UserGrantRepository};
pub use device_relationship_service::{DeviceRelationshipRepository, DeviceRelationshipService};
pub use permission_registry_service::{
    PermissionRegistryService, PermissionRepository, RegisterPermissionInput,
};
pub use role_service::{CreateRoleInput, RoleRepository, RoleService};
pub use security_admin_service::SecurityAdminService;
pub use seed::install_builtin_catalog;
