//! Domain entities and invariants for the Cradleguard authorization core.

#![forbid(unsafe_code)]

mod access;
mod device;
mod permission;
mod role;
mod security;

/// Builtin permission and role catalog installed by seed data.
pub mod catalog;

pub use access::{AccessDecision, ActionTarget, DenyReason};
pub use device::{DeviceId, DeviceRelationship, RelationshipType};
pub use permission::{PermissionDefinition, PermissionSlug};
pub use role::{BuiltinRole, RoleDefinition, RoleSlug};
pub use security::AuditAction;
