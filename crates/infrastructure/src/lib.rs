//! Infrastructure adapters for the Cradleguard application ports.

#![forbid(unsafe_code)]

mod in_memory_security_store;
mod postgres_audit_log_repository;
mod postgres_audit_repository;
mod postgres_device_relationship_repository;
mod postgres_permission_repository;
mod postgres_role_repository;
mod postgres_user_grant_repository;
mod tracing_audit_repository;

pub use in_memory_security_store::InMemorySecurityStore;
pub use postgres_audit_log_repository::PostgresAuditLogRepository;
pub use postgres_audit_repository::PostgresAuditRepository;
pub use postgres_device_relationship_repository::PostgresDeviceRelationshipRepository;
pub use postgres_permission_repository::PostgresPermissionRepository;
pub use postgres_role_repository::PostgresRoleRepository;
pub use postgres_user_grant_repository::PostgresUserGrantRepository;
pub use tracing_audit_repository::TracingAuditRepository;
