use std::collections::BTreeSet;
use std::sync::Arc;

use cradleguard_core::{AppResult, UserId, UserIdentity};
use cradleguard_domain::{
    AuditAction, BuiltinRole, DeviceId, DeviceRelationship, PermissionDefinition, PermissionSlug,
    RelationshipType, RoleDefinition, RoleSlug, catalog,
};

use crate::audit::{AuditEvent, AuditLogEntry, AuditLogQuery, AuditLogRepository, AuditRepository};
use crate::authorization_service::{AuthorizationService, UserGrantRepository};
use crate::device_relationship_service::DeviceRelationshipService;
use crate::permission_registry_service::{PermissionRegistryService, RegisterPermissionInput};
use crate::role_service::{CreateRoleInput, RoleService};

/// Application service for security administration workflows.
///
/// Every operation authorizes the acting identity against the relevant
/// manage permission before touching state, and appends an audit event for
/// each mutation.
#[derive(Clone)]
pub struct SecurityAdminService {
    authorization: AuthorizationService,
    registry: PermissionRegistryService,
    roles: RoleService,
    relationships: DeviceRelationshipService,
    user_grants: Arc<dyn UserGrantRepository>,
    audit_log_repository: Arc<dyn AuditLogRepository>,
    audit_repository: Arc<dyn AuditRepository>,
}

impl SecurityAdminService {
    /// Creates a new service from required dependencies.
    #[must_use]
    pub fn new(
        authorization: AuthorizationService,
        registry: PermissionRegistryService,
        roles: RoleService,
        relationships: DeviceRelationshipService,
        user_grants: Arc<dyn UserGrantRepository>,
        audit_log_repository: Arc<dyn AuditLogRepository>,
        audit_repository: Arc<dyn AuditRepository>,
    ) -> Self {
        Self {
            authorization,
            registry,
            roles,
            relationships,
            user_grants,
            audit_log_repository,
            audit_repository,
        }
    }

    /// Registers a permission and emits an audit event.
    pub async fn register_permission(
        &self,
        actor: &UserIdentity,
        input: RegisterPermissionInput,
    ) -> AppResult<PermissionDefinition> {
        self.authorization
            .require(actor, catalog::slugs::PERMISSION_MANAGE, None)
            .await?;

        let definition = self.registry.register(input).await?;

        self.append_event(
            actor,
            AuditAction::PermissionRegistered,
            "permission",
            definition.slug.as_str(),
            Some(format!("registered permission '{}'", definition.slug)),
        )
        .await?;

        Ok(definition)
    }

    /// Deletes a non-system, unreferenced permission and emits an audit
    /// event.
    pub async fn delete_permission(
        &self,
        actor: &UserIdentity,
        slug: &PermissionSlug,
    ) -> AppResult<()> {
        self.authorization
            .require(actor, catalog::slugs::PERMISSION_MANAGE, None)
            .await?;

        self.registry.delete(slug).await?;

        self.append_event(
            actor,
            AuditAction::PermissionDeleted,
            "permission",
            slug.as_str(),
            Some(format!("deleted permission '{slug}'")),
        )
        .await
    }

    /// Lists registered permissions in a group for administrative users.
    pub async fn list_permissions_by_group(
        &self,
        actor: &UserIdentity,
        group: &str,
    ) -> AppResult<Vec<PermissionDefinition>> {
        self.authorization
            .require(actor, catalog::slugs::PERMISSION_MANAGE, None)
            .await?;

        self.registry.list_by_group(group).await
    }

    /// Creates a custom role and emits an audit event.
    pub async fn create_role(
        &self,
        actor: &UserIdentity,
        input: CreateRoleInput,
    ) -> AppResult<RoleDefinition> {
        self.authorization
            .require(actor, catalog::slugs::ROLE_MANAGE, None)
            .await?;

        let role = self.roles.create_role(input).await?;

        self.append_event(
            actor,
            AuditAction::RoleCreated,
            "role",
            role.slug.as_str(),
            Some(format!("created role '{}'", role.slug)),
        )
        .await?;

        Ok(role)
    }

    /// Grants a permission to a role and emits an audit event.
    pub async fn grant_role_permission(
        &self,
        actor: &UserIdentity,
        role: &RoleSlug,
        permission: &PermissionSlug,
    ) -> AppResult<()> {
        self.authorization
            .require(actor, catalog::slugs::ROLE_MANAGE, None)
            .await?;

        self.roles.grant(role, permission).await?;

        self.append_event(
            actor,
            AuditAction::RolePermissionGranted,
            "role_grant",
            &format!("{role}:{permission}"),
            Some(format!("granted '{permission}' to role '{role}'")),
        )
        .await
    }

    /// Revokes a permission from a role and emits an audit event.
    pub async fn revoke_role_permission(
        &self,
        actor: &UserIdentity,
        role: &RoleSlug,
        permission: &PermissionSlug,
    ) -> AppResult<()> {
        self.authorization
            .require(actor, catalog::slugs::ROLE_MANAGE, None)
            .await?;

        self.roles.revoke(role, permission).await?;

        self.append_event(
            actor,
            AuditAction::RolePermissionRevoked,
            "role_grant",
            &format!("{role}:{permission}"),
            Some(format!("revoked '{permission}' from role '{role}'")),
        )
        .await
    }

    /// Returns all roles for administrative users.
    pub async fn list_roles(&self, actor: &UserIdentity) -> AppResult<Vec<RoleDefinition>> {
        self.authorization
            .require(actor, catalog::slugs::ROLE_MANAGE, None)
            .await?;

        self.roles.list_roles().await
    }

    /// Assigns a role to a user and emits an audit event.
    pub async fn assign_role(
        &self,
        actor: &UserIdentity,
        user_id: UserId,
        role: &RoleSlug,
    ) -> AppResult<()> {
        self.authorization
            .require(actor, catalog::slugs::USER_MANAGE, None)
            .await?;

        self.roles.find_role(role).await?;
        self.user_grants.assign_role(user_id, role).await?;

        self.append_event(
            actor,
            AuditAction::RoleAssigned,
            "user_role",
            &format!("{user_id}:{role}"),
            Some(format!("assigned role '{role}' to user '{user_id}'")),
        )
        .await
    }

    /// Removes a role from a user and emits an audit event.
    pub async fn unassign_role(
        &self,
        actor: &UserIdentity,
        user_id: UserId,
        role: &RoleSlug,
    ) -> AppResult<()> {
        self.authorization
            .require(actor, catalog::slugs::USER_MANAGE, None)
            .await?;

        self.user_grants.remove_role(user_id, role).await?;

        self.append_event(
            actor,
            AuditAction::RoleUnassigned,
            "user_role",
            &format!("{user_id}:{role}"),
            Some(format!("removed role '{role}' from user '{user_id}'")),
        )
        .await
    }

    /// Grants a registered permission directly to a user and emits an audit
    /// event.
    pub async fn grant_user_permission(
        &self,
        actor: &UserIdentity,
        user_id: UserId,
        permission: &PermissionSlug,
    ) -> AppResult<()> {
        self.authorization
            .require(actor, catalog::slugs::USER_MANAGE, None)
            .await?;

        self.registry.find(permission).await?;
        self.user_grants.grant_permission(user_id, permission).await?;

        self.append_event(
            actor,
            AuditAction::UserPermissionGranted,
            "user_grant",
            &format!("{user_id}:{permission}"),
            Some(format!(
                "granted '{permission}' directly to user '{user_id}'"
            )),
        )
        .await
    }

    /// Revokes a direct permission from a user and emits an audit event.
    pub async fn revoke_user_permission(
        &self,
        actor: &UserIdentity,
        user_id: UserId,
        permission: &PermissionSlug,
    ) -> AppResult<()> {
        self.authorization
            .require(actor, catalog::slugs::USER_MANAGE, None)
            .await?;

        self.user_grants
            .revoke_permission(user_id, permission)
            .await?;

        self.append_event(
            actor,
            AuditAction::UserPermissionRevoked,
            "user_grant",
            &format!("{user_id}:{permission}"),
            Some(format!(
                "revoked direct '{permission}' from user '{user_id}'"
            )),
        )
        .await
    }

    /// Collapses a multi-role user to their single highest-priority role.
    ///
    /// Maintenance operation, not part of live authorization: the resolver
    /// always unions every held role. Builtin roles rank admin > parent >
    /// babysitter; custom roles rank below builtin ones, ties broken by slug
    /// order. Returns the kept role, if the user held any.
    pub async fn collapse_user_roles(
        &self,
        actor: &UserIdentity,
        user_id: UserId,
    ) -> AppResult<Option<RoleSlug>> {
        self.authorization
            .require(actor, catalog::slugs::USER_MANAGE, None)
            .await?;

        let mut roles = self.user_grants.list_roles_for_user(user_id).await?;
        if roles.len() <= 1 {
            return Ok(roles.pop());
        }

        roles.sort_by(|left, right| {
            let left_priority = collapse_priority(left);
            let right_priority = collapse_priority(right);
            right_priority
                .cmp(&left_priority)
                .then_with(|| left.cmp(right))
        });

        let kept = roles.remove(0);
        for removed in &roles {
            self.user_grants.remove_role(user_id, removed).await?;
        }

        let removed_list = roles
            .iter()
            .map(RoleSlug::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        self.append_event(
            actor,
            AuditAction::UserRolesCollapsed,
            "user_role",
            &format!("{user_id}:{kept}"),
            Some(format!(
                "collapsed user '{user_id}' to role '{kept}', removed [{removed_list}]"
            )),
        )
        .await?;

        Ok(Some(kept))
    }

    /// Assigns or replaces a device relationship and emits an audit event.
    pub async fn assign_device_relationship(
        &self,
        actor: &UserIdentity,
        device_id: DeviceId,
        user_id: UserId,
        relationship_type: RelationshipType,
        capabilities: BTreeSet<PermissionSlug>,
    ) -> AppResult<DeviceRelationship> {
        self.authorization
            .require(actor, catalog::slugs::DEVICE_MANAGE, None)
            .await?;

        let relationship = self
            .relationships
            .assign(device_id, user_id, relationship_type, capabilities)
            .await?;

        self.append_event(
            actor,
            AuditAction::DeviceRelationshipAssigned,
            "device_relationship",
            &format!("{device_id}:{user_id}"),
            Some(format!(
                "assigned '{}' on device '{device_id}' to user '{user_id}'",
                relationship.relationship_type.as_str()
            )),
        )
        .await?;

        Ok(relationship)
    }

    /// Removes a device relationship and emits an audit event.
    pub async fn remove_device_relationship(
        &self,
        actor: &UserIdentity,
        device_id: DeviceId,
        user_id: UserId,
    ) -> AppResult<()> {
        self.authorization
            .require(actor, catalog::slugs::DEVICE_MANAGE, None)
            .await?;

        self.relationships.unassign(device_id, user_id).await?;

        self.append_event(
            actor,
            AuditAction::DeviceRelationshipRemoved,
            "device_relationship",
            &format!("{device_id}:{user_id}"),
            Some(format!(
                "removed relationship on device '{device_id}' for user '{user_id}'"
            )),
        )
        .await
    }

    /// Returns recent audit entries.
    pub async fn list_audit_log(
        &self,
        actor: &UserIdentity,
        query: AuditLogQuery,
    ) -> AppResult<Vec<AuditLogEntry>> {
        self.authorization
            .require(actor, catalog::slugs::AUDIT_VIEW, None)
            .await?;

        self.audit_log_repository.list_recent_entries(query).await
    }

    async fn append_event(
        &self,
        actor: &UserIdentity,
        action: AuditAction,
        resource_type: &str,
        resource_id: &str,
        detail: Option<String>,
    ) -> AppResult<()> {
        self.audit_repository
            .append_event(AuditEvent {
                subject: actor.user_id().to_string(),
                action,
                resource_type: resource_type.to_owned(),
                resource_id: resource_id.to_owned(),
                detail,
            })
            .await
    }
}

fn collapse_priority(role: &RoleSlug) -> u8 {
    BuiltinRole::from_slug(role.as_str())
        .map(|builtin| builtin.priority())
        .unwrap_or(0)
}
