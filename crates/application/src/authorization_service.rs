use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use cradleguard_core::{AppError, AppResult, UserId, UserIdentity};
use cradleguard_domain::{
    AccessDecision, ActionTarget, BuiltinRole, DenyReason, PermissionSlug, RoleSlug, catalog,
};

use crate::device_relationship_service::DeviceRelationshipService;

/// Effective permission set resolved for one user.
///
/// Derived, never stored: the union of every held role's grants and the
/// user's direct grants. Its lifetime is bounded to a single request or
/// action evaluation so a revocation is visible to the next request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectivePermissions {
    slugs: BTreeSet<PermissionSlug>,
}

impl EffectivePermissions {
    /// Builds the set from role-derived and direct grants.
    #[must_use]
    pub fn from_grants(
        role_permissions: Vec<PermissionSlug>,
        direct_permissions: Vec<PermissionSlug>,
    ) -> Self {
        let slugs = role_permissions
            .into_iter()
            .chain(direct_permissions)
            .collect();

        Self { slugs }
    }

    /// Returns whether the set contains the slug. Unknown slugs are absent,
    /// never an error.
    #[must_use]
    pub fn contains(&self, slug: &str) -> bool {
        self.slugs.contains(slug)
    }

    /// Returns whether the set contains at least one of the slugs.
    #[must_use]
    pub fn contains_any(&self, slugs: &[&str]) -> bool {
        slugs.iter().any(|slug| self.contains(slug))
    }

    /// Returns whether the set contains every one of the slugs.
    #[must_use]
    pub fn contains_all(&self, slugs: &[&str]) -> bool {
        slugs.iter().all(|slug| self.contains(slug))
    }

    /// Returns the resolved slugs.
    #[must_use]
    pub fn slugs(&self) -> &BTreeSet<PermissionSlug> {
        &self.slugs
    }
}

/// Repository port for user grant lookups and mutations.
#[async_trait]
pub trait UserGrantRepository: Send + Sync {
    /// Lists permissions granted through every role the user holds.
    async fn list_role_permissions(&self, user_id: UserId) -> AppResult<Vec<PermissionSlug>>;

    /// Lists permissions granted directly to the user.
    async fn list_direct_permissions(&self, user_id: UserId) -> AppResult<Vec<PermissionSlug>>;

    /// Lists the roles the user holds.
    async fn list_roles_for_user(&self, user_id: UserId) -> AppResult<Vec<RoleSlug>>;

    /// Counts users currently holding the role.
    async fn count_users_with_role(&self, role: &RoleSlug) -> AppResult<u64>;

    /// Attaches a role to a user; attaching an existing assignment is a
    /// no-op.
    async fn assign_role(&self, user_id: UserId, role: &RoleSlug) -> AppResult<()>;

    /// Detaches a role from a user; detaching a missing assignment is a
    /// no-op.
    async fn remove_role(&self, user_id: UserId, role: &RoleSlug) -> AppResult<()>;

    /// Attaches a direct permission grant; idempotent.
    async fn grant_permission(&self, user_id: UserId, slug: &PermissionSlug) -> AppResult<()>;

    /// Detaches a direct permission grant; idempotent.
    async fn revoke_permission(&self, user_id: UserId, slug: &PermissionSlug) -> AppResult<()>;
}

/// Application service answering every authorization question.
///
/// Combines the user grant resolver with device relationship lookups into a
/// single decision per inbound action. Grant sources compose with a logical
/// OR: a global grant authorizes the action on any device, and a
/// device-scoped capability authorizes it on that device alone.
#[derive(Clone)]
pub struct AuthorizationService {
    grants: Arc<dyn UserGrantRepository>,
    relationships: DeviceRelationshipService,
}

impl AuthorizationService {
    /// Creates a new authorization service from its dependencies.
    #[must_use]
    pub fn new(
        grants: Arc<dyn UserGrantRepository>,
        relationships: DeviceRelationshipService,
    ) -> Self {
        Self {
            grants,
            relationships,
        }
    }

    /// Resolves the user's effective permission set.
    ///
    /// Unions the grants of every role the user holds with their direct
    /// grants. A user with no roles resolves to direct grants only; a user
    /// with several roles resolves to the union, never to a single
    /// highest-priority role.
    pub async fn effective_permissions(&self, user_id: UserId) -> AppResult<EffectivePermissions> {
        let role_permissions = self.grants.list_role_permissions(user_id).await?;
        let direct_permissions = self.grants.list_direct_permissions(user_id).await?;

        Ok(EffectivePermissions::from_grants(
            role_permissions,
            direct_permissions,
        ))
    }

    /// Returns whether the user currently holds the permission globally.
    pub async fn has_permission(&self, user_id: UserId, slug: &str) -> AppResult<bool> {
        Ok(self.effective_permissions(user_id).await?.contains(slug))
    }

    /// Returns whether the user holds at least one of the permissions.
    pub async fn has_any_permission(&self, user_id: UserId, slugs: &[&str]) -> AppResult<bool> {
        Ok(self
            .effective_permissions(user_id)
            .await?
            .contains_any(slugs))
    }

    /// Returns whether the user holds every one of the permissions.
    pub async fn has_all_permissions(&self, user_id: UserId, slugs: &[&str]) -> AppResult<bool> {
        Ok(self
            .effective_permissions(user_id)
            .await?
            .contains_all(slugs))
    }

    /// Evaluates whether the user may perform the action on the target.
    ///
    /// The effective permission set is resolved once per evaluation; absent
    /// grants produce a deny decision, never an error.
    pub async fn authorize(
        &self,
        actor: &UserIdentity,
        action: &str,
        target: Option<&ActionTarget>,
    ) -> AppResult<AccessDecision> {
        if let Some(ActionTarget::UserAccount(target_user)) = target
            && action == catalog::slugs::USER_DELETE
            && self.is_last_admin(*target_user).await?
        {
            return Ok(AccessDecision::Deny(DenyReason::LastAdminProtected));
        }

        let effective = self.effective_permissions(actor.user_id()).await?;

        match target {
            None => {
                if effective.contains(action) {
                    Ok(AccessDecision::Allow)
                } else {
                    Ok(AccessDecision::Deny(DenyReason::MissingPermission))
                }
            }
            Some(ActionTarget::Device(device_id)) => {
                if effective.contains(action) {
                    return Ok(AccessDecision::Allow);
                }

                if self
                    .relationships
                    .has_capability(*device_id, actor.user_id(), action)
                    .await?
                {
                    return Ok(AccessDecision::Allow);
                }

                Ok(AccessDecision::Deny(DenyReason::MissingPermission))
            }
            Some(ActionTarget::OwnedResource { owner_id }) => {
                Ok(Self::decide_owned(actor, *owner_id, action, &effective))
            }
            Some(ActionTarget::UserAccount(target_user)) => {
                // A user account is a resource owned by that user.
                Ok(Self::decide_owned(actor, *target_user, action, &effective))
            }
        }
    }

    /// Ensures the user may perform the action, mapping a deny decision to
    /// a forbidden error for callers that cannot carry a decision value.
    pub async fn require(
        &self,
        actor: &UserIdentity,
        action: &str,
        target: Option<&ActionTarget>,
    ) -> AppResult<()> {
        match self.authorize(actor, action, target).await? {
            AccessDecision::Allow => Ok(()),
            AccessDecision::Deny(reason) => Err(AppError::Forbidden(format!(
                "user '{}' is denied action '{action}': {}",
                actor.user_id(),
                reason.as_str()
            ))),
        }
    }

    fn decide_owned(
        actor: &UserIdentity,
        owner_id: UserId,
        action: &str,
        effective: &EffectivePermissions,
    ) -> AccessDecision {
        if actor.user_id() == owner_id || effective.contains(action) {
            AccessDecision::Allow
        } else {
            AccessDecision::Deny(DenyReason::NotOwnerOrPermission)
        }
    }

    async fn is_last_admin(&self, target_user: UserId) -> AppResult<bool> {
        let admin = BuiltinRole::Admin.slug();
        let target_roles = self.grants.list_roles_for_user(target_user).await?;

        if !target_roles.contains(&admin) {
            return Ok(false);
        }

        Ok(self.grants.count_users_with_role(&admin).await? <= 1)
    }
}

#[cfg(test)]
mod tests;
