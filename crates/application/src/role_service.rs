use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use cradleguard_core::{AppError, AppResult};
use cradleguard_domain::{PermissionSlug, RoleDefinition, RoleSlug};

use crate::permission_registry_service::PermissionRepository;

/// Input payload for creating roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRoleInput {
    /// Unique role slug.
    pub slug: RoleSlug,
    /// Human-readable role name.
    pub name: String,
    /// Description of the role's intent.
    pub description: String,
}

/// Repository port for roles and role grants.
#[async_trait]
pub trait RoleRepository: Send + Sync {
    /// Inserts a new role; fails with a conflict on a duplicate slug.
    async fn insert(&self, role: RoleDefinition) -> AppResult<()>;

    /// Finds a role with its grants by slug.
    async fn find_by_slug(&self, slug: &RoleSlug) -> AppResult<Option<RoleDefinition>>;

    /// Lists all roles with their grants.
    async fn list(&self) -> AppResult<Vec<RoleDefinition>>;

    /// Attaches a grant; attaching an existing grant is a no-op.
    async fn add_grant(&self, role: &RoleSlug, permission: &PermissionSlug) -> AppResult<()>;

    /// Detaches a grant; detaching a missing grant is a no-op.
    async fn remove_grant(&self, role: &RoleSlug, permission: &PermissionSlug) -> AppResult<()>;
}

/// Application service owning roles and their permission sets.
#[derive(Clone)]
pub struct RoleService {
    repository: Arc<dyn RoleRepository>,
    permissions: Arc<dyn PermissionRepository>,
}

impl RoleService {
    /// Creates a new role service from its repositories.
    #[must_use]
    pub fn new(
        repository: Arc<dyn RoleRepository>,
        permissions: Arc<dyn PermissionRepository>,
    ) -> Self {
        Self {
            repository,
            permissions,
        }
    }

    /// Creates a role with an empty permission set.
    pub async fn create_role(&self, input: CreateRoleInput) -> AppResult<RoleDefinition> {
        let role = RoleDefinition {
            slug: input.slug,
            name: input.name,
            description: input.description,
            is_system: false,
            permissions: BTreeSet::new(),
        };

        self.repository.insert(role.clone()).await?;
        Ok(role)
    }

    /// Grants a registered permission to a role. Idempotent.
    pub async fn grant(&self, role: &RoleSlug, permission: &PermissionSlug) -> AppResult<()> {
        self.require_role(role).await?;

        if self.permissions.find_by_slug(permission).await?.is_none() {
            return Err(AppError::NotFound(format!(
                "permission '{permission}' is not registered"
            )));
        }

        self.repository.add_grant(role, permission).await
    }

    /// Revokes a permission from a role. Revoking an absent grant is a no-op.
    pub async fn revoke(&self, role: &RoleSlug, permission: &PermissionSlug) -> AppResult<()> {
        self.require_role(role).await?;
        self.repository.remove_grant(role, permission).await
    }

    /// Returns whether the role currently grants the permission.
    ///
    /// An unknown role or slug is simply `false`; read-side checks never
    /// fail for absent data.
    pub async fn has_permission(&self, role: &RoleSlug, permission: &str) -> AppResult<bool> {
        Ok(self
            .repository
            .find_by_slug(role)
            .await?
            .is_some_and(|definition| definition.has_permission(permission)))
    }

    /// Returns the permission set granted through a role.
    pub async fn permissions_of(&self, role: &RoleSlug) -> AppResult<BTreeSet<PermissionSlug>> {
        Ok(self.require_role(role).await?.permissions)
    }

    /// Finds a role with its grants.
    pub async fn find_role(&self, role: &RoleSlug) -> AppResult<RoleDefinition> {
        self.require_role(role).await
    }

    /// Lists all roles with their grants.
    pub async fn list_roles(&self) -> AppResult<Vec<RoleDefinition>> {
        self.repository.list().await
    }

    async fn require_role(&self, role: &RoleSlug) -> AppResult<RoleDefinition> {
        self.repository
            .find_by_slug(role)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("role '{role}' does not exist")))
    }
}
