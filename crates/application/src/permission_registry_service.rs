use std::sync::Arc;

use async_trait::async_trait;
use cradleguard_core::{AppError, AppResult};
use cradleguard_domain::{PermissionDefinition, PermissionSlug};

/// Input payload for registering a permission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterPermissionInput {
    /// Globally unique slug.
    pub slug: PermissionSlug,
    /// Human-readable name.
    pub display_name: String,
    /// Description of what the permission allows.
    pub description: String,
    /// Optional group tag.
    pub group: Option<String>,
    /// Optional parent permission for grouping; must already be registered.
    pub parent_slug: Option<PermissionSlug>,
    /// Marks a system permission that cannot be deleted.
    pub is_system: bool,
}

/// Repository port for the permission catalog.
#[async_trait]
pub trait PermissionRepository: Send + Sync {
    /// Inserts a new definition; fails with a conflict on a duplicate slug.
    async fn insert(&self, definition: PermissionDefinition) -> AppResult<()>;

    /// Finds a definition by slug.
    async fn find_by_slug(&self, slug: &PermissionSlug)
    -> AppResult<Option<PermissionDefinition>>;

    /// Removes a definition by slug.
    async fn delete(&self, slug: &PermissionSlug) -> AppResult<()>;

    /// Lists definitions in a group in registration order.
    async fn list_by_group(&self, group: &str) -> AppResult<Vec<PermissionDefinition>>;

    /// Returns whether any role grant, user grant or child definition still
    /// references the slug.
    async fn is_referenced(&self, slug: &PermissionSlug) -> AppResult<bool>;
}

/// Application service owning the permission catalog.
#[derive(Clone)]
pub struct PermissionRegistryService {
    repository: Arc<dyn PermissionRepository>,
}

impl PermissionRegistryService {
    /// Creates a new registry service from a repository implementation.
    #[must_use]
    pub fn new(repository: Arc<dyn PermissionRepository>) -> Self {
        Self { repository }
    }

    /// Registers a permission definition.
    ///
    /// A declared parent must already exist; duplicate slugs are rejected by
    /// the repository so concurrent registrations cannot both succeed.
    pub async fn register(
        &self,
        input: RegisterPermissionInput,
    ) -> AppResult<PermissionDefinition> {
        if let Some(parent_slug) = &input.parent_slug {
            self.require_definition(parent_slug).await?;
        }

        let definition = PermissionDefinition {
            slug: input.slug,
            display_name: input.display_name,
            description: input.description,
            group: input.group,
            parent_slug: input.parent_slug,
            is_system: input.is_system,
        };

        self.repository.insert(definition.clone()).await?;
        Ok(definition)
    }

    /// Finds a registered permission by slug.
    pub async fn find(&self, slug: &PermissionSlug) -> AppResult<PermissionDefinition> {
        self.require_definition(slug).await
    }

    /// Deletes a permission that is neither system-flagged nor referenced.
    ///
    /// Detaching existing role and user grants is the caller's
    /// responsibility; the registry never cascades.
    pub async fn delete(&self, slug: &PermissionSlug) -> AppResult<()> {
        let definition = self.require_definition(slug).await?;

        if definition.is_system {
            return Err(AppError::Forbidden(format!(
                "permission '{slug}' is system-managed and cannot be deleted"
            )));
        }

        if self.repository.is_referenced(slug).await? {
            return Err(AppError::Conflict(format!(
                "permission '{slug}' is still referenced by a role, user or child permission"
            )));
        }

        self.repository.delete(slug).await
    }

    /// Lists registered permissions in a group in registration order.
    pub async fn list_by_group(&self, group: &str) -> AppResult<Vec<PermissionDefinition>> {
        self.repository.list_by_group(group).await
    }

    async fn require_definition(&self, slug: &PermissionSlug) -> AppResult<PermissionDefinition> {
        self.repository
            .find_by_slug(slug)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("permission '{slug}' is not registered")))
    }
}
