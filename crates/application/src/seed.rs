use std::collections::BTreeSet;
use std::sync::Arc;

use cradleguard_core::AppResult;
use cradleguard_domain::catalog;

use crate::permission_registry_service::PermissionRepository;
use crate::role_service::RoleRepository;

/// Installs the builtin permission catalog and roles.
///
/// Idempotent: existing definitions are left untouched and missing default
/// grants are topped up, so the installer can run on every startup and
/// after catalog upgrades.
pub async fn install_builtin_catalog(
    permissions: Arc<dyn PermissionRepository>,
    roles: Arc<dyn RoleRepository>,
) -> AppResult<()> {
    for definition in catalog::builtin_permissions() {
        if permissions.find_by_slug(&definition.slug).await?.is_none() {
            permissions.insert(definition).await?;
        }
    }

    for role in catalog::builtin_roles() {
        if roles.find_by_slug(&role.slug).await?.is_none() {
            let mut shell = role.clone();
            shell.permissions = BTreeSet::new();
            roles.insert(shell).await?;
        }

        for permission in &role.permissions {
            roles.add_grant(&role.slug, permission).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use cradleguard_core::{AppError, AppResult};
    use cradleguard_domain::{BuiltinRole, PermissionDefinition, PermissionSlug, RoleDefinition, RoleSlug};
    use tokio::sync::Mutex;

    use super::install_builtin_catalog;
    use crate::permission_registry_service::PermissionRepository;
    use crate::role_service::RoleRepository;

    #[derive(Default)]
    struct FakePermissionRepository {
        definitions: Mutex<Vec<PermissionDefinition>>,
    }

    #[async_trait]
    impl PermissionRepository for FakePermissionRepository {
        async fn insert(&self, definition: PermissionDefinition) -> AppResult<()> {
            let mut definitions = self.definitions.lock().await;
            if definitions.iter().any(|stored| stored.slug == definition.slug) {
                return Err(AppError::Conflict(format!(
                    "permission '{}' already exists",
                    definition.slug
                )));
            }
            definitions.push(definition);
            Ok(())
        }

        async fn find_by_slug(
            &self,
            slug: &PermissionSlug,
        ) -> AppResult<Option<PermissionDefinition>> {
            Ok(self
                .definitions
                .lock()
                .await
                .iter()
                .find(|stored| &stored.slug == slug)
                .cloned())
        }

        async fn delete(&self, slug: &PermissionSlug) -> AppResult<()> {
            self.definitions
                .lock()
                .await
                .retain(|stored| &stored.slug != slug);
            Ok(())
        }

        async fn list_by_group(&self, group: &str) -> AppResult<Vec<PermissionDefinition>> {
            Ok(self
                .definitions
                .lock()
                .await
                .iter()
                .filter(|stored| stored.group.as_deref() == Some(group))
                .cloned()
                .collect())
        }

        async fn is_referenced(&self, _slug: &PermissionSlug) -> AppResult<bool> {
            Ok(false)
        }
    }

    #[derive(Default)]
    struct FakeRoleRepository {
        roles: Mutex<Vec<RoleDefinition>>,
    }

    #[async_trait]
    impl RoleRepository for FakeRoleRepository {
        async fn insert(&self, role: RoleDefinition) -> AppResult<()> {
            let mut roles = self.roles.lock().await;
            if roles.iter().any(|stored| stored.slug == role.slug) {
                return Err(AppError::Conflict(format!(
                    "role '{}' already exists",
                    role.slug
                )));
            }
            roles.push(role);
            Ok(())
        }

        async fn find_by_slug(&self, slug: &RoleSlug) -> AppResult<Option<RoleDefinition>> {
            Ok(self
                .roles
                .lock()
                .await
                .iter()
                .find(|stored| &stored.slug == slug)
                .cloned())
        }

        async fn list(&self) -> AppResult<Vec<RoleDefinition>> {
            Ok(self.roles.lock().await.clone())
        }

        async fn add_grant(&self, role: &RoleSlug, permission: &PermissionSlug) -> AppResult<()> {
            let mut roles = self.roles.lock().await;
            if let Some(stored) = roles.iter_mut().find(|stored| &stored.slug == role) {
                stored.permissions.insert(permission.clone());
            }
            Ok(())
        }

        async fn remove_grant(
            &self,
            role: &RoleSlug,
            permission: &PermissionSlug,
        ) -> AppResult<()> {
            let mut roles = self.roles.lock().await;
            if let Some(stored) = roles.iter_mut().find(|stored| &stored.slug == role) {
                stored.permissions.remove(permission);
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn install_creates_catalog_and_roles() {
        let permissions = Arc::new(FakePermissionRepository::default());
        let roles = Arc::new(FakeRoleRepository::default());

        let installed = install_builtin_catalog(permissions.clone(), roles.clone()).await;
        assert!(installed.is_ok());

        assert!(!permissions.definitions.lock().await.is_empty());

        let stored_roles = roles.roles.lock().await;
        assert_eq!(stored_roles.len(), BuiltinRole::all().len());
        let parent = stored_roles
            .iter()
            .find(|stored| stored.slug == BuiltinRole::Parent.slug());
        assert!(matches!(parent, Some(role) if role.has_permission("device.control")));
    }

    #[tokio::test]
    async fn install_twice_is_idempotent() {
        let permissions = Arc::new(FakePermissionRepository::default());
        let roles = Arc::new(FakeRoleRepository::default());

        assert!(
            install_builtin_catalog(permissions.clone(), roles.clone())
                .await
                .is_ok()
        );
        let permission_count = permissions.definitions.lock().await.len();

        assert!(
            install_builtin_catalog(permissions.clone(), roles.clone())
                .await
                .is_ok()
        );
        assert_eq!(permissions.definitions.lock().await.len(), permission_count);
    }
}
