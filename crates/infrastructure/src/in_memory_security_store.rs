use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use cradleguard_application::{
    DeviceRelationshipRepository, PermissionRepository, RoleRepository, UserGrantRepository,
};
use cradleguard_core::{AppError, AppResult, UserId};
use cradleguard_domain::{
    DeviceId, DeviceRelationship, PermissionDefinition, PermissionSlug, RelationshipType,
    RoleDefinition, RoleSlug,
};

/// In-memory implementation of every authorization repository port.
///
/// Used by tests and development wiring. Permission definitions keep
/// insertion order; owner replacement runs inside one write lock so readers
/// never observe two owners.
#[derive(Debug, Default)]
pub struct InMemorySecurityStore {
    permissions: RwLock<Vec<PermissionDefinition>>,
    roles: RwLock<BTreeMap<RoleSlug, RoleDefinition>>,
    user_roles: RwLock<HashMap<UserId, BTreeSet<RoleSlug>>>,
    user_grants: RwLock<HashMap<UserId, BTreeSet<PermissionSlug>>>,
    relationships: RwLock<HashMap<(DeviceId, UserId), DeviceRelationship>>,
}

impl InMemorySecurityStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PermissionRepository for InMemorySecurityStore {
    async fn insert(&self, definition: PermissionDefinition) -> AppResult<()> {
        let mut permissions = self.permissions.write().await;

        if permissions
            .iter()
            .any(|stored| stored.slug == definition.slug)
        {
            return Err(AppError::Conflict(format!(
                "permission '{}' already exists",
                definition.slug
            )));
        }

        permissions.push(definition);
        Ok(())
    }

    async fn find_by_slug(
        &self,
        slug: &PermissionSlug,
    ) -> AppResult<Option<PermissionDefinition>> {
        Ok(self
            .permissions
            .read()
            .await
            .iter()
            .find(|stored| &stored.slug == slug)
            .cloned())
    }

    async fn delete(&self, slug: &PermissionSlug) -> AppResult<()> {
        self.permissions
            .write()
            .await
            .retain(|stored| &stored.slug != slug);
        Ok(())
    }

    async fn list_by_group(&self, group: &str) -> AppResult<Vec<PermissionDefinition>> {
        Ok(self
            .permissions
            .read()
            .await
            .iter()
            .filter(|stored| stored.group.as_deref() == Some(group))
            .cloned()
            .collect())
    }

    async fn is_referenced(&self, slug: &PermissionSlug) -> AppResult<bool> {
        if self
            .roles
            .read()
            .await
            .values()
            .any(|role| role.permissions.contains(slug))
        {
            return Ok(true);
        }

        if self
            .user_grants
            .read()
            .await
            .values()
            .any(|grants| grants.contains(slug))
        {
            return Ok(true);
        }

        Ok(self
            .permissions
            .read()
            .await
            .iter()
            .any(|stored| stored.parent_slug.as_ref() == Some(slug)))
    }
}

#[async_trait]
impl RoleRepository for InMemorySecurityStore {
    async fn insert(&self, role: RoleDefinition) -> AppResult<()> {
        let mut roles = self.roles.write().await;

        if roles.contains_key(&role.slug) {
            return Err(AppError::Conflict(format!(
                "role '{}' already exists",
                role.slug
            )));
        }

        roles.insert(role.slug.clone(), role);
        Ok(())
    }

    async fn find_by_slug(&self, slug: &RoleSlug) -> AppResult<Option<RoleDefinition>> {
        Ok(self.roles.read().await.get(slug).cloned())
    }

    async fn list(&self) -> AppResult<Vec<RoleDefinition>> {
        Ok(self.roles.read().await.values().cloned().collect())
    }

    async fn add_grant(&self, role: &RoleSlug, permission: &PermissionSlug) -> AppResult<()> {
        if let Some(stored) = self.roles.write().await.get_mut(role) {
            stored.permissions.insert(permission.clone());
        }
        Ok(())
    }

    async fn remove_grant(&self, role: &RoleSlug, permission: &PermissionSlug) -> AppResult<()> {
        if let Some(stored) = self.roles.write().await.get_mut(role) {
            stored.permissions.remove(permission);
        }
        Ok(())
    }
}

#[async_trait]
impl UserGrantRepository for InMemorySecurityStore {
    async fn list_role_permissions(&self, user_id: UserId) -> AppResult<Vec<PermissionSlug>> {
        let user_roles = self.user_roles.read().await;
        let roles = self.roles.read().await;

        Ok(user_roles
            .get(&user_id)
            .into_iter()
            .flatten()
            .filter_map(|slug| roles.get(slug))
            .flat_map(|role| role.permissions.iter().cloned())
            .collect())
    }

    async fn list_direct_permissions(&self, user_id: UserId) -> AppResult<Vec<PermissionSlug>> {
        Ok(self
            .user_grants
            .read()
            .await
            .get(&user_id)
            .map(|grants| grants.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn list_roles_for_user(&self, user_id: UserId) -> AppResult<Vec<RoleSlug>> {
        Ok(self
            .user_roles
            .read()
            .await
            .get(&user_id)
            .map(|roles| roles.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn count_users_with_role(&self, role: &RoleSlug) -> AppResult<u64> {
        Ok(self
            .user_roles
            .read()
            .await
            .values()
            .filter(|roles| roles.contains(role))
            .count() as u64)
    }

    async fn assign_role(&self, user_id: UserId, role: &RoleSlug) -> AppResult<()> {
        self.user_roles
            .write()
            .await
            .entry(user_id)
            .or_default()
            .insert(role.clone());
        Ok(())
    }

    async fn remove_role(&self, user_id: UserId, role: &RoleSlug) -> AppResult<()> {
        if let Some(roles) = self.user_roles.write().await.get_mut(&user_id) {
            roles.remove(role);
        }
        Ok(())
    }

    async fn grant_permission(&self, user_id: UserId, slug: &PermissionSlug) -> AppResult<()> {
        self.user_grants
            .write()
            .await
            .entry(user_id)
            .or_default()
            .insert(slug.clone());
        Ok(())
    }

    async fn revoke_permission(&self, user_id: UserId, slug: &PermissionSlug) -> AppResult<()> {
        if let Some(grants) = self.user_grants.write().await.get_mut(&user_id) {
            grants.remove(slug);
        }
        Ok(())
    }
}

#[async_trait]
impl DeviceRelationshipRepository for InMemorySecurityStore {
    async fn upsert(
        &self,
        device_id: DeviceId,
        relationship: DeviceRelationship,
    ) -> AppResult<()> {
        let mut relationships = self.relationships.write().await;

        if relationship.relationship_type == RelationshipType::Owner {
            relationships.retain(|(stored_device_id, _), stored| {
                !(stored_device_id == &device_id
                    && stored.relationship_type == RelationshipType::Owner)
            });
        }

        relationships.insert((device_id, relationship.user_id), relationship);
        Ok(())
    }

    async fn remove(&self, device_id: DeviceId, user_id: UserId) -> AppResult<()> {
        self.relationships
            .write()
            .await
            .remove(&(device_id, user_id));
        Ok(())
    }

    async fn find(
        &self,
        device_id: DeviceId,
        user_id: UserId,
    ) -> AppResult<Option<DeviceRelationship>> {
        Ok(self
            .relationships
            .read()
            .await
            .get(&(device_id, user_id))
            .cloned())
    }

    async fn list_for_device(&self, device_id: DeviceId) -> AppResult<Vec<DeviceRelationship>> {
        let mut listed: Vec<DeviceRelationship> = self
            .relationships
            .read()
            .await
            .iter()
            .filter_map(|((stored_device_id, _), relationship)| {
                (stored_device_id == &device_id).then(|| relationship.clone())
            })
            .collect();
        listed.sort_by(|left, right| left.user_id.cmp(&right.user_id));

        Ok(listed)
    }
}
