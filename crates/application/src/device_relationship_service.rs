use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use cradleguard_core::{AppResult, UserId};
use cradleguard_domain::{DeviceId, DeviceRelationship, PermissionSlug, RelationshipType};

/// Repository port for the device relationship ledger.
#[async_trait]
pub trait DeviceRelationshipRepository: Send + Sync {
    /// Inserts or replaces the relationship for `(device, user)`.
    ///
    /// When the relationship type is owner, any previous owner relationship
    /// on the device is detached in the same storage transaction; readers
    /// never observe zero or two owners during a replacement.
    async fn upsert(&self, device_id: DeviceId, relationship: DeviceRelationship)
    -> AppResult<()>;

    /// Removes the relationship for `(device, user)`; missing is a no-op.
    async fn remove(&self, device_id: DeviceId, user_id: UserId) -> AppResult<()>;

    /// Finds the relationship for `(device, user)`.
    async fn find(
        &self,
        device_id: DeviceId,
        user_id: UserId,
    ) -> AppResult<Option<DeviceRelationship>>;

    /// Lists all relationships on a device.
    async fn list_for_device(&self, device_id: DeviceId) -> AppResult<Vec<DeviceRelationship>>;
}

/// Application service for device sharing relationships.
///
/// Device-scoped capability subsets are independent of global grants; the
/// ledger alone can authorize an action on one device and never widens
/// access to any other device.
#[derive(Clone)]
pub struct DeviceRelationshipService {
    repository: Arc<dyn DeviceRelationshipRepository>,
}

impl DeviceRelationshipService {
    /// Creates a new ledger service from a repository implementation.
    #[must_use]
    pub fn new(repository: Arc<dyn DeviceRelationshipRepository>) -> Self {
        Self { repository }
    }

    /// Assigns or replaces a user's relationship to a device.
    ///
    /// A user holds at most one relationship per device; assigning again
    /// replaces it. Assigning an owner detaches the previous owner.
    pub async fn assign(
        &self,
        device_id: DeviceId,
        user_id: UserId,
        relationship_type: RelationshipType,
        capabilities: BTreeSet<PermissionSlug>,
    ) -> AppResult<DeviceRelationship> {
        let relationship = DeviceRelationship {
            user_id,
            relationship_type,
            capabilities,
        };

        self.repository
            .upsert(device_id, relationship.clone())
            .await?;
        Ok(relationship)
    }

    /// Removes a user's relationship to a device. Missing is a no-op.
    pub async fn unassign(&self, device_id: DeviceId, user_id: UserId) -> AppResult<()> {
        self.repository.remove(device_id, user_id).await
    }

    /// Returns the user's relationship to a device, if any.
    pub async fn relationship_of(
        &self,
        device_id: DeviceId,
        user_id: UserId,
    ) -> AppResult<Option<DeviceRelationship>> {
        self.repository.find(device_id, user_id).await
    }

    /// Returns whether the user's relationship grants a capability on the
    /// device. No relationship or an unknown capability is simply `false`.
    pub async fn has_capability(
        &self,
        device_id: DeviceId,
        user_id: UserId,
        capability: &str,
    ) -> AppResult<bool> {
        Ok(self
            .repository
            .find(device_id, user_id)
            .await?
            .is_some_and(|relationship| relationship.has_capability(capability)))
    }

    /// Returns the device's owner, if one is assigned.
    pub async fn owner(&self, device_id: DeviceId) -> AppResult<Option<UserId>> {
        Ok(self
            .repository
            .list_for_device(device_id)
            .await?
            .into_iter()
            .find(|relationship| relationship.relationship_type == RelationshipType::Owner)
            .map(|relationship| relationship.user_id))
    }

    /// Lists users holding a relationship type on a device.
    pub async fn users_with_type(
        &self,
        device_id: DeviceId,
        relationship_type: RelationshipType,
    ) -> AppResult<Vec<UserId>> {
        Ok(self
            .repository
            .list_for_device(device_id)
            .await?
            .into_iter()
            .filter(|relationship| relationship.relationship_type == relationship_type)
            .map(|relationship| relationship.user_id)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeSet, HashMap};
    use std::sync::Arc;

    use async_trait::async_trait;
    use cradleguard_core::{AppResult, UserId};
    use cradleguard_domain::{DeviceId, DeviceRelationship, PermissionSlug, RelationshipType};
    use tokio::sync::Mutex;

    use super::{DeviceRelationshipRepository, DeviceRelationshipService};

    #[derive(Default)]
    struct FakeDeviceRelationshipRepository {
        relationships: Mutex<HashMap<(DeviceId, UserId), DeviceRelationship>>,
    }

    #[async_trait]
    impl DeviceRelationshipRepository for FakeDeviceRelationshipRepository {
        async fn upsert(
            &self,
            device_id: DeviceId,
            relationship: DeviceRelationship,
        ) -> AppResult<()> {
            let mut relationships = self.relationships.lock().await;
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
                .lock()
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
                .lock()
                .await
                .get(&(device_id, user_id))
                .cloned())
        }

        async fn list_for_device(
            &self,
            device_id: DeviceId,
        ) -> AppResult<Vec<DeviceRelationship>> {
            Ok(self
                .relationships
                .lock()
                .await
                .iter()
                .filter_map(|((stored_device_id, _), relationship)| {
                    (stored_device_id == &device_id).then(|| relationship.clone())
                })
                .collect())
        }
    }

    fn capabilities(values: &[&str]) -> BTreeSet<PermissionSlug> {
        values
            .iter()
            .filter_map(|value| PermissionSlug::new(*value).ok())
            .collect()
    }

    fn service() -> DeviceRelationshipService {
        DeviceRelationshipService::new(Arc::new(FakeDeviceRelationshipRepository::default()))
    }

    #[tokio::test]
    async fn assign_then_lookup_returns_relationship() {
        let service = service();
        let device_id = DeviceId::new();
        let user_id = UserId::new();

        let assigned = service
            .assign(
                device_id,
                user_id,
                RelationshipType::Caretaker,
                capabilities(&["view", "control_limited"]),
            )
            .await;
        assert!(assigned.is_ok());

        let has_capability = service
            .has_capability(device_id, user_id, "control_limited")
            .await;
        assert!(matches!(has_capability, Ok(true)));

        let missing = service.has_capability(device_id, user_id, "manage").await;
        assert!(matches!(missing, Ok(false)));
    }

    #[tokio::test]
    async fn owner_assignment_replaces_previous_owner() {
        let service = service();
        let device_id = DeviceId::new();
        let first_owner = UserId::new();
        let second_owner = UserId::new();

        assert!(
            service
                .assign(
                    device_id,
                    first_owner,
                    RelationshipType::Owner,
                    capabilities(&["view", "control", "manage"]),
                )
                .await
                .is_ok()
        );
        assert!(
            service
                .assign(
                    device_id,
                    second_owner,
                    RelationshipType::Owner,
                    capabilities(&["view", "control", "manage"]),
                )
                .await
                .is_ok()
        );

        let owner = service.owner(device_id).await;
        assert!(matches!(owner, Ok(Some(user_id)) if user_id == second_owner));

        let owners = service
            .users_with_type(device_id, RelationshipType::Owner)
            .await;
        assert!(matches!(owners, Ok(users) if users.len() == 1));
    }

    #[tokio::test]
    async fn reassignment_replaces_relationship_for_user() {
        let service = service();
        let device_id = DeviceId::new();
        let user_id = UserId::new();

        assert!(
            service
                .assign(
                    device_id,
                    user_id,
                    RelationshipType::Caretaker,
                    capabilities(&["view", "control"]),
                )
                .await
                .is_ok()
        );
        assert!(
            service
                .assign(
                    device_id,
                    user_id,
                    RelationshipType::Viewer,
                    capabilities(&["view"]),
                )
                .await
                .is_ok()
        );

        let relationship = service.relationship_of(device_id, user_id).await;
        assert!(matches!(
            relationship,
            Ok(Some(stored)) if stored.relationship_type == RelationshipType::Viewer
                && !stored.has_capability("control")
        ));
    }

    #[tokio::test]
    async fn unassign_is_idempotent() {
        let service = service();
        let device_id = DeviceId::new();
        let user_id = UserId::new();

        assert!(service.unassign(device_id, user_id).await.is_ok());
        assert!(service.unassign(device_id, user_id).await.is_ok());
    }

    #[tokio::test]
    async fn capability_is_scoped_to_one_device() {
        let service = service();
        let shared_device = DeviceId::new();
        let other_device = DeviceId::new();
        let user_id = UserId::new();

        assert!(
            service
                .assign(
                    shared_device,
                    user_id,
                    RelationshipType::Babysitter,
                    capabilities(&["view"]),
                )
                .await
                .is_ok()
        );

        let on_shared = service.has_capability(shared_device, user_id, "view").await;
        let on_other = service.has_capability(other_device, user_id, "view").await;
        assert!(matches!(on_shared, Ok(true)));
        assert!(matches!(on_other, Ok(false)));
    }
}
