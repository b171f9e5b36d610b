use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use cradleguard_core::{AppResult, UserId, UserIdentity, UserStatus};
use cradleguard_domain::{
    AccessDecision, ActionTarget, DenyReason, DeviceId, DeviceRelationship, PermissionSlug,
    RelationshipType, RoleSlug, catalog,
};
use tokio::sync::Mutex;

use super::{AuthorizationService, UserGrantRepository};
use crate::device_relationship_service::{
    DeviceRelationshipRepository, DeviceRelationshipService,
};

#[derive(Default)]
struct FakeUserGrantRepository {
    roles_by_user: Mutex<HashMap<UserId, BTreeSet<RoleSlug>>>,
    role_grants: Mutex<HashMap<RoleSlug, BTreeSet<PermissionSlug>>>,
    direct_grants: Mutex<HashMap<UserId, BTreeSet<PermissionSlug>>>,
}

#[async_trait]
impl UserGrantRepository for FakeUserGrantRepository {
    async fn list_role_permissions(&self, user_id: UserId) -> AppResult<Vec<PermissionSlug>> {
        let roles_by_user = self.roles_by_user.lock().await;
        let role_grants = self.role_grants.lock().await;

        Ok(roles_by_user
            .get(&user_id)
            .into_iter()
            .flatten()
            .filter_map(|role| role_grants.get(role))
            .flatten()
            .cloned()
            .collect())
    }

    async fn list_direct_permissions(&self, user_id: UserId) -> AppResult<Vec<PermissionSlug>> {
        Ok(self
            .direct_grants
            .lock()
            .await
            .get(&user_id)
            .map(|slugs| slugs.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn list_roles_for_user(&self, user_id: UserId) -> AppResult<Vec<RoleSlug>> {
        Ok(self
            .roles_by_user
            .lock()
            .await
            .get(&user_id)
            .map(|roles| roles.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn count_users_with_role(&self, role: &RoleSlug) -> AppResult<u64> {
        Ok(self
            .roles_by_user
            .lock()
            .await
            .values()
            .filter(|roles| roles.contains(role))
            .count() as u64)
    }

    async fn assign_role(&self, user_id: UserId, role: &RoleSlug) -> AppResult<()> {
        self.roles_by_user
            .lock()
            .await
            .entry(user_id)
            .or_default()
            .insert(role.clone());
        Ok(())
    }

    async fn remove_role(&self, user_id: UserId, role: &RoleSlug) -> AppResult<()> {
        if let Some(roles) = self.roles_by_user.lock().await.get_mut(&user_id) {
            roles.remove(role);
        }
        Ok(())
    }

    async fn grant_permission(&self, user_id: UserId, slug: &PermissionSlug) -> AppResult<()> {
        self.direct_grants
            .lock()
            .await
            .entry(user_id)
            .or_default()
            .insert(slug.clone());
        Ok(())
    }

    async fn revoke_permission(&self, user_id: UserId, slug: &PermissionSlug) -> AppResult<()> {
        if let Some(slugs) = self.direct_grants.lock().await.get_mut(&user_id) {
            slugs.remove(slug);
        }
        Ok(())
    }
}

impl FakeUserGrantRepository {
    async fn set_role_grants(&self, role: &str, grants: &[&str]) {
        self.role_grants
            .lock()
            .await
            .insert(role_slug(role), permission_set(grants));
    }

    async fn revoke_role_grant(&self, role: &str, grant: &str) {
        if let Some(grants) = self.role_grants.lock().await.get_mut(role_slug(role).as_str()) {
            grants.remove(grant);
        }
    }
}

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
        self.relationships
            .lock()
            .await
            .insert((device_id, relationship.user_id), relationship);
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

    async fn list_for_device(&self, device_id: DeviceId) -> AppResult<Vec<DeviceRelationship>> {
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

fn permission_slug(value: &str) -> PermissionSlug {
    PermissionSlug::new(value).unwrap_or_else(|_| panic!("invalid test slug '{value}'"))
}

fn role_slug(value: &str) -> RoleSlug {
    RoleSlug::new(value).unwrap_or_else(|_| panic!("invalid test slug '{value}'"))
}

fn permission_set(values: &[&str]) -> BTreeSet<PermissionSlug> {
    values.iter().map(|value| permission_slug(value)).collect()
}

fn identity(user_id: UserId) -> UserIdentity {
    UserIdentity::new(user_id, "Test User", None, UserStatus::Active)
}

struct Fixture {
    grants: Arc<FakeUserGrantRepository>,
    relationships: Arc<FakeDeviceRelationshipRepository>,
    service: AuthorizationService,
}

fn fixture() -> Fixture {
    let grants = Arc::new(FakeUserGrantRepository::default());
    let relationships = Arc::new(FakeDeviceRelationshipRepository::default());
    let service = AuthorizationService::new(
        grants.clone(),
        DeviceRelationshipService::new(relationships.clone()),
    );

    Fixture {
        grants,
        relationships,
        service,
    }
}

#[tokio::test]
async fn effective_permissions_union_roles_and_direct_grants() {
    let fixture = fixture();
    let user_id = UserId::new();

    fixture
        .grants
        .set_role_grants("parent", &["device.view", "device.control"])
        .await;
    fixture
        .grants
        .set_role_grants("babysitter", &["device.view", "alert.view"])
        .await;
    for role in ["parent", "babysitter"] {
        let assigned = fixture.grants.assign_role(user_id, &role_slug(role)).await;
        assert!(assigned.is_ok());
    }
    let granted = fixture
        .grants
        .grant_permission(user_id, &permission_slug("babysitter.manage"))
        .await;
    assert!(granted.is_ok());

    let effective = fixture.service.effective_permissions(user_id).await;
    assert!(matches!(
        effective,
        Ok(resolved)
            if *resolved.slugs() == permission_set(&[
                "device.view",
                "device.control",
                "alert.view",
                "babysitter.manage",
            ])
    ));
}

#[tokio::test]
async fn user_with_no_roles_resolves_direct_grants_only() {
    let fixture = fixture();
    let user_id = UserId::new();

    let granted = fixture
        .grants
        .grant_permission(user_id, &permission_slug("alert.view"))
        .await;
    assert!(granted.is_ok());

    let effective = fixture.service.effective_permissions(user_id).await;
    assert!(matches!(
        effective,
        Ok(resolved) if *resolved.slugs() == permission_set(&["alert.view"])
    ));
}

#[tokio::test]
async fn unknown_slug_is_false_not_an_error() {
    let fixture = fixture();
    let user_id = UserId::new();

    let result = fixture
        .service
        .has_permission(user_id, "device.telport")
        .await;
    assert!(matches!(result, Ok(false)));
}

#[tokio::test]
async fn has_any_and_has_all_follow_the_resolved_set() {
    let fixture = fixture();
    let user_id = UserId::new();

    fixture
        .grants
        .set_role_grants("parent", &["device.view", "device.control"])
        .await;
    let assigned = fixture
        .grants
        .assign_role(user_id, &role_slug("parent"))
        .await;
    assert!(assigned.is_ok());

    let any = fixture
        .service
        .has_any_permission(user_id, &["device.manage", "device.view"])
        .await;
    assert!(matches!(any, Ok(true)));

    let all = fixture
        .service
        .has_all_permissions(user_id, &["device.view", "device.control"])
        .await;
    assert!(matches!(all, Ok(true)));

    let all_missing_one = fixture
        .service
        .has_all_permissions(user_id, &["device.view", "device.manage"])
        .await;
    assert!(matches!(all_missing_one, Ok(false)));
}

#[tokio::test]
async fn global_grant_authorizes_any_device() {
    let fixture = fixture();
    let user_id = UserId::new();
    let unrelated_device = DeviceId::new();

    fixture
        .grants
        .set_role_grants("parent", &["device.view", "device.control"])
        .await;
    let assigned = fixture
        .grants
        .assign_role(user_id, &role_slug("parent"))
        .await;
    assert!(assigned.is_ok());

    let decision = fixture
        .service
        .authorize(
            &identity(user_id),
            "device.control",
            Some(&ActionTarget::Device(unrelated_device)),
        )
        .await;
    assert!(matches!(decision, Ok(AccessDecision::Allow)));
}

#[tokio::test]
async fn device_capability_alone_authorizes_that_device_only() {
    let fixture = fixture();
    let user_id = UserId::new();
    let shared_device = DeviceId::new();
    let other_device = DeviceId::new();

    let stored = fixture
        .relationships
        .upsert(
            shared_device,
            DeviceRelationship {
                user_id,
                relationship_type: RelationshipType::Caretaker,
                capabilities: permission_set(&["view", "control_limited"]),
            },
        )
        .await;
    assert!(stored.is_ok());

    let on_shared = fixture
        .service
        .authorize(
            &identity(user_id),
            "control_limited",
            Some(&ActionTarget::Device(shared_device)),
        )
        .await;
    assert!(matches!(on_shared, Ok(AccessDecision::Allow)));

    let on_other = fixture
        .service
        .authorize(
            &identity(user_id),
            "control_limited",
            Some(&ActionTarget::Device(other_device)),
        )
        .await;
    assert!(matches!(
        on_other,
        Ok(AccessDecision::Deny(DenyReason::MissingPermission))
    ));
}

#[tokio::test]
async fn revoked_role_grant_no_longer_authorizes() {
    let fixture = fixture();
    let user_id = UserId::new();
    let device_id = DeviceId::new();

    fixture
        .grants
        .set_role_grants("parent", &["device.view", "device.control"])
        .await;
    let assigned = fixture
        .grants
        .assign_role(user_id, &role_slug("parent"))
        .await;
    assert!(assigned.is_ok());

    fixture
        .grants
        .revoke_role_grant("parent", "device.control")
        .await;

    let decision = fixture
        .service
        .authorize(
            &identity(user_id),
            "device.control",
            Some(&ActionTarget::Device(device_id)),
        )
        .await;
    assert!(matches!(
        decision,
        Ok(AccessDecision::Deny(DenyReason::MissingPermission))
    ));
}

#[tokio::test]
async fn revoked_global_grant_leaves_device_scoped_grant_intact() {
    let fixture = fixture();
    let user_id = UserId::new();
    let device_id = DeviceId::new();

    let stored = fixture
        .relationships
        .upsert(
            device_id,
            DeviceRelationship {
                user_id,
                relationship_type: RelationshipType::Caretaker,
                capabilities: permission_set(&["device.control"]),
            },
        )
        .await;
    assert!(stored.is_ok());

    let decision = fixture
        .service
        .authorize(
            &identity(user_id),
            "device.control",
            Some(&ActionTarget::Device(device_id)),
        )
        .await;
    assert!(matches!(decision, Ok(AccessDecision::Allow)));
}

#[tokio::test]
async fn global_action_without_target_requires_global_grant() {
    let fixture = fixture();
    let user_id = UserId::new();

    let decision = fixture
        .service
        .authorize(&identity(user_id), "user.view", None)
        .await;
    assert!(matches!(
        decision,
        Ok(AccessDecision::Deny(DenyReason::MissingPermission))
    ));
}

#[tokio::test]
async fn resource_owner_is_allowed_without_any_grant() {
    let fixture = fixture();
    let user_id = UserId::new();

    let decision = fixture
        .service
        .authorize(
            &identity(user_id),
            "alert.manage",
            Some(&ActionTarget::OwnedResource { owner_id: user_id }),
        )
        .await;
    assert!(matches!(decision, Ok(AccessDecision::Allow)));
}

#[tokio::test]
async fn non_owner_without_grant_is_denied_with_ownership_reason() {
    let fixture = fixture();
    let actor_id = UserId::new();
    let owner_id = UserId::new();

    let decision = fixture
        .service
        .authorize(
            &identity(actor_id),
            "alert.manage",
            Some(&ActionTarget::OwnedResource { owner_id }),
        )
        .await;
    assert!(matches!(
        decision,
        Ok(AccessDecision::Deny(DenyReason::NotOwnerOrPermission))
    ));
}

#[tokio::test]
async fn non_owner_with_global_grant_is_allowed() {
    let fixture = fixture();
    let actor_id = UserId::new();
    let owner_id = UserId::new();

    let granted = fixture
        .grants
        .grant_permission(actor_id, &permission_slug("alert.manage"))
        .await;
    assert!(granted.is_ok());

    let decision = fixture
        .service
        .authorize(
            &identity(actor_id),
            "alert.manage",
            Some(&ActionTarget::OwnedResource { owner_id }),
        )
        .await;
    assert!(matches!(decision, Ok(AccessDecision::Allow)));
}

#[tokio::test]
async fn deleting_the_last_admin_is_refused_even_for_full_grants() {
    let fixture = fixture();
    let actor_id = UserId::new();
    let sole_admin = UserId::new();

    fixture
        .grants
        .set_role_grants("admin", &["user.delete", "user.manage"])
        .await;
    let assigned = fixture
        .grants
        .assign_role(sole_admin, &role_slug("admin"))
        .await;
    assert!(assigned.is_ok());
    let granted = fixture
        .grants
        .grant_permission(actor_id, &permission_slug(catalog::slugs::USER_DELETE))
        .await;
    assert!(granted.is_ok());

    let decision = fixture
        .service
        .authorize(
            &identity(actor_id),
            catalog::slugs::USER_DELETE,
            Some(&ActionTarget::UserAccount(sole_admin)),
        )
        .await;
    assert!(matches!(
        decision,
        Ok(AccessDecision::Deny(DenyReason::LastAdminProtected))
    ));
}

#[tokio::test]
async fn deleting_an_admin_with_peers_follows_normal_rules() {
    let fixture = fixture();
    let actor_id = UserId::new();
    let first_admin = UserId::new();
    let second_admin = UserId::new();

    for admin in [first_admin, second_admin] {
        let assigned = fixture.grants.assign_role(admin, &role_slug("admin")).await;
        assert!(assigned.is_ok());
    }
    let granted = fixture
        .grants
        .grant_permission(actor_id, &permission_slug(catalog::slugs::USER_DELETE))
        .await;
    assert!(granted.is_ok());

    let decision = fixture
        .service
        .authorize(
            &identity(actor_id),
            catalog::slugs::USER_DELETE,
            Some(&ActionTarget::UserAccount(first_admin)),
        )
        .await;
    assert!(matches!(decision, Ok(AccessDecision::Allow)));
}

#[tokio::test]
async fn deleting_a_non_admin_user_skips_the_last_admin_guard() {
    let fixture = fixture();
    let actor_id = UserId::new();
    let target_id = UserId::new();

    let granted = fixture
        .grants
        .grant_permission(actor_id, &permission_slug(catalog::slugs::USER_DELETE))
        .await;
    assert!(granted.is_ok());

    let decision = fixture
        .service
        .authorize(
            &identity(actor_id),
            catalog::slugs::USER_DELETE,
            Some(&ActionTarget::UserAccount(target_id)),
        )
        .await;
    assert!(matches!(decision, Ok(AccessDecision::Allow)));
}

#[tokio::test]
async fn require_maps_deny_to_forbidden() {
    let fixture = fixture();
    let user_id = UserId::new();

    let result = fixture
        .service
        .require(&identity(user_id), "device.manage", None)
        .await;
    assert!(matches!(
        result,
        Err(cradleguard_core::AppError::Forbidden(_))
    ));
}
