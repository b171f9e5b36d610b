use std::collections::BTreeSet;
use std::str::FromStr;

use async_trait::async_trait;
use sqlx::{FromRow, PgPool};

use cradleguard_application::DeviceRelationshipRepository;
use cradleguard_core::{AppError, AppResult, UserId};
use cradleguard_domain::{DeviceId, DeviceRelationship, PermissionSlug, RelationshipType};

/// PostgreSQL-backed device relationship ledger.
///
/// Owner replacement runs inside one transaction so readers never observe a
/// device with zero or two owners.
#[derive(Clone)]
pub struct PostgresDeviceRelationshipRepository {
    pool: PgPool,
}

impl PostgresDeviceRelationshipRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct RelationshipRow {
    user_id: uuid::Uuid,
    relationship_type: String,
    capabilities: serde_json::Value,
}

impl RelationshipRow {
    fn into_relationship(self) -> AppResult<DeviceRelationship> {
        let relationship_type = RelationshipType::from_str(self.relationship_type.as_str())
            .map_err(|error| {
                AppError::Internal(format!(
                    "invalid stored relationship type '{}': {error}",
                    self.relationship_type
                ))
            })?;

        let values: Vec<String> = serde_json::from_value(self.capabilities).map_err(|error| {
            AppError::Internal(format!("failed to decode capability list: {error}"))
        })?;

        let capabilities: AppResult<BTreeSet<PermissionSlug>> = values
            .iter()
            .map(|value| {
                PermissionSlug::new(value.as_str()).map_err(|error| {
                    AppError::Internal(format!("invalid stored capability '{value}': {error}"))
                })
            })
            .collect();

        Ok(DeviceRelationship {
            user_id: UserId::from_uuid(self.user_id),
            relationship_type,
            capabilities: capabilities?,
        })
    }
}

fn encode_capabilities(capabilities: &BTreeSet<PermissionSlug>) -> AppResult<serde_json::Value> {
    let values: Vec<&str> = capabilities.iter().map(PermissionSlug::as_str).collect();
    serde_json::to_value(values).map_err(|error| {
        AppError::Internal(format!("failed to encode capability list: {error}"))
    })
}

#[async_trait]
impl DeviceRelationshipRepository for PostgresDeviceRelationshipRepository {
    async fn upsert(
        &self,
        device_id: DeviceId,
        relationship: DeviceRelationship,
    ) -> AppResult<()> {
        let capabilities = encode_capabilities(&relationship.capabilities)?;

        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!(
                "failed to begin relationship transaction for device '{device_id}': {error}"
            ))
        })?;

        if relationship.relationship_type == RelationshipType::Owner {
            sqlx::query(
                r#"
                DELETE FROM device_user_relationships
                WHERE device_id = $1 AND relationship_type = 'owner'
                "#,
            )
            .bind(device_id.as_uuid())
            .execute(&mut *transaction)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to detach previous owner: {error}"))
            })?;
        }

        sqlx::query(
            r#"
            INSERT INTO device_user_relationships (
                device_id,
                user_id,
                relationship_type,
                capabilities
            )
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (device_id, user_id) DO UPDATE SET
                relationship_type = EXCLUDED.relationship_type,
                capabilities = EXCLUDED.capabilities
            "#,
        )
        .bind(device_id.as_uuid())
        .bind(relationship.user_id.as_uuid())
        .bind(relationship.relationship_type.as_str())
        .bind(capabilities)
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to persist relationship: {error}"))
        })?;

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!(
                "failed to commit relationship transaction for device '{device_id}': {error}"
            ))
        })
    }

    async fn remove(&self, device_id: DeviceId, user_id: UserId) -> AppResult<()> {
        sqlx::query(
            r#"
            DELETE FROM device_user_relationships
            WHERE device_id = $1 AND user_id = $2
            "#,
        )
        .bind(device_id.as_uuid())
        .bind(user_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to remove relationship: {error}")))?;

        Ok(())
    }

    async fn find(
        &self,
        device_id: DeviceId,
        user_id: UserId,
    ) -> AppResult<Option<DeviceRelationship>> {
        let row = sqlx::query_as::<_, RelationshipRow>(
            r#"
            SELECT user_id, relationship_type, capabilities
            FROM device_user_relationships
            WHERE device_id = $1 AND user_id = $2
            "#,
        )
        .bind(device_id.as_uuid())
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load relationship: {error}")))?;

        row.map(RelationshipRow::into_relationship).transpose()
    }

    async fn list_for_device(&self, device_id: DeviceId) -> AppResult<Vec<DeviceRelationship>> {
        let rows = sqlx::query_as::<_, RelationshipRow>(
            r#"
            SELECT user_id, relationship_type, capabilities
            FROM device_user_relationships
            WHERE device_id = $1
            ORDER BY user_id
            "#,
        )
        .bind(device_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list device relationships: {error}"))
        })?;

        rows.into_iter()
            .map(RelationshipRow::into_relationship)
            .collect()
    }
}
