use async_trait::async_trait;
use sqlx::{FromRow, PgPool};

use cradleguard_application::UserGrantRepository;
use cradleguard_core::{AppError, AppResult, UserId};
use cradleguard_domain::{PermissionSlug, RoleSlug};

/// PostgreSQL-backed repository for user role assignments and direct grants.
#[derive(Clone)]
pub struct PostgresUserGrantRepository {
    pool: PgPool,
}

impl PostgresUserGrantRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct SlugRow {
    slug: String,
}

fn decode_permission(value: &str) -> AppResult<PermissionSlug> {
    PermissionSlug::new(value).map_err(|error| {
        AppError::Internal(format!("invalid stored permission slug '{value}': {error}"))
    })
}

#[async_trait]
impl UserGrantRepository for PostgresUserGrantRepository {
    async fn list_role_permissions(&self, user_id: UserId) -> AppResult<Vec<PermissionSlug>> {
        let rows = sqlx::query_as::<_, SlugRow>(
            r#"
            SELECT DISTINCT grants.permission_slug AS slug
            FROM auth_user_roles AS user_roles
            INNER JOIN auth_role_grants AS grants
                ON grants.role_slug = user_roles.role_slug
            WHERE user_roles.user_id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to load role permissions: {error}"))
        })?;

        rows.into_iter()
            .map(|row| decode_permission(row.slug.as_str()))
            .collect()
    }

    async fn list_direct_permissions(&self, user_id: UserId) -> AppResult<Vec<PermissionSlug>> {
        let rows = sqlx::query_as::<_, SlugRow>(
            r#"
            SELECT permission_slug AS slug
            FROM auth_user_grants
            WHERE user_id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to load direct permissions: {error}"))
        })?;

        rows.into_iter()
            .map(|row| decode_permission(row.slug.as_str()))
            .collect()
    }

    async fn list_roles_for_user(&self, user_id: UserId) -> AppResult<Vec<RoleSlug>> {
        let rows = sqlx::query_as::<_, SlugRow>(
            r#"
            SELECT role_slug AS slug
            FROM auth_user_roles
            WHERE user_id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load user roles: {error}")))?;

        rows.into_iter()
            .map(|row| {
                RoleSlug::new(row.slug.as_str()).map_err(|error| {
                    AppError::Internal(format!("invalid stored role slug '{}': {error}", row.slug))
                })
            })
            .collect()
    }

    async fn count_users_with_role(&self, role: &RoleSlug) -> AppResult<u64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM auth_user_roles
            WHERE role_slug = $1
            "#,
        )
        .bind(role.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to count role holders: {error}")))?;

        Ok(count.max(0) as u64)
    }

    async fn assign_role(&self, user_id: UserId, role: &RoleSlug) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO auth_user_roles (user_id, role_slug)
            VALUES ($1, $2)
            ON CONFLICT (user_id, role_slug) DO NOTHING
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(role.as_str())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to assign role: {error}")))?;

        Ok(())
    }

    async fn remove_role(&self, user_id: UserId, role: &RoleSlug) -> AppResult<()> {
        sqlx::query(
            r#"
            DELETE FROM auth_user_roles
            WHERE user_id = $1 AND role_slug = $2
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(role.as_str())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to remove role: {error}")))?;

        Ok(())
    }

    async fn grant_permission(&self, user_id: UserId, slug: &PermissionSlug) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO auth_user_grants (user_id, permission_slug)
            VALUES ($1, $2)
            ON CONFLICT (user_id, permission_slug) DO NOTHING
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(slug.as_str())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to grant permission: {error}")))?;

        Ok(())
    }

    async fn revoke_permission(&self, user_id: UserId, slug: &PermissionSlug) -> AppResult<()> {
        sqlx::query(
            r#"
            DELETE FROM auth_user_grants
            WHERE user_id = $1 AND permission_slug = $2
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(slug.as_str())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to revoke permission: {error}")))?;

        Ok(())
    }
}
