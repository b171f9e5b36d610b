use std::collections::BTreeMap;

use async_trait::async_trait;
use sqlx::{FromRow, PgPool};

use cradleguard_application::RoleRepository;
use cradleguard_core::{AppError, AppResult};
use cradleguard_domain::{PermissionSlug, RoleDefinition, RoleSlug};

/// PostgreSQL-backed repository for roles and role grants.
#[derive(Clone)]
pub struct PostgresRoleRepository {
    pool: PgPool,
}

impl PostgresRoleRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct RoleRow {
    slug: String,
    name: String,
    description: String,
    is_system: bool,
    permission_slug: Option<String>,
}

#[async_trait]
impl RoleRepository for PostgresRoleRepository {
    async fn insert(&self, role: RoleDefinition) -> AppResult<()> {
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to begin role insert transaction: {error}"))
        })?;

        sqlx::query(
            r#"
            INSERT INTO auth_roles (slug, name, description, is_system)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(role.slug.as_str())
        .bind(role.name.as_str())
        .bind(role.description.as_str())
        .bind(role.is_system)
        .execute(&mut *transaction)
        .await
        .map_err(|error| map_role_conflict(error, role.slug.as_str()))?;

        for permission in &role.permissions {
            sqlx::query(
                r#"
                INSERT INTO auth_role_grants (role_slug, permission_slug)
                VALUES ($1, $2)
                ON CONFLICT (role_slug, permission_slug) DO NOTHING
                "#,
            )
            .bind(role.slug.as_str())
            .bind(permission.as_str())
            .execute(&mut *transaction)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to persist role grants: {error}"))
            })?;
        }

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit role insert transaction: {error}"))
        })
    }

    async fn find_by_slug(&self, slug: &RoleSlug) -> AppResult<Option<RoleDefinition>> {
        let rows = sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT
                roles.slug,
                roles.name,
                roles.description,
                roles.is_system,
                grants.permission_slug
            FROM auth_roles AS roles
            LEFT JOIN auth_role_grants AS grants
                ON grants.role_slug = roles.slug
            WHERE roles.slug = $1
            "#,
        )
        .bind(slug.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load role: {error}")))?;

        let mut roles = aggregate_roles(rows)?;
        Ok(roles.pop())
    }

    async fn list(&self) -> AppResult<Vec<RoleDefinition>> {
        let rows = sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT
                roles.slug,
                roles.name,
                roles.description,
                roles.is_system,
                grants.permission_slug
            FROM auth_roles AS roles
            LEFT JOIN auth_role_grants AS grants
                ON grants.role_slug = roles.slug
            ORDER BY roles.slug, grants.permission_slug
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list roles: {error}")))?;

        aggregate_roles(rows)
    }

    async fn add_grant(&self, role: &RoleSlug, permission: &PermissionSlug) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO auth_role_grants (role_slug, permission_slug)
            VALUES ($1, $2)
            ON CONFLICT (role_slug, permission_slug) DO NOTHING
            "#,
        )
        .bind(role.as_str())
        .bind(permission.as_str())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to add role grant: {error}")))?;

        Ok(())
    }

    async fn remove_grant(&self, role: &RoleSlug, permission: &PermissionSlug) -> AppResult<()> {
        sqlx::query(
            r#"
            DELETE FROM auth_role_grants
            WHERE role_slug = $1 AND permission_slug = $2
            "#,
        )
        .bind(role.as_str())
        .bind(permission.as_str())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to remove role grant: {error}")))?;

        Ok(())
    }
}

fn aggregate_roles(rows: Vec<RoleRow>) -> AppResult<Vec<RoleDefinition>> {
    let mut by_slug: BTreeMap<String, RoleDefinition> = BTreeMap::new();

    for row in rows {
        let slug = RoleSlug::new(row.slug.as_str()).map_err(|error| {
            AppError::Internal(format!("invalid stored role slug '{}': {error}", row.slug))
        })?;

        let role = by_slug
            .entry(row.slug.clone())
            .or_insert_with(|| RoleDefinition {
                slug,
                name: row.name.clone(),
                description: row.description.clone(),
                is_system: row.is_system,
                permissions: std::collections::BTreeSet::new(),
            });

        if let Some(permission_value) = row.permission_slug {
            let permission = PermissionSlug::new(permission_value.as_str()).map_err(|error| {
                AppError::Internal(format!(
                    "invalid stored permission slug '{permission_value}': {error}"
                ))
            })?;

            role.permissions.insert(permission);
        }
    }

    Ok(by_slug.into_values().collect())
}

fn map_role_conflict(error: sqlx::Error, slug: &str) -> AppError {
    if let sqlx::Error::Database(database_error) = &error
        && database_error.code().as_deref() == Some("23505")
    {
        return AppError::Conflict(format!("role '{slug}' already exists"));
    }

    AppError::Internal(format!("failed to insert role: {error}"))
}
