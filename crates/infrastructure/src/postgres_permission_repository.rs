use async_trait::async_trait;
use sqlx::{FromRow, PgPool};

use cradleguard_application::PermissionRepository;
use cradleguard_core::{AppError, AppResult};
use cradleguard_domain::{PermissionDefinition, PermissionSlug};

/// PostgreSQL-backed permission catalog repository.
#[derive(Clone)]
pub struct PostgresPermissionRepository {
    pool: PgPool,
}

impl PostgresPermissionRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct PermissionRow {
    slug: String,
    display_name: String,
    description: String,
    group_tag: Option<String>,
    parent_slug: Option<String>,
    is_system: bool,
}

impl PermissionRow {
    fn into_definition(self) -> AppResult<PermissionDefinition> {
        let slug = decode_slug(self.slug.as_str())?;
        let parent_slug = self
            .parent_slug
            .as_deref()
            .map(decode_slug)
            .transpose()?;

        Ok(PermissionDefinition {
            slug,
            display_name: self.display_name,
            description: self.description,
            group: self.group_tag,
            parent_slug,
            is_system: self.is_system,
        })
    }
}

fn decode_slug(value: &str) -> AppResult<PermissionSlug> {
    PermissionSlug::new(value).map_err(|error| {
        AppError::Internal(format!("invalid stored permission slug '{value}': {error}"))
    })
}

#[async_trait]
impl PermissionRepository for PostgresPermissionRepository {
    async fn insert(&self, definition: PermissionDefinition) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO auth_permissions (
                slug,
                display_name,
                description,
                group_tag,
                parent_slug,
                is_system
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(definition.slug.as_str())
        .bind(definition.display_name.as_str())
        .bind(definition.description.as_str())
        .bind(definition.group.as_deref())
        .bind(definition.parent_slug.as_ref().map(PermissionSlug::as_str))
        .bind(definition.is_system)
        .execute(&self.pool)
        .await
        .map_err(|error| map_slug_conflict(error, definition.slug.as_str()))?;

        Ok(())
    }

    async fn find_by_slug(
        &self,
        slug: &PermissionSlug,
    ) -> AppResult<Option<PermissionDefinition>> {
        let row = sqlx::query_as::<_, PermissionRow>(
            r#"
            SELECT slug, display_name, description, group_tag, parent_slug, is_system
            FROM auth_permissions
            WHERE slug = $1
            "#,
        )
        .bind(slug.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load permission: {error}")))?;

        row.map(PermissionRow::into_definition).transpose()
    }

    async fn delete(&self, slug: &PermissionSlug) -> AppResult<()> {
        sqlx::query(
            r#"
            DELETE FROM auth_permissions
            WHERE slug = $1
            "#,
        )
        .bind(slug.as_str())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to delete permission: {error}")))?;

        Ok(())
    }

    async fn list_by_group(&self, group: &str) -> AppResult<Vec<PermissionDefinition>> {
        let rows = sqlx::query_as::<_, PermissionRow>(
            r#"
            SELECT slug, display_name, description, group_tag, parent_slug, is_system
            FROM auth_permissions
            WHERE group_tag = $1
            ORDER BY registered_at, slug
            "#,
        )
        .bind(group)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list permissions: {error}")))?;

        rows.into_iter()
            .map(PermissionRow::into_definition)
            .collect()
    }

    async fn is_referenced(&self, slug: &PermissionSlug) -> AppResult<bool> {
        let referenced = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM auth_role_grants WHERE permission_slug = $1
                UNION ALL
                SELECT 1 FROM auth_user_grants WHERE permission_slug = $1
                UNION ALL
                SELECT 1 FROM auth_permissions WHERE parent_slug = $1
            )
            "#,
        )
        .bind(slug.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to check permission references: {error}"))
        })?;

        Ok(referenced)
    }
}

fn map_slug_conflict(error: sqlx::Error, slug: &str) -> AppError {
    if let sqlx::Error::Database(database_error) = &error
        && database_error.code().as_deref() == Some("23505")
    {
        return AppError::Conflict(format!("permission '{slug}' already exists"));
    }

    AppError::Internal(format!("failed to insert permission: {error}"))
}
