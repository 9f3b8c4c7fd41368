//! PostgreSQL-backed permission repository.

use std::collections::BTreeSet;

use async_trait::async_trait;
use sqlx::{FromRow, PgPool};

use keystone_application::{
    Page, PageRequest, PermissionChanges, PermissionRecord, PermissionRepository,
};
use keystone_core::{AppError, AppResult, GuardName};
use keystone_domain::PermissionId;

use crate::postgres_rbac_guard::conflict_or_internal;


/// PostgreSQL implementation of the permission repository port.
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

const PERMISSION_CONSTRAINTS: &[(&str, &str)] = &[("permissions_guard_name_name_key", "name")];

const PERMISSION_COLUMNS: &str = r#"
    id,
    name,
    guard_name,
    to_char(created_at AT TIME ZONE 'UTC', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at,
    to_char(updated_at AT TIME ZONE 'UTC', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS updated_at
"#;

#[derive(Debug, FromRow)]
struct PermissionRow {
    id: i64,
    name: String,
    guard_name: String,
    created_at: String,
    updated_at: String,
}

impl TryFrom<PermissionRow> for PermissionRecord {
    type Error = AppError;

    fn try_from(row: PermissionRow) -> AppResult<Self> {
        Ok(Self {
            permission_id: PermissionId::new(row.id),
            name: row.name,
            guard_name: GuardName::new(row.guard_name)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_record(row: Option<PermissionRow>) -> AppResult<Option<PermissionRecord>> {
    row.map(PermissionRecord::try_from).transpose()
}

#[async_trait]
impl PermissionRepository for PostgresPermissionRepository {
    async fn list_permissions(&self, page: PageRequest) -> AppResult<Page<PermissionRecord>> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM permissions")
            .fetch_one(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to count permissions: {error}")))?;

        let query =
            format!("SELECT {PERMISSION_COLUMNS} FROM permissions ORDER BY id LIMIT $1 OFFSET $2");
        let rows = sqlx::query_as::<_, PermissionRow>(query.as_str())
            .bind(i64::from(page.per_page()))
            .bind(i64::try_from(page.offset()).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to list permissions: {error}")))?;

        let items = rows
            .into_iter()
            .map(PermissionRecord::try_from)
            .collect::<AppResult<Vec<_>>>()?;
        Ok(Page::new(page, items, u64::try_from(total).unwrap_or_default()))
    }

    async fn find_permission(
        &self,
        permission_id: PermissionId,
    ) -> AppResult<Option<PermissionRecord>> {
        let query = format!("SELECT {PERMISSION_COLUMNS} FROM permissions WHERE id = $1");
        let row = sqlx::query_as::<_, PermissionRow>(query.as_str())
            .bind(permission_id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to find permission: {error}")))?;

        into_record(row)
    }

    async fn find_permission_by_name(
        &self,
        guard_name: &GuardName,
        name: &str,
    ) -> AppResult<Option<PermissionRecord>> {
        let query = format!(
            "SELECT {PERMISSION_COLUMNS} FROM permissions WHERE guard_name = $1 AND name = $2"
        );
        let row = sqlx::query_as::<_, PermissionRow>(query.as_str())
            .bind(guard_name.as_str())
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to find permission by name: {error}"))
            })?;

        into_record(row)
    }

    async fn find_existing_permission_ids(
        &self,
        permission_ids: &[PermissionId],
    ) -> AppResult<BTreeSet<PermissionId>> {
        let requested: Vec<i64> = permission_ids
            .iter()
            .map(|permission_id| permission_id.get())
            .collect();

        let existing = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT id
            FROM permissions
            WHERE id = ANY($1)
            "#,
        )
        .bind(&requested)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to resolve permissions: {error}")))?;

        Ok(existing.into_iter().map(PermissionId::new).collect())
    }

    async fn list_all_permission_ids(
        &self,
        guard_name: &GuardName,
    ) -> AppResult<Vec<PermissionId>> {
        let permission_ids = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT id
            FROM permissions
            WHERE guard_name = $1
            ORDER BY id
            "#,
        )
        .bind(guard_name.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list permission ids: {error}")))?;

        Ok(permission_ids.into_iter().map(PermissionId::new).collect())
    }

    async fn create_permission(
        &self,
        guard_name: &GuardName,
        name: &str,
    ) -> AppResult<PermissionRecord> {
        let query = format!(
            "INSERT INTO permissions (name, guard_name) VALUES ($1, $2) RETURNING {PERMISSION_COLUMNS}"
        );
        let row = sqlx::query_as::<_, PermissionRow>(query.as_str())
            .bind(name)
            .bind(guard_name.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|error| {
                conflict_or_internal(error, "create permission", PERMISSION_CONSTRAINTS)
            })?;

        PermissionRecord::try_from(row)
    }

    async fn update_permission(
        &self,
        permission_id: PermissionId,
        changes: PermissionChanges,
    ) -> AppResult<PermissionRecord> {
        let query = format!(
            "UPDATE permissions SET name = $2, updated_at = NOW() WHERE id = $1 RETURNING {PERMISSION_COLUMNS}"
        );
        let row = sqlx::query_as::<_, PermissionRow>(query.as_str())
            .bind(permission_id.get())
            .bind(changes.name.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| {
                conflict_or_internal(error, "update permission", PERMISSION_CONSTRAINTS)
            })?;

        into_record(row)?.ok_or_else(|| {
            AppError::NotFound(format!("permission '{permission_id}' does not exist"))
        })
    }

    async fn delete_permission(&self, permission_id: PermissionId) -> AppResult<()> {
        // Role grants go with the permission through ON DELETE CASCADE.
        let rows_affected = sqlx::query("DELETE FROM permissions WHERE id = $1")
            .bind(permission_id.get())
            .execute(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to delete permission: {error}")))?
            .rows_affected();

        if rows_affected == 0 {
            return Err(AppError::NotFound(format!(
                "permission '{permission_id}' does not exist"
            )));
        }

        Ok(())
    }
}
