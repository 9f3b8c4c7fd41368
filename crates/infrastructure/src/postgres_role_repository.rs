//! PostgreSQL-backed role repository.

use std::collections::BTreeMap;

use async_trait::async_trait;
use sqlx::{FromRow, PgConnection, PgExecutor, PgPool};

use keystone_application::{
    NewRole, Page, PageRequest, PermissionSummary, RoleChanges, RoleRecord, RoleRepository,
    RoleSummary,
};
use keystone_core::{AppError, AppResult, GuardName};
use keystone_domain::{PermissionId, RoleId};

use crate::postgres_rbac_guard::{
    Reference, begin, commit, conflict_or_internal, ensure_holder_remains, lock_references,
    lock_super_admin_holders,
};

#[cfg(test)]
mod tests;

/// PostgreSQL implementation of the role repository port.
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

const ROLE_CONSTRAINTS: &[(&str, &str)] = &[("roles_guard_name_name_key", "name")];

const SELECT_ROLES: &str = r#"
    SELECT
        id,
        name,
        guard_name,
        to_char(created_at AT TIME ZONE 'UTC', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at,
        to_char(updated_at AT TIME ZONE 'UTC', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS updated_at
    FROM roles
"#;

#[derive(Debug, FromRow)]
struct RoleRow {
    id: i64,
    name: String,
    guard_name: String,
    created_at: String,
    updated_at: String,
}

#[derive(Debug, FromRow)]
struct RolePermissionRow {
    role_id: i64,
    permission_id: i64,
    permission_name: String,
}

async fn attach_permissions<'e>(
    executor: impl PgExecutor<'e>,
    rows: Vec<RoleRow>,
) -> AppResult<Vec<RoleRecord>> {
    let role_ids: Vec<i64> = rows.iter().map(|row| row.id).collect();

    let permission_rows = sqlx::query_as::<_, RolePermissionRow>(
        r#"
        SELECT
            role_permissions.role_id,
            permissions.id AS permission_id,
            permissions.name AS permission_name
        FROM role_permissions
        INNER JOIN permissions
            ON permissions.id = role_permissions.permission_id
        WHERE role_permissions.role_id = ANY($1)
        ORDER BY permissions.name
        "#,
    )
    .bind(&role_ids)
    .fetch_all(executor)
    .await
    .map_err(|error| AppError::Internal(format!("failed to load role permissions: {error}")))?;

    let mut permissions_by_role: BTreeMap<i64, Vec<PermissionSummary>> = BTreeMap::new();
    for permission_row in permission_rows {
        permissions_by_role
            .entry(permission_row.role_id)
            .or_default()
            .push(PermissionSummary {
                permission_id: PermissionId::new(permission_row.permission_id),
                name: permission_row.permission_name,
            });
    }

    rows.into_iter()
        .map(|row| {
            Ok(RoleRecord {
                role_id: RoleId::new(row.id),
                permissions: permissions_by_role.remove(&row.id).unwrap_or_default(),
                guard_name: GuardName::new(row.guard_name)?,
                name: row.name,
                created_at: row.created_at,
                updated_at: row.updated_at,
            })
        })
        .collect()
}

async fn find_by_id(connection: &mut PgConnection, role_id: i64) -> AppResult<Option<RoleRecord>> {
    let query = format!("{SELECT_ROLES} WHERE id = $1");
    let row = sqlx::query_as::<_, RoleRow>(query.as_str())
        .bind(role_id)
        .fetch_optional(&mut *connection)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find role: {error}")))?;

    let Some(row) = row else {
        return Ok(None);
    };

    Ok(attach_permissions(connection, vec![row]).await?.into_iter().next())
}

async fn reload(connection: &mut PgConnection, role_id: i64) -> AppResult<RoleRecord> {
    find_by_id(connection, role_id)
        .await?
        .ok_or_else(|| AppError::Internal(format!("role '{role_id}' vanished during write")))
}

async fn replace_permissions(
    connection: &mut PgConnection,
    role_id: i64,
    permission_ids: &[PermissionId],
) -> AppResult<()> {
    sqlx::query("DELETE FROM role_permissions WHERE role_id = $1")
        .bind(role_id)
        .execute(&mut *connection)
        .await
        .map_err(|error| AppError::Internal(format!("failed to clear role permissions: {error}")))?;

    insert_permissions(connection, role_id, permission_ids).await
}

async fn insert_permissions(
    connection: &mut PgConnection,
    role_id: i64,
    permission_ids: &[PermissionId],
) -> AppResult<()> {
    if permission_ids.is_empty() {
        return Ok(());
    }

    let permission_ids: Vec<i64> = permission_ids
        .iter()
        .map(|permission_id| permission_id.get())
        .collect();
    lock_references(&mut *connection, Reference::Permissions, &permission_ids).await?;

    sqlx::query(
        r#"
        INSERT INTO role_permissions (role_id, permission_id)
        SELECT $1, UNNEST($2::BIGINT[])
        ON CONFLICT (role_id, permission_id) DO NOTHING
        "#,
    )
    .bind(role_id)
    .bind(&permission_ids)
    .execute(connection)
    .await
    .map_err(|error| AppError::Internal(format!("failed to persist role permissions: {error}")))?;

    Ok(())
}

async fn lock_role(connection: &mut PgConnection, role_id: RoleId) -> AppResult<()> {
    let locked = sqlx::query_scalar::<_, i64>("SELECT id FROM roles WHERE id = $1 FOR UPDATE")
        .bind(role_id.get())
        .fetch_optional(connection)
        .await
        .map_err(|error| AppError::Internal(format!("failed to lock role: {error}")))?;

    match locked {
        Some(_) => Ok(()),
        None => Err(AppError::NotFound(format!("role '{role_id}' does not exist"))),
    }
}

#[async_trait]
impl RoleRepository for PostgresRoleRepository {
    async fn list_roles(&self, page: PageRequest) -> AppResult<Page<RoleRecord>> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM roles")
            .fetch_one(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to count roles: {error}")))?;

        let query = format!("{SELECT_ROLES} ORDER BY id LIMIT $1 OFFSET $2");
        let rows = sqlx::query_as::<_, RoleRow>(query.as_str())
            .bind(i64::from(page.per_page()))
            .bind(i64::try_from(page.offset()).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to list roles: {error}")))?;

        let items = attach_permissions(&self.pool, rows).await?;
        Ok(Page::new(page, items, u64::try_from(total).unwrap_or_default()))
    }

    async fn find_role(&self, role_id: RoleId) -> AppResult<Option<RoleRecord>> {
        let mut connection = self
            .pool
            .acquire()
            .await
            .map_err(|error| AppError::Internal(format!("failed to acquire connection: {error}")))?;
        find_by_id(&mut connection, role_id.get()).await
    }

    async fn find_role_by_name(
        &self,
        guard_name: &GuardName,
        name: &str,
    ) -> AppResult<Option<RoleRecord>> {
        let query = format!("{SELECT_ROLES} WHERE guard_name = $1 AND name = $2");
        let row = sqlx::query_as::<_, RoleRow>(query.as_str())
            .bind(guard_name.as_str())
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to find role by name: {error}")))?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(attach_permissions(&self.pool, vec![row])
            .await?
            .into_iter()
            .next())
    }

    async fn find_roles_by_ids(&self, role_ids: &[RoleId]) -> AppResult<Vec<RoleSummary>> {
        let role_ids: Vec<i64> = role_ids.iter().map(|role_id| role_id.get()).collect();

        let rows = sqlx::query_as::<_, (i64, String)>(
            r#"
            SELECT id, name
            FROM roles
            WHERE id = ANY($1)
            ORDER BY id
            "#,
        )
        .bind(&role_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to resolve roles: {error}")))?;

        Ok(rows
            .into_iter()
            .map(|(role_id, name)| RoleSummary {
                role_id: RoleId::new(role_id),
                name,
            })
            .collect())
    }

    async fn create_role(&self, input: NewRole) -> AppResult<RoleRecord> {
        let mut transaction = begin(&self.pool).await?;

        let role_id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO roles (name, guard_name)
            VALUES ($1, $2)
            RETURNING id
            "#,
        )
        .bind(input.name.as_str())
        .bind(input.guard_name.as_str())
        .fetch_one(&mut *transaction)
        .await
        .map_err(|error| conflict_or_internal(error, "create role", ROLE_CONSTRAINTS))?;

        insert_permissions(&mut transaction, role_id, &input.permission_ids).await?;

        let role = reload(&mut transaction, role_id).await?;
        commit(transaction).await?;
        Ok(role)
    }

    async fn update_role(&self, role_id: RoleId, changes: RoleChanges) -> AppResult<RoleRecord> {
        let mut transaction = begin(&self.pool).await?;
        lock_role(&mut transaction, role_id).await?;

        sqlx::query(
            r#"
            UPDATE roles
            SET name = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(role_id.get())
        .bind(changes.name.as_str())
        .execute(&mut *transaction)
        .await
        .map_err(|error| conflict_or_internal(error, "update role", ROLE_CONSTRAINTS))?;

        if let Some(permission_ids) = changes.permission_ids.as_deref() {
            replace_permissions(&mut transaction, role_id.get(), permission_ids).await?;
        }

        let role = reload(&mut transaction, role_id.get()).await?;
        commit(transaction).await?;
        Ok(role)
    }

    async fn delete_role(&self, role_id: RoleId) -> AppResult<()> {
        let mut transaction = begin(&self.pool).await?;
        let holders_before = lock_super_admin_holders(&mut transaction).await?;
        lock_role(&mut transaction, role_id).await?;

        // Assignments and grants go with the role through ON DELETE CASCADE.
        sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(role_id.get())
            .execute(&mut *transaction)
            .await
            .map_err(|error| AppError::Internal(format!("failed to delete role: {error}")))?;

        ensure_holder_remains(&mut transaction, holders_before).await?;
        commit(transaction).await
    }

    async fn set_permissions_for_role(
        &self,
        role_id: RoleId,
        permission_ids: &[PermissionId],
    ) -> AppResult<RoleRecord> {
        let mut transaction = begin(&self.pool).await?;
        lock_role(&mut transaction, role_id).await?;

        replace_permissions(&mut transaction, role_id.get(), permission_ids).await?;

        let role = reload(&mut transaction, role_id.get()).await?;
        commit(transaction).await?;
        Ok(role)
    }
}
