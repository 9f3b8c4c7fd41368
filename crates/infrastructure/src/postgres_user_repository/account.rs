use super::*;

use sqlx::PgConnection;

use super::lookup::find_one;
use crate::postgres_rbac_guard::{
    Reference, begin, commit, conflict_or_internal, ensure_holder_remains, lock_references,
    lock_super_admin_holders,
};

impl PostgresUserRepository {
    pub(super) async fn create_user_impl(&self, input: NewUser) -> AppResult<UserRecord> {
        let mut transaction = begin(&self.pool).await?;

        let user_id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO users (name, username, email, password_hash, is_bootstrap)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(input.name.as_str())
        .bind(input.username.as_str())
        .bind(input.email.as_str())
        .bind(input.password_hash.as_str())
        .bind(input.is_bootstrap)
        .fetch_one(&mut *transaction)
        .await
        .map_err(|error| conflict_or_internal(error, "create user", USER_CONSTRAINTS))?;

        insert_user_roles(&mut transaction, user_id, &input.role_ids).await?;

        let user = reload(&mut transaction, user_id).await?;
        commit(transaction).await?;
        Ok(user)
    }

    pub(super) async fn update_user_impl(
        &self,
        user_id: UserId,
        changes: UserChanges,
    ) -> AppResult<UserRecord> {
        let mut transaction = begin(&self.pool).await?;
        let holders_before = lock_super_admin_holders(&mut transaction).await?;

        let rows_affected = sqlx::query(
            r#"
            UPDATE users
            SET name = $2,
                username = $3,
                email = $4,
                password_hash = COALESCE($5, password_hash),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(user_id.get())
        .bind(changes.name.as_str())
        .bind(changes.username.as_str())
        .bind(changes.email.as_str())
        .bind(changes.password_hash.as_deref())
        .execute(&mut *transaction)
        .await
        .map_err(|error| conflict_or_internal(error, "update user", USER_CONSTRAINTS))?
        .rows_affected();

        if rows_affected == 0 {
            return Err(missing_user(user_id));
        }

        if let Some(role_ids) = changes.role_ids.as_deref() {
            replace_user_roles(&mut transaction, user_id.get(), role_ids).await?;
            ensure_holder_remains(&mut transaction, holders_before).await?;
        }

        let user = reload(&mut transaction, user_id.get()).await?;
        commit(transaction).await?;
        Ok(user)
    }

    pub(super) async fn mark_bootstrap_user_impl(&self, user_id: UserId) -> AppResult<()> {
        let mut transaction = begin(&self.pool).await?;

        sqlx::query(
            r#"
            UPDATE users
            SET is_bootstrap = FALSE
            WHERE is_bootstrap AND id <> $1
            "#,
        )
        .bind(user_id.get())
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to clear bootstrap flag: {error}"))
        })?;

        let rows_affected = sqlx::query(
            r#"
            UPDATE users
            SET is_bootstrap = TRUE, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(user_id.get())
        .execute(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to mark bootstrap user: {error}")))?
        .rows_affected();

        if rows_affected == 0 {
            return Err(missing_user(user_id));
        }

        commit(transaction).await
    }

    pub(super) async fn delete_user_impl(&self, user_id: UserId) -> AppResult<()> {
        let mut transaction = begin(&self.pool).await?;
        let holders_before = lock_super_admin_holders(&mut transaction).await?;

        let rows_affected = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id.get())
            .execute(&mut *transaction)
            .await
            .map_err(|error| AppError::Internal(format!("failed to delete user: {error}")))?
            .rows_affected();

        if rows_affected == 0 {
            return Err(missing_user(user_id));
        }

        ensure_holder_remains(&mut transaction, holders_before).await?;
        commit(transaction).await
    }

    pub(super) async fn set_roles_for_user_impl(
        &self,
        user_id: UserId,
        role_ids: &[RoleId],
    ) -> AppResult<UserRecord> {
        let mut transaction = begin(&self.pool).await?;
        let holders_before = lock_super_admin_holders(&mut transaction).await?;

        let exists = sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id.get())
            .fetch_optional(&mut *transaction)
            .await
            .map_err(|error| AppError::Internal(format!("failed to lock user: {error}")))?;
        if exists.is_none() {
            return Err(missing_user(user_id));
        }

        replace_user_roles(&mut transaction, user_id.get(), role_ids).await?;
        ensure_holder_remains(&mut transaction, holders_before).await?;

        let user = reload(&mut transaction, user_id.get()).await?;
        commit(transaction).await?;
        Ok(user)
    }
}

async fn replace_user_roles(
    connection: &mut PgConnection,
    user_id: i64,
    role_ids: &[RoleId],
) -> AppResult<()> {
    sqlx::query("DELETE FROM user_roles WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut *connection)
        .await
        .map_err(|error| AppError::Internal(format!("failed to clear user roles: {error}")))?;

    insert_user_roles(connection, user_id, role_ids).await
}

async fn insert_user_roles(
    connection: &mut PgConnection,
    user_id: i64,
    role_ids: &[RoleId],
) -> AppResult<()> {
    if role_ids.is_empty() {
        return Ok(());
    }

    let role_ids: Vec<i64> = role_ids.iter().map(|role_id| role_id.get()).collect();
    lock_references(&mut *connection, Reference::Roles, &role_ids).await?;

    sqlx::query(
        r#"
        INSERT INTO user_roles (user_id, role_id)
        SELECT $1, UNNEST($2::BIGINT[])
        ON CONFLICT (user_id, role_id) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(&role_ids)
    .execute(connection)
    .await
    .map_err(|error| AppError::Internal(format!("failed to assign user roles: {error}")))?;

    Ok(())
}

async fn reload(connection: &mut PgConnection, user_id: i64) -> AppResult<UserRecord> {
    find_one(connection, UserFilter::Id(user_id))
        .await?
        .ok_or_else(|| AppError::Internal(format!("user '{user_id}' vanished during write")))
}

fn missing_user(user_id: UserId) -> AppError {
    AppError::NotFound(format!("user '{user_id}' does not exist"))
}
