use super::*;

use keystone_core::DEFAULT_GUARD;
use keystone_domain::SUPER_ADMIN_ROLE;

const SELECT_USERS: &str = r#"
    SELECT
        id,
        name,
        username,
        email,
        is_bootstrap,
        to_char(created_at AT TIME ZONE 'UTC', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at,
        to_char(updated_at AT TIME ZONE 'UTC', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS updated_at
    FROM users
"#;

/// Single-row lookup key.
pub(super) enum UserFilter<'a> {
    Id(i64),
    Username(&'a str),
    Email(&'a str),
}

impl PostgresUserRepository {
    pub(super) async fn list_users_impl(&self, page: PageRequest) -> AppResult<Page<UserRecord>> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to count users: {error}")))?;

        let query = format!("{SELECT_USERS} ORDER BY id LIMIT $1 OFFSET $2");
        let rows = sqlx::query_as::<_, UserRow>(query.as_str())
            .bind(i64::from(page.per_page()))
            .bind(i64::try_from(page.offset()).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to list users: {error}")))?;

        let items = attach_roles(&self.pool, rows).await?;
        Ok(Page::new(page, items, u64::try_from(total).unwrap_or_default()))
    }

    pub(super) async fn find_one_impl(
        &self,
        filter: UserFilter<'_>,
    ) -> AppResult<Option<UserRecord>> {
        let mut connection = self
            .pool
            .acquire()
            .await
            .map_err(|error| AppError::Internal(format!("failed to acquire connection: {error}")))?;
        find_one(&mut connection, filter).await
    }

    pub(super) async fn find_credentials_by_username_impl(
        &self,
        username: &str,
    ) -> AppResult<Option<UserCredentials>> {
        sqlx::query_as::<_, CredentialsRow>(
            r#"
            SELECT id, username, name, password_hash
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map(|row| row.map(UserCredentials::from))
        .map_err(|error| AppError::Internal(format!("failed to load credentials: {error}")))
    }

    pub(super) async fn list_super_admin_holders_impl(&self) -> AppResult<BTreeSet<UserId>> {
        let user_ids = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT user_roles.user_id
            FROM user_roles
            INNER JOIN roles
                ON roles.id = user_roles.role_id
            WHERE roles.guard_name = $1 AND roles.name = $2
            "#,
        )
        .bind(DEFAULT_GUARD)
        .bind(SUPER_ADMIN_ROLE)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list super admin holders: {error}"))
        })?;

        Ok(user_ids.into_iter().map(UserId::new).collect())
    }
}

/// Loads one user with roles on the given connection.
pub(super) async fn find_one(
    connection: &mut sqlx::PgConnection,
    filter: UserFilter<'_>,
) -> AppResult<Option<UserRecord>> {
    let row = match filter {
        UserFilter::Id(user_id) => {
            let query = format!("{SELECT_USERS} WHERE id = $1");
            sqlx::query_as::<_, UserRow>(query.as_str())
                .bind(user_id)
                .fetch_optional(&mut *connection)
                .await
        }
        UserFilter::Username(username) => {
            let query = format!("{SELECT_USERS} WHERE username = $1");
            sqlx::query_as::<_, UserRow>(query.as_str())
                .bind(username)
                .fetch_optional(&mut *connection)
                .await
        }
        UserFilter::Email(email) => {
            let query = format!("{SELECT_USERS} WHERE email = $1");
            sqlx::query_as::<_, UserRow>(query.as_str())
                .bind(email)
                .fetch_optional(&mut *connection)
                .await
        }
    }
    .map_err(|error| AppError::Internal(format!("failed to find user: {error}")))?;

    let Some(row) = row else {
        return Ok(None);
    };

    Ok(attach_roles(connection, vec![row]).await?.into_iter().next())
}
