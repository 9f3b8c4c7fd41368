//! PostgreSQL-backed user repository.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use sqlx::{FromRow, PgExecutor, PgPool};

use keystone_application::{
    NewUser, Page, PageRequest, RoleSummary, UserChanges, UserCredentials, UserRecord,
    UserRepository,
};
use keystone_core::{AppError, AppResult};
use keystone_domain::{RoleId, UserId};

mod account;
mod lookup;

use lookup::UserFilter;


/// PostgreSQL implementation of the user repository port.
#[derive(Clone)]
pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const USER_CONSTRAINTS: &[(&str, &str)] = &[
    ("users_username_key", "username"),
    ("users_email_key", "email"),
];

#[derive(Debug, FromRow)]
struct UserRow {
    id: i64,
    name: String,
    username: String,
    email: String,
    is_bootstrap: bool,
    created_at: String,
    updated_at: String,
}

#[derive(Debug, FromRow)]
struct UserRoleRow {
    user_id: i64,
    role_id: i64,
    role_name: String,
}

#[derive(Debug, FromRow)]
struct CredentialsRow {
    id: i64,
    username: String,
    name: String,
    password_hash: String,
}

impl From<CredentialsRow> for UserCredentials {
    fn from(row: CredentialsRow) -> Self {
        Self {
            user_id: UserId::new(row.id),
            username: row.username,
            name: row.name,
            password_hash: row.password_hash,
        }
    }
}

/// Loads role names for users and assembles records in row order.
async fn attach_roles<'e>(
    executor: impl PgExecutor<'e>,
    rows: Vec<UserRow>,
) -> AppResult<Vec<UserRecord>> {
    let user_ids: Vec<i64> = rows.iter().map(|row| row.id).collect();

    let role_rows = sqlx::query_as::<_, UserRoleRow>(
        r#"
        SELECT
            user_roles.user_id,
            roles.id AS role_id,
            roles.name AS role_name
        FROM user_roles
        INNER JOIN roles
            ON roles.id = user_roles.role_id
        WHERE user_roles.user_id = ANY($1)
        ORDER BY roles.name
        "#,
    )
    .bind(&user_ids)
    .fetch_all(executor)
    .await
    .map_err(|error| AppError::Internal(format!("failed to load user roles: {error}")))?;

    let mut roles_by_user: BTreeMap<i64, Vec<RoleSummary>> = BTreeMap::new();
    for role_row in role_rows {
        roles_by_user
            .entry(role_row.user_id)
            .or_default()
            .push(RoleSummary {
                role_id: RoleId::new(role_row.role_id),
                name: role_row.role_name,
            });
    }

    Ok(rows
        .into_iter()
        .map(|row| UserRecord {
            user_id: UserId::new(row.id),
            roles: roles_by_user.remove(&row.id).unwrap_or_default(),
            name: row.name,
            username: row.username,
            email: row.email,
            is_bootstrap: row.is_bootstrap,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
        .collect())
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn list_users(&self, page: PageRequest) -> AppResult<Page<UserRecord>> {
        self.list_users_impl(page).await
    }

    async fn find_user(&self, user_id: UserId) -> AppResult<Option<UserRecord>> {
        self.find_one_impl(UserFilter::Id(user_id.get()))
            .await
    }

    async fn find_user_by_username(&self, username: &str) -> AppResult<Option<UserRecord>> {
        self.find_one_impl(UserFilter::Username(username))
            .await
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<UserRecord>> {
        self.find_one_impl(UserFilter::Email(email))
            .await
    }

    async fn find_credentials_by_username(
        &self,
        username: &str,
    ) -> AppResult<Option<UserCredentials>> {
        self.find_credentials_by_username_impl(username).await
    }

    async fn list_super_admin_holders(&self) -> AppResult<BTreeSet<UserId>> {
        self.list_super_admin_holders_impl().await
    }

    async fn create_user(&self, input: NewUser) -> AppResult<UserRecord> {
        self.create_user_impl(input).await
    }

    async fn update_user(&self, user_id: UserId, changes: UserChanges) -> AppResult<UserRecord> {
        self.update_user_impl(user_id, changes).await
    }

    async fn mark_bootstrap_user(&self, user_id: UserId) -> AppResult<()> {
        self.mark_bootstrap_user_impl(user_id).await
    }

    async fn delete_user(&self, user_id: UserId) -> AppResult<()> {
        self.delete_user_impl(user_id).await
    }

    async fn set_roles_for_user(
        &self,
        user_id: UserId,
        role_ids: &[RoleId],
    ) -> AppResult<UserRecord> {
        self.set_roles_for_user_impl(user_id, role_ids).await
    }
}
