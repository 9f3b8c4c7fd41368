use async_trait::async_trait;
use keystone_application::{
    AuditRepository, NewUser, Page, PageRequest, UserChanges, UserCredentials, UserRepository,
};

use super::*;

impl RbacTables {
    fn ensure_unique_user(&self, username: &str, email: &str, except: Option<i64>) -> AppResult<()> {
        for (user_id, user) in &self.users {
            if Some(*user_id) == except {
                continue;
            }
            if user.username == username {
                return Err(taken("username"));
            }
            if user.email == email {
                return Err(taken("email"));
            }
        }

        Ok(())
    }

    fn replace_user_roles(&mut self, user_id: i64, role_ids: &[RoleId]) {
        self.user_roles
            .retain(|(stored_user, _)| *stored_user != user_id);
        for role_id in role_ids {
            if self.roles.contains_key(&role_id.get()) {
                self.user_roles.insert((user_id, role_id.get()));
            }
        }
    }

    fn reload_user(&self, user_id: i64) -> AppResult<UserRecord> {
        self.user_record(user_id)
            .ok_or_else(|| AppError::NotFound(format!("user '{user_id}' does not exist")))
    }
}

#[async_trait]
impl UserRepository for InMemoryRbacRepository {
    async fn list_users(&self, page: PageRequest) -> AppResult<Page<UserRecord>> {
        let tables = self.tables.read().await;
        let items = tables
            .users
            .keys()
            .skip(usize::try_from(page.offset()).unwrap_or(usize::MAX))
            .take(usize::try_from(page.per_page()).unwrap_or(usize::MAX))
            .filter_map(|user_id| tables.user_record(*user_id))
            .collect();

        Ok(Page::new(page, items, tables.users.len() as u64))
    }

    async fn find_user(&self, user_id: UserId) -> AppResult<Option<UserRecord>> {
        Ok(self.tables.read().await.user_record(user_id.get()))
    }

    async fn find_user_by_username(&self, username: &str) -> AppResult<Option<UserRecord>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .find(|(_, user)| user.username == username)
            .and_then(|(user_id, _)| tables.user_record(*user_id)))
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<UserRecord>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .find(|(_, user)| user.email == email)
            .and_then(|(user_id, _)| tables.user_record(*user_id)))
    }

    async fn find_credentials_by_username(
        &self,
        username: &str,
    ) -> AppResult<Option<UserCredentials>> {
        Ok(self
            .tables
            .read()
            .await
            .users
            .iter()
            .find(|(_, user)| user.username == username)
            .map(|(user_id, user)| UserCredentials {
                user_id: UserId::new(*user_id),
                username: user.username.clone(),
                name: user.name.clone(),
                password_hash: user.password_hash.clone(),
            }))
    }

    async fn list_super_admin_holders(&self) -> AppResult<BTreeSet<UserId>> {
        Ok(self
            .tables
            .read()
            .await
            .super_admin_holders()
            .into_iter()
            .map(UserId::new)
            .collect())
    }

    async fn create_user(&self, input: NewUser) -> AppResult<UserRecord> {
        let mut tables = self.tables.write().await;
        tables.ensure_unique_user(&input.username, &input.email, None)?;

        tables.next_user_id += 1;
        let user_id = tables.next_user_id;
        if input.is_bootstrap {
            for user in tables.users.values_mut() {
                user.is_bootstrap = false;
            }
        }

        let timestamp = now();
        tables.users.insert(
            user_id,
            StoredUser {
                name: input.name,
                username: input.username,
                email: input.email,
                password_hash: input.password_hash,
                is_bootstrap: input.is_bootstrap,
                created_at: timestamp.clone(),
                updated_at: timestamp,
            },
        );
        tables.replace_user_roles(user_id, &input.role_ids);

        tables.reload_user(user_id)
    }

    async fn update_user(&self, user_id: UserId, changes: UserChanges) -> AppResult<UserRecord> {
        let mut tables = self.tables.write().await;
        let user_id = user_id.get();
        if !tables.users.contains_key(&user_id) {
            return Err(AppError::NotFound(format!("user '{user_id}' does not exist")));
        }
        tables.ensure_unique_user(&changes.username, &changes.email, Some(user_id))?;

        tables.guarded_write(|tables| {
            if let Some(role_ids) = changes.role_ids.as_deref() {
                tables.replace_user_roles(user_id, role_ids);
            }

            if let Some(user) = tables.users.get_mut(&user_id) {
                user.name = changes.name;
                user.username = changes.username;
                user.email = changes.email;
                if let Some(password_hash) = changes.password_hash {
                    user.password_hash = password_hash;
                }
                user.updated_at = now();
            }

            tables.reload_user(user_id)
        })
    }

    async fn mark_bootstrap_user(&self, user_id: UserId) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&user_id.get()) {
            return Err(AppError::NotFound(format!("user '{user_id}' does not exist")));
        }

        for (stored_id, user) in &mut tables.users {
            user.is_bootstrap = *stored_id == user_id.get();
        }
        Ok(())
    }

    async fn delete_user(&self, user_id: UserId) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        let user_id = user_id.get();

        tables.guarded_write(|tables| {
            if tables.users.remove(&user_id).is_none() {
                return Err(AppError::NotFound(format!("user '{user_id}' does not exist")));
            }
            tables
                .user_roles
                .retain(|(stored_user, _)| *stored_user != user_id);
            Ok(())
        })
    }

    async fn set_roles_for_user(
        &self,
        user_id: UserId,
        role_ids: &[RoleId],
    ) -> AppResult<UserRecord> {
        let mut tables = self.tables.write().await;
        let user_id = user_id.get();
        if !tables.users.contains_key(&user_id) {
            return Err(AppError::NotFound(format!("user '{user_id}' does not exist")));
        }

        tables.guarded_write(|tables| {
            tables.replace_user_roles(user_id, role_ids);
            tables.reload_user(user_id)
        })
    }
}

#[async_trait]
impl AuditRepository for InMemoryRbacRepository {
    async fn append_event(&self, event: AuditEvent) -> AppResult<()> {
        self.tables.write().await.audit_events.push(event);
        Ok(())
    }
}
