//! Shared fakes for application service tests.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use tokio::sync::Mutex;

use keystone_core::{AppError, AppResult, DenyReason, GuardName, UserIdentity};
use keystone_domain::{PermissionId, RoleId, SUPER_ADMIN_ROLE, UserId};

use crate::PasswordHasher;
use crate::security_admin_ports::{
    AuditEvent, AuditRepository, NewRole, NewUser, Page, PageRequest, PermissionChanges,
    PermissionRecord, PermissionRepository, PermissionSummary, RoleChanges, RoleRecord,
    RoleRepository, RoleSummary, UserChanges, UserCredentials, UserRecord, UserRepository,
};

const TIMESTAMP: &str = "2026-01-01T00:00:00Z";

/// Hasher that keeps passwords readable so tests stay fast.
pub struct PlainPasswordHasher;

impl PasswordHasher for PlainPasswordHasher {
    fn hash_password(&self, password: &str) -> AppResult<String> {
        Ok(format!("plain:{password}"))
    }

    fn verify_password(&self, password: &str, hash: &str) -> AppResult<bool> {
        Ok(hash == format!("plain:{password}"))
    }
}

struct FakeUser {
    name: String,
    username: String,
    email: String,
    password_hash: String,
    is_bootstrap: bool,
}

#[derive(Default)]
struct FakeState {
    next_id: i64,
    users: BTreeMap<i64, FakeUser>,
    roles: BTreeMap<i64, String>,
    permissions: BTreeMap<i64, String>,
    user_roles: BTreeSet<(i64, i64)>,
    role_permissions: BTreeSet<(i64, i64)>,
}

impl FakeState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn role_record(&self, role_id: i64) -> Option<RoleRecord> {
        let name = self.roles.get(&role_id)?;
        let mut permissions: Vec<PermissionSummary> = self
            .role_permissions
            .iter()
            .filter(|(stored_role, _)| *stored_role == role_id)
            .filter_map(|(_, permission_id)| {
                self.permissions
                    .get(permission_id)
                    .map(|name| PermissionSummary {
                        permission_id: PermissionId::new(*permission_id),
                        name: name.clone(),
                    })
            })
            .collect();
        permissions.sort_by(|left, right| left.name.cmp(&right.name));

        Some(RoleRecord {
            role_id: RoleId::new(role_id),
            name: name.clone(),
            guard_name: GuardName::default(),
            permissions,
            created_at: TIMESTAMP.to_owned(),
            updated_at: TIMESTAMP.to_owned(),
        })
    }

    fn user_record(&self, user_id: i64) -> Option<UserRecord> {
        let user = self.users.get(&user_id)?;
        let mut roles: Vec<RoleSummary> = self
            .user_roles
            .iter()
            .filter(|(stored_user, _)| *stored_user == user_id)
            .filter_map(|(_, role_id)| {
                self.roles.get(role_id).map(|name| RoleSummary {
                    role_id: RoleId::new(*role_id),
                    name: name.clone(),
                })
            })
            .collect();
        roles.sort_by(|left, right| left.name.cmp(&right.name));

        Some(UserRecord {
            user_id: UserId::new(user_id),
            name: user.name.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            is_bootstrap: user.is_bootstrap,
            roles,
            created_at: TIMESTAMP.to_owned(),
            updated_at: TIMESTAMP.to_owned(),
        })
    }

    fn permission_record(&self, permission_id: i64) -> Option<PermissionRecord> {
        self.permissions
            .get(&permission_id)
            .map(|name| PermissionRecord {
                permission_id: PermissionId::new(permission_id),
                name: name.clone(),
                guard_name: GuardName::default(),
                created_at: TIMESTAMP.to_owned(),
                updated_at: TIMESTAMP.to_owned(),
            })
    }

    fn super_admin_holders(&self) -> BTreeSet<UserId> {
        let super_admin_ids: BTreeSet<i64> = self
            .roles
            .iter()
            .filter(|(_, name)| name.as_str() == SUPER_ADMIN_ROLE)
            .map(|(role_id, _)| *role_id)
            .collect();

        self.user_roles
            .iter()
            .filter(|(_, role_id)| super_admin_ids.contains(role_id))
            .map(|(user_id, _)| UserId::new(*user_id))
            .collect()
    }

    fn replace_user_roles(&mut self, user_id: i64, role_ids: &[RoleId]) {
        self.user_roles.retain(|(stored_user, _)| *stored_user != user_id);
        for role_id in role_ids {
            self.user_roles.insert((user_id, role_id.get()));
        }
    }

    fn replace_role_permissions(&mut self, role_id: i64, permission_ids: &[PermissionId]) {
        self.role_permissions
            .retain(|(stored_role, _)| *stored_role != role_id);
        for permission_id in permission_ids {
            self.role_permissions.insert((role_id, permission_id.get()));
        }
    }
}

fn page_of<T>(request: PageRequest, rows: Vec<T>) -> Page<T> {
    let total = rows.len() as u64;
    let items = rows
        .into_iter()
        .skip(usize::try_from(request.offset()).unwrap_or(usize::MAX))
        .take(request.per_page() as usize)
        .collect();
    Page::new(request, items, total)
}

/// In-process store implementing every repository port.
///
/// Writes that would leave no Super Admin holder are rolled back, as the
/// real adapters do inside their transactions.
#[derive(Default)]
pub struct FakeRbacStore {
    state: Mutex<FakeState>,
    /// Audit events appended so far.
    pub events: Mutex<Vec<AuditEvent>>,
}

impl FakeRbacStore {
    /// Inserts a permission and returns its id.
    pub async fn seed_permission(&self, name: &str) -> i64 {
        let mut state = self.state.lock().await;
        let permission_id = state.next_id();
        state.permissions.insert(permission_id, name.to_owned());
        permission_id
    }

    /// Inserts a role with permissions and returns its id.
    pub async fn seed_role(&self, name: &str, permission_ids: &[i64]) -> i64 {
        let mut state = self.state.lock().await;
        let role_id = state.next_id();
        state.roles.insert(role_id, name.to_owned());
        for permission_id in permission_ids {
            state.role_permissions.insert((role_id, *permission_id));
        }
        role_id
    }

    /// Inserts a user holding the named roles, creating missing roles.
    pub async fn seed_user(&self, username: &str, role_names: &[&str]) -> UserIdentity {
        let mut state = self.state.lock().await;
        let user_id = state.next_id();
        state.users.insert(
            user_id,
            FakeUser {
                name: username.to_owned(),
                username: username.to_owned(),
                email: format!("{username}@example.test"),
                password_hash: "plain:password".to_owned(),
                is_bootstrap: false,
            },
        );

        for role_name in role_names {
            let existing = state
                .roles
                .iter()
                .find(|(_, name)| name.as_str() == *role_name)
                .map(|(role_id, _)| *role_id);
            let role_id = match existing {
                Some(role_id) => role_id,
                None => {
                    let role_id = state.next_id();
                    state.roles.insert(role_id, (*role_name).to_owned());
                    role_id
                }
            };
            state.user_roles.insert((user_id, role_id));
        }

        UserIdentity::new(user_id, username, username)
    }

    /// Flags a seeded user as the bootstrap identity.
    pub async fn set_bootstrap(&self, user_id: i64) {
        if let Some(user) = self.state.lock().await.users.get_mut(&user_id) {
            user.is_bootstrap = true;
        }
    }

    /// Returns the number of users.
    pub async fn user_count(&self) -> usize {
        self.state.lock().await.users.len()
    }

    /// Returns the number of role-permission rows.
    pub async fn role_permission_count(&self) -> usize {
        self.state.lock().await.role_permissions.len()
    }

    /// Returns the number of user-role rows.
    pub async fn user_role_count(&self) -> usize {
        self.state.lock().await.user_roles.len()
    }
}

/// Rolls user-role rows back when a write removed the last Super Admin holder.
fn restore_if_no_holder(state: &mut FakeState, previous: BTreeSet<(i64, i64)>) -> AppResult<()> {
    if state.super_admin_holders().is_empty() {
        let current = std::mem::replace(&mut state.user_roles, previous);
        if !state.super_admin_holders().is_empty() {
            return Err(AppError::Forbidden(DenyReason::LastAdminProtected));
        }
        state.user_roles = current;
    }

    Ok(())
}

#[async_trait]
impl UserRepository for FakeRbacStore {
    async fn list_users(&self, page: PageRequest) -> AppResult<Page<UserRecord>> {
        let state = self.state.lock().await;
        let rows = state
            .users
            .keys()
            .filter_map(|user_id| state.user_record(*user_id))
            .collect();
        Ok(page_of(page, rows))
    }

    async fn find_user(&self, user_id: UserId) -> AppResult<Option<UserRecord>> {
        Ok(self.state.lock().await.user_record(user_id.get()))
    }

    async fn find_user_by_username(&self, username: &str) -> AppResult<Option<UserRecord>> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .iter()
            .find(|(_, user)| user.username == username)
            .and_then(|(user_id, _)| state.user_record(*user_id)))
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<UserRecord>> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .iter()
            .find(|(_, user)| user.email == email)
            .and_then(|(user_id, _)| state.user_record(*user_id)))
    }

    async fn find_credentials_by_username(
        &self,
        username: &str,
    ) -> AppResult<Option<UserCredentials>> {
        let state = self.state.lock().await;
        Ok(state
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
        Ok(self.state.lock().await.super_admin_holders())
    }

    async fn create_user(&self, input: NewUser) -> AppResult<UserRecord> {
        let mut state = self.state.lock().await;
        let user_id = state.next_id();
        state.users.insert(
            user_id,
            FakeUser {
                name: input.name,
                username: input.username,
                email: input.email,
                password_hash: input.password_hash,
                is_bootstrap: input.is_bootstrap,
            },
        );
        state.replace_user_roles(user_id, &input.role_ids);
        state
            .user_record(user_id)
            .ok_or_else(|| AppError::Internal("created user vanished".to_owned()))
    }

    async fn update_user(&self, user_id: UserId, changes: UserChanges) -> AppResult<UserRecord> {
        let mut state = self.state.lock().await;
        if !state.users.contains_key(&user_id.get()) {
            return Err(AppError::NotFound(format!("user '{user_id}' does not exist")));
        }

        if let Some(role_ids) = changes.role_ids {
            let previous = state.user_roles.clone();
            state.replace_user_roles(user_id.get(), &role_ids);
            restore_if_no_holder(&mut state, previous)?;
        }

        if let Some(user) = state.users.get_mut(&user_id.get()) {
            user.name = changes.name;
            user.username = changes.username;
            user.email = changes.email;
            if let Some(password_hash) = changes.password_hash {
                user.password_hash = password_hash;
            }
        }

        state
            .user_record(user_id.get())
            .ok_or_else(|| AppError::Internal("updated user vanished".to_owned()))
    }

    async fn mark_bootstrap_user(&self, user_id: UserId) -> AppResult<()> {
        self.set_bootstrap(user_id.get()).await;
        Ok(())
    }

    async fn delete_user(&self, user_id: UserId) -> AppResult<()> {
        let mut state = self.state.lock().await;
        let previous = state.user_roles.clone();
        state
            .user_roles
            .retain(|(stored_user, _)| *stored_user != user_id.get());
        restore_if_no_holder(&mut state, previous)?;

        state.users.remove(&user_id.get());
        Ok(())
    }

    async fn set_roles_for_user(
        &self,
        user_id: UserId,
        role_ids: &[RoleId],
    ) -> AppResult<UserRecord> {
        self.update_roles_only(user_id, role_ids).await
    }
}

impl FakeRbacStore {
    async fn update_roles_only(
        &self,
        user_id: UserId,
        role_ids: &[RoleId],
    ) -> AppResult<UserRecord> {
        let mut state = self.state.lock().await;
        let previous = state.user_roles.clone();
        state.replace_user_roles(user_id.get(), role_ids);
        restore_if_no_holder(&mut state, previous)?;

        state
            .user_record(user_id.get())
            .ok_or_else(|| AppError::NotFound(format!("user '{user_id}' does not exist")))
    }
}

#[async_trait]
impl RoleRepository for FakeRbacStore {
    async fn list_roles(&self, page: PageRequest) -> AppResult<Page<RoleRecord>> {
        let state = self.state.lock().await;
        let rows = state
            .roles
            .keys()
            .filter_map(|role_id| state.role_record(*role_id))
            .collect();
        Ok(page_of(page, rows))
    }

    async fn find_role(&self, role_id: RoleId) -> AppResult<Option<RoleRecord>> {
        Ok(self.state.lock().await.role_record(role_id.get()))
    }

    async fn find_role_by_name(
        &self,
        _guard_name: &GuardName,
        name: &str,
    ) -> AppResult<Option<RoleRecord>> {
        let state = self.state.lock().await;
        Ok(state
            .roles
            .iter()
            .find(|(_, stored)| stored.as_str() == name)
            .and_then(|(role_id, _)| state.role_record(*role_id)))
    }

    async fn find_roles_by_ids(&self, role_ids: &[RoleId]) -> AppResult<Vec<RoleSummary>> {
        let state = self.state.lock().await;
        Ok(role_ids
            .iter()
            .filter_map(|role_id| {
                state.roles.get(&role_id.get()).map(|name| RoleSummary {
                    role_id: *role_id,
                    name: name.clone(),
                })
            })
            .collect())
    }

    async fn create_role(&self, input: NewRole) -> AppResult<RoleRecord> {
        let mut state = self.state.lock().await;
        let role_id = state.next_id();
        state.roles.insert(role_id, input.name);
        state.replace_role_permissions(role_id, &input.permission_ids);
        state
            .role_record(role_id)
            .ok_or_else(|| AppError::Internal("created role vanished".to_owned()))
    }

    async fn update_role(&self, role_id: RoleId, changes: RoleChanges) -> AppResult<RoleRecord> {
        let mut state = self.state.lock().await;
        state.roles.insert(role_id.get(), changes.name);
        if let Some(permission_ids) = changes.permission_ids {
            state.replace_role_permissions(role_id.get(), &permission_ids);
        }
        state
            .role_record(role_id.get())
            .ok_or_else(|| AppError::Internal("updated role vanished".to_owned()))
    }

    async fn delete_role(&self, role_id: RoleId) -> AppResult<()> {
        let mut state = self.state.lock().await;
        let previous = state.user_roles.clone();
        state
            .user_roles
            .retain(|(_, stored_role)| *stored_role != role_id.get());
        restore_if_no_holder(&mut state, previous)?;
        state
            .role_permissions
            .retain(|(stored_role, _)| *stored_role != role_id.get());
        state.roles.remove(&role_id.get());
        Ok(())
    }

    async fn set_permissions_for_role(
        &self,
        role_id: RoleId,
        permission_ids: &[PermissionId],
    ) -> AppResult<RoleRecord> {
        let mut state = self.state.lock().await;
        state.replace_role_permissions(role_id.get(), permission_ids);
        state
            .role_record(role_id.get())
            .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' does not exist")))
    }
}

#[async_trait]
impl PermissionRepository for FakeRbacStore {
    async fn list_permissions(&self, page: PageRequest) -> AppResult<Page<PermissionRecord>> {
        let state = self.state.lock().await;
        let rows = state
            .permissions
            .keys()
            .filter_map(|permission_id| state.permission_record(*permission_id))
            .collect();
        Ok(page_of(page, rows))
    }

    async fn find_permission(
        &self,
        permission_id: PermissionId,
    ) -> AppResult<Option<PermissionRecord>> {
        Ok(self
            .state
            .lock()
            .await
            .permission_record(permission_id.get()))
    }

    async fn find_permission_by_name(
        &self,
        _guard_name: &GuardName,
        name: &str,
    ) -> AppResult<Option<PermissionRecord>> {
        let state = self.state.lock().await;
        Ok(state
            .permissions
            .iter()
            .find(|(_, stored)| stored.as_str() == name)
            .and_then(|(permission_id, _)| state.permission_record(*permission_id)))
    }

    async fn find_existing_permission_ids(
        &self,
        permission_ids: &[PermissionId],
    ) -> AppResult<BTreeSet<PermissionId>> {
        let state = self.state.lock().await;
        Ok(permission_ids
            .iter()
            .copied()
            .filter(|permission_id| state.permissions.contains_key(&permission_id.get()))
            .collect())
    }

    async fn list_all_permission_ids(
        &self,
        _guard_name: &GuardName,
    ) -> AppResult<Vec<PermissionId>> {
        Ok(self
            .state
            .lock()
            .await
            .permissions
            .keys()
            .copied()
            .map(PermissionId::new)
            .collect())
    }

    async fn create_permission(
        &self,
        _guard_name: &GuardName,
        name: &str,
    ) -> AppResult<PermissionRecord> {
        let permission_id = self.seed_permission(name).await;
        self.state
            .lock()
            .await
            .permission_record(permission_id)
            .ok_or_else(|| AppError::Internal("created permission vanished".to_owned()))
    }

    async fn update_permission(
        &self,
        permission_id: PermissionId,
        changes: PermissionChanges,
    ) -> AppResult<PermissionRecord> {
        let mut state = self.state.lock().await;
        state.permissions.insert(permission_id.get(), changes.name);
        state
            .permission_record(permission_id.get())
            .ok_or_else(|| AppError::Internal("updated permission vanished".to_owned()))
    }

    async fn delete_permission(&self, permission_id: PermissionId) -> AppResult<()> {
        let mut state = self.state.lock().await;
        state
            .role_permissions
            .retain(|(_, stored_permission)| *stored_permission != permission_id.get());
        state.permissions.remove(&permission_id.get());
        Ok(())
    }
}

#[async_trait]
impl AuditRepository for FakeRbacStore {
    async fn append_event(&self, event: AuditEvent) -> AppResult<()> {
        self.events.lock().await.push(event);
        Ok(())
    }
}
