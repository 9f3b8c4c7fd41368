use std::collections::BTreeSet;

use async_trait::async_trait;

use keystone_core::{AppResult, GuardName};
use keystone_domain::{PermissionId, RoleId, UserId};

use super::audit::AuditEvent;
use super::pagination::{Page, PageRequest};
use super::permissions::{PermissionChanges, PermissionRecord};
use super::roles::{NewRole, RoleChanges, RoleRecord, RoleSummary};
use super::users::{NewUser, UserChanges, UserCredentials, UserRecord};

/// Repository port for user accounts and their role assignments.
///
/// Every write that can remove a Super Admin holder re-counts holders inside
/// its transaction and fails with `Forbidden(LastAdminProtected)` instead of
/// committing zero holders.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Lists users ordered by id.
    async fn list_users(&self, page: PageRequest) -> AppResult<Page<UserRecord>>;

    /// Finds a user by id.
    async fn find_user(&self, user_id: UserId) -> AppResult<Option<UserRecord>>;

    /// Finds a user by exact username.
    async fn find_user_by_username(&self, username: &str) -> AppResult<Option<UserRecord>>;

    /// Finds a user by lowercased email.
    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<UserRecord>>;

    /// Loads the credential projection for login.
    async fn find_credentials_by_username(
        &self,
        username: &str,
    ) -> AppResult<Option<UserCredentials>>;

    /// Returns ids of every user holding the Super Admin role.
    async fn list_super_admin_holders(&self) -> AppResult<BTreeSet<UserId>>;

    /// Creates a user and assigns roles in one transaction.
    async fn create_user(&self, input: NewUser) -> AppResult<UserRecord>;

    /// Updates a user and optionally replaces roles in one transaction.
    async fn update_user(&self, user_id: UserId, changes: UserChanges) -> AppResult<UserRecord>;

    /// Flags an existing user as the bootstrap identity.
    async fn mark_bootstrap_user(&self, user_id: UserId) -> AppResult<()>;

    /// Deletes a user and its role assignments.
    async fn delete_user(&self, user_id: UserId) -> AppResult<()>;

    /// Replaces the full role set of a user.
    async fn set_roles_for_user(
        &self,
        user_id: UserId,
        role_ids: &[RoleId],
    ) -> AppResult<UserRecord>;
}

/// Repository port for roles and their permission grants.
#[async_trait]
pub trait RoleRepository: Send + Sync {
    /// Lists roles ordered by id with their permissions.
    async fn list_roles(&self, page: PageRequest) -> AppResult<Page<RoleRecord>>;

    /// Finds a role by id.
    async fn find_role(&self, role_id: RoleId) -> AppResult<Option<RoleRecord>>;

    /// Finds a role by exact name within a guard scope.
    async fn find_role_by_name(
        &self,
        guard_name: &GuardName,
        name: &str,
    ) -> AppResult<Option<RoleRecord>>;

    /// Returns the subset of the given ids that exist, with role names.
    async fn find_roles_by_ids(&self, role_ids: &[RoleId]) -> AppResult<Vec<RoleSummary>>;

    /// Creates a role and grants permissions in one transaction.
    async fn create_role(&self, input: NewRole) -> AppResult<RoleRecord>;

    /// Renames a role and optionally replaces grants in one transaction.
    async fn update_role(&self, role_id: RoleId, changes: RoleChanges) -> AppResult<RoleRecord>;

    /// Deletes a role, detaching it from users and permissions first.
    async fn delete_role(&self, role_id: RoleId) -> AppResult<()>;

    /// Replaces the full permission set of a role.
    async fn set_permissions_for_role(
        &self,
        role_id: RoleId,
        permission_ids: &[PermissionId],
    ) -> AppResult<RoleRecord>;
}

/// Repository port for permissions.
#[async_trait]
pub trait PermissionRepository: Send + Sync {
    /// Lists permissions ordered by id.
    async fn list_permissions(&self, page: PageRequest) -> AppResult<Page<PermissionRecord>>;

    /// Finds a permission by id.
    async fn find_permission(
        &self,
        permission_id: PermissionId,
    ) -> AppResult<Option<PermissionRecord>>;

    /// Finds a permission by exact name within a guard scope.
    async fn find_permission_by_name(
        &self,
        guard_name: &GuardName,
        name: &str,
    ) -> AppResult<Option<PermissionRecord>>;

    /// Returns which of the given ids exist.
    async fn find_existing_permission_ids(
        &self,
        permission_ids: &[PermissionId],
    ) -> AppResult<BTreeSet<PermissionId>>;

    /// Lists every permission id in the guard scope.
    async fn list_all_permission_ids(&self, guard_name: &GuardName)
    -> AppResult<Vec<PermissionId>>;

    /// Creates a permission.
    async fn create_permission(
        &self,
        guard_name: &GuardName,
        name: &str,
    ) -> AppResult<PermissionRecord>;

    /// Renames a permission.
    async fn update_permission(
        &self,
        permission_id: PermissionId,
        changes: PermissionChanges,
    ) -> AppResult<PermissionRecord>;

    /// Deletes a permission, detaching it from roles first.
    async fn delete_permission(&self, permission_id: PermissionId) -> AppResult<()>;
}

/// Port for persisting append-only audit events.
#[async_trait]
pub trait AuditRepository: Send + Sync {
    /// Persists one audit event.
    async fn append_event(&self, event: AuditEvent) -> AppResult<()>;
}
