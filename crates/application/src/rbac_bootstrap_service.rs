use std::sync::Arc;

use keystone_core::{AppError, AppResult, GuardName};
use keystone_domain::{
    DEFAULT_PERMISSIONS, DEFAULT_ROLES, EmailAddress, RoleId, SUPER_ADMIN_ROLE, Username,
    validate_name, validate_password,
};
use tracing::info;

use crate::PasswordHasher;
use crate::security_admin_ports::{
    NewRole, NewUser, PermissionRepository, RoleRecord, RoleRepository, UserRecord,
    UserRepository,
};

/// Credentials of the first administrative account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapAccount {
    /// Login name.
    pub username: String,
    /// Email address.
    pub email: String,
    /// Display name.
    pub name: String,
    /// Initial plaintext password.
    pub password: String,
}

/// Counts of rows created by one seed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BootstrapSummary {
    /// Default permissions that did not exist yet.
    pub permissions_created: usize,
    /// Default roles that did not exist yet.
    pub roles_created: usize,
    /// Whether the bootstrap account was created in this run.
    pub user_created: bool,
}

/// Idempotent seeding of default permissions, roles and the bootstrap account.
#[derive(Clone)]
pub struct RbacBootstrapService {
    user_repository: Arc<dyn UserRepository>,
    role_repository: Arc<dyn RoleRepository>,
    permission_repository: Arc<dyn PermissionRepository>,
    password_hasher: Arc<dyn PasswordHasher>,
}

impl RbacBootstrapService {
    /// Creates a new bootstrap service.
    #[must_use]
    pub fn new(
        user_repository: Arc<dyn UserRepository>,
        role_repository: Arc<dyn RoleRepository>,
        permission_repository: Arc<dyn PermissionRepository>,
        password_hasher: Arc<dyn PasswordHasher>,
    ) -> Self {
        Self {
            user_repository,
            role_repository,
            permission_repository,
            password_hasher,
        }
    }

    /// Ensures defaults exist, grants every permission to Super Admin and
    /// makes sure the bootstrap account holds Super Admin.
    pub async fn seed(&self, account: &BootstrapAccount) -> AppResult<BootstrapSummary> {
        let guard_name = GuardName::default();
        let mut summary = BootstrapSummary::default();

        for name in DEFAULT_PERMISSIONS {
            if self
                .permission_repository
                .find_permission_by_name(&guard_name, name)
                .await?
                .is_none()
            {
                self.permission_repository
                    .create_permission(&guard_name, name)
                    .await?;
                summary.permissions_created += 1;
            }
        }

        for name in DEFAULT_ROLES {
            if self
                .role_repository
                .find_role_by_name(&guard_name, name)
                .await?
                .is_none()
            {
                self.role_repository
                    .create_role(NewRole {
                        name: (*name).to_owned(),
                        guard_name: guard_name.clone(),
                        permission_ids: Vec::new(),
                    })
                    .await?;
                summary.roles_created += 1;
            }
        }

        let super_admin = self.super_admin_role(&guard_name).await?;
        let all_permissions = self
            .permission_repository
            .list_all_permission_ids(&guard_name)
            .await?;
        self.role_repository
            .set_permissions_for_role(super_admin.role_id, &all_permissions)
            .await?;

        summary.user_created = self.ensure_account(account, super_admin.role_id).await?;

        info!(
            permissions_created = summary.permissions_created,
            roles_created = summary.roles_created,
            user_created = summary.user_created,
            username = %account.username,
            "rbac bootstrap seed completed"
        );

        Ok(summary)
    }

    async fn super_admin_role(&self, guard_name: &GuardName) -> AppResult<RoleRecord> {
        self.role_repository
            .find_role_by_name(guard_name, SUPER_ADMIN_ROLE)
            .await?
            .ok_or_else(|| {
                AppError::Internal(format!("role '{SUPER_ADMIN_ROLE}' missing after seeding"))
            })
    }

    async fn ensure_account(
        &self,
        account: &BootstrapAccount,
        super_admin_role_id: RoleId,
    ) -> AppResult<bool> {
        let username = Username::new(account.username.as_str())?;

        if let Some(existing) = self
            .user_repository
            .find_user_by_username(username.as_str())
            .await?
        {
            self.promote_existing(&existing, super_admin_role_id)
                .await?;
            return Ok(false);
        }

        let email = EmailAddress::new(account.email.as_str())?;
        let name = validate_name("name", &account.name)?;
        validate_password(&account.password, &account.password)?;
        let password_hash = self.password_hasher.hash_password(&account.password)?;

        self.user_repository
            .create_user(NewUser {
                name: name.into(),
                username: username.into(),
                email: email.into(),
                password_hash,
                is_bootstrap: true,
                role_ids: vec![super_admin_role_id],
            })
            .await?;

        Ok(true)
    }

    async fn promote_existing(
        &self,
        existing: &UserRecord,
        super_admin_role_id: RoleId,
    ) -> AppResult<()> {
        if !existing.is_bootstrap {
            self.user_repository
                .mark_bootstrap_user(existing.user_id)
                .await?;
        }

        if !existing.role_set().has_super_admin() {
            let mut role_ids: Vec<RoleId> =
                existing.roles.iter().map(|role| role.role_id).collect();
            role_ids.push(super_admin_role_id);
            self.user_repository
                .set_roles_for_user(existing.user_id, &role_ids)
                .await?;
        }

        Ok(())
    }
}
