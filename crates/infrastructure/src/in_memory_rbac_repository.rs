//! In-memory RBAC store for local runs and tests.
//!
//! All tables sit behind one lock so each write is atomic with respect to
//! the last-admin check.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{SecondsFormat, Utc};
use keystone_application::{
    AuditEvent, PermissionRecord, PermissionSummary, RoleRecord, RoleSummary, UserRecord,
};
use keystone_core::{AppError, AppResult, DEFAULT_GUARD, DenyReason, GuardName};
use keystone_domain::{PermissionId, RoleId, SUPER_ADMIN_ROLE, UserId};
use tokio::sync::RwLock;

mod permissions;
mod roles;
mod users;


/// In-memory implementation of the user, role, permission and audit ports.
#[derive(Debug, Default)]
pub struct InMemoryRbacRepository {
    tables: RwLock<RbacTables>,
}

impl InMemoryRbacRepository {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns audit events in append order.
    pub async fn audit_events(&self) -> Vec<AuditEvent> {
        self.tables.read().await.audit_events.clone()
    }
}

#[derive(Debug, Clone)]
struct StoredUser {
    name: String,
    username: String,
    email: String,
    password_hash: String,
    is_bootstrap: bool,
    created_at: String,
    updated_at: String,
}

#[derive(Debug, Clone)]
struct StoredNamed {
    name: String,
    guard_name: GuardName,
    created_at: String,
    updated_at: String,
}

#[derive(Debug, Default)]
struct RbacTables {
    next_user_id: i64,
    next_role_id: i64,
    next_permission_id: i64,
    users: BTreeMap<i64, StoredUser>,
    roles: BTreeMap<i64, StoredNamed>,
    permissions: BTreeMap<i64, StoredNamed>,
    user_roles: BTreeSet<(i64, i64)>,
    role_permissions: BTreeSet<(i64, i64)>,
    audit_events: Vec<AuditEvent>,
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

impl RbacTables {
    fn user_record(&self, user_id: i64) -> Option<UserRecord> {
        let user = self.users.get(&user_id)?;
        let mut roles: Vec<RoleSummary> = self
            .user_roles
            .iter()
            .filter(|(stored_user, _)| *stored_user == user_id)
            .filter_map(|(_, role_id)| {
                self.roles.get(role_id).map(|role| RoleSummary {
                    role_id: RoleId::new(*role_id),
                    name: role.name.clone(),
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
            created_at: user.created_at.clone(),
            updated_at: user.updated_at.clone(),
        })
    }

    fn role_record(&self, role_id: i64) -> Option<RoleRecord> {
        let role = self.roles.get(&role_id)?;
        let mut permissions: Vec<PermissionSummary> = self
            .role_permissions
            .iter()
            .filter(|(stored_role, _)| *stored_role == role_id)
            .filter_map(|(_, permission_id)| {
                self.permissions
                    .get(permission_id)
                    .map(|permission| PermissionSummary {
                        permission_id: PermissionId::new(*permission_id),
                        name: permission.name.clone(),
                    })
            })
            .collect();
        permissions.sort_by(|left, right| left.name.cmp(&right.name));

        Some(RoleRecord {
            role_id: RoleId::new(role_id),
            name: role.name.clone(),
            guard_name: role.guard_name.clone(),
            permissions,
            created_at: role.created_at.clone(),
            updated_at: role.updated_at.clone(),
        })
    }

    fn permission_record(&self, permission_id: i64) -> Option<PermissionRecord> {
        self.permissions
            .get(&permission_id)
            .map(|permission| PermissionRecord {
                permission_id: PermissionId::new(permission_id),
                name: permission.name.clone(),
                guard_name: permission.guard_name.clone(),
                created_at: permission.created_at.clone(),
                updated_at: permission.updated_at.clone(),
            })
    }

    fn super_admin_holders(&self) -> BTreeSet<i64> {
        let super_admin = self.roles.iter().find(|(_, role)| {
            role.name == SUPER_ADMIN_ROLE && role.guard_name.as_str() == DEFAULT_GUARD
        });

        let Some((super_admin_id, _)) = super_admin else {
            return BTreeSet::new();
        };

        self.user_roles
            .iter()
            .filter(|(_, role_id)| role_id == super_admin_id)
            .map(|(user_id, _)| *user_id)
            .collect()
    }

    /// Runs a write and undoes it when it removed the last Super Admin holder.
    fn guarded_write<T>(
        &mut self,
        write: impl FnOnce(&mut Self) -> AppResult<T>,
    ) -> AppResult<T> {
        let had_holder = !self.super_admin_holders().is_empty();
        let users = self.users.clone();
        let roles = self.roles.clone();
        let user_roles = self.user_roles.clone();
        let role_permissions = self.role_permissions.clone();

        let result = write(self);
        let lost_holder = had_holder && self.super_admin_holders().is_empty();

        if result.is_err() || lost_holder {
            self.users = users;
            self.roles = roles;
            self.user_roles = user_roles;
            self.role_permissions = role_permissions;
        }

        if lost_holder && result.is_ok() {
            return Err(AppError::Forbidden(DenyReason::LastAdminProtected));
        }

        result
    }
}

fn taken(field: &str) -> AppError {
    AppError::conflict(field, format!("The {field} has already been taken."))
}
