use keystone_domain::{RoleId, RoleSet, UserId};

use super::roles::RoleSummary;

/// User row with assigned roles. Never carries the credential hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    /// Store identifier.
    pub user_id: UserId,
    /// Display name.
    pub name: String,
    /// Unique login name.
    pub username: String,
    /// Unique email address.
    pub email: String,
    /// Whether this is the seeded bootstrap account.
    pub is_bootstrap: bool,
    /// Assigned roles ordered by name.
    pub roles: Vec<RoleSummary>,
    /// Creation timestamp in RFC3339.
    pub created_at: String,
    /// Last update timestamp in RFC3339.
    pub updated_at: String,
}

impl UserRecord {
    /// Returns the assigned role names as an ordered set.
    #[must_use]
    pub fn role_set(&self) -> RoleSet {
        self.roles.iter().map(|role| role.name.clone()).collect()
    }
}

/// Credential projection used only by login.
#[derive(Debug, Clone)]
pub struct UserCredentials {
    /// Store identifier.
    pub user_id: UserId,
    /// Login name.
    pub username: String,
    /// Display name.
    pub name: String,
    /// Argon2id hash.
    pub password_hash: String,
}

/// Validated user creation payload with a hashed password.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    /// Display name.
    pub name: String,
    /// Login name.
    pub username: String,
    /// Email address.
    pub email: String,
    /// Argon2id hash of the initial password.
    pub password_hash: String,
    /// Marks the seeded bootstrap account.
    pub is_bootstrap: bool,
    /// Roles assigned on creation.
    pub role_ids: Vec<RoleId>,
}

/// Validated user update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserChanges {
    /// New display name.
    pub name: String,
    /// New login name.
    pub username: String,
    /// New email address.
    pub email: String,
    /// New password hash; `None` keeps the current credential.
    pub password_hash: Option<String>,
    /// Replacement role set; `None` keeps current roles.
    pub role_ids: Option<Vec<RoleId>>,
}
