use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use keystone_core::AppError;
use serde::{Deserialize, Serialize};

/// Distinguished role that may perform every administrative action.
pub const SUPER_ADMIN_ROLE: &str = "Super Admin";

/// Role that may manage users but not roles or permissions.
pub const OWNER_ROLE: &str = "Owner";

/// Roles ensured by the bootstrap seed, in creation order.
pub const DEFAULT_ROLES: &[&str] = &[
    SUPER_ADMIN_ROLE,
    OWNER_ROLE,
    "Admin",
    "Team Leader Sales",
    "Sales",
    "Team Leader Installer",
    "Installer",
    "Customer Service",
    "Finance",
    "NOC",
];

/// Permissions ensured by the bootstrap seed, in creation order.
pub const DEFAULT_PERMISSIONS: &[&str] = &[
    "Application Settings",
    "View Users",
    "Create Users",
    "Edit Users",
    "Delete Users",
    "View Roles",
    "Create Roles",
    "Edit Roles",
    "Delete Roles",
    "View Permissions",
    "Create Permissions",
    "Edit Permissions",
    "Delete Permissions",
];

macro_rules! store_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(i64);

        impl $name {
            /// Wraps a store-assigned identifier.
            #[must_use]
            pub fn new(value: i64) -> Self {
                Self(value)
            }

            /// Returns the raw identifier.
            #[must_use]
            pub fn get(&self) -> i64 {
                self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
                write!(formatter, "{}", self.0)
            }
        }
    };
}

store_id!(
    /// Persistence identifier for a role record.
    RoleId
);

store_id!(
    /// Persistence identifier for a permission record.
    PermissionId
);

/// Ordered set of role names held by a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSet(BTreeSet<String>);

impl RoleSet {
    /// Creates an empty role set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether the named role is part of the set.
    #[must_use]
    pub fn contains(&self, role: &str) -> bool {
        self.0.contains(role)
    }

    /// Returns whether the set grants full administrative capability.
    #[must_use]
    pub fn has_super_admin(&self) -> bool {
        self.contains(SUPER_ADMIN_ROLE)
    }

    /// Returns whether the set grants user management capability.
    #[must_use]
    pub fn has_owner(&self) -> bool {
        self.contains(OWNER_ROLE)
    }

    /// Returns whether the set holds any privileged role.
    #[must_use]
    pub fn is_privileged(&self) -> bool {
        self.has_super_admin() || self.has_owner()
    }

    /// Iterates role names in order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Returns the number of roles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns whether no role is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for RoleSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Resource families governed by the policy engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManagedResource {
    /// User accounts.
    User,
    /// Roles.
    Role,
    /// Permissions.
    Permission,
}

impl ManagedResource {
    /// Returns the plural storage prefix.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "users",
            Self::Role => "roles",
            Self::Permission => "permissions",
        }
    }
}

/// Operation verbs applied to a managed resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// List or show.
    View,
    /// Create a new record.
    Create,
    /// Modify an existing record or its associations.
    Update,
    /// Hard delete.
    Delete,
}

impl Operation {
    /// Returns the storage verb.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

/// A resource/operation pair checked by the policy engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Action {
    resource: ManagedResource,
    operation: Operation,
}

impl Action {
    /// `users.view`
    pub const VIEW_USERS: Self = Self::new(ManagedResource::User, Operation::View);
    /// `users.create`
    pub const CREATE_USER: Self = Self::new(ManagedResource::User, Operation::Create);
    /// `users.update`
    pub const UPDATE_USER: Self = Self::new(ManagedResource::User, Operation::Update);
    /// `users.delete`
    pub const DELETE_USER: Self = Self::new(ManagedResource::User, Operation::Delete);
    /// `roles.view`
    pub const VIEW_ROLES: Self = Self::new(ManagedResource::Role, Operation::View);
    /// `roles.create`
    pub const CREATE_ROLE: Self = Self::new(ManagedResource::Role, Operation::Create);
    /// `roles.update`
    pub const UPDATE_ROLE: Self = Self::new(ManagedResource::Role, Operation::Update);
    /// `roles.delete`
    pub const DELETE_ROLE: Self = Self::new(ManagedResource::Role, Operation::Delete);
    /// `permissions.view`
    pub const VIEW_PERMISSIONS: Self = Self::new(ManagedResource::Permission, Operation::View);
    /// `permissions.create`
    pub const CREATE_PERMISSION: Self =
        Self::new(ManagedResource::Permission, Operation::Create);
    /// `permissions.update`
    pub const UPDATE_PERMISSION: Self =
        Self::new(ManagedResource::Permission, Operation::Update);
    /// `permissions.delete`
    pub const DELETE_PERMISSION: Self =
        Self::new(ManagedResource::Permission, Operation::Delete);

    /// Creates an action.
    #[must_use]
    pub const fn new(resource: ManagedResource, operation: Operation) -> Self {
        Self {
            resource,
            operation,
        }
    }

    /// Returns the targeted resource family.
    #[must_use]
    pub fn resource(&self) -> ManagedResource {
        self.resource
    }

    /// Returns the operation verb.
    #[must_use]
    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// Returns every known action.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[Action] = &[
            Action::VIEW_USERS,
            Action::CREATE_USER,
            Action::UPDATE_USER,
            Action::DELETE_USER,
            Action::VIEW_ROLES,
            Action::CREATE_ROLE,
            Action::UPDATE_ROLE,
            Action::DELETE_ROLE,
            Action::VIEW_PERMISSIONS,
            Action::CREATE_PERMISSION,
            Action::UPDATE_PERMISSION,
            Action::DELETE_PERMISSION,
        ];

        ALL
    }
}

impl Display for Action {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "{}.{}",
            self.resource.as_str(),
            self.operation.as_str()
        )
    }
}

impl FromStr for Action {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|action| action.to_string() == value)
            .ok_or_else(|| AppError::validation("action", format!("unknown action '{value}'")))
    }
}

/// Stable audit actions emitted by administrative use-cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// A user account was created.
    UserCreated,
    /// A user account was updated.
    UserUpdated,
    /// A user account was deleted.
    UserDeleted,
    /// A user's role set was replaced.
    UserRolesSynced,
    /// A role was created.
    RoleCreated,
    /// A role was updated.
    RoleUpdated,
    /// A role was deleted.
    RoleDeleted,
    /// A role's permission set was replaced.
    RolePermissionsSynced,
    /// A permission was created.
    PermissionCreated,
    /// A permission was updated.
    PermissionUpdated,
    /// A permission was deleted.
    PermissionDeleted,
}

impl AuditAction {
    /// Returns a stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserCreated => "security.user.created",
            Self::UserUpdated => "security.user.updated",
            Self::UserDeleted => "security.user.deleted",
            Self::UserRolesSynced => "security.user.roles_synced",
            Self::RoleCreated => "security.role.created",
            Self::RoleUpdated => "security.role.updated",
            Self::RoleDeleted => "security.role.deleted",
            Self::RolePermissionsSynced => "security.role.permissions_synced",
            Self::PermissionCreated => "security.permission.created",
            Self::PermissionUpdated => "security.permission.updated",
            Self::PermissionDeleted => "security.permission.deleted",
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::{Action, RoleSet, SUPER_ADMIN_ROLE};

    #[test]
    fn action_roundtrip_storage_value() {
        for action in Action::all() {
            let restored = Action::from_str(&action.to_string());
            assert_eq!(restored.ok(), Some(*action));
        }
    }

    #[test]
    fn unknown_action_is_rejected() {
        assert!(Action::from_str("users.promote").is_err());
    }

    #[test]
    fn role_set_is_case_sensitive() {
        let roles: RoleSet = ["super admin", "Sales"].into_iter().collect();
        assert!(!roles.has_super_admin());

        let roles: RoleSet = [SUPER_ADMIN_ROLE].into_iter().collect();
        assert!(roles.has_super_admin());
        assert!(roles.is_privileged());
    }
}
