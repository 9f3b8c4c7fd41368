//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod policy;
mod rbac;
mod user;

pub use policy::{
    ActorContext, Decision, PolicyEngine, ResourceSnapshot, RoleSnapshot, UserSnapshot,
};
pub use rbac::{
    Action, AuditAction, DEFAULT_PERMISSIONS, DEFAULT_ROLES, ManagedResource, OWNER_ROLE,
    Operation, PermissionId, RoleId, RoleSet, SUPER_ADMIN_ROLE,
};
pub use user::{
    EmailAddress, NAME_MAX_LENGTH, PASSWORD_MAX_LENGTH, PASSWORD_MIN_LENGTH, UserId, Username,
    validate_name, validate_password,
};
