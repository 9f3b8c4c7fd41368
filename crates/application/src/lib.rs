//! Application services and ports.

#![forbid(unsafe_code)]

mod authorization_service;
mod rbac_bootstrap_service;
mod security_admin_ports;
mod security_admin_service;
mod user_service;

#[cfg(test)]
mod test_support;

pub use authorization_service::AuthorizationService;
pub use rbac_bootstrap_service::{BootstrapAccount, BootstrapSummary, RbacBootstrapService};
pub use security_admin_ports::{
    AuditEvent, AuditRepository, DEFAULT_PER_PAGE, MAX_PER_PAGE, NewRole, NewUser, Page,
    PageRequest, PermissionChanges, PermissionRecord, PermissionRepository, PermissionSummary,
    RoleChanges, RoleRecord, RoleRepository, RoleSummary, UserChanges, UserCredentials,
    UserRecord, UserRepository,
};
pub use security_admin_service::{
    MutationOutcome, PERMISSIONS_INDEX, PermissionInput, ROLES_INDEX, RoleInput,
    SecurityAdminService, USERS_INDEX, UserInput,
};
pub use user_service::{PasswordHasher, UserService};
