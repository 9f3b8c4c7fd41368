mod audit;
mod pagination;
mod permissions;
mod repositories;
mod roles;
mod users;

pub use audit::AuditEvent;
pub use pagination::{DEFAULT_PER_PAGE, MAX_PER_PAGE, Page, PageRequest};
pub use permissions::{PermissionChanges, PermissionRecord, PermissionSummary};
pub use repositories::{AuditRepository, PermissionRepository, RoleRepository, UserRepository};
pub use roles::{NewRole, RoleChanges, RoleRecord, RoleSummary};
pub use users::{NewUser, UserChanges, UserCredentials, UserRecord};
