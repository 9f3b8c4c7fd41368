use std::sync::Arc;

use keystone_core::{AppError, AppResult, UserIdentity};
use keystone_domain::{ActorContext, AuditAction};

use crate::security_admin_ports::{
    AuditEvent, AuditRepository, PermissionRepository, RoleRepository, UserRepository,
};
use crate::{AuthorizationService, PasswordHasher};

mod permissions;
mod roles;
mod users;
mod validation;

#[cfg(test)]
mod tests;

pub use permissions::PermissionInput;
pub use roles::RoleInput;
pub use users::UserInput;

/// Redirect target after user mutations.
pub const USERS_INDEX: &str = "/settings/users";
/// Redirect target after role mutations.
pub const ROLES_INDEX: &str = "/settings/roles";
/// Redirect target after permission mutations.
pub const PERMISSIONS_INDEX: &str = "/settings/permissions";

/// Result of a committed mutation with its confirmation message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationOutcome<T> {
    /// Resulting value.
    pub value: T,
    /// Human-readable confirmation.
    pub message: &'static str,
    /// Listing the caller should return to.
    pub redirect_to: &'static str,
}

impl<T> MutationOutcome<T> {
    fn new(value: T, message: &'static str, redirect_to: &'static str) -> Self {
        Self {
            value,
            message,
            redirect_to,
        }
    }
}

/// Application service for user, role and permission administration.
#[derive(Clone)]
pub struct SecurityAdminService {
    authorization_service: AuthorizationService,
    user_repository: Arc<dyn UserRepository>,
    role_repository: Arc<dyn RoleRepository>,
    permission_repository: Arc<dyn PermissionRepository>,
    audit_repository: Arc<dyn AuditRepository>,
    password_hasher: Arc<dyn PasswordHasher>,
}

impl SecurityAdminService {
    /// Creates a new service from required dependencies.
    #[must_use]
    pub fn new(
        authorization_service: AuthorizationService,
        user_repository: Arc<dyn UserRepository>,
        role_repository: Arc<dyn RoleRepository>,
        permission_repository: Arc<dyn PermissionRepository>,
        audit_repository: Arc<dyn AuditRepository>,
        password_hasher: Arc<dyn PasswordHasher>,
    ) -> Self {
        Self {
            authorization_service,
            user_repository,
            role_repository,
            permission_repository,
            audit_repository,
            password_hasher,
        }
    }

    async fn actor(&self, identity: &UserIdentity) -> AppResult<ActorContext> {
        self.authorization_service.actor_context(identity).await
    }

    async fn audit(
        &self,
        actor: &ActorContext,
        action: AuditAction,
        resource_type: &str,
        resource_id: impl ToString,
        detail: String,
    ) -> AppResult<()> {
        self.audit_repository
            .append_event(AuditEvent {
                actor_id: actor.user_id(),
                action,
                resource_type: resource_type.to_owned(),
                resource_id: resource_id.to_string(),
                detail: Some(detail),
            })
            .await
    }
}

fn not_found(kind: &str, id: impl std::fmt::Display) -> AppError {
    AppError::NotFound(format!("{kind} '{id}' does not exist"))
}
