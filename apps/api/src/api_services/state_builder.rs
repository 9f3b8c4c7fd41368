use std::sync::Arc;

use keystone_application::{
    AuditRepository, AuthorizationService, PasswordHasher, PermissionRepository,
    RbacBootstrapService, RoleRepository, SecurityAdminService, UserRepository, UserService,
};
use keystone_infrastructure::{
    Argon2PasswordHasher, InMemoryRbacRepository, PostgresAuditRepository,
    PostgresPermissionRepository, PostgresRoleRepository, PostgresUserRepository,
};
use sqlx::PgPool;

use crate::state::AppState;

/// Store adapters behind the application ports.
#[derive(Clone)]
pub struct RepositorySet {
    user_repository: Arc<dyn UserRepository>,
    role_repository: Arc<dyn RoleRepository>,
    permission_repository: Arc<dyn PermissionRepository>,
    audit_repository: Arc<dyn AuditRepository>,
    password_hasher: Arc<dyn PasswordHasher>,
}

impl RepositorySet {
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            user_repository: Arc::new(PostgresUserRepository::new(pool.clone())),
            role_repository: Arc::new(PostgresRoleRepository::new(pool.clone())),
            permission_repository: Arc::new(PostgresPermissionRepository::new(pool.clone())),
            audit_repository: Arc::new(PostgresAuditRepository::new(pool)),
            password_hasher: Arc::new(Argon2PasswordHasher::new()),
        }
    }

    pub fn in_memory(store: Arc<InMemoryRbacRepository>) -> Self {
        Self {
            user_repository: store.clone(),
            role_repository: store.clone(),
            permission_repository: store.clone(),
            audit_repository: store,
            password_hasher: Arc::new(Argon2PasswordHasher::new()),
        }
    }

    pub fn bootstrap_service(&self) -> RbacBootstrapService {
        RbacBootstrapService::new(
            self.user_repository.clone(),
            self.role_repository.clone(),
            self.permission_repository.clone(),
            self.password_hasher.clone(),
        )
    }
}

pub fn build_app_state(repositories: &RepositorySet, frontend_url: String) -> AppState {
    let authorization_service = AuthorizationService::new(repositories.user_repository.clone());

    AppState {
        security_admin_service: SecurityAdminService::new(
            authorization_service,
            repositories.user_repository.clone(),
            repositories.role_repository.clone(),
            repositories.permission_repository.clone(),
            repositories.audit_repository.clone(),
            repositories.password_hasher.clone(),
        ),
        user_service: UserService::new(
            repositories.user_repository.clone(),
            repositories.password_hasher.clone(),
        ),
        frontend_url,
    }
}
