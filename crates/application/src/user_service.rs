//! Authentication for administrative accounts.
//!
//! Failures are reported with one generic message so callers cannot tell an
//! unknown username from a wrong password.

use std::sync::Arc;

use keystone_core::{AppError, AppResult, UserIdentity};
use keystone_domain::UserId;

use crate::security_admin_ports::{UserRecord, UserRepository};

mod login;


/// Port for password hashing operations. Keeps domain/application free of
/// direct cryptographic library coupling.
pub trait PasswordHasher: Send + Sync {
    /// Hashes a plaintext password using Argon2id.
    fn hash_password(&self, password: &str) -> AppResult<String>;

    /// Verifies a plaintext password against a stored hash.
    fn verify_password(&self, password: &str, hash: &str) -> AppResult<bool>;
}

/// Application service for login and session identity lookups.
#[derive(Clone)]
pub struct UserService {
    user_repository: Arc<dyn UserRepository>,
    password_hasher: Arc<dyn PasswordHasher>,
}

impl UserService {
    /// Creates a new user service.
    #[must_use]
    pub fn new(
        user_repository: Arc<dyn UserRepository>,
        password_hasher: Arc<dyn PasswordHasher>,
    ) -> Self {
        Self {
            user_repository,
            password_hasher,
        }
    }

    /// Returns the current record of a signed-in user, with fresh role names.
    pub async fn current_user(&self, identity: &UserIdentity) -> AppResult<UserRecord> {
        self.user_repository
            .find_user(UserId::new(identity.user_id()))
            .await?
            .ok_or_else(|| AppError::Unauthorized("session user no longer exists".to_owned()))
    }
}
