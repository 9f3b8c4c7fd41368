use keystone_core::{AppError, AppResult, UserIdentity};
use tracing::info;

use super::UserService;

const INVALID_CREDENTIALS: &str = "invalid username or password";

impl UserService {
    /// Authenticates a user with username and password.
    pub async fn login(&self, username: &str, password: &str) -> AppResult<UserIdentity> {
        let credentials = self
            .user_repository
            .find_credentials_by_username(username.trim())
            .await?;

        let Some(credentials) = credentials else {
            // Hash anyway so unknown usernames take as long as wrong passwords.
            let _ = self.password_hasher.hash_password(password);
            return Err(AppError::Unauthorized(INVALID_CREDENTIALS.to_owned()));
        };

        if !self
            .password_hasher
            .verify_password(password, &credentials.password_hash)?
        {
            return Err(AppError::Unauthorized(INVALID_CREDENTIALS.to_owned()));
        }

        info!(user_id = %credentials.user_id, "user signed in");

        Ok(UserIdentity::new(
            credentials.user_id.get(),
            credentials.username,
            credentials.name,
        ))
    }
}
