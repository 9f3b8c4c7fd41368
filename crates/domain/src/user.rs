//! User domain types and validation rules.

use std::fmt::{Display, Formatter};

use keystone_core::{AppError, AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};

/// Maximum length of names, usernames and emails (column width).
pub const NAME_MAX_LENGTH: usize = 255;

/// Minimum accepted password length.
pub const PASSWORD_MIN_LENGTH: usize = 8;

/// Maximum password length to allow passphrases and bound Argon2id cost.
pub const PASSWORD_MAX_LENGTH: usize = 128;

/// Persistence identifier for a user record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(i64);

impl UserId {
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

impl Display for UserId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Validated login name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Username(String);

impl Username {
    /// Creates a validated username: required, bounded, no whitespace.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = NonEmptyString::new("username", value)?;

        if value.as_str().chars().count() > NAME_MAX_LENGTH {
            return Err(AppError::validation(
                "username",
                format!("The username may not be greater than {NAME_MAX_LENGTH} characters."),
            ));
        }

        if value.as_str().chars().any(char::is_whitespace) {
            return Err(AppError::validation(
                "username",
                "The username may not contain spaces.",
            ));
        }

        Ok(Self(value.into()))
    }

    /// Returns the validated username.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<Username> for String {
    fn from(value: Username) -> Self {
        value.0
    }
}

/// Validated email address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Creates a validated email address.
    ///
    /// Performs basic structural validation: non-empty, exactly one `@`,
    /// non-empty local part, and a domain containing at least one `.`.
    /// The address is stored lowercased.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = NonEmptyString::new("email", value)?;
        let lowered = value.as_str().to_lowercase();

        let Some((local, domain)) = lowered.split_once('@') else {
            return Err(invalid_email());
        };

        if local.is_empty() || domain.contains('@') {
            return Err(invalid_email());
        }

        if domain.is_empty()
            || !domain.contains('.')
            || domain.starts_with('.')
            || domain.ends_with('.')
        {
            return Err(invalid_email());
        }

        if lowered.chars().any(char::is_whitespace) {
            return Err(invalid_email());
        }

        if lowered.chars().count() > NAME_MAX_LENGTH {
            return Err(AppError::validation(
                "email",
                format!("The email may not be greater than {NAME_MAX_LENGTH} characters."),
            ));
        }

        Ok(Self(lowered))
    }

    /// Returns the validated email string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<EmailAddress> for String {
    fn from(value: EmailAddress) -> Self {
        value.0
    }
}

fn invalid_email() -> AppError {
    AppError::validation("email", "The email must be a valid email address.")
}

/// Validates a bounded, required display name for the given field.
pub fn validate_name(field: &str, value: &str) -> AppResult<NonEmptyString> {
    let name = NonEmptyString::new(field, value)?;
    if name.as_str().chars().count() > NAME_MAX_LENGTH {
        return Err(AppError::validation(
            field,
            format!("The {field} may not be greater than {NAME_MAX_LENGTH} characters."),
        ));
    }

    Ok(name)
}

/// Validates a plaintext password and its confirmation.
///
/// Length is counted in characters. A confirmation mismatch is reported on
/// the `password` field.
pub fn validate_password(password: &str, confirmation: &str) -> AppResult<()> {
    let char_count = password.chars().count();

    if char_count == 0 {
        return Err(AppError::validation(
            "password",
            "The password field is required.",
        ));
    }

    if char_count < PASSWORD_MIN_LENGTH {
        return Err(AppError::validation(
            "password",
            format!("The password must be at least {PASSWORD_MIN_LENGTH} characters."),
        ));
    }

    if char_count > PASSWORD_MAX_LENGTH {
        return Err(AppError::validation(
            "password",
            format!("The password may not be greater than {PASSWORD_MAX_LENGTH} characters."),
        ));
    }

    if password != confirmation {
        return Err(AppError::validation(
            "password",
            "The password confirmation does not match.",
        ));
    }

    Ok(())
}
