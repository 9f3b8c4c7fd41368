//! Shared primitives for all Rust crates in Keystone.

#![forbid(unsafe_code)]

/// Authentication primitives shared across services.
pub mod auth;

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use auth::UserIdentity;

/// Result type used across Keystone crates.
pub type AppResult<T> = Result<T, AppError>;

/// Default guard scope for roles and permissions.
pub const DEFAULT_GUARD: &str = "web";

/// A validated non-empty UTF-8 string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NonEmptyString(String);

impl NonEmptyString {
    /// Creates a validated non-empty string for the named input field.
    ///
    /// Surrounding whitespace is trimmed before the emptiness check.
    pub fn new(field: &str, value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(AppError::validation(
                field,
                format!("The {} field is required.", humanize_field(field)),
            ));
        }

        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

/// Guard scope partitioning role and permission names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GuardName(String);

impl GuardName {
    /// Creates a guard scope tag.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = NonEmptyString::new("guard_name", value)?;
        Ok(Self(value.into()))
    }

    /// Returns the underlying guard name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Default for GuardName {
    fn default() -> Self {
        Self(DEFAULT_GUARD.to_owned())
    }
}

impl Display for GuardName {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Field-keyed validation messages, ordered by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    /// Creates an empty error set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a message for a field. The first message per field wins.
    pub fn insert(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_insert_with(|| message.into());
    }

    /// Moves every message from another error set into this one.
    pub fn merge(&mut self, other: FieldErrors) {
        for (field, message) in other.0 {
            self.insert(field, message);
        }
    }

    /// Returns the message recorded for a field.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    /// Returns whether a message exists for the field.
    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Returns whether no message has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates field/message pairs in field order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .map(|(field, message)| (field.as_str(), message.as_str()))
    }

    /// Returns `Ok(())` when empty, otherwise a validation error.
    pub fn into_result(self) -> AppResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self))
        }
    }
}

impl Display for FieldErrors {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (field, message) in &self.0 {
            if !first {
                formatter.write_str("; ")?;
            }
            write!(formatter, "{field}: {message}")?;
            first = false;
        }

        Ok(())
    }
}

/// Reason attached to a policy denial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DenyReason {
    /// Actor lacks a role granting the requested action.
    NotAuthorized,
    /// Actor attempted to delete their own account.
    SelfDeletion,
    /// Actor attempted to drop one of their own privileged roles.
    SelfDemotion,
    /// Target is the bootstrap identity.
    BootstrapProtected,
    /// Operation would leave no Super Admin holder.
    LastAdminProtected,
    /// Target is the distinguished Super Admin role.
    SystemRoleProtected,
}

impl DenyReason {
    /// Returns the stable reason code.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotAuthorized => "NOT_AUTHORIZED",
            Self::SelfDeletion => "SELF_DELETION",
            Self::SelfDemotion => "SELF_DEMOTION",
            Self::BootstrapProtected => "BOOTSTRAP_PROTECTED",
            Self::LastAdminProtected => "LAST_ADMIN_PROTECTED",
            Self::SystemRoleProtected => "SYSTEM_ROLE_PROTECTED",
        }
    }

    /// Returns the human-readable explanation.
    #[must_use]
    pub fn message(&self) -> &'static str {
        match self {
            Self::NotAuthorized => "you are not authorized to perform this action",
            Self::SelfDeletion => "you cannot delete your own account",
            Self::SelfDemotion => "you cannot remove your own privileged role",
            Self::BootstrapProtected => "the bootstrap account cannot be deleted or demoted",
            Self::LastAdminProtected => "at least one user must keep the Super Admin role",
            Self::SystemRoleProtected => "the Super Admin role cannot be deleted or renamed",
        }
    }
}

impl Display for DenyReason {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{} ({})", self.message(), self.as_str())
    }
}

/// Common application error categories.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid input or violated invariant, keyed by input field.
    #[error("validation error: {0}")]
    Validation(FieldErrors),

    /// Requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Unique constraint lost at commit time, keyed by the conflicting field.
    #[error("conflict: {0}")]
    Conflict(FieldErrors),

    /// User is not authenticated.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// User is authenticated but blocked by authorization policy.
    #[error("forbidden: {0}")]
    Forbidden(DenyReason),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Builds a single-field validation error.
    #[must_use]
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field, message);
        Self::Validation(errors)
    }

    /// Builds a single-field conflict error.
    #[must_use]
    pub fn conflict(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field, message);
        Self::Conflict(errors)
    }

    /// Returns field messages for validation-shaped errors.
    #[must_use]
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            Self::Validation(errors) | Self::Conflict(errors) => Some(errors),
            _ => None,
        }
    }
}

/// Turns `password_confirmation` into `password confirmation` for messages.
#[must_use]
pub fn humanize_field(field: &str) -> String {
    field.replace(['_', '.'], " ")
}
