use std::collections::BTreeSet;

use keystone_core::{AppError, AppResult, FieldErrors, UserIdentity};
use keystone_domain::{
    Action, ActorContext, AuditAction, EmailAddress, ResourceSnapshot, RoleId, RoleSet, UserId,
    Username, validate_name, validate_password,
};
use tracing::info;

use super::validation::{collect, dedup_ids, insert_taken, missing_references};
use super::{MutationOutcome, SecurityAdminService, USERS_INDEX, not_found};
use crate::security_admin_ports::{NewUser, Page, PageRequest, UserChanges, UserRecord};

/// Raw user form submitted by an administrator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserInput {
    /// Display name.
    pub name: String,
    /// Login name.
    pub username: String,
    /// Email address.
    pub email: String,
    /// Plaintext password; required on create, optional on update.
    pub password: Option<String>,
    /// Must equal `password` when a password is given.
    pub password_confirmation: Option<String>,
    /// Role ids to assign; `None` keeps current roles on update.
    pub roles: Option<Vec<i64>>,
}

struct ValidUser {
    name: String,
    username: Username,
    email: EmailAddress,
    password: Option<String>,
}

impl UserInput {
    fn validate(&self, password_required: bool) -> AppResult<ValidUser> {
        let mut errors = FieldErrors::new();

        let name = collect(&mut errors, validate_name("name", &self.name))?;
        let username = collect(&mut errors, Username::new(self.username.as_str()))?;
        let email = collect(&mut errors, EmailAddress::new(self.email.as_str()))?;

        let password = self
            .password
            .as_deref()
            .filter(|password| !password.is_empty());
        match password {
            Some(password) => {
                let confirmation = self.password_confirmation.as_deref().unwrap_or_default();
                collect(&mut errors, validate_password(password, confirmation))?;
            }
            None if password_required => {
                errors.insert("password", "The password field is required.");
            }
            None => {}
        }

        errors.into_result()?;

        match (name, username, email) {
            (Some(name), Some(username), Some(email)) => Ok(ValidUser {
                name: name.into(),
                username,
                email,
                password: password.map(str::to_owned),
            }),
            _ => Err(AppError::Internal(
                "user validation passed without values".to_owned(),
            )),
        }
    }
}

impl SecurityAdminService {
    /// Lists users with their roles.
    pub async fn list_users(
        &self,
        identity: &UserIdentity,
        page: PageRequest,
    ) -> AppResult<Page<UserRecord>> {
        self.authorization_service
            .require_collection_action(identity, Action::VIEW_USERS)
            .await?;

        self.user_repository.list_users(page).await
    }

    /// Returns one user with their roles.
    pub async fn get_user(&self, identity: &UserIdentity, user_id: i64) -> AppResult<UserRecord> {
        self.authorization_service
            .require_collection_action(identity, Action::VIEW_USERS)
            .await?;

        self.load_user(user_id).await
    }

    /// Creates a user, assigns roles and emits an audit event.
    pub async fn create_user(
        &self,
        identity: &UserIdentity,
        input: UserInput,
    ) -> AppResult<MutationOutcome<UserRecord>> {
        let valid = input.validate(true)?;

        let requested_roles = input.roles.unwrap_or_default();
        let proposed_roles = self.resolve_role_names(&requested_roles).await?;
        let actor = self.actor(identity).await?;
        self.authorization_service.require(
            &actor,
            Action::CREATE_USER,
            &ResourceSnapshot::NewUser(proposed_roles),
        )?;

        let mut errors = self.check_user_uniqueness(&valid, None).await?;
        errors.merge(self.check_role_references(&requested_roles).await?);
        errors.into_result()?;

        let password = valid.password.as_deref().unwrap_or_default();
        let password_hash = self.password_hasher.hash_password(password)?;

        let user = self
            .user_repository
            .create_user(NewUser {
                name: valid.name,
                username: valid.username.into(),
                email: valid.email.into(),
                password_hash,
                is_bootstrap: false,
                role_ids: role_ids(&requested_roles),
            })
            .await?;

        self.audit(
            &actor,
            AuditAction::UserCreated,
            "user",
            user.user_id,
            format!("created user '{}'", user.username),
        )
        .await?;

        info!(actor_id = %actor.user_id(), user_id = %user.user_id, "user created");

        Ok(MutationOutcome::new(
            user,
            "User created successfully.",
            USERS_INDEX,
        ))
    }

    /// Updates a user's profile, optionally their password and role set.
    pub async fn update_user(
        &self,
        identity: &UserIdentity,
        user_id: i64,
        input: UserInput,
    ) -> AppResult<MutationOutcome<UserRecord>> {
        let valid = input.validate(false)?;
        let target = self.load_user(user_id).await?;

        let proposed_roles = match input.roles.as_deref() {
            Some(requested) => Some(self.resolve_role_names(requested).await?),
            None => None,
        };
        let actor = self
            .authorize_user_action(identity, Action::UPDATE_USER, &target, proposed_roles)
            .await?;

        let mut errors = self
            .check_user_uniqueness(&valid, Some(target.user_id))
            .await?;
        if let Some(requested) = input.roles.as_deref() {
            errors.merge(self.check_role_references(requested).await?);
        }
        errors.into_result()?;

        let password_hash = match valid.password.as_deref() {
            Some(password) => Some(self.password_hasher.hash_password(password)?),
            None => None,
        };

        let user = self
            .user_repository
            .update_user(
                target.user_id,
                UserChanges {
                    name: valid.name,
                    username: valid.username.into(),
                    email: valid.email.into(),
                    password_hash,
                    role_ids: input.roles.as_deref().map(role_ids),
                },
            )
            .await?;

        self.audit(
            &actor,
            AuditAction::UserUpdated,
            "user",
            user.user_id,
            format!("updated user '{}'", user.username),
        )
        .await?;

        info!(actor_id = %actor.user_id(), user_id = %user.user_id, "user updated");

        Ok(MutationOutcome::new(
            user,
            "User updated successfully.",
            USERS_INDEX,
        ))
    }

    /// Deletes a user and their role assignments.
    pub async fn delete_user(
        &self,
        identity: &UserIdentity,
        user_id: i64,
    ) -> AppResult<MutationOutcome<()>> {
        let target = self.load_user(user_id).await?;
        let actor = self
            .authorize_user_action(identity, Action::DELETE_USER, &target, None)
            .await?;

        self.user_repository.delete_user(target.user_id).await?;

        self.audit(
            &actor,
            AuditAction::UserDeleted,
            "user",
            target.user_id,
            format!("deleted user '{}'", target.username),
        )
        .await?;

        info!(actor_id = %actor.user_id(), user_id = %target.user_id, "user deleted");

        Ok(MutationOutcome::new(
            (),
            "User deleted successfully.",
            USERS_INDEX,
        ))
    }

    /// Replaces the full role set of a user.
    pub async fn set_user_roles(
        &self,
        identity: &UserIdentity,
        user_id: i64,
        requested_roles: Vec<i64>,
    ) -> AppResult<MutationOutcome<UserRecord>> {
        let target = self.load_user(user_id).await?;
        let proposed_roles = self.resolve_role_names(&requested_roles).await?;
        let actor = self
            .authorize_user_action(identity, Action::UPDATE_USER, &target, Some(proposed_roles))
            .await?;

        self.check_role_references(&requested_roles)
            .await?
            .into_result()?;

        let user = self
            .user_repository
            .set_roles_for_user(target.user_id, &role_ids(&requested_roles))
            .await?;

        let role_names: Vec<&str> = user.roles.iter().map(|role| role.name.as_str()).collect();
        self.audit(
            &actor,
            AuditAction::UserRolesSynced,
            "user",
            user.user_id,
            format!(
                "set roles of '{}' to [{}]",
                user.username,
                role_names.join(", ")
            ),
        )
        .await?;

        info!(actor_id = %actor.user_id(), user_id = %user.user_id, "user roles replaced");

        Ok(MutationOutcome::new(
            user,
            "User roles updated successfully.",
            USERS_INDEX,
        ))
    }

    async fn load_user(&self, user_id: i64) -> AppResult<UserRecord> {
        self.user_repository
            .find_user(UserId::new(user_id))
            .await?
            .ok_or_else(|| not_found("user", user_id))
    }

    async fn authorize_user_action(
        &self,
        identity: &UserIdentity,
        action: Action,
        target: &UserRecord,
        proposed_roles: Option<RoleSet>,
    ) -> AppResult<ActorContext> {
        let actor = self.actor(identity).await?;
        let snapshot = self
            .authorization_service
            .user_snapshot(target, proposed_roles)
            .await?;
        self.authorization_service
            .require(&actor, action, &snapshot)?;
        Ok(actor)
    }

    /// Resolves requested ids to role names; unknown ids are ignored here and
    /// reported by reference validation.
    async fn resolve_role_names(&self, requested: &[i64]) -> AppResult<RoleSet> {
        let roles = self
            .role_repository
            .find_roles_by_ids(&role_ids(requested))
            .await?;
        Ok(roles.into_iter().map(|role| role.name).collect())
    }

    async fn check_role_references(&self, requested: &[i64]) -> AppResult<FieldErrors> {
        if requested.is_empty() {
            return Ok(FieldErrors::new());
        }

        let existing: BTreeSet<i64> = self
            .role_repository
            .find_roles_by_ids(&role_ids(requested))
            .await?
            .into_iter()
            .map(|role| role.role_id.get())
            .collect();

        Ok(missing_references("roles", requested, &existing))
    }

    async fn check_user_uniqueness(
        &self,
        valid: &ValidUser,
        except: Option<UserId>,
    ) -> AppResult<FieldErrors> {
        let mut errors = FieldErrors::new();
        let is_other = |user: &UserRecord| Some(user.user_id) != except;

        if let Some(existing) = self
            .user_repository
            .find_user_by_username(valid.username.as_str())
            .await?
            && is_other(&existing)
        {
            insert_taken(&mut errors, "username");
        }

        if let Some(existing) = self
            .user_repository
            .find_user_by_email(valid.email.as_str())
            .await?
            && is_other(&existing)
        {
            insert_taken(&mut errors, "email");
        }

        Ok(errors)
    }
}

fn role_ids(requested: &[i64]) -> Vec<RoleId> {
    dedup_ids(requested).into_iter().map(RoleId::new).collect()
}
