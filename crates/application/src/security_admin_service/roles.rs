use std::collections::BTreeSet;

use keystone_core::{AppResult, FieldErrors, GuardName, UserIdentity};
use keystone_domain::{Action, AuditAction, PermissionId, RoleId, validate_name};
use tracing::info;

use super::validation::{dedup_ids, insert_taken, missing_references};
use super::{MutationOutcome, ROLES_INDEX, SecurityAdminService, not_found};
use crate::AuthorizationService;
use crate::security_admin_ports::{NewRole, Page, PageRequest, RoleChanges, RoleRecord};

/// Raw role form submitted by an administrator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleInput {
    /// Role name.
    pub name: String,
    /// Permission ids to grant; `None` keeps current grants on update.
    pub permissions: Option<Vec<i64>>,
}

impl SecurityAdminService {
    /// Lists roles with their permissions.
    pub async fn list_roles(
        &self,
        identity: &UserIdentity,
        page: PageRequest,
    ) -> AppResult<Page<RoleRecord>> {
        self.authorization_service
            .require_collection_action(identity, Action::VIEW_ROLES)
            .await?;

        self.role_repository.list_roles(page).await
    }

    /// Returns one role with its permissions.
    pub async fn get_role(&self, identity: &UserIdentity, role_id: i64) -> AppResult<RoleRecord> {
        self.authorization_service
            .require_collection_action(identity, Action::VIEW_ROLES)
            .await?;

        self.load_role(role_id).await
    }

    /// Creates a role with its initial permission set.
    pub async fn create_role(
        &self,
        identity: &UserIdentity,
        input: RoleInput,
    ) -> AppResult<MutationOutcome<RoleRecord>> {
        let name = validate_name("name", &input.name)?;

        let actor = self
            .authorization_service
            .require_collection_action(identity, Action::CREATE_ROLE)
            .await?;

        let guard_name = GuardName::default();
        let requested = input.permissions.unwrap_or_default();
        let mut errors = self
            .check_role_name(&guard_name, name.as_str(), None)
            .await?;
        errors.merge(self.check_permission_references(&requested).await?);
        errors.into_result()?;

        let role = self
            .role_repository
            .create_role(NewRole {
                name: name.into(),
                guard_name,
                permission_ids: permission_ids(&requested),
            })
            .await?;

        self.audit(
            &actor,
            AuditAction::RoleCreated,
            "role",
            role.role_id,
            format!(
                "created role '{}' with {} permissions",
                role.name,
                role.permissions.len()
            ),
        )
        .await?;

        info!(actor_id = %actor.user_id(), role_id = %role.role_id, "role created");

        Ok(MutationOutcome::new(
            role,
            "Role created successfully.",
            ROLES_INDEX,
        ))
    }

    /// Renames a role and optionally replaces its permission set.
    pub async fn update_role(
        &self,
        identity: &UserIdentity,
        role_id: i64,
        input: RoleInput,
    ) -> AppResult<MutationOutcome<RoleRecord>> {
        let name = validate_name("name", &input.name)?;
        let target = self.load_role(role_id).await?;

        let actor = self.actor(identity).await?;
        self.authorization_service.require(
            &actor,
            Action::UPDATE_ROLE,
            &AuthorizationService::role_snapshot(&target, Some(name.as_str())),
        )?;

        let mut errors = self
            .check_role_name(&target.guard_name, name.as_str(), Some(target.role_id))
            .await?;
        if let Some(requested) = input.permissions.as_deref() {
            errors.merge(self.check_permission_references(requested).await?);
        }
        errors.into_result()?;

        let role = self
            .role_repository
            .update_role(
                target.role_id,
                RoleChanges {
                    name: name.into(),
                    permission_ids: input.permissions.as_deref().map(permission_ids),
                },
            )
            .await?;

        self.audit(
            &actor,
            AuditAction::RoleUpdated,
            "role",
            role.role_id,
            format!("updated role '{}'", role.name),
        )
        .await?;

        info!(actor_id = %actor.user_id(), role_id = %role.role_id, "role updated");

        Ok(MutationOutcome::new(
            role,
            "Role updated successfully.",
            ROLES_INDEX,
        ))
    }

    /// Deletes a role, detaching it from users and permissions.
    pub async fn delete_role(
        &self,
        identity: &UserIdentity,
        role_id: i64,
    ) -> AppResult<MutationOutcome<()>> {
        let target = self.load_role(role_id).await?;

        let actor = self.actor(identity).await?;
        self.authorization_service.require(
            &actor,
            Action::DELETE_ROLE,
            &AuthorizationService::role_snapshot(&target, None),
        )?;

        self.role_repository.delete_role(target.role_id).await?;

        self.audit(
            &actor,
            AuditAction::RoleDeleted,
            "role",
            target.role_id,
            format!("deleted role '{}'", target.name),
        )
        .await?;

        info!(actor_id = %actor.user_id(), role_id = %target.role_id, "role deleted");

        Ok(MutationOutcome::new(
            (),
            "Role deleted successfully.",
            ROLES_INDEX,
        ))
    }

    /// Replaces the full permission set of a role.
    pub async fn set_role_permissions(
        &self,
        identity: &UserIdentity,
        role_id: i64,
        requested: Vec<i64>,
    ) -> AppResult<MutationOutcome<RoleRecord>> {
        let target = self.load_role(role_id).await?;

        let actor = self.actor(identity).await?;
        self.authorization_service.require(
            &actor,
            Action::UPDATE_ROLE,
            &AuthorizationService::role_snapshot(&target, None),
        )?;

        self.check_permission_references(&requested)
            .await?
            .into_result()?;

        let role = self
            .role_repository
            .set_permissions_for_role(target.role_id, &permission_ids(&requested))
            .await?;

        self.audit(
            &actor,
            AuditAction::RolePermissionsSynced,
            "role",
            role.role_id,
            format!(
                "set {} permissions on role '{}'",
                role.permissions.len(),
                role.name
            ),
        )
        .await?;

        info!(actor_id = %actor.user_id(), role_id = %role.role_id, "role permissions replaced");

        Ok(MutationOutcome::new(
            role,
            "Role permissions updated successfully.",
            ROLES_INDEX,
        ))
    }

    async fn load_role(&self, role_id: i64) -> AppResult<RoleRecord> {
        self.role_repository
            .find_role(RoleId::new(role_id))
            .await?
            .ok_or_else(|| not_found("role", role_id))
    }

    async fn check_role_name(
        &self,
        guard_name: &GuardName,
        name: &str,
        except: Option<RoleId>,
    ) -> AppResult<FieldErrors> {
        let mut errors = FieldErrors::new();
        if let Some(existing) = self.role_repository.find_role_by_name(guard_name, name).await?
            && Some(existing.role_id) != except
        {
            insert_taken(&mut errors, "name");
        }

        Ok(errors)
    }

    async fn check_permission_references(&self, requested: &[i64]) -> AppResult<FieldErrors> {
        if requested.is_empty() {
            return Ok(FieldErrors::new());
        }

        let existing: BTreeSet<i64> = self
            .permission_repository
            .find_existing_permission_ids(&permission_ids(requested))
            .await?
            .into_iter()
            .map(|permission_id| permission_id.get())
            .collect();

        Ok(missing_references("permissions", requested, &existing))
    }
}

fn permission_ids(requested: &[i64]) -> Vec<PermissionId> {
    dedup_ids(requested)
        .into_iter()
        .map(PermissionId::new)
        .collect()
}
