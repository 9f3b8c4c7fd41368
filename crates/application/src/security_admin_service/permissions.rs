use keystone_core::{AppResult, FieldErrors, GuardName, UserIdentity};
use keystone_domain::{Action, AuditAction, PermissionId, ResourceSnapshot, validate_name};
use tracing::info;

use super::validation::insert_taken;
use super::{MutationOutcome, PERMISSIONS_INDEX, SecurityAdminService, not_found};
use crate::security_admin_ports::{Page, PageRequest, PermissionChanges, PermissionRecord};

/// Raw permission form submitted by an administrator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionInput {
    /// Permission name.
    pub name: String,
}

impl SecurityAdminService {
    /// Lists permissions.
    pub async fn list_permissions(
        &self,
        identity: &UserIdentity,
        page: PageRequest,
    ) -> AppResult<Page<PermissionRecord>> {
        self.authorization_service
            .require_collection_action(identity, Action::VIEW_PERMISSIONS)
            .await?;

        self.permission_repository.list_permissions(page).await
    }

    /// Returns one permission.
    pub async fn get_permission(
        &self,
        identity: &UserIdentity,
        permission_id: i64,
    ) -> AppResult<PermissionRecord> {
        self.authorization_service
            .require_collection_action(identity, Action::VIEW_PERMISSIONS)
            .await?;

        self.load_permission(permission_id).await
    }

    /// Creates a permission in the default guard scope.
    pub async fn create_permission(
        &self,
        identity: &UserIdentity,
        input: PermissionInput,
    ) -> AppResult<MutationOutcome<PermissionRecord>> {
        let name = validate_name("name", &input.name)?;

        let actor = self
            .authorization_service
            .require_collection_action(identity, Action::CREATE_PERMISSION)
            .await?;

        let guard_name = GuardName::default();
        self.check_permission_name(&guard_name, name.as_str(), None)
            .await?
            .into_result()?;

        let permission = self
            .permission_repository
            .create_permission(&guard_name, name.as_str())
            .await?;

        self.audit(
            &actor,
            AuditAction::PermissionCreated,
            "permission",
            permission.permission_id,
            format!("created permission '{}'", permission.name),
        )
        .await?;

        info!(
            actor_id = %actor.user_id(),
            permission_id = %permission.permission_id,
            "permission created"
        );

        Ok(MutationOutcome::new(
            permission,
            "Permission created successfully.",
            PERMISSIONS_INDEX,
        ))
    }

    /// Renames a permission.
    pub async fn update_permission(
        &self,
        identity: &UserIdentity,
        permission_id: i64,
        input: PermissionInput,
    ) -> AppResult<MutationOutcome<PermissionRecord>> {
        let name = validate_name("name", &input.name)?;
        let target = self.load_permission(permission_id).await?;

        let actor = self.actor(identity).await?;
        self.authorization_service.require(
            &actor,
            Action::UPDATE_PERMISSION,
            &ResourceSnapshot::Permission,
        )?;

        self.check_permission_name(
            &target.guard_name,
            name.as_str(),
            Some(target.permission_id),
        )
        .await?
        .into_result()?;

        let permission = self
            .permission_repository
            .update_permission(
                target.permission_id,
                PermissionChanges { name: name.into() },
            )
            .await?;

        self.audit(
            &actor,
            AuditAction::PermissionUpdated,
            "permission",
            permission.permission_id,
            format!(
                "renamed permission '{}' to '{}'",
                target.name, permission.name
            ),
        )
        .await?;

        info!(
            actor_id = %actor.user_id(),
            permission_id = %permission.permission_id,
            "permission updated"
        );

        Ok(MutationOutcome::new(
            permission,
            "Permission updated successfully.",
            PERMISSIONS_INDEX,
        ))
    }

    /// Deletes a permission, detaching it from every role.
    pub async fn delete_permission(
        &self,
        identity: &UserIdentity,
        permission_id: i64,
    ) -> AppResult<MutationOutcome<()>> {
        let target = self.load_permission(permission_id).await?;

        let actor = self.actor(identity).await?;
        self.authorization_service.require(
            &actor,
            Action::DELETE_PERMISSION,
            &ResourceSnapshot::Permission,
        )?;

        self.permission_repository
            .delete_permission(target.permission_id)
            .await?;

        self.audit(
            &actor,
            AuditAction::PermissionDeleted,
            "permission",
            target.permission_id,
            format!("deleted permission '{}'", target.name),
        )
        .await?;

        info!(
            actor_id = %actor.user_id(),
            permission_id = %target.permission_id,
            "permission deleted"
        );

        Ok(MutationOutcome::new(
            (),
            "Permission deleted successfully.",
            PERMISSIONS_INDEX,
        ))
    }

    async fn load_permission(&self, permission_id: i64) -> AppResult<PermissionRecord> {
        self.permission_repository
            .find_permission(PermissionId::new(permission_id))
            .await?
            .ok_or_else(|| not_found("permission", permission_id))
    }

    async fn check_permission_name(
        &self,
        guard_name: &GuardName,
        name: &str,
        except: Option<PermissionId>,
    ) -> AppResult<FieldErrors> {
        let mut errors = FieldErrors::new();
        if let Some(existing) = self
            .permission_repository
            .find_permission_by_name(guard_name, name)
            .await?
            && Some(existing.permission_id) != except
        {
            insert_taken(&mut errors, "name");
        }

        Ok(errors)
    }
}
