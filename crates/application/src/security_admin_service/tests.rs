use std::sync::Arc;

use keystone_core::{AppError, DenyReason, UserIdentity};
use keystone_domain::{AuditAction, OWNER_ROLE, SUPER_ADMIN_ROLE};

use super::{
    PERMISSIONS_INDEX, PermissionInput, ROLES_INDEX, RoleInput, SecurityAdminService,
    USERS_INDEX, UserInput,
};
use crate::AuthorizationService;
use crate::security_admin_ports::PageRequest;
use crate::test_support::{FakeRbacStore, PlainPasswordHasher};

fn build_service(store: &Arc<FakeRbacStore>) -> SecurityAdminService {
    SecurityAdminService::new(
        AuthorizationService::new(store.clone()),
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        Arc::new(PlainPasswordHasher),
    )
}

async fn admin_fixture() -> (Arc<FakeRbacStore>, SecurityAdminService, UserIdentity) {
    let store = Arc::new(FakeRbacStore::default());
    let admin = store.seed_user("admin", &[SUPER_ADMIN_ROLE]).await;
    let service = build_service(&store);
    (store, service, admin)
}

fn user_input(username: &str) -> UserInput {
    UserInput {
        name: "Jane Doe".to_owned(),
        username: username.to_owned(),
        email: format!("{username}@example.test"),
        password: Some("password".to_owned()),
        password_confirmation: Some("password".to_owned()),
        roles: None,
    }
}

async fn role_id_of(service: &SecurityAdminService, admin: &UserIdentity, name: &str) -> i64 {
    service
        .list_roles(admin, PageRequest::new(Some(1), Some(100)))
        .await
        .unwrap_or_else(|_| unreachable!())
        .items
        .into_iter()
        .find(|role| role.name == name)
        .map(|role| role.role_id.get())
        .unwrap_or_else(|| unreachable!())
}

#[tokio::test]
async fn duplicate_permission_name_is_rejected() {
    let (_store, service, admin) = admin_fixture().await;
    let input = PermissionInput {
        name: "Edit Posts".to_owned(),
    };

    let created = service
        .create_permission(&admin, input.clone())
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(created.value.name, "Edit Posts");
    assert_eq!(created.message, "Permission created successfully.");
    assert_eq!(created.redirect_to, PERMISSIONS_INDEX);

    let duplicate = service.create_permission(&admin, input).await;
    let Err(AppError::Validation(errors)) = duplicate else {
        unreachable!()
    };
    assert_eq!(errors.get("name"), Some("The name has already been taken."));
}

#[tokio::test]
async fn role_permissions_follow_the_submitted_set() {
    let (store, service, admin) = admin_fixture().await;
    let first = store.seed_permission("Edit Posts").await;
    let second = store.seed_permission("Delete Posts").await;
    let third = store.seed_permission("Publish Posts").await;

    let created = service
        .create_role(
            &admin,
            RoleInput {
                name: "Manager".to_owned(),
                permissions: Some(vec![first, second, third]),
            },
        )
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(created.value.permissions.len(), 3);
    assert_eq!(created.message, "Role created successfully.");
    assert_eq!(created.redirect_to, ROLES_INDEX);

    let updated = service
        .update_role(
            &admin,
            created.value.role_id.get(),
            RoleInput {
                name: "Manager".to_owned(),
                permissions: Some(vec![first]),
            },
        )
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(updated.value.permissions.len(), 1);
    assert_eq!(updated.value.permissions[0].name, "Edit Posts");
}

#[tokio::test]
async fn role_update_without_permissions_keeps_grants() {
    let (store, service, admin) = admin_fixture().await;
    let permission = store.seed_permission("Edit Posts").await;
    let role_id = store.seed_role("Editor", &[permission]).await;

    let updated = service
        .update_role(
            &admin,
            role_id,
            RoleInput {
                name: "Senior Editor".to_owned(),
                permissions: None,
            },
        )
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(updated.value.name, "Senior Editor");
    assert_eq!(updated.value.permissions.len(), 1);
}

#[tokio::test]
async fn unknown_permission_ids_are_keyed_by_position() {
    let (store, service, admin) = admin_fixture().await;
    let known = store.seed_permission("Edit Posts").await;

    let result = service
        .create_role(
            &admin,
            RoleInput {
                name: "Manager".to_owned(),
                permissions: Some(vec![9_001, 9_002, known]),
            },
        )
        .await;

    let Err(AppError::Validation(errors)) = result else {
        unreachable!()
    };
    assert!(errors.contains("permissions.0"));
    assert!(errors.contains("permissions.1"));
    assert!(!errors.contains("permissions.2"));
    assert_eq!(store.role_permission_count().await, 0);
}

#[tokio::test]
async fn regular_user_cannot_create_users() {
    let (store, service, _admin) = admin_fixture().await;
    let editor = store.seed_user("editor", &["Editor"]).await;
    let before = store.user_count().await;

    let result = service.create_user(&editor, user_input("jane")).await;

    assert!(matches!(
        result,
        Err(AppError::Forbidden(DenyReason::NotAuthorized))
    ));
    assert_eq!(store.user_count().await, before);
    assert!(store.events.lock().await.is_empty());
}

#[tokio::test]
async fn regular_user_cannot_discover_targets() {
    let (store, service, _admin) = admin_fixture().await;
    let editor = store.seed_user("editor", &["Editor"]).await;

    let result = service.get_user(&editor, 9_999).await;
    assert!(matches!(
        result,
        Err(AppError::Forbidden(DenyReason::NotAuthorized))
    ));
}

#[tokio::test]
async fn super_admin_cannot_delete_self() {
    let (store, service, admin) = admin_fixture().await;
    store.seed_user("backup", &[SUPER_ADMIN_ROLE]).await;

    let result = service.delete_user(&admin, admin.user_id()).await;

    assert!(matches!(
        result,
        Err(AppError::Forbidden(DenyReason::SelfDeletion))
    ));
    assert_eq!(store.user_count().await, 2);
}

#[tokio::test]
async fn sole_super_admin_cannot_revoke_own_role() {
    let (store, service, admin) = admin_fixture().await;
    let before = store.user_role_count().await;

    let result = service.set_user_roles(&admin, admin.user_id(), Vec::new()).await;

    assert!(matches!(
        result,
        Err(AppError::Forbidden(DenyReason::LastAdminProtected))
    ));
    assert_eq!(store.user_role_count().await, before);
}

#[tokio::test]
async fn bootstrap_account_cannot_be_deleted() {
    let (store, service, admin) = admin_fixture().await;
    let bootstrap = store.seed_user("superadmin", &[SUPER_ADMIN_ROLE]).await;
    store.set_bootstrap(bootstrap.user_id()).await;

    let result = service.delete_user(&admin, bootstrap.user_id()).await;

    assert!(matches!(
        result,
        Err(AppError::Forbidden(DenyReason::BootstrapProtected))
    ));
}

#[tokio::test]
async fn owner_manages_users_but_not_roles() {
    let (store, service, admin) = admin_fixture().await;
    let owner = store.seed_user("owner", &[OWNER_ROLE]).await;

    let created = service
        .create_user(&owner, user_input("jane"))
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(created.redirect_to, USERS_INDEX);

    let deleted = service
        .delete_user(&owner, created.value.user_id.get())
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(deleted.message, "User deleted successfully.");

    let role_result = service
        .create_role(
            &owner,
            RoleInput {
                name: "Manager".to_owned(),
                permissions: None,
            },
        )
        .await;
    assert!(matches!(
        role_result,
        Err(AppError::Forbidden(DenyReason::NotAuthorized))
    ));

    // Role listing stays visible to Super Admins only.
    assert!(
        service
            .list_roles(&owner, PageRequest::default())
            .await
            .is_err()
    );
    assert!(service.list_roles(&admin, PageRequest::default()).await.is_ok());
}

#[tokio::test]
async fn owner_cannot_change_super_admin_membership() {
    let (store, service, admin) = admin_fixture().await;
    let owner = store.seed_user("owner", &[OWNER_ROLE]).await;
    let super_admin = role_id_of(&service, &admin, SUPER_ADMIN_ROLE).await;
    let owner_role = role_id_of(&service, &admin, OWNER_ROLE).await;

    let self_grant = service
        .set_user_roles(&owner, owner.user_id(), vec![owner_role, super_admin])
        .await;
    assert!(matches!(
        self_grant,
        Err(AppError::Forbidden(DenyReason::NotAuthorized))
    ));
    assert!(
        service
            .create_role(
                &owner,
                RoleInput {
                    name: "Escalated".to_owned(),
                    permissions: None,
                },
            )
            .await
            .is_err()
    );

    let mut escalated = user_input("mallory");
    escalated.roles = Some(vec![super_admin]);
    let created = service.create_user(&owner, escalated).await;
    assert!(matches!(
        created,
        Err(AppError::Forbidden(DenyReason::NotAuthorized))
    ));

    let demoted = service
        .set_user_roles(&owner, admin.user_id(), Vec::new())
        .await;
    assert!(matches!(
        demoted,
        Err(AppError::Forbidden(DenyReason::NotAuthorized))
    ));

    let deleted = service.delete_user(&owner, admin.user_id()).await;
    assert!(matches!(
        deleted,
        Err(AppError::Forbidden(DenyReason::NotAuthorized))
    ));

    let mut profile = user_input("admin");
    profile.password = None;
    profile.password_confirmation = None;
    assert!(
        service
            .update_user(&owner, admin.user_id(), profile)
            .await
            .is_ok()
    );
    assert_eq!(store.user_count().await, 2);
    let events = store.events.lock().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].action, AuditAction::UserUpdated);
}

#[tokio::test]
async fn super_admin_role_cannot_be_deleted_or_renamed() {
    let (_store, service, admin) = admin_fixture().await;
    let super_admin = role_id_of(&service, &admin, SUPER_ADMIN_ROLE).await;

    let deleted = service.delete_role(&admin, super_admin).await;
    assert!(matches!(
        deleted,
        Err(AppError::Forbidden(DenyReason::SystemRoleProtected))
    ));

    let renamed = service
        .update_role(
            &admin,
            super_admin,
            RoleInput {
                name: "Root".to_owned(),
                permissions: None,
            },
        )
        .await;
    assert!(matches!(
        renamed,
        Err(AppError::Forbidden(DenyReason::SystemRoleProtected))
    ));
}

#[tokio::test]
async fn deleting_a_role_removes_its_associations() {
    let (store, service, admin) = admin_fixture().await;
    let permission = store.seed_permission("Edit Posts").await;
    let role_id = store.seed_role("Editor", &[permission]).await;
    let member = service
        .create_user(
            &admin,
            UserInput {
                roles: Some(vec![role_id]),
                ..user_input("jane")
            },
        )
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(member.value.roles.len(), 1);
    let assignments_before = store.user_role_count().await;

    service
        .delete_role(&admin, role_id)
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(store.role_permission_count().await, 0);
    assert_eq!(store.user_role_count().await, assignments_before - 1);
    let reloaded = service
        .get_user(&admin, member.value.user_id.get())
        .await
        .unwrap_or_else(|_| unreachable!());
    assert!(reloaded.roles.is_empty());
}

#[tokio::test]
async fn replacing_role_permissions_is_idempotent() {
    let (store, service, admin) = admin_fixture().await;
    let first = store.seed_permission("Edit Posts").await;
    let second = store.seed_permission("Delete Posts").await;
    let role_id = store.seed_role("Editor", &[]).await;

    for _ in 0..2 {
        let outcome = service
            .set_role_permissions(&admin, role_id, vec![first, second, first])
            .await
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(outcome.value.permissions.len(), 2);
    }
    assert_eq!(store.role_permission_count().await, 2);
}

#[tokio::test]
async fn password_confirmation_must_match() {
    let (store, service, admin) = admin_fixture().await;

    let result = service
        .create_user(
            &admin,
            UserInput {
                password_confirmation: Some("different".to_owned()),
                ..user_input("jane")
            },
        )
        .await;

    let Err(AppError::Validation(errors)) = result else {
        unreachable!()
    };
    assert!(errors.contains("password"));
    assert_eq!(store.user_count().await, 1);
}

#[tokio::test]
async fn username_and_email_are_unique_except_for_self() {
    let (_store, service, admin) = admin_fixture().await;
    let jane = service
        .create_user(&admin, user_input("jane"))
        .await
        .unwrap_or_else(|_| unreachable!());

    let duplicate = service.create_user(&admin, user_input("jane")).await;
    let Err(AppError::Validation(errors)) = duplicate else {
        unreachable!()
    };
    assert_eq!(
        errors.get("username"),
        Some("The username has already been taken.")
    );
    assert_eq!(errors.get("email"), Some("The email has already been taken."));

    let updated = service
        .update_user(
            &admin,
            jane.value.user_id.get(),
            UserInput {
                name: "Jane Q. Doe".to_owned(),
                password: None,
                password_confirmation: None,
                ..user_input("jane")
            },
        )
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(updated.value.name, "Jane Q. Doe");
    assert_eq!(updated.message, "User updated successfully.");
}

#[tokio::test]
async fn update_of_missing_user_is_not_found() {
    let (_store, service, admin) = admin_fixture().await;

    let result = service
        .update_user(&admin, 9_999, user_input("ghost"))
        .await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn mutations_append_audit_events() {
    let (store, service, admin) = admin_fixture().await;

    let permission = service
        .create_permission(
            &admin,
            PermissionInput {
                name: "Edit Posts".to_owned(),
            },
        )
        .await
        .unwrap_or_else(|_| unreachable!());
    service
        .delete_permission(&admin, permission.value.permission_id.get())
        .await
        .unwrap_or_else(|_| unreachable!());

    let events = store.events.lock().await;
    let actions: Vec<AuditAction> = events.iter().map(|event| event.action).collect();
    assert_eq!(
        actions,
        vec![AuditAction::PermissionCreated, AuditAction::PermissionDeleted]
    );
    assert!(
        events
            .iter()
            .all(|event| event.actor_id.get() == admin.user_id())
    );
}
