use keystone_application::{NewRole, PermissionRepository, RoleChanges, RoleRepository};
use keystone_core::{AppError, GuardName};
use keystone_domain::PermissionId;
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;

use super::PostgresRoleRepository;
use crate::PostgresPermissionRepository;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

async fn test_pool() -> Option<PgPool> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        return None;
    };

    let pool = match PgPoolOptions::new()
        .max_connections(2)
        .connect(database_url.as_str())
        .await
    {
        Ok(pool) => pool,
        Err(error) => panic!("failed to connect to DATABASE_URL in test: {error}"),
    };

    if let Err(error) = MIGRATOR.run(&pool).await {
        panic!("failed to run migrations for postgres role tests: {error}");
    }

    Some(pool)
}

fn unique(prefix: &str) -> String {
    format!("{prefix} {}", uuid::Uuid::new_v4().simple())
}

async fn seed_permissions(pool: &PgPool, count: usize) -> Vec<PermissionId> {
    let repository = PostgresPermissionRepository::new(pool.clone());
    let mut permission_ids = Vec::with_capacity(count);
    for _ in 0..count {
        let permission = repository
            .create_permission(&GuardName::default(), &unique("perm"))
            .await
            .unwrap_or_else(|_| unreachable!());
        permission_ids.push(permission.permission_id);
    }
    permission_ids
}

fn new_role(name: &str, permission_ids: Vec<PermissionId>) -> NewRole {
    NewRole {
        name: name.to_owned(),
        guard_name: GuardName::default(),
        permission_ids,
    }
}

#[tokio::test]
async fn role_permissions_follow_updates() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let repository = PostgresRoleRepository::new(pool.clone());
    let permission_ids = seed_permissions(&pool, 3).await;
    let name = unique("Manager");

    let created = repository
        .create_role(new_role(&name, permission_ids.clone()))
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(created.permissions.len(), 3);

    let updated = repository
        .update_role(
            created.role_id,
            RoleChanges {
                name: name.clone(),
                permission_ids: Some(vec![permission_ids[0]]),
            },
        )
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(updated.permissions.len(), 1);
    assert_eq!(updated.permissions[0].permission_id, permission_ids[0]);

    let renamed = repository
        .update_role(
            created.role_id,
            RoleChanges {
                name: format!("{name} II"),
                permission_ids: None,
            },
        )
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(renamed.permissions.len(), 1);
}

#[tokio::test]
async fn duplicate_role_name_maps_to_conflict() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let repository = PostgresRoleRepository::new(pool);
    let name = unique("Auditor");
    assert!(repository.create_role(new_role(&name, Vec::new())).await.is_ok());

    let result = repository.create_role(new_role(&name, Vec::new())).await;
    let Err(AppError::Conflict(errors)) = result else {
        panic!("expected conflict, got {result:?}");
    };
    assert!(errors.contains("name"));
}

#[tokio::test]
async fn set_permissions_is_idempotent() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let repository = PostgresRoleRepository::new(pool.clone());
    let permission_ids = seed_permissions(&pool, 2).await;
    let created = repository
        .create_role(new_role(&unique("Editor"), Vec::new()))
        .await
        .unwrap_or_else(|_| unreachable!());

    for _ in 0..2 {
        let role = repository
            .set_permissions_for_role(created.role_id, &permission_ids)
            .await
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(role.permissions.len(), 2);
    }
}

#[tokio::test]
async fn delete_role_cascades_grants() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let repository = PostgresRoleRepository::new(pool.clone());
    let permission_ids = seed_permissions(&pool, 1).await;
    let created = repository
        .create_role(new_role(&unique("Temp"), permission_ids))
        .await
        .unwrap_or_else(|_| unreachable!());

    assert!(repository.delete_role(created.role_id).await.is_ok());

    let grants =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM role_permissions WHERE role_id = $1")
            .bind(created.role_id.get())
            .fetch_one(&pool)
            .await;
    assert!(matches!(grants, Ok(0)));
    assert!(matches!(repository.find_role(created.role_id).await, Ok(None)));

    let missing = repository.delete_role(created.role_id).await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn permission_deleted_before_write_is_a_validation_error() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let permission_ids = seed_permissions(&pool, 2).await;
    assert!(
        PostgresPermissionRepository::new(pool.clone())
            .delete_permission(permission_ids[1])
            .await
            .is_ok()
    );

    let repository = PostgresRoleRepository::new(pool);
    let name = unique("late role");
    let result = repository.create_role(new_role(&name, permission_ids.clone())).await;
    let Err(AppError::Validation(errors)) = result else {
        panic!("expected validation error, got {result:?}");
    };
    assert!(errors.contains("permissions.1"));
    assert!(matches!(
        repository.find_role_by_name(&GuardName::default(), &name).await,
        Ok(None)
    ));
}
