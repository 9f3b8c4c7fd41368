//! Shared transactional helpers for the RBAC tables.

use keystone_core::{AppError, AppResult, DEFAULT_GUARD, DenyReason, FieldErrors};
use keystone_domain::SUPER_ADMIN_ROLE;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use tracing::{debug, warn};

pub(crate) async fn begin(pool: &PgPool) -> AppResult<Transaction<'static, Postgres>> {
    pool.begin()
        .await
        .map_err(|error| AppError::Internal(format!("failed to begin transaction: {error}")))
}

pub(crate) async fn commit(transaction: Transaction<'static, Postgres>) -> AppResult<()> {
    transaction
        .commit()
        .await
        .map_err(|error| AppError::Internal(format!("failed to commit transaction: {error}")))
}

/// Locks the Super Admin role row and returns its current holder count.
///
/// Every write that can remove a holder takes this lock first, so two
/// concurrent demotions cannot both observe a remaining holder.
pub(crate) async fn lock_super_admin_holders(connection: &mut PgConnection) -> AppResult<i64> {
    let role_id = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT id
        FROM roles
        WHERE guard_name = $1 AND name = $2
        FOR UPDATE
        "#,
    )
    .bind(DEFAULT_GUARD)
    .bind(SUPER_ADMIN_ROLE)
    .fetch_optional(&mut *connection)
    .await
    .map_err(|error| AppError::Internal(format!("failed to lock super admin role: {error}")))?;

    let Some(role_id) = role_id else {
        return Ok(0);
    };

    count_holders(connection, role_id).await
}

/// Fails when a write inside the transaction removed the last Super Admin holder.
///
/// The caller drops the transaction on error, which rolls the write back.
pub(crate) async fn ensure_holder_remains(
    connection: &mut PgConnection,
    holders_before: i64,
) -> AppResult<()> {
    if holders_before == 0 {
        return Ok(());
    }

    let role_id = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT id
        FROM roles
        WHERE guard_name = $1 AND name = $2
        "#,
    )
    .bind(DEFAULT_GUARD)
    .bind(SUPER_ADMIN_ROLE)
    .fetch_optional(&mut *connection)
    .await
    .map_err(|error| AppError::Internal(format!("failed to resolve super admin role: {error}")))?;

    let holders_after = match role_id {
        Some(role_id) => count_holders(connection, role_id).await?,
        None => 0,
    };

    debug!(holders_before, holders_after, "super admin holders re-checked");
    if holders_after == 0 {
        warn!(holders_before, "write would remove the last super admin holder");
        return Err(AppError::Forbidden(DenyReason::LastAdminProtected));
    }

    Ok(())
}

async fn count_holders(connection: &mut PgConnection, role_id: i64) -> AppResult<i64> {
    sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*)
        FROM user_roles
        WHERE role_id = $1
        "#,
    )
    .bind(role_id)
    .fetch_one(connection)
    .await
    .map_err(|error| AppError::Internal(format!("failed to count super admin holders: {error}")))
}

/// Referenced table of a pivot insert.
#[derive(Clone, Copy, Debug)]
pub(crate) enum Reference {
    Roles,
    Permissions,
}

impl Reference {
    fn field(self) -> &'static str {
        match self {
            Self::Roles => "roles",
            Self::Permissions => "permissions",
        }
    }

    fn lock_query(self) -> &'static str {
        match self {
            Self::Roles => "SELECT id FROM roles WHERE id = ANY($1) FOR KEY SHARE",
            Self::Permissions => "SELECT id FROM permissions WHERE id = ANY($1) FOR KEY SHARE",
        }
    }
}

/// Key-share locks the referenced rows until commit and rejects ids that are gone.
///
/// Missing ids are keyed `roles.N` or `permissions.N` by their position in `ids`.
pub(crate) async fn lock_references(
    connection: &mut PgConnection,
    reference: Reference,
    ids: &[i64],
) -> AppResult<()> {
    if ids.is_empty() {
        return Ok(());
    }

    let found = sqlx::query_scalar::<_, i64>(reference.lock_query())
        .bind(ids)
        .fetch_all(connection)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to lock referenced {}: {error}",
                reference.field()
            ))
        })?;

    let mut errors = FieldErrors::new();
    for (index, id) in ids.iter().enumerate() {
        if !found.contains(id) {
            let key = format!("{}.{index}", reference.field());
            errors.insert(key.clone(), format!("The selected {key} is invalid."));
        }
    }

    if !errors.is_empty() {
        warn!(reference = reference.field(), "referenced rows vanished before write");
    }
    errors.into_result()
}

/// Maps unique violations on known constraints to field-keyed conflicts.
pub(crate) fn conflict_or_internal(
    error: sqlx::Error,
    operation: &str,
    constraints: &[(&str, &str)],
) -> AppError {
    if let sqlx::Error::Database(ref database_error) = error
        && database_error.code().as_deref() == Some("23505")
    {
        let field = database_error
            .constraint()
            .and_then(|constraint| {
                constraints
                    .iter()
                    .find(|(name, _)| *name == constraint)
                    .map(|(_, field)| *field)
            })
            .unwrap_or("name");
        debug!(operation, field, "unique constraint lost at commit");
        return AppError::conflict(field, format!("The {field} has already been taken."));
    }

    AppError::Internal(format!("failed to {operation}: {error}"))
}
