use axum::Json;
use axum::extract::{Extension, State};
use axum::http::StatusCode;
use keystone_core::{AppError, UserIdentity};
use tower_sessions::Session;
use tracing::info;

use crate::dto::{CurrentUserResponse, LoginRequest};
use crate::error::ApiResult;
use crate::extract::ApiJson;
use crate::state::AppState;

pub const SESSION_USER_KEY: &str = "user_identity";
/// Unix timestamp of the login that created the session.
pub const SESSION_CREATED_AT_KEY: &str = "session_created_at";

/// POST /auth/login - Authenticate with username and password.
pub async fn login_handler(
    State(state): State<AppState>,
    session: Session,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> ApiResult<Json<CurrentUserResponse>> {
    let identity = state
        .user_service
        .login(&payload.username, &payload.password)
        .await?;

    // New session id on privilege change.
    session
        .cycle_id()
        .await
        .map_err(|error| AppError::Internal(format!("failed to cycle session id: {error}")))?;

    session
        .insert(SESSION_USER_KEY, &identity)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to persist session identity: {error}"))
        })?;

    session
        .insert(SESSION_CREATED_AT_KEY, chrono::Utc::now().timestamp())
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to persist session creation time: {error}"))
        })?;

    info!(user_id = identity.user_id(), "user signed in");
    let user = state.user_service.current_user(&identity).await?;

    Ok(Json(CurrentUserResponse::from(user)))
}

/// POST /auth/logout - Drop the session; succeeds without one.
pub async fn logout_handler(session: Session) -> ApiResult<StatusCode> {
    let user_id = session
        .get::<UserIdentity>(SESSION_USER_KEY)
        .await
        .map_err(|error| AppError::Internal(format!("failed to read session identity: {error}")))?
        .map(|identity| identity.user_id());

    session
        .delete()
        .await
        .map_err(|error| AppError::Internal(format!("failed to delete session: {error}")))?;

    if let Some(user_id) = user_id {
        info!(user_id, "user signed out");
    }

    Ok(StatusCode::NO_CONTENT)
}

/// GET /auth/me - Current identity with role names loaded from the store.
pub async fn me_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
) -> ApiResult<Json<CurrentUserResponse>> {
    let record = state.user_service.current_user(&user).await?;
    Ok(Json(CurrentUserResponse::from(record)))
}
