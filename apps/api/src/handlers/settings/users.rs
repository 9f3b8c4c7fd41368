use super::*;

pub async fn list_users_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<PageResponse<UserResponse>>> {
    let page = state
        .security_admin_service
        .list_users(&user, query.into())
        .await?;

    Ok(Json(PageResponse::from_page(page, UserResponse::from)))
}

pub async fn show_user_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(user_id): Path<i64>,
) -> ApiResult<Json<UserResponse>> {
    let record = state
        .security_admin_service
        .get_user(&user, user_id)
        .await?;

    Ok(Json(UserResponse::from(record)))
}

pub async fn create_user_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    ApiJson(payload): ApiJson<UserRequest>,
) -> ApiResult<(StatusCode, Json<MutationResponse<UserResponse>>)> {
    let outcome = state
        .security_admin_service
        .create_user(&user, payload.into())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(MutationResponse::from_outcome(outcome, UserResponse::from)),
    ))
}

pub async fn update_user_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(user_id): Path<i64>,
    ApiJson(payload): ApiJson<UserRequest>,
) -> ApiResult<Json<MutationResponse<UserResponse>>> {
    let outcome = state
        .security_admin_service
        .update_user(&user, user_id, payload.into())
        .await?;

    Ok(Json(MutationResponse::from_outcome(outcome, UserResponse::from)))
}

pub async fn delete_user_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(user_id): Path<i64>,
) -> ApiResult<Json<MutationResponse<()>>> {
    let outcome = state
        .security_admin_service
        .delete_user(&user, user_id)
        .await?;

    Ok(Json(MutationResponse::from_outcome(outcome, |()| ())))
}

pub async fn sync_user_roles_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(user_id): Path<i64>,
    ApiJson(payload): ApiJson<SyncUserRolesRequest>,
) -> ApiResult<Json<MutationResponse<UserResponse>>> {
    let outcome = state
        .security_admin_service
        .set_user_roles(&user, user_id, payload.roles)
        .await?;

    Ok(Json(MutationResponse::from_outcome(outcome, UserResponse::from)))
}
