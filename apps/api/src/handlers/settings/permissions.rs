use super::*;

pub async fn list_permissions_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<PageResponse<PermissionResponse>>> {
    let page = state
        .security_admin_service
        .list_permissions(&user, query.into())
        .await?;

    Ok(Json(PageResponse::from_page(page, PermissionResponse::from)))
}

pub async fn show_permission_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(permission_id): Path<i64>,
) -> ApiResult<Json<PermissionResponse>> {
    let permission = state
        .security_admin_service
        .get_permission(&user, permission_id)
        .await?;

    Ok(Json(PermissionResponse::from(permission)))
}

pub async fn create_permission_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    ApiJson(payload): ApiJson<PermissionRequest>,
) -> ApiResult<(StatusCode, Json<MutationResponse<PermissionResponse>>)> {
    let outcome = state
        .security_admin_service
        .create_permission(&user, payload.into())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(MutationResponse::from_outcome(
            outcome,
            PermissionResponse::from,
        )),
    ))
}

pub async fn update_permission_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(permission_id): Path<i64>,
    ApiJson(payload): ApiJson<PermissionRequest>,
) -> ApiResult<Json<MutationResponse<PermissionResponse>>> {
    let outcome = state
        .security_admin_service
        .update_permission(&user, permission_id, payload.into())
        .await?;

    Ok(Json(MutationResponse::from_outcome(
        outcome,
        PermissionResponse::from,
    )))
}

pub async fn delete_permission_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(permission_id): Path<i64>,
) -> ApiResult<Json<MutationResponse<()>>> {
    let outcome = state
        .security_admin_service
        .delete_permission(&user, permission_id)
        .await?;

    Ok(Json(MutationResponse::from_outcome(outcome, |()| ())))
}
