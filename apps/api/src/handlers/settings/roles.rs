use super::*;

pub async fn list_roles_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<PageResponse<RoleResponse>>> {
    let page = state
        .security_admin_service
        .list_roles(&user, query.into())
        .await?;

    Ok(Json(PageResponse::from_page(page, RoleResponse::from)))
}

pub async fn show_role_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(role_id): Path<i64>,
) -> ApiResult<Json<RoleResponse>> {
    let role = state
        .security_admin_service
        .get_role(&user, role_id)
        .await?;

    Ok(Json(RoleResponse::from(role)))
}

pub async fn create_role_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    ApiJson(payload): ApiJson<RoleRequest>,
) -> ApiResult<(StatusCode, Json<MutationResponse<RoleResponse>>)> {
    let outcome = state
        .security_admin_service
        .create_role(&user, payload.into())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(MutationResponse::from_outcome(outcome, RoleResponse::from)),
    ))
}

pub async fn update_role_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(role_id): Path<i64>,
    ApiJson(payload): ApiJson<RoleRequest>,
) -> ApiResult<Json<MutationResponse<RoleResponse>>> {
    let outcome = state
        .security_admin_service
        .update_role(&user, role_id, payload.into())
        .await?;

    Ok(Json(MutationResponse::from_outcome(outcome, RoleResponse::from)))
}

pub async fn delete_role_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(role_id): Path<i64>,
) -> ApiResult<Json<MutationResponse<()>>> {
    let outcome = state
        .security_admin_service
        .delete_role(&user, role_id)
        .await?;

    Ok(Json(MutationResponse::from_outcome(outcome, |()| ())))
}

pub async fn sync_role_permissions_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(role_id): Path<i64>,
    ApiJson(payload): ApiJson<SyncRolePermissionsRequest>,
) -> ApiResult<Json<MutationResponse<RoleResponse>>> {
    let outcome = state
        .security_admin_service
        .set_role_permissions(&user, role_id, payload.permissions)
        .await?;

    Ok(Json(MutationResponse::from_outcome(outcome, RoleResponse::from)))
}
