use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;

use keystone_core::UserIdentity;

use crate::dto::{
    MutationResponse, PageQuery, PageResponse, PermissionRequest, PermissionResponse,
    RoleRequest, RoleResponse, SyncRolePermissionsRequest, SyncUserRolesRequest, UserRequest,
    UserResponse,
};
use crate::error::ApiResult;
use crate::extract::ApiJson;
use crate::state::AppState;

mod permissions;
mod roles;
mod users;


pub use permissions::{
    create_permission_handler, delete_permission_handler, list_permissions_handler,
    show_permission_handler, update_permission_handler,
};
pub use roles::{
    create_role_handler, delete_role_handler, list_roles_handler, show_role_handler,
    sync_role_permissions_handler, update_role_handler,
};
pub use users::{
    create_user_handler, delete_user_handler, list_users_handler, show_user_handler,
    sync_user_roles_handler, update_user_handler,
};
