mod auth;
mod common;
mod settings;

pub use auth::{CurrentUserResponse, LoginRequest};
pub use common::{HealthResponse, MutationResponse, PageQuery, PageResponse};
pub use settings::{
    PermissionRefResponse, PermissionRequest, PermissionResponse, RoleRefResponse, RoleRequest,
    RoleResponse, SyncRolePermissionsRequest, SyncUserRolesRequest, UserRequest, UserResponse,
};
