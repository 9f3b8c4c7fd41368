use keystone_application::{
    PermissionInput, PermissionRecord, PermissionSummary, RoleInput, RoleRecord, RoleSummary,
    UserInput, UserRecord,
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Create or update payload for a user.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/user-request.ts"
)]
pub struct UserRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    #[ts(optional)]
    pub password: Option<String>,
    #[serde(default)]
    #[ts(optional)]
    pub password_confirmation: Option<String>,
    /// Omitted keeps the current roles on update.
    #[serde(default)]
    #[ts(optional, as = "Option<Vec<i32>>")]
    pub roles: Option<Vec<i64>>,
}

impl From<UserRequest> for UserInput {
    fn from(value: UserRequest) -> Self {
        Self {
            name: value.name,
            username: value.username,
            email: value.email,
            password: value.password,
            password_confirmation: value.password_confirmation,
            roles: value.roles,
        }
    }
}

#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/sync-user-roles-request.ts"
)]
pub struct SyncUserRolesRequest {
    #[ts(as = "Vec<i32>")]
    pub roles: Vec<i64>,
}

/// Create or update payload for a role.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/role-request.ts"
)]
pub struct RoleRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    #[ts(optional, as = "Option<Vec<i32>>")]
    pub permissions: Option<Vec<i64>>,
}

impl From<RoleRequest> for RoleInput {
    fn from(value: RoleRequest) -> Self {
        Self {
            name: value.name,
            permissions: value.permissions,
        }
    }
}

#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/sync-role-permissions-request.ts"
)]
pub struct SyncRolePermissionsRequest {
    #[ts(as = "Vec<i32>")]
    pub permissions: Vec<i64>,
}

#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/permission-request.ts"
)]
pub struct PermissionRequest {
    #[serde(default)]
    pub name: String,
}

impl From<PermissionRequest> for PermissionInput {
    fn from(value: PermissionRequest) -> Self {
        Self { name: value.name }
    }
}

/// Role reference embedded in user responses.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/role-ref-response.ts"
)]
pub struct RoleRefResponse {
    #[ts(type = "number")]
    pub id: i64,
    pub name: String,
}

impl From<RoleSummary> for RoleRefResponse {
    fn from(value: RoleSummary) -> Self {
        Self {
            id: value.role_id.get(),
            name: value.name,
        }
    }
}

/// Permission reference embedded in role responses.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/permission-ref-response.ts"
)]
pub struct PermissionRefResponse {
    #[ts(type = "number")]
    pub id: i64,
    pub name: String,
}

impl From<PermissionSummary> for PermissionRefResponse {
    fn from(value: PermissionSummary) -> Self {
        Self {
            id: value.permission_id.get(),
            name: value.name,
        }
    }
}

/// API representation of a user account.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/user-response.ts"
)]
pub struct UserResponse {
    #[ts(type = "number")]
    pub id: i64,
    pub name: String,
    pub username: String,
    pub email: String,
    pub is_bootstrap: bool,
    pub roles: Vec<RoleRefResponse>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<UserRecord> for UserResponse {
    fn from(value: UserRecord) -> Self {
        Self {
            id: value.user_id.get(),
            name: value.name,
            username: value.username,
            email: value.email,
            is_bootstrap: value.is_bootstrap,
            roles: value.roles.into_iter().map(RoleRefResponse::from).collect(),
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

/// API representation of a role and its permissions.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/role-response.ts"
)]
pub struct RoleResponse {
    #[ts(type = "number")]
    pub id: i64,
    pub name: String,
    pub guard_name: String,
    /// True when the role grants no permission.
    pub is_inert: bool,
    pub permissions: Vec<PermissionRefResponse>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<RoleRecord> for RoleResponse {
    fn from(value: RoleRecord) -> Self {
        Self {
            is_inert: value.is_inert(),
            id: value.role_id.get(),
            name: value.name,
            guard_name: value.guard_name.to_string(),
            permissions: value
                .permissions
                .into_iter()
                .map(PermissionRefResponse::from)
                .collect(),
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

/// API representation of a permission.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/permission-response.ts"
)]
pub struct PermissionResponse {
    #[ts(type = "number")]
    pub id: i64,
    pub name: String,
    pub guard_name: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<PermissionRecord> for PermissionResponse {
    fn from(value: PermissionRecord) -> Self {
        Self {
            id: value.permission_id.get(),
            name: value.name,
            guard_name: value.guard_name.to_string(),
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}
