use keystone_application::UserRecord;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Username/password login payload.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/login-request.ts"
)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Signed-in user with role names resolved at request time.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/current-user-response.ts"
)]
pub struct CurrentUserResponse {
    #[ts(type = "number")]
    pub id: i64,
    pub username: String,
    pub name: String,
    pub email: String,
    pub roles: Vec<String>,
}

impl From<UserRecord> for CurrentUserResponse {
    fn from(value: UserRecord) -> Self {
        Self {
            id: value.user_id.get(),
            username: value.username,
            name: value.name,
            email: value.email,
            roles: value.roles.into_iter().map(|role| role.name).collect(),
        }
    }
}
