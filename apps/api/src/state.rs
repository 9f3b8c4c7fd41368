use keystone_application::{SecurityAdminService, UserService};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub security_admin_service: SecurityAdminService,
    pub user_service: UserService,
    pub frontend_url: String,
}
