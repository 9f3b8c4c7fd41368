use axum::Router;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post, put};
use keystone_core::AppError;
use tower_http::trace::TraceLayer;
use tower_sessions::{SessionManagerLayer, SessionStore};

use crate::state::AppState;
use crate::{auth, handlers, middleware};

mod cors;

pub fn build_router<S>(
    app_state: AppState,
    session_layer: SessionManagerLayer<S>,
) -> Result<Router, AppError>
where
    S: SessionStore + Clone,
{
    let protected_routes = Router::new()
        .route(
            "/api/settings/users",
            get(handlers::settings::list_users_handler)
                .post(handlers::settings::create_user_handler),
        )
        .route(
            "/api/settings/users/{user_id}",
            get(handlers::settings::show_user_handler)
                .put(handlers::settings::update_user_handler)
                .delete(handlers::settings::delete_user_handler),
        )
        .route(
            "/api/settings/users/{user_id}/roles",
            put(handlers::settings::sync_user_roles_handler),
        )
        .route(
            "/api/settings/roles",
            get(handlers::settings::list_roles_handler)
                .post(handlers::settings::create_role_handler),
        )
        .route(
            "/api/settings/roles/{role_id}",
            get(handlers::settings::show_role_handler)
                .put(handlers::settings::update_role_handler)
                .delete(handlers::settings::delete_role_handler),
        )
        .route(
            "/api/settings/roles/{role_id}/permissions",
            put(handlers::settings::sync_role_permissions_handler),
        )
        .route(
            "/api/settings/permissions",
            get(handlers::settings::list_permissions_handler)
                .post(handlers::settings::create_permission_handler),
        )
        .route(
            "/api/settings/permissions/{permission_id}",
            get(handlers::settings::show_permission_handler)
                .put(handlers::settings::update_permission_handler)
                .delete(handlers::settings::delete_permission_handler),
        )
        .route("/auth/me", get(auth::me_handler))
        .layer(from_fn(middleware::require_auth));

    let cors = cors::build_cors_layer(&app_state.frontend_url)?;

    Ok(Router::new()
        .route("/health", get(handlers::health::health_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/logout", post(auth::logout_handler))
        .merge(protected_routes)
        .route_layer(from_fn_with_state(
            app_state.clone(),
            middleware::require_same_origin_for_mutations,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(session_layer)
        .with_state(app_state))
}
