use axum::http::header::{ACCEPT, CONTENT_TYPE};
use axum::http::{HeaderValue, Method};
use keystone_core::AppError;
use tower_http::cors::CorsLayer;

/// Methods served by the settings and auth routes.
const ALLOWED_METHODS: [Method; 5] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::OPTIONS,
];

/// Credentialed CORS for the single admin frontend origin.
pub(super) fn build_cors_layer(frontend_url: &str) -> Result<CorsLayer, AppError> {
    let origin = HeaderValue::from_str(frontend_url).map_err(|error| {
        AppError::Internal(format!("FRONTEND_URL is not a valid origin header: {error}"))
    })?;

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods(ALLOWED_METHODS)
        .allow_headers([ACCEPT, CONTENT_TYPE]))
}
