use axum::Json;

use crate::dto::HealthResponse;

/// Liveness only; the policy store is not consulted.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    })
}
