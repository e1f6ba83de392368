//! Router configuration.

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use super::handlers::{delete_file, download_file, file_details, healthz, index, upload, AppState};
use super::openapi::openapi_json;

/// Create the application router.
///
/// Request bodies larger than `AppState::max_upload_size` are rejected with 413.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let body_limit = usize::try_from(app_state.max_upload_size).unwrap_or(usize::MAX);

    let file_routes = Router::new()
        .route("/", get(index))
        .route("/upload", post(upload))
        .route("/files/:id", get(file_details))
        .route("/files/:id/download", get(download_file))
        .route("/files/:id/delete", post(delete_file))
        .layer(DefaultBodyLimit::max(body_limit));

    Router::new()
        .merge(file_routes)
        .merge(create_health_router())
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(app_state)
}

/// Create the health check and API documentation router.
pub fn create_health_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api-docs/openapi.json", get(openapi_json))
}
