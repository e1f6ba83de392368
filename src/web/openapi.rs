//! OpenAPI document for the HTTP API.

use axum::Json;
use utoipa::OpenApi;

use super::dto::{FileListResponse, FileResponse, Flash, FlashLevel, HealthResponse};
use super::error::{ErrorBody, ErrorCode, ErrorDetail};
use super::handlers;

#[derive(OpenApi)]
#[openapi(
    info(title = "filehost", description = "Minimal file hosting service"),
    paths(
        handlers::file::index,
        handlers::file::upload,
        handlers::file::file_details,
        handlers::file::download_file,
        handlers::file::delete_file,
        handlers::health::healthz,
    ),
    components(schemas(
        FileResponse,
        FileListResponse,
        Flash,
        FlashLevel,
        HealthResponse,
        ErrorBody,
        ErrorDetail,
        ErrorCode,
    )),
    tags(
        (name = "files", description = "Upload, list, download and delete files"),
        (name = "health", description = "Liveness check")
    )
)]
pub struct ApiDoc;

/// GET /api-docs/openapi.json - The OpenAPI document.
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
