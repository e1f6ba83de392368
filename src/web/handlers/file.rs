//! File handlers.

use axum::{
    body::Body,
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart, Path, Query, State,
    },
    http::{header, HeaderValue, StatusCode},
    response::{Redirect, Response},
    Json,
};
use futures::TryStreamExt;
use std::sync::Arc;
use tokio_util::io::ReaderStream;

use crate::web::dto::{
    ApiResponse, FileListResponse, FileResponse, Flash, FlashLevel, IndexQuery,
};
use crate::file::sanitize_filename;
use crate::web::error::ApiError;
use crate::web::handlers::AppState;
use crate::FilehostError;

/// Name of the multipart field carrying files.
const FILE_FIELD: &str = "file";

/// Generate a safe Content-Disposition header value for file downloads.
///
/// Control characters are removed, quotes and backslashes are replaced in the
/// plain `filename` parameter, and an RFC 5987 `filename*` parameter carries
/// the exact name whenever it is not plain ASCII.
fn content_disposition_header(filename: &str) -> String {
    let sanitized: String = filename
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| match c {
            '"' | '\\' => '_',
            _ => c,
        })
        .collect();

    if filename.is_ascii() && !filename.chars().any(|c| c.is_control() || c == '"' || c == '\\') {
        return format!("attachment; filename=\"{}\"", filename);
    }

    let encoded = urlencoding::encode(filename);
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        sanitized, encoded
    )
}

/// Listing URL carrying a flash message.
fn flash_location(message: &str, level: FlashLevel) -> String {
    format!(
        "/?status={}&level={}",
        urlencoding::encode(message),
        level.as_str()
    )
}

fn flash_redirect(message: &str, level: FlashLevel) -> Redirect {
    Redirect::to(&flash_location(message, level))
}

/// Summarize an upload batch as a flash message.
///
/// Rejections and storage failures follow the count, in that order. Any
/// storage failure raises the level to error.
fn upload_summary(saved: usize, rejected: &[String], failed: &[String]) -> (String, FlashLevel) {
    let (mut message, mut level) = if saved > 0 {
        (
            format!("Uploaded {} file(s) successfully.", saved),
            FlashLevel::Success,
        )
    } else {
        ("No files uploaded.".to_string(), FlashLevel::Warning)
    };

    for reason in rejected.iter().chain(failed) {
        message.push(' ');
        message.push_str(reason);
    }
    if !failed.is_empty() {
        level = FlashLevel::Error;
    }

    (message, level)
}

/// Parse a path id. Anything that is not an integer is an unknown file.
fn parse_file_id(raw: &str) -> Result<i64, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::not_found("File not found"))
}

fn multipart_error(e: MultipartError, limit: u64) -> FilehostError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        FilehostError::PayloadTooLarge { limit }
    } else {
        FilehostError::Upload(e.body_text())
    }
}

/// GET / - List or search files.
#[utoipa::path(
    get,
    path = "/",
    tag = "files",
    params(
        ("q" = Option<String>, Query, description = "Substring of the original name"),
        ("status" = Option<String>, Query, description = "Flash message set by a redirect"),
        ("level" = Option<String>, Query, description = "Flash level: success, warning or error")
    ),
    responses(
        (status = 200, description = "Matching files, newest first", body = FileListResponse)
    )
)]
pub async fn index(
    State(state): State<Arc<AppState>>,
    Query(query): Query<IndexQuery>,
) -> Result<Json<ApiResponse<FileListResponse>>, ApiError> {
    let IndexQuery { q, status, level } = query;
    let q = q.unwrap_or_default().trim().to_string();

    let files = state.service.list(Some(q.as_str())).await?;

    let flash = status.filter(|s| !s.is_empty()).map(|message| Flash {
        level: FlashLevel::from_param(level.as_deref().unwrap_or_default()),
        message,
    });

    Ok(Json(ApiResponse::new(FileListResponse {
        files: files.into_iter().map(FileResponse::from).collect(),
        q,
        flash,
    })))
}

/// POST /upload - Upload one or more files.
///
/// Request body: multipart/form-data with one or more "file" parts.
/// Answers with a redirect to the listing carrying the outcome.
#[utoipa::path(
    post,
    path = "/upload",
    tag = "files",
    responses(
        (status = 303, description = "Redirect to the listing with a status message"),
        (status = 400, description = "Malformed multipart body", body = crate::web::error::ErrorBody),
        (status = 413, description = "Request body exceeds the upload limit", body = crate::web::error::ErrorBody)
    )
)]
pub async fn upload(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Redirect, ApiError> {
    let mut multipart = match multipart {
        Ok(multipart) => multipart,
        Err(rejection) => {
            tracing::debug!("Upload without a multipart body: {}", rejection);
            return Ok(flash_redirect("No file part in the request", FlashLevel::Error));
        }
    };

    let limit = state.max_upload_size;
    let mut saw_file_part = false;
    let mut saved = 0usize;
    let mut rejected = Vec::new();
    let mut failed = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        saw_file_part = true;

        let filename = match field.file_name() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => continue,
        };
        let mime_type = field.content_type().map(str::to_string);
        let stream = field.map_err(move |e| multipart_error(e, limit));

        match state
            .service
            .store_upload(stream, &filename, mime_type)
            .await
        {
            Ok(_) => saved += 1,
            Err(FilehostError::Validation(reason)) => {
                tracing::info!("Rejected upload {:?}: {}", filename, reason);
                rejected.push(reason);
            }
            // The request body itself is unusable, so the rest of the batch is lost
            Err(e @ (FilehostError::PayloadTooLarge { .. } | FilehostError::Upload(_))) => {
                return Err(e.into())
            }
            Err(e) => {
                tracing::error!("Failed to save upload {:?}: {}", filename, e);
                failed.push(format!(
                    "Error saving {}: {}",
                    sanitize_filename(&filename),
                    e
                ));
            }
        }
    }

    if !saw_file_part {
        return Ok(flash_redirect("No file part in the request", FlashLevel::Error));
    }

    let (message, level) = upload_summary(saved, &rejected, &failed);
    tracing::info!(
        saved,
        rejected = rejected.len(),
        failed = failed.len(),
        "Upload request processed"
    );
    Ok(flash_redirect(&message, level))
}

/// GET /files/:id - Get file metadata.
#[utoipa::path(
    get,
    path = "/files/{id}",
    tag = "files",
    params(
        ("id" = i64, Path, description = "File ID")
    ),
    responses(
        (status = 200, description = "File metadata", body = FileResponse),
        (status = 404, description = "File not found", body = crate::web::error::ErrorBody)
    )
)]
pub async fn file_details(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<FileResponse>>, ApiError> {
    let id = parse_file_id(&id)?;
    let file = state.service.get(id).await?;
    Ok(Json(ApiResponse::new(FileResponse::from(file))))
}

/// GET /files/:id/download - Download a file.
#[utoipa::path(
    get,
    path = "/files/{id}/download",
    tag = "files",
    params(
        ("id" = i64, Path, description = "File ID")
    ),
    responses(
        (status = 200, description = "File content", content_type = "application/octet-stream"),
        (status = 404, description = "File not found", body = crate::web::error::ErrorBody)
    )
)]
pub async fn download_file(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response<Body>, ApiError> {
    let id = parse_file_id(&id)?;
    let (file, handle, len) = state.service.open_download(id).await?;

    // The recorded type is client-supplied, so it must still be a valid header
    let content_type = file
        .mime_type
        .as_deref()
        .filter(|m| !m.is_empty() && HeaderValue::from_str(m).is_ok())
        .map(str::to_string)
        .unwrap_or_else(|| {
            mime_guess::from_path(&file.original_name)
                .first_or_octet_stream()
                .to_string()
        });

    let response = Response::builder()
        .header(header::CONTENT_TYPE, content_type)
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition_header(&file.original_name),
        )
        .header(header::CONTENT_LENGTH, len)
        .body(Body::from_stream(ReaderStream::new(handle)))
        .map_err(|e| {
            tracing::error!("Failed to build response: {}", e);
            ApiError::internal("Failed to build response")
        })?;

    Ok(response)
}

/// POST /files/:id/delete - Delete a file.
///
/// Always answers with a redirect to the listing carrying the outcome.
#[utoipa::path(
    post,
    path = "/files/{id}/delete",
    tag = "files",
    params(
        ("id" = i64, Path, description = "File ID")
    ),
    responses(
        (status = 303, description = "Redirect to the listing with a status message")
    )
)]
pub async fn delete_file(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Redirect {
    let outcome = match id.parse::<i64>() {
        Ok(id) => state.service.delete(id).await,
        Err(_) => Err(FilehostError::NotFound("File".to_string())),
    };

    match outcome {
        Ok(deleted) => flash_redirect(
            &format!("Deleted {}.", deleted.record.original_name),
            FlashLevel::Success,
        ),
        Err(FilehostError::NotFound(_)) => flash_redirect("File not found.", FlashLevel::Error),
        Err(e) => {
            tracing::error!("Failed to delete file {}: {}", id, e);
            flash_redirect(&format!("Error deleting file: {}", e), FlashLevel::Error)
        }
    }
}
