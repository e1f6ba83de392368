//! Web API File Tests
//!
//! Integration tests for the listing, upload, download, details and delete
//! endpoints.

use axum::http::{header, StatusCode};
use axum_test::multipart::{MultipartForm, Part};
use axum_test::{TestResponse, TestServer};
use filehost::file::{FileService, FileStorage, UploadPolicy};
use filehost::web::handlers::AppState;
use filehost::web::router::create_router;
use filehost::Database;
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;

const TEST_UPLOAD_LIMIT: u64 = 64 * 1024;

/// Create a test server with an in-memory database and a temporary upload directory.
async fn create_test_server_with(
    policy: UploadPolicy,
    max_upload_size: u64,
) -> (TestServer, FileService, TempDir) {
    let db = Database::open_in_memory()
        .await
        .expect("Failed to create test database");
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let storage = FileStorage::new(temp_dir.path()).expect("Failed to create storage");

    let service = FileService::new(db, storage).with_policy(policy);
    let app_state = Arc::new(AppState::new(service.clone(), max_upload_size));

    let server = TestServer::new(create_router(app_state)).expect("Failed to create test server");

    (server, service, temp_dir)
}

async fn create_test_server() -> (TestServer, FileService, TempDir) {
    create_test_server_with(UploadPolicy::allow_all(), TEST_UPLOAD_LIMIT).await
}

fn file_part(name: &str, content: &[u8]) -> Part {
    Part::bytes(content.to_vec())
        .file_name(name)
        .mime_type("text/plain")
}

/// Upload files in one request and return the response.
async fn upload(server: &TestServer, files: &[(&str, &str)]) -> TestResponse {
    let mut form = MultipartForm::new();
    for (name, content) in files {
        form = form.add_part("file", file_part(name, content.as_bytes()));
    }
    server.post("/upload").multipart(form).await
}

/// Decode the flash message of a redirect to the listing.
fn flash_of(response: &TestResponse) -> (String, String) {
    response.assert_status(StatusCode::SEE_OTHER);

    let location = response.header(header::LOCATION);
    let location = location.to_str().unwrap();
    let query = location.strip_prefix("/?status=").unwrap();
    let (status, level) = query.split_once("&level=").unwrap();

    (
        urlencoding::decode(status).unwrap().into_owned(),
        level.to_string(),
    )
}

async fn list(server: &TestServer, query: &str) -> Value {
    let response = server.get(&format!("/{query}")).await;
    response.assert_status_ok();
    response.json::<Value>()
}

// ============================================================================
// Listing & Health
// ============================================================================

#[tokio::test]
async fn test_healthz() {
    let (server, _service, _dir) = create_test_server().await;

    let response = server.get("/healthz").await;

    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["status"], "ok");
}

#[tokio::test]
async fn test_list_empty() {
    let (server, _service, _dir) = create_test_server().await;

    let body = list(&server, "").await;

    assert_eq!(body["data"]["files"], Value::Array(vec![]));
    assert_eq!(body["data"]["q"], "");
    assert!(body["data"].get("flash").is_none());
}

#[tokio::test]
async fn test_list_echoes_flash() {
    let (server, _service, _dir) = create_test_server().await;

    let body = list(&server, "?status=Deleted%20a.txt.&level=success").await;

    assert_eq!(body["data"]["flash"]["message"], "Deleted a.txt.");
    assert_eq!(body["data"]["flash"]["level"], "success");
}

#[tokio::test]
async fn test_openapi_document() {
    let (server, _service, _dir) = create_test_server().await;

    let response = server.get("/api-docs/openapi.json").await;

    response.assert_status_ok();
    let doc = response.json::<Value>();
    assert!(doc["paths"]["/upload"]["post"].is_object());
    assert!(doc["paths"]["/files/{id}/download"]["get"].is_object());
}

// ============================================================================
// Upload
// ============================================================================

#[tokio::test]
async fn test_upload_then_list() {
    let (server, service, _dir) = create_test_server().await;

    let response = upload(&server, &[("a.txt", "hello")]).await;
    assert_eq!(
        flash_of(&response),
        (
            "Uploaded 1 file(s) successfully.".to_string(),
            "success".to_string()
        )
    );

    let body = list(&server, "").await;
    let files = body["data"]["files"].as_array().unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0]["original_name"], "a.txt");
    assert_eq!(files[0]["size_bytes"], 5);
    assert_eq!(files[0]["mime_type"], "text/plain");

    // The backing file exists with the recorded size
    let stored_name = files[0]["stored_name"].as_str().unwrap();
    assert_eq!(service.storage().file_size(stored_name).await.unwrap(), 5);
}

#[tokio::test]
async fn test_upload_multiple_files() {
    let (server, _service, _dir) = create_test_server().await;

    let response = upload(&server, &[("one.txt", "1"), ("two.txt", "22")]).await;

    assert_eq!(flash_of(&response).0, "Uploaded 2 file(s) successfully.");
    let body = list(&server, "").await;
    assert_eq!(body["data"]["files"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_upload_same_name_twice_keeps_both() {
    let (server, service, _dir) = create_test_server().await;

    upload(&server, &[("dup.txt", "first")]).await;
    upload(&server, &[("dup.txt", "second")]).await;

    let records = service.list(None).await.unwrap();
    assert_eq!(records.len(), 2);
    assert_ne!(records[0].stored_name, records[1].stored_name);
    assert_eq!(
        service.storage().load(&records[0].stored_name).await.unwrap(),
        b"second"
    );
    assert_eq!(
        service.storage().load(&records[1].stored_name).await.unwrap(),
        b"first"
    );
}

#[tokio::test]
async fn test_upload_rejects_disallowed_extension_but_keeps_others() {
    let (server, service, _dir) = create_test_server_with(
        UploadPolicy::with_allowed_extensions(["txt", "pdf"]),
        TEST_UPLOAD_LIMIT,
    )
    .await;

    let response = upload(&server, &[("ok.txt", "fine"), ("tool.exe", "MZ")]).await;

    let (message, level) = flash_of(&response);
    assert_eq!(
        message,
        "Uploaded 1 file(s) successfully. File type not allowed: tool.exe"
    );
    assert_eq!(level, "success");

    let records = service.list(None).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].original_name, "ok.txt");
    assert_eq!(service.storage().stored_names().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_upload_only_rejected_files() {
    let (server, _service, _dir) = create_test_server_with(
        UploadPolicy::with_allowed_extensions(["txt"]),
        TEST_UPLOAD_LIMIT,
    )
    .await;

    let response = upload(&server, &[("tool.exe", "MZ")]).await;

    assert_eq!(
        flash_of(&response),
        (
            "No files uploaded. File type not allowed: tool.exe".to_string(),
            "warning".to_string()
        )
    );
}

#[tokio::test]
async fn test_upload_long_name_keeps_allowed_extension() {
    let (server, service, _dir) = create_test_server_with(
        UploadPolicy::with_allowed_extensions(["txt"]),
        TEST_UPLOAD_LIMIT,
    )
    .await;
    let long = format!("{}.txt", "a".repeat(220));

    let response = upload(&server, &[(long.as_str(), "long")]).await;

    assert_eq!(
        flash_of(&response),
        (
            "Uploaded 1 file(s) successfully.".to_string(),
            "success".to_string()
        )
    );
    let records = service.list(None).await.unwrap();
    assert_eq!(records.len(), 1);
    assert!(records[0].original_name.ends_with("a.txt"));
    assert!(records[0].original_name.len() <= 200);
    assert!(records[0]
        .stored_name
        .ends_with(&format!("_{}", records[0].original_name)));
}

/// Storage failures are reported per file and do not abort the batch.
#[cfg(unix)]
#[tokio::test]
async fn test_upload_storage_failure_is_reported_in_flash() {
    use std::os::unix::fs::PermissionsExt;

    let (server, service, dir) = create_test_server_with(
        UploadPolicy::with_allowed_extensions(["txt"]),
        TEST_UPLOAD_LIMIT,
    )
    .await;

    std::fs::set_permissions(dir.path(), std::fs::Permissions::from_mode(0o555)).unwrap();
    let response = upload(
        &server,
        &[("a.txt", "one"), ("tool.exe", "MZ"), ("b.txt", "two")],
    )
    .await;
    std::fs::set_permissions(dir.path(), std::fs::Permissions::from_mode(0o755)).unwrap();

    let (message, level) = flash_of(&response);
    // Running as root bypasses directory permissions
    if message.starts_with("Uploaded 2 file(s)") {
        return;
    }

    assert_eq!(level, "error");
    assert!(message.starts_with("No files uploaded. File type not allowed: tool.exe Error saving a.txt: "));
    assert!(message.contains(" Error saving b.txt: "));
    assert!(service.list(None).await.unwrap().is_empty());
    assert!(service.storage().stored_names().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_upload_without_file_part() {
    let (server, _service, _dir) = create_test_server().await;

    let form = MultipartForm::new().add_text("description", "no file here");
    let response = server.post("/upload").multipart(form).await;

    assert_eq!(
        flash_of(&response),
        (
            "No file part in the request".to_string(),
            "error".to_string()
        )
    );
}

#[tokio::test]
async fn test_upload_not_multipart() {
    let (server, _service, _dir) = create_test_server().await;

    let response = server.post("/upload").text("plain body").await;

    assert_eq!(flash_of(&response).0, "No file part in the request");
}

#[tokio::test]
async fn test_upload_part_without_filename_is_skipped() {
    let (server, service, _dir) = create_test_server().await;

    let form = MultipartForm::new().add_part("file", Part::bytes(b"anonymous".to_vec()));
    let response = server.post("/upload").multipart(form).await;

    assert_eq!(
        flash_of(&response),
        ("No files uploaded.".to_string(), "warning".to_string())
    );
    assert!(service.list(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_upload_sanitizes_path_components() {
    let (server, service, dir) = create_test_server().await;

    upload(&server, &[("../../outside.txt", "x")]).await;

    let records = service.list(None).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].original_name, "outside.txt");
    assert!(dir.path().join(&records[0].stored_name).exists());
    assert!(!dir.path().parent().unwrap().join("outside.txt").exists());
}

#[tokio::test]
async fn test_upload_payload_too_large() {
    let (server, service, _dir) = create_test_server_with(UploadPolicy::allow_all(), 1024).await;

    let big = vec![b'x'; 8 * 1024];
    let form = MultipartForm::new().add_part("file", file_part("big.bin", &big));
    let response = server.post("/upload").multipart(form).await;

    response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(response.json::<Value>()["error"]["code"], "PAYLOAD_TOO_LARGE");
    assert!(service.list(None).await.unwrap().is_empty());
    assert!(service.storage().stored_names().await.unwrap().is_empty());
}

// ============================================================================
// Search
// ============================================================================

#[tokio::test]
async fn test_search() {
    let (server, _service, _dir) = create_test_server().await;

    upload(&server, &[("report.pdf", "%PDF"), ("notes.txt", "n")]).await;

    let body = list(&server, "?q=report").await;
    let files = body["data"]["files"].as_array().unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0]["original_name"], "report.pdf");
    assert_eq!(body["data"]["q"], "report");

    let body = list(&server, "?q=REPORT").await;
    assert_eq!(body["data"]["files"].as_array().unwrap().len(), 1);

    let body = list(&server, "?q=zzz").await;
    assert!(body["data"]["files"].as_array().unwrap().is_empty());

    // Blank queries list everything
    let body = list(&server, "?q=%20%20").await;
    assert_eq!(body["data"]["files"].as_array().unwrap().len(), 2);
    assert_eq!(body["data"]["q"], "");
}

// ============================================================================
// Download & Details
// ============================================================================

#[tokio::test]
async fn test_download_file() {
    let (server, service, _dir) = create_test_server().await;
    upload(&server, &[("a.txt", "hello world")]).await;
    let id = service.list(None).await.unwrap()[0].id;

    let response = server.get(&format!("/files/{id}/download")).await;

    response.assert_status_ok();
    assert_eq!(response.as_bytes().as_ref(), b"hello world");
    assert_eq!(response.header(header::CONTENT_TYPE), "text/plain");
    assert_eq!(
        response.header(header::CONTENT_DISPOSITION),
        "attachment; filename=\"a.txt\""
    );
}

#[tokio::test]
async fn test_download_guesses_content_type() {
    let (server, service, _dir) = create_test_server().await;

    let form = MultipartForm::new().add_part(
        "file",
        Part::bytes(b"<html></html>".to_vec()).file_name("page.html"),
    );
    server.post("/upload").multipart(form).await;
    let record = service.list(None).await.unwrap().remove(0);

    let response = server.get(&format!("/files/{}/download", record.id)).await;

    response.assert_status_ok();
    let content_type = response.header(header::CONTENT_TYPE);
    let expected = record.mime_type.as_deref().unwrap_or("text/html");
    assert_eq!(content_type, expected);
}

#[tokio::test]
async fn test_download_not_found() {
    let (server, _service, _dir) = create_test_server().await;

    server
        .get("/files/99999/download")
        .await
        .assert_status(StatusCode::NOT_FOUND);
    server
        .get("/files/abc/download")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_download_missing_backing_file() {
    let (server, service, _dir) = create_test_server().await;
    upload(&server, &[("a.txt", "x")]).await;
    let record = service.list(None).await.unwrap().remove(0);
    service.storage().remove(&record.stored_name).await.unwrap();

    let response = server.get(&format!("/files/{}/download", record.id)).await;

    response.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(response.json::<Value>()["error"]["message"], "File not found");
}

#[tokio::test]
async fn test_file_details() {
    let (server, service, _dir) = create_test_server().await;
    upload(&server, &[("a.txt", "hello")]).await;
    let id = service.list(None).await.unwrap()[0].id;

    let response = server.get(&format!("/files/{id}")).await;

    response.assert_status_ok();
    let body = response.json::<Value>();
    assert_eq!(body["data"]["id"], id);
    assert_eq!(body["data"]["original_name"], "a.txt");
    assert_eq!(body["data"]["size_bytes"], 5);
    assert_eq!(
        body["data"]["download_url"],
        format!("/files/{id}/download")
    );
}

#[tokio::test]
async fn test_file_details_not_found() {
    let (server, _service, _dir) = create_test_server().await;

    let response = server.get("/files/99999").await;

    response.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(response.json::<Value>()["error"]["code"], "NOT_FOUND");
    server
        .get("/files/not-a-number")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

// ============================================================================
// Delete
// ============================================================================

#[tokio::test]
async fn test_delete_file() {
    let (server, service, _dir) = create_test_server().await;
    upload(&server, &[("a.txt", "x")]).await;
    let record = service.list(None).await.unwrap().remove(0);

    let response = server.post(&format!("/files/{}/delete", record.id)).await;

    assert_eq!(
        flash_of(&response),
        ("Deleted a.txt.".to_string(), "success".to_string())
    );
    assert!(service.list(None).await.unwrap().is_empty());
    assert!(!service.storage().exists(&record.stored_name).await);

    // Deleting again reports not found
    let response = server.post(&format!("/files/{}/delete", record.id)).await;
    assert_eq!(
        flash_of(&response),
        ("File not found.".to_string(), "error".to_string())
    );
}

#[tokio::test]
async fn test_delete_unknown_and_invalid_id() {
    let (server, _service, _dir) = create_test_server().await;

    let response = server.post("/files/99999/delete").await;
    assert_eq!(flash_of(&response).0, "File not found.");

    let response = server.post("/files/abc/delete").await;
    assert_eq!(flash_of(&response).0, "File not found.");
}

#[tokio::test]
async fn test_delete_then_download_is_not_found() {
    let (server, service, _dir) = create_test_server().await;
    upload(&server, &[("a.txt", "x")]).await;
    let id = service.list(None).await.unwrap()[0].id;

    server.post(&format!("/files/{id}/delete")).await;

    server
        .get(&format!("/files/{id}/download"))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}
