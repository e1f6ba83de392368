//! Response DTOs for the HTTP API.

use serde::Serialize;
use utoipa::ToSchema;

use crate::datetime::to_rfc3339;
use crate::file::FileRecord;

/// Generic API response wrapper.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    /// Response data.
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a new API response.
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// File metadata response.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FileResponse {
    /// File ID.
    pub id: i64,
    /// Sanitized name supplied by the uploader.
    pub original_name: String,
    /// Name of the file on disk.
    pub stored_name: String,
    /// Size in bytes.
    pub size_bytes: i64,
    /// Content type declared by the client.
    pub mime_type: Option<String>,
    /// Upload time (RFC 3339).
    pub uploaded_at: String,
    /// Where the content can be fetched.
    pub download_url: String,
}

impl From<FileRecord> for FileResponse {
    fn from(file: FileRecord) -> Self {
        Self {
            download_url: format!("/files/{}/download", file.id),
            uploaded_at: to_rfc3339(&file.uploaded_at),
            id: file.id,
            original_name: file.original_name,
            stored_name: file.stored_name,
            size_bytes: file.size_bytes,
            mime_type: file.mime_type,
        }
    }
}

/// Severity of a flash message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FlashLevel {
    Success,
    Warning,
    Error,
    Info,
}

impl FlashLevel {
    /// Query-string form of the level.
    pub fn as_str(&self) -> &'static str {
        match self {
            FlashLevel::Success => "success",
            FlashLevel::Warning => "warning",
            FlashLevel::Error => "error",
            FlashLevel::Info => "info",
        }
    }

    /// Parse a query-string level. Unknown values read as `Info`.
    pub fn from_param(s: &str) -> Self {
        match s {
            "success" => FlashLevel::Success,
            "warning" => FlashLevel::Warning,
            "error" => FlashLevel::Error,
            _ => FlashLevel::Info,
        }
    }
}

/// One-shot status message carried through a redirect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Flash {
    pub level: FlashLevel,
    pub message: String,
}

/// Listing/search response.
#[derive(Debug, Serialize, ToSchema)]
pub struct FileListResponse {
    /// Matching files, newest first.
    pub files: Vec<FileResponse>,
    /// The search query as received (empty when listing everything).
    pub q: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flash: Option<Flash>,
}

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn record() -> FileRecord {
        FileRecord {
            id: 7,
            original_name: "a.txt".to_string(),
            stored_name: "0123abcd_a.txt".to_string(),
            size_bytes: 5,
            mime_type: Some("text/plain".to_string()),
            uploaded_at: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
        }
    }

    #[test]
    fn test_file_response_from_record() {
        let response = FileResponse::from(record());
        assert_eq!(response.id, 7);
        assert_eq!(response.original_name, "a.txt");
        assert_eq!(response.download_url, "/files/7/download");
        assert_eq!(response.uploaded_at, "2024-01-02T03:04:05Z");
    }

    #[test]
    fn test_flash_level_roundtrip_names() {
        for level in [FlashLevel::Success, FlashLevel::Warning, FlashLevel::Error] {
            assert_eq!(FlashLevel::from_param(level.as_str()), level);
        }
        assert_eq!(FlashLevel::from_param("bogus"), FlashLevel::Info);
    }

    #[test]
    fn test_list_response_omits_empty_flash() {
        let response = ApiResponse::new(FileListResponse {
            files: vec![],
            q: String::new(),
            flash: None,
        });
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["data"]["q"], "");
        assert!(json["data"].get("flash").is_none());
    }

    #[test]
    fn test_flash_serializes_lowercase_level() {
        let flash = Flash {
            level: FlashLevel::Warning,
            message: "No files uploaded.".to_string(),
        };
        let json = serde_json::to_value(&flash).unwrap();
        assert_eq!(json["level"], "warning");
    }
}
