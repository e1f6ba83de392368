//! HTTP handlers.

pub mod file;
pub mod health;

pub use file::*;
pub use health::*;

use crate::file::FileService;

/// Application state shared across handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// File service owning the database pool and the upload directory.
    pub service: FileService,
    /// Maximum request body size in bytes.
    pub max_upload_size: u64,
}

impl AppState {
    /// Create a new application state.
    pub fn new(service: FileService, max_upload_size: u64) -> Self {
        Self {
            service,
            max_upload_size,
        }
    }
}
