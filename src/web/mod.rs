//! HTTP interface of filehost.
//!
//! JSON listing and metadata routes, multipart upload, streamed download and
//! redirect-based delete.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod openapi;
pub mod router;
pub mod server;

pub use error::ApiError;
pub use handlers::AppState;
pub use router::create_router;
pub use server::WebServer;
