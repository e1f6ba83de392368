//! filehost - Minimal file hosting service
//!
//! Upload, list, search, download and delete files over HTTP. Metadata lives
//! in SQLite and content in a flat upload directory.

pub mod config;
pub mod datetime;
pub mod db;
pub mod error;
pub mod file;
pub mod logging;
pub mod web;

pub use config::Config;
pub use db::Database;
pub use error::{FilehostError, Result};
pub use file::{FileRecord, FileService, FileStorage, UploadPolicy};
