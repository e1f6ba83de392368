//! File management module for filehost.
//!
//! This module ties the metadata table to the upload directory:
//! - `FileStorage` writes, streams and removes physical files
//! - `FileRepository` owns the `files` table
//! - `FileService` keeps rows and files created and destroyed together

mod metadata;
mod service;
mod storage;

pub use metadata::{FileRecord, FileRepository, NewFileRecord};
pub use service::{DeletedFile, FileService, ReconcileReport, UploadPolicy, MAX_INSERT_ATTEMPTS};
pub use storage::{FileStorage, StoredFile};

/// Maximum length of a sanitized filename (in characters).
pub const MAX_FILENAME_LENGTH: usize = 200;

/// Reduce a client-supplied filename to a safe single path component.
///
/// Directory components (both `/` and `\` separated) are dropped, whitespace
/// becomes `_`, and anything outside `[A-Za-z0-9._-]` is removed. Leading and
/// trailing dots and underscores are stripped, so `..` and hidden-file names
/// cannot survive. Names over `MAX_FILENAME_LENGTH` lose the end of their
/// stem, never their extension. The result may be empty.
pub fn sanitize_filename(filename: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    let cleaned: String = base
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();

    let trimmed = trim_edges(&cleaned);
    if trimmed.len() <= MAX_FILENAME_LENGTH {
        return trimmed.to_string();
    }

    // Only ASCII survives the filter above, so byte offsets are char offsets
    match trimmed.rsplit_once('.') {
        Some((stem, ext)) if ext.len() < MAX_FILENAME_LENGTH / 2 => {
            let stem = trim_edges(&stem[..MAX_FILENAME_LENGTH - ext.len() - 1]);
            format!("{stem}.{ext}")
        }
        _ => trim_edges(&trimmed[..MAX_FILENAME_LENGTH]).to_string(),
    }
}

fn trim_edges(name: &str) -> &str {
    name.trim_matches(|c| c == '.' || c == '_')
}

/// Lower-cased extension of a filename, or an empty string if it has none.
pub fn extension_of(filename: &str) -> String {
    match filename.rsplit_once('.') {
        Some((_, ext)) => ext.to_lowercase(),
        None => String::new(),
    }
}
