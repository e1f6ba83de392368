//! File storage for filehost.
//!
//! Physical files live flat in the upload directory:
//! ```text
//! {base_path}/
//! ├── 3f2a9c...e1_report.pdf
//! ├── 8b01d4...7c_a.txt
//! └── ...
//! ```
//! Each stored name is `<uuid simple>_<sanitized original name>`, and files
//! are written once with create-new semantics.

use std::io;
use std::path::{Path, PathBuf};

use axum::body::Bytes;
use futures::{Stream, StreamExt};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use super::sanitize_filename;
use crate::{FilehostError, Result};

/// Fallback name component when the client filename sanitizes to nothing.
const FALLBACK_NAME: &str = "upload.bin";

/// Result of writing a file to storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Name of the file inside the upload directory.
    pub stored_name: String,
    /// Number of bytes written.
    pub size_bytes: u64,
}

/// File storage service for managing physical files.
#[derive(Debug, Clone)]
pub struct FileStorage {
    /// Upload directory.
    base_path: PathBuf,
}

impl FileStorage {
    /// Create a new FileStorage rooted at the given directory.
    ///
    /// The directory will be created if it doesn't exist.
    pub fn new(base_path: impl Into<PathBuf>) -> Result<Self> {
        let base_path = base_path.into();
        std::fs::create_dir_all(&base_path)?;

        Ok(Self { base_path })
    }

    /// Get the upload directory of this storage.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Generate a new stored name for a client filename.
    pub fn generate_stored_name(desired_name: &str) -> String {
        let sanitized = sanitize_filename(desired_name);
        let name = if sanitized.is_empty() {
            FALLBACK_NAME
        } else {
            sanitized.as_str()
        };
        format!("{}_{}", Uuid::new_v4().simple(), name)
    }

    /// Write a byte stream to a freshly named file.
    ///
    /// The file is created with create-new semantics, so an existing file is
    /// never overwritten. If the stream or a write fails, the partial file is
    /// removed before the error is returned.
    pub async fn save_stream<S>(&self, stream: S, desired_name: &str) -> Result<StoredFile>
    where
        S: Stream<Item = Result<Bytes>>,
    {
        let stored_name = Self::generate_stored_name(desired_name);
        let path = self.file_path(&stored_name)?;

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;

        match Self::write_stream(&mut file, stream).await {
            Ok(size_bytes) => Ok(StoredFile {
                stored_name,
                size_bytes,
            }),
            Err(e) => {
                drop(file);
                if let Err(remove_err) = fs::remove_file(&path).await {
                    tracing::warn!(
                        stored_name = %stored_name,
                        error = %remove_err,
                        "Failed to remove partial upload"
                    );
                }
                Err(e)
            }
        }
    }

    async fn write_stream<S>(file: &mut File, stream: S) -> Result<u64>
    where
        S: Stream<Item = Result<Bytes>>,
    {
        let mut stream = std::pin::pin!(stream);
        let mut size_bytes: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            size_bytes += chunk.len() as u64;
        }

        file.flush().await?;
        Ok(size_bytes)
    }

    /// Save an in-memory buffer under a freshly generated name.
    pub async fn save(&self, content: &[u8], desired_name: &str) -> Result<StoredFile> {
        let chunk = Bytes::copy_from_slice(content);
        self.save_stream(futures::stream::iter([Ok(chunk)]), desired_name)
            .await
    }

    /// Open a stored file for streaming, returning it with its length.
    pub async fn open(&self, stored_name: &str) -> Result<(File, u64)> {
        let path = self.file_path(stored_name)?;

        let file = File::open(&path)
            .await
            .map_err(|e| not_found_or_io(e, stored_name))?;
        let len = file.metadata().await?.len();

        Ok((file, len))
    }

    /// Load the full content of a stored file.
    pub async fn load(&self, stored_name: &str) -> Result<Vec<u8>> {
        let path = self.file_path(stored_name)?;

        fs::read(&path)
            .await
            .map_err(|e| not_found_or_io(e, stored_name))
    }

    /// Remove a file from storage.
    ///
    /// Returns `true` if the file was deleted, `false` if it didn't exist.
    /// Any other OS error (e.g. permission denied) is returned.
    pub async fn remove(&self, stored_name: &str) -> Result<bool> {
        let path = self.file_path(stored_name)?;

        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Move a stored file to a new stored name without clobbering.
    ///
    /// Fails if `to` already exists.
    pub async fn rename(&self, from: &str, to: &str) -> Result<()> {
        let from_path = self.file_path(from)?;
        let to_path = self.file_path(to)?;

        fs::hard_link(&from_path, &to_path)
            .await
            .map_err(|e| not_found_or_io(e, from))?;
        fs::remove_file(&from_path).await?;

        Ok(())
    }

    /// Check if a file exists in storage.
    pub async fn exists(&self, stored_name: &str) -> bool {
        match self.file_path(stored_name) {
            Ok(path) => fs::try_exists(&path).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Get the size of a stored file.
    pub async fn file_size(&self, stored_name: &str) -> Result<u64> {
        let path = self.file_path(stored_name)?;

        let metadata = fs::metadata(&path)
            .await
            .map_err(|e| not_found_or_io(e, stored_name))?;
        Ok(metadata.len())
    }

    /// List the names of all regular files in the upload directory.
    pub async fn stored_names(&self) -> Result<Vec<String>> {
        let mut entries = fs::read_dir(&self.base_path).await?;
        let mut names = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Ok(name) = entry.file_name().into_string() {
                names.push(name);
            }
        }

        names.sort();
        Ok(names)
    }

    /// Get the full path for a stored name.
    ///
    /// Rejects anything that is not a single plain path component, so a
    /// tampered row can never point outside the upload directory.
    pub fn file_path(&self, stored_name: &str) -> Result<PathBuf> {
        let invalid = stored_name.is_empty()
            || stored_name == "."
            || stored_name == ".."
            || stored_name.contains(['/', '\\', '\0']);

        if invalid {
            return Err(FilehostError::Validation(format!(
                "invalid stored name: {stored_name:?}"
            )));
        }

        Ok(self.base_path.join(stored_name))
    }
}

fn not_found_or_io(e: io::Error, stored_name: &str) -> FilehostError {
    if e.kind() == io::ErrorKind::NotFound {
        FilehostError::NotFound(format!("File {stored_name}"))
    } else {
        e.into()
    }
}
