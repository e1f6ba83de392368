//! File service for filehost.
//!
//! This module owns the row/file invariant:
//! - Upload: write the file, then insert the row; a failed insert removes
//!   the file, a stored-name collision renames it and retries
//! - Delete: remove the file, then the row; a failed removal keeps the row
//! - Reconcile: drop files no row points to, report rows without a file

use std::collections::{BTreeSet, HashSet};

use axum::body::Bytes;
use futures::Stream;
use tokio::fs::File;
use tracing::{info, warn};

use super::metadata::{FileRecord, FileRepository, NewFileRecord};
use super::storage::{FileStorage, StoredFile};
use super::{extension_of, sanitize_filename};
use crate::config::FilesConfig;
use crate::db::Database;
use crate::{FilehostError, Result};

/// Attempts made to insert a row before a stored-name collision is fatal.
pub const MAX_INSERT_ATTEMPTS: usize = 3;

/// Which uploads are accepted.
#[derive(Debug, Clone, Default)]
pub struct UploadPolicy {
    /// Lower-cased extensions without the dot. `None` accepts everything.
    allowed_extensions: Option<HashSet<String>>,
}

impl UploadPolicy {
    /// Accept every non-empty filename.
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Accept only the given extensions (case-insensitive, dot optional).
    pub fn with_allowed_extensions<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let allowed = extensions
            .into_iter()
            .map(|e| e.as_ref().trim().trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        Self {
            allowed_extensions: Some(allowed),
        }
    }

    /// Build the policy from the files configuration.
    pub fn from_config(config: &FilesConfig) -> Self {
        match config.allowed_extensions {
            Some(ref exts) => Self::with_allowed_extensions(exts),
            None => Self::allow_all(),
        }
    }

    /// Check a sanitized filename against the policy.
    pub fn is_allowed(&self, filename: &str) -> bool {
        if filename.is_empty() {
            return false;
        }
        match self.allowed_extensions {
            Some(ref allowed) => allowed.contains(&extension_of(filename)),
            None => true,
        }
    }
}

/// Outcome of a successful delete.
#[derive(Debug, Clone)]
pub struct DeletedFile {
    /// The row that was removed.
    pub record: FileRecord,
    /// Whether a backing file was found and removed.
    pub file_removed: bool,
}

/// Result of comparing the upload directory with the table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Files on disk with no row, now deleted.
    pub removed_files: Vec<String>,
    /// Rows whose file is missing on disk.
    pub missing_files: Vec<String>,
}

/// File service coordinating the metadata table and the upload directory.
#[derive(Debug, Clone)]
pub struct FileService {
    db: Database,
    storage: FileStorage,
    policy: UploadPolicy,
}

impl FileService {
    /// Create a new FileService accepting every file type.
    pub fn new(db: Database, storage: FileStorage) -> Self {
        Self {
            db,
            storage,
            policy: UploadPolicy::allow_all(),
        }
    }

    /// Set the upload policy.
    pub fn with_policy(mut self, policy: UploadPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Get the database used by this service.
    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Get the storage used by this service.
    pub fn storage(&self) -> &FileStorage {
        &self.storage
    }

    fn repo(&self) -> FileRepository<'_> {
        FileRepository::new(self.db.pool())
    }

    /// Sanitize a client filename and check it against the policy.
    ///
    /// Returns the sanitized name to record as `original_name`.
    pub fn check_filename(&self, filename: &str) -> Result<String> {
        let sanitized = sanitize_filename(filename);
        if !self.policy.is_allowed(&sanitized) {
            return Err(FilehostError::Validation(format!(
                "File type not allowed: {sanitized}"
            )));
        }
        Ok(sanitized)
    }

    /// Store one uploaded file and record it.
    ///
    /// # Validation
    /// The sanitized filename must be non-empty and pass the extension
    /// allow-list; otherwise nothing is written.
    ///
    /// # Returns
    /// The inserted record.
    pub async fn store_upload<S>(
        &self,
        stream: S,
        filename: &str,
        mime_type: Option<String>,
    ) -> Result<FileRecord>
    where
        S: Stream<Item = Result<Bytes>>,
    {
        let original_name = self.check_filename(filename)?;
        let stored = self.storage.save_stream(stream, &original_name).await?;
        self.record_stored(&original_name, stored, mime_type).await
    }

    /// Insert the row for a file already written to storage.
    ///
    /// A stored-name collision moves the file to a fresh name and retries.
    /// Any other failure removes the file so it cannot be orphaned.
    pub(crate) async fn record_stored(
        &self,
        original_name: &str,
        stored: StoredFile,
        mime_type: Option<String>,
    ) -> Result<FileRecord> {
        let mut stored_name = stored.stored_name;
        let size_bytes = stored.size_bytes as i64;

        let mut attempt = 1;
        loop {
            let new_file = NewFileRecord::new(original_name, stored_name.as_str(), size_bytes)
                .with_mime_type(mime_type.clone());

            match self.repo().insert(&new_file).await {
                Ok(record) => {
                    info!(
                        id = record.id,
                        stored_name = %record.stored_name,
                        size_bytes = record.size_bytes,
                        "Stored upload"
                    );
                    return Ok(record);
                }
                Err(FilehostError::Constraint(msg)) if attempt < MAX_INSERT_ATTEMPTS => {
                    attempt += 1;
                    let fresh = FileStorage::generate_stored_name(original_name);
                    warn!(
                        attempt,
                        stored_name = %stored_name,
                        fresh = %fresh,
                        "Stored name collision ({}), retrying",
                        msg
                    );
                    if let Err(e) = self.storage.rename(&stored_name, &fresh).await {
                        self.discard(&stored_name).await;
                        return Err(e);
                    }
                    stored_name = fresh;
                }
                Err(e) => {
                    self.discard(&stored_name).await;
                    return Err(e);
                }
            }
        }
    }

    async fn discard(&self, stored_name: &str) {
        if let Err(e) = self.storage.remove(stored_name).await {
            warn!(
                stored_name = %stored_name,
                error = %e,
                "Failed to remove file after failed insert"
            );
        }
    }

    /// List files newest first, optionally filtered by name substring.
    pub async fn list(&self, query: Option<&str>) -> Result<Vec<FileRecord>> {
        self.repo().list(query).await
    }

    /// Number of recorded files.
    pub async fn count(&self) -> Result<i64> {
        self.repo().count().await
    }

    /// Get a file record by ID.
    pub async fn get(&self, id: i64) -> Result<FileRecord> {
        self.repo()
            .get_by_id(id)
            .await?
            .ok_or_else(|| FilehostError::NotFound("File".to_string()))
    }

    /// Open a file for download.
    ///
    /// Returns the record, the open file and its current length.
    pub async fn open_download(&self, id: i64) -> Result<(FileRecord, File, u64)> {
        let record = self.get(id).await?;
        let (file, len) = match self.storage.open(&record.stored_name).await {
            Ok(opened) => opened,
            Err(FilehostError::NotFound(_)) => {
                warn!(id, stored_name = %record.stored_name, "Record has no backing file");
                return Err(FilehostError::NotFound("File".to_string()));
            }
            Err(e) => return Err(e),
        };
        Ok((record, file, len))
    }

    /// Delete a file and its record.
    ///
    /// The physical file is removed first. A missing file is tolerated; any
    /// other removal error is returned and the row is kept.
    pub async fn delete(&self, id: i64) -> Result<DeletedFile> {
        let record = self.get(id).await?;

        let file_removed = match self.storage.remove(&record.stored_name).await {
            Ok(removed) => removed,
            Err(e) => {
                warn!(
                    id,
                    stored_name = %record.stored_name,
                    error = %e,
                    "Failed to remove file, keeping record"
                );
                return Err(e);
            }
        };

        if !file_removed {
            warn!(id, stored_name = %record.stored_name, "Backing file was already absent");
        }

        // A concurrent delete may have won the race for the row
        if !self.repo().delete(id).await? {
            return Err(FilehostError::NotFound("File".to_string()));
        }

        info!(id, stored_name = %record.stored_name, "Deleted file");
        Ok(DeletedFile {
            record,
            file_removed,
        })
    }

    /// Compare the upload directory with the table.
    ///
    /// Files without a row are deleted. Rows without a file are only
    /// reported. Meant to run at startup, before requests are served.
    pub async fn reconcile(&self) -> Result<ReconcileReport> {
        let on_disk: BTreeSet<String> = self.storage.stored_names().await?.into_iter().collect();
        let in_table: BTreeSet<String> = self.repo().stored_names().await?.into_iter().collect();

        let mut report = ReconcileReport::default();

        for name in on_disk.difference(&in_table) {
            if self.remove_if_orphaned(name).await? {
                info!(stored_name = %name, "Removed orphaned file");
                report.removed_files.push(name.clone());
            }
        }

        for name in in_table.difference(&on_disk) {
            warn!(stored_name = %name, "Record has no backing file");
            report.missing_files.push(name.clone());
        }

        Ok(report)
    }

    /// Remove a stored file unless a row references it.
    ///
    /// Rows recorded after the reconcile snapshot still keep their file.
    async fn remove_if_orphaned(&self, stored_name: &str) -> Result<bool> {
        if self.repo().get_by_stored_name(stored_name).await?.is_some() {
            return Ok(false);
        }
        self.storage.remove(stored_name).await
    }
}
