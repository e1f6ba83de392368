//! File metadata types and repository for the `files` table.

use chrono::{DateTime, SubsecRound, Utc};

use crate::datetime::{parse_datetime, to_storage};
use crate::db::DbPool;
use crate::Result;

/// Metadata for one stored upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Unique file ID.
    pub id: i64,
    /// Sanitized client filename (display name).
    pub original_name: String,
    /// Name of the file inside the upload directory.
    pub stored_name: String,
    /// File size in bytes.
    pub size_bytes: i64,
    /// Client-declared content type.
    pub mime_type: Option<String>,
    /// When the file was uploaded.
    pub uploaded_at: DateTime<Utc>,
}

/// Data for inserting a new file row.
#[derive(Debug, Clone)]
pub struct NewFileRecord {
    pub original_name: String,
    pub stored_name: String,
    pub size_bytes: i64,
    pub mime_type: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

impl NewFileRecord {
    /// Create a new row stamped with the current time.
    pub fn new(
        original_name: impl Into<String>,
        stored_name: impl Into<String>,
        size_bytes: i64,
    ) -> Self {
        Self {
            original_name: original_name.into(),
            stored_name: stored_name.into(),
            size_bytes,
            mime_type: None,
            uploaded_at: Utc::now().trunc_subsecs(6),
        }
    }

    /// Set the content type.
    pub fn with_mime_type(mut self, mime_type: Option<impl Into<String>>) -> Self {
        self.mime_type = mime_type.map(Into::into);
        self
    }

    /// Override the upload timestamp (stored with microsecond precision).
    pub fn with_uploaded_at(mut self, uploaded_at: DateTime<Utc>) -> Self {
        self.uploaded_at = uploaded_at.trunc_subsecs(6);
        self
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct FileRow {
    id: i64,
    original_name: String,
    stored_name: String,
    size_bytes: i64,
    mime_type: Option<String>,
    uploaded_at: String,
}

impl From<FileRow> for FileRecord {
    fn from(row: FileRow) -> Self {
        FileRecord {
            id: row.id,
            original_name: row.original_name,
            stored_name: row.stored_name,
            size_bytes: row.size_bytes,
            mime_type: row.mime_type,
            uploaded_at: parse_datetime(&row.uploaded_at).unwrap_or_else(Utc::now),
        }
    }
}

/// Escape `LIKE` wildcards so the filter matches literally.
fn escape_like(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Repository for file metadata operations.
pub struct FileRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> FileRepository<'a> {
    /// Create a new FileRepository with the given pool reference.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Insert a new file row.
    ///
    /// Fails with `FilehostError::Constraint` if the stored name is taken.
    pub async fn insert(&self, file: &NewFileRecord) -> Result<FileRecord> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO files (original_name, stored_name, size_bytes, mime_type, uploaded_at)
             VALUES (?, ?, ?, ?, ?)
             RETURNING id",
        )
        .bind(&file.original_name)
        .bind(&file.stored_name)
        .bind(file.size_bytes)
        .bind(&file.mime_type)
        .bind(to_storage(&file.uploaded_at))
        .fetch_one(self.pool)
        .await?;

        Ok(FileRecord {
            id,
            original_name: file.original_name.clone(),
            stored_name: file.stored_name.clone(),
            size_bytes: file.size_bytes,
            mime_type: file.mime_type.clone(),
            uploaded_at: file.uploaded_at,
        })
    }

    /// List files, newest first.
    ///
    /// A non-empty (trimmed) filter restricts the result to rows whose
    /// original name contains it, using SQLite's ASCII case-insensitive LIKE.
    pub async fn list(&self, filter: Option<&str>) -> Result<Vec<FileRecord>> {
        let filter = filter.map(str::trim).filter(|q| !q.is_empty());

        let rows = match filter {
            Some(q) => {
                sqlx::query_as::<_, FileRow>(
                    "SELECT id, original_name, stored_name, size_bytes, mime_type, uploaded_at
                     FROM files WHERE original_name LIKE ? ESCAPE '\\'
                     ORDER BY uploaded_at DESC, id DESC",
                )
                .bind(format!("%{}%", escape_like(q)))
                .fetch_all(self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, FileRow>(
                    "SELECT id, original_name, stored_name, size_bytes, mime_type, uploaded_at
                     FROM files ORDER BY uploaded_at DESC, id DESC",
                )
                .fetch_all(self.pool)
                .await?
            }
        };

        Ok(rows.into_iter().map(FileRecord::from).collect())
    }

    /// Get a file by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<FileRecord>> {
        let row = sqlx::query_as::<_, FileRow>(
            "SELECT id, original_name, stored_name, size_bytes, mime_type, uploaded_at
             FROM files WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(FileRecord::from))
    }

    /// Get a file by stored name.
    pub async fn get_by_stored_name(&self, stored_name: &str) -> Result<Option<FileRecord>> {
        let row = sqlx::query_as::<_, FileRow>(
            "SELECT id, original_name, stored_name, size_bytes, mime_type, uploaded_at
             FROM files WHERE stored_name = ?",
        )
        .bind(stored_name)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(FileRecord::from))
    }

    /// Delete a file row by ID. Returns `false` if no row matched.
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM files WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Count all rows.
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM files")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    /// All stored names currently referenced by a row.
    pub async fn stored_names(&self) -> Result<Vec<String>> {
        let names: Vec<String> =
            sqlx::query_scalar("SELECT stored_name FROM files ORDER BY stored_name")
                .fetch_all(self.pool)
                .await?;
        Ok(names)
    }
}
