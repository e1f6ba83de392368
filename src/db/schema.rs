//! Database schema and migrations for filehost.
//!
//! Migrations are applied in order when the database is opened; the
//! schema_version table records which ones have run.

/// Database migrations.
pub const MIGRATIONS: &[&str] = &[
    // v1: files table
    r#"
-- One row per stored upload; stored_name is the on-disk filename
CREATE TABLE files (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    original_name   TEXT NOT NULL,
    stored_name     TEXT NOT NULL UNIQUE,
    size_bytes      INTEGER NOT NULL,
    mime_type       TEXT,
    uploaded_at     TEXT NOT NULL
);
"#,
    // v2: listing is ordered by upload time
    r#"
CREATE INDEX idx_files_uploaded_at ON files(uploaded_at);
"#,
];
