//! Request DTOs for the HTTP API.

use serde::Deserialize;

/// Query string of the listing page.
///
/// `status` and `level` are set by the redirects that follow an upload or a
/// delete and are echoed back as a flash message.
#[derive(Debug, Default, Deserialize)]
pub struct IndexQuery {
    /// Substring of the original name to search for.
    #[serde(default)]
    pub q: Option<String>,
    /// Flash message text.
    #[serde(default)]
    pub status: Option<String>,
    /// Flash message level (`success`, `warning`, `error`).
    #[serde(default)]
    pub level: Option<String>,
}
