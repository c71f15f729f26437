//! Database layer for media-dl
//!
//! Handles SQLite persistence for the download history.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`] - Database lifecycle, schema migrations
//! - [`history`] - History management

use crate::types::{FormatChoice, HistoryEntry, JobId};
use sqlx::{FromRow, sqlite::SqlitePool};

mod history;
mod migrations;

/// New history entry to be inserted into the database
#[derive(Debug, Clone)]
pub struct NewHistoryEntry {
    /// Job that produced the file
    pub job_id: JobId,
    /// Source URL
    pub url: String,
    /// Media title
    pub title: String,
    /// Output file name
    pub filename: String,
    /// Requested format
    pub format: FormatChoice,
    /// Unix timestamp when the job completed
    pub completed_at: i64,
}

/// History record from database (raw from SQLite)
#[derive(Debug, Clone, FromRow)]
pub struct HistoryRow {
    /// Unique database ID
    pub id: i64,
    /// Job ID as text
    pub job_id: String,
    /// Source URL
    pub url: String,
    /// Media title
    pub title: String,
    /// Output file name
    pub filename: String,
    /// Format label
    pub format: String,
    /// Unix timestamp when the job completed
    pub completed_at: i64,
}

impl From<HistoryRow> for HistoryEntry {
    fn from(row: HistoryRow) -> Self {
        use chrono::{TimeZone, Utc};

        HistoryEntry {
            id: row.id,
            job_id: row.job_id.parse().unwrap_or_else(|e| {
                tracing::warn!(row_id = row.id, error = %e, "history row has malformed job id");
                JobId(uuid::Uuid::nil())
            }),
            url: row.url,
            title: row.title,
            filename: row.filename,
            format: FormatChoice::from_label(&row.format),
            completed_at: Utc
                .timestamp_opt(row.completed_at, 0)
                .single()
                .unwrap_or_else(Utc::now),
        }
    }
}

/// Database handle for media-dl
pub struct Database {
    pool: SqlitePool,
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
