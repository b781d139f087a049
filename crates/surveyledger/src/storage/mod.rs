//! Storage layer for surveyledger.
//!
//! This module provides `SQLite`-based persistent storage for the submission
//! ledger, the survey configuration document and the admin registry.
//!
//! Every mutating operation runs inside an immediate (write-locking)
//! transaction, so concurrent handlers each holding their own connection are
//! serialized by `SQLite` itself. No in-process locks are involved.

mod admins;
mod ledger;
pub mod migrations;
pub mod schema;
mod settings;

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{types::Type, Connection};
use tracing::debug;

use crate::error::{Error, Result};

pub use admins::AdminGrant;
pub use ledger::Acceptance;
pub use settings::ConfigCommit;

/// How long a connection waits for another writer before giving up.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Storage engine for the survey ledger.
#[derive(Debug)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

impl Storage {
    /// Open or create a storage database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    /// Initializes the schema if this is a new database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    /// Open or create a storage database, waiting up to `busy_timeout` for
    /// competing writers.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open_with_timeout(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        // Must be set before anything else touches the file.
        conn.busy_timeout(busy_timeout)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        migrations::initialize_schema(&conn)?;

        debug!("Database opened at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Create an in-memory storage instance for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get ledger statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<LedgerStats> {
        let total_responses = self.count_responses()?;
        let duplicate_attempts = self.count_duplicate_attempts()?;
        let config = self.get_config()?;

        let (oldest, newest): (Option<String>, Option<String>) = self
            .conn
            .query_row(
                "SELECT MIN(submitted_at), MAX(submitted_at) FROM responses",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;

        let oldest_response = oldest.as_deref().and_then(|s| parse_timestamp(s).ok());
        let newest_response = newest.as_deref().and_then(|s| parse_timestamp(s).ok());

        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(LedgerStats {
            total_responses,
            duplicate_attempts,
            config_version: config.version,
            active_year: config.active_year,
            oldest_response,
            newest_response,
            db_size_bytes,
        })
    }
}

/// Statistics about the ledger.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct LedgerStats {
    /// Committed submissions.
    pub total_responses: i64,
    /// Rejected resubmissions recorded.
    pub duplicate_attempts: i64,
    /// Live configuration version.
    pub config_version: i64,
    /// Live `activeYear`.
    pub active_year: i32,
    /// Timestamp of the oldest committed submission.
    pub oldest_response: Option<DateTime<Utc>>,
    /// Timestamp of the newest committed submission.
    pub newest_response: Option<DateTime<Utc>>,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}

pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

pub(crate) fn parse_timestamp(s: &str) -> std::result::Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc))
}

/// Wrap a column decoding failure so it surfaces as a query error.
pub(crate) fn conversion_error(
    column: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(err))
}
