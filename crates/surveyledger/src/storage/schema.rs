//! `SQLite` schema definitions for surveyledger.
//!
//! This module contains the SQL statements for creating and managing
//! the database schema.

/// SQL statement to create the responses table.
///
/// The fingerprint is the primary key: at most one committed record per
/// submitter, whatever the isolation level of the writer.
pub const CREATE_RESPONSES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS responses (
    fingerprint TEXT PRIMARY KEY NOT NULL,
    fields TEXT NOT NULL,
    submitted_at TEXT NOT NULL,
    client_timestamp TEXT,
    active_year INTEGER NOT NULL,
    config_version INTEGER NOT NULL
)
";

/// Committed responses are immutable.
pub const CREATE_RESPONSES_IMMUTABLE_TRIGGER: &str = r"
CREATE TRIGGER IF NOT EXISTS responses_immutable
BEFORE UPDATE ON responses
BEGIN
    SELECT RAISE(ABORT, 'committed responses are immutable');
END
";

/// SQL statement to create an index on `submitted_at` for recent-first listing.
pub const CREATE_SUBMITTED_AT_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_responses_submitted_at ON responses(submitted_at DESC)
";

/// SQL statement to create the duplicate attempts table.
pub const CREATE_DUPLICATE_ATTEMPTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS duplicate_attempts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    fingerprint TEXT NOT NULL,
    attempted_at TEXT NOT NULL
)
";

/// SQL statement to create an index on the fingerprint of duplicate attempts.
pub const CREATE_DUPLICATE_FINGERPRINT_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_duplicate_attempts_fingerprint ON duplicate_attempts(fingerprint)
";

/// SQL statement to create the single-row survey configuration table.
pub const CREATE_SURVEY_CONFIG_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS survey_config (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    version INTEGER NOT NULL,
    active_year INTEGER NOT NULL,
    document TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    updated_by TEXT NOT NULL
)
";

/// SQL statement to create the admin registry.
pub const CREATE_ADMINS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS admins (
    uid TEXT PRIMARY KEY NOT NULL,
    granted_at TEXT NOT NULL
)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_RESPONSES_TABLE,
    CREATE_RESPONSES_IMMUTABLE_TRIGGER,
    CREATE_SUBMITTED_AT_INDEX,
    CREATE_DUPLICATE_ATTEMPTS_TABLE,
    CREATE_DUPLICATE_FINGERPRINT_INDEX,
    CREATE_SURVEY_CONFIG_TABLE,
    CREATE_ADMINS_TABLE,
    CREATE_METADATA_TABLE,
];
