//! The admin registry.
//!
//! Only uids listed here may change the survey configuration.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use tracing::info;

use super::{conversion_error, format_timestamp, parse_timestamp, Storage};
use crate::error::{Error, Result};

/// A uid allowed to edit the survey configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminGrant {
    /// The admin's uid.
    pub uid: String,
    /// When the uid was added.
    pub granted_at: DateTime<Utc>,
}

pub(super) fn is_member(conn: &Connection, uid: &str) -> Result<bool> {
    let found: Option<i32> = conn
        .query_row("SELECT 1 FROM admins WHERE uid = ?1", [uid], |row| row.get(0))
        .optional()?;
    Ok(found.is_some())
}

fn normalize_uid(uid: &str) -> Result<&str> {
    let uid = uid.trim();
    if uid.is_empty() {
        return Err(Error::invalid_argument("uid must not be empty"));
    }
    Ok(uid)
}

impl Storage {
    /// Add a uid to the admin registry.
    ///
    /// Returns `false` if the uid was already an admin.
    ///
    /// # Errors
    ///
    /// Returns an error if the uid is blank or the database operation fails.
    pub fn grant_admin(&self, uid: &str) -> Result<bool> {
        let uid = normalize_uid(uid)?;
        let affected = self.conn.execute(
            "INSERT OR IGNORE INTO admins (uid, granted_at) VALUES (?1, ?2)",
            (uid, format_timestamp(Utc::now())),
        )?;
        if affected > 0 {
            info!(uid, "Granted admin");
        }
        Ok(affected > 0)
    }

    /// Remove a uid from the admin registry.
    ///
    /// Returns `false` if the uid was not an admin.
    ///
    /// # Errors
    ///
    /// Returns an error if the uid is blank or the database operation fails.
    pub fn revoke_admin(&self, uid: &str) -> Result<bool> {
        let uid = normalize_uid(uid)?;
        let affected = self.conn.execute("DELETE FROM admins WHERE uid = ?1", [uid])?;
        if affected > 0 {
            info!(uid, "Revoked admin");
        }
        Ok(affected > 0)
    }

    /// Check whether a uid is in the admin registry.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn is_admin(&self, uid: &str) -> Result<bool> {
        is_member(&self.conn, uid.trim())
    }

    /// List all admins, oldest grant first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_admins(&self) -> Result<Vec<AdminGrant>> {
        let mut stmt = self
            .conn
            .prepare("SELECT uid, granted_at FROM admins ORDER BY granted_at, uid")?;
        let admins = stmt
            .query_map([], |row| {
                let granted_at: String = row.get(1)?;
                Ok(AdminGrant {
                    uid: row.get(0)?,
                    granted_at: parse_timestamp(&granted_at).map_err(|e| conversion_error(1, e))?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(admins)
    }
}
