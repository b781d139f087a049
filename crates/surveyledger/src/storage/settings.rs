//! The versioned survey configuration document.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde_json::Value;
use tracing::{info, warn};

use super::{admins, format_timestamp, Storage};
use crate::error::{Error, Result};
use crate::principal::{self, Principal};
use crate::survey::{next_version, sanitize_update, Correction, SurveyConfig};

/// Result of an accepted configuration update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigCommit {
    /// The version now live.
    pub version: i64,
    /// The document as stored.
    pub config: SurveyConfig,
    /// Fields that fell back to their prior value.
    pub corrections: Vec<Correction>,
}

/// Read the live configuration through `conn`.
///
/// Falls back to the built-in default (version 1) when nothing has been
/// written yet. The `version` and `active_year` columns win over whatever
/// the stored document says.
pub(super) fn load_config(conn: &Connection) -> Result<SurveyConfig> {
    let row: Option<(i64, i32, String)> = conn
        .query_row(
            "SELECT version, active_year, document FROM survey_config WHERE id = 1",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()?;

    let Some((version, active_year, document)) = row else {
        return Ok(SurveyConfig::default());
    };

    let document = serde_json::from_str::<Value>(&document).unwrap_or_else(|err| {
        warn!(error = %err, "Stored configuration is not valid JSON, using defaults");
        Value::Null
    });

    let mut config = SurveyConfig::recover(&document);
    config.version = version;
    config.active_year = active_year;
    Ok(config)
}

impl Storage {
    /// Get the live survey configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_config(&self) -> Result<SurveyConfig> {
        load_config(&self.conn)
    }

    /// Apply an admin's update to the live configuration.
    ///
    /// The membership check, the read of the prior document, the version bump
    /// and the write share one immediate transaction, so concurrent updates
    /// always produce distinct, strictly increasing versions. An explicit
    /// `version` in the update is honoured only when it is ahead of the stored
    /// one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthenticated`] without a caller,
    /// [`Error::InvalidArgument`] if `update` is not an object, and
    /// [`Error::PermissionDenied`] if the caller is not an admin.
    pub fn set_config(
        &mut self,
        update: &Value,
        caller: Option<&Principal>,
    ) -> Result<ConfigCommit> {
        let caller = principal::require(caller)?;
        if !update.is_object() {
            return Err(Error::invalid_argument(
                "configuration update must be an object",
            ));
        }

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        if !admins::is_member(&tx, caller.uid())? {
            warn!(uid = %caller, "Rejected configuration update from non-admin");
            return Err(Error::permission_denied(caller.uid()));
        }

        let prior = load_config(&tx)?;
        let sanitized = sanitize_update(&prior, update)?;

        let version = next_version(prior.version, sanitized.requested_version)?;
        let mut config = sanitized.config;
        config.version = version;

        tx.execute(
            r"
            INSERT INTO survey_config (id, version, active_year, document, updated_at, updated_by)
            VALUES (1, ?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id) DO UPDATE SET
                version = excluded.version,
                active_year = excluded.active_year,
                document = excluded.document,
                updated_at = excluded.updated_at,
                updated_by = excluded.updated_by
            ",
            params![
                version,
                config.active_year,
                serde_json::to_string(&config)?,
                format_timestamp(Utc::now()),
                caller.uid(),
            ],
        )?;
        tx.commit()?;

        info!(
            uid = %caller,
            version,
            active_year = config.active_year,
            corrections = sanitized.corrections.len(),
            "Survey configuration updated"
        );

        Ok(ConfigCommit {
            version,
            config,
            corrections: sanitized.corrections,
        })
    }
}
