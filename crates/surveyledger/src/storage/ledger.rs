//! The submission ledger.
//!
//! A fingerprint is committed at most once. The existence check, the
//! configuration read used for stamping and the insert all happen inside one
//! immediate transaction, so two handlers racing on the same fingerprint are
//! serialized by the database: the second one sees the first one's row and
//! reports a duplicate.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tracing::{debug, info, warn};

use super::{conversion_error, format_timestamp, parse_timestamp, settings, Storage};
use crate::error::Result;
use crate::submission::{DuplicateAttempt, Fingerprint, SubmissionDraft, SubmissionRecord};
use crate::survey::ConfigStamp;

/// Outcome of offering a submission to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acceptance {
    /// A new record was written, stamped with these configuration values.
    Committed(ConfigStamp),
    /// A record with the same fingerprint already existed. Nothing was written
    /// to the responses table.
    Duplicate,
}

impl Acceptance {
    /// Whether the submission was rejected as a resubmission.
    #[must_use]
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate)
    }
}

const SELECT_RESPONSE: &str = r"
    SELECT fingerprint, fields, submitted_at, client_timestamp, active_year, config_version
    FROM responses
";

impl Storage {
    /// Commit a submission unless its fingerprint is already in the ledger.
    ///
    /// The draft is validated before any transactional work begins. A rejected
    /// resubmission is appended to the duplicate-attempt log on a best-effort
    /// basis: failing to record it never changes the outcome.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidArgument`] for a malformed draft, or a
    /// database error if the transaction cannot be completed. In the error case
    /// nothing was committed.
    pub fn accept_submission(&mut self, draft: &SubmissionDraft) -> Result<Acceptance> {
        draft.validate()?;
        let fields = serde_json::to_string(&draft.fields)?;

        let mut tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let now = Utc::now();

        if response_exists(&tx, &draft.fingerprint)? {
            let appended = tx.savepoint().and_then(|sp| {
                sp.execute(
                    "INSERT INTO duplicate_attempts (fingerprint, attempted_at) VALUES (?1, ?2)",
                    params![draft.fingerprint.as_str(), format_timestamp(now)],
                )?;
                sp.commit()
            });
            if let Err(err) = appended {
                warn!(fingerprint = %draft.fingerprint, error = %err, "Failed to record duplicate attempt");
            }
            if let Err(err) = tx.commit() {
                warn!(fingerprint = %draft.fingerprint, error = %err, "Failed to commit duplicate attempt");
            }

            info!(fingerprint = %draft.fingerprint, "Rejected duplicate submission");
            return Ok(Acceptance::Duplicate);
        }

        let stamp = settings::load_config(&tx)?.stamp();
        let record = SubmissionRecord::from_draft(draft, now, stamp);

        tx.execute(
            r"
            INSERT INTO responses
                (fingerprint, fields, submitted_at, client_timestamp, active_year, config_version)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
            params![
                record.fingerprint.as_str(),
                fields,
                format_timestamp(record.submitted_at),
                record.client_timestamp.map(format_timestamp),
                record.active_year,
                record.config_version,
            ],
        )?;
        tx.commit()?;

        info!(
            fingerprint = %record.fingerprint,
            active_year = stamp.active_year,
            config_version = stamp.config_version,
            "Committed submission"
        );
        Ok(Acceptance::Committed(stamp))
    }

    /// Get the committed record for a fingerprint.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_response(&self, fingerprint: &Fingerprint) -> Result<Option<SubmissionRecord>> {
        let record = self
            .conn
            .query_row(
                &format!("{SELECT_RESPONSE} WHERE fingerprint = ?1"),
                [fingerprint.as_str()],
                row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    /// Get the most recently committed records, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn recent_responses(&self, limit: usize) -> Result<Vec<SubmissionRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{SELECT_RESPONSE} ORDER BY submitted_at DESC LIMIT ?1"))?;

        let limit_i64 = i64::try_from(limit).unwrap_or(i64::MAX);
        let records = stmt
            .query_map([limit_i64], row_to_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(records)
    }

    /// Count committed records.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count_responses(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM responses", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Get recorded duplicate attempts, newest first, optionally for one
    /// fingerprint only.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn duplicate_attempts(
        &self,
        fingerprint: Option<&Fingerprint>,
        limit: usize,
    ) -> Result<Vec<DuplicateAttempt>> {
        let limit_i64 = i64::try_from(limit).unwrap_or(i64::MAX);

        let attempts = match fingerprint {
            Some(fingerprint) => {
                let mut stmt = self.conn.prepare(
                    r"
                    SELECT id, fingerprint, attempted_at FROM duplicate_attempts
                    WHERE fingerprint = ?1 ORDER BY id DESC LIMIT ?2
                    ",
                )?;
                let rows = stmt
                    .query_map(params![fingerprint.as_str(), limit_i64], row_to_attempt)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                rows
            }
            None => {
                let mut stmt = self.conn.prepare(
                    "SELECT id, fingerprint, attempted_at FROM duplicate_attempts ORDER BY id DESC LIMIT ?1",
                )?;
                let rows = stmt
                    .query_map([limit_i64], row_to_attempt)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                rows
            }
        };

        Ok(attempts)
    }

    /// Count recorded duplicate attempts.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count_duplicate_attempts(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM duplicate_attempts", [], |row| {
                row.get(0)
            })?;
        Ok(count)
    }
}

fn response_exists(conn: &Connection, fingerprint: &Fingerprint) -> Result<bool> {
    let found: Option<i32> = conn
        .query_row(
            "SELECT 1 FROM responses WHERE fingerprint = ?1",
            [fingerprint.as_str()],
            |row| row.get(0),
        )
        .optional()?;
    debug!(fingerprint = %fingerprint, exists = found.is_some(), "Checked ledger");
    Ok(found.is_some())
}

fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<SubmissionRecord> {
    let fingerprint: String = row.get(0)?;
    let fields: String = row.get(1)?;
    let submitted_at: String = row.get(2)?;
    let client_timestamp: Option<String> = row.get(3)?;

    Ok(SubmissionRecord {
        fingerprint: Fingerprint::try_from(fingerprint).map_err(|e| conversion_error(0, e))?,
        fields: serde_json::from_str(&fields).map_err(|e| conversion_error(1, e))?,
        submitted_at: parse_timestamp(&submitted_at).map_err(|e| conversion_error(2, e))?,
        client_timestamp: client_timestamp
            .as_deref()
            .map(parse_timestamp)
            .transpose()
            .map_err(|e| conversion_error(3, e))?,
        active_year: row.get(4)?,
        config_version: row.get(5)?,
    })
}

fn row_to_attempt(row: &rusqlite::Row) -> rusqlite::Result<DuplicateAttempt> {
    let fingerprint: String = row.get(1)?;
    let attempted_at: String = row.get(2)?;

    Ok(DuplicateAttempt {
        id: row.get(0)?,
        fingerprint: Fingerprint::try_from(fingerprint).map_err(|e| conversion_error(1, e))?,
        attempted_at: parse_timestamp(&attempted_at).map_err(|e| conversion_error(2, e))?,
    })
}
