//! Core submission types for surveyledger.
//!
//! This module defines the records the ledger stores: the canonical answer
//! set, the deduplication [`Fingerprint`], committed [`SubmissionRecord`]s and
//! append-only [`DuplicateAttempt`]s.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::survey::ConfigStamp;

/// Longest fingerprint the ledger accepts.
pub const MAX_FINGERPRINT_LEN: usize = 64;

/// Most answers a single submission may carry.
pub const MAX_ANSWERS: usize = 64;

/// Longest answer key.
pub const MAX_ANSWER_KEY_LEN: usize = 64;

/// Longest free-text answer, in characters.
pub const MAX_TEXT_LEN: usize = 5_000;

/// Most entries in a multi-choice answer.
pub const MAX_LIST_LEN: usize = 32;

/// Deduplication key identifying one logical submitter.
///
/// Always trimmed, non-empty and at most [`MAX_FINGERPRINT_LEN`] characters.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Validate and normalise a raw fingerprint.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the trimmed value is empty or too long.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.chars().count() > MAX_FINGERPRINT_LEN {
            return Err(Error::invalid_argument("Invalid fingerprint"));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// The fingerprint as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Fingerprint {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Fingerprint> for String {
    fn from(fingerprint: Fingerprint) -> Self {
        fingerprint.0
    }
}

/// A single answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    /// Free text or a choice id.
    Text(String),
    /// A whole number (age, score).
    Integer(i64),
    /// Multiple choices, in the order they were picked.
    List(Vec<String>),
}

impl From<&str> for AnswerValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for AnswerValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for AnswerValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<Vec<String>> for AnswerValue {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

/// The full answer set of one submission, keyed by question id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Answers(BTreeMap<String, AnswerValue>);

impl Answers {
    /// Create an empty answer set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the answer for `key`, replacing any previous one.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<AnswerValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// Look up one answer.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&AnswerValue> {
        self.0.get(key)
    }

    /// Number of answers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no answers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over answers in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &AnswerValue)> {
        self.0.iter()
    }

    /// Check the answer set against the payload limits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] describing the first violated limit.
    pub fn validate(&self) -> Result<()> {
        if self.0.len() > MAX_ANSWERS {
            return Err(Error::invalid_argument(format!(
                "too many answers ({} > {MAX_ANSWERS})",
                self.0.len()
            )));
        }

        for (key, value) in &self.0 {
            if key.trim().is_empty() || key.chars().count() > MAX_ANSWER_KEY_LEN {
                return Err(Error::invalid_argument("answer key must be 1-64 characters"));
            }
            match value {
                AnswerValue::Text(text) if text.chars().count() > MAX_TEXT_LEN => {
                    return Err(Error::invalid_argument(format!("answer '{key}' is too long")));
                }
                AnswerValue::List(items)
                    if items.len() > MAX_LIST_LEN
                        || items.iter().any(|i| i.chars().count() > MAX_TEXT_LEN) =>
                {
                    return Err(Error::invalid_argument(format!("answer '{key}' has too many entries")));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

impl FromIterator<(String, AnswerValue)> for Answers {
    fn from_iter<I: IntoIterator<Item = (String, AnswerValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A submission that has not been committed yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionDraft {
    /// Deduplication key.
    pub fingerprint: Fingerprint,
    /// Canonical answer set.
    pub fields: Answers,
    /// When the client pressed submit, by the client's clock.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_timestamp: Option<DateTime<Utc>>,
}

impl SubmissionDraft {
    /// Create a draft stamped with the current client time.
    #[must_use]
    pub fn new(fingerprint: Fingerprint, fields: Answers) -> Self {
        Self {
            fingerprint,
            fields,
            client_timestamp: Some(Utc::now()),
        }
    }

    /// Check the draft before any transactional work begins.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the answer set exceeds a limit.
    pub fn validate(&self) -> Result<()> {
        self.fields.validate()
    }
}

/// A committed submission. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRecord {
    /// Deduplication key; unique across the ledger.
    pub fingerprint: Fingerprint,
    /// Canonical answer set.
    pub fields: Answers,
    /// Commit time (server clock), or client time in local mode.
    pub submitted_at: DateTime<Utc>,
    /// The client's own timestamp, when it differs from `submitted_at`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_timestamp: Option<DateTime<Utc>>,
    /// `activeYear` captured at commit time.
    pub active_year: i32,
    /// Configuration `version` captured at commit time.
    pub config_version: i64,
}

impl SubmissionRecord {
    /// Build the record for a draft committed at `submitted_at` under `stamp`.
    #[must_use]
    pub fn from_draft(draft: &SubmissionDraft, submitted_at: DateTime<Utc>, stamp: ConfigStamp) -> Self {
        Self {
            fingerprint: draft.fingerprint.clone(),
            fields: draft.fields.clone(),
            submitted_at,
            client_timestamp: draft.client_timestamp,
            active_year: stamp.active_year,
            config_version: stamp.config_version,
        }
    }

    /// The configuration values this record was stamped with.
    #[must_use]
    pub fn stamp(&self) -> ConfigStamp {
        ConfigStamp {
            active_year: self.active_year,
            config_version: self.config_version,
        }
    }
}

/// A rejected resubmission. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateAttempt {
    /// Assigned by storage.
    pub id: i64,
    /// Fingerprint that already had a committed record.
    pub fingerprint: Fingerprint,
    /// When the resubmission arrived.
    pub attempted_at: DateTime<Utc>,
}
