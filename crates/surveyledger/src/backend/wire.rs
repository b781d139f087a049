//! JSON request and reply bodies of the callables.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::submission::{Answers, Fingerprint, SubmissionDraft};

/// Body of a `submitSurvey` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    /// Raw deduplication key, validated by [`SubmitRequest::into_draft`].
    #[serde(default)]
    pub dedupe_key: String,
    /// Canonical answer set.
    #[serde(default)]
    pub fields: Answers,
    /// Client-side submit time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
}

impl SubmitRequest {
    /// Parse an untrusted callable payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the payload does not have the
    /// expected shape.
    pub fn from_value(data: Value) -> Result<Self> {
        serde_json::from_value(data)
            .map_err(|err| Error::invalid_argument(format!("malformed submission: {err}")))
    }

    /// Build the request for a draft.
    #[must_use]
    pub fn from_draft(draft: &SubmissionDraft) -> Self {
        Self {
            dedupe_key: draft.fingerprint.as_str().to_string(),
            fields: draft.fields.clone(),
            submitted_at: draft.client_timestamp,
        }
    }

    /// Validate the key and turn the request into a ledger draft.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the key is empty or too long, or
    /// if the answers exceed a payload limit.
    pub fn into_draft(self) -> Result<SubmissionDraft> {
        let fingerprint = Fingerprint::parse(&self.dedupe_key)
            .map_err(|_| Error::invalid_argument("Invalid dedupeKey"))?;
        let draft = SubmissionDraft {
            fingerprint,
            fields: self.fields,
            client_timestamp: self.submitted_at,
        };
        draft.validate()?;
        Ok(draft)
    }
}

/// Reply of a `submitSurvey` call: `{success: true}` or `{duplicate: true}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SubmitReply {
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    success: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    duplicate: bool,
}

impl SubmitReply {
    /// A new record was committed.
    #[must_use]
    pub fn committed() -> Self {
        Self {
            success: true,
            duplicate: false,
        }
    }

    /// The fingerprint was already in the ledger.
    #[must_use]
    pub fn duplicate() -> Self {
        Self {
            success: false,
            duplicate: true,
        }
    }

    /// Whether this reply reports a duplicate.
    #[must_use]
    pub fn is_duplicate(&self) -> bool {
        self.duplicate
    }

    /// Whether this reply reports a commit.
    #[must_use]
    pub fn is_committed(&self) -> bool {
        self.success && !self.duplicate
    }
}

/// Reply of a `setSurveyConfig` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetConfigReply {
    /// Always `true`; failures are reported as errors.
    pub success: bool,
    /// The version now live.
    pub version: i64,
}

/// Reply of an `isAdmin` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminReply {
    /// Whether the caller may change the survey configuration.
    pub is_admin: bool,
}

/// Error body returned to a remote caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallableError {
    /// Wire code, e.g. `invalid-argument`.
    pub code: String,
    /// Human-readable message. Internal failures carry no detail.
    pub message: String,
}

impl From<&Error> for CallableError {
    fn from(err: &Error) -> Self {
        let message = match err.code() {
            "internal" | "unavailable" => err.user_message().to_string(),
            _ => err.to_string(),
        };
        Self {
            code: err.code().to_string(),
            message,
        }
    }
}
