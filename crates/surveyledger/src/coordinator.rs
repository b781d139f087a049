//! Client-side submission coordinator.
//!
//! Turns a filled-in form into a fingerprinted draft and hands it to the
//! [`SubmissionSink`] chosen at startup: the device-local store when no backend
//! is configured, otherwise the transactional ledger behind the callables.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info};

use crate::backend::{SqliteBackend, SubmitRequest, SurveyBackend, SUBMIT_SURVEY};
use crate::config::{Config, SinkMode};
use crate::error::{Error, Result};
use crate::fingerprint::{Blake3Fingerprinter, Fingerprinter};
use crate::form::FormState;
use crate::local::{LocalConfigStore, LocalSubmissionStore};
use crate::submission::{SubmissionDraft, SubmissionRecord};

/// Outcome of a submit that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmitStatus {
    /// The response was stored.
    Committed,
    /// A response with the same fingerprint had already been stored.
    Duplicate,
}

impl SubmitStatus {
    /// Message for the person who filled in the form.
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Committed => "Thank you! Your response has been recorded.",
            Self::Duplicate => "Your response has already been recorded. Thank you!",
        }
    }
}

/// Where drafts are persisted.
#[async_trait]
pub trait SubmissionSink: Send + Sync + std::fmt::Debug {
    /// Short name for logs and status output.
    fn name(&self) -> &'static str;

    /// Persist a validated draft.
    ///
    /// # Errors
    ///
    /// Returns an error if the draft could not be persisted. Nothing was
    /// stored in that case.
    async fn persist(&self, draft: SubmissionDraft) -> Result<SubmitStatus>;
}

/// Appends to the device-local store. Never reports a duplicate.
#[derive(Debug, Clone)]
pub struct LocalSink {
    submissions: LocalSubmissionStore,
    config: LocalConfigStore,
}

impl LocalSink {
    /// Persist into `submissions`, stamping from `config`.
    #[must_use]
    pub fn new(submissions: LocalSubmissionStore, config: LocalConfigStore) -> Self {
        Self {
            submissions,
            config,
        }
    }
}

#[async_trait]
impl SubmissionSink for LocalSink {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn persist(&self, draft: SubmissionDraft) -> Result<SubmitStatus> {
        let sink = self.clone();
        tokio::task::spawn_blocking(move || {
            let stamp = sink.config.load().stamp();
            let submitted_at = draft.client_timestamp.unwrap_or_else(Utc::now);
            let record = SubmissionRecord::from_draft(&draft, submitted_at, stamp);
            sink.submissions.append(&record)
        })
        .await
        .map_err(|err| Error::internal(format!("local store worker failed: {err}")))??;

        Ok(SubmitStatus::Committed)
    }
}

/// Calls the ledger's `submitSurvey`, giving up after `timeout`.
///
/// A timed-out call may or may not have committed; resubmitting the same form
/// is safe because the ledger deduplicates.
#[derive(Debug, Clone)]
pub struct RemoteSink {
    backend: Arc<dyn SurveyBackend>,
    timeout: Duration,
}

impl RemoteSink {
    /// Submit through `backend`.
    #[must_use]
    pub fn new(backend: Arc<dyn SurveyBackend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }
}

#[async_trait]
impl SubmissionSink for RemoteSink {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn persist(&self, draft: SubmissionDraft) -> Result<SubmitStatus> {
        let request = SubmitRequest::from_draft(&draft);
        let reply = tokio::time::timeout(self.timeout, self.backend.submit_survey(request))
            .await
            .map_err(|_| Error::timeout(SUBMIT_SURVEY))??;

        Ok(if reply.is_duplicate() {
            SubmitStatus::Duplicate
        } else {
            SubmitStatus::Committed
        })
    }
}

/// Builds submissions from forms and persists them.
#[derive(Debug)]
pub struct SubmissionCoordinator {
    fingerprinter: Box<dyn Fingerprinter>,
    sink: Box<dyn SubmissionSink>,
}

impl SubmissionCoordinator {
    /// Combine a fingerprinting strategy with a sink.
    #[must_use]
    pub fn new(fingerprinter: Box<dyn Fingerprinter>, sink: Box<dyn SubmissionSink>) -> Self {
        Self {
            fingerprinter,
            sink,
        }
    }

    /// Build the coordinator described by `config`.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let sink: Box<dyn SubmissionSink> = match config.backend.mode {
            SinkMode::Local => Box::new(LocalSink::new(
                LocalSubmissionStore::new(config.local_submissions_path()),
                LocalConfigStore::new(config.local_config_path()),
            )),
            SinkMode::Remote => Box::new(RemoteSink::new(
                Arc::new(SqliteBackend::from_config(config)),
                config.request_timeout(),
            )),
        };
        Self::new(Box::new(Blake3Fingerprinter), sink)
    }

    /// Replace the fingerprinting strategy.
    #[must_use]
    pub fn with_fingerprinter(mut self, fingerprinter: Box<dyn Fingerprinter>) -> Self {
        self.fingerprinter = fingerprinter;
        self
    }

    /// Name of the sink in use.
    #[must_use]
    pub fn sink_name(&self) -> &'static str {
        self.sink.name()
    }

    /// Name of the fingerprinting strategy in use.
    #[must_use]
    pub fn fingerprinter_name(&self) -> &'static str {
        self.fingerprinter.name()
    }

    /// Submit a filled-in form.
    ///
    /// No retry is attempted; a recoverable error leaves it to the caller to
    /// submit again.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] when the form has no identifying
    /// field or its answers exceed a limit, and the sink's error otherwise.
    pub async fn submit(&self, form: &FormState) -> Result<SubmitStatus> {
        let form = form.clone().normalized();
        let identity = form.identity();
        if identity.is_empty() {
            return Err(Error::invalid_argument(
                "form has neither an account number nor a submission id",
            ));
        }

        let fingerprint = self.fingerprinter.fingerprint(identity)?;
        let draft = SubmissionDraft::new(fingerprint, form.to_answers());
        draft.validate()?;

        debug!(fingerprint = %draft.fingerprint, sink = self.sink.name(), "Submitting");
        let status = self.sink.persist(draft).await?;
        info!(sink = self.sink.name(), status = ?status, "Submission finished");
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::Value;

    use super::*;
    use crate::backend::{SetConfigReply, SubmitReply};
    use crate::fingerprint::RollingHashFingerprinter;
    use crate::principal::Principal;
    use crate::storage::Storage;
    use crate::survey::{SurveyConfig, SQD_QUESTIONS};

    fn filled_form(account: &str) -> FormState {
        let mut form = FormState::new();
        form.account_number = account.to_string();
        form.client_type = "citizen".to_string();
        form.cc1 = "4".to_string();
        form.cc2 = "1".to_string();
        for (id, _) in SQD_QUESTIONS {
            form.sqd.insert(id.to_string(), "5".to_string());
        }
        form
    }

    fn remote_coordinator(dir: &tempfile::TempDir) -> (SubmissionCoordinator, std::path::PathBuf) {
        let db_path = dir.path().join("ledger.db");
        let backend = SqliteBackend::new(&db_path, Duration::from_secs(5));
        let coordinator = SubmissionCoordinator::new(
            Box::new(Blake3Fingerprinter),
            Box::new(RemoteSink::new(Arc::new(backend), Duration::from_secs(5))),
        );
        (coordinator, db_path)
    }

    /// A backend that never answers in time.
    #[derive(Debug, Default)]
    struct StalledBackend {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SurveyBackend for StalledBackend {
        async fn submit_survey(&self, _request: SubmitRequest) -> Result<SubmitReply> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(SubmitReply::committed())
        }

        async fn get_survey_config(&self) -> Result<SurveyConfig> {
            Ok(SurveyConfig::default())
        }

        async fn set_survey_config(
            &self,
            _update: Value,
            _caller: Option<&Principal>,
        ) -> Result<SetConfigReply> {
            Err(Error::unavailable("stalled"))
        }

        async fn is_admin(&self, _caller: Option<&Principal>) -> bool {
            false
        }
    }

    #[tokio::test]
    async fn test_remote_submit_then_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let (coordinator, db_path) = remote_coordinator(&dir);

        let form = filled_form("acc-001");
        assert_eq!(coordinator.submit(&form).await.unwrap(), SubmitStatus::Committed);

        // A fresh session by the same account is still the same submitter.
        let again = filled_form("acc-001");
        assert_eq!(coordinator.submit(&again).await.unwrap(), SubmitStatus::Duplicate);

        let storage = Storage::open(&db_path).unwrap();
        assert_eq!(storage.count_responses().unwrap(), 1);
        assert_eq!(storage.count_duplicate_attempts().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_remote_record_is_normalized() {
        let dir = tempfile::tempdir().unwrap();
        let (coordinator, db_path) = remote_coordinator(&dir);
        coordinator.submit(&filled_form("acc-002")).await.unwrap();

        let storage = Storage::open(&db_path).unwrap();
        let record = storage.recent_responses(1).unwrap().remove(0);
        assert_eq!(
            record.fields.get("cc2"),
            Some(&crate::submission::AnswerValue::from("5"))
        );
        assert!(record.fingerprint.as_str().starts_with("sub_"));
        assert_ne!(record.fingerprint.as_str(), "acc-002");
    }

    #[tokio::test]
    async fn test_anonymous_forms_are_distinct() {
        let dir = tempfile::tempdir().unwrap();
        let (coordinator, db_path) = remote_coordinator(&dir);

        coordinator.submit(&filled_form("")).await.unwrap();
        coordinator.submit(&filled_form("")).await.unwrap();

        let storage = Storage::open(&db_path).unwrap();
        assert_eq!(storage.count_responses().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_same_session_resubmit_is_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let (coordinator, _) = remote_coordinator(&dir);

        let form = filled_form("");
        coordinator.submit(&form).await.unwrap();
        assert_eq!(coordinator.submit(&form).await.unwrap(), SubmitStatus::Duplicate);
    }

    #[tokio::test]
    async fn test_missing_identity_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (coordinator, _) = remote_coordinator(&dir);

        let mut form = filled_form("");
        form.submission_id = String::new();
        let err = coordinator.submit(&form).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
    }

    #[tokio::test]
    async fn test_remote_timeout_is_recoverable() {
        let backend = Arc::new(StalledBackend::default());
        let coordinator = SubmissionCoordinator::new(
            Box::new(Blake3Fingerprinter),
            Box::new(RemoteSink::new(backend.clone(), Duration::from_millis(20))),
        );

        let err = coordinator.submit(&filled_form("acc-001")).await.unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));
        assert!(err.is_recoverable());
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_local_sink_appends_without_dedup() {
        let dir = tempfile::tempdir().unwrap();
        let submissions = LocalSubmissionStore::new(dir.path().join("arta_submissions.json"));
        let config = LocalConfigStore::new(dir.path().join("survey_config.json"));
        config
            .save(&serde_json::json!({ "activeYear": 2024 }))
            .unwrap();

        let coordinator = SubmissionCoordinator::new(
            Box::new(RollingHashFingerprinter),
            Box::new(LocalSink::new(submissions.clone(), config)),
        );
        assert_eq!(coordinator.sink_name(), "local");

        let form = filled_form("acc-001");
        assert_eq!(coordinator.submit(&form).await.unwrap(), SubmitStatus::Committed);
        assert_eq!(coordinator.submit(&form).await.unwrap(), SubmitStatus::Committed);

        let records = submissions.load().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].active_year, 2024);
        assert_eq!(records[0].config_version, 2);
        assert_eq!(records[0].fingerprint, records[1].fingerprint);
    }

    #[test]
    fn test_from_config_picks_sink() {
        let mut config = Config::default();
        config.backend.mode = SinkMode::Local;
        assert_eq!(SubmissionCoordinator::from_config(&config).sink_name(), "local");

        config.backend.mode = SinkMode::Remote;
        let coordinator = SubmissionCoordinator::from_config(&config);
        assert_eq!(coordinator.sink_name(), "remote");
        assert_eq!(coordinator.fingerprinter_name(), "blake3");

        let coordinator = coordinator.with_fingerprinter(Box::new(RollingHashFingerprinter));
        assert_eq!(coordinator.fingerprinter_name(), "rolling");
    }

    #[test]
    fn test_status_wire_name() {
        assert_eq!(
            serde_json::to_value(SubmitStatus::Duplicate).unwrap(),
            serde_json::json!("duplicate")
        );
    }

    #[test]
    fn test_user_messages() {
        assert!(SubmitStatus::Duplicate.user_message().contains("already"));
        assert!(!SubmitStatus::Committed.user_message().is_empty());
    }
}
