//! The remote callable surface.
//!
//! [`SurveyBackend`] is what a client talks to when a backend is configured:
//! four named callables taking and returning JSON. [`SqliteBackend`] serves
//! them from the ledger database. Its handlers are stateless: every call opens
//! its own connection on a blocking worker and relies on the database's
//! transaction isolation for mutual exclusion.

mod wire;

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::principal::{self, Principal};
use crate::storage::Storage;
use crate::survey::SurveyConfig;

pub use wire::{AdminReply, CallableError, SetConfigReply, SubmitReply, SubmitRequest};

/// Callable name of [`SurveyBackend::submit_survey`].
pub const SUBMIT_SURVEY: &str = "submitSurvey";
/// Callable name of [`SurveyBackend::get_survey_config`].
pub const GET_SURVEY_CONFIG: &str = "getSurveyConfig";
/// Callable name of [`SurveyBackend::set_survey_config`].
pub const SET_SURVEY_CONFIG: &str = "setSurveyConfig";
/// Callable name of [`SurveyBackend::is_admin`].
pub const IS_ADMIN: &str = "isAdmin";

/// All callable names.
pub const CALLABLES: [&str; 4] = [SUBMIT_SURVEY, GET_SURVEY_CONFIG, SET_SURVEY_CONFIG, IS_ADMIN];

/// The server side of the submission and configuration protocol.
#[async_trait]
pub trait SurveyBackend: Send + Sync + std::fmt::Debug {
    /// Commit a submission unless its key was already committed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for a malformed request, or a
    /// recoverable error if the ledger could not be reached.
    async fn submit_survey(&self, request: SubmitRequest) -> Result<SubmitReply>;

    /// The live survey configuration.
    ///
    /// # Errors
    ///
    /// Only transport failures; a missing document yields the default.
    async fn get_survey_config(&self) -> Result<SurveyConfig>;

    /// Apply an admin's configuration update.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthenticated`] or [`Error::PermissionDenied`] for
    /// unauthorized callers, [`Error::InvalidArgument`] for a non-object update.
    async fn set_survey_config(
        &self,
        update: Value,
        caller: Option<&Principal>,
    ) -> Result<SetConfigReply>;

    /// Whether the caller is an admin. Never fails: anything that goes wrong
    /// reads as `false`.
    async fn is_admin(&self, caller: Option<&Principal>) -> bool;
}

/// Serves the callables from a `SQLite` ledger.
#[derive(Debug, Clone)]
pub struct SqliteBackend {
    db_path: PathBuf,
    busy_timeout: Duration,
}

impl SqliteBackend {
    /// Serve from the database at `db_path`.
    #[must_use]
    pub fn new(db_path: impl Into<PathBuf>, busy_timeout: Duration) -> Self {
        Self {
            db_path: db_path.into(),
            busy_timeout,
        }
    }

    /// Serve from the configured database.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.database_path(), config.busy_timeout())
    }

    /// Path of the backing database.
    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Run `f` against a fresh connection on a blocking worker.
    async fn with_storage<T, F>(&self, operation: &'static str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Storage) -> Result<T> + Send + 'static,
    {
        let path = self.db_path.clone();
        let busy_timeout = self.busy_timeout;

        tokio::task::spawn_blocking(move || {
            let mut storage = Storage::open_with_timeout(&path, busy_timeout)?;
            f(&mut storage)
        })
        .await
        .map_err(|err| Error::unavailable(format!("{operation} worker failed: {err}")))?
    }
}

#[async_trait]
impl SurveyBackend for SqliteBackend {
    async fn submit_survey(&self, request: SubmitRequest) -> Result<SubmitReply> {
        let draft = request.into_draft()?;
        let acceptance = self
            .with_storage(SUBMIT_SURVEY, move |storage| {
                storage.accept_submission(&draft)
            })
            .await?;

        Ok(if acceptance.is_duplicate() {
            SubmitReply::duplicate()
        } else {
            SubmitReply::committed()
        })
    }

    async fn get_survey_config(&self) -> Result<SurveyConfig> {
        self.with_storage(GET_SURVEY_CONFIG, |storage| storage.get_config())
            .await
    }

    async fn set_survey_config(
        &self,
        update: Value,
        caller: Option<&Principal>,
    ) -> Result<SetConfigReply> {
        let caller = principal::require(caller)?.clone();
        let commit = self
            .with_storage(SET_SURVEY_CONFIG, move |storage| {
                storage.set_config(&update, Some(&caller))
            })
            .await?;

        Ok(SetConfigReply {
            success: true,
            version: commit.version,
        })
    }

    async fn is_admin(&self, caller: Option<&Principal>) -> bool {
        let Some(caller) = caller else {
            return false;
        };
        let uid = caller.uid().to_string();

        match self
            .with_storage(IS_ADMIN, move |storage| storage.is_admin(&uid))
            .await
        {
            Ok(is_admin) => is_admin,
            Err(err) => {
                warn!(uid = %caller, error = %err, "Admin lookup failed");
                false
            }
        }
    }
}

/// Dispatch a callable by name.
///
/// `data` is the untrusted JSON payload; `caller` is the verified identity of
/// the requester, if any.
///
/// # Errors
///
/// Returns the callable's error, or [`Error::InvalidArgument`] for an
/// unknown callable name.
pub async fn invoke(
    backend: &dyn SurveyBackend,
    name: &str,
    data: Value,
    caller: Option<&Principal>,
) -> Result<Value> {
    debug!(callable = name, caller = ?caller.map(Principal::uid), "Invoking callable");

    let reply = match name {
        SUBMIT_SURVEY => {
            let request = SubmitRequest::from_value(data)?;
            serde_json::to_value(backend.submit_survey(request).await?)?
        }
        GET_SURVEY_CONFIG => serde_json::to_value(backend.get_survey_config().await?)?,
        SET_SURVEY_CONFIG => serde_json::to_value(backend.set_survey_config(data, caller).await?)?,
        IS_ADMIN => serde_json::to_value(AdminReply {
            is_admin: backend.is_admin(caller).await,
        })?,
        other => {
            return Err(Error::invalid_argument(format!(
                "unknown callable '{other}'"
            )))
        }
    };
    Ok(reply)
}
