//! Device-local persistence used when no backend is configured.
//!
//! Both stores keep a single JSON file and replace it atomically: the new
//! contents are written next to the target and renamed over it, so a failed
//! write leaves the previous file untouched.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::storage::ConfigCommit;
use crate::submission::SubmissionRecord;
use crate::survey::{next_version, sanitize_update, SurveyConfig};

/// Append-only list of submissions kept on this device.
///
/// There is no deduplication: every submission is appended.
#[derive(Debug, Clone)]
pub struct LocalSubmissionStore {
    path: PathBuf,
}

impl LocalSubmissionStore {
    /// Use the list stored at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a record and return the new number of stored entries.
    ///
    /// A file that holds valid JSON other than a list is started over.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is unreadable, is not valid JSON, or the
    /// new list cannot be written. Nothing is written in the error case.
    pub fn append(&self, record: &SubmissionRecord) -> Result<usize> {
        let mut entries = match read_json(&self.path)? {
            Some(Value::Array(entries)) => entries,
            Some(_) => {
                warn!(path = %self.path.display(), "Local submission store is not a list, starting over");
                Vec::new()
            }
            None => Vec::new(),
        };

        entries.push(serde_json::to_value(record)?);
        let stored = entries.len();
        write_json_atomic(&self.path, &Value::Array(entries))?;

        info!(fingerprint = %record.fingerprint, stored, "Saved submission on this device");
        Ok(stored)
    }

    /// Load every stored record. Entries that no longer parse are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is unreadable or is not valid JSON.
    pub fn load(&self) -> Result<Vec<SubmissionRecord>> {
        let Some(Value::Array(entries)) = read_json(&self.path)? else {
            return Ok(Vec::new());
        };

        let records = entries
            .into_iter()
            .enumerate()
            .filter_map(|(i, entry)| match serde_json::from_value(entry) {
                Ok(record) => Some(record),
                Err(err) => {
                    warn!(index = i, error = %err, "Skipping unreadable local submission");
                    None
                }
            })
            .collect();
        Ok(records)
    }
}

/// Survey configuration saved on this device only.
#[derive(Debug, Clone)]
pub struct LocalConfigStore {
    path: PathBuf,
}

impl LocalConfigStore {
    /// Use the configuration stored at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The stored configuration, or the default when the file is missing or
    /// unusable.
    #[must_use]
    pub fn load(&self) -> SurveyConfig {
        match read_json(&self.path) {
            Ok(Some(document)) => SurveyConfig::recover(&document),
            Ok(None) => SurveyConfig::default(),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "Local survey configuration unreadable, using defaults");
                SurveyConfig::default()
            }
        }
    }

    /// Merge `update` over the stored configuration and save it.
    ///
    /// Uses the same field-by-field sanitising and version rule as the
    /// ledger's configuration service.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `update` is not an object, or an
    /// I/O error if the file cannot be written.
    pub fn save(&self, update: &Value) -> Result<ConfigCommit> {
        let prior = self.load();
        let sanitized = sanitize_update(&prior, update)?;

        let mut config = sanitized.config;
        config.version = next_version(prior.version, sanitized.requested_version)?;
        write_json_atomic(&self.path, &serde_json::to_value(&config)?)?;

        info!(version = config.version, "Saved survey configuration on this device");
        Ok(ConfigCommit {
            version: config.version,
            config,
            corrections: sanitized.corrections,
        })
    }
}

/// Read and parse a JSON file. A missing file reads as `None`.
fn read_json(path: &Path) -> Result<Option<Value>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    if raw.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(&raw)?))
}

/// Replace `path` with `value` via a sibling temporary file.
fn write_json_atomic(path: &Path, value: &Value) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, serde_json::to_vec(value)?)?;
    if let Err(err) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(err.into());
    }
    debug!(path = %path.display(), "Replaced local file");
    Ok(())
}
