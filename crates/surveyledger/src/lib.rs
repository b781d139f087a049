//! `surveyledger` - Deduplicated submission ledger for client-satisfaction surveys
//!
//! This library implements the submission and configuration protocol behind
//! an ARTA client-satisfaction survey: every submitter is committed at most
//! once, and every committed response is stamped with the survey configuration
//! version that was live when it was written.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod backend;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod fingerprint;
pub mod form;
pub mod local;
pub mod logging;
pub mod principal;
pub mod storage;
pub mod submission;
pub mod survey;

pub use backend::{invoke, SqliteBackend, SurveyBackend};
pub use config::{Config, SinkMode};
pub use coordinator::{SubmissionCoordinator, SubmitStatus};
pub use error::{Error, Result};
pub use form::FormState;
pub use logging::init_logging;
pub use principal::Principal;
pub use storage::{Acceptance, LedgerStats, Storage};
pub use submission::{Answers, AnswerValue, Fingerprint, SubmissionDraft, SubmissionRecord};
pub use survey::SurveyConfig;
