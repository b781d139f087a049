//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use surveyledger::fingerprint::{Blake3Fingerprinter, Fingerprinter, RollingHashFingerprinter};
use surveyledger::SinkMode;

/// Submit command arguments.
#[derive(Debug, Args)]
pub struct SubmitCommand {
    /// Form answers as JSON; reads stdin when omitted or `-`
    #[arg(short, long, value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Override the configured sink
    #[arg(short, long, value_enum)]
    pub mode: Option<SinkModeArg>,

    /// Fingerprinting strategy
    #[arg(long, value_enum, default_value = "blake3")]
    pub fingerprinter: FingerprinterArg,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Call command arguments.
#[derive(Debug, Args)]
pub struct CallCommand {
    /// Callable name (submitSurvey, getSurveyConfig, setSurveyConfig, isAdmin)
    pub name: String,

    /// JSON payload
    #[arg(short, long, default_value = "null")]
    pub data: String,

    /// Invoke as this verified uid
    #[arg(long = "as", value_name = "UID")]
    pub caller: Option<String>,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,

        /// Show the live survey configuration instead of the application settings
        #[arg(short, long)]
        survey: bool,
    },

    /// Update the live survey configuration from a JSON object
    Set {
        /// The update, e.g. '{"ui": {"title": "Client Satisfaction Form"}}'
        update: String,

        /// Admin uid applying the update (required for the ledger)
        #[arg(long = "as", value_name = "UID")]
        caller: Option<String>,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Admin registry commands.
#[derive(Debug, Subcommand)]
pub enum AdminCommand {
    /// Allow a uid to change the survey configuration
    Grant {
        /// The uid to grant
        uid: String,
    },

    /// Remove a uid from the admin registry
    Revoke {
        /// The uid to revoke
        uid: String,
    },

    /// List admins
    List {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Check whether a uid is an admin
    Check {
        /// The uid to check
        uid: String,
    },
}

/// Ledger inspection commands.
#[derive(Debug, Subcommand)]
pub enum LedgerCommand {
    /// Show the committed record for a fingerprint
    Show {
        /// The fingerprint
        fingerprint: String,
    },

    /// List the most recent records
    Recent {
        /// Maximum number of records
        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// List rejected resubmissions
    Duplicates {
        /// Only attempts for this fingerprint
        #[arg(short, long)]
        fingerprint: Option<String>,

        /// Maximum number of attempts
        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show ledger statistics
    Stats {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Sink argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SinkModeArg {
    /// Device-local store, no deduplication
    Local,
    /// Transactional ledger
    Remote,
}

impl From<SinkModeArg> for SinkMode {
    fn from(arg: SinkModeArg) -> Self {
        match arg {
            SinkModeArg::Local => Self::Local,
            SinkModeArg::Remote => Self::Remote,
        }
    }
}

/// Fingerprinting strategy argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum FingerprinterArg {
    /// BLAKE3 content hash
    #[default]
    Blake3,
    /// Legacy 31-multiplier rolling hash
    Rolling,
}

impl FingerprinterArg {
    /// Instantiate the strategy.
    #[must_use]
    pub fn build(self) -> Box<dyn Fingerprinter> {
        match self {
            Self::Blake3 => Box::new(Blake3Fingerprinter),
            Self::Rolling => Box::new(RollingHashFingerprinter),
        }
    }
}
