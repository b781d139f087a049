//! Command-line interface for surveyledger.
//!
//! This module provides the CLI structure for the `surveyctl` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use surveyledger::logging::Verbosity;

pub use commands::{
    AdminCommand, CallCommand, ConfigCommand, FingerprinterArg, LedgerCommand, SinkModeArg,
    StatusCommand, SubmitCommand,
};

/// surveyctl - Operate the client-satisfaction survey ledger
///
/// Submits forms, invokes the survey callables, manages admins and inspects
/// the deduplicated submission ledger.
#[derive(Debug, Parser)]
#[command(name = "surveyctl")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Submit a filled-in form through the configured sink
    Submit(SubmitCommand),

    /// Invoke a callable with a JSON payload
    Call(CallCommand),

    /// View or modify configuration
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Manage the admin registry
    #[command(subcommand)]
    Admin(AdminCommand),

    /// Inspect the submission ledger
    #[command(subcommand)]
    Ledger(LedgerCommand),

    /// Show sink, storage and ledger status
    Status(StatusCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.quiet, self.verbose)
    }
}
