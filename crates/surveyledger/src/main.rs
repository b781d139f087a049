//! `surveyctl` - CLI for surveyledger
//!
//! This binary submits survey forms through the configured sink, serves the
//! callables against the local ledger and lets an operator inspect it.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

mod cli;

use std::io::Read;
use std::path::Path;

use anyhow::{bail, Context};
use clap::Parser;
use serde_json::{json, Value};

use cli::{AdminCommand, CallCommand, Cli, Command, ConfigCommand, LedgerCommand, SubmitCommand};
use surveyledger::backend::{self, CallableError};
use surveyledger::local::{LocalConfigStore, LocalSubmissionStore};
use surveyledger::storage::ConfigCommit;
use surveyledger::{
    init_logging, Config, Fingerprint, FormState, Principal, SinkMode, SqliteBackend, Storage,
    SubmissionCoordinator, SubmissionRecord, SurveyBackend, SurveyConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    let config = Config::load_from(cli.config.clone()).context("failed to load configuration")?;

    match cli.command {
        Command::Submit(cmd) => handle_submit(config, cmd).await,
        Command::Call(cmd) => handle_call(&config, cmd).await,
        Command::Config(cmd) => handle_config(&config, cmd).await,
        Command::Admin(cmd) => handle_admin(&config, cmd),
        Command::Ledger(cmd) => handle_ledger(&config, cmd),
        Command::Status(cmd) => handle_status(&config, cmd.json),
    }
}

async fn handle_submit(mut config: Config, cmd: SubmitCommand) -> anyhow::Result<()> {
    if let Some(mode) = cmd.mode {
        config.backend.mode = mode.into();
    }

    let raw = read_input(cmd.file.as_deref())?;
    let mut form: FormState = serde_json::from_str(&raw).context("form is not valid JSON")?;
    if form.submission_id.trim().is_empty() {
        form.submission_id = FormState::new().submission_id;
    }

    let coordinator =
        SubmissionCoordinator::from_config(&config).with_fingerprinter(cmd.fingerprinter.build());

    match coordinator.submit(&form).await {
        Ok(status) => {
            if cmd.json {
                let out = json!({
                    "status": status,
                    "sink": coordinator.sink_name(),
                    "fingerprinter": coordinator.fingerprinter_name(),
                    "message": status.user_message(),
                });
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                println!("{}", status.user_message());
            }
            Ok(())
        }
        Err(err) => {
            eprintln!("{}", err.user_message());
            Err(err).context("submission failed")
        }
    }
}

async fn handle_call(config: &Config, cmd: CallCommand) -> anyhow::Result<()> {
    let data: Value = serde_json::from_str(&cmd.data).context("--data is not valid JSON")?;
    let caller = cmd.caller.map(Principal::new).transpose()?;
    let server = SqliteBackend::from_config(config);

    match backend::invoke(&server, &cmd.name, data, caller.as_ref()).await {
        Ok(reply) => {
            println!("{}", serde_json::to_string_pretty(&reply)?);
            Ok(())
        }
        Err(err) => {
            let body = json!({ "error": CallableError::from(&err) });
            println!("{}", serde_json::to_string_pretty(&body)?);
            if err.is_permission_error() {
                eprintln!("Pass an admin uid with --as; grant one with `surveyctl admin grant <UID>`.");
            } else if err.is_recoverable() {
                eprintln!("The ledger could not be reached; the call is safe to repeat.");
            }
            bail!("{} failed: {}", cmd.name, err.code())
        }
    }
}

async fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json, survey: true } => {
            let live = match config.backend.mode {
                SinkMode::Local => LocalConfigStore::new(config.local_config_path()).load(),
                SinkMode::Remote => SqliteBackend::from_config(config)
                    .get_survey_config()
                    .await?,
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&live)?);
            } else {
                print_survey_config(&live, config.backend.mode);
            }
        }
        ConfigCommand::Show { json, survey: false } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Backend]");
                println!("  Mode:               {}", config.backend.mode);
                println!(
                    "  Request timeout:    {} ms",
                    config.backend.request_timeout_ms
                );
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
                println!("  Busy timeout:       {} ms", config.storage.busy_timeout_ms);
                println!();
                println!("[Local]");
                println!(
                    "  Submissions:        {}",
                    config.local_submissions_path().display()
                );
                println!(
                    "  Survey config:      {}",
                    config.local_config_path().display()
                );
            }
        }
        ConfigCommand::Set { update, caller } => {
            let update: Value =
                serde_json::from_str(&update).context("update is not valid JSON")?;
            let commit = match config.backend.mode {
                SinkMode::Local => LocalConfigStore::new(config.local_config_path()).save(&update)?,
                SinkMode::Remote => {
                    let caller = caller.map(Principal::new).transpose()?;
                    open_storage(config)?.set_config(&update, caller.as_ref())?
                }
            };
            print_commit(&commit);
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}

fn handle_admin(config: &Config, cmd: AdminCommand) -> anyhow::Result<()> {
    let storage = open_storage(config)?;
    match cmd {
        AdminCommand::Grant { uid } => {
            if storage.grant_admin(&uid)? {
                println!("Granted admin to {}", uid.trim());
            } else {
                println!("{} is already an admin", uid.trim());
            }
        }
        AdminCommand::Revoke { uid } => {
            if storage.revoke_admin(&uid)? {
                println!("Revoked admin from {}", uid.trim());
            } else {
                println!("{} was not an admin", uid.trim());
            }
        }
        AdminCommand::List { json } => {
            let admins = storage.list_admins()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&admins)?);
            } else if admins.is_empty() {
                println!("No admins.");
            } else {
                for admin in admins {
                    println!(
                        "{:<32} granted {}",
                        admin.uid,
                        admin.granted_at.format("%Y-%m-%d %H:%M:%S")
                    );
                }
            }
        }
        AdminCommand::Check { uid } => {
            let is_admin = storage.is_admin(uid.trim())?;
            println!("{}: {}", uid.trim(), if is_admin { "admin" } else { "not an admin" });
        }
    }
    Ok(())
}

fn handle_ledger(config: &Config, cmd: LedgerCommand) -> anyhow::Result<()> {
    let storage = open_storage(config)?;
    match cmd {
        LedgerCommand::Show { fingerprint } => {
            let fingerprint = Fingerprint::parse(&fingerprint)?;
            match storage.get_response(&fingerprint)? {
                Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
                None => println!("No submission for {fingerprint}"),
            }
        }
        LedgerCommand::Recent { limit, json } => {
            let records = storage.recent_responses(limit)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else if records.is_empty() {
                println!("No submissions.");
            } else {
                for record in &records {
                    print_record_line(record);
                }
            }
        }
        LedgerCommand::Duplicates {
            fingerprint,
            limit,
            json,
        } => {
            let fingerprint = fingerprint.as_deref().map(Fingerprint::parse).transpose()?;
            let attempts = storage.duplicate_attempts(fingerprint.as_ref(), limit)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&attempts)?);
            } else if attempts.is_empty() {
                println!("No duplicate attempts.");
            } else {
                for attempt in &attempts {
                    println!(
                        "{}  {}",
                        attempt.attempted_at.format("%Y-%m-%d %H:%M:%S"),
                        attempt.fingerprint
                    );
                }
            }
        }
        LedgerCommand::Stats { json } => {
            let stats = storage.stats()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("Ledger Statistics");
                println!("=================");
                println!("Submissions:        {}", stats.total_responses);
                println!("Duplicate attempts: {}", stats.duplicate_attempts);
                println!("Config version:     {}", stats.config_version);
                println!("Active year:        {}", stats.active_year);
                if let Some(oldest) = stats.oldest_response {
                    println!("Oldest:             {}", oldest.format("%Y-%m-%d %H:%M:%S"));
                }
                if let Some(newest) = stats.newest_response {
                    println!("Newest:             {}", newest.format("%Y-%m-%d %H:%M:%S"));
                }
                println!("Database size:      {} bytes", stats.db_size_bytes);
            }
        }
    }
    Ok(())
}

fn handle_status(config: &Config, json: bool) -> anyhow::Result<()> {
    let db_path = config.database_path();
    let stats = if db_path.exists() {
        Some(open_storage(config)?.stats()?)
    } else {
        None
    };
    let local_submissions = LocalSubmissionStore::new(config.local_submissions_path());
    let local_count = local_submissions.load().map(|records| records.len()).ok();

    if json {
        let status = json!({
            "mode": config.backend.mode,
            "database_path": db_path,
            "ledger": stats,
            "local_submissions_path": local_submissions.path(),
            "local_submissions": local_count,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("surveyctl status");
        println!("----------------");
        println!("Sink:          {}", config.backend.mode);
        println!("Database:      {}", db_path.display());
        match &stats {
            Some(stats) => println!(
                "Ledger:        {} submissions, {} duplicate attempts, config v{}",
                stats.total_responses, stats.duplicate_attempts, stats.config_version
            ),
            None => println!("Ledger:        not created"),
        }
        println!("Local store:   {}", local_submissions.path().display());
        match local_count {
            Some(count) => println!("Local entries: {count}"),
            None => println!("Local entries: unreadable"),
        }
    }
    Ok(())
}

fn open_storage(config: &Config) -> anyhow::Result<Storage> {
    let path = config.database_path();
    Storage::open_with_timeout(&path, config.busy_timeout())
        .with_context(|| format!("failed to open ledger at {}", path.display()))
}

/// Read the whole of `path`, or stdin when absent or `-`.
fn read_input(path: Option<&Path>) -> anyhow::Result<String> {
    match path {
        Some(path) if path != Path::new("-") => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display())),
        _ => {
            let mut raw = String::new();
            std::io::stdin()
                .read_to_string(&mut raw)
                .context("failed to read stdin")?;
            Ok(raw)
        }
    }
}

fn print_survey_config(survey: &SurveyConfig, mode: SinkMode) {
    println!("Survey Configuration ({mode})");
    println!("====================");
    println!("Version:      {}", survey.version);
    println!("Active year:  {}", survey.active_year);
    println!("Title:        {}", survey.ui.title);
    println!("Intro:        {}", survey.ui.intro);
    println!("Steps:        {}", survey.step_labels.join(" / "));
    let origin = if survey.questions.is_some() { "custom" } else { "built-in" };
    let questions = survey.effective_questions();
    println!("Questions:    {origin}");
    println!("  {}", questions.step1.cc1_label);
    for sqd in &questions.sqd {
        println!("  {}", sqd.label);
    }
}

fn print_commit(commit: &ConfigCommit) {
    println!("Survey configuration is now version {}", commit.version);
    for correction in &commit.corrections {
        println!("  kept prior {}: {}", correction.field, correction.reason);
    }
}

fn print_record_line(record: &SubmissionRecord) {
    println!(
        "{}  {:<24} year {} v{}  {} answers",
        record.submitted_at.format("%Y-%m-%d %H:%M:%S"),
        record.fingerprint,
        record.active_year,
        record.config_version,
        record.fields.len()
    );
}
