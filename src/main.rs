//! Curator - command-line media library synchronizer
//!
//! One process, one command, sequential work: search and acquire entries,
//! renumber their images, or edit record fields. Per-entry failures are
//! logged and tallied; the process only exits non-zero up front for bad
//! arguments or missing configuration.

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use curator::cli::{self, Command};
use curator::config::Config;
use curator::services::{
    acquire, edit_record_field, normalize_images, resolve, select_targets, ConsolePrompter,
    FieldEdit, MetadataSource, Prompter, TmdbClient,
};

fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let command = match Command::from_args() {
        Ok(command) => command,
        Err(e) => {
            eprintln!("error: {e}\n\n{}", cli::USAGE);
            return ExitCode::from(2);
        }
    };

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e:#}");
            return ExitCode::from(2);
        }
    };

    if let Err(e) = init_tracing(&config) {
        eprintln!("error: {e:#}");
        return ExitCode::from(2);
    }

    match run(command, &config) {
        Ok(failures) if failures == 0 => ExitCode::SUCCESS,
        Ok(failures) => {
            tracing::error!(failures, "Finished with failures");
            ExitCode::FAILURE
        }
        Err(e) => {
            tracing::error!(error = format!("{e:#}"), "Aborted");
            ExitCode::FAILURE
        }
    }
}

/// Console output plus a plain-text file with the full detail.
fn init_tracing(config: &Config) -> Result<()> {
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_file)
        .with_context(|| format!("Failed to open log file {}", config.log_file))?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "curator=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(std::sync::Arc::new(log_file)),
        )
        .init();

    tracing::info!(log_file = %config.log_file, "Detailed log location");
    Ok(())
}

/// Runs the command; returns how many per-entry operations failed.
fn run(command: Command, config: &Config) -> Result<u32> {
    let library_root = Path::new(&config.library_path);

    match command {
        Command::Fetch { names } => {
            let client = TmdbClient::new(config)?;
            let mut prompter = ConsolePrompter;
            let summary = run_fetch(&client, &mut prompter, library_root, &names)?;
            tracing::info!(
                processed = summary.processed,
                failures = summary.failures,
                skipped = summary.skipped,
                "Fetch finished"
            );
            Ok(summary.failures)
        }
        Command::RenameImages { names, exclude } => {
            let targets = select_targets(library_root, &names, exclude)?;
            let mut prompter = ConsolePrompter;
            if !confirm_rename(&mut prompter, &targets) {
                tracing::info!("Cancelled");
                return Ok(0);
            }

            let mut failures = 0;
            for dir in &targets {
                match normalize_images(dir) {
                    Ok(summary) if summary.succeeded() => {}
                    Ok(summary) => failures += summary.failed as u32,
                    Err(e) => {
                        tracing::error!(
                            error = format!("{e:#}"),
                            dir = %dir.display(),
                            "Image normalization failed"
                        );
                        failures += 1;
                    }
                }
            }
            Ok(failures)
        }
        Command::Field {
            edit,
            names,
            exclude,
        } => {
            let targets = select_targets(library_root, &names, exclude)?;
            let mut failures = 0;
            for dir in &targets {
                if let Err(e) = edit_record_field(dir, &edit) {
                    tracing::error!(
                        error = format!("{e:#}"),
                        dir = %dir.display(),
                        "Field edit failed"
                    );
                    failures += 1;
                }
            }
            log_field_outcome(&edit, targets.len() as u32, failures);
            Ok(failures)
        }
    }
}

/// How a fetch pass went: acquired candidates, failed candidates, and
/// queries that ended with nothing selected.
#[derive(Debug, Default)]
struct FetchSummary {
    processed: u32,
    failures: u32,
    skipped: u32,
}

fn run_fetch(
    source: &dyn MetadataSource,
    prompter: &mut dyn Prompter,
    library_root: &Path,
    names: &[String],
) -> Result<FetchSummary> {
    std::fs::create_dir_all(library_root)
        .with_context(|| format!("Failed to create library root {}", library_root.display()))?;

    let mut summary = FetchSummary::default();
    for name in names {
        let candidates = resolve(source, prompter, name);
        if candidates.is_empty() {
            tracing::warn!(query = %name, "Nothing selected for query");
            summary.skipped += 1;
            continue;
        }
        for candidate in &candidates {
            match acquire(source, library_root, candidate) {
                Ok(()) => summary.processed += 1,
                Err(e) => {
                    tracing::error!(
                        error = format!("{e:#}"),
                        name = %candidate.name,
                        "Failed to process candidate"
                    );
                    summary.failures += 1;
                }
            }
        }
    }
    Ok(summary)
}

fn confirm_rename(prompter: &mut dyn Prompter, targets: &[std::path::PathBuf]) -> bool {
    if targets.is_empty() {
        tracing::info!("No entries to process");
        return false;
    }
    println!("About to rename images in {} entries:", targets.len());
    for dir in targets {
        println!("  {}", dir.display());
    }
    matches!(
        prompter.ask("Continue? (y/n): ").as_deref(),
        Some("y") | Some("Y")
    )
}

fn log_field_outcome(edit: &FieldEdit, total: u32, failures: u32) {
    let succeeded = total - failures;
    match edit {
        FieldEdit::Add { key, .. } => {
            tracing::info!(key = %key, succeeded, failures, "Field add pass finished")
        }
        FieldEdit::Delete { key } => {
            tracing::info!(key = %key, succeeded, failures, "Field delete pass finished")
        }
    }
}
