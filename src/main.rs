//! gitscribe - CLI entry point.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use gitscribe::config::Deadlines;
use gitscribe::interact::TerminalInteraction;
use gitscribe::llm::{Provider, ProviderSelection};
use gitscribe::message::validate::DEFAULT_MAX_HEADER_LENGTH;
use gitscribe::workflow::{ValidationEditMode, spawn_interrupt_handler};
use gitscribe::{
    ConventionalValidator, ExitOutcome, Git2Gateway, Orchestrator, RestorationStatus, RunOptions,
    RunReport, StageScope,
};

/// Write a conventional commit message with AI and commit.
#[derive(Parser, Debug)]
#[command(name = "gitscribe")]
#[command(about = "Write conventional commit messages with AI without losing your staging area")]
#[command(version)]
struct Cli {
    /// Also stage untracked files (default: tracked files only)
    #[arg(short = 'a', long)]
    all: bool,

    /// Skip AI generation and write the message manually
    #[arg(long)]
    no_ai: bool,

    /// Do not add a Signed-off-by trailer
    #[arg(long)]
    no_signoff: bool,

    /// Primary AI provider; the other one is used as fallback
    #[arg(long, value_enum, default_value_t = Provider::Claude)]
    provider: Provider,

    /// After a validation failure, edit from a blank message instead of the failing one
    #[arg(long)]
    blank_edit: bool,

    /// Maximum header length accepted by the validator
    #[arg(long, default_value_t = DEFAULT_MAX_HEADER_LENGTH)]
    max_header_length: usize,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn setup_logging(verbose: bool) {
    let level = if verbose { "gitscribe=debug" } else { "gitscribe=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match run(cli) {
        Ok(code) => {
            // Exit without dropping a runtime that may still own a blocked prompt thread.
            std::process::exit(code);
        }
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?;

    let gateway = Git2Gateway::discover(".")
        .context("Not a git repository. Run gitscribe from within a git repository.")?;

    let options = RunOptions {
        stage_scope: if cli.all {
            StageScope::ModifiedAndUntracked
        } else {
            StageScope::ModifiedOnly
        },
        skip_ai: cli.no_ai,
        omit_signoff: cli.no_signoff,
        provider: ProviderSelection::from_primary(cli.provider),
        validation_edit: if cli.blank_edit {
            ValidationEditMode::Blank
        } else {
            ValidationEditMode::Prefilled
        },
    };
    let deadlines = Deadlines::from_env();

    let orchestrator = Orchestrator::new(
        Arc::new(gateway),
        Arc::new(TerminalInteraction::new()),
        Arc::new(ConventionalValidator::new(cli.max_header_length)),
    )
    .with_deadlines(deadlines);

    let report = runtime.block_on(async {
        let cancel = CancellationToken::new();
        let handler = spawn_interrupt_handler(cancel.clone(), deadlines.exit, |code| {
            std::process::exit(code);
        });
        let report = orchestrator.run(options, cancel).await;
        handler.abort();
        report
    });

    print_report(&report);
    runtime.shutdown_timeout(Duration::from_millis(100));
    Ok(report.exit_code())
}

fn print_report(report: &RunReport) {
    match &report.outcome {
        ExitOutcome::Committed { commit_id } => println!("Committed {commit_id}"),
        ExitOutcome::AbortedByUser => println!("Aborted. No commit was made."),
        ExitOutcome::AbortedByError(err) => eprintln!("Error: {err}"),
        ExitOutcome::Interrupted => eprintln!("Interrupted. No commit was made."),
    }

    let status = &report.restoration;
    if status.needs_attention() {
        eprintln!("Warning: {status}");
    } else if matches!(status, RestorationStatus::Restored { .. }) {
        println!("{}", capitalize(&status.to_string()));
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
