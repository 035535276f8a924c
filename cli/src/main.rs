//! CLI entrypoint for Discovery Pipeline
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

use anyhow::{Context, Result, bail};
use clap::Parser;
use discovery_application::{
    CompositeRunEvents, DiscoveryConfig, RunDiscoveryInput, RunDiscoveryUseCase,
    RunEventNotifier,
};
use discovery_domain::{InterventionMode, RecoveryMode, RunStatus};
use discovery_infrastructure::{
    ConfigLoader, FileConfig, FileOutputFormat, JsonlRunEventLogger, ReplayCollaborator,
};
use discovery_presentation::{
    Cli, ConsoleFormatter, ConsoleReviewer, OutputFormat, ProgressReporter, SimpleProgress,
};
use std::io::IsTerminal;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Keep the guard alive so buffered log lines are flushed on exit
    let _log_guard = init_logging(&cli)?;

    if cli.show_config {
        ConfigLoader::print_config_sources(cli.config.as_deref());
        return Ok(ExitCode::SUCCESS);
    }

    info!("Starting Discovery Pipeline");

    // === Configuration ===
    let file_config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_deref()).context("Failed to load configuration")?
    };
    let mut config = file_config
        .into_discovery_config()
        .context("Invalid configuration")?;
    if cli.auto {
        config.policy.intervention_mode = InterventionMode::AutoContinue;
        config.policy.recovery_mode = RecoveryMode::AutoRetry;
    }

    let Some(query) = cli.query.clone() else {
        bail!("A query is required. Use --show-config to inspect configuration.");
    };
    let Some(transcript) = cli.transcript.as_deref() else {
        bail!("--transcript is required: candidates and scores are replayed from it.");
    };

    // === Dependency Injection ===
    let collaborator = Arc::new(
        ReplayCollaborator::from_file(transcript)
            .with_context(|| format!("Failed to load transcript {}", transcript.display()))?,
    );

    let notifier = build_notifier(&cli, &config);
    let cancel = CancellationToken::new();
    let use_case = RunDiscoveryUseCase::new(collaborator, config.clone())
        .with_notifier(notifier)
        .with_cancellation(cancel.clone());

    let handle = use_case.start(RunDiscoveryInput::new(query))?;
    info!(run = %handle.run_id(), "Run started");

    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nCancelling...");
            ctrl_c.cancel();
        }
    });

    if needs_reviewer(&config) {
        let reviewer = ConsoleReviewer::new(handle.control());
        tokio::spawn(reviewer.run());
    }

    let run = handle.wait().await?;

    // === Output ===
    if !file_config.output.color {
        colored::control::set_override(false);
    }
    let output = match output_format(&cli, &file_config) {
        OutputFormat::Summary => ConsoleFormatter::format(&run),
        OutputFormat::Json => ConsoleFormatter::format_json(&run),
    };
    println!("{}", output);

    Ok(match run.status() {
        RunStatus::Completed => ExitCode::SUCCESS,
        RunStatus::Cancelled => ExitCode::from(130),
        _ => ExitCode::FAILURE,
    })
}

/// Initialize logging based on verbosity level; `RUST_LOG` wins when set.
fn init_logging(cli: &Cli) -> Result<Option<WorkerGuard>> {
    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace", // -vvv or more
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let Some(path) = &cli.log_file else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
        return Ok(None);
    };

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| std::path::Path::new("."));
    let Some(file_name) = path.file_name() else {
        bail!("--log-file must name a file: {}", path.display());
    };
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

    let appender = tracing_appender::rolling::never(dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Ok(Some(guard))
}

fn build_notifier(cli: &Cli, config: &DiscoveryConfig) -> Arc<dyn RunEventNotifier> {
    let mut delegates: Vec<Arc<dyn RunEventNotifier>> = Vec::new();

    if !cli.quiet {
        if std::io::stderr().is_terminal() {
            delegates.push(Arc::new(ProgressReporter::new(&config.phases)));
        } else {
            delegates.push(Arc::new(SimpleProgress));
        }
    }

    if let Some(path) = &cli.events {
        match JsonlRunEventLogger::new(path) {
            Some(logger) => {
                info!("Writing run events to {}", logger.path().display());
                delegates.push(Arc::new(logger));
            }
            None => warn!("Run event log disabled: {}", path.display()),
        }
    }

    Arc::new(CompositeRunEvents::new(delegates))
}

/// A terminal reviewer is needed whenever a human may be asked something.
fn needs_reviewer(config: &DiscoveryConfig) -> bool {
    config.policy.intervention_mode == InterventionMode::Interactive
        || config.policy.recovery_mode == RecoveryMode::Interactive
}

fn output_format(cli: &Cli, file_config: &FileConfig) -> OutputFormat {
    cli.output.unwrap_or(match file_config.output.format {
        FileOutputFormat::Summary => OutputFormat::Summary,
        FileOutputFormat::Json => OutputFormat::Json,
    })
}
