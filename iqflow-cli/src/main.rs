//! Command-line front-end: parses arguments, loads a [`PipelineConfig`] from
//! TOML, wires Ctrl-C to cooperative cancellation, and drives an indicatif
//! bar off the pipeline's progress callback.

mod progress_bar;

use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre::{Context, Result};

use iqflow_core::cancellation::CancellationToken;
use iqflow_core::config::PipelineConfig;
use iqflow_core::orchestrator::{run, RunOptions, RunSummary};

#[derive(Parser, Debug)]
#[command(author, version, about = "Concurrent I/Q sample stream processor", long_about = None)]
struct Cli {
    /// Path to a TOML pipeline configuration.
    config: PathBuf,

    /// Initialize the source and sink, report what the run would do, and exit
    /// without processing any samples.
    #[arg(long)]
    dry_run: bool,

    /// Override `gain` from the config file.
    #[arg(long)]
    gain: Option<f32>,

    /// Suppress the progress bar (still logs start/end via tracing).
    #[arg(long)]
    no_progress: bool,
}

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn main() -> Result<()> {
    color_eyre::install()?;
    init_logging();
    let args = Cli::parse();

    let text = std::fs::read_to_string(&args.config)
        .wrap_err_with(|| format!("failed to read config file: {}", args.config.display()))?;
    let mut config: PipelineConfig = toml::from_str(&text).wrap_err("failed to parse pipeline configuration")?;
    if let Some(gain) = args.gain {
        config.gain = gain;
    }

    let cancel = CancellationToken::new();
    let ctrlc_cancel = cancel.clone();
    ctrlc::set_handler(move || {
        tracing::warn!("interrupt received, draining pipeline");
        ctrlc_cancel.cancel();
    })
    .wrap_err("failed to install Ctrl-C handler")?;

    let progress_callback = (!args.no_progress).then(|| progress_bar::callback());

    tracing::info!(config = %args.config.display(), dry_run = args.dry_run, "starting run");
    let opts = RunOptions {
        progress_callback,
        cancel,
        dry_run: args.dry_run,
    };
    let summary = run(config, opts)?;
    report(&summary);

    if summary.fatal_error.is_some() {
        std::process::exit(1);
    }
    Ok(())
}

fn report(summary: &RunSummary) {
    tracing::info!(
        mode = ?summary.mode,
        frames_written = summary.frames_written,
        bytes_written = summary.bytes_written,
        overruns = summary.overruns,
        discontinuities = summary.discontinuities,
        elapsed_ms = summary.elapsed.as_millis() as u64,
        "run complete"
    );
    if let Some(reason) = &summary.fatal_error {
        tracing::error!(reason, "pipeline terminated with a fatal error");
    }
}
