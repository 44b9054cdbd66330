#![warn(clippy::all)]

mod cli;
mod config;
mod error;
mod input;
mod output;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use logger::{LogOutput, Verbosity};
use probeup::{
    CheckpointStatus, CheckpointStore, Dispatcher, HttpProber, Job, Role, ScheduleLoop, Target,
    WorkerCommand, enumerate_jobs, launch_worker,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use cli::Cli;
use config::{Config, Monitor};
use error::AppError;
use output::FileSink;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let role = if cli.keep_an_eye { Role::detect() } else { Role::Original };
    let verbosity = Verbosity::from_flags(cli.verbose, cli.silent);

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            match role {
                Role::Original => eprintln!("Error: {e}"),
                Role::Worker => {
                    if init_worker_logging(None, verbosity) {
                        error!("{e}");
                    }
                }
            }
            return ExitCode::FAILURE;
        }
    };

    match role {
        Role::Original => {
            if let Err(e) = logger::init(LogOutput::Stderr, verbosity) {
                eprintln!("Warning: failed to initialize logging: {e}");
            }
        }
        Role::Worker => {
            // Nothing to report to: stdio is detached
            init_worker_logging(Some(&config.monitor.log_file), verbosity);
        }
    }

    match run(cli, config, role).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match role {
                Role::Worker => error!("{e:#}"),
                Role::Original => eprintln!("Error: {e:#}"),
            }
            ExitCode::FAILURE
        }
    }
}

/// Log files the worker tries in order: the configured one, then the default
fn worker_log_candidates(configured: Option<&Path>) -> Vec<PathBuf> {
    let fallback = Monitor::default().log_file;
    match configured {
        Some(path) if path != fallback => vec![path.to_path_buf(), fallback],
        _ => vec![fallback],
    }
}

/// Point logging at the first log file that opens; false when none does
fn init_worker_logging(configured: Option<&Path>, verbosity: Verbosity) -> bool {
    let mut failed: Vec<(PathBuf, std::io::Error)> = Vec::new();

    for path in worker_log_candidates(configured) {
        match logger::init(LogOutput::File(path.clone()), verbosity) {
            Ok(()) => {
                for (path, e) in failed {
                    warn!(log_file = %path.display(), "Failed to open log file: {e}");
                }
                return true;
            }
            Err(e) => failed.push((path, e)),
        }
    }

    false
}

async fn run(cli: Cli, config: Config, role: Role) -> Result<()> {
    debug!("{config}");
    let store = config.checkpoint_store();

    if cli.status {
        return report_status(&store);
    }

    if !cli.silent {
        println!("{}", output::BANNER);
    }

    let project_id = cli.project_id.as_deref().context("Project ID (-i) is required")?;
    let target =
        Target::resolve(project_id, cli.custom_url.as_deref()).map_err(AppError::from)?;
    let paths = input::collect_paths(cli.single_path.as_deref(), cli.path_list.as_deref())?;
    let methods = input::parse_methods(cli.methods.as_deref())?;
    let jobs = enumerate_jobs(&paths, &methods);

    if !cli.keep_an_eye {
        return run_once(&cli, &config, target, &jobs).await;
    }

    match role {
        Role::Original => launch_monitor(&cli, &config, &store),
        Role::Worker => run_monitor(&cli, &config, &store, target, &jobs).await,
    }
}

fn dispatcher(cli: &Cli, config: &Config, target: Target) -> Result<Dispatcher> {
    let prober = HttpProber::with_timeout_seconds(config.probe.timeout_seconds)
        .map_err(AppError::from)?;
    Ok(Dispatcher::new(Arc::new(prober), target, cli.concurrency()))
}

/// Probe everything once, print as results arrive, then summarize
async fn run_once(cli: &Cli, config: &Config, target: Target, jobs: &[Job]) -> Result<()> {
    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();
    let dispatcher = dispatcher(cli, config, target)?.with_progress(progress_tx);

    let live = !cli.silent;
    let printer = tokio::spawn(async move {
        while let Some(result) = progress_rx.recv().await {
            if live {
                output::print_live(&result);
            }
        }
    });

    let batch = dispatcher.run(jobs).await;
    drop(dispatcher);
    printer.await.context("result printer failed")?;

    if !cli.silent {
        if cli.verbose {
            output::print_details(&batch);
        }
        output::print_summary(&batch);
    }

    if let Some(path) = &cli.output {
        match output::append_results(path, &batch, cli.verbose) {
            Ok(()) if !cli.silent => println!("\nResults saved to: {}", path.display()),
            Ok(()) => {}
            // Probing already happened; losing the copy on disk is not fatal
            Err(e) => eprintln!("Error writing output file {}: {e}", path.display()),
        }
    }

    Ok(())
}

/// Start the background worker and return without waiting for it
fn launch_monitor(cli: &Cli, config: &Config, store: &CheckpointStore) -> Result<()> {
    let schedule = config.schedule();
    let (output_path, args) = cli::worker_args(std::env::args_os().skip(1), cli.output.as_deref());

    let command = WorkerCommand::current_exe(args).map_err(AppError::from)?;
    let report = launch_worker(&command, store, schedule.interval).map_err(AppError::from)?;

    println!("✓ Keep An Eye mode activated!");
    println!("✓ Background process started (PID: {})", report.pid);
    println!("✓ Monitoring for: {}", describe_duration(schedule.duration));
    println!("✓ Check interval: {}", describe_duration(schedule.interval));
    println!("✓ Output file: {}", output_path.display());
    println!("✓ Status file: {}\n", report.checkpoint_path.display());
    println!("To check status: firey --status (or cat {})", report.checkpoint_path.display());
    println!("To stop monitoring: kill {}", report.pid);

    Ok(())
}

/// Worker side: run the full schedule in this process
async fn run_monitor(
    cli: &Cli,
    config: &Config,
    store: &CheckpointStore,
    target: Target,
    jobs: &[Job],
) -> Result<()> {
    let output_path = cli.output.clone().unwrap_or_else(|| {
        let generated = cli::generated_output_path();
        warn!(output = %generated.display(), "Worker started without an output file");
        generated
    });

    let dispatcher = dispatcher(cli, config, target)?;
    let schedule =
        ScheduleLoop::new(&dispatcher, jobs, store, config.schedule()).map_err(AppError::from)?;

    info!(pid = std::process::id(), output = %output_path.display(), "Keep An Eye worker running");

    let mut sink = FileSink::new(output_path, cli.verbose);
    let summary = schedule.run(&mut sink).await;

    info!(
        iterations = summary.iterations,
        started = %summary.started_at,
        finished = %summary.finished_at,
        "Keep An Eye worker finished"
    );

    Ok(())
}

fn report_status(store: &CheckpointStore) -> Result<()> {
    let path = store.path().display();

    match store.status().map_err(AppError::from)? {
        CheckpointStatus::Absent => {
            println!("No monitor running ({path} not found)");
        }
        CheckpointStatus::Running(checkpoint) => {
            println!("Monitor running");
            println!("  PID: {}", checkpoint.pid);
            println!("  Started: {}", checkpoint.start_time);
            println!("  Iterations completed: {}", checkpoint.iteration);
            println!("  Next check: {}", checkpoint.next_check_time);
        }
        CheckpointStatus::Stale(checkpoint) => {
            println!("Stale checkpoint: process {} is no longer running", checkpoint.pid);
            println!("  Started: {}", checkpoint.start_time);
            println!("  Iterations completed: {}", checkpoint.iteration);
            println!("The monitor was stopped before finishing. Remove {path} to clear this.");
        }
    }

    Ok(())
}

fn describe_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    match secs {
        s if s >= 3600 && s % 3600 == 0 => plural(s / 3600, "hour"),
        s if s >= 60 && s % 60 == 0 => plural(s / 60, "minute"),
        s => plural(s, "second"),
    }
}

fn plural(count: u64, unit: &str) -> String {
    if count == 1 { format!("1 {unit}") } else { format!("{count} {unit}s") }
}
