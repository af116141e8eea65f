use std::path::Path;
use std::process;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, warn, LevelFilter};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

use perf_collector::cli::Args;
use perf_collector::collectors::runner::{CancelToken, SystemRunner};
use perf_collector::config::{load_or_create_config, CollectorConfig, FailurePolicy};
use perf_collector::error::exit_code_for;
use perf_collector::install::ensure_profiler;
use perf_collector::privileges::check_privileges;
use perf_collector::run::Collection;

fn main() {
    let args = Args::parse();

    if let Err(e) = initialize_logging(args.verbose) {
        eprintln!("{:#}", e);
    }

    let code = match run(&args) {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            exit_code_for(&e)
        }
    };
    process::exit(code);
}

/// Initialize logging based on verbosity level
fn initialize_logging(verbose: bool) -> Result<()> {
    let log_level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };
    TermLogger::init(
        log_level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )
    .context("Failed to initialize logger")?;
    Ok(())
}

/// Returns the exit status once a collection has run; errors before that
/// point are propagated.
fn run(args: &Args) -> Result<i32> {
    if let Some(path) = &args.init_config {
        info!("Creating default configuration file at {}", path.display());
        CollectorConfig::create_default_config_file(path)?;
        return Ok(0);
    }

    let config = load_and_apply_overrides(args)?;

    check_privileges(args.force)?;

    let runner = SystemRunner::new();
    ensure_profiler(&runner, config.install_missing_tools)?;

    let cancel = CancelToken::new();
    if let Err(e) = cancel.install_signal_handler() {
        warn!("{:#}", e);
    }

    info!("Starting perf collection ({}s)", args.duration);
    let outcome = Collection::new(&runner, config, Duration::from_secs(args.duration))
        .with_cancel(cancel)
        .run();

    if let Ok(report) = &outcome.collection {
        let failed = report.execution.failure_count();
        if failed > 0 {
            warn!("{} collection task(s) failed, see collection-errors.txt in the archive", failed);
        }
    }

    // The archive outcome is always the last thing reported
    let code = match &outcome.collection {
        Ok(_) => 0,
        Err(e) => {
            error!("{:#}", e);
            exit_code_for(e)
        }
    };
    match outcome.archive {
        Ok(path) => info!("Archive: {}", path.display()),
        Err(e) => {
            error!("{:#}", e);
            return Ok(code.max(exit_code_for(&e)));
        }
    }
    Ok(code)
}

/// Load configuration, then apply command-line overrides on top
fn load_and_apply_overrides(args: &Args) -> Result<CollectorConfig> {
    let mut config = load_or_create_config(args.config.as_deref())?;

    if let Some(dir) = &args.output_dir {
        config.output_dir = path_setting(dir);
    }
    if let Some(dir) = &args.work_dir {
        config.work_dir = path_setting(dir);
    }
    if let Some(name) = &args.target_process {
        config.target_process = name.clone();
    }
    if args.abort_on_task_failure {
        config.failure_policy = FailurePolicy::Abort;
    }
    if args.no_install {
        config.install_missing_tools = false;
    }

    Ok(config)
}

fn path_setting(path: &Path) -> String {
    path.to_string_lossy().to_string()
}
