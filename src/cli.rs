use clap::Parser;
use std::path::PathBuf;

use crate::constants::DEFAULT_DURATION_SECS;

/// Command-line arguments for perf-collector.
///
/// Values given here override the configuration file, which in turn
/// overrides the built-in defaults.
#[derive(Parser, Debug)]
#[clap(
    name = "perf-collector",
    about = "Record a time-bounded perf profile of this host and bundle it into one archive"
)]
pub struct Args {
    /// Seconds each time-bounded recording runs
    #[clap(
        default_value_t = DEFAULT_DURATION_SECS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub duration: u64,

    /// Verbose logging
    #[clap(short, long)]
    pub verbose: bool,

    /// Path to configuration YAML file
    #[clap(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Directory the archive is written to (default: current directory)
    #[clap(short = 'o', long)]
    pub output_dir: Option<PathBuf>,

    /// Scratch directory for artifacts; replaced at start
    #[clap(short = 'w', long)]
    pub work_dir: Option<PathBuf>,

    /// Process whose call graph is recorded
    #[clap(long)]
    pub target_process: Option<String>,

    /// Stop at the first failed task instead of continuing
    #[clap(long)]
    pub abort_on_task_failure: bool,

    /// Do not try to install perf when it is missing
    #[clap(long)]
    pub no_install: bool,

    /// Continue even without root privileges
    #[clap(long)]
    pub force: bool,

    /// Write a default configuration file to this path and exit
    #[clap(long, value_name = "PATH")]
    pub init_config: Option<PathBuf>,
}
