//! # perf-collector
//!
//! Records a time-bounded performance profile of a Linux host with `perf`,
//! snapshots a few static inventory listings, and packages everything into
//! a single zip archive named after the host's identifiers.
//!
//! ## Overview
//!
//! A run goes through four stages:
//!
//! 1. probe which events the host's perf can record
//! 2. plan the counter, exec-trace, system and target call-graph tasks
//! 3. execute the tasks one at a time, then the inventory listings
//! 4. archive the working directory, exactly once, however the run ended
//!
//! ## Usage
//!
//! ```no_run
//! use std::time::Duration;
//! use perf_collector::collectors::runner::SystemRunner;
//! use perf_collector::config::CollectorConfig;
//! use perf_collector::run::Collection;
//!
//! let runner = SystemRunner::new();
//! let outcome = Collection::new(&runner, CollectorConfig::default(), Duration::from_secs(10)).run();
//!
//! if let Ok(path) = &outcome.archive {
//!     println!("Archive at {}", path.display());
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`cli`]: Command-line interface definitions
//! - [`collectors`]: Probing, planning, execution and inventory
//! - [`run`]: The orchestrator tying one run together
//! - [`archive`]: Guard that forms the archive on every exit path
//! - [`config`]: YAML configuration
//! - [`install`]: Installs perf when it is missing
//! - [`privileges`]: Root check
//! - [`utils`]: Compression, hashing, summary and working directory helpers

/// Command-line interface definitions and argument parsing
pub mod cli;

/// Core data models shared across the collectors
pub mod models;

/// Capability probing, planning, execution and inventory
pub mod collectors;

/// Utility functions for compression, hashing, and file operations
pub mod utils;

/// Configuration management
pub mod config;

/// Privilege checks
pub mod privileges;

/// Profiling tool installation
pub mod install;

/// Application constants
pub mod constants;

/// Error kinds that determine the exit status
pub mod error;

/// One archive per run
pub mod archive;

/// Run orchestration
pub mod run;
