//! One complete collection run, from an empty working directory to the
//! archive.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use chrono::Local;
use log::{info, warn};

use crate::archive::ArchiveGuard;
use crate::collectors::executor::{CollectionExecutor, ExecutionReport};
use crate::collectors::identity::resolve_identity;
use crate::collectors::inventory::InventoryCollector;
use crate::collectors::planner::{plan_collection, PlanSettings};
use crate::collectors::probe::{probe_capabilities, CapabilitySet};
use crate::collectors::runner::{CancelToken, CommandRunner};
use crate::collectors::target::{find_target_process, TargetProcess};
use crate::config::CollectorConfig;
use crate::error::CollectError;
use crate::models::{InventoryOutcome, RunContext};
use crate::utils::summary::{write_collection_summary, RunRecord};
use crate::utils::workdir::prepare_work_dir;

type TargetFinder = Box<dyn Fn(&str) -> Option<TargetProcess>>;

/// What a finished collection gathered.
#[derive(Debug)]
pub struct RunReport {
    pub context: RunContext,
    pub capabilities: CapabilitySet,
    pub target: Option<TargetProcess>,
    pub execution: ExecutionReport,
    pub inventory: Vec<InventoryOutcome>,
}

/// Result of [`Collection::run`].
///
/// The two halves are independent: a collection error never prevents the
/// archive from being formed, and the archive result is reported last.
#[derive(Debug)]
pub struct RunOutcome {
    pub collection: Result<RunReport>,
    pub archive: Result<PathBuf>,
}

pub struct Collection<'a> {
    runner: &'a dyn CommandRunner,
    config: CollectorConfig,
    duration: Duration,
    cancel: CancelToken,
    find_target: TargetFinder,
}

impl<'a> Collection<'a> {
    pub fn new(runner: &'a dyn CommandRunner, config: CollectorConfig, duration: Duration) -> Self {
        Self {
            runner,
            config,
            duration,
            cancel: CancelToken::new(),
            find_target: Box::new(find_target_process),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Replace the process-table lookup used to locate the target.
    pub fn with_target_finder<F>(mut self, finder: F) -> Self
    where
        F: Fn(&str) -> Option<TargetProcess> + 'static,
    {
        self.find_target = Box::new(finder);
        self
    }

    pub fn run(self) -> RunOutcome {
        let identity = resolve_identity(&self.config.identity, self.runner);
        let work_dir = self.config.work_dir_path();

        if let Err(e) = prepare_work_dir(&work_dir) {
            let reason = e.to_string();
            return RunOutcome {
                collection: Err(e.into()),
                archive: Err(CollectError::Archive(reason).into()),
            };
        }

        let guard = ArchiveGuard::new(&work_dir, &self.config.output_dir_path(), identity.clone());

        let context = RunContext {
            identity,
            duration: self.duration,
            work_dir,
        };
        let collection = self.collect(context);

        let archive = guard.finish();
        if let Ok(path) = &archive {
            info!("Archive written to {}", path.display());
        }

        RunOutcome { collection, archive }
    }

    fn collect(&self, context: RunContext) -> Result<RunReport> {
        let started_at = Local::now();
        info!(
            "Collecting for {}s into {}",
            context.duration_secs(),
            context.work_dir.display()
        );

        let capabilities = probe_capabilities(self.runner);
        let target = (self.find_target)(&self.config.target_process);

        let settings = PlanSettings {
            work_dir: context.work_dir.clone(),
            duration: context.duration,
            sample_frequency: self.config.sample_frequency,
            proc_map_timeout_ms: self.config.proc_map_timeout_ms,
            target_name: self.config.target_process.clone(),
        };
        let tasks = plan_collection(&capabilities, target.as_ref(), &settings);

        let executor = CollectionExecutor::new(
            self.runner,
            &context.work_dir,
            self.config.failure_policy,
            self.cancel.clone(),
        );
        let mut execution = executor.execute(&tasks);

        if let Some(aborted) = execution.aborted.take() {
            write_summary(&context, started_at, &capabilities, target.as_ref(), &execution, &[]);
            return Err(aborted.into());
        }

        let inventory = InventoryCollector::new(self.runner).collect_all(&context.work_dir);

        write_summary(&context, started_at, &capabilities, target.as_ref(), &execution, &inventory);

        Ok(RunReport {
            context,
            capabilities,
            target,
            execution,
            inventory,
        })
    }
}

fn write_summary(
    context: &RunContext,
    started_at: chrono::DateTime<Local>,
    capabilities: &CapabilitySet,
    target: Option<&TargetProcess>,
    execution: &ExecutionReport,
    inventory: &[InventoryOutcome],
) {
    let record = RunRecord {
        identity: &context.identity,
        duration_secs: context.duration_secs(),
        started_at,
        capabilities,
        target,
        tasks: &execution.outcomes,
        inventory,
        kallsyms_copied: execution.kallsyms_copied,
        mirrored: &execution.mirrored,
    };
    if let Err(e) = write_collection_summary(&context.work_dir, &record) {
        warn!("Failed to write collection summary: {:#}", e);
    }
}

