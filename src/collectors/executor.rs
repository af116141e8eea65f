//! Sequential execution of planned collection tasks.
//!
//! Besides running each recording, the executor renders `perf report`
//! output, mirrors the binaries the target profile references and snapshots
//! the kernel symbol table. Failures land in `collection-errors.txt`.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use log::{debug, error, info, warn};

use crate::collectors::planner::{CollectionTask, TaskAction};
use crate::collectors::runner::{CancelToken, CommandRunner, CommandSpec};
use crate::config::FailurePolicy;
use crate::constants::{
    ERRORS_ARTIFACT, EXEC_DATA_ARTIFACT, EXEC_REPORT_ARTIFACT, KALLSYMS_ARTIFACT, KALLSYMS_PATH,
    MAX_HASH_SIZE_MB, PERF_TOOL, SYSTEM_DATA_ARTIFACT, SYSTEM_REPORT_ARTIFACT,
    TARGET_DATA_ARTIFACT, TARGET_REPORT_ARTIFACT,
};
use crate::error::CollectError;
use crate::models::{MirroredFile, TaskKind, TaskOutcome, TaskStatus};
use crate::utils::hash::calculate_sha256;

/// Everything the executor produced.
#[derive(Debug, Default)]
pub struct ExecutionReport {
    pub outcomes: Vec<TaskOutcome>,
    pub mirrored: Vec<MirroredFile>,
    pub kallsyms_copied: bool,
    /// Set when [`FailurePolicy::Abort`] stopped the run; `outcomes` then
    /// holds the tasks that ran before it.
    pub aborted: Option<CollectError>,
}

impl ExecutionReport {
    pub fn failure_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_failure()).count()
    }
}

/// Runs planned tasks one after another.
///
/// Each recording holds the profiling subsystem for its whole duration, so
/// tasks are never overlapped.
pub struct CollectionExecutor<'a> {
    runner: &'a dyn CommandRunner,
    work_dir: PathBuf,
    policy: FailurePolicy,
    cancel: CancelToken,
}

impl<'a> CollectionExecutor<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        work_dir: impl Into<PathBuf>,
        policy: FailurePolicy,
        cancel: CancelToken,
    ) -> Self {
        Self {
            runner,
            work_dir: work_dir.into(),
            policy,
            cancel,
        }
    }

    /// Execute `tasks` in order.
    ///
    /// With [`FailurePolicy::Continue`] a failed task is noted in
    /// `collection-errors.txt` and the next task runs; with
    /// [`FailurePolicy::Abort`] the first failure stops the loop and is kept
    /// in [`ExecutionReport::aborted`]. The kernel symbol snapshot is taken
    /// either way.
    pub fn execute(&self, tasks: &[CollectionTask]) -> ExecutionReport {
        let mut report = ExecutionReport::default();

        for task in tasks {
            let outcome = self.execute_task(task, &mut report);
            let abort_reason = match &outcome.status {
                TaskStatus::Failed(reason) if self.policy == FailurePolicy::Abort => Some(reason.clone()),
                _ => None,
            };
            report.outcomes.push(outcome);

            if let Some(reason) = abort_reason {
                report.aborted = Some(CollectError::TaskFailed {
                    task: task.kind.to_string(),
                    reason,
                });
                break;
            }
        }

        report.kallsyms_copied = self.snapshot_kallsyms();

        info!(
            "Executed {} tasks ({} failed)",
            report.outcomes.len(),
            report.failure_count()
        );
        report
    }

    fn execute_task(&self, task: &CollectionTask, report: &mut ExecutionReport) -> TaskOutcome {
        let start = Instant::now();

        let status = match &task.action {
            TaskAction::Placeholder { note } => {
                info!("Task {}: {}", task.kind, note);
                match self.write_placeholder(&task.artifact, note) {
                    Ok(()) => TaskStatus::Placeholder(note.clone()),
                    Err(e) => {
                        let reason = format!("{:#}", e);
                        self.record_failure(&task.kind.to_string(), &reason);
                        TaskStatus::Failed(reason)
                    }
                }
            }
            TaskAction::Record { .. } if self.cancel.is_cancelled() => {
                info!("Skipping task {} after interrupt", task.kind);
                TaskStatus::Cancelled
            }
            TaskAction::Record { command, .. } => {
                info!("Collecting {} for {}s", task.kind, task.duration.as_secs());
                match self.run_recording(command) {
                    Ok(()) => {
                        self.post_process(task.kind, report);
                        TaskStatus::Succeeded
                    }
                    Err(reason) => {
                        self.record_failure(&task.kind.to_string(), &reason);
                        TaskStatus::Failed(reason)
                    }
                }
            }
        };

        TaskOutcome {
            kind: task.kind,
            artifact: task.artifact.clone(),
            status,
            elapsed_ms: start.elapsed().as_millis(),
        }
    }

    fn run_recording(&self, command: &CommandSpec) -> std::result::Result<(), String> {
        match self.runner.run(command, &self.cancel) {
            Ok(result) if result.succeeded() => Ok(()),
            Ok(result) => Err(result.describe_failure()),
            Err(e) => Err(format!("{:#}", e)),
        }
    }

    fn write_placeholder(&self, artifact: &str, note: &str) -> Result<()> {
        let path = self.work_dir.join(artifact);
        fs::write(&path, format!("{}\n", note))
            .context(format!("Failed to write placeholder {}", path.display()))
    }

    /// Append a diagnostic line to the run's error log; never fails the run.
    fn record_failure(&self, task: &str, reason: &str) {
        error!("Task {} failed: {}", task, reason);

        let path = self.work_dir.join(ERRORS_ARTIFACT);
        let line = format!("{} {}: {}\n", chrono::Utc::now().to_rfc3339(), task, reason);
        let written = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .and_then(|mut file| file.write_all(line.as_bytes()));

        if let Err(e) = written {
            warn!("Failed to record task failure in {}: {}", path.display(), e);
        }
    }

    /// Render raw recordings into readable reports next to them.
    fn post_process(&self, kind: TaskKind, report: &mut ExecutionReport) {
        let (data, output, extra): (&str, &str, &[&str]) = match kind {
            TaskKind::Counters => return,
            TaskKind::ExecTrace => (EXEC_DATA_ARTIFACT, EXEC_REPORT_ARTIFACT, &[]),
            TaskKind::SystemCallGraph => (SYSTEM_DATA_ARTIFACT, SYSTEM_REPORT_ARTIFACT, &[]),
            TaskKind::TargetCallGraph => (
                TARGET_DATA_ARTIFACT,
                TARGET_REPORT_ARTIFACT,
                &["--no-children", "-g", "folded"],
            ),
        };

        let data_path = self.work_dir.join(data);
        let mut args = vec![
            "report".to_string(),
            "-i".to_string(),
            data_path.to_string_lossy().to_string(),
            "--stdio".to_string(),
        ];
        args.extend(extra.iter().map(|a| a.to_string()));
        let command = CommandSpec::new(PERF_TOOL, args).with_stdout(self.work_dir.join(output));

        // Reports are rendered even after an interrupt
        let result = self.runner.run(&command, &CancelToken::new());
        match result {
            Ok(r) if r.succeeded() => debug!("Rendered {}", output),
            Ok(r) => self.record_failure(&format!("{} report", kind), &r.describe_failure()),
            Err(e) => self.record_failure(&format!("{} report", kind), &format!("{:#}", e)),
        }

        if kind == TaskKind::TargetCallGraph {
            report.mirrored = self.mirror_referenced_objects(&data_path);
        }
    }

    /// Copy every binary referenced by the recording into the working
    /// directory under its absolute path, for symbolization elsewhere.
    fn mirror_referenced_objects(&self, data_path: &Path) -> Vec<MirroredFile> {
        let command = CommandSpec::new(
            PERF_TOOL,
            ["buildid-list".to_string(), "-i".to_string(), data_path.to_string_lossy().to_string()],
        );

        let listing = match self.runner.capture(&command) {
            Ok(output) if output.success => output.stdout,
            Ok(output) => {
                self.record_failure("buildid-list", output.stderr.trim());
                return Vec::new();
            }
            Err(e) => {
                self.record_failure("buildid-list", &format!("{:#}", e));
                return Vec::new();
            }
        };

        let mut mirrored = Vec::new();
        for (build_id, source) in parse_build_id_list(&listing) {
            let source = Path::new(source);
            if !source.is_file() {
                debug!("Referenced object {} no longer exists, skipping", source.display());
                continue;
            }

            let dest = mirror_destination(&self.work_dir, source);
            match copy_preserving_parents(source, &dest) {
                Ok(file_size) => {
                    let sha256 = calculate_sha256(&dest, MAX_HASH_SIZE_MB).ok().flatten();
                    mirrored.push(MirroredFile {
                        original_path: source.to_string_lossy().to_string(),
                        build_id: build_id.to_string(),
                        file_size,
                        sha256,
                    });
                }
                Err(e) => debug!("Failed to mirror {}: {:#}", source.display(), e),
            }
        }

        info!("Mirrored {} referenced objects", mirrored.len());
        mirrored
    }

    fn snapshot_kallsyms(&self) -> bool {
        match fs::copy(KALLSYMS_PATH, self.work_dir.join(KALLSYMS_ARTIFACT)) {
            Ok(_) => true,
            Err(e) => {
                debug!("Unable to copy {}: {}", KALLSYMS_PATH, e);
                false
            }
        }
    }
}

/// Parse `perf buildid-list` output into `(build_id, absolute_path)` pairs.
///
/// Pseudo objects such as `[kernel.kallsyms]` and `[vdso]` are dropped.
pub fn parse_build_id_list(listing: &str) -> Vec<(&str, &str)> {
    listing
        .lines()
        .filter_map(|line| {
            let (build_id, path) = line.trim().split_once(char::is_whitespace)?;
            let path = path.trim();
            path.starts_with('/').then_some((build_id, path))
        })
        .collect()
}

/// `/usr/lib/libc.so.6` under `work_dir` becomes `work_dir/usr/lib/libc.so.6`.
pub fn mirror_destination(work_dir: &Path, source: &Path) -> PathBuf {
    let relative = source.to_string_lossy();
    work_dir.join(relative.trim_start_matches('/'))
}

fn copy_preserving_parents(source: &Path, dest: &Path) -> Result<u64> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)
            .context(format!("Failed to create directory: {}", parent.display()))?;
    }
    fs::copy(source, dest).context(format!("Failed to copy {}", source.display()))
}
