//! Collection planning.
//!
//! Turns a probed [`CapabilitySet`] into the ordered list of tasks the
//! executor will run. Planning is pure: the same inputs always produce the
//! same plan, and a task that needs instrumentation the host did not report
//! is never emitted as a recording (it degrades to a placeholder instead).

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::collectors::probe::CapabilitySet;
use crate::collectors::runner::CommandSpec;
use crate::collectors::target::TargetProcess;
use crate::constants::{
    COUNTERS_ARTIFACT, EXEC_DATA_ARTIFACT, EXEC_REPORT_ARTIFACT, EXEC_TRACEPOINT, PERF_TOOL,
    SYSTEM_DATA_ARTIFACT, TARGET_DATA_ARTIFACT, TARGET_REPORT_ARTIFACT,
};
use crate::models::TaskKind;

/// Capability tag → event group requested from `perf stat`, in plan order.
pub const EVENT_CATEGORIES: &[(&str, &str)] = &[
    ("sched:", "sched:*"),
    ("block:", "block:*"),
    ("kmem:", "kmem:*"),
    ("major-faults", "major-faults"),
    ("minor-faults", "minor-faults"),
    ("context-switches", "context-switches"),
    ("filelock:", "filelock:*"),
    ("filemap:", "filemap:*"),
    ("exceptions:", "exceptions:*"),
    ("module:", "module:*"),
    ("net:", "net:*"),
    ("power:", "power:*"),
    ("printk:", "printk:*"),
    ("rcu:", "rcu:*"),
    ("syscalls:", "syscalls:*"),
];

/// Knobs the planner needs beyond the capability set.
#[derive(Debug, Clone)]
pub struct PlanSettings {
    pub work_dir: PathBuf,
    pub duration: Duration,
    pub sample_frequency: u32,
    pub proc_map_timeout_ms: u64,
    pub target_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskAction {
    /// Run `command`; it is only valid on hosts reporting every entry of
    /// `required_capabilities`.
    Record {
        command: CommandSpec,
        required_capabilities: Vec<String>,
    },
    /// Write `note` to the task's artifact instead of recording.
    Placeholder { note: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionTask {
    pub kind: TaskKind,
    /// File name inside the working directory holding the task's result
    pub artifact: String,
    pub duration: Duration,
    pub action: TaskAction,
}

impl CollectionTask {
    pub fn required_capabilities(&self) -> &[String] {
        match &self.action {
            TaskAction::Record { required_capabilities, .. } => required_capabilities,
            TaskAction::Placeholder { .. } => &[],
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self.action, TaskAction::Placeholder { .. })
    }
}

/// Event groups from [`EVENT_CATEGORIES`] that the host reports, in table order.
pub fn select_event_groups(capabilities: &CapabilitySet) -> Vec<(&'static str, &'static str)> {
    EVENT_CATEGORIES
        .iter()
        .filter(|(tag, _)| capabilities.contains(tag))
        .copied()
        .collect()
}

/// Build the ordered collection plan.
///
/// Order: aggregate counters, exec trace, whole-system call graph,
/// target-process call graph. All four are always present.
pub fn plan_collection(
    capabilities: &CapabilitySet,
    target: Option<&TargetProcess>,
    settings: &PlanSettings,
) -> Vec<CollectionTask> {
    vec![
        plan_counters(capabilities, settings),
        plan_exec_trace(capabilities, settings),
        plan_system_call_graph(capabilities, settings),
        plan_target_call_graph(target, settings),
    ]
}

fn sleep_args(duration: Duration) -> [String; 3] {
    ["--".to_string(), "sleep".to_string(), duration.as_secs().to_string()]
}

fn artifact_path(work_dir: &Path, artifact: &str) -> String {
    work_dir.join(artifact).to_string_lossy().to_string()
}

fn plan_counters(capabilities: &CapabilitySet, settings: &PlanSettings) -> CollectionTask {
    let groups = select_event_groups(capabilities);
    let events = groups
        .iter()
        .map(|(_, group)| *group)
        .collect::<Vec<_>>()
        .join(",");

    let mut args = vec!["stat".to_string(), "-a".to_string()];
    // An empty `-e` is rejected by perf; fall back to its default counters
    if !events.is_empty() {
        args.push("-e".to_string());
        args.push(events);
    }
    args.push("-o".to_string());
    args.push(artifact_path(&settings.work_dir, COUNTERS_ARTIFACT));
    args.extend(sleep_args(settings.duration));

    CollectionTask {
        kind: TaskKind::Counters,
        artifact: COUNTERS_ARTIFACT.to_string(),
        duration: settings.duration,
        action: TaskAction::Record {
            command: CommandSpec::new(PERF_TOOL, args),
            required_capabilities: groups.iter().map(|(tag, _)| tag.to_string()).collect(),
        },
    }
}

fn plan_exec_trace(capabilities: &CapabilitySet, settings: &PlanSettings) -> CollectionTask {
    if !capabilities.contains(EXEC_TRACEPOINT) {
        return CollectionTask {
            kind: TaskKind::ExecTrace,
            artifact: EXEC_REPORT_ARTIFACT.to_string(),
            duration: Duration::ZERO,
            action: TaskAction::Placeholder {
                note: format!("{} tracepoint not available on this host", EXEC_TRACEPOINT),
            },
        };
    }

    let mut args: Vec<String> = vec![
        "record".into(),
        "-e".into(),
        EXEC_TRACEPOINT.into(),
        "-a".into(),
        "-g".into(),
        "-o".into(),
        artifact_path(&settings.work_dir, EXEC_DATA_ARTIFACT),
    ];
    args.extend(sleep_args(settings.duration));

    CollectionTask {
        kind: TaskKind::ExecTrace,
        artifact: EXEC_DATA_ARTIFACT.to_string(),
        duration: settings.duration,
        action: TaskAction::Record {
            command: CommandSpec::new(PERF_TOOL, args),
            required_capabilities: vec![EXEC_TRACEPOINT.to_string()],
        },
    }
}

fn plan_system_call_graph(capabilities: &CapabilitySet, settings: &PlanSettings) -> CollectionTask {
    let mut args: Vec<String> = vec![
        "record".into(),
        "-F".into(),
        settings.sample_frequency.to_string(),
        "-a".into(),
        "-g".into(),
    ];
    if capabilities.supports_proc_map_timeout {
        args.push("--proc-map-timeout".into());
        args.push(settings.proc_map_timeout_ms.to_string());
    }
    args.push("-o".into());
    args.push(artifact_path(&settings.work_dir, SYSTEM_DATA_ARTIFACT));
    args.extend(sleep_args(settings.duration));

    CollectionTask {
        kind: TaskKind::SystemCallGraph,
        artifact: SYSTEM_DATA_ARTIFACT.to_string(),
        duration: settings.duration,
        action: TaskAction::Record {
            command: CommandSpec::new(PERF_TOOL, args),
            required_capabilities: Vec::new(),
        },
    }
}

fn plan_target_call_graph(target: Option<&TargetProcess>, settings: &PlanSettings) -> CollectionTask {
    let Some(target) = target else {
        return CollectionTask {
            kind: TaskKind::TargetCallGraph,
            artifact: TARGET_REPORT_ARTIFACT.to_string(),
            duration: Duration::ZERO,
            action: TaskAction::Placeholder {
                note: format!("{} not running", settings.target_name),
            },
        };
    };

    let mut args: Vec<String> = vec![
        "record".into(),
        "-F".into(),
        settings.sample_frequency.to_string(),
        "-g".into(),
        "-p".into(),
        target.pid.to_string(),
        "-o".into(),
        artifact_path(&settings.work_dir, TARGET_DATA_ARTIFACT),
    ];
    args.extend(sleep_args(settings.duration));

    CollectionTask {
        kind: TaskKind::TargetCallGraph,
        artifact: TARGET_DATA_ARTIFACT.to_string(),
        duration: settings.duration,
        action: TaskAction::Record {
            command: CommandSpec::new(PERF_TOOL, args),
            required_capabilities: Vec::new(),
        },
    }
}
