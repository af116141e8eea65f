use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::UNSET_IDENTIFIER;

/// The two opaque identifiers used to name the archive.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct HostIdentity {
    pub cid: String,
    pub aid: String,
}

impl HostIdentity {
    pub fn new(cid: Option<String>, aid: Option<String>) -> Self {
        let normalize = |value: Option<String>| {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| UNSET_IDENTIFIER.to_string())
        };
        Self {
            cid: normalize(cid),
            aid: normalize(aid),
        }
    }

    pub fn unset() -> Self {
        Self::new(None, None)
    }
}

/// Read-only facts about the current run.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub identity: HostIdentity,
    pub duration: Duration,
    pub work_dir: PathBuf,
}

impl RunContext {
    pub fn duration_secs(&self) -> u64 {
        self.duration.as_secs()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Counters,
    ExecTrace,
    SystemCallGraph,
    TargetCallGraph,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Counters => write!(f, "counters"),
            TaskKind::ExecTrace => write!(f, "exec-trace"),
            TaskKind::SystemCallGraph => write!(f, "system-call-graph"),
            TaskKind::TargetCallGraph => write!(f, "target-call-graph"),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum TaskStatus {
    Succeeded,
    Placeholder(String),
    Failed(String),
    Cancelled,
}

/// Result of running one planned task.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TaskOutcome {
    pub kind: TaskKind,
    pub artifact: String,
    #[serde(flatten)]
    pub status: TaskStatus,
    pub elapsed_ms: u128,
}

impl TaskOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self.status, TaskStatus::Failed(_))
    }
}

/// Result of one inventory listing.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct InventoryOutcome {
    pub tool: String,
    pub artifact: String,
    pub collected: bool,
    pub error: Option<String>,
}

/// A binary or library copied from the host for offline symbolization.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MirroredFile {
    pub original_path: String,
    pub build_id: String,
    pub file_size: u64,
    pub sha256: Option<String>,
}
