//! Locating the monitored agent in the process table.

use log::{debug, info};
use serde::Serialize;
use sysinfo::{PidExt, ProcessExt, ProcessRefreshKind, System, SystemExt};

/// A running instance of the monitored agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetProcess {
    pub name: String,
    pub pid: u32,
}

/// Find a process whose name is exactly `name`, preferring the oldest
/// (lowest pid) instance when several are running.
pub fn find_target_process(name: &str) -> Option<TargetProcess> {
    let mut system = System::new();
    system.refresh_processes_specifics(ProcessRefreshKind::new());

    let pid = system
        .processes_by_exact_name(name)
        .map(|process| process.pid().as_u32())
        .min();

    match pid {
        Some(pid) => {
            info!("Found target process {} (pid {})", name, pid);
            Some(TargetProcess {
                name: name.to_string(),
                pid,
            })
        }
        None => {
            debug!("No process named {} is running", name);
            None
        }
    }
}
