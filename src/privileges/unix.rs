use std::fs;

use log::debug;

const PERF_EVENT_PARANOID_PATH: &str = "/proc/sys/kernel/perf_event_paranoid";

/// Check if the process is running as root
pub fn is_root() -> bool {
    unsafe { libc::geteuid() == 0 }
}

/// Current `kernel.perf_event_paranoid` setting, if readable
pub fn perf_event_paranoid() -> Option<i32> {
    match fs::read_to_string(PERF_EVENT_PARANOID_PATH) {
        Ok(value) => value.trim().parse().ok(),
        Err(e) => {
            debug!("Unable to read {}: {}", PERF_EVENT_PARANOID_PATH, e);
            None
        }
    }
}
