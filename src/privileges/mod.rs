#[cfg(unix)]
mod unix;

use anyhow::Result;
use log::{info, warn};

use crate::error::CollectError;

/// Check if the process is running with the privileges perf needs for
/// system-wide recording.
pub fn is_elevated() -> bool {
    #[cfg(unix)]
    {
        unix::is_root()
    }
    #[cfg(not(unix))]
    {
        false
    }
}

/// Get instructions for elevating privileges
pub fn get_elevation_instructions() -> &'static str {
    "Run with sudo: 'sudo ./perf-collector'"
}

/// Fail with [`CollectError::NotPrivileged`] unless running as root or
/// `force` is set.
pub fn check_privileges(force: bool) -> Result<()> {
    if is_elevated() {
        info!("Running as root");
        return Ok(());
    }

    if force {
        warn!("Running without root privileges - system-wide recording will likely fail");
        if let Some(level) = unix_paranoid_level() {
            warn!("kernel.perf_event_paranoid is {}", level);
        }
        return Ok(());
    }

    Err(CollectError::NotPrivileged(get_elevation_instructions()).into())
}

fn unix_paranoid_level() -> Option<i32> {
    #[cfg(unix)]
    {
        unix::perf_event_paranoid()
    }
    #[cfg(not(unix))]
    {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_force_always_passes() {
        assert!(check_privileges(true).is_ok());
    }

    #[test]
    fn test_check_matches_elevation() {
        let result = check_privileges(false);
        if is_elevated() {
            assert!(result.is_ok());
        } else {
            let err = result.unwrap_err();
            let typed = err.downcast_ref::<CollectError>().unwrap();
            assert_eq!(typed.exit_code(), 1);
        }
    }
}
