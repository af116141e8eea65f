//! Capability probing.
//!
//! Asks perf once per run which events it can record and whether
//! `perf record` understands `--proc-map-timeout`.

use log::{debug, info, warn};
use serde::Serialize;

use crate::collectors::runner::{CommandRunner, CommandSpec};
use crate::constants::{PERF_TOOL, PROC_MAP_TIMEOUT_OPTION};

/// What the host's profiling subsystem reported as instrumentable.
///
/// The listing is kept verbatim; categories are matched as substrings
/// against it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CapabilitySet {
    #[serde(skip)]
    listing: String,
    pub supports_proc_map_timeout: bool,
}

impl CapabilitySet {
    pub fn new(listing: impl Into<String>, supports_proc_map_timeout: bool) -> Self {
        Self {
            listing: listing.into(),
            supports_proc_map_timeout,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn contains(&self, category: &str) -> bool {
        !category.is_empty() && self.listing.contains(category)
    }

    pub fn is_empty(&self) -> bool {
        self.listing.trim().is_empty()
    }

    pub fn listing(&self) -> &str {
        &self.listing
    }
}

/// Query the event listing and record options once for this run.
///
/// Never fails: an unusable query yields an empty set and the planner only
/// schedules what needs no capability.
pub fn probe_capabilities(runner: &dyn CommandRunner) -> CapabilitySet {
    let listing = match runner.capture(&CommandSpec::new(PERF_TOOL, ["list"])) {
        Ok(output) if output.success => output.stdout,
        Ok(output) => {
            warn!("perf list exited unsuccessfully: {}", output.stderr.trim());
            String::new()
        }
        Err(e) => {
            warn!("Unable to query perf event list: {}", e);
            String::new()
        }
    };

    // `perf record -h` prints usage and exits non-zero; only the text matters
    let supports_proc_map_timeout = match runner.capture(&CommandSpec::new(PERF_TOOL, ["record", "-h"])) {
        Ok(output) => {
            output.stdout.contains(PROC_MAP_TIMEOUT_OPTION)
                || output.stderr.contains(PROC_MAP_TIMEOUT_OPTION)
        }
        Err(e) => {
            debug!("Unable to query perf record options: {}", e);
            false
        }
    };

    let capabilities = CapabilitySet::new(listing, supports_proc_map_timeout);
    info!(
        "Probed capabilities: {} listing lines, proc-map-timeout {}",
        capabilities.listing.lines().count(),
        if supports_proc_map_timeout { "supported" } else { "unsupported" }
    );
    capabilities
}
