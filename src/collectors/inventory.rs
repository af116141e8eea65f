//! Static host inventory snapshots.
//!
//! Each listing tool is run once, only if it exists on the host, with its
//! stdout captured into the working directory. A missing tool is not an
//! error; a failing tool is logged and collection moves on.

use std::path::Path;

use log::{debug, info, warn};

use crate::collectors::runner::{CancelToken, CommandRunner, CommandSpec};
use crate::models::InventoryOutcome;

/// One inventory listing: tool, its arguments, and the output file.
#[derive(Debug, Clone, Copy)]
pub struct InventoryListing {
    pub tool: &'static str,
    pub args: &'static [&'static str],
    pub artifact: &'static str,
}

pub const INVENTORY_LISTINGS: &[InventoryListing] = &[
    InventoryListing { tool: "lsmod", args: &[], artifact: "lsmod.txt" },
    InventoryListing { tool: "lsof", args: &["-n", "-P"], artifact: "lsof.txt" },
    InventoryListing { tool: "lsblk", args: &["-a"], artifact: "lsblk.txt" },
    InventoryListing { tool: "ps", args: &["auxww"], artifact: "ps.txt" },
    InventoryListing { tool: "uname", args: &["-a"], artifact: "uname.txt" },
];

pub struct InventoryCollector<'a> {
    runner: &'a dyn CommandRunner,
    listings: &'a [InventoryListing],
}

impl<'a> InventoryCollector<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self::with_listings(runner, INVENTORY_LISTINGS)
    }

    pub fn with_listings(runner: &'a dyn CommandRunner, listings: &'a [InventoryListing]) -> Self {
        Self { runner, listings }
    }

    /// Collect every available listing into `work_dir`.
    pub fn collect_all(&self, work_dir: &Path) -> Vec<InventoryOutcome> {
        info!("Collecting host inventory");

        let outcomes: Vec<InventoryOutcome> = self
            .listings
            .iter()
            .filter_map(|listing| self.collect_listing(listing, work_dir))
            .collect();

        info!(
            "Collected {} of {} inventory listings",
            outcomes.iter().filter(|o| o.collected).count(),
            self.listings.len()
        );
        outcomes
    }

    fn collect_listing(&self, listing: &InventoryListing, work_dir: &Path) -> Option<InventoryOutcome> {
        if !self.runner.is_available(listing.tool) {
            debug!("{} not found, skipping", listing.tool);
            return None;
        }

        let command = CommandSpec::new(listing.tool, listing.args.iter().copied())
            .with_stdout(work_dir.join(listing.artifact));

        // Inventory is quick and always runs to completion
        let error = match self.runner.run(&command, &CancelToken::new()) {
            Ok(result) if result.exit_code == Some(0) => None,
            Ok(result) => Some(result.describe_failure()),
            Err(e) => Some(format!("{:#}", e)),
        };

        if let Some(e) = &error {
            warn!("Inventory listing {} failed: {}", listing.tool, e);
        }

        Some(InventoryOutcome {
            tool: listing.tool.to_string(),
            artifact: listing.artifact.to_string(),
            collected: error.is_none(),
            error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::runner::{MockCommandRunner, RunResult};
    use mockall::predicate::{always, eq, function};

    #[test]
    fn test_missing_tools_are_skipped() {
        let mut runner = MockCommandRunner::new();
        runner.expect_is_available().with(eq("lsof")).return_const(false);
        runner.expect_is_available().return_const(true);
        runner
            .expect_run()
            .with(function(|cmd: &CommandSpec| cmd.program != "lsof"), always())
            .times(INVENTORY_LISTINGS.len() - 1)
            .returning(|_, _| Ok(RunResult { exit_code: Some(0), ..Default::default() }));

        let outcomes = InventoryCollector::new(&runner).collect_all(Path::new("/tmp/wd"));

        assert_eq!(outcomes.len(), INVENTORY_LISTINGS.len() - 1);
        assert!(outcomes.iter().all(|o| o.collected));
        assert!(!outcomes.iter().any(|o| o.tool == "lsof"));
    }

    #[test]
    fn test_failing_tool_recorded_and_collection_continues() {
        let listings = [
            InventoryListing { tool: "lsmod", args: &[], artifact: "lsmod.txt" },
            InventoryListing { tool: "ps", args: &["auxww"], artifact: "ps.txt" },
        ];
        let mut runner = MockCommandRunner::new();
        runner.expect_is_available().return_const(true);
        runner
            .expect_run()
            .with(function(|cmd: &CommandSpec| cmd.program == "lsmod"), always())
            .returning(|_, _| Ok(RunResult { exit_code: Some(1), stderr_tail: "no /proc/modules".into(), ..Default::default() }));
        runner
            .expect_run()
            .with(function(|cmd: &CommandSpec| cmd.program == "ps"), always())
            .returning(|_, _| Ok(RunResult { exit_code: Some(0), ..Default::default() }));

        let outcomes = InventoryCollector::with_listings(&runner, &listings).collect_all(Path::new("/tmp/wd"));

        assert_eq!(outcomes.len(), 2);
        assert!(!outcomes[0].collected);
        assert_eq!(outcomes[0].error.as_deref(), Some("exit status 1: no /proc/modules"));
        assert!(outcomes[1].collected);
    }
}
