use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::Serialize;
use uuid::Uuid;

use crate::collectors::probe::CapabilitySet;
use crate::collectors::target::TargetProcess;
use crate::constants::SUMMARY_ARTIFACT;
use crate::models::{HostIdentity, InventoryOutcome, MirroredFile, TaskOutcome};

/// Machine-readable record of one run, written next to the artifacts.
///
/// ```json
/// {
///   "collection_id": "550e8400-e29b-41d4-a716-446655440000",
///   "hostname": "web-01",
///   "identity": { "cid": "unset", "aid": "unset" },
///   "duration_secs": 60,
///   "started_at": "2024-01-15T14:30:52+00:00",
///   "finished_at": "2024-01-15T14:34:07+00:00",
///   "capabilities": { "event_listing_available": true, "supports_proc_map_timeout": true },
///   "target": { "name": "falcon-sensor", "pid": 812 },
///   "tasks": [...],
///   "inventory": [...],
///   "kallsyms_copied": true,
///   "mirrored": [...]
/// }
/// ```
#[derive(Serialize, Debug)]
pub struct CollectionSummary<'a> {
    pub collection_id: String,
    pub hostname: String,
    pub identity: &'a HostIdentity,
    pub duration_secs: u64,
    pub started_at: String,
    pub finished_at: String,
    pub capabilities: CapabilityFlags,
    pub target: Option<&'a TargetProcess>,
    pub tasks: &'a [TaskOutcome],
    pub inventory: &'a [InventoryOutcome],
    pub kallsyms_copied: bool,
    pub mirrored: &'a [MirroredFile],
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilityFlags {
    pub event_listing_available: bool,
    pub supports_proc_map_timeout: bool,
}

impl From<&CapabilitySet> for CapabilityFlags {
    fn from(caps: &CapabilitySet) -> Self {
        Self {
            event_listing_available: !caps.is_empty(),
            supports_proc_map_timeout: caps.supports_proc_map_timeout,
        }
    }
}

/// The pieces a run has gathered by the time it is summarized.
pub struct RunRecord<'a> {
    pub identity: &'a HostIdentity,
    pub duration_secs: u64,
    pub started_at: DateTime<Local>,
    pub capabilities: &'a CapabilitySet,
    pub target: Option<&'a TargetProcess>,
    pub tasks: &'a [TaskOutcome],
    pub inventory: &'a [InventoryOutcome],
    pub kallsyms_copied: bool,
    pub mirrored: &'a [MirroredFile],
}

fn local_hostname() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".to_string())
}

impl<'a> CollectionSummary<'a> {
    pub fn new(record: &RunRecord<'a>) -> Self {
        Self {
            collection_id: Uuid::new_v4().to_string(),
            hostname: local_hostname(),
            identity: record.identity,
            duration_secs: record.duration_secs,
            started_at: record.started_at.to_rfc3339(),
            finished_at: Local::now().to_rfc3339(),
            capabilities: CapabilityFlags::from(record.capabilities),
            target: record.target,
            tasks: record.tasks,
            inventory: record.inventory,
            kallsyms_copied: record.kallsyms_copied,
            mirrored: record.mirrored,
        }
    }
}

/// Render the summary as pretty JSON.
pub fn create_collection_summary(record: &RunRecord<'_>) -> Result<String> {
    serde_json::to_string_pretty(&CollectionSummary::new(record))
        .context("Failed to serialize collection summary")
}

/// Write `collection_summary.json` into the working directory.
pub fn write_collection_summary(work_dir: &Path, record: &RunRecord<'_>) -> Result<PathBuf> {
    let path = work_dir.join(SUMMARY_ARTIFACT);
    let json = create_collection_summary(record)?;
    fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}
