//! One archive per run, no matter how the run ends.
//!
//! The guard is created once the working directory exists. Calling
//! [`ArchiveGuard::finish`] forms the archive and reports its result; if the
//! guard is dropped without that (early `?` return or a panic unwinding
//! through the orchestrator) the archive is formed from `Drop` and any failure
//! is logged.

use std::path::{Path, PathBuf};

use anyhow::Result;
use log::{error, info};

use crate::error::CollectError;
use crate::models::HostIdentity;
use crate::utils::compress::create_archive;

pub struct ArchiveGuard {
    work_dir: PathBuf,
    output_dir: PathBuf,
    identity: HostIdentity,
    formed: bool,
}

impl ArchiveGuard {
    pub fn new(work_dir: &Path, output_dir: &Path, identity: HostIdentity) -> Self {
        Self {
            work_dir: work_dir.to_path_buf(),
            output_dir: output_dir.to_path_buf(),
            identity,
            formed: false,
        }
    }

    /// Form the archive now.
    pub fn finish(mut self) -> Result<PathBuf> {
        self.formed = true;
        create_archive(&self.work_dir, &self.output_dir, &self.identity)
            .map_err(|e| CollectError::Archive(format!("{:#}", e)).into())
    }
}

impl Drop for ArchiveGuard {
    fn drop(&mut self) {
        if self.formed {
            return;
        }
        self.formed = true;
        match create_archive(&self.work_dir, &self.output_dir, &self.identity) {
            Ok(path) => info!("Archive written to {}", path.display()),
            Err(e) => error!("Failed to create archive: {:#}", e),
        }
    }
}
