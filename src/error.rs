//! Error types that decide the process exit status.
//!
//! Most of the crate works with `anyhow::Result`; a `CollectError` is raised
//! only at the boundaries where the kind of failure changes what the operator
//! sees (exit code, final log line).

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CollectError {
    #[error("Root privileges required. {0}")]
    NotPrivileged(&'static str),

    #[error("Unable to classify host operating system for tool installation: {0}")]
    UnsupportedOs(String),

    #[error("Required tool '{0}' is not installed")]
    ToolMissing(String),

    #[error("Collection task '{task}' failed: {reason}")]
    TaskFailed { task: String, reason: String },

    #[error("Failed to prepare working directory {path}: {source}")]
    WorkDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create archive: {0}")]
    Archive(String),
}

impl CollectError {
    /// Exit status reported to the shell for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            CollectError::NotPrivileged(_)
            | CollectError::UnsupportedOs(_)
            | CollectError::ToolMissing(_) => 1,
            CollectError::TaskFailed { .. }
            | CollectError::WorkDir { .. }
            | CollectError::Archive(_) => 2,
        }
    }
}

/// Exit status for an arbitrary error bubbling out of the run.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<CollectError>()
        .map(CollectError::exit_code)
        .unwrap_or(2)
}
