//! External tool invocation.
//!
//! Every collector talks to the host through [`CommandRunner`], so the
//! planning and sequencing logic can be exercised without `perf` installed.

use std::fmt;
use std::fs::{self, File};
use std::io::Read;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use log::{debug, info, warn};

use crate::constants::CHILD_POLL_INTERVAL_MS;

/// Bytes of stderr kept from a finished child for error reporting
const STDERR_TAIL_BYTES: usize = 4096;

/// A fully-specified external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Where stdout is written; discarded when `None`
    pub stdout: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
            stdout: None,
        }
    }

    pub fn with_stdout(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdout = Some(path.into());
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        if let Some(out) = &self.stdout {
            write!(f, " > {}", out.display())?;
        }
        Ok(())
    }
}

/// Captured output of a short-lived query command.
#[derive(Debug, Clone, Default)]
pub struct CapturedOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Exit information of a long-running collection command.
#[derive(Debug, Clone, Default)]
pub struct RunResult {
    pub exit_code: Option<i32>,
    pub interrupted: bool,
    pub stderr_tail: String,
}

impl RunResult {
    /// An interrupted `perf record` still flushes a usable data file, so a
    /// SIGINT exit counts as success.
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0) || self.interrupted
    }

    pub fn describe_failure(&self) -> String {
        let status = match self.exit_code {
            Some(code) => format!("exit status {}", code),
            None => "terminated by signal".to_string(),
        };
        let tail = self.stderr_tail.trim();
        if tail.is_empty() {
            status
        } else {
            format!("{}: {}", status, tail)
        }
    }
}

/// Shared cancellation flag, set from the Ctrl-C handler.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Route SIGINT/SIGTERM into this token instead of killing the process,
    /// so the archive is still formed.
    pub fn install_signal_handler(&self) -> Result<()> {
        let token = self.clone();
        ctrlc::set_handler(move || {
            if !token.is_cancelled() {
                warn!("Interrupt received, shortening current task and finishing up");
            }
            token.cancel();
        })
        .context("Failed to install interrupt handler")
    }
}

#[cfg_attr(test, mockall::automock)]
pub trait CommandRunner {
    /// Run a query command to completion and capture its output.
    fn capture(&self, cmd: &CommandSpec) -> Result<CapturedOutput>;

    /// Run a collection command, honouring cancellation.
    fn run(&self, cmd: &CommandSpec, cancel: &CancelToken) -> Result<RunResult>;

    /// Whether `program` can be found on this host.
    fn is_available(&self, program: &str) -> bool;
}

/// [`CommandRunner`] backed by real child processes.
#[derive(Debug, Default, Clone)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }
}

impl CommandRunner for SystemRunner {
    fn capture(&self, cmd: &CommandSpec) -> Result<CapturedOutput> {
        debug!("Querying: {}", cmd);
        let output = Command::new(&cmd.program)
            .args(&cmd.args)
            .stdin(Stdio::null())
            .output()
            .context(format!("Failed to execute {}", cmd.program))?;

        Ok(CapturedOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    fn run(&self, cmd: &CommandSpec, cancel: &CancelToken) -> Result<RunResult> {
        info!("Running: {}", cmd);

        let stdout = match &cmd.stdout {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)
                        .context(format!("Failed to create directory: {}", parent.display()))?;
                }
                let file = File::create(path)
                    .context(format!("Failed to create output file {}", path.display()))?;
                Stdio::from(file)
            }
            None => Stdio::null(),
        };

        let mut child = Command::new(&cmd.program)
            .args(&cmd.args)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(Stdio::piped())
            .spawn()
            .context(format!("Failed to execute {}", cmd.program))?;

        // Drain stderr on a side thread so a chatty tool cannot fill the pipe
        let stderr_reader = child.stderr.take().map(|mut pipe| {
            thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = pipe.read_to_end(&mut buf);
                buf
            })
        });

        let mut interrupted = false;
        let status = loop {
            if let Some(status) = child
                .try_wait()
                .context(format!("Failed to wait for {}", cmd.program))?
            {
                break status;
            }

            if cancel.is_cancelled() && !interrupted {
                debug!("Sending SIGINT to {} (pid {})", cmd.program, child.id());
                let pid = libc::pid_t::try_from(child.id())
                    .map_err(|_| anyhow!("Child pid out of range"))?;
                // SAFETY: signalling a child we spawned and have not yet reaped
                unsafe {
                    libc::kill(pid, libc::SIGINT);
                }
                interrupted = true;
            }

            thread::sleep(Duration::from_millis(CHILD_POLL_INTERVAL_MS));
        };

        let stderr = stderr_reader
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();
        let start = stderr.len().saturating_sub(STDERR_TAIL_BYTES);

        Ok(RunResult {
            exit_code: status.code(),
            interrupted,
            stderr_tail: String::from_utf8_lossy(&stderr[start..]).to_string(),
        })
    }

    fn is_available(&self, program: &str) -> bool {
        Command::new("which")
            .arg(program)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_command_spec_display() {
        let spec = CommandSpec::new("perf", ["stat", "-a"]).with_stdout("/tmp/out.txt");
        assert_eq!(spec.to_string(), "perf stat -a > /tmp/out.txt");
    }

    #[test]
    fn test_cancel_token_shared_between_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_run_result_failure_description() {
        let result = RunResult {
            exit_code: Some(129),
            interrupted: false,
            stderr_tail: "unknown option\n".into(),
        };
        assert!(!result.succeeded());
        assert_eq!(result.describe_failure(), "exit status 129: unknown option");

        let interrupted = RunResult {
            exit_code: None,
            interrupted: true,
            stderr_tail: String::new(),
        };
        assert!(interrupted.succeeded());
    }

    #[test]
    fn test_system_runner_writes_stdout_to_file() {
        let temp_dir = TempDir::new().unwrap();
        let out = temp_dir.path().join("nested/echo.txt");
        let spec = CommandSpec::new("echo", ["hello"]).with_stdout(&out);

        let result = SystemRunner::new().run(&spec, &CancelToken::new()).unwrap();

        assert!(result.succeeded());
        assert_eq!(fs::read_to_string(&out).unwrap(), "hello\n");
    }

    #[test]
    fn test_system_runner_capture_reports_failure() {
        let spec = CommandSpec::new("sh", ["-c", "echo oops >&2; exit 3"]);
        let output = SystemRunner::new().capture(&spec).unwrap();
        assert!(!output.success);
        assert_eq!(output.stderr.trim(), "oops");
    }

    #[test]
    fn test_system_runner_missing_program_errors() {
        let spec = CommandSpec::new("definitely-not-a-real-tool-xyz", Vec::<String>::new());
        assert!(SystemRunner::new().capture(&spec).is_err());
        assert!(!SystemRunner::new().is_available("definitely-not-a-real-tool-xyz"));
    }

    #[test]
    fn test_system_runner_interrupts_on_cancel() {
        let token = CancelToken::new();
        token.cancel();
        let spec = CommandSpec::new("sleep", ["30"]);

        let started = std::time::Instant::now();
        let result = SystemRunner::new().run(&spec, &token).unwrap();

        assert!(result.interrupted);
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
