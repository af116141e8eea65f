//! Shared helpers for the integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashSet;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use anyhow::Result;
use zip::ZipArchive;

use perf_collector::collectors::runner::{
    CancelToken, CapturedOutput, CommandRunner, CommandSpec, RunResult,
};
use perf_collector::config::CollectorConfig;

pub const FULL_LISTING: &str = "\
  branch-misses                                      [Hardware event]
  context-switches OR cs                             [Software event]
  major-faults                                       [Software event]
  minor-faults                                       [Software event]
  block:block_rq_issue                               [Tracepoint event]
  sched:sched_process_exec                           [Tracepoint event]
  sched:sched_switch                                 [Tracepoint event]
  syscalls:sys_enter_openat                          [Tracepoint event]
";

/// A scripted stand-in for the host's tools.
///
/// Recording commands "succeed" by writing a small file at their `-o`
/// path (or their redirected stdout). Commands matching `fails` exit 1.
pub struct FakeRunner {
    pub listing: Option<String>,
    pub record_help: String,
    pub identity_output: Option<String>,
    pub available: HashSet<String>,
    fails: Box<dyn Fn(&CommandSpec) -> bool>,
    pub commands: RefCell<Vec<CommandSpec>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self {
            listing: Some(FULL_LISTING.to_string()),
            record_help: "    --proc-map-timeout <n>   per thread proc mmap processing timeout in ms".to_string(),
            identity_output: None,
            available: ["perf", "uname", "ps"].iter().map(|s| s.to_string()).collect(),
            fails: Box::new(|_| false),
            commands: RefCell::new(Vec::new()),
        }
    }

    pub fn failing_when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CommandSpec) -> bool + 'static,
    {
        self.fails = Box::new(predicate);
        self
    }

    pub fn without_listing(mut self) -> Self {
        self.listing = None;
        self
    }

    /// Recorded commands whose first argument is `subcommand`.
    pub fn perf_commands(&self, subcommand: &str) -> Vec<CommandSpec> {
        self.commands
            .borrow()
            .iter()
            .filter(|c| c.program == "perf" && c.args.first().map(String::as_str) == Some(subcommand))
            .cloned()
            .collect()
    }
}

impl CommandRunner for FakeRunner {
    fn capture(&self, cmd: &CommandSpec) -> Result<CapturedOutput> {
        self.commands.borrow_mut().push(cmd.clone());

        let args: Vec<&str> = cmd.args.iter().map(String::as_str).collect();
        let output = match (cmd.program.as_str(), args.as_slice()) {
            ("perf", ["list"]) => match &self.listing {
                Some(listing) => CapturedOutput { success: true, stdout: listing.clone(), stderr: String::new() },
                None => CapturedOutput { success: false, stdout: String::new(), stderr: "perf not working".into() },
            },
            ("perf", ["record", "-h"]) => CapturedOutput {
                success: false,
                stdout: String::new(),
                stderr: self.record_help.clone(),
            },
            ("perf", ["buildid-list", ..]) => CapturedOutput { success: true, ..Default::default() },
            _ => match &self.identity_output {
                Some(out) => CapturedOutput { success: true, stdout: out.clone(), stderr: String::new() },
                None => anyhow::bail!("{}: command not found", cmd.program),
            },
        };
        Ok(output)
    }

    fn run(&self, cmd: &CommandSpec, _cancel: &CancelToken) -> Result<RunResult> {
        self.commands.borrow_mut().push(cmd.clone());

        if (self.fails)(cmd) {
            return Ok(RunResult {
                exit_code: Some(1),
                interrupted: false,
                stderr_tail: "failed to open event".to_string(),
            });
        }

        let output = cmd
            .args
            .iter()
            .position(|a| a == "-o")
            .and_then(|i| cmd.args.get(i + 1))
            .map(PathBuf::from)
            .or_else(|| cmd.stdout.clone());
        if let Some(path) = output {
            fs::write(&path, format!("output of {}\n", cmd))?;
        }

        Ok(RunResult { exit_code: Some(0), ..Default::default() })
    }

    fn is_available(&self, program: &str) -> bool {
        self.available.contains(program)
    }
}

/// Config rooted in `root`: `root/work` and `root/out`.
pub fn config_in(root: &Path) -> CollectorConfig {
    CollectorConfig {
        work_dir: root.join("work").to_string_lossy().to_string(),
        output_dir: root.join("out").to_string_lossy().to_string(),
        ..CollectorConfig::default()
    }
}

pub fn archives_in(dir: &Path) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.extension().map_or(false, |ext| ext == "zip"))
                .collect()
        })
        .unwrap_or_default();
    found.sort();
    found
}

pub fn zip_entries(zip_path: &Path) -> Vec<String> {
    let mut archive = ZipArchive::new(File::open(zip_path).unwrap()).unwrap();
    (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect()
}

pub fn zip_read(zip_path: &Path, name: &str) -> String {
    use std::io::Read;

    let mut archive = ZipArchive::new(File::open(zip_path).unwrap()).unwrap();
    let mut entry = archive.by_name(name).unwrap();
    let mut content = String::new();
    entry.read_to_string(&mut content).unwrap();
    content
}
