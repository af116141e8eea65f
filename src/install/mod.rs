//! Profiling tool installation fallback.
//!
//! When `perf` is missing, the host distribution is classified once from
//! `/etc/os-release` and the matching package manager installs it. This is a
//! fixed fallback, not dependency resolution.

use std::fs;

use anyhow::Result;
use log::{info, warn};

use crate::collectors::runner::{CancelToken, CommandRunner, CommandSpec};
use crate::constants::PERF_TOOL;
use crate::error::CollectError;

const OS_RELEASE_PATH: &str = "/etc/os-release";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Distro {
    Ubuntu,
    Debian,
    RedHat,
    Suse,
}

/// Package-manager specific installation of the profiling tool.
pub trait Installer {
    fn name(&self) -> &'static str;
    fn install_command(&self, runner: &dyn CommandRunner) -> CommandSpec;
}

struct AptInstaller {
    ubuntu: bool,
}

impl Installer for AptInstaller {
    fn name(&self) -> &'static str {
        "apt-get"
    }

    fn install_command(&self, runner: &dyn CommandRunner) -> CommandSpec {
        let mut args = vec!["install".to_string(), "-y".to_string()];
        if self.ubuntu {
            args.push("linux-tools-common".to_string());
            // perf on Ubuntu is packaged per kernel release
            if let Some(release) = kernel_release(runner) {
                args.push(format!("linux-tools-{}", release));
            }
        } else {
            args.push("linux-perf".to_string());
        }
        CommandSpec::new("apt-get", args)
    }
}

struct RpmInstaller;

impl Installer for RpmInstaller {
    fn name(&self) -> &'static str {
        "dnf/yum"
    }

    fn install_command(&self, runner: &dyn CommandRunner) -> CommandSpec {
        let manager = if runner.is_available("dnf") { "dnf" } else { "yum" };
        CommandSpec::new(manager, ["install", "-y", "perf"])
    }
}

struct ZypperInstaller;

impl Installer for ZypperInstaller {
    fn name(&self) -> &'static str {
        "zypper"
    }

    fn install_command(&self, _runner: &dyn CommandRunner) -> CommandSpec {
        CommandSpec::new("zypper", ["--non-interactive", "install", "perf"])
    }
}

fn kernel_release(runner: &dyn CommandRunner) -> Option<String> {
    runner
        .capture(&CommandSpec::new("uname", ["-r"]))
        .ok()
        .filter(|output| output.success)
        .map(|output| output.stdout.trim().to_string())
        .filter(|release| !release.is_empty())
}

/// Classify a host from the contents of `/etc/os-release`.
pub fn classify_os_release(content: &str) -> Option<Distro> {
    let mut ids = Vec::new();
    for line in content.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        if key.trim() == "ID" || key.trim() == "ID_LIKE" {
            let value = value.trim().trim_matches('"').to_ascii_lowercase();
            ids.extend(value.split_whitespace().map(str::to_string));
        }
    }

    ids.iter().find_map(|id| match id.as_str() {
        "ubuntu" => Some(Distro::Ubuntu),
        "debian" => Some(Distro::Debian),
        "rhel" | "centos" | "fedora" | "amzn" | "rocky" | "almalinux" | "ol" => Some(Distro::RedHat),
        "suse" | "sles" | "opensuse" | "opensuse-leap" => Some(Distro::Suse),
        _ => None,
    })
}

pub fn installer_for(distro: Distro) -> Box<dyn Installer> {
    match distro {
        Distro::Ubuntu => Box::new(AptInstaller { ubuntu: true }),
        Distro::Debian => Box::new(AptInstaller { ubuntu: false }),
        Distro::RedHat => Box::new(RpmInstaller),
        Distro::Suse => Box::new(ZypperInstaller),
    }
}

/// Make sure `perf` is available, installing it if allowed.
pub fn ensure_profiler(runner: &dyn CommandRunner, allow_install: bool) -> Result<()> {
    let os_release = fs::read_to_string(OS_RELEASE_PATH).ok();
    ensure_profiler_with(runner, allow_install, os_release.as_deref())
}

pub fn ensure_profiler_with(
    runner: &dyn CommandRunner,
    allow_install: bool,
    os_release: Option<&str>,
) -> Result<()> {
    if runner.is_available(PERF_TOOL) {
        return Ok(());
    }

    if !allow_install {
        return Err(CollectError::ToolMissing(PERF_TOOL.to_string()).into());
    }

    let distro = os_release
        .and_then(classify_os_release)
        .ok_or_else(|| CollectError::UnsupportedOs(OS_RELEASE_PATH.to_string()))?;

    let installer = installer_for(distro);
    let command = installer.install_command(runner);
    info!("{} not found, installing with {}: {}", PERF_TOOL, installer.name(), command);

    match runner.run(&command, &CancelToken::new()) {
        Ok(result) if result.exit_code == Some(0) => {}
        Ok(result) => warn!("Installation failed: {}", result.describe_failure()),
        Err(e) => warn!("Installation failed: {:#}", e),
    }

    if runner.is_available(PERF_TOOL) {
        Ok(())
    } else {
        Err(CollectError::ToolMissing(PERF_TOOL.to_string()).into())
    }
}
