use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::config::env_vars::parse_unix_env_vars;
use crate::constants::{
    DEFAULT_PROC_MAP_TIMEOUT_MS, DEFAULT_SAMPLE_FREQUENCY, DEFAULT_TARGET_PROCESS, DEFAULT_WORK_DIR,
};

/// What to do when a collection task fails.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Note the failure in the working directory and run the remaining tasks
    #[default]
    Continue,
    /// Stop collecting; the archive is still formed
    Abort,
}

/// Where the archive's host identifiers come from.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct IdentityConfig {
    #[serde(default)]
    pub cid: Option<String>,
    #[serde(default)]
    pub aid: Option<String>,
    /// Command whose output contains `cid=...` / `aid=...` tokens
    #[serde(default)]
    pub query_command: Option<Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct CollectorConfig {
    pub work_dir: String,
    pub output_dir: String,
    pub target_process: String,
    pub sample_frequency: u32,
    pub proc_map_timeout_ms: u64,
    pub failure_policy: FailurePolicy,
    pub install_missing_tools: bool,
    pub identity: IdentityConfig,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            work_dir: DEFAULT_WORK_DIR.to_string(),
            output_dir: ".".to_string(),
            target_process: DEFAULT_TARGET_PROCESS.to_string(),
            sample_frequency: DEFAULT_SAMPLE_FREQUENCY,
            proc_map_timeout_ms: DEFAULT_PROC_MAP_TIMEOUT_MS,
            failure_policy: FailurePolicy::Continue,
            install_missing_tools: true,
            identity: IdentityConfig::default(),
        }
    }
}

impl CollectorConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        let config: CollectorConfig = serde_yaml::from_str(&content)
            .context("Failed to parse YAML config")?;

        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Save configuration to a YAML file
    pub fn save_to_yaml_file(&self, path: &Path) -> Result<()> {
        let yaml = serde_yaml::to_string(self)
            .context("Failed to serialize config to YAML")?;

        fs::write(path, yaml)
            .context(format!("Failed to write config to {}", path.display()))?;

        info!("Saved configuration to {}", path.display());
        Ok(())
    }

    /// Expand `$VAR` / `${VAR}` references in path settings
    pub fn process_environment_variables(&mut self) {
        if self.work_dir.contains('$') {
            self.work_dir = parse_unix_env_vars(&self.work_dir);
        }
        if self.output_dir.contains('$') {
            self.output_dir = parse_unix_env_vars(&self.output_dir);
        }
    }

    pub fn work_dir_path(&self) -> PathBuf {
        PathBuf::from(&self.work_dir)
    }

    pub fn output_dir_path(&self) -> PathBuf {
        PathBuf::from(&self.output_dir)
    }

    /// Create a default configuration YAML file
    pub fn create_default_config_file(path: &Path) -> Result<()> {
        CollectorConfig::default().save_to_yaml_file(path)
    }
}

/// Load a configuration file, or fall back to defaults.
///
/// A path that does not exist yet is populated with the defaults so the
/// operator has something to edit for the next run.
pub fn load_or_create_config(config_path: Option<&Path>) -> Result<CollectorConfig> {
    let mut config = match config_path {
        Some(path) if path.exists() => CollectorConfig::from_yaml_file(path)?,
        Some(path) => {
            info!("Creating default config at {}", path.display());
            let default_config = CollectorConfig::default();
            default_config.save_to_yaml_file(path)?;
            default_config
        }
        None => {
            debug!("No config path provided, using default configuration");
            CollectorConfig::default()
        }
    };

    config.process_environment_variables();
    Ok(config)
}
