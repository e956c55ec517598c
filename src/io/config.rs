//! Conductor configuration stored as TOML.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::io::process::EngineLimits;

/// Conductor configuration (TOML).
///
/// This file is intended to be edited by humans and must remain stable and
/// automatable. Missing fields default to sensible values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ConductorConfig {
    /// Total per-run wall-clock budget in seconds.
    pub run_timeout_secs: u64,

    /// Delay between a logical-completion event and child termination, in
    /// milliseconds.
    pub completion_grace_ms: u64,

    /// Bounded wait after a kill request before forcing, in milliseconds.
    pub kill_grace_ms: u64,

    /// Truncate retained executor stdout/stderr beyond this many bytes.
    pub output_limit_bytes: usize,

    /// Attempt budget per agent before the mission fails.
    pub max_attempts: u32,

    /// Attempt budget for plan resolution before mission creation fails.
    pub plan_attempts: u32,

    /// Emit a debug trace per protocol event.
    pub debug: bool,

    pub executor: ExecutorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Base argv for the external executor (e.g. `["codex","exec","--json"]`).
    pub command: Vec<String>,
    /// Arguments appended after the base argv on every invocation.
    pub extra_args: Vec<String>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            command: vec![
                "codex".to_string(),
                "exec".to_string(),
                "--json".to_string(),
                "--skip-git-repo-check".to_string(),
            ],
            extra_args: Vec::new(),
        }
    }
}

impl Default for ConductorConfig {
    fn default() -> Self {
        Self {
            run_timeout_secs: 30 * 60,
            completion_grace_ms: 150,
            kill_grace_ms: 2_000,
            output_limit_bytes: 1_000_000,
            max_attempts: 3,
            plan_attempts: 3,
            debug: false,
            executor: ExecutorConfig::default(),
        }
    }
}

impl ConductorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.run_timeout_secs == 0 {
            return Err(anyhow!("run_timeout_secs must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        if self.max_attempts == 0 {
            return Err(anyhow!("max_attempts must be > 0"));
        }
        if self.plan_attempts == 0 {
            return Err(anyhow!("plan_attempts must be > 0"));
        }
        if self.executor.command.is_empty() || self.executor.command[0].trim().is_empty() {
            return Err(anyhow!("executor.command must be a non-empty array"));
        }
        Ok(())
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }

    pub fn engine_limits(&self) -> EngineLimits {
        EngineLimits {
            completion_grace: Duration::from_millis(self.completion_grace_ms),
            kill_grace: Duration::from_millis(self.kill_grace_ms),
            output_limit_bytes: self.output_limit_bytes,
            debug: self.debug,
        }
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `ConductorConfig::default()`.
pub fn load_config(path: &Path) -> Result<ConductorConfig> {
    if !path.exists() {
        let cfg = ConductorConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: ConductorConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &ConductorConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
