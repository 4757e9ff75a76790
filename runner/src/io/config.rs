//! Runner configuration stored in `banner-runner.toml` at the checkout root.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::trigger::DailySchedule;

/// Config file name, resolved relative to the working checkout.
pub const CONFIG_FILE: &str = "banner-runner.toml";

/// Runner configuration (TOML).
///
/// This file is intended to be edited by humans and must remain stable and
/// automatable. Missing fields default to sensible values. The commit
/// identity and message are deliberately not configurable; the trigger
/// surface (branch, schedule) is the knob set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RunnerConfig {
    /// Remote to fetch from and push to.
    pub remote: String,

    /// Branch the push trigger watches and the commit gate pushes to.
    pub branch: String,

    /// Daily schedule as a restricted cron expression (`"M H * * *"`).
    pub schedule: String,

    /// Watch-loop wake interval in seconds (remote polling cadence).
    pub poll_interval_secs: u64,

    /// Dependency manifest path, relative to the checkout root.
    pub manifest: String,

    /// Root of the content-addressed dependency cache store.
    pub cache_dir: String,

    /// Per-step wall-clock budget in seconds.
    pub step_timeout_secs: u64,

    /// Truncate step stdout/stderr beyond this many bytes.
    pub output_limit_bytes: usize,

    pub python: PythonConfig,
    pub generator: GeneratorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PythonConfig {
    /// Interpreter to provision and install with.
    pub interpreter: String,
    /// Required `major.minor` version prefix (e.g. `"3.12"`).
    pub version_pin: String,
}

impl Default for PythonConfig {
    fn default() -> Self {
        Self {
            interpreter: "python3".to_string(),
            version_pin: "3.12".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Command to execute for banner generation (e.g. `["python3","readme_gen.py"]`).
    pub command: Vec<String>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            command: vec!["python3".to_string(), "readme_gen.py".to_string()],
        }
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            remote: "origin".to_string(),
            branch: "main".to_string(),
            schedule: "0 6 * * *".to_string(),
            poll_interval_secs: 60,
            manifest: "requirements.txt".to_string(),
            cache_dir: ".banner-runner/cache".to_string(),
            step_timeout_secs: 10 * 60,
            output_limit_bytes: 100_000,
            python: PythonConfig::default(),
            generator: GeneratorConfig::default(),
        }
    }
}

impl RunnerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.remote.trim().is_empty() {
            return Err(anyhow!("remote must be non-empty"));
        }
        if self.branch.trim().is_empty() {
            return Err(anyhow!("branch must be non-empty"));
        }
        DailySchedule::parse(&self.schedule)?;
        if self.poll_interval_secs == 0 {
            return Err(anyhow!("poll_interval_secs must be > 0"));
        }
        if self.step_timeout_secs == 0 {
            return Err(anyhow!("step_timeout_secs must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        if self.manifest.trim().is_empty() {
            return Err(anyhow!("manifest must be non-empty"));
        }
        if self.python.interpreter.trim().is_empty() {
            return Err(anyhow!("python.interpreter must be non-empty"));
        }
        if self.python.version_pin.trim().is_empty() {
            return Err(anyhow!("python.version_pin must be non-empty"));
        }
        if self.generator.command.is_empty() || self.generator.command[0].trim().is_empty() {
            return Err(anyhow!("generator.command must be a non-empty array"));
        }
        Ok(())
    }

    /// Parsed daily schedule. Callers should have run [`Self::validate`] first;
    /// the parse error is propagated either way.
    pub fn daily_schedule(&self) -> Result<DailySchedule> {
        DailySchedule::parse(&self.schedule)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `RunnerConfig::default()`.
pub fn load_config(path: &Path) -> Result<RunnerConfig> {
    if !path.exists() {
        let cfg = RunnerConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: RunnerConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &RunnerConfig) -> Result<()> {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, RunnerConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(CONFIG_FILE);
        let cfg = RunnerConfig::default();
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn rejects_bad_schedule() {
        let cfg = RunnerConfig {
            schedule: "every day at six".to_string(),
            ..RunnerConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_empty_generator_command() {
        let cfg = RunnerConfig {
            generator: GeneratorConfig {
                command: Vec::new(),
            },
            ..RunnerConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
