//! Agent configuration stored under `.agents/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::types::Policy;
use crate::io::memory::DEFAULT_MEMORY_PATH;

/// Default config location, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = ".agents/config.toml";

/// Agent configuration (TOML).
///
/// Meant to be edited by hand. Missing fields take the same defaults as the
/// CLI; CLI flags override whatever the file sets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentConfig {
    pub policy: Policy,

    /// Maximum tool invocations per cycle; `0` disables the act stage.
    pub max_actions: u32,

    /// JSONL memory log path.
    pub memory_path: PathBuf,

    /// Tools active for the act stage.
    pub tools: Vec<String>,

    /// Tools offered to discovery for later cycles.
    pub catalog: Vec<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            policy: Policy::default(),
            max_actions: 1,
            memory_path: PathBuf::from(DEFAULT_MEMORY_PATH),
            tools: vec!["calculator".to_string()],
            catalog: vec![
                "read_file".to_string(),
                "write_file".to_string(),
                "openai_chat".to_string(),
            ],
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> Result<()> {
        let threshold = self.policy.critical_threshold;
        if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
            return Err(anyhow!(
                "policy.critical_threshold must be within [0, 1], got {threshold}"
            ));
        }
        if self.tools.iter().any(|name| name.trim().is_empty()) {
            return Err(anyhow!("tools must not contain empty names"));
        }
        if self.catalog.iter().any(|name| name.trim().is_empty()) {
            return Err(anyhow!("catalog must not contain empty names"));
        }
        if self.memory_path.as_os_str().is_empty() {
            return Err(anyhow!("memory_path must not be empty"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `AgentConfig::default()`.
pub fn load_config(path: &Path) -> Result<AgentConfig> {
    if !path.exists() {
        let cfg = AgentConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: AgentConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &AgentConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    if !parent.as_os_str().is_empty() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
