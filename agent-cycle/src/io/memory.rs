//! Append-only JSONL memory log shared across cycles.
//!
//! Each record is one JSON object per line carrying a `type` tag and a `ts`
//! timestamp (epoch seconds). Records are written with a single `write_all`
//! on a file opened in append mode, so concurrent writers never interleave
//! partial lines.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::types::{DiscoveredTool, Gate};

/// Default log location, relative to the working directory.
pub const DEFAULT_MEMORY_PATH: &str = ".agents/memory.jsonl";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MemoryEvent {
    /// Tools proposed for a later cycle.
    ToolProposals {
        task: String,
        candidates: Vec<DiscoveredTool>,
    },
    /// Outcome of a finished cycle.
    Cycle {
        task: String,
        #[serde(rename = "final")]
        final_text: String,
        gate: Gate,
        discovered: Vec<DiscoveredTool>,
    },
}

/// A parsed log line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub ts: f64,
    #[serde(flatten)]
    pub event: MemoryEvent,
}

#[derive(Serialize)]
struct RecordRef<'a> {
    ts: f64,
    #[serde(flatten)]
    event: &'a MemoryEvent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryLog {
    path: PathBuf,
}

impl MemoryLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record stamped with the current time.
    pub fn append(&self, event: &MemoryEvent) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("create memory dir {}", parent.display()))?;
        }
        let record = RecordRef {
            ts: now_epoch_secs(),
            event,
        };
        let mut line = serde_json::to_string(&record).context("serialize memory record")?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("open memory log {}", self.path.display()))?;
        file.write_all(line.as_bytes())
            .with_context(|| format!("append to memory log {}", self.path.display()))?;
        debug!(path = %self.path.display(), "memory record appended");
        Ok(())
    }

    /// The last `n` well-formed records, oldest first. Malformed lines, invalid
    /// UTF-8 included, are skipped; a missing file yields an empty list.
    pub fn tail(&self, n: usize) -> Result<Vec<MemoryRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let contents = fs::read(&self.path)
            .with_context(|| format!("read memory log {}", self.path.display()))?;
        let records: Vec<MemoryRecord> = contents
            .split(|byte| *byte == b'\n')
            .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
            .filter(|line| !line.is_empty())
            .filter_map(|line| serde_json::from_slice(line).ok())
            .collect();
        let skip = records.len().saturating_sub(n);
        Ok(records.into_iter().skip(skip).collect())
    }
}

impl Default for MemoryLog {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_PATH)
    }
}

#[allow(clippy::cast_precision_loss)]
fn now_epoch_secs() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}
