//! Test-only helpers: in-memory environments, scripted tools and a scratch
//! workspace for the memory log.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::anyhow;
use tempfile::TempDir;

use crate::core::context::RunContext;
use crate::core::types::{ToolArgs, ToolResult};
use crate::cycle::{CycleConfig, Toolbox};
use crate::io::env::EnvSource;
use crate::io::memory::{MemoryLog, MemoryRecord};
use crate::tools::{ToolOutput, ToolSpec, build_registry_by_names, make_tool_registry};

/// Environment source backed by the given pairs.
pub fn env_from(pairs: &[(&str, &str)]) -> Arc<dyn EnvSource> {
    let map: BTreeMap<String, String> = pairs
        .iter()
        .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
        .collect();
    Arc::new(map)
}

/// Tool that always returns `result` unchanged.
pub fn scripted_tool(name: &str, result: ToolResult) -> ToolSpec {
    ToolSpec::new(name, move |_: &ToolArgs, _: &RunContext| -> anyhow::Result<ToolOutput> {
        Ok(ToolOutput::Complete(result.clone()))
    })
}

/// Tool that always fails with `message`.
pub fn failing_tool(name: &str, message: &str) -> ToolSpec {
    let message = message.to_string();
    ToolSpec::new(name, move |_: &ToolArgs, _: &RunContext| -> anyhow::Result<ToolOutput> {
        Err(anyhow!(message.clone()))
    })
}

/// Toolbox with `active` specs and a catalog of built-in names.
pub fn toolbox_with(active: Vec<ToolSpec>, catalog: Vec<&str>, env: Arc<dyn EnvSource>) -> Toolbox {
    Toolbox::new(
        make_tool_registry(active, Arc::clone(&env)),
        build_registry_by_names(catalog, env),
    )
}

/// Scratch directory holding an isolated memory log.
pub struct TestWorkspace {
    dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("tempdir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn memory_path(&self) -> PathBuf {
        self.dir.path().join(".agents").join("memory.jsonl")
    }

    /// Default cycle config writing memory inside this workspace.
    pub fn cycle_config(&self) -> CycleConfig {
        CycleConfig {
            memory_path: self.memory_path(),
            ..CycleConfig::default()
        }
    }

    pub fn memory(&self) -> MemoryLog {
        MemoryLog::new(self.memory_path())
    }

    /// Every well-formed memory record, oldest first.
    pub fn records(&self) -> Vec<MemoryRecord> {
        self.memory().tail(usize::MAX).expect("read memory log")
    }
}

impl Default for TestWorkspace {
    fn default() -> Self {
        Self::new()
    }
}
