//! Cycle-scoped run context and the per-stage trace.
//!
//! A [`RunContext`] is created by `run_cycle`, handed to hooks by shared
//! reference (and to the act stage by `&mut`), and consumed into the result
//! trace when the cycle ends. It is deliberately not `Clone`.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::types::{Decision, DiscoveredTool, Draft, Gate, Policy, ToolMeta, ToolStatus};

/// Whether a stage was served by a caller hook or the built-in fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HookSource {
    Hook,
    Fallback,
}

/// One structured trace entry per stage, in execution order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum TraceEvent {
    Recall {
        present: bool,
        items: usize,
    },
    Draft {
        source: HookSource,
        draft: Draft,
    },
    Decide {
        source: HookSource,
        decision: Decision,
    },
    Discover {
        source: HookSource,
        candidates: Vec<DiscoveredTool>,
    },
    Act {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tool: Option<String>,
        status: ToolStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        meta: Option<ToolMeta>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    Reflect {
        present: bool,
        revised: bool,
    },
    Gate {
        source: HookSource,
        gate: Gate,
    },
    Finalize {
        source: HookSource,
        final_text: String,
    },
    Persist {
        present: bool,
        persisted: bool,
    },
}

impl TraceEvent {
    /// Stage name as written in the `step` tag.
    pub fn step(&self) -> &'static str {
        match self {
            Self::Recall { .. } => "recall",
            Self::Draft { .. } => "draft",
            Self::Decide { .. } => "decide",
            Self::Discover { .. } => "discover",
            Self::Act { .. } => "act",
            Self::Reflect { .. } => "reflect",
            Self::Gate { .. } => "gate",
            Self::Finalize { .. } => "finalize",
            Self::Persist { .. } => "persist",
        }
    }
}

/// Mutable state owned by exactly one cycle.
pub struct RunContext {
    task: String,
    policy: Policy,
    events: Vec<TraceEvent>,
    tools_active: Vec<String>,
    secrets: BTreeMap<String, BTreeMap<String, String>>,
}

impl RunContext {
    pub fn new(task: impl Into<String>, policy: Policy, tools_active: Vec<String>) -> Self {
        Self {
            task: task.into(),
            policy,
            events: Vec::new(),
            tools_active,
            secrets: BTreeMap::new(),
        }
    }

    pub fn task(&self) -> &str {
        &self.task
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    pub fn tools_active(&self) -> &[String] {
        &self.tools_active
    }

    /// Resolved secret `key` for `tool`, if the registry recorded one.
    pub fn secret(&self, tool: &str, key: &str) -> Option<&str> {
        self.secrets
            .get(tool)
            .and_then(|values| values.get(key))
            .map(String::as_str)
    }

    pub(crate) fn log(&mut self, event: TraceEvent) {
        self.events.push(event);
    }

    pub(crate) fn record_secrets(&mut self, tool: &str, values: BTreeMap<String, String>) {
        if values.is_empty() {
            return;
        }
        self.secrets
            .entry(tool.to_string())
            .or_default()
            .extend(values);
    }

    /// End the cycle, keeping only the trace.
    pub(crate) fn into_trace(self) -> Vec<TraceEvent> {
        self.events
    }
}

impl fmt::Debug for RunContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Secret values never leave the context; only their namespaces are shown.
        let redacted: BTreeMap<&str, Vec<&str>> = self
            .secrets
            .iter()
            .map(|(tool, values)| (tool.as_str(), values.keys().map(String::as_str).collect()))
            .collect();
        f.debug_struct("RunContext")
            .field("task", &self.task)
            .field("policy", &self.policy)
            .field("events", &self.events.len())
            .field("tools_active", &self.tools_active)
            .field("secrets", &redacted)
            .finish()
    }
}
