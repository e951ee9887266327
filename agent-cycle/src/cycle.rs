//! Single-pass cycle orchestration.
//!
//! `run_cycle` sequences the fixed stages (recall, draft, decide, discover,
//! act, reflect, gate, finalize, persist), threads one [`RunContext`]
//! through them and assembles a [`CycleResult`]. Every stage appends exactly
//! one trace event. Nothing a hook or tool does aborts the cycle.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::core::context::{RunContext, TraceEvent};
use crate::core::types::{Decision, DiscoveredTool, Gate, Policy, ToolResult, ToolStatus};
use crate::hooks::{CycleView, FinalizeRequest, Hooks, PersistRequest};
use crate::io::config::AgentConfig;
use crate::io::env::ProcessEnv;
use crate::io::memory::{DEFAULT_MEMORY_PATH, MemoryEvent, MemoryLog};
use crate::tools::builtin::CALCULATOR;
use crate::tools::{ToolRegistry, build_registry_by_names};

/// Tools available to one cycle.
#[derive(Debug)]
pub struct Toolbox {
    /// Tools the act stage may invoke.
    pub active: ToolRegistry,
    /// Tools discovery may propose for later cycles. Never invoked.
    pub catalog: ToolRegistry,
}

impl Toolbox {
    pub fn new(active: ToolRegistry, catalog: ToolRegistry) -> Self {
        Self { active, catalog }
    }
}

impl Default for Toolbox {
    fn default() -> Self {
        Self {
            active: build_registry_by_names([CALCULATOR], Arc::new(ProcessEnv)),
            catalog: ToolRegistry::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CycleConfig {
    pub policy: Policy,
    /// Tool invocations allowed this cycle; `0` disables the act stage.
    pub max_actions: u32,
    pub memory_path: PathBuf,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            policy: Policy::default(),
            max_actions: 1,
            memory_path: PathBuf::from(DEFAULT_MEMORY_PATH),
        }
    }
}

impl From<&AgentConfig> for CycleConfig {
    fn from(config: &AgentConfig) -> Self {
        Self {
            policy: config.policy.clone(),
            max_actions: config.max_actions,
            memory_path: config.memory_path.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleResult {
    pub final_text: String,
    /// Whether the decision asked for a tool (not whether one ran).
    pub used_tool: bool,
    pub discovered: Vec<DiscoveredTool>,
    pub gate: Gate,
    pub trace: Vec<TraceEvent>,
}

impl CycleResult {
    /// True when the gate intervened and nobody allowed continuing.
    pub fn blocked(&self) -> bool {
        !self.gate.allows_continue()
    }
}

const NO_TOOL_REQUESTED: &str = "no tool requested";
const BUDGET_EXHAUSTED: &str = "action budget exhausted";
const TOOL_MISSING: &str = "tool missing";

/// Run one pass of the agent cycle for `task`.
#[instrument(skip_all, fields(max_actions = config.max_actions, gate_mode = ?config.policy.gate_mode))]
pub fn run_cycle(task: &str, hooks: &Hooks, toolbox: &Toolbox, config: &CycleConfig) -> CycleResult {
    let memory = MemoryLog::new(&config.memory_path);
    let policy = &config.policy;
    let mut ctx = RunContext::new(
        task,
        policy.clone(),
        toolbox.active.names().map(str::to_string).collect(),
    );
    debug!(tools = ?ctx.tools_active(), "cycle started");

    let recalled = hooks.recall(task, &ctx);
    ctx.log(TraceEvent::Recall {
        present: recalled.is_some(),
        items: recalled.as_ref().map_or(0, Vec::len),
    });

    let (draft, source) = hooks.draft(task, &ctx);
    ctx.log(TraceEvent::Draft {
        source,
        draft: draft.clone(),
    });

    let (decision, source) = hooks.decide(task, &draft, &ctx);
    ctx.log(TraceEvent::Decide {
        source,
        decision: decision.clone(),
    });

    let (discovered, source) = hooks.discover_tools(task, &decision, &ctx, &toolbox.catalog);
    ctx.log(TraceEvent::Discover {
        source,
        candidates: discovered.clone(),
    });
    if !discovered.is_empty() {
        let proposals = MemoryEvent::ToolProposals {
            task: task.to_string(),
            candidates: discovered.clone(),
        };
        if let Err(err) = memory.append(&proposals) {
            warn!(error = %format!("{err:#}"), "failed to record tool proposals");
        }
    }

    let outcome = act(&decision, toolbox, config.max_actions, &mut ctx);
    let tool_status = outcome.as_ref().map(|result| result.status);
    let tool_output = outcome.as_ref().and_then(ToolResult::output);

    let reflected = hooks.reflect(&CycleView {
        task,
        draft: &draft,
        decision: &decision,
        tool_status,
        tool_output: tool_output.as_ref(),
        ctx: &ctx,
    });
    let present = reflected.is_some();
    let revised = reflected.flatten().filter(|text| !text.is_empty());
    ctx.log(TraceEvent::Reflect {
        present,
        revised: revised.is_some(),
    });

    let view = CycleView {
        task,
        draft: &draft,
        decision: &decision,
        tool_status,
        tool_output: tool_output.as_ref(),
        ctx: &ctx,
    };
    let (mut gate, source) = hooks.evaluate_critical(&view, policy);
    if gate.intervene {
        info!(severity = gate.severity, issues = %gate.issue_codes(), "gate requested intervention");
        if let Some(plan) = hooks.query_user_plan(task, &gate, &ctx) {
            gate.user_plan = Some(plan);
        }
    }
    ctx.log(TraceEvent::Gate {
        source,
        gate: gate.clone(),
    });

    let (final_text, source) = hooks.finalize(&FinalizeRequest {
        view: CycleView {
            task,
            draft: &draft,
            decision: &decision,
            tool_status,
            tool_output: tool_output.as_ref(),
            ctx: &ctx,
        },
        revised_text: revised.as_deref(),
        gate: &gate,
        discovered: &discovered,
    });
    ctx.log(TraceEvent::Finalize {
        source,
        final_text: final_text.clone(),
    });

    let verdict = hooks.persist(&PersistRequest {
        task,
        ctx: &ctx,
        final_text: &final_text,
        gate: &gate,
        discovered: &discovered,
    });
    let (present, persisted) = match verdict {
        Some(persisted) => (true, persisted),
        None => (false, persist_default(&memory, task, &final_text, &gate, &discovered)),
    };
    ctx.log(TraceEvent::Persist { present, persisted });

    let result = CycleResult {
        final_text,
        used_tool: decision.uses_tool(),
        discovered,
        gate,
        trace: ctx.into_trace(),
    };
    info!(
        used_tool = result.used_tool,
        blocked = result.blocked(),
        severity = result.gate.severity,
        "cycle finished"
    );
    result
}

/// Invoke the requested tool when allowed. Always logs one `act` event.
fn act(
    decision: &Decision,
    toolbox: &Toolbox,
    max_actions: u32,
    ctx: &mut RunContext,
) -> Option<ToolResult> {
    let Decision::UseTool { tool, args } = decision else {
        ctx.log(skipped_act(None, NO_TOOL_REQUESTED));
        return None;
    };
    if max_actions == 0 {
        debug!(tool = %tool, "action budget is zero");
        ctx.log(skipped_act(Some(tool), BUDGET_EXHAUSTED));
        return None;
    }
    let Some(registered) = toolbox.active.get(tool) else {
        warn!(tool = %tool, "requested tool is not active");
        ctx.log(skipped_act(Some(tool), TOOL_MISSING));
        return None;
    };

    let result = registered.execute(args, ctx);
    ctx.log(TraceEvent::Act {
        tool: Some(tool.clone()),
        status: result.status,
        output: result.output(),
        meta: (!result.meta.is_empty()).then(|| result.meta.clone()),
        reason: None,
    });
    Some(result)
}

fn skipped_act(tool: Option<&str>, reason: &str) -> TraceEvent {
    TraceEvent::Act {
        tool: tool.map(str::to_string),
        status: ToolStatus::Skipped,
        output: None,
        meta: None,
        reason: Some(reason.to_string()),
    }
}

fn persist_default(
    memory: &MemoryLog,
    task: &str,
    final_text: &str,
    gate: &Gate,
    discovered: &[DiscoveredTool],
) -> bool {
    let record = MemoryEvent::Cycle {
        task: task.to_string(),
        final_text: final_text.to_string(),
        gate: gate.clone(),
        discovered: discovered.to_vec(),
    };
    match memory.append(&record) {
        Ok(()) => true,
        Err(err) => {
            warn!(error = %format!("{err:#}"), path = %memory.path().display(), "failed to persist cycle");
            false
        }
    }
}
