//! Per-stage hook-or-fallback dispatch.
//!
//! Every stage of the cycle is a [`Hook`]: either a caller-provided callback
//! or the built-in fallback. [`Hooks`] holds one per stage and resolves each
//! call with an exhaustive `match`, reporting which side served it.

use std::fmt;

use serde_json::Value;

use crate::core::context::{HookSource, RunContext};
use crate::core::fallbacks::{fallback_decide, fallback_discover_tools, fallback_draft};
use crate::core::finalize::{ComposeInput, compose_final};
use crate::core::gate::{GateInput, evaluate_for_policy};
use crate::core::types::{Decision, DiscoveredTool, Draft, Gate, Policy, ToolStatus, UserPlan};
use crate::tools::ToolRegistry;

pub type RecallFn = dyn Fn(&str, &RunContext) -> Vec<Value>;
pub type DraftFn = dyn Fn(&str, &RunContext) -> Draft;
pub type DecideFn = dyn Fn(&str, &Draft, &RunContext) -> Decision;
pub type DiscoverFn = dyn Fn(&str, &Decision, &RunContext, &ToolRegistry) -> Vec<DiscoveredTool>;
pub type ReflectFn = dyn Fn(&CycleView<'_>) -> Option<String>;
pub type EvaluateFn = dyn Fn(&CycleView<'_>, &Policy) -> Gate;
pub type QueryUserPlanFn = dyn Fn(&str, &Gate, &RunContext) -> Option<UserPlan>;
pub type FinalizeFn = dyn Fn(&FinalizeRequest<'_>) -> String;
pub type PersistFn = dyn Fn(&PersistRequest<'_>) -> bool;

/// A stage implementation: caller-provided or the built-in fallback.
pub enum Hook<F: ?Sized> {
    Provided(Box<F>),
    Fallback,
}

impl<F: ?Sized> Hook<F> {
    pub fn source(&self) -> HookSource {
        match self {
            Self::Provided(_) => HookSource::Hook,
            Self::Fallback => HookSource::Fallback,
        }
    }

    pub fn is_provided(&self) -> bool {
        matches!(self, Self::Provided(_))
    }
}

impl<F: ?Sized> Default for Hook<F> {
    fn default() -> Self {
        Self::Fallback
    }
}

impl<F: ?Sized> fmt::Debug for Hook<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Provided(_) => f.write_str("Provided(..)"),
            Self::Fallback => f.write_str("Fallback"),
        }
    }
}

/// Read-only view of the accumulated cycle state after `act`.
#[derive(Debug, Clone, Copy)]
pub struct CycleView<'a> {
    pub task: &'a str,
    pub draft: &'a Draft,
    pub decision: &'a Decision,
    /// `None` when no tool ran.
    pub tool_status: Option<ToolStatus>,
    pub tool_output: Option<&'a Value>,
    pub ctx: &'a RunContext,
}

impl<'a> CycleView<'a> {
    pub fn gate_input(&self) -> GateInput<'a> {
        GateInput {
            requested_tool: self.decision.tool_name(),
            tool_status: self.tool_status,
            tool_output: self.tool_output,
        }
    }
}

/// Everything the finalize stage sees.
#[derive(Debug, Clone, Copy)]
pub struct FinalizeRequest<'a> {
    pub view: CycleView<'a>,
    pub revised_text: Option<&'a str>,
    pub gate: &'a Gate,
    pub discovered: &'a [DiscoveredTool],
}

impl<'a> FinalizeRequest<'a> {
    pub fn compose_input(&self) -> ComposeInput<'a> {
        ComposeInput {
            decision: self.view.decision,
            tool_status: self.view.tool_status,
            tool_output: self.view.tool_output,
            revised_text: self.revised_text,
            gate: self.gate,
            discovered: self.discovered,
        }
    }
}

/// Everything the persist stage sees.
#[derive(Debug, Clone, Copy)]
pub struct PersistRequest<'a> {
    pub task: &'a str,
    pub ctx: &'a RunContext,
    pub final_text: &'a str,
    pub gate: &'a Gate,
    pub discovered: &'a [DiscoveredTool],
}

/// One hook per stage. `Hooks::default()` runs every stage on its fallback.
#[derive(Debug, Default)]
pub struct Hooks {
    pub recall: Hook<RecallFn>,
    pub draft: Hook<DraftFn>,
    pub decide: Hook<DecideFn>,
    pub discover_tools: Hook<DiscoverFn>,
    pub reflect: Hook<ReflectFn>,
    pub evaluate_critical: Hook<EvaluateFn>,
    pub query_user_plan: Hook<QueryUserPlanFn>,
    pub finalize: Hook<FinalizeFn>,
    pub persist: Hook<PersistFn>,
}

impl Hooks {
    pub fn with_recall(mut self, hook: impl Fn(&str, &RunContext) -> Vec<Value> + 'static) -> Self {
        self.recall = Hook::Provided(Box::new(hook));
        self
    }

    pub fn with_draft(mut self, hook: impl Fn(&str, &RunContext) -> Draft + 'static) -> Self {
        self.draft = Hook::Provided(Box::new(hook));
        self
    }

    pub fn with_decide(
        mut self,
        hook: impl Fn(&str, &Draft, &RunContext) -> Decision + 'static,
    ) -> Self {
        self.decide = Hook::Provided(Box::new(hook));
        self
    }

    pub fn with_discover_tools(
        mut self,
        hook: impl Fn(&str, &Decision, &RunContext, &ToolRegistry) -> Vec<DiscoveredTool> + 'static,
    ) -> Self {
        self.discover_tools = Hook::Provided(Box::new(hook));
        self
    }

    pub fn with_reflect(mut self, hook: impl Fn(&CycleView<'_>) -> Option<String> + 'static) -> Self {
        self.reflect = Hook::Provided(Box::new(hook));
        self
    }

    pub fn with_evaluate_critical(
        mut self,
        hook: impl Fn(&CycleView<'_>, &Policy) -> Gate + 'static,
    ) -> Self {
        self.evaluate_critical = Hook::Provided(Box::new(hook));
        self
    }

    pub fn with_query_user_plan(
        mut self,
        hook: impl Fn(&str, &Gate, &RunContext) -> Option<UserPlan> + 'static,
    ) -> Self {
        self.query_user_plan = Hook::Provided(Box::new(hook));
        self
    }

    pub fn with_finalize(mut self, hook: impl Fn(&FinalizeRequest<'_>) -> String + 'static) -> Self {
        self.finalize = Hook::Provided(Box::new(hook));
        self
    }

    pub fn with_persist(mut self, hook: impl Fn(&PersistRequest<'_>) -> bool + 'static) -> Self {
        self.persist = Hook::Provided(Box::new(hook));
        self
    }

    /// Recalled items, or `None` when no recall hook is set.
    pub fn recall(&self, task: &str, ctx: &RunContext) -> Option<Vec<Value>> {
        match &self.recall {
            Hook::Provided(hook) => Some(hook(task, ctx)),
            Hook::Fallback => None,
        }
    }

    pub fn draft(&self, task: &str, ctx: &RunContext) -> (Draft, HookSource) {
        let draft = match &self.draft {
            Hook::Provided(hook) => hook(task, ctx),
            Hook::Fallback => fallback_draft(task, ctx),
        };
        (draft, self.draft.source())
    }

    pub fn decide(&self, task: &str, draft: &Draft, ctx: &RunContext) -> (Decision, HookSource) {
        let decision = match &self.decide {
            Hook::Provided(hook) => hook(task, draft, ctx),
            Hook::Fallback => fallback_decide(task, draft, ctx),
        };
        (decision, self.decide.source())
    }

    pub fn discover_tools(
        &self,
        task: &str,
        decision: &Decision,
        ctx: &RunContext,
        catalog: &ToolRegistry,
    ) -> (Vec<DiscoveredTool>, HookSource) {
        let discovered = match &self.discover_tools {
            Hook::Provided(hook) => hook(task, decision, ctx, catalog),
            Hook::Fallback => fallback_discover_tools(task, decision, ctx, catalog.names()),
        };
        (discovered, self.discover_tools.source())
    }

    /// `None` when no reflect hook is set; otherwise the hook's revision.
    pub fn reflect(&self, view: &CycleView<'_>) -> Option<Option<String>> {
        match &self.reflect {
            Hook::Provided(hook) => Some(hook(view)),
            Hook::Fallback => None,
        }
    }

    pub fn evaluate_critical(&self, view: &CycleView<'_>, policy: &Policy) -> (Gate, HookSource) {
        let gate = match &self.evaluate_critical {
            Hook::Provided(hook) => hook(view, policy),
            Hook::Fallback => evaluate_for_policy(&view.gate_input(), policy),
        };
        (gate, self.evaluate_critical.source())
    }

    /// The human's answer, or `None` when nobody can be asked.
    pub fn query_user_plan(&self, task: &str, gate: &Gate, ctx: &RunContext) -> Option<UserPlan> {
        match &self.query_user_plan {
            Hook::Provided(hook) => hook(task, gate, ctx),
            Hook::Fallback => None,
        }
    }

    pub fn finalize(&self, request: &FinalizeRequest<'_>) -> (String, HookSource) {
        let text = match &self.finalize {
            Hook::Provided(hook) => hook(request),
            Hook::Fallback => compose_final(&request.compose_input()),
        };
        (text, self.finalize.source())
    }

    /// Hook verdict, or `None` when the default memory append should run.
    pub fn persist(&self, request: &PersistRequest<'_>) -> Option<bool> {
        match &self.persist {
            Hook::Provided(hook) => Some(hook(request)),
            Hook::Fallback => None,
        }
    }
}
