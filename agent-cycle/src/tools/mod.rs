//! Tool contract and the environment-gated registry.
//!
//! A [`Tool`] is any callable taking `(args, ctx)`. The registry wraps each
//! one in a [`RegisteredTool`] that resolves required environment variables
//! at call time, records the resolved secrets in the run context, and turns
//! every failure (an `Err` or a panic) into a [`ToolResult`]. Nothing a tool
//! does can escape `execute`.

pub mod builtin;

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use anyhow::Result;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::core::context::RunContext;
use crate::core::types::{ErrorCode, ToolArgs, ToolMeta, ToolResult};
use crate::io::env::{EnvSource, resolve_vars};

pub use builtin::{build_registry_by_names, builtin_spec};

/// What a tool hands back on success.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    /// A fully formed result, passed through unchanged.
    Complete(ToolResult),
    /// Bare content, wrapped as `{status: ok, content}`.
    Content(Value),
}

impl From<ToolResult> for ToolOutput {
    fn from(result: ToolResult) -> Self {
        Self::Complete(result)
    }
}

impl From<Value> for ToolOutput {
    fn from(value: Value) -> Self {
        Self::Content(value)
    }
}

impl From<String> for ToolOutput {
    fn from(text: String) -> Self {
        Self::Content(Value::String(text))
    }
}

impl From<&str> for ToolOutput {
    fn from(text: &str) -> Self {
        Self::Content(Value::String(text.to_string()))
    }
}

/// A callable tool implementation.
pub trait Tool: Send + Sync {
    fn call(&self, args: &ToolArgs, ctx: &RunContext) -> Result<ToolOutput>;
}

impl<F> Tool for F
where
    F: Fn(&ToolArgs, &RunContext) -> Result<ToolOutput> + Send + Sync,
{
    fn call(&self, args: &ToolArgs, ctx: &RunContext) -> Result<ToolOutput> {
        self(args, ctx)
    }
}

/// Declaration of a tool: its unique name, implementation and required
/// environment variables.
#[derive(Clone)]
pub struct ToolSpec {
    pub name: String,
    pub tool: Arc<dyn Tool>,
    pub description: Option<String>,
    pub requires_env: Vec<String>,
}

impl ToolSpec {
    pub fn new(name: impl Into<String>, tool: impl Tool + 'static) -> Self {
        Self {
            name: name.into(),
            tool: Arc::new(tool),
            description: None,
            requires_env: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn requires_env<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requires_env.extend(names.into_iter().map(Into::into));
        self
    }
}

impl fmt::Debug for ToolSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolSpec")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("requires_env", &self.requires_env)
            .finish_non_exhaustive()
    }
}

/// A tool bound to an environment source.
pub struct RegisteredTool {
    spec: ToolSpec,
    env: Arc<dyn EnvSource>,
}

impl RegisteredTool {
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn description(&self) -> Option<&str> {
        self.spec.description.as_deref()
    }

    pub fn requires_env(&self) -> &[String] {
        &self.spec.requires_env
    }

    /// Run the tool. Always returns a result; failures are normalized.
    #[instrument(skip_all, fields(tool = %self.spec.name))]
    pub fn execute(&self, args: &ToolArgs, ctx: &mut RunContext) -> ToolResult {
        let name = self.spec.name.as_str();
        let (resolved, missing) = resolve_vars(self.env.as_ref(), &self.spec.requires_env);
        if !missing.is_empty() {
            warn!(missing = ?missing, "tool environment incomplete");
            return ToolResult::error(
                format!("missing env: {}", missing.join(", ")),
                ToolMeta::code(ErrorCode::MissingEnv)
                    .with_tool(name)
                    .with_detail("missing", missing),
            );
        }
        ctx.record_secrets(name, resolved);

        let shared: &RunContext = ctx;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.spec.tool.call(args, shared)));
        let result = match outcome {
            Ok(Ok(ToolOutput::Complete(result))) => result,
            Ok(Ok(ToolOutput::Content(value))) => ToolResult::ok(value),
            Ok(Err(err)) => exception(name, format!("{err:#}")),
            Err(payload) => exception(name, panic_message(payload.as_ref())),
        };
        debug!(status = result.status.as_str(), "tool finished");
        result
    }
}

impl fmt::Debug for RegisteredTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredTool")
            .field("spec", &self.spec)
            .finish_non_exhaustive()
    }
}

fn exception(tool: &str, message: String) -> ToolResult {
    warn!(error = %message, "tool failed");
    ToolResult::error(message, ToolMeta::code(ErrorCode::Exception).with_tool(tool))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return (*message).to_string();
    }
    if let Some(message) = payload.downcast_ref::<String>() {
        return message.clone();
    }
    "tool panicked".to_string()
}

/// Immutable name → tool map, iterated in sorted name order.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, RegisteredTool>,
}

impl ToolRegistry {
    pub fn get(&self, name: &str) -> Option<&RegisteredTool> {
        self.tools.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Build a registry from specs. A later spec with a duplicate name replaces
/// the earlier one.
pub fn make_tool_registry<I>(specs: I, env: Arc<dyn EnvSource>) -> ToolRegistry
where
    I: IntoIterator<Item = ToolSpec>,
{
    let mut tools = BTreeMap::new();
    for spec in specs {
        let name = spec.name.clone();
        let registered = RegisteredTool {
            spec,
            env: Arc::clone(&env),
        };
        if tools.insert(name.clone(), registered).is_some() {
            warn!(tool = %name, "duplicate tool spec replaced");
        }
    }
    ToolRegistry { tools }
}
