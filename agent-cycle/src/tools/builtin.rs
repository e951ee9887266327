//! Built-in tools and name-based registry construction.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::warn;

use crate::core::context::RunContext;
use crate::core::expression::evaluate;
use crate::core::types::{ErrorCode, ToolArgs, ToolMeta, ToolResult, output_text};
use crate::io::env::EnvSource;
use crate::tools::{ToolOutput, ToolRegistry, ToolSpec, make_tool_registry};

pub const CALCULATOR: &str = "calculator";
pub const READ_FILE: &str = "read_file";
pub const WRITE_FILE: &str = "write_file";
pub const OPENAI_CHAT: &str = "openai_chat";
pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";

/// Names of every built-in tool, sorted.
pub const BUILTIN_NAMES: [&str; 4] = [CALCULATOR, OPENAI_CHAT, READ_FILE, WRITE_FILE];

const READ_LIMIT_CHARS: usize = 20_000;

/// Evaluate `args.expression` with the restricted arithmetic evaluator.
pub fn calculator(args: &ToolArgs, _ctx: &RunContext) -> Result<ToolOutput> {
    let expression = args.get("expression").map(output_text).unwrap_or_default();
    let result = match evaluate(&expression) {
        Ok(value) => ToolResult::ok(value.to_string()),
        Err(err) => ToolResult::error(err.to_string(), ToolMeta::code(ErrorCode::BadExpression)),
    };
    Ok(result.into())
}

/// Read up to 20,000 characters of the UTF-8 file at `args.path`.
pub fn read_file(args: &ToolArgs, _ctx: &RunContext) -> Result<ToolOutput> {
    let path = args.get("path").and_then(Value::as_str).filter(|p| !p.is_empty());
    let Some(path) = path.filter(|p| Path::new(p).exists()) else {
        let meta = ToolMeta::code(ErrorCode::DataMissing)
            .with_detail("path", path.map_or(Value::Null, Value::from));
        return Ok(ToolResult::error("file not found", meta).into());
    };
    let contents = fs::read_to_string(path).with_context(|| format!("read {path}"))?;
    let truncated: String = contents.chars().take(READ_LIMIT_CHARS).collect();
    Ok(truncated.into())
}

/// Write `args.content` (default empty) to `args.path`, creating parent
/// directories.
pub fn write_file(args: &ToolArgs, _ctx: &RunContext) -> Result<ToolOutput> {
    let Some(path) = args.get("path").and_then(Value::as_str).filter(|p| !p.is_empty()) else {
        return Ok(ToolResult::error("missing path", ToolMeta::code(ErrorCode::BadArgs)).into());
    };
    let content = args.get("content").map(output_text).unwrap_or_default();
    if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    fs::write(path, &content).with_context(|| format!("write {path}"))?;
    Ok(format!("wrote {} bytes to {path}", content.len()).into())
}

/// Chat completion placeholder. Needs `OPENAI_API_KEY`; no client is wired.
pub fn openai_chat(_args: &ToolArgs, ctx: &RunContext) -> Result<ToolOutput> {
    let key = ctx
        .secret(OPENAI_CHAT, OPENAI_API_KEY)
        .filter(|key| !key.is_empty());
    let result = match key {
        None => ToolResult::error("missing key", ToolMeta::code(ErrorCode::MissingEnv)),
        Some(_) => ToolResult::error("not wired", ToolMeta::code(ErrorCode::NotWired)),
    };
    Ok(result.into())
}

/// Spec for a built-in tool by name.
pub fn builtin_spec(name: &str) -> Option<ToolSpec> {
    let spec = match name {
        CALCULATOR => ToolSpec::new(CALCULATOR, calculator)
            .with_description("Evaluate an arithmetic expression."),
        READ_FILE => ToolSpec::new(READ_FILE, read_file)
            .with_description("Read a UTF-8 text file."),
        WRITE_FILE => ToolSpec::new(WRITE_FILE, write_file)
            .with_description("Write text to a file, creating parent directories."),
        OPENAI_CHAT => ToolSpec::new(OPENAI_CHAT, openai_chat)
            .with_description("Chat completion (not wired).")
            .requires_env([OPENAI_API_KEY]),
        _ => return None,
    };
    Some(spec)
}

/// Registry of the named built-ins. Unknown names are skipped.
pub fn build_registry_by_names<I, S>(names: I, env: Arc<dyn EnvSource>) -> ToolRegistry
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let specs: Vec<ToolSpec> = names
        .into_iter()
        .filter_map(|name| {
            let name = name.as_ref();
            let spec = builtin_spec(name);
            if spec.is_none() {
                warn!(tool = %name, "unknown tool name skipped");
            }
            spec
        })
        .collect();
    make_tool_registry(specs, env)
}
