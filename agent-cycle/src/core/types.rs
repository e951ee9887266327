//! Shared data types for one agent cycle.
//!
//! These types define the contracts between stages. Everything here is plain
//! data: serializable, deterministic, and free of I/O.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key/value arguments passed to a tool.
pub type ToolArgs = Map<String, Value>;

/// Stage output of `draft`: what the task asks for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum Draft {
    /// Evaluate a numeric expression.
    Compute { expression: String },
    /// Reply with free text.
    Answer {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

impl Draft {
    pub fn compute(expression: impl Into<String>) -> Self {
        Self::Compute {
            expression: expression.into(),
        }
    }

    pub fn answer(message: impl Into<String>) -> Self {
        Self::Answer {
            message: Some(message.into()),
        }
    }
}

/// Stage output of `decide`: the action chosen for this cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Decision {
    UseTool {
        tool: String,
        #[serde(default)]
        args: ToolArgs,
    },
    Answer {
        #[serde(default)]
        text: String,
    },
}

impl Decision {
    pub fn use_tool(tool: impl Into<String>, args: ToolArgs) -> Self {
        Self::UseTool {
            tool: tool.into(),
            args,
        }
    }

    pub fn answer(text: impl Into<String>) -> Self {
        Self::Answer { text: text.into() }
    }

    /// Name of the requested tool, if this decision uses one.
    pub fn tool_name(&self) -> Option<&str> {
        match self {
            Self::UseTool { tool, .. } => Some(tool),
            Self::Answer { .. } => None,
        }
    }

    pub fn uses_tool(&self) -> bool {
        matches!(self, Self::UseTool { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Ok,
    Error,
    Skipped,
}

impl ToolStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Error => "error",
            Self::Skipped => "skipped",
        }
    }
}

/// Machine-readable tool failure codes carried in [`ToolMeta::code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    MissingEnv,
    Exception,
    BadExpression,
    DataMissing,
    BadArgs,
    NotWired,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MissingEnv => "MISSING_ENV",
            Self::Exception => "EXCEPTION",
            Self::BadExpression => "BAD_EXPRESSION",
            Self::DataMissing => "DATA_MISSING",
            Self::BadArgs => "BAD_ARGS",
            Self::NotWired => "NOT_WIRED",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Open metadata attached to a [`ToolResult`].
///
/// `code` and `tool` are the well-known keys; anything tool-specific (e.g.
/// `missing`, `path`) lives in `detail` and is flattened on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    #[serde(flatten)]
    pub detail: Map<String, Value>,
}

impl ToolMeta {
    pub fn code(code: ErrorCode) -> Self {
        Self {
            code: Some(code),
            ..Self::default()
        }
    }

    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.tool = Some(tool.into());
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.detail.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_none() && self.tool.is_none() && self.detail.is_empty()
    }
}

/// Uniform result every tool invocation produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub status: ToolStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "ToolMeta::is_empty")]
    pub meta: ToolMeta,
}

impl ToolResult {
    pub fn ok(content: impl Into<Value>) -> Self {
        Self {
            status: ToolStatus::Ok,
            content: Some(content.into()),
            error: None,
            meta: ToolMeta::default(),
        }
    }

    pub fn error(message: impl Into<String>, meta: ToolMeta) -> Self {
        Self {
            status: ToolStatus::Error,
            content: None,
            error: Some(message.into()),
            meta,
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            status: ToolStatus::Skipped,
            content: None,
            error: None,
            meta: ToolMeta::default().with_detail("reason", reason.into()),
        }
    }

    pub fn code(&self) -> Option<ErrorCode> {
        self.meta.code
    }

    /// The value later stages see as "tool output": content on success, the
    /// error message otherwise.
    pub fn output(&self) -> Option<Value> {
        match self.status {
            ToolStatus::Ok => self.content.clone(),
            ToolStatus::Error | ToolStatus::Skipped => self.error.clone().map(Value::String),
        }
    }
}

/// Render a tool output value as plain text (strings unquoted).
pub fn output_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Gate-level issue codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueCode {
    ToolMissing,
    ToolError,
    Auth,
    DataMissing,
}

impl IssueCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ToolMissing => "TOOL_MISSING",
            Self::ToolError => "TOOL_ERROR",
            Self::Auth => "AUTH",
            Self::DataMissing => "DATA_MISSING",
        }
    }
}

impl fmt::Display for IssueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub code: IssueCode,
    pub detail: String,
    /// Always within `[0.0, 1.0]`.
    pub severity: f64,
}

impl Issue {
    pub fn new(code: IssueCode, detail: impl Into<String>, severity: f64) -> Self {
        Self {
            code,
            detail: detail.into(),
            severity: clamp_severity(severity),
        }
    }
}

fn clamp_severity(severity: f64) -> f64 {
    if severity.is_nan() {
        return 0.0;
    }
    severity.clamp(0.0, 1.0)
}

/// Human answer to an intervention request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPlan {
    pub allow_continue: bool,
    #[serde(default)]
    pub notes: Option<String>,
    pub prompt: String,
}

/// Outcome of the criticality gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gate {
    pub issues: Vec<Issue>,
    pub severity: f64,
    pub intervene: bool,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_plan: Option<UserPlan>,
}

impl Gate {
    /// Build a gate from issues, deriving severity, intervention and reason
    /// from `policy`.
    pub fn from_issues(issues: Vec<Issue>, policy: &Policy) -> Self {
        let severity = worst_severity(&issues);
        let exceeded = severity >= policy.critical_threshold;
        Self {
            issues,
            severity,
            intervene: exceeded && policy.allow_interrupts,
            reason: if exceeded {
                "threshold exceeded".to_string()
            } else {
                "no critical issues".to_string()
            },
            user_plan: None,
        }
    }

    /// Whether finalization may surface the normal result.
    pub fn allows_continue(&self) -> bool {
        if !self.intervene {
            return true;
        }
        self.user_plan
            .as_ref()
            .is_some_and(|plan| plan.allow_continue)
    }

    /// Comma-separated issue codes, or `UNSPECIFIED` when there are none.
    pub fn issue_codes(&self) -> String {
        if self.issues.is_empty() {
            return "UNSPECIFIED".to_string();
        }
        self.issues
            .iter()
            .map(|issue| issue.code.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Maximum severity among `issues`, or `0.0` when empty.
pub fn worst_severity(issues: &[Issue]) -> f64 {
    issues
        .iter()
        .map(|issue| issue.severity)
        .fold(0.0, f64::max)
}

/// Which gate rule set governs a cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateMode {
    #[default]
    Standard,
    /// Floors AUTH and DATA_MISSING severities at 0.9.
    Strict,
}

/// Intervention policy for the criticality gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Policy {
    /// Minimum severity that triggers intervention, in `[0.0, 1.0]`.
    pub critical_threshold: f64,
    /// Whether intervention may occur at all.
    pub allow_interrupts: bool,
    pub gate_mode: GateMode,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            critical_threshold: 0.7,
            allow_interrupts: true,
            gate_mode: GateMode::Standard,
        }
    }
}

/// A catalog tool proposed for a future cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredTool {
    pub name: String,
    pub reason: String,
}
