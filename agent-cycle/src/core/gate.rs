//! Criticality gate: turns a cycle outcome into typed issues and decides
//! whether a human has to step in.

use serde_json::Value;

use crate::core::types::{Gate, GateMode, Issue, IssueCode, Policy, ToolStatus, output_text};

const TOOL_MISSING_SEVERITY: f64 = 0.8;
const TOOL_ERROR_SEVERITY: f64 = 0.9;
const TRANSIENT_ERROR_SEVERITY: f64 = 0.85;
const AUTH_SEVERITY: f64 = 0.95;
const DATA_MISSING_SEVERITY: f64 = 0.7;
const STRICT_FLOOR: f64 = 0.9;
const ERROR_DETAIL_CHARS: usize = 300;

const TRANSIENT_MARKERS: [&str; 4] = ["quota", "limit", "rate", "429"];
const AUTH_MARKERS: [&str; 4] = ["api key", "unauthorized", "forbidden", "auth"];
const MISSING_MARKERS: [&str; 4] = ["not found", "no such file", "file not found", "missing"];

/// Everything the gate looks at.
#[derive(Debug, Clone, Copy)]
pub struct GateInput<'a> {
    /// Tool requested by the decision, if any.
    pub requested_tool: Option<&'a str>,
    /// `None` when no tool ran (including a missing tool).
    pub tool_status: Option<ToolStatus>,
    pub tool_output: Option<&'a Value>,
}

/// Collect issues for a cycle outcome. Rules are independent; every rule that
/// matches contributes one issue.
pub fn collect_issues(input: &GateInput<'_>) -> Vec<Issue> {
    let mut issues = Vec::new();
    let text = input.tool_output.map(output_text).unwrap_or_default();
    let lowered = text.to_lowercase();

    if let (Some(tool), None) = (input.requested_tool, input.tool_status) {
        issues.push(Issue::new(
            IssueCode::ToolMissing,
            tool,
            TOOL_MISSING_SEVERITY,
        ));
    }
    if input.tool_status == Some(ToolStatus::Error) {
        let severity = if contains_any(&lowered, &TRANSIENT_MARKERS) {
            TRANSIENT_ERROR_SEVERITY
        } else {
            TOOL_ERROR_SEVERITY
        };
        let detail: String = text.chars().take(ERROR_DETAIL_CHARS).collect();
        issues.push(Issue::new(IssueCode::ToolError, detail, severity));
    }
    if contains_any(&lowered, &AUTH_MARKERS) {
        issues.push(Issue::new(IssueCode::Auth, "auth problem", AUTH_SEVERITY));
    }
    if contains_any(&lowered, &MISSING_MARKERS) {
        issues.push(Issue::new(
            IssueCode::DataMissing,
            "resource not found",
            DATA_MISSING_SEVERITY,
        ));
    }
    issues
}

/// Standard gate: issue severities as collected.
pub fn evaluate_critical(input: &GateInput<'_>, policy: &Policy) -> Gate {
    Gate::from_issues(collect_issues(input), policy)
}

/// Strict gate: AUTH and DATA_MISSING are floored at 0.9 before the worst
/// severity and the intervention decision are computed.
pub fn evaluate_critical_strict(input: &GateInput<'_>, policy: &Policy) -> Gate {
    let issues = collect_issues(input)
        .into_iter()
        .map(|mut issue| {
            if matches!(issue.code, IssueCode::Auth | IssueCode::DataMissing) {
                issue.severity = issue.severity.max(STRICT_FLOOR);
            }
            issue
        })
        .collect();
    Gate::from_issues(issues, policy)
}

/// Gate variant selected by `policy.gate_mode`.
pub fn evaluate_for_policy(input: &GateInput<'_>, policy: &Policy) -> Gate {
    match policy.gate_mode {
        GateMode::Standard => evaluate_critical(input, policy),
        GateMode::Strict => evaluate_critical_strict(input, policy),
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}
