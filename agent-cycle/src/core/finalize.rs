//! Default composer for the cycle's final text.

use serde_json::Value;

use crate::core::types::{Decision, DiscoveredTool, Gate, ToolStatus, output_text};

/// Inputs the default composer reads.
#[derive(Debug, Clone, Copy)]
pub struct ComposeInput<'a> {
    pub decision: &'a Decision,
    pub tool_status: Option<ToolStatus>,
    pub tool_output: Option<&'a Value>,
    pub revised_text: Option<&'a str>,
    pub gate: &'a Gate,
    pub discovered: &'a [DiscoveredTool],
}

/// Compose the final text.
///
/// A blocked gate short-circuits: only issue codes are reported and the tool
/// output is never surfaced.
pub fn compose_final(input: &ComposeInput<'_>) -> String {
    if !input.gate.allows_continue() {
        return blocked_message(input.gate);
    }

    let revised = input.revised_text.filter(|text| !text.is_empty());
    let mut text = match input.decision {
        Decision::UseTool { .. } => match input.tool_status {
            Some(ToolStatus::Ok) => match revised {
                Some(revised) => revised.to_string(),
                None => input.tool_output.map(output_text).unwrap_or_default(),
            },
            Some(ToolStatus::Error) => format!(
                "tool error: {}",
                input.tool_output.map(output_text).unwrap_or_default()
            ),
            Some(ToolStatus::Skipped) | None => "skipped action (tool missing)".to_string(),
        },
        Decision::Answer { text } => match revised {
            Some(revised) => revised.to_string(),
            None if !text.is_empty() => text.clone(),
            None => "Done.".to_string(),
        },
    };

    if let Some(suffix) = candidates_suffix(input.discovered) {
        text.push_str(&suffix);
    }
    text
}

pub fn blocked_message(gate: &Gate) -> String {
    format!("Action blocked. Provide plan. Issues: {}.", gate.issue_codes())
}

/// `" | Next cycle candidates: a, b"`, or `None` when nothing was discovered.
pub fn candidates_suffix(discovered: &[DiscoveredTool]) -> Option<String> {
    if discovered.is_empty() {
        return None;
    }
    let names = discovered
        .iter()
        .map(|tool| tool.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    Some(format!(" | Next cycle candidates: {names}"))
}
