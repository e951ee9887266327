//! Built-in stage behavior used when a cycle has no hook for a stage.
//!
//! Every function here is pure: identical inputs give identical outputs.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::core::context::RunContext;
use crate::core::types::{Decision, DiscoveredTool, Draft, ToolArgs};
use crate::tools::builtin::CALCULATOR;

const FALLBACK_MESSAGE: &str = "Short reply ready.";
const DEFAULT_ANSWER: &str = "OK.";
const MAX_DISCOVERED: usize = 5;
const REASON_KEYWORDS: usize = 3;
const MIN_TASK_WORD_CHARS: usize = 4;

// The percentage may not continue a digit group such as "1,019.5%".
static PERCENT_OF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|[^\d.,])(\d+(?:\.\d+)?|\.\d+)\s*(?:%|percent)\s*of\s+(\S+)").unwrap()
});
static PLAIN_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?(?:\d+(?:\.\d+)?|\.\d+)$").unwrap());

/// Parse a "<p> percent of <b>" phrase anywhere in `text` into `(p, b)`.
///
/// `<b>` is the whole token after "of", minus trailing sentence punctuation.
/// Digit groups ("1,000") or malformed numbers ("3.5.2") do not parse.
pub fn parse_percent_of(text: &str) -> Option<(f64, f64)> {
    let caps = PERCENT_OF.captures(text)?;
    let percent = caps.get(1)?.as_str().parse::<f64>().ok()?;
    let base = caps
        .get(2)?
        .as_str()
        .trim_end_matches(['?', '!', '.', ',', ';', ':']);
    if !PLAIN_NUMBER.is_match(base) {
        return None;
    }
    let base = base.parse::<f64>().ok()?;
    Some((percent, base))
}

/// Expression multiplying the fractional percentage by the base.
///
/// Both operands are written as float literals (`1.0`, not `1`) so the
/// calculator multiplies floats even when the inputs are integral.
pub fn percent_expression(percent: f64, base: f64) -> String {
    format!("{:?}*{:?}", percent / 100.0, base)
}

pub fn fallback_draft(task: &str, _ctx: &RunContext) -> Draft {
    match parse_percent_of(task) {
        Some((percent, base)) => Draft::compute(percent_expression(percent, base)),
        None => Draft::answer(FALLBACK_MESSAGE),
    }
}

pub fn fallback_decide(_task: &str, draft: &Draft, _ctx: &RunContext) -> Decision {
    match draft {
        Draft::Compute { expression } if !expression.trim().is_empty() => {
            let mut args = ToolArgs::new();
            args.insert(
                "expression".to_string(),
                Value::String(expression.clone()),
            );
            Decision::use_tool(CALCULATOR, args)
        }
        Draft::Compute { .. } => Decision::answer(DEFAULT_ANSWER),
        Draft::Answer { message } => {
            Decision::answer(message.as_deref().unwrap_or(DEFAULT_ANSWER))
        }
    }
}

/// Propose catalog tools whose names contain a keyword from the decision or
/// the task. This is a literal substring match, not a relevance ranking.
pub fn fallback_discover_tools<'a, I>(
    task: &str,
    decision: &Decision,
    _ctx: &RunContext,
    catalog: I,
) -> Vec<DiscoveredTool>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut keywords: BTreeSet<String> = BTreeSet::new();
    if let Some(tool) = decision.tool_name() {
        keywords.extend(
            tool.split('_')
                .filter(|part| !part.is_empty())
                .map(str::to_string),
        );
    }
    keywords.extend(
        task.to_lowercase()
            .split_whitespace()
            .filter(|word| word.chars().count() >= MIN_TASK_WORD_CHARS)
            .map(str::to_string),
    );
    if keywords.is_empty() {
        return Vec::new();
    }

    let sample = keywords
        .iter()
        .take(REASON_KEYWORDS)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    catalog
        .into_iter()
        .filter(|name| keywords.iter().any(|key| name.contains(key.as_str())))
        .take(MAX_DISCOVERED)
        .map(|name| DiscoveredTool {
            name: name.to_string(),
            reason: format!("matches: {sample}"),
        })
        .collect()
}
