//! Ready-made hooks used by the CLI: rule-based drafting and deciding, an
//! interactive user-plan prompt and memory recall.

use std::io::{self, BufRead, Write};

use serde_json::Value;
use tracing::warn;

use crate::core::context::RunContext;
use crate::core::fallbacks::{fallback_decide, fallback_draft, parse_percent_of, percent_expression};
use crate::core::types::{Decision, Draft, Gate, UserPlan};
use crate::io::memory::MemoryLog;

const CALC_PREFIX: &str = "calc ";
const DRAFTED_MESSAGE: &str = "Short reply drafted.";

/// Draft from simple task rules.
///
/// A "<p>% of <b>" or "<p> percent of <b>" phrase becomes a percentage
/// computation; "calc <expr>" hands `<expr>` to the calculator as written.
pub fn draft_rule_based(task: &str, ctx: &RunContext) -> Draft {
    let lead = task.trim_start();
    let calc_body = strip_calc_prefix(lead);
    let body = calc_body.unwrap_or(lead);

    if let Some((percent, base)) = parse_percent_of(body) {
        return Draft::compute(percent_expression(percent, base));
    }
    if let Some(expr) = calc_body.map(str::trim).filter(|expr| !expr.is_empty()) {
        if !mentions_percent(expr) {
            return Draft::compute(expr);
        }
    }
    if calc_body.is_some() || mentions_percent(lead) {
        return fallback_draft(task, ctx);
    }
    Draft::answer(DRAFTED_MESSAGE)
}

/// Route compute drafts to the calculator; answer everything else.
pub fn decide_simple(task: &str, draft: &Draft, ctx: &RunContext) -> Decision {
    fallback_decide(task, draft, ctx)
}

fn strip_calc_prefix(task: &str) -> Option<&str> {
    let prefix = task.get(..CALC_PREFIX.len())?;
    prefix
        .eq_ignore_ascii_case(CALC_PREFIX)
        .then(|| &task[CALC_PREFIX.len()..])
}

fn mentions_percent(text: &str) -> bool {
    text.contains('%') || text.to_lowercase().contains("percent")
}

/// Ask for a plan on `output` and read one line from `input`.
///
/// "y" (any case) continues anyway; any other line declines and is kept as
/// notes. End of input declines without notes.
pub fn query_user_plan_prompt<R: BufRead, W: Write>(
    gate: &Gate,
    input: &mut R,
    output: &mut W,
) -> UserPlan {
    let issues = gate.issue_codes();
    let prompt = format!("Issues: {issues}. Type 'y' to continue anyway, or paste a short plan: ");
    if let Err(err) = write!(output, "{prompt}").and_then(|()| output.flush()) {
        warn!(error = %err, "failed to show user-plan prompt");
    }

    let mut line = String::new();
    match input.read_line(&mut line) {
        Ok(0) => declined_without_answer(&issues),
        Ok(_) => {
            let answer = line.trim();
            if answer.eq_ignore_ascii_case("y") {
                UserPlan {
                    allow_continue: true,
                    notes: Some("user override".to_string()),
                    prompt,
                }
            } else {
                UserPlan {
                    allow_continue: false,
                    notes: Some(answer.to_string()),
                    prompt,
                }
            }
        }
        Err(err) => {
            warn!(error = %err, "failed to read user plan");
            declined_without_answer(&issues)
        }
    }
}

fn declined_without_answer(issues: &str) -> UserPlan {
    UserPlan {
        allow_continue: false,
        notes: None,
        prompt: format!("Action blocked. Provide plan. {issues}"),
    }
}

/// `query_user_plan` hook reading stdin; the prompt goes to stderr so stdout
/// carries only the cycle result.
pub fn query_user_plan_stdin(_task: &str, gate: &Gate, _ctx: &RunContext) -> Option<UserPlan> {
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut output = io::stderr();
    Some(query_user_plan_prompt(gate, &mut input, &mut output))
}

/// `recall` hook returning the last `limit` memory records.
pub fn memory_recall(log: MemoryLog, limit: usize) -> impl Fn(&str, &RunContext) -> Vec<Value> {
    move |_task: &str, _ctx: &RunContext| match log.tail(limit) {
        Ok(records) => records
            .iter()
            .filter_map(|record| serde_json::to_value(record).ok())
            .collect(),
        Err(err) => {
            warn!(error = %format!("{err:#}"), "memory recall failed");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{DiscoveredTool, Issue, IssueCode, Policy};
    use crate::io::memory::MemoryEvent;
    use std::io::Cursor;

    fn ctx() -> RunContext {
        RunContext::new("task", Policy::default(), Vec::new())
    }

    fn blocking_gate() -> Gate {
        Gate::from_issues(
            vec![Issue::new(IssueCode::ToolMissing, "web_search", 0.8)],
            &Policy::default(),
        )
    }

    #[test]
    fn rule_draft_handles_percent_phrases() {
        assert_eq!(
            draft_rule_based("calc 19.5% of 349", &ctx()),
            Draft::compute("0.195*349.0")
        );
        assert_eq!(
            draft_rule_based("what is 12 percent of 80", &ctx()),
            Draft::compute("0.12*80.0")
        );
    }

    #[test]
    fn rule_draft_passes_calc_expressions_through() {
        assert_eq!(draft_rule_based("calc (2+3)*4", &ctx()), Draft::compute("(2+3)*4"));
        assert_eq!(draft_rule_based("CALC 2**10", &ctx()), Draft::compute("2**10"));
    }

    #[test]
    fn rule_draft_falls_back_on_unparsed_calc_or_percent() {
        assert_eq!(draft_rule_based("calc ", &ctx()), Draft::answer("Short reply ready."));
        assert_eq!(
            draft_rule_based("calc 5% of nothing", &ctx()),
            Draft::answer("Short reply ready.")
        );
        assert_eq!(
            draft_rule_based("how many percent are left", &ctx()),
            Draft::answer("Short reply ready.")
        );
    }

    #[test]
    fn rule_draft_answers_everything_else() {
        assert_eq!(
            draft_rule_based("what is the weather", &ctx()),
            Draft::answer("Short reply drafted.")
        );
        assert_eq!(
            decide_simple("t", &Draft::answer("Short reply drafted."), &ctx()),
            Decision::answer("Short reply drafted.")
        );
    }

    #[test]
    fn prompt_accepts_override() {
        let mut input = Cursor::new("Y\n");
        let mut output = Vec::new();
        let plan = query_user_plan_prompt(&blocking_gate(), &mut input, &mut output);
        assert!(plan.allow_continue);
        assert_eq!(plan.notes.as_deref(), Some("user override"));
        let shown = String::from_utf8(output).expect("utf-8");
        assert_eq!(
            shown,
            "Issues: TOOL_MISSING. Type 'y' to continue anyway, or paste a short plan: "
        );
        assert_eq!(plan.prompt, shown);
    }

    #[test]
    fn prompt_keeps_plan_text_as_notes() {
        let mut input = Cursor::new("  enable web_search first  \n");
        let plan = query_user_plan_prompt(&blocking_gate(), &mut input, &mut Vec::new());
        assert!(!plan.allow_continue);
        assert_eq!(plan.notes.as_deref(), Some("enable web_search first"));
    }

    #[test]
    fn prompt_declines_on_end_of_input() {
        let mut input = Cursor::new("");
        let plan = query_user_plan_prompt(&blocking_gate(), &mut input, &mut Vec::new());
        assert!(!plan.allow_continue);
        assert_eq!(plan.notes, None);
        assert_eq!(plan.prompt, "Action blocked. Provide plan. TOOL_MISSING");
    }

    #[test]
    fn memory_recall_returns_latest_records() {
        let temp = tempfile::tempdir().expect("tempdir");
        let log = MemoryLog::new(temp.path().join("memory.jsonl"));
        for task in ["one", "two", "three"] {
            log.append(&MemoryEvent::ToolProposals {
                task: task.to_string(),
                candidates: vec![DiscoveredTool {
                    name: "read_file".to_string(),
                    reason: "matches: file".to_string(),
                }],
            })
            .expect("append");
        }
        let recall = memory_recall(log, 2);
        let items = recall("next", &ctx());
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["task"], "two");
        assert_eq!(items[1]["type"], "tool_proposals");
    }
}
