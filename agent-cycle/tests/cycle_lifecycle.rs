//! End-to-end cycle tests driven through the public API.
//!
//! Each test runs `run_cycle` against a scratch memory log and checks the
//! final text, gate outcome, trace and persisted records together.

use agent_cycle::core::context::{HookSource, RunContext, TraceEvent};
use agent_cycle::core::types::{
    Decision, Draft, ErrorCode, Gate, GateMode, IssueCode, Policy, ToolArgs, ToolMeta,
    ToolResult, ToolStatus,
};
use agent_cycle::cycle::{CycleConfig, Toolbox, run_cycle};
use agent_cycle::hooks::{CycleView, Hooks};
use agent_cycle::io::memory::MemoryEvent;
use agent_cycle::rules::{decide_simple, draft_rule_based, query_user_plan_prompt};
use agent_cycle::test_support::{TestWorkspace, env_from, scripted_tool, toolbox_with};
use agent_cycle::tools::build_registry_by_names;
use agent_cycle::tools::builtin::{OPENAI_API_KEY, OPENAI_CHAT};
use std::io::Cursor;

fn rule_hooks() -> Hooks {
    Hooks::default()
        .with_draft(draft_rule_based)
        .with_decide(decide_simple)
}

/// Verifies a percent task computes through the calculator and persists a cycle record.
#[test]
fn percent_task_computes_and_persists() {
    let workspace = TestWorkspace::new();
    let result = run_cycle(
        "calc 19.5% of 349",
        &rule_hooks(),
        &Toolbox::default(),
        &workspace.cycle_config(),
    );

    assert_eq!(result.final_text, ((19.5_f64 / 100.0) * 349.0).to_string());
    assert_eq!(result.final_text, "68.055");
    assert!(result.used_tool);
    assert!(!result.blocked());
    assert_eq!(result.gate.severity, 0.0);

    match &result.trace[1] {
        TraceEvent::Draft { source, draft } => {
            assert_eq!(*source, HookSource::Hook);
            assert_eq!(*draft, Draft::compute("0.195*349.0"));
        }
        other => panic!("expected draft event, got {other:?}"),
    }

    let records = workspace.records();
    assert_eq!(records.len(), 1);
    match &records[0].event {
        MemoryEvent::Cycle {
            task, final_text, ..
        } => {
            assert_eq!(task, "calc 19.5% of 349");
            assert_eq!(final_text, "68.055");
        }
        other => panic!("expected cycle record, got {other:?}"),
    }
    assert!(records[0].ts > 0.0);
}

/// Verifies percent tasks always multiply floats, whatever the operands look like.
#[test]
fn percent_tasks_render_float_products() {
    let workspace = TestWorkspace::new();
    for (task, expected) in [
        ("what is 100 percent of 5", "5.0"),
        ("what is 50 percent of 10", "5.0"),
        ("what is 300 percent of 5000000000000000000", "15000000000000000000"),
    ] {
        let result = run_cycle(
            task,
            &Hooks::default(),
            &Toolbox::default(),
            &workspace.cycle_config(),
        );
        assert!(!result.blocked(), "{task}");
        assert_eq!(result.final_text, expected, "{task}");
    }
}

/// Verifies a digit-grouped base falls back to an answer instead of a wrong product.
#[test]
fn grouped_percent_base_answers_instead_of_computing() {
    let workspace = TestWorkspace::new();
    let result = run_cycle(
        "what is 10 percent of 1,000",
        &Hooks::default(),
        &Toolbox::default(),
        &workspace.cycle_config(),
    );
    assert!(!result.used_tool);
    assert_eq!(result.final_text, "Short reply ready.");
}

/// Verifies the no-hook weather task answers without touching any tool.
#[test]
fn weather_task_answers_with_fallbacks() {
    let workspace = TestWorkspace::new();
    let result = run_cycle(
        "what is the weather",
        &Hooks::default(),
        &Toolbox::default(),
        &workspace.cycle_config(),
    );

    assert_eq!(result.final_text, "Short reply ready.");
    assert!(!result.used_tool);
    assert!(result.gate.issues.is_empty());
    assert_eq!(
        result.trace[2],
        TraceEvent::Decide {
            source: HookSource::Fallback,
            decision: Decision::answer("Short reply ready."),
        }
    );
}

/// Verifies the blocked message never carries tool output and the trace keeps it.
#[test]
fn auth_failure_blocks_without_leaking_output() {
    let workspace = TestWorkspace::new();
    let secret_output = "401 unauthorized: token sk-leak";
    let toolbox = toolbox_with(
        vec![scripted_tool(
            "calculator",
            ToolResult::error(secret_output, ToolMeta::code(ErrorCode::Exception)),
        )],
        Vec::new(),
        env_from(&[]),
    );
    let result = run_cycle(
        "calc 2+2",
        &rule_hooks(),
        &toolbox,
        &workspace.cycle_config(),
    );

    assert!(result.blocked());
    assert_eq!(
        result.final_text,
        "Action blocked. Provide plan. Issues: TOOL_ERROR, AUTH."
    );
    assert!(!result.final_text.contains("sk-leak"));
    let codes: Vec<IssueCode> = result.gate.issues.iter().map(|issue| issue.code).collect();
    assert_eq!(codes, vec![IssueCode::ToolError, IssueCode::Auth]);
    assert_eq!(result.gate.severity, 0.95);
}

/// Verifies interrupts can be disabled so the tool error is reported instead.
#[test]
fn no_interrupts_reports_tool_error() {
    let workspace = TestWorkspace::new();
    let toolbox = toolbox_with(
        vec![scripted_tool(
            "calculator",
            ToolResult::error("forbidden", ToolMeta::code(ErrorCode::Exception)),
        )],
        Vec::new(),
        env_from(&[]),
    );
    let config = CycleConfig {
        policy: Policy {
            allow_interrupts: false,
            ..Policy::default()
        },
        ..workspace.cycle_config()
    };
    let result = run_cycle("calc 1+1", &rule_hooks(), &toolbox, &config);
    assert!(!result.gate.intervene);
    assert_eq!(result.gate.reason, "threshold exceeded");
    assert_eq!(result.final_text, "tool error: forbidden");
}

/// Verifies the strict gate escalates a data-missing outcome the standard gate lets through.
#[test]
fn strict_gate_escalates_missing_data() {
    let workspace = TestWorkspace::new();
    let hooks = || {
        Hooks::default().with_decide(|_: &str, _: &Draft, _: &RunContext| {
            let mut args = ToolArgs::new();
            args.insert("path".to_string(), "notes.txt".into());
            Decision::use_tool("read_file", args)
        })
    };
    let toolbox = || {
        toolbox_with(
            vec![scripted_tool("read_file", ToolResult::ok("record missing"))],
            Vec::new(),
            env_from(&[]),
        )
    };
    let config = |gate_mode| CycleConfig {
        policy: Policy {
            critical_threshold: 0.8,
            gate_mode,
            ..Policy::default()
        },
        ..workspace.cycle_config()
    };

    let relaxed = run_cycle("read it", &hooks(), &toolbox(), &config(GateMode::Standard));
    assert_eq!(relaxed.gate.severity, 0.7);
    assert!(!relaxed.blocked());
    assert_eq!(relaxed.final_text, "record missing");

    let escalated = run_cycle("read it", &hooks(), &toolbox(), &config(GateMode::Strict));
    assert_eq!(escalated.gate.severity, 0.9);
    assert!(escalated.blocked());
    assert_eq!(
        escalated.final_text,
        "Action blocked. Provide plan. Issues: DATA_MISSING."
    );
}

/// Verifies a scripted "y" answer lets a blocked cycle continue.
#[test]
fn user_override_unblocks_cycle() {
    let workspace = TestWorkspace::new();
    let hooks = rule_hooks()
        .with_decide(|_: &str, _: &Draft, _: &RunContext| {
            Decision::use_tool("web_search", ToolArgs::new())
        })
        .with_query_user_plan(|_: &str, gate: &Gate, _: &RunContext| {
            let mut input = Cursor::new("y\n");
            Some(query_user_plan_prompt(gate, &mut input, &mut Vec::new()))
        });
    let result = run_cycle(
        "search the web",
        &hooks,
        &Toolbox::default(),
        &workspace.cycle_config(),
    );

    assert!(result.gate.intervene);
    let plan = result.gate.user_plan.as_ref().expect("user plan");
    assert!(plan.allow_continue);
    assert!(!result.blocked());
    assert_eq!(result.final_text, "skipped action (tool missing)");
    match &result.trace[4] {
        TraceEvent::Act {
            tool,
            status,
            reason,
            ..
        } => {
            assert_eq!(tool.as_deref(), Some("web_search"));
            assert_eq!(*status, ToolStatus::Skipped);
            assert_eq!(reason.as_deref(), Some("tool missing"));
        }
        other => panic!("expected act event, got {other:?}"),
    }
}

/// Verifies secrets reach the tool through the context but never the trace.
#[test]
fn openai_chat_reports_not_wired_without_leaking_key() {
    let workspace = TestWorkspace::new();
    let env = env_from(&[(OPENAI_API_KEY, "sk-do-not-print")]);
    let toolbox = Toolbox::new(
        build_registry_by_names([OPENAI_CHAT], env.clone()),
        build_registry_by_names(Vec::<&str>::new(), env),
    );
    let hooks = Hooks::default().with_decide(|_: &str, _: &Draft, _: &RunContext| {
        Decision::use_tool(OPENAI_CHAT, ToolArgs::new())
    });
    let config = CycleConfig {
        policy: Policy {
            allow_interrupts: false,
            ..Policy::default()
        },
        ..workspace.cycle_config()
    };
    let result = run_cycle("say hi", &hooks, &toolbox, &config);

    assert_eq!(result.final_text, "tool error: not wired");
    let serialized = serde_json::to_string(&result).expect("serialize result");
    assert!(!serialized.contains("sk-do-not-print"));
    assert!(serialized.contains("NOT_WIRED"));
}

/// Verifies discovery proposals land in memory before the cycle record.
#[test]
fn discovery_records_proposals_for_next_cycle() {
    let workspace = TestWorkspace::new();
    let toolbox = toolbox_with(
        Vec::new(),
        vec!["read_file", "write_file", "openai_chat"],
        env_from(&[]),
    );
    let result = run_cycle(
        "read the notes file",
        &Hooks::default(),
        &toolbox,
        &workspace.cycle_config(),
    );

    let names: Vec<&str> = result
        .discovered
        .iter()
        .map(|tool| tool.name.as_str())
        .collect();
    assert_eq!(names, vec!["read_file", "write_file"]);
    assert_eq!(
        result.final_text,
        "Short reply ready. | Next cycle candidates: read_file, write_file"
    );

    let records = workspace.records();
    assert_eq!(records.len(), 2);
    match &records[0].event {
        MemoryEvent::ToolProposals { candidates, .. } => assert_eq!(candidates.len(), 2),
        other => panic!("expected proposals record, got {other:?}"),
    }
}

/// Verifies a custom gate hook replaces the fallback and is reported as a hook.
#[test]
fn gate_hook_replaces_fallback() {
    let workspace = TestWorkspace::new();
    let hooks = Hooks::default().with_evaluate_critical(|view: &CycleView<'_>, policy: &Policy| {
        assert_eq!(view.task, "anything");
        Gate::from_issues(Vec::new(), policy)
    });
    let result = run_cycle(
        "anything",
        &hooks,
        &Toolbox::default(),
        &workspace.cycle_config(),
    );
    match &result.trace[6] {
        TraceEvent::Gate { source, gate } => {
            assert_eq!(*source, HookSource::Hook);
            assert_eq!(gate.reason, "no critical issues");
        }
        other => panic!("expected gate event, got {other:?}"),
    }
}
