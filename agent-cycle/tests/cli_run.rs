//! CLI tests for the `agent-cycle` binary.
//!
//! Spawns the binary in a scratch directory and checks stdout, the memory
//! log it leaves behind, and the exit codes for normal, blocked and invalid
//! runs.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use agent_cycle::exit_codes;
use agent_cycle::io::config::load_config;
use serde_json::Value;

fn agent_cycle(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_agent-cycle"))
        .current_dir(dir)
        .env_remove("OPENAI_API_KEY")
        .env_remove("RUST_LOG")
        .args(args)
        .output()
        .expect("run agent-cycle")
}

fn stdout(output: &Output) -> String {
    String::from_utf8(output.stdout.clone()).expect("utf-8 stdout")
}

#[test]
fn percent_task_prints_result() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = agent_cycle(temp.path(), &["calc", "19.5%", "of", "349"]);

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert_eq!(stdout(&output), "68.055\n");

    let memory = fs::read_to_string(temp.path().join(".agents/memory.jsonl")).expect("memory");
    let last: Value = serde_json::from_str(memory.lines().last().expect("record")).expect("json");
    assert_eq!(last["type"], "cycle");
    assert_eq!(last["final"], "68.055");
}

#[test]
fn deeply_nested_expression_blocks_without_crashing() {
    let temp = tempfile::tempdir().expect("tempdir");
    let expression = format!("{}1{}", "(".repeat(5_000), ")".repeat(5_000));
    let output = agent_cycle(temp.path(), &["--catalog", "", "calc", &expression]);

    assert_eq!(output.status.code(), Some(exit_codes::BLOCKED));
    assert_eq!(
        stdout(&output),
        "Action blocked. Provide plan. Issues: TOOL_ERROR.\n"
    );
}

#[test]
fn answer_task_lists_catalog_candidates() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = agent_cycle(temp.path(), &["please", "write", "a", "file"]);

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert_eq!(
        stdout(&output),
        "Short reply drafted. | Next cycle candidates: read_file, write_file\n"
    );
}

#[test]
fn trace_flag_prints_json_after_final_text() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = agent_cycle(
        temp.path(),
        &["--trace", "--catalog", "", "calc", "(2+3)*4"],
    );

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let text = stdout(&output);
    let (first, rest) = text.split_once('\n').expect("final line");
    assert_eq!(first, "20");
    let trace: Value = serde_json::from_str(rest).expect("trace json");
    let steps: Vec<&str> = trace
        .as_array()
        .expect("trace array")
        .iter()
        .map(|event| event["step"].as_str().expect("step"))
        .collect();
    assert_eq!(
        steps,
        vec![
            "recall", "draft", "decide", "discover", "act", "reflect", "gate", "finalize",
            "persist"
        ]
    );
}

#[test]
fn missing_tool_exits_blocked() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = agent_cycle(temp.path(), &["--tools", "read_file", "calc", "1+1"]);

    assert_eq!(output.status.code(), Some(exit_codes::BLOCKED));
    assert_eq!(
        stdout(&output),
        "Action blocked. Provide plan. Issues: TOOL_MISSING.\n"
    );
}

#[test]
fn no_interrupts_reports_skipped_action() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = agent_cycle(
        temp.path(),
        &["--tools", "read_file", "--no-interrupts", "calc", "1+1"],
    );

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert_eq!(stdout(&output), "skipped action (tool missing)\n");
}

#[test]
fn interactive_override_continues() {
    let temp = tempfile::tempdir().expect("tempdir");
    let mut child = Command::new(env!("CARGO_BIN_EXE_agent-cycle"))
        .current_dir(temp.path())
        .args(["--interactive", "--max-actions", "0", "calc", "7*6"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn agent-cycle");
    child
        .stdin
        .take()
        .expect("stdin")
        .write_all(b"y\n")
        .expect("answer prompt");
    let output = child.wait_with_output().expect("wait");

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert_eq!(stdout(&output), "skipped action (tool missing)\n");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Issues: TOOL_MISSING. Type 'y' to continue anyway"));
}

#[test]
fn config_file_sets_defaults_and_flags_override() {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::create_dir_all(temp.path().join(".agents")).expect("mkdir");
    fs::write(
        temp.path().join(".agents/config.toml"),
        "max_actions = 0\ncatalog = []\n\n[policy]\nallow_interrupts = false\n",
    )
    .expect("write config");

    let output = agent_cycle(temp.path(), &["calc", "2+2"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert_eq!(stdout(&output), "skipped action (tool missing)\n");

    let output = agent_cycle(temp.path(), &["--max-actions", "1", "calc", "2+2"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert_eq!(stdout(&output), "4\n");
}

#[test]
fn save_config_persists_merged_flags() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = agent_cycle(
        temp.path(),
        &[
            "--save-config",
            "--max-actions",
            "0",
            "--critical-threshold",
            "0.8",
            "--catalog",
            "",
            "calc",
            "2+2",
        ],
    );
    assert_eq!(output.status.code(), Some(exit_codes::BLOCKED));

    let config =
        load_config(&temp.path().join(".agents/config.toml")).expect("load saved config");
    assert_eq!(config.max_actions, 0);
    assert_eq!(config.policy.critical_threshold, 0.8);
    assert!(config.catalog.is_empty());

    // The saved budget applies to the next run without flags.
    let output = agent_cycle(temp.path(), &["calc", "2+2"]);
    assert_eq!(output.status.code(), Some(exit_codes::BLOCKED));
    assert_eq!(
        stdout(&output),
        "Action blocked. Provide plan. Issues: TOOL_MISSING.\n"
    );
}

#[test]
fn custom_memory_path_is_used() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = agent_cycle(
        temp.path(),
        &["--memory", "logs/mem.jsonl", "--catalog", "", "hello"],
    );

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert!(temp.path().join("logs/mem.jsonl").is_file());
    assert!(!temp.path().join(".agents/memory.jsonl").exists());
}

#[test]
fn invalid_threshold_exits_invalid() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = agent_cycle(temp.path(), &["--critical-threshold", "2", "calc", "1+1"]);

    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("critical_threshold"));
}

#[test]
fn missing_task_exits_invalid() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = agent_cycle(temp.path(), &[]);
    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
}
