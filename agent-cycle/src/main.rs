//! Single-pass agent cycle CLI.
//!
//! Runs one cycle for the task given on the command line, prints the final
//! text and optionally the stage trace. Settings come from
//! `.agents/config.toml` when present; flags override them.

use std::path::PathBuf;
use std::sync::Arc;

use agent_cycle::core::types::GateMode;
use agent_cycle::cycle::{CycleConfig, Toolbox, run_cycle};
use agent_cycle::exit_codes;
use agent_cycle::hooks::Hooks;
use agent_cycle::io::config::{AgentConfig, DEFAULT_CONFIG_PATH, load_config, write_config};
use agent_cycle::io::env::{EnvSource, ProcessEnv};
use agent_cycle::io::memory::MemoryLog;
use agent_cycle::logging;
use agent_cycle::rules::{decide_simple, draft_rule_based, memory_recall, query_user_plan_stdin};
use agent_cycle::tools::build_registry_by_names;
use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(name = "agent-cycle", version, about = "Run one pass of the agent cycle")]
struct Cli {
    /// Task description; words are joined by single spaces.
    #[arg(required = true, num_args = 1..)]
    task: Vec<String>,

    /// Comma list of active tools.
    #[arg(long, value_name = "LIST")]
    tools: Option<String>,

    /// Comma list of catalog tools offered to discovery.
    #[arg(long, value_name = "LIST")]
    catalog: Option<String>,

    /// Severity at or above which the gate intervenes.
    #[arg(long, value_name = "FLOAT")]
    critical_threshold: Option<f64>,

    /// Never intervene, whatever the severity.
    #[arg(long)]
    no_interrupts: bool,

    /// Tool invocations allowed; 0 disables the act stage.
    #[arg(long, value_name = "N")]
    max_actions: Option<u32>,

    /// Print the stage trace as pretty JSON after the final text.
    #[arg(long)]
    trace: bool,

    /// Floor AUTH and DATA_MISSING issues at severity 0.9.
    #[arg(long)]
    strict_gate: bool,

    /// Ask on stdin for a plan when the gate intervenes.
    #[arg(long)]
    interactive: bool,

    /// Recall the last N memory records before drafting.
    #[arg(long, value_name = "N")]
    recall: Option<usize>,

    /// Memory log path.
    #[arg(long, value_name = "PATH")]
    memory: Option<PathBuf>,

    /// Config file path.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Write the merged configuration back to the config file before running.
    #[arg(long)]
    save_config: bool,
}

fn main() {
    logging::init();
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = if err.use_stderr() {
                exit_codes::INVALID
            } else {
                exit_codes::OK
            };
            let _ = err.print();
            std::process::exit(code);
        }
    };
    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    let task = cli.task.join(" ");
    if task.trim().is_empty() {
        bail!("task must not be empty");
    }

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let mut config = load_config(&config_path)?;
    apply_overrides(&mut config, &cli);
    config.validate().context("invalid arguments")?;
    debug!(?config, "resolved configuration");
    if cli.save_config {
        write_config(&config_path, &config)?;
        info!(path = %config_path.display(), "saved configuration");
    }

    let env: Arc<dyn EnvSource> = Arc::new(ProcessEnv);
    let toolbox = Toolbox::new(
        build_registry_by_names(&config.tools, Arc::clone(&env)),
        build_registry_by_names(&config.catalog, env),
    );
    let hooks = build_hooks(&cli, &config);

    let result = run_cycle(&task, &hooks, &toolbox, &CycleConfig::from(&config));
    println!("{}", result.final_text);
    if cli.trace {
        let trace = serde_json::to_string_pretty(&result.trace).context("serialize trace")?;
        println!("{trace}");
    }
    Ok(if result.blocked() {
        exit_codes::BLOCKED
    } else {
        exit_codes::OK
    })
}

fn apply_overrides(config: &mut AgentConfig, cli: &Cli) {
    if let Some(tools) = &cli.tools {
        config.tools = split_list(tools);
    }
    if let Some(catalog) = &cli.catalog {
        config.catalog = split_list(catalog);
    }
    if let Some(threshold) = cli.critical_threshold {
        config.policy.critical_threshold = threshold;
    }
    if cli.no_interrupts {
        config.policy.allow_interrupts = false;
    }
    if cli.strict_gate {
        config.policy.gate_mode = GateMode::Strict;
    }
    if let Some(max_actions) = cli.max_actions {
        config.max_actions = max_actions;
    }
    if let Some(memory) = &cli.memory {
        config.memory_path.clone_from(memory);
    }
}

fn build_hooks(cli: &Cli, config: &AgentConfig) -> Hooks {
    let mut hooks = Hooks::default()
        .with_draft(draft_rule_based)
        .with_decide(decide_simple);
    if cli.interactive {
        hooks = hooks.with_query_user_plan(query_user_plan_stdin);
    }
    if let Some(limit) = cli.recall {
        hooks = hooks.with_recall(memory_recall(MemoryLog::new(&config.memory_path), limit));
    }
    hooks
}

/// Split a comma list, dropping blank entries.
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
