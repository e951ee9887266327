//! Single-pass agent cycle.
//!
//! One call to [`cycle::run_cycle`] drafts a plan for a task, decides on an
//! action, invokes at most one tool, scores the outcome against an
//! intervention policy and produces a final text. Each stage is served by a
//! caller hook or a built-in fallback. The architecture keeps a strict split:
//!
//! - **[`core`]**: Pure, deterministic logic (types, fallbacks, the gate, the
//!   expression evaluator). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting helpers (environment, memory log, config).
//!
//! [`tools`] and [`hooks`] are the extension seams; [`cycle`] wires them
//! together and [`rules`] holds the hooks the CLI uses.

pub mod core;
pub mod cycle;
pub mod exit_codes;
pub mod hooks;
pub mod io;
pub mod logging;
pub mod rules;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod tools;
