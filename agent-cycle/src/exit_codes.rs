//! Stable exit codes for the `agent-cycle` CLI.

/// The cycle produced normal output.
pub const OK: i32 = 0;
/// Invalid arguments or configuration.
pub const INVALID: i32 = 1;
/// The gate intervened and the cycle ended with the blocked message.
pub const BLOCKED: i32 = 2;
