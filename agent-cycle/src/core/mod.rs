//! Deterministic, pure logic shared by the cycle stages.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod context;
pub mod expression;
pub mod fallbacks;
pub mod finalize;
pub mod gate;
pub mod types;
