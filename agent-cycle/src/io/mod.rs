//! I/O helpers: environment lookup, the memory log and configuration.

pub mod config;
pub mod env;
pub mod memory;
