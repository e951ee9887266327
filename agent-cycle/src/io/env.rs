//! Environment-variable lookup used by tool wrappers.
//!
//! Tools resolve their required variables at invocation time through an
//! [`EnvSource`]. The CLI uses [`ProcessEnv`]; tests pass an in-memory map.

use std::collections::BTreeMap;

/// Abstraction over where environment variables come from.
pub trait EnvSource: Send + Sync {
    /// Value of `name`, or `None` when unset.
    fn var(&self, name: &str) -> Option<String>;
}

/// Reads the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl EnvSource for BTreeMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// Split `names` into resolved (non-empty) values and missing names.
pub fn resolve_vars(
    env: &dyn EnvSource,
    names: &[String],
) -> (BTreeMap<String, String>, Vec<String>) {
    let mut resolved = BTreeMap::new();
    let mut missing = Vec::new();
    for name in names {
        match env.var(name) {
            Some(value) if !value.is_empty() => {
                resolved.insert(name.clone(), value);
            }
            _ => missing.push(name.clone()),
        }
    }
    (resolved, missing)
}
