//! Injected environment snapshot.
//!
//! The process environment is read exactly once, at the worker boundary,
//! and passed down as an [`Environment`] value. Pipeline stages look up
//! prefix-selected credentials here instead of touching `std::env`, which
//! keeps them deterministic under test.

use std::collections::HashMap;

/// Immutable key/value snapshot of environment-style configuration.
///
/// Empty values are treated as unset.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    vars: HashMap<String, String>,
}

impl Environment {
    /// Snapshot the current process environment.
    pub fn from_process() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    /// Build a snapshot from explicit pairs (tests, embedding hosts).
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Look up `key`, ignoring empty values.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Look up `{prefix}{key}`.
    pub fn get_prefixed(&self, prefix: &str, key: &str) -> Option<&str> {
        self.get(&prefixed_key(prefix, key))
    }
}

/// The variable name selected by a per-job key prefix.
pub fn prefixed_key(prefix: &str, key: &str) -> String {
    format!("{prefix}{key}")
}
