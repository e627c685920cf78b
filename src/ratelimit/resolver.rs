//! Rule resolution and counter key generation.

use std::sync::Arc;

use super::rules::{RawRuleSpec, Rule, RuleDefaults};

/// Separator between the resolved prefix and the caller identity.
pub const KEY_SEPARATOR: &str = "_";

/// Merges call-site specs with process-wide defaults.
///
/// Resolution is total: every field falls back to a default that is
/// guaranteed to be present, so it never fails.
#[derive(Debug, Clone)]
pub struct RuleResolver {
    defaults: Arc<RuleDefaults>,
}

impl RuleResolver {
    pub fn new(defaults: Arc<RuleDefaults>) -> Self {
        Self { defaults }
    }

    pub fn defaults(&self) -> &RuleDefaults {
        &self.defaults
    }

    /// Resolve the rule for a call to `route` made by `identity`.
    pub fn resolve(&self, spec: &RawRuleSpec, route: &str, identity: &str) -> Rule {
        let defaults = &*self.defaults;

        let max_count = positive(spec.max_count_override).unwrap_or(defaults.max_count());
        let window_length =
            positive(spec.window_length_override).unwrap_or(defaults.window_length());
        let time_unit = spec.time_unit_override.unwrap_or(defaults.time_unit());

        Rule {
            key: Self::key(self.prefix_for(spec, route), identity),
            window_length,
            time_unit,
            max_count,
        }
    }

    /// Pick the key prefix: call-site override, then default, then the route.
    fn prefix_for<'a>(&'a self, spec: &'a RawRuleSpec, route: &'a str) -> &'a str {
        if !spec.prefix_override.is_empty() {
            spec.prefix_override.as_str()
        } else if !self.defaults.prefix().is_empty() {
            self.defaults.prefix()
        } else {
            route
        }
    }

    /// Bind a prefix to a caller identity.
    pub fn key(prefix: &str, identity: &str) -> String {
        let mut key = String::with_capacity(prefix.len() + KEY_SEPARATOR.len() + identity.len());
        key.push_str(prefix);
        key.push_str(KEY_SEPARATOR);
        key.push_str(identity);
        key
    }
}

fn positive(value: i64) -> Option<u64> {
    (value > 0).then_some(value as u64)
}
