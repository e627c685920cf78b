//! Rule data model: call-site specs, process-wide defaults and resolved rules.
//!
//! A [`RawRuleSpec`] is attached to a guarded operation and may leave any field
//! unset. [`RuleDefaults`] fills the gaps. The result of merging the two for a
//! concrete caller is a [`Rule`], which is always fully specified.

use serde::Serialize;
use std::time::Duration;

use super::counter::TimeUnit;
use crate::error::{ControlError, Result};

/// Call-site rule specification.
///
/// Empty strings and non-positive numbers mean "unset".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRuleSpec {
    pub prefix_override: String,
    pub window_length_override: i64,
    pub time_unit_override: Option<TimeUnit>,
    pub max_count_override: i64,
}

impl RawRuleSpec {
    /// A spec with every field unset.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix_override = prefix.into();
        self
    }

    pub fn window_length(mut self, length: i64) -> Self {
        self.window_length_override = length;
        self
    }

    pub fn time_unit(mut self, unit: TimeUnit) -> Self {
        self.time_unit_override = Some(unit);
        self
    }

    pub fn max_count(mut self, count: i64) -> Self {
        self.max_count_override = count;
        self
    }

    /// Shorthand for a quota of `max_count` per `window_length` `unit`s.
    pub fn per(max_count: i64, window_length: i64, unit: TimeUnit) -> Self {
        Self::new()
            .max_count(max_count)
            .window_length(window_length)
            .time_unit(unit)
    }
}

/// Process-wide fallback configuration.
///
/// Only obtainable through [`RuleDefaults::new`], which rejects incomplete
/// values, so every instance is fully specified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleDefaults {
    enabled: bool,
    prefix: String,
    window_length: u64,
    time_unit: TimeUnit,
    max_count: u64,
}

impl RuleDefaults {
    /// Validate and build defaults.
    ///
    /// Fails with [`ControlError::ConfigurationIncomplete`] when the window
    /// length or max count is not positive.
    pub fn new(
        enabled: bool,
        prefix: impl Into<String>,
        window_length: i64,
        time_unit: TimeUnit,
        max_count: i64,
    ) -> Result<Self> {
        if window_length <= 0 {
            return Err(ControlError::ConfigurationIncomplete(format!(
                "default window_length must be positive, got {}",
                window_length
            )));
        }
        if max_count <= 0 {
            return Err(ControlError::ConfigurationIncomplete(format!(
                "default max_count must be positive, got {}",
                max_count
            )));
        }

        Ok(Self {
            enabled,
            prefix: prefix.into(),
            window_length: window_length as u64,
            time_unit,
            max_count: max_count as u64,
        })
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn window_length(&self) -> u64 {
        self.window_length
    }

    pub fn time_unit(&self) -> TimeUnit {
        self.time_unit
    }

    pub fn max_count(&self) -> u64 {
        self.max_count
    }
}

/// A fully-resolved rule for one admission check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rule {
    /// Counter key, `prefix + "_" + identity`
    pub key: String,
    /// Window length in `time_unit`s, always positive
    pub window_length: u64,
    pub time_unit: TimeUnit,
    /// Maximum admitted occurrences per window, always positive
    pub max_count: u64,
}

impl Rule {
    /// Length of this rule's window.
    pub fn window(&self) -> Duration {
        self.time_unit.duration(self.window_length)
    }
}
