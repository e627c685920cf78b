//! Configuration management for the frequency control layer.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::{ControlError, Result};
use crate::gate::FailurePolicy;
use crate::ratelimit::{RawRuleSpec, RuleDefaults, TimeUnit};

/// Prefix of environment variables that override file settings.
pub const ENV_PREFIX: &str = "FREQCTL";

/// Main configuration, loaded once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlConfig {
    /// Global kill switch; when false every call is admitted untouched
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Fallback rule parameters
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Counting backend settings
    #[serde(default)]
    pub backend: BackendConfig,

    /// Guarded operations and their call-site overrides
    #[serde(default)]
    pub operations: Vec<OperationConfig>,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            defaults: DefaultsConfig::default(),
            backend: BackendConfig::default(),
            operations: Vec::new(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

/// Fallback rule parameters.
///
/// Signed so that nonsensical values reach validation instead of failing
/// deserialization with an opaque message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    #[serde(default)]
    pub prefix: String,

    #[serde(default = "default_window_length")]
    pub window_length: i64,

    #[serde(default = "default_time_unit")]
    pub time_unit: TimeUnit,

    #[serde(default = "default_max_count")]
    pub max_count: i64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            window_length: default_window_length(),
            time_unit: default_time_unit(),
            max_count: default_max_count(),
        }
    }
}

fn default_window_length() -> i64 {
    1
}

fn default_time_unit() -> TimeUnit {
    TimeUnit::Second
}

fn default_max_count() -> i64 {
    100
}

/// Counting backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// How often expired counters are swept, in seconds
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// What to do when the backend cannot be reached
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

fn default_sweep_interval() -> u64 {
    60
}

impl BackendConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// A guarded operation and its overrides. Unset fields fall back to defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationConfig {
    pub route: String,

    #[serde(default)]
    pub prefix: String,

    #[serde(default)]
    pub window_length: i64,

    #[serde(default)]
    pub time_unit: Option<TimeUnit>,

    #[serde(default)]
    pub max_count: i64,
}

impl OperationConfig {
    /// Convert to the call-site spec attached to this operation.
    pub fn to_spec(&self) -> RawRuleSpec {
        RawRuleSpec {
            prefix_override: self.prefix.clone(),
            window_length_override: self.window_length,
            time_unit_override: self.time_unit,
            max_count_override: self.max_count,
        }
    }
}

impl ControlConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading frequency control configuration");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: ControlConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from an optional YAML file layered under
    /// `FREQCTL_*` environment variables (`__` separates nested keys, e.g.
    /// `FREQCTL_DEFAULTS__MAX_COUNT=50`).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = ::config::Config::builder();

        if let Some(path) = path {
            info!(path = %path.display(), "Loading frequency control configuration");
            builder = builder.add_source(
                ::config::File::from(path)
                    .format(::config::FileFormat::Yaml)
                    .required(true),
            );
        }

        let config: ControlConfig = builder
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Fail fast on settings that would otherwise surface per request.
    pub fn validate(&self) -> Result<()> {
        self.rule_defaults()?;

        if self.backend.sweep_interval_secs == 0 {
            return Err(ControlError::Config(
                "backend.sweep_interval_secs must be positive".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for op in &self.operations {
            if op.route.is_empty() {
                return Err(ControlError::Config(
                    "operation route must not be empty".to_string(),
                ));
            }
            if !seen.insert(op.route.as_str()) {
                return Err(ControlError::Config(format!(
                    "operation {} registered twice",
                    op.route
                )));
            }
        }

        Ok(())
    }

    /// Build the validated process-wide defaults.
    pub fn rule_defaults(&self) -> Result<RuleDefaults> {
        RuleDefaults::new(
            self.enabled,
            self.defaults.prefix.clone(),
            self.defaults.window_length,
            self.defaults.time_unit,
            self.defaults.max_count,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ControlConfig::default();
        assert!(config.enabled);
        assert!(config.validate().is_ok());

        let defaults = config.rule_defaults().unwrap();
        assert_eq!(defaults.window_length(), 1);
        assert_eq!(defaults.time_unit(), TimeUnit::Second);
        assert_eq!(defaults.max_count(), 100);
        assert_eq!(config.backend.failure_policy, FailurePolicy::FailOpen);
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
enabled: true
defaults:
  prefix: ""
  window_length: 60
  time_unit: seconds
  max_count: 100
backend:
  sweep_interval_secs: 30
  failure_policy: fail_closed
operations:
  - route: /api/login
    max_count: 5
    window_length: 1
    time_unit: minute
  - route: /api/search
"#;
        let config = ControlConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.defaults.window_length, 60);
        assert_eq!(config.backend.sweep_interval(), Duration::from_secs(30));
        assert_eq!(config.backend.failure_policy, FailurePolicy::FailClosed);
        assert_eq!(config.operations.len(), 2);

        let login = config.operations[0].to_spec();
        assert_eq!(login.max_count_override, 5);
        assert_eq!(login.time_unit_override, Some(TimeUnit::Minute));

        let search = config.operations[1].to_spec();
        assert_eq!(search, RawRuleSpec::new());
    }

    #[test]
    fn test_partial_defaults_fall_back() {
        let config = ControlConfig::from_yaml("defaults:\n  max_count: 7\n").unwrap();
        let defaults = config.rule_defaults().unwrap();
        assert_eq!(defaults.max_count(), 7);
        assert_eq!(defaults.window_length(), 1);
    }

    #[test]
    fn test_incomplete_defaults_rejected() {
        let err = ControlConfig::from_yaml("defaults:\n  max_count: 0\n").unwrap_err();
        assert!(matches!(err, ControlError::ConfigurationIncomplete(_)));

        let err = ControlConfig::from_yaml("defaults:\n  window_length: -5\n").unwrap_err();
        assert!(matches!(err, ControlError::ConfigurationIncomplete(_)));
    }

    #[test]
    fn test_duplicate_operation_rejected() {
        let yaml = r#"
operations:
  - route: /a
  - route: /a
"#;
        let err = ControlConfig::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, ControlError::Config(_)));
    }

    #[test]
    fn test_malformed_yaml_rejected() {
        let err = ControlConfig::from_yaml("defaults: [").unwrap_err();
        assert!(matches!(err, ControlError::Config(_)));
    }

    #[test]
    fn test_from_file() {
        let path = std::env::temp_dir().join(format!(
            "frequency-control-from-file-{}.yaml",
            std::process::id()
        ));
        std::fs::write(&path, "enabled: false\noperations:\n  - route: /x\n").unwrap();

        let config = ControlConfig::from_file(&path);
        std::fs::remove_file(&path).unwrap();

        let config = config.unwrap();
        assert!(!config.enabled);
        assert!(!config.rule_defaults().unwrap().enabled());
        assert_eq!(config.operations[0].route, "/x");

        let err = ControlConfig::from_file("/nonexistent/frequency-control.yaml").unwrap_err();
        assert!(matches!(err, ControlError::Io(_)));
    }

    #[test]
    fn test_load_file_with_env_override() {
        let path = std::env::temp_dir().join(format!(
            "frequency-control-load-{}.yaml",
            std::process::id()
        ));
        std::fs::write(
            &path,
            "defaults:\n  max_count: 10\n  time_unit: minute\noperations:\n  - route: /api/login\n    max_count: 3\n",
        )
        .unwrap();

        std::env::set_var("FREQCTL_DEFAULTS__MAX_COUNT", "25");
        let config = ControlConfig::load(Some(&path));
        std::env::remove_var("FREQCTL_DEFAULTS__MAX_COUNT");
        std::fs::remove_file(&path).unwrap();

        let config = config.unwrap();
        assert_eq!(config.defaults.max_count, 25);
        assert_eq!(config.defaults.time_unit, TimeUnit::Minute);
        assert_eq!(config.operations.len(), 1);
        assert_eq!(config.operations[0].max_count, 3);
    }
}
