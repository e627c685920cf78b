//! Registry of guarded operations and their call-site rule specs.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::config::ControlConfig;
use crate::ratelimit::RawRuleSpec;

/// Maps an operation's route to the [`RawRuleSpec`] attached to it.
///
/// Populated at startup; lookups on the hot path only read.
#[derive(Debug, Clone, Default)]
pub struct OperationRegistry {
    operations: HashMap<String, Arc<RawRuleSpec>>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from the `operations` section of a configuration.
    pub fn from_config(config: &ControlConfig) -> Self {
        let mut registry = Self::new();
        for op in &config.operations {
            registry.register(op.route.clone(), op.to_spec());
        }
        registry
    }

    /// Guard `route` with `spec`, replacing any previous spec.
    pub fn register(&mut self, route: impl Into<String>, spec: RawRuleSpec) -> &mut Self {
        let route = route.into();
        debug!(route = %route, spec = ?spec, "Registering guarded operation");
        self.operations.insert(route, Arc::new(spec));
        self
    }

    pub fn get(&self, route: &str) -> Option<&Arc<RawRuleSpec>> {
        self.operations.get(route)
    }

    pub fn is_guarded(&self, route: &str) -> bool {
        self.operations.contains_key(route)
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn routes(&self) -> impl Iterator<Item = &str> {
        self.operations.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::TimeUnit;

    #[test]
    fn test_register_and_lookup() {
        let mut registry = OperationRegistry::new();
        registry
            .register("/api/login", RawRuleSpec::per(5, 1, TimeUnit::Minute))
            .register("/api/search", RawRuleSpec::new());

        assert_eq!(registry.len(), 2);
        assert!(registry.is_guarded("/api/login"));
        assert!(!registry.is_guarded("/api/other"));
        assert_eq!(registry.get("/api/login").unwrap().max_count_override, 5);
    }

    #[test]
    fn test_from_config() {
        let config = ControlConfig::from_yaml(
            "operations:\n  - route: /a\n    prefix: shared\n  - route: /b\n    prefix: shared\n",
        )
        .unwrap();
        let registry = OperationRegistry::from_config(&config);

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("/a").unwrap().prefix_override, "shared");
        let mut routes: Vec<_> = registry.routes().collect();
        routes.sort();
        assert_eq!(routes, vec!["/a", "/b"]);
    }
}
