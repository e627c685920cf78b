//! Interceptor wrapping guarded operations with an admission check.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::trace;

use super::admission::{Admission, AdmissionGate, Rejection};
use super::registry::OperationRegistry;
use crate::ratelimit::CountingStrategy;

/// Derive a caller identity from a peer address. The port is ignored so that
/// reconnects from the same host share a counter.
pub fn ip_identity(addr: &SocketAddr) -> String {
    addr.ip().to_string()
}

/// Boundary between a service and the admission gate.
///
/// Routes missing from the registry are not guarded and pass straight through.
pub struct Interceptor<S> {
    gate: Arc<AdmissionGate<S>>,
    registry: Arc<OperationRegistry>,
}

impl<S> Clone for Interceptor<S> {
    fn clone(&self) -> Self {
        Self {
            gate: Arc::clone(&self.gate),
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<S: CountingStrategy> Interceptor<S> {
    pub fn new(gate: Arc<AdmissionGate<S>>, registry: Arc<OperationRegistry>) -> Self {
        Self { gate, registry }
    }

    pub fn gate(&self) -> &AdmissionGate<S> {
        &self.gate
    }

    pub fn registry(&self) -> &OperationRegistry {
        &self.registry
    }

    /// Admission decision for a call to `route` without running anything.
    pub async fn check(&self, route: &str, identity: &str) -> Result<Admission, Rejection> {
        match self.registry.get(route) {
            Some(spec) => self.gate.admit(route, spec, identity).await,
            None => {
                trace!(route = %route, "Route not guarded");
                Ok(Admission::Bypassed)
            }
        }
    }

    /// Run `operation` if the call is admitted, otherwise return the rejection
    /// without polling it.
    pub async fn guard<F, T>(
        &self,
        route: &str,
        identity: &str,
        operation: F,
    ) -> Result<T, Rejection>
    where
        F: Future<Output = T>,
    {
        self.check(route, identity).await?;
        Ok(operation.await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::{FixedWindow, InMemoryBackend, RawRuleSpec, RuleDefaults, TimeUnit};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn interceptor(enabled: bool) -> Interceptor<FixedWindow<InMemoryBackend>> {
        let defaults =
            Arc::new(RuleDefaults::new(enabled, "", 60, TimeUnit::Second, 100).unwrap());
        let strategy = Arc::new(FixedWindow::new(Arc::new(InMemoryBackend::new())));
        let gate = Arc::new(AdmissionGate::new(defaults, strategy));

        let mut registry = OperationRegistry::new();
        registry.register("/api/login", RawRuleSpec::new().max_count(2));
        Interceptor::new(gate, Arc::new(registry))
    }

    #[test]
    fn test_ip_identity_drops_port() {
        let addr: SocketAddr = "10.0.0.1:53211".parse().unwrap();
        assert_eq!(ip_identity(&addr), "10.0.0.1");

        let addr: SocketAddr = "[::1]:8080".parse().unwrap();
        assert_eq!(ip_identity(&addr), "::1");
    }

    #[tokio::test]
    async fn test_guard_runs_operation_until_rejected() {
        let interceptor = interceptor(true);
        let runs = AtomicUsize::new(0);

        for _ in 0..2 {
            let result = interceptor
                .guard("/api/login", "10.0.0.1", async {
                    runs.fetch_add(1, Ordering::SeqCst);
                    "ok"
                })
                .await;
            assert_eq!(result, Ok("ok"));
        }

        let result = interceptor
            .guard("/api/login", "10.0.0.1", async {
                runs.fetch_add(1, Ordering::SeqCst);
                "ok"
            })
            .await;
        assert!(result.is_err());
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unguarded_route_passes_through() {
        let interceptor = interceptor(true);
        for _ in 0..10 {
            let admission = interceptor.check("/health", "10.0.0.1").await;
            assert_eq!(admission, Ok(Admission::Bypassed));
        }
        assert_eq!(interceptor.gate().strategy().backend().counter_count(), 0);
    }

    #[tokio::test]
    async fn test_disabled_interceptor_admits_everything() {
        let interceptor = interceptor(false);
        for _ in 0..10 {
            let result = interceptor.guard("/api/login", "10.0.0.1", async { 1 }).await;
            assert_eq!(result, Ok(1));
        }
        assert_eq!(interceptor.gate().strategy().backend().counter_count(), 0);
    }
}
