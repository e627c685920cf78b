//! Admission gate: resolve the rule, consult the counting strategy, decide.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, instrument, trace, warn};

use crate::ratelimit::{
    CountingStrategy, Decision, RawRuleSpec, Rule, RuleDefaults, RuleResolver, TimeUnit,
};

/// Behaviour when the counting backend cannot be reached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Admit the call and log the fault, protecting availability.
    #[default]
    FailOpen,
    /// Reject the call, protecting the guarded resource.
    FailClosed,
}

/// Successful outcome of [`AdmissionGate::admit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Frequency control is disabled; nothing was counted.
    Bypassed,
    /// Counted and within quota.
    Admitted { remaining: u64, resets_in: Duration },
    /// The backend failed and the fail-open policy let the call through.
    FailedOpen,
}

/// Why a call was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    QuotaExceeded,
    BackendUnavailable,
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionReason::QuotaExceeded => f.write_str("quota exceeded"),
            RejectionReason::BackendUnavailable => f.write_str("counting backend unavailable"),
        }
    }
}

/// Structured rejection handed back to the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("too many requests to {route}, please retry later ({reason})")]
pub struct Rejection {
    pub route: String,
    pub identity: String,
    pub max_count: u64,
    pub window_length: u64,
    pub time_unit: TimeUnit,
    pub reason: RejectionReason,
    /// Time until the limiting window resets, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
}

impl Rejection {
    fn new(route: &str, identity: &str, rule: &Rule, reason: RejectionReason) -> Self {
        Self {
            route: route.to_string(),
            identity: identity.to_string(),
            max_count: rule.max_count,
            window_length: rule.window_length,
            time_unit: rule.time_unit,
            reason,
            retry_after_ms: None,
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        self.retry_after_ms.map(Duration::from_millis)
    }

    /// JSON body for a transport-level error response.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{{\"error\":\"{}\"}}", self))
    }
}

/// Ties rule resolution and counting together for each guarded call.
///
/// Built once at startup and shared by every request task.
pub struct AdmissionGate<S> {
    resolver: RuleResolver,
    strategy: Arc<S>,
    failure_policy: FailurePolicy,
}

impl<S: CountingStrategy> AdmissionGate<S> {
    pub fn new(defaults: Arc<RuleDefaults>, strategy: Arc<S>) -> Self {
        Self {
            resolver: RuleResolver::new(defaults),
            strategy,
            failure_policy: FailurePolicy::default(),
        }
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn enabled(&self) -> bool {
        self.resolver.defaults().enabled()
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.failure_policy
    }

    pub fn strategy(&self) -> &Arc<S> {
        &self.strategy
    }

    /// Decide whether a call to `route` by `identity` may proceed.
    #[instrument(skip(self, spec), level = "trace")]
    pub async fn admit(
        &self,
        route: &str,
        spec: &RawRuleSpec,
        identity: &str,
    ) -> Result<Admission, Rejection> {
        if !self.enabled() {
            return Ok(Admission::Bypassed);
        }

        let rule = self.resolver.resolve(spec, route, identity);
        trace!(key = %rule.key, max_count = rule.max_count, "Resolved rule");

        match self.strategy.check(&rule).await {
            Ok(Decision::Admit {
                remaining,
                resets_in,
            }) => Ok(Admission::Admitted {
                remaining,
                resets_in,
            }),
            Ok(Decision::Deny { count, retry_after }) => {
                info!(
                    route = %route,
                    identity = %identity,
                    max_count = rule.max_count,
                    window_length = rule.window_length,
                    time_unit = %rule.time_unit,
                    count,
                    "Request exceeded frequency limit"
                );
                let mut rejection =
                    Rejection::new(route, identity, &rule, RejectionReason::QuotaExceeded);
                rejection.retry_after_ms = Some(retry_after.as_millis() as u64);
                Err(rejection)
            }
            Err(err) => match self.failure_policy {
                FailurePolicy::FailOpen => {
                    warn!(
                        route = %route,
                        identity = %identity,
                        error = %err,
                        "Counting backend unavailable, admitting call"
                    );
                    Ok(Admission::FailedOpen)
                }
                FailurePolicy::FailClosed => {
                    warn!(
                        route = %route,
                        identity = %identity,
                        error = %err,
                        "Counting backend unavailable, rejecting call"
                    );
                    Err(Rejection::new(
                        route,
                        identity,
                        &rule,
                        RejectionReason::BackendUnavailable,
                    ))
                }
            },
        }
    }
}
