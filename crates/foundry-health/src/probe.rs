//! The service probing seam.
//!
//! [`ServiceProbe`] abstracts the mechanism by which a service is
//! checked -- an HTTP health endpoint, a database ping, a queue depth
//! query, or a test stub. Implementations classify their own outcome;
//! they never panic and never propagate transport errors upward. The
//! sampler adds the per-call timeout on top.

use async_trait::async_trait;
use foundry_types::HealthStatus;

/// The result of probing one service once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    /// Health classification of the probe.
    pub status: HealthStatus,
    /// Observed response time in milliseconds.
    pub response_time_ms: u64,
    /// Errors observed during the probe (empty when healthy).
    pub errors: Vec<String>,
}

impl ProbeOutcome {
    /// A healthy outcome with the observed response time.
    pub const fn healthy(response_time_ms: u64) -> Self {
        Self {
            status: HealthStatus::Healthy,
            response_time_ms,
            errors: Vec::new(),
        }
    }

    /// A degraded outcome with an explanation.
    pub fn degraded(response_time_ms: u64, reason: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Degraded,
            response_time_ms,
            errors: vec![reason.into()],
        }
    }

    /// An unhealthy outcome with the failure reason.
    pub fn failure(response_time_ms: u64, reason: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            response_time_ms,
            errors: vec![reason.into()],
        }
    }
}

/// A checker for one service.
#[async_trait]
pub trait ServiceProbe: Send + Sync {
    /// Probe the service once and classify the result.
    ///
    /// Implementations absorb their own transport failures into an
    /// unhealthy [`ProbeOutcome`]; this method does not return errors.
    async fn probe(&self) -> ProbeOutcome;
}

/// A probe that always returns a fixed outcome.
///
/// Used in tests and for wiring the sampler before real probes exist.
#[derive(Debug, Clone)]
pub struct StubProbe {
    outcome: ProbeOutcome,
}

impl StubProbe {
    /// A stub that reports healthy with the given response time.
    pub const fn healthy(response_time_ms: u64) -> Self {
        Self {
            outcome: ProbeOutcome::healthy(response_time_ms),
        }
    }

    /// A stub that reports the given outcome verbatim.
    pub const fn with_outcome(outcome: ProbeOutcome) -> Self {
        Self { outcome }
    }
}

#[async_trait]
impl ServiceProbe for StubProbe {
    async fn probe(&self) -> ProbeOutcome {
        self.outcome.clone()
    }
}
