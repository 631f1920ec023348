//! The health sampler: scheduled probing into rolling sample windows.
//!
//! [`HealthSampler::sample_all`] probes every registered service under a
//! bounded per-call timeout and appends one immutable [`HealthSample`]
//! per service to the shared [`SampleStore`]. A probe failure or timeout
//! becomes an unhealthy sample with the reason in `errors` -- the
//! sampler itself never crashes. [`HealthSampler::spawn_sampler_loop`]
//! runs the cycle on its own timer, independent of request paths.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use chrono::Utc;
use foundry_core::config::HealthConfig;
use foundry_types::{HealthSample, HealthStatus, ServiceName};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::probe::ServiceProbe;

/// Shared rolling windows of samples, one per service.
///
/// Samples are append-only; the window trims itself to the configured
/// capacity by evicting the oldest sample.
pub struct SampleStore {
    windows: RwLock<BTreeMap<ServiceName, VecDeque<HealthSample>>>,
    window_size: usize,
}

impl SampleStore {
    /// Create a store whose windows hold `window_size` samples.
    pub fn new(window_size: usize) -> Self {
        Self {
            windows: RwLock::new(BTreeMap::new()),
            window_size: window_size.max(1),
        }
    }

    /// Append a sample to its service's window, evicting the oldest
    /// sample on overflow.
    pub async fn append(&self, sample: HealthSample) {
        let mut windows = self.windows.write().await;
        let window = windows.entry(sample.service.clone()).or_default();
        window.push_back(sample);
        while window.len() > self.window_size {
            let _ = window.pop_front();
        }
    }

    /// The most recent sample for a service, if any.
    pub async fn latest(&self, service: &ServiceName) -> Option<HealthSample> {
        let windows = self.windows.read().await;
        windows.get(service).and_then(|w| w.back().cloned())
    }

    /// The full window for a service, oldest first.
    pub async fn window(&self, service: &ServiceName) -> Vec<HealthSample> {
        let windows = self.windows.read().await;
        windows
            .get(service)
            .map(|w| w.iter().cloned().collect())
            .unwrap_or_default()
    }
}

/// Scheduled prober over a fixed set of named services.
pub struct HealthSampler {
    probes: BTreeMap<ServiceName, Arc<dyn ServiceProbe>>,
    store: Arc<SampleStore>,
    probe_timeout: std::time::Duration,
    sample_interval: std::time::Duration,
}

impl HealthSampler {
    /// Create a sampler writing into `store` with the configured
    /// timeout and interval. Probes are registered separately.
    pub fn new(store: Arc<SampleStore>, config: &HealthConfig) -> Self {
        Self {
            probes: BTreeMap::new(),
            store,
            probe_timeout: std::time::Duration::from_millis(config.probe_timeout_ms),
            sample_interval: std::time::Duration::from_secs(config.sample_interval_secs.max(1)),
        }
    }

    /// Register a probe for one named service.
    pub fn register(&mut self, service: ServiceName, probe: Arc<dyn ServiceProbe>) {
        self.probes.insert(service, probe);
    }

    /// Names of all registered services.
    pub fn services(&self) -> Vec<ServiceName> {
        self.probes.keys().cloned().collect()
    }

    /// Run one probe cycle across every registered service.
    ///
    /// Services are probed in order, each under the per-call timeout,
    /// so one unresponsive service delays the cycle by at most the
    /// timeout and can never wedge it. Returns the number of samples
    /// recorded (always the number of registered services).
    pub async fn sample_all(&self) -> usize {
        let mut recorded = 0_usize;
        for (service, probe) in &self.probes {
            let outcome =
                tokio::time::timeout(self.probe_timeout, probe.probe()).await;

            let sample = match outcome {
                Ok(outcome) => HealthSample {
                    service: service.clone(),
                    status: outcome.status,
                    response_time_ms: outcome.response_time_ms,
                    errors: outcome.errors,
                    timestamp: Utc::now(),
                },
                Err(_elapsed) => {
                    warn!(service = %service, timeout_ms = ?self.probe_timeout, "probe timed out");
                    HealthSample {
                        service: service.clone(),
                        status: HealthStatus::Unhealthy,
                        response_time_ms: u64::try_from(self.probe_timeout.as_millis())
                            .unwrap_or(u64::MAX),
                        errors: vec![format!(
                            "probe timed out after {}ms",
                            self.probe_timeout.as_millis()
                        )],
                        timestamp: Utc::now(),
                    }
                }
            };

            debug!(service = %service, status = %sample.status, "sample recorded");
            self.store.append(sample).await;
            recorded = recorded.saturating_add(1);
        }
        recorded
    }

    /// Spawn the background sampling loop on its own timer.
    pub fn spawn_sampler_loop(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.sample_interval);
            loop {
                ticker.tick().await;
                let recorded = self.sample_all().await;
                debug!(recorded, "sampler cycle complete");
            }
        })
    }
}
