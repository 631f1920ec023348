//! The report composer: on-demand health snapshots and recommendations.
//!
//! [`HealthMonitor`] is the read-only query surface over the sample
//! store: a cheap quick status, a per-service trend query, and the full
//! report with per-service entries, system metrics, and rule-driven
//! recommendations. No probing happens here -- reports are composed
//! from whatever the sampler has already recorded.

use std::sync::Arc;

use chrono::Utc;
use foundry_core::config::HealthConfig;
use foundry_types::{
    HealthReport, HealthStatus, QuickStatus, ServiceName, ServiceReport, ServiceTrend,
    SystemMetrics, TrendDirection,
};

use crate::sampler::SampleStore;
use crate::trend;

/// Errors from the health query surface.
#[derive(Debug, thiserror::Error)]
pub enum HealthError {
    /// The queried name is not a configured service.
    #[error("unknown service {service}")]
    UnknownService {
        /// The unknown service name.
        service: ServiceName,
    },
}

/// Source of process-level counters for the full report.
///
/// The engine implements this over the registry and broadcaster; tests
/// and standalone wiring use [`StubMetricsSource`].
pub trait SystemMetricsSource: Send + Sync {
    /// Collect the current counters.
    fn collect(&self) -> SystemMetrics;
}

/// A metrics source returning fixed values.
#[derive(Debug, Clone, Copy, Default)]
pub struct StubMetricsSource {
    metrics: SystemMetrics,
}

impl StubMetricsSource {
    /// A stub returning all-zero metrics.
    pub const fn new() -> Self {
        Self {
            metrics: SystemMetrics {
                uptime_seconds: 0,
                active_sessions: 0,
                active_subscriptions: 0,
                tracked_services: 0,
            },
        }
    }

    /// A stub returning the given metrics verbatim.
    pub const fn with_metrics(metrics: SystemMetrics) -> Self {
        Self { metrics }
    }
}

impl SystemMetricsSource for StubMetricsSource {
    fn collect(&self) -> SystemMetrics {
        self.metrics
    }
}

/// Read-only health query surface over the sample store.
pub struct HealthMonitor {
    services: Vec<ServiceName>,
    store: Arc<SampleStore>,
    config: HealthConfig,
}

impl HealthMonitor {
    /// Create a monitor over the configured service list.
    pub fn new(store: Arc<SampleStore>, config: HealthConfig) -> Self {
        let services = config
            .services
            .iter()
            .map(|s| ServiceName::new(s.name.clone()))
            .collect();
        Self {
            services,
            store,
            config,
        }
    }

    /// The configured service names, in configuration order.
    pub fn services(&self) -> &[ServiceName] {
        &self.services
    }

    /// Cheap status answer from the latest samples; no probe cycle.
    pub async fn quick_status(&self) -> QuickStatus {
        let mut worst = HealthStatus::Healthy;
        let mut sampled = 0_usize;
        let mut unhealthy: Vec<String> = Vec::new();

        for service in &self.services {
            if let Some(sample) = self.store.latest(service).await {
                sampled = sampled.saturating_add(1);
                worst = worst.max(sample.status);
                if sample.status != HealthStatus::Healthy {
                    unhealthy.push(service.as_str().to_owned());
                }
            }
        }

        let summary = if sampled == 0 {
            "no samples recorded yet".to_owned()
        } else if unhealthy.is_empty() {
            format!("all {sampled} services healthy")
        } else {
            format!(
                "{} of {sampled} services need attention: {}",
                unhealthy.len(),
                unhealthy.join(", ")
            )
        };

        QuickStatus {
            status: worst,
            summary,
        }
    }

    /// Trend for one configured service.
    ///
    /// # Errors
    ///
    /// Returns [`HealthError::UnknownService`] for names outside the
    /// configured set.
    pub async fn trend_for(&self, service: &ServiceName) -> Result<ServiceTrend, HealthError> {
        if !self.services.contains(service) {
            return Err(HealthError::UnknownService {
                service: service.clone(),
            });
        }
        let window = self.store.window(service).await;
        Ok(trend::classify(&window, &self.config))
    }

    /// Assemble the full health report.
    ///
    /// `overall` is the worst status among all sampled services; the
    /// recommendation rules run against the latest samples and trends
    /// with the configured thresholds.
    pub async fn compose_report(&self, metrics: &dyn SystemMetricsSource) -> HealthReport {
        let mut services = Vec::with_capacity(self.services.len());
        let mut recommendations: Vec<String> = Vec::new();
        let mut overall = HealthStatus::Healthy;

        for service in &self.services {
            let window = self.store.window(service).await;
            let Some(latest) = window.last() else {
                recommendations.push(format!(
                    "no samples recorded for {service} yet; verify the prober can reach it"
                ));
                continue;
            };

            overall = overall.max(latest.status);
            services.push(ServiceReport {
                name: service.clone(),
                status: latest.status,
                response_time: latest.response_time_ms,
                errors: latest.errors.clone(),
                last_checked: latest.timestamp,
            });

            self.recommend(service, &window, &mut recommendations);
        }

        HealthReport {
            overall,
            timestamp: Utc::now(),
            services,
            system_metrics: metrics.collect(),
            recommendations,
        }
    }

    /// Apply the recommendation rule set for one service.
    fn recommend(
        &self,
        service: &ServiceName,
        window: &[foundry_types::HealthSample],
        out: &mut Vec<String>,
    ) {
        let Some(latest) = window.last() else {
            return;
        };

        if latest.status == HealthStatus::Unhealthy {
            let reason = latest
                .errors
                .first()
                .map_or_else(|| "no error detail".to_owned(), Clone::clone);
            out.push(format!(
                "{service} is unhealthy ({reason}); investigate before starting new pipelines"
            ));
        } else if latest.status == HealthStatus::Degraded
            || latest.response_time_ms > self.config.degraded_response_time_ms
        {
            out.push(format!(
                "{service} is degraded: latest response took {}ms",
                latest.response_time_ms
            ));
        }

        let service_trend = trend::classify(window, &self.config);
        if service_trend.direction == TrendDirection::Degrading {
            let change = trend::relative_change(window);
            #[allow(clippy::cast_possible_truncation)]
            let percent = (change * 100.0).round() as i64;
            if percent > 0 {
                out.push(format!(
                    "{service} degrading: response time increased {percent}% over window"
                ));
            } else {
                out.push(format!("{service} degrading: error rate rising over window"));
            }
        }

        let rate = trend::error_rate(window);
        if rate > self.config.error_rate_threshold {
            #[allow(clippy::cast_possible_truncation)]
            let percent = (rate * 100.0).round() as i64;
            out.push(format!(
                "{service} failed {percent}% of probes in the current window"
            ));
        }
    }
}
