//! Health sampling and reporting types.
//!
//! Samples are immutable probe results appended to a per-service rolling
//! window; trends and reports are derived from that window on demand.
//! The reporting shapes (`QuickStatus`, `HealthReport`, `ServiceTrend`)
//! are normative read-only contracts consumed by dashboards, so they
//! serialize in `camelCase`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{HealthStatus, TrendDirection};
use crate::ids::ServiceName;

// ---------------------------------------------------------------------------
// Samples
// ---------------------------------------------------------------------------

/// One probe result for one service. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct HealthSample {
    /// The probed service.
    pub service: ServiceName,
    /// Health classification of this probe.
    pub status: HealthStatus,
    /// Observed response time in milliseconds.
    pub response_time_ms: u64,
    /// Errors observed during the probe (empty when healthy).
    pub errors: Vec<String>,
    /// When the probe completed.
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Trends
// ---------------------------------------------------------------------------

/// Directional trend derived from a service's recent samples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct ServiceTrend {
    /// Direction of movement over the window.
    pub direction: TrendDirection,
    /// Confidence in the classification (0-1), scaling with the number
    /// of samples available.
    pub confidence: f64,
    /// How many samples the classification was computed from.
    pub sample_count: usize,
}

impl ServiceTrend {
    /// The low-confidence stable trend reported when too few samples
    /// exist to make any directional claim.
    pub const fn sparse(sample_count: usize) -> Self {
        Self {
            direction: TrendDirection::Stable,
            confidence: 0.2,
            sample_count,
        }
    }
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Cheap summary answer for "is the system okay right now".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct QuickStatus {
    /// Worst status among all services' latest samples.
    pub status: HealthStatus,
    /// One-line human-readable summary.
    pub summary: String,
}

/// Per-service section of a full health report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct ServiceReport {
    /// The service name.
    pub name: ServiceName,
    /// Status from the latest sample.
    pub status: HealthStatus,
    /// Response time of the latest sample, in milliseconds.
    pub response_time: u64,
    /// Errors from the latest sample.
    pub errors: Vec<String>,
    /// Timestamp of the latest sample.
    pub last_checked: DateTime<Utc>,
}

/// Process-level counters included in a full report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct SystemMetrics {
    /// Seconds since the coordinating process started.
    pub uptime_seconds: u64,
    /// Sessions currently tracked by the registry.
    pub active_sessions: usize,
    /// Live observer subscriptions held by the broadcaster.
    pub active_subscriptions: usize,
    /// Services configured for health sampling.
    pub tracked_services: usize,
}

/// A full health report assembled on demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    /// Worst status among all per-service statuses.
    pub overall: HealthStatus,
    /// When the report was composed.
    pub timestamp: DateTime<Utc>,
    /// One entry per configured service with a recorded sample.
    pub services: Vec<ServiceReport>,
    /// Process-level counters.
    pub system_metrics: SystemMetrics,
    /// Operational recommendations from the rule set.
    pub recommendations: Vec<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn report_shapes_use_contract_field_names() {
        let report = HealthReport {
            overall: HealthStatus::Degraded,
            timestamp: Utc::now(),
            services: vec![ServiceReport {
                name: ServiceName::new("asset-store"),
                status: HealthStatus::Degraded,
                response_time: 412,
                errors: Vec::new(),
                last_checked: Utc::now(),
            }],
            system_metrics: SystemMetrics {
                uptime_seconds: 3600,
                active_sessions: 2,
                active_subscriptions: 5,
                tracked_services: 3,
            },
            recommendations: vec!["asset-store degraded".to_owned()],
        };

        let value = serde_json::to_value(&report).unwrap();
        let obj = value.as_object().unwrap();
        assert!(obj.contains_key("overall"));
        assert!(obj.contains_key("systemMetrics"));
        assert!(obj.contains_key("recommendations"));

        let service = value
            .get("services")
            .and_then(|s| s.as_array())
            .and_then(|a| a.first())
            .unwrap();
        assert!(service.get("responseTime").is_some());
        assert!(service.get("lastChecked").is_some());

        let metrics = value.get("systemMetrics").unwrap();
        assert!(metrics.get("uptimeSeconds").is_some());
        assert!(metrics.get("activeSessions").is_some());
    }

    #[test]
    fn trend_serializes_sample_count_camel_case() {
        let trend = ServiceTrend {
            direction: TrendDirection::Degrading,
            confidence: 0.8,
            sample_count: 20,
        };
        let value = serde_json::to_value(trend).unwrap();
        assert_eq!(value.get("direction").unwrap(), "degrading");
        assert_eq!(value.get("sampleCount").unwrap(), 20);
    }

    #[test]
    fn sparse_trend_is_stable_low_confidence() {
        let trend = ServiceTrend::sparse(2);
        assert_eq!(trend.direction, TrendDirection::Stable);
        assert!(trend.confidence < 0.5);
        assert_eq!(trend.sample_count, 2);
    }
}
