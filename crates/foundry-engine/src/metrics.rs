//! Process-level counters for the full health report.
//!
//! Implements the monitor's metrics seam over the live registry and
//! broadcaster. Collection must not block the request path, so the
//! session count is read through a non-waiting lock attempt.

use std::sync::Arc;
use std::time::Instant;

use foundry_broadcast::SessionBroadcaster;
use foundry_core::SessionRegistry;
use foundry_health::SystemMetricsSource;
use foundry_types::SystemMetrics;

/// Metrics source over the engine's live subsystems.
pub struct EngineMetricsSource {
    registry: Arc<SessionRegistry>,
    broadcaster: Arc<SessionBroadcaster>,
    started: Instant,
    tracked_services: usize,
}

impl EngineMetricsSource {
    /// Create a source reading from the given subsystems.
    pub fn new(
        registry: Arc<SessionRegistry>,
        broadcaster: Arc<SessionBroadcaster>,
        tracked_services: usize,
    ) -> Self {
        Self {
            registry,
            broadcaster,
            started: Instant::now(),
            tracked_services,
        }
    }
}

impl SystemMetricsSource for EngineMetricsSource {
    fn collect(&self) -> SystemMetrics {
        SystemMetrics {
            uptime_seconds: self.started.elapsed().as_secs(),
            active_sessions: self.registry.try_count(),
            active_subscriptions: self.broadcaster.subscriber_count(),
            tracked_services: self.tracked_services,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use foundry_core::config::PipelineConfig;
    use foundry_core::{EventPublisher, NoopPublisher};
    use foundry_types::{SessionId, UserId};

    use super::*;

    #[tokio::test]
    async fn collect_reads_live_counters() {
        let registry = Arc::new(SessionRegistry::new(
            Arc::new(NoopPublisher::new()) as Arc<dyn EventPublisher>,
            &PipelineConfig::default(),
        ));
        let broadcaster = SessionBroadcaster::new(8);
        let source =
            EngineMetricsSource::new(Arc::clone(&registry), Arc::clone(&broadcaster), 3);

        let before = source.collect();
        assert_eq!(before.active_sessions, 0);
        assert_eq!(before.active_subscriptions, 0);
        assert_eq!(before.tracked_services, 3);

        registry
            .create(SessionId::new("s1"), UserId::new("u1"), "demo")
            .await
            .unwrap();
        let after = source.collect();
        assert_eq!(after.active_sessions, 1);
    }
}
