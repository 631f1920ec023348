//! The event publishing seam between the tracking core and transports.
//!
//! The registry and aggregator forward events through [`EventPublisher`]
//! without knowing anything about subscribers or wire protocols. The
//! broadcaster crate provides the real fanout implementation; the stubs
//! here keep tests and standalone wiring free of it.

use foundry_types::PipelineEvent;

/// A fire-and-forget sink for pipeline events.
///
/// Implementations must return promptly and must never surface a slow or
/// absent consumer to the caller: publishing is not allowed to fail from
/// the producer's perspective.
pub trait EventPublisher: Send + Sync {
    /// Publish one event toward whatever observers exist.
    fn publish(&self, event: &PipelineEvent);
}

/// A publisher that discards every event.
///
/// Useful when the core runs without any observer transport attached.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPublisher;

impl NoopPublisher {
    /// Create a new no-op publisher.
    pub const fn new() -> Self {
        Self
    }
}

impl EventPublisher for NoopPublisher {
    fn publish(&self, _event: &PipelineEvent) {}
}

/// A publisher that records every event in memory.
///
/// The test-side counterpart of the real broadcaster: assertions read
/// the captured stream back with [`MemoryPublisher::events`].
#[derive(Debug, Default)]
pub struct MemoryPublisher {
    events: std::sync::Mutex<Vec<PipelineEvent>>,
}

impl MemoryPublisher {
    /// Create a new empty recording publisher.
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of every event published so far, in publish order.
    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Drain and return every recorded event.
    pub fn take(&self) -> Vec<PipelineEvent> {
        self.events
            .lock()
            .map(|mut e| std::mem::take(&mut *e))
            .unwrap_or_default()
    }
}

impl EventPublisher for MemoryPublisher {
    fn publish(&self, event: &PipelineEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
