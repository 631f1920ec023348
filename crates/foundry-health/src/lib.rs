//! Service health sampling, trend analysis, and reporting.
//!
//! The sampling side ([`sampler::HealthSampler`]) probes a fixed set of
//! named services on an interval through the [`probe::ServiceProbe`]
//! seam and records immutable samples into rolling per-service windows.
//! The reading side ([`report::HealthMonitor`]) derives directional
//! trends ([`trend`]) and composes quick statuses and full reports with
//! recommendations on demand. Probe failures are data, never errors:
//! a timeout or refused connection becomes an unhealthy sample.
//!
//! # Modules
//!
//! - [`probe`] -- The async probing seam and its stub
//! - [`sampler`] -- The sample store and the scheduled probe loop
//! - [`trend`] -- Half-window slope and error-rate classification
//! - [`report`] -- Quick status, trend queries, and the full report

pub mod probe;
pub mod report;
pub mod sampler;
pub mod trend;

pub use probe::{ProbeOutcome, ServiceProbe, StubProbe};
pub use report::{HealthError, HealthMonitor, StubMetricsSource, SystemMetricsSource};
pub use sampler::{HealthSampler, SampleStore};
