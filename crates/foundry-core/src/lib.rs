//! Session registry, progress aggregation, and configuration for the
//! Foundry pipeline tracking core.
//!
//! This crate is the single writer for pipeline state: producers feed
//! events into the [`aggregator::ProgressAggregator`], which mutates
//! sessions owned by the [`registry::SessionRegistry`] and forwards the
//! enriched events through the [`publisher::EventPublisher`] seam. The
//! crate knows nothing about transports or observers.
//!
//! # Modules
//!
//! - [`config`] -- Typed configuration with YAML loading and startup
//!   validation
//! - [`progress`] -- Pure derivations: weighted overall progress,
//!   current phase, completion estimation
//! - [`publisher`] -- The fire-and-forget event publishing seam
//! - [`registry`] -- Session ownership, lifecycle, and pruning
//! - [`aggregator`] -- Event application and state transitions

pub mod aggregator;
pub mod config;
pub mod progress;
pub mod publisher;
pub mod registry;

pub use aggregator::{EventError, ProgressAggregator, TaskDisposition};
pub use config::{ConfigError, FoundryConfig, PipelineConfig};
pub use publisher::{EventPublisher, MemoryPublisher, NoopPublisher};
pub use registry::{RegistryError, SessionRegistry, Termination};
