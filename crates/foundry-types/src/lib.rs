//! Shared type definitions for the Foundry pipeline tracking core.
//!
//! This crate is the single source of truth for all types used across
//! the Foundry workspace. Types defined here flow downstream to
//! `TypeScript` via `ts-rs` for the operator dashboard.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe identifier wrappers (sessions, tasks, agents,
//!   services, subscriptions)
//! - [`enums`] -- Closed enumerations (phases, task/session statuses,
//!   health classifications)
//! - [`events`] -- Normative wire event contracts and the broadcast
//!   envelope
//! - [`session`] -- Session, phase, task, and agent roster state
//! - [`health`] -- Health samples, trends, and report shapes

pub mod enums;
pub mod events;
pub mod health;
pub mod ids;
pub mod session;

// Re-export all public types at crate root for convenience.
pub use enums::{
    HealthStatus, Phase, PhaseStatus, SessionStatus, TaskStatus, TaskType, TrendDirection,
};
pub use events::{PipelineEvent, ProgressEvent, TaskEvent};
pub use health::{
    HealthReport, HealthSample, QuickStatus, ServiceReport, ServiceTrend, SystemMetrics,
};
pub use ids::{
    AgentId, ConnectionId, ServiceName, SessionId, SubscriptionId, TaskId, UserId,
};
pub use session::{AgentStats, PhaseState, Session, TaskRecord};

#[cfg(test)]
mod tests {
    //! Integration tests for type exports and `TypeScript` binding generation.

    #[test]
    fn export_bindings() {
        // ts-rs generates TypeScript bindings when types with
        // #[ts(export)] are used. Importing them here triggers generation.
        // The actual files are written to the `bindings/` directory
        // relative to the crate root.
        use ts_rs::TS;

        // IDs
        let _ = crate::ids::SessionId::export_all();
        let _ = crate::ids::UserId::export_all();
        let _ = crate::ids::AgentId::export_all();
        let _ = crate::ids::TaskId::export_all();
        let _ = crate::ids::ConnectionId::export_all();
        let _ = crate::ids::ServiceName::export_all();
        let _ = crate::ids::SubscriptionId::export_all();

        // Enums
        let _ = crate::enums::Phase::export_all();
        let _ = crate::enums::PhaseStatus::export_all();
        let _ = crate::enums::TaskType::export_all();
        let _ = crate::enums::TaskStatus::export_all();
        let _ = crate::enums::SessionStatus::export_all();
        let _ = crate::enums::HealthStatus::export_all();
        let _ = crate::enums::TrendDirection::export_all();

        // Events
        let _ = crate::events::ProgressEvent::export_all();
        let _ = crate::events::TaskEvent::export_all();
        let _ = crate::events::PipelineEvent::export_all();

        // Session state
        let _ = crate::session::Session::export_all();
        let _ = crate::session::PhaseState::export_all();
        let _ = crate::session::TaskRecord::export_all();
        let _ = crate::session::AgentStats::export_all();

        // Health
        let _ = crate::health::HealthSample::export_all();
        let _ = crate::health::ServiceTrend::export_all();
        let _ = crate::health::QuickStatus::export_all();
        let _ = crate::health::ServiceReport::export_all();
        let _ = crate::health::SystemMetrics::export_all();
        let _ = crate::health::HealthReport::export_all();
    }
}
