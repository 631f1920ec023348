//! Enumeration types for the Foundry pipeline tracking core.
//!
//! All enumerations are closed: unknown names fail deserialization at the
//! boundary instead of silently entering state. Declaration order is
//! meaningful where noted (`Phase` ordering, `HealthStatus` severity).

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Pipeline phases
// ---------------------------------------------------------------------------

/// One of the six fixed stages of a generation pipeline.
///
/// The declaration order is the pipeline order and never changes; the
/// derived `Ord` follows it, so "lowest-ordered phase not yet completed"
/// is a plain minimum over this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Requirements and source analysis.
    Analysis,
    /// Prompt/plan optimization ahead of generation.
    Optimization,
    /// The main content generation stage.
    Generation,
    /// Quality assessment of generated output.
    Quality,
    /// Compilation and packaging of the artifact.
    Compilation,
    /// Final assessment and scoring.
    Assessment,
}

impl Phase {
    /// All phases in pipeline order.
    pub const ALL: [Self; 6] = [
        Self::Analysis,
        Self::Optimization,
        Self::Generation,
        Self::Quality,
        Self::Compilation,
        Self::Assessment,
    ];

    /// The lowercase wire name of this phase.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Analysis => "analysis",
            Self::Optimization => "optimization",
            Self::Generation => "generation",
            Self::Quality => "quality",
            Self::Compilation => "compilation",
            Self::Assessment => "assessment",
        }
    }
}

impl core::fmt::Display for Phase {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle status of a single phase within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "lowercase")]
pub enum PhaseStatus {
    /// No event has touched this phase yet.
    Pending,
    /// The phase has received at least one event and is running.
    Active,
    /// The phase reached 100% progress or an explicit completion signal.
    Completed,
    /// A task in this phase exhausted its retries, or the session was
    /// terminated while the phase was still incomplete.
    Failed,
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

/// The kind of work a task performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    /// Producing new content.
    Creation,
    /// Validating produced content.
    Validation,
    /// Compiling or packaging content.
    Compilation,
    /// Optimizing prompts, plans, or produced content.
    Optimization,
    /// Repairing content that failed compilation or validation.
    Repair,
}

impl TaskType {
    /// The pipeline phase this kind of task contributes to.
    ///
    /// Task events do not carry a phase name on the wire; the phase is
    /// implied by the task type. Repairs are folded into compilation
    /// because they are retries of failed builds.
    pub const fn target_phase(self) -> Phase {
        match self {
            Self::Creation => Phase::Generation,
            Self::Validation => Phase::Quality,
            Self::Compilation | Self::Repair => Phase::Compilation,
            Self::Optimization => Phase::Optimization,
        }
    }
}

/// Status of a task within its retry-capable state machine.
///
/// Legal transitions are exactly:
/// started -> {progress, completed, failed, retrying},
/// progress -> {progress, completed, failed, retrying},
/// retrying -> {started}. Completed and failed are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// The task has begun (also the re-entry point after a retry).
    Started,
    /// The task reported intermediate progress.
    Progress,
    /// The task finished successfully. Terminal.
    Completed,
    /// The task failed permanently. Terminal.
    Failed,
    /// The task failed transiently and will start again.
    Retrying,
}

impl TaskStatus {
    /// Whether `next` is a legal successor of this status.
    pub const fn can_transition_to(self, next: Self) -> bool {
        match self {
            Self::Started | Self::Progress => matches!(
                next,
                Self::Progress | Self::Completed | Self::Failed | Self::Retrying
            ),
            Self::Retrying => matches!(next, Self::Started),
            Self::Completed | Self::Failed => false,
        }
    }

    /// Whether this status ends the task's state machine.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

/// Lifecycle status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// The pipeline is running and accepting events.
    Running,
    /// Every phase completed.
    Completed,
    /// The pipeline failed (task retry exhaustion or external failure).
    Failed,
    /// The pipeline was cancelled by its owner.
    Cancelled,
    /// The session received no events for the idle TTL and was expired.
    Expired,
}

impl SessionStatus {
    /// Whether the session has reached a terminal state.
    ///
    /// Terminal sessions reject further events and are pruned after the
    /// grace period.
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

/// Health classification of one monitored service.
///
/// Declaration order is severity order; the derived `Ord` makes
/// "worst of all statuses" a plain maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// The service responded normally.
    Healthy,
    /// The service responded but outside normal parameters.
    Degraded,
    /// The service failed to respond, timed out, or reported an error.
    Unhealthy,
}

impl HealthStatus {
    /// The lowercase wire name of this status.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Unhealthy => "unhealthy",
        }
    }
}

impl core::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Direction of a service's health trend over the sample window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    /// Response times are falling and error rate is not rising.
    Improving,
    /// No significant movement either way.
    Stable,
    /// Response times are rising or errors are increasing.
    Degrading,
}

impl core::fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Self::Improving => "improving",
            Self::Stable => "stable",
            Self::Degrading => "degrading",
        };
        write!(f, "{name}")
    }
}
