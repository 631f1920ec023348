//! Wire event contracts for pipeline producers and observers.
//!
//! Field names here are normative for interoperability with the worker
//! agents that produce events and the dashboards that consume them, so
//! every wire struct uses `camelCase` serialization. Free-form payloads
//! (`details`, `result`) stay in designated [`serde_json::Value`] fields;
//! internal logic never depends on their contents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{Phase, SessionStatus, TaskStatus, TaskType};
use crate::ids::{AgentId, SessionId, TaskId, UserId};

// ---------------------------------------------------------------------------
// Progress events
// ---------------------------------------------------------------------------

/// A phase-level, non-task-specific progress update from a pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    /// The session this update belongs to.
    pub session_id: SessionId,
    /// The user who owns the session, when the producer knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    /// The pipeline phase being reported on.
    pub phase: Phase,
    /// Human-readable label of the current step within the phase.
    pub step: String,
    /// Phase progress percentage (0-100).
    pub progress: f64,
    /// Human-readable progress message.
    pub message: String,
    /// The agent reporting, when the update is agent-specific.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<AgentId>,
    /// Producer-side estimate of remaining seconds, if it has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_time_remaining: Option<u64>,
    /// Free-form payload. The aggregator adds computed fields here
    /// (`overallProgress`, recomputed `estimatedTimeRemaining`) when
    /// enriching the event for observers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    /// When the producer emitted the event.
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Task events
// ---------------------------------------------------------------------------

/// An atomic unit of work performed by one agent inside one phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct TaskEvent {
    /// The session this task belongs to.
    pub session_id: SessionId,
    /// The user who owns the session, when the producer knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    /// Task identifier, unique within the session.
    pub task_id: TaskId,
    /// The kind of work this task performs. Implies the owning phase.
    #[serde(rename = "type")]
    pub task_type: TaskType,
    /// Human-readable label of the action being performed.
    pub action: String,
    /// Status reported by this event.
    pub status: TaskStatus,
    /// The agent performing the task.
    pub agent_id: AgentId,
    /// Task progress percentage (0-100), when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    /// Human-readable status message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Error description, set on failed/retrying events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Free-form result payload, set on completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// When the producer emitted the event.
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Broadcast envelope
// ---------------------------------------------------------------------------

/// The envelope delivered to live observers.
///
/// Producer events (`progress`, `task`) pass through enriched; the
/// tracking core adds its own lifecycle notifications
/// (`sessionTerminated`, `sessionExpired`) and the synthetic `gap`
/// marker inserted when a slow observer's bounded queue overflows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PipelineEvent {
    /// A phase-level progress update.
    Progress(ProgressEvent),
    /// A task status update.
    Task(TaskEvent),
    /// The session reached a terminal state (completed, failed, or
    /// cancelled). Published exactly once per session.
    SessionTerminated {
        /// The terminated session.
        #[serde(rename = "sessionId")]
        session_id: SessionId,
        /// The terminal status the session ended in.
        status: SessionStatus,
        /// Human-readable reason for the termination.
        message: String,
        /// When the termination was applied.
        timestamp: DateTime<Utc>,
    },
    /// The session was pruned after receiving no events for the idle
    /// TTL. Subscribers should release their interest.
    SessionExpired {
        /// The expired session.
        #[serde(rename = "sessionId")]
        session_id: SessionId,
        /// When the expiry was applied.
        timestamp: DateTime<Utc>,
    },
    /// Synthetic loss marker: this observer's bounded delivery queue
    /// overflowed and `dropped` events were discarded where this marker
    /// now sits.
    Gap {
        /// How many events were dropped in this batch.
        dropped: u64,
        /// When the first event of the batch was dropped.
        timestamp: DateTime<Utc>,
    },
}

impl PipelineEvent {
    /// The session this event concerns, if any.
    ///
    /// Gap markers are subscriber-local and carry no session.
    pub const fn session_id(&self) -> Option<&SessionId> {
        match self {
            Self::Progress(e) => Some(&e.session_id),
            Self::Task(e) => Some(&e.session_id),
            Self::SessionTerminated { session_id, .. }
            | Self::SessionExpired { session_id, .. } => Some(session_id),
            Self::Gap { .. } => None,
        }
    }

    /// The owning user named by this event, if the producer supplied one.
    pub const fn user_id(&self) -> Option<&UserId> {
        match self {
            Self::Progress(e) => e.user_id.as_ref(),
            Self::Task(e) => e.user_id.as_ref(),
            _ => None,
        }
    }

    /// Short label for logging.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Progress(_) => "progress",
            Self::Task(_) => "task",
            Self::SessionTerminated { .. } => "sessionTerminated",
            Self::SessionExpired { .. } => "sessionExpired",
            Self::Gap { .. } => "gap",
        }
    }
}
