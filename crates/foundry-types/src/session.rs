//! Session state structures for tracked pipeline runs.
//!
//! A [`Session`] is the in-memory record of one end-to-end generation
//! pipeline. It is created by the registry, mutated exclusively by the
//! aggregator under the per-session lock, and snapshot-cloned for
//! readers. The structures here are data plus behavior-light helpers;
//! the transition rules live in `foundry-core`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{Phase, PhaseStatus, SessionStatus, TaskStatus, TaskType};
use crate::ids::{AgentId, SessionId, TaskId, UserId};

// ---------------------------------------------------------------------------
// Task records
// ---------------------------------------------------------------------------

/// The tracked state of one task inside a phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct TaskRecord {
    /// Task identifier, unique within the session.
    pub task_id: TaskId,
    /// The agent performing the task.
    pub agent_id: AgentId,
    /// The kind of work the task performs.
    pub task_type: TaskType,
    /// Human-readable label of the action.
    pub action: String,
    /// Current status in the task state machine.
    pub status: TaskStatus,
    /// Task progress percentage (0-100).
    pub progress: f64,
    /// How many times the task has been retried.
    pub retries: u32,
    /// Latest status message, if any.
    pub message: Option<String>,
    /// Latest error description, if any.
    pub error: Option<String>,
    /// Result payload recorded on completion, if any.
    pub result: Option<serde_json::Value>,
    /// When the task first started.
    pub started_at: DateTime<Utc>,
    /// When the task state last changed.
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Phase state
// ---------------------------------------------------------------------------

/// The tracked state of one pipeline phase within a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct PhaseState {
    /// Lifecycle status of the phase.
    pub status: PhaseStatus,
    /// Phase progress percentage (0-100), non-decreasing.
    pub progress: f64,
    /// When the phase received its first event.
    pub started_at: Option<DateTime<Utc>>,
    /// When the phase completed or failed.
    pub ended_at: Option<DateTime<Utc>>,
    /// Task records belonging to this phase, in arrival order.
    pub tasks: Vec<TaskRecord>,
}

impl PhaseState {
    /// A fresh, untouched phase.
    pub const fn new() -> Self {
        Self {
            status: PhaseStatus::Pending,
            progress: 0.0,
            started_at: None,
            ended_at: None,
            tasks: Vec::new(),
        }
    }

    /// Find a task record by id.
    pub fn task(&self, task_id: &TaskId) -> Option<&TaskRecord> {
        self.tasks.iter().find(|t| &t.task_id == task_id)
    }

    /// Find a task record by id, mutably.
    pub fn task_mut(&mut self, task_id: &TaskId) -> Option<&mut TaskRecord> {
        self.tasks.iter_mut().find(|t| &t.task_id == task_id)
    }
}

impl Default for PhaseState {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Agent roster
// ---------------------------------------------------------------------------

/// Cumulative statistics for one agent contributing to a session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct AgentStats {
    /// Tasks this agent completed successfully.
    pub tasks_completed: u64,
    /// Tasks this agent failed permanently.
    pub tasks_failed: u64,
    /// Completed / attempted, as a percentage. 100 until the agent
    /// fails a task.
    pub performance_score: f64,
}

impl AgentStats {
    /// A fresh roster entry.
    pub const fn new() -> Self {
        Self {
            tasks_completed: 0,
            tasks_failed: 0,
            performance_score: 100.0,
        }
    }

    /// Record a successfully completed task.
    pub fn record_completed(&mut self) {
        self.tasks_completed = self.tasks_completed.saturating_add(1);
        self.recompute_score();
    }

    /// Record a permanently failed task.
    pub fn record_failed(&mut self) {
        self.tasks_failed = self.tasks_failed.saturating_add(1);
        self.recompute_score();
    }

    #[allow(clippy::cast_precision_loss)]
    fn recompute_score(&mut self) {
        let attempted = self.tasks_completed.saturating_add(self.tasks_failed);
        if attempted == 0 {
            self.performance_score = 100.0;
        } else {
            self.performance_score =
                self.tasks_completed as f64 / attempted as f64 * 100.0;
        }
    }
}

impl Default for AgentStats {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// The in-memory record of one active generation pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Session {
    /// Unique session identifier.
    pub id: SessionId,
    /// The user who owns this pipeline run.
    pub user_id: UserId,
    /// Name of the artifact being generated.
    pub artifact_name: String,
    /// Lifecycle status.
    pub status: SessionStatus,
    /// When the session was created.
    pub start_time: DateTime<Utc>,
    /// Extrapolated completion time, recomputed on every accepted event.
    pub estimated_completion: Option<DateTime<Utc>>,
    /// The lowest-ordered phase that is not yet completed.
    pub current_phase: Phase,
    /// Weighted overall progress (0-100), non-decreasing while the
    /// session is non-terminal.
    pub overall_progress: f64,
    /// Per-phase state, always exactly one entry per [`Phase`].
    pub phases: BTreeMap<Phase, PhaseState>,
    /// Quality score, set once the quality phase completes.
    pub quality_score: Option<f64>,
    /// Roster of contributing agents.
    pub agents: BTreeMap<AgentId, AgentStats>,
    /// When the session last accepted an event. Drives the idle TTL.
    pub last_event_at: DateTime<Utc>,
    /// When the session entered a terminal state. Drives the prune
    /// grace period.
    pub terminal_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Create a fresh session with all six phases pending.
    pub fn new(
        id: SessionId,
        user_id: UserId,
        artifact_name: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let phases = Phase::ALL
            .into_iter()
            .map(|phase| (phase, PhaseState::new()))
            .collect();
        Self {
            id,
            user_id,
            artifact_name: artifact_name.into(),
            status: SessionStatus::Running,
            start_time: now,
            estimated_completion: None,
            current_phase: Phase::Analysis,
            overall_progress: 0.0,
            phases,
            quality_score: None,
            agents: BTreeMap::new(),
            last_event_at: now,
            terminal_at: None,
        }
    }

    /// Whether the session has reached a terminal state.
    pub const fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// The state of one phase.
    ///
    /// Every phase is present from construction; the `Option` only
    /// guards against a deserialized session with a corrupted map.
    pub fn phase(&self, phase: Phase) -> Option<&PhaseState> {
        self.phases.get(&phase)
    }

    /// The state of one phase, mutably.
    pub fn phase_mut(&mut self, phase: Phase) -> Option<&mut PhaseState> {
        self.phases.get_mut(&phase)
    }

    /// The roster entry for an agent, created on first sight.
    pub fn agent_mut(&mut self, agent_id: &AgentId) -> &mut AgentStats {
        self.agents.entry(agent_id.clone()).or_default()
    }
}
