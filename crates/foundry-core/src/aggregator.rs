//! The progress aggregator: the single writer for session state.
//!
//! Every incoming progress and task event flows through here. The
//! aggregator validates the event against the session's current state,
//! applies it under the per-session lock, recomputes the derived fields
//! (overall progress, current phase, completion estimate), and forwards
//! the enriched event to the publisher for live observers.
//!
//! Structural violations (`UnknownSession`, `InvalidTransition`,
//! `SessionTerminal`, malformed payloads) are returned to the caller and
//! leave session state untouched. Retry exhaustion is different: the
//! event is applied as a forced failure and reported through
//! [`TaskDisposition::RetryExhausted`] rather than refused.

use std::sync::Arc;

use chrono::Utc;
use foundry_types::{
    Phase, PhaseStatus, PipelineEvent, ProgressEvent, SessionId, SessionStatus,
    TaskEvent, TaskId, TaskRecord, TaskStatus,
};
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::progress;
use crate::publisher::EventPublisher;
use crate::registry::{RegistryError, SessionRegistry};

/// Errors returned to event producers.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    /// The event names a session that does not exist (or was pruned).
    #[error("unknown session {session_id}")]
    UnknownSession {
        /// The unknown session id.
        session_id: SessionId,
    },

    /// The session already reached a terminal state; its final state is
    /// frozen for the grace period and events are no longer accepted.
    #[error("session {session_id} is terminal and no longer accepts events")]
    SessionTerminal {
        /// The terminal session id.
        session_id: SessionId,
    },

    /// The task status change is not allowed by the state machine.
    #[error("illegal task transition for {task_id}: {from:?} -> {to:?}")]
    InvalidTransition {
        /// The task whose transition was rejected.
        task_id: TaskId,
        /// The task's current status (`None` for an unknown task, which
        /// may only enter via `started`).
        from: Option<TaskStatus>,
        /// The status the event attempted to set.
        to: TaskStatus,
    },

    /// The event is out of contract (non-finite or out-of-range
    /// progress, corrupted phase map). Rejected at ingestion.
    #[error("malformed event: {reason}")]
    Malformed {
        /// What was wrong with the event.
        reason: String,
    },
}

impl From<RegistryError> for EventError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound { session_id }
            | RegistryError::AlreadyExists { session_id } => {
                Self::UnknownSession { session_id }
            }
        }
    }
}

/// What applying a task event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskDisposition {
    /// The event was applied as reported.
    Applied,
    /// The event exceeded the retry bound; the task and its owning
    /// phase were forced to failed.
    RetryExhausted,
}

/// Outcome of the phase-level bookkeeping for one task event, computed
/// while the phase state is borrowed.
#[derive(Clone, Copy)]
enum TaskOutcome {
    None,
    Completed,
    Failed,
    Exhausted,
}

/// The single writer for session progress state.
pub struct ProgressAggregator {
    registry: Arc<SessionRegistry>,
    publisher: Arc<dyn EventPublisher>,
    config: PipelineConfig,
}

impl ProgressAggregator {
    /// Create an aggregator over a registry and a publisher.
    ///
    /// `config` must already be validated (see
    /// `PipelineConfig::validate`); the weight table is trusted here.
    pub fn new(
        registry: Arc<SessionRegistry>,
        publisher: Arc<dyn EventPublisher>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            registry,
            publisher,
            config,
        }
    }

    /// Apply a phase-level progress event.
    ///
    /// # Errors
    ///
    /// [`EventError::UnknownSession`] for unknown ids,
    /// [`EventError::SessionTerminal`] after termination,
    /// [`EventError::Malformed`] for out-of-contract values.
    pub async fn apply_progress_event(&self, event: ProgressEvent) -> Result<(), EventError> {
        validate_progress_value(event.progress)?;

        let handle = self.registry.handle(&event.session_id).await?;
        let mut session = handle.lock().await;
        if session.is_terminal() {
            return Err(EventError::SessionTerminal {
                session_id: event.session_id.clone(),
            });
        }

        let now = Utc::now();
        {
            let phase_state =
                session
                    .phase_mut(event.phase)
                    .ok_or_else(|| EventError::Malformed {
                        reason: format!("session is missing phase '{}'", event.phase),
                    })?;

            if phase_state.status == PhaseStatus::Pending {
                phase_state.status = PhaseStatus::Active;
                phase_state.started_at = Some(event.timestamp);
            }

            // Phase progress is monotonic: a stale lower value clamps
            // to what we already know.
            if phase_state.status != PhaseStatus::Failed {
                phase_state.progress = phase_state.progress.max(event.progress);
                if phase_state.progress >= 100.0 && phase_state.status == PhaseStatus::Active {
                    phase_state.progress = 100.0;
                    phase_state.status = PhaseStatus::Completed;
                    phase_state.ended_at = Some(event.timestamp);
                }
            }
        }

        if event.phase == Phase::Quality
            && session
                .phase(Phase::Quality)
                .is_some_and(|p| p.status == PhaseStatus::Completed)
            && session.quality_score.is_none()
        {
            session.quality_score =
                quality_score_from(event.details.as_ref()).or(Some(100.0));
        }

        let overall =
            progress::overall_progress(&session, &self.config.phase_weights);
        session.overall_progress = session.overall_progress.max(overall);
        session.current_phase = progress::current_phase(&session);
        session.estimated_completion = progress::estimate_completion(
            session.start_time,
            now,
            session.overall_progress,
            self.config.max_horizon_secs,
        );
        session.last_event_at = now;

        let all_complete = session
            .phases
            .values()
            .all(|p| p.status == PhaseStatus::Completed);
        if all_complete {
            session.status = SessionStatus::Completed;
            session.terminal_at = Some(now);
        }

        // Enrich the event for observers with the derived values.
        let mut enriched = event;
        let remaining = session
            .estimated_completion
            .map(|est| progress::remaining_secs(est, now));
        enriched.estimated_time_remaining = remaining.or(enriched.estimated_time_remaining);
        let mut details = enriched
            .details
            .take()
            .and_then(|v| match v {
                serde_json::Value::Object(map) => Some(map),
                _ => None,
            })
            .unwrap_or_default();
        if let Some(overall_num) = serde_json::Number::from_f64(session.overall_progress) {
            details.insert(
                "overallProgress".to_owned(),
                serde_json::Value::Number(overall_num),
            );
        }
        enriched.details = Some(serde_json::Value::Object(details));

        let session_id = session.id.clone();
        let final_status = session.status;
        drop(session);

        debug!(
            session_id = %session_id,
            phase = %enriched.phase,
            progress = enriched.progress,
            "progress event applied"
        );
        self.publisher.publish(&PipelineEvent::Progress(enriched));

        if all_complete {
            info!(session_id = %session_id, "all phases completed");
            self.publisher.publish(&PipelineEvent::SessionTerminated {
                session_id,
                status: final_status,
                message: "all phases completed".to_owned(),
                timestamp: now,
            });
        }
        Ok(())
    }

    /// Apply a task status event.
    ///
    /// # Errors
    ///
    /// [`EventError::UnknownSession`] for unknown ids,
    /// [`EventError::SessionTerminal`] after termination,
    /// [`EventError::InvalidTransition`] for illegal status changes,
    /// [`EventError::Malformed`] for out-of-contract values.
    pub async fn apply_task_event(
        &self,
        event: TaskEvent,
    ) -> Result<TaskDisposition, EventError> {
        if let Some(p) = event.progress {
            validate_progress_value(p)?;
        }

        let handle = self.registry.handle(&event.session_id).await?;
        let mut session = handle.lock().await;
        if session.is_terminal() {
            return Err(EventError::SessionTerminal {
                session_id: event.session_id.clone(),
            });
        }

        let now = Utc::now();
        let phase = event.task_type.target_phase();
        let max_retries = self.config.max_task_retries;

        let outcome = {
            let phase_state = session
                .phase_mut(phase)
                .ok_or_else(|| EventError::Malformed {
                    reason: format!("session is missing phase '{phase}'"),
                })?;

            if phase_state.status == PhaseStatus::Pending {
                phase_state.status = PhaseStatus::Active;
                phase_state.started_at = Some(event.timestamp);
            }

            match phase_state.task_mut(&event.task_id) {
                None => {
                    // The first event for a task must start it.
                    if event.status != TaskStatus::Started {
                        return Err(EventError::InvalidTransition {
                            task_id: event.task_id.clone(),
                            from: None,
                            to: event.status,
                        });
                    }
                    phase_state.tasks.push(TaskRecord {
                        task_id: event.task_id.clone(),
                        agent_id: event.agent_id.clone(),
                        task_type: event.task_type,
                        action: event.action.clone(),
                        status: TaskStatus::Started,
                        progress: event.progress.unwrap_or(0.0),
                        retries: 0,
                        message: event.message.clone(),
                        error: None,
                        result: None,
                        started_at: event.timestamp,
                        updated_at: event.timestamp,
                    });
                    TaskOutcome::None
                }
                Some(record) => {
                    if !record.status.can_transition_to(event.status) {
                        return Err(EventError::InvalidTransition {
                            task_id: event.task_id.clone(),
                            from: Some(record.status),
                            to: event.status,
                        });
                    }

                    record.updated_at = event.timestamp;
                    if let Some(p) = event.progress {
                        record.progress = p;
                    }
                    if event.message.is_some() {
                        record.message = event.message.clone();
                    }

                    match event.status {
                        TaskStatus::Retrying => {
                            record.retries = record.retries.saturating_add(1);
                            if record.retries > max_retries {
                                record.status = TaskStatus::Failed;
                                record.error = Some(format!(
                                    "retry limit of {max_retries} exceeded"
                                ));
                                TaskOutcome::Exhausted
                            } else {
                                record.status = TaskStatus::Retrying;
                                record.error = event.error.clone();
                                TaskOutcome::None
                            }
                        }
                        TaskStatus::Started | TaskStatus::Progress => {
                            record.status = event.status;
                            TaskOutcome::None
                        }
                        TaskStatus::Completed => {
                            record.status = TaskStatus::Completed;
                            record.progress = 100.0;
                            record.result = event.result.clone();
                            TaskOutcome::Completed
                        }
                        TaskStatus::Failed => {
                            record.status = TaskStatus::Failed;
                            record.error = event.error.clone();
                            TaskOutcome::Failed
                        }
                    }
                }
            }
        };

        let exhausted = matches!(outcome, TaskOutcome::Exhausted);
        match outcome {
            TaskOutcome::Completed => {
                session.agent_mut(&event.agent_id).record_completed();
            }
            TaskOutcome::Failed => {
                session.agent_mut(&event.agent_id).record_failed();
            }
            TaskOutcome::Exhausted => {
                session.agent_mut(&event.agent_id).record_failed();
                // A task out of retries takes its phase down with it.
                if let Some(phase_state) = session.phase_mut(phase) {
                    phase_state.status = PhaseStatus::Failed;
                    phase_state.ended_at = Some(now);
                }
                session.current_phase = progress::current_phase(&session);
            }
            TaskOutcome::None => {}
        }

        session.last_event_at = now;
        session.estimated_completion = progress::estimate_completion(
            session.start_time,
            now,
            session.overall_progress,
            self.config.max_horizon_secs,
        );

        let session_id = session.id.clone();
        drop(session);

        let mut enriched = event;
        if exhausted {
            // Observers see the forced outcome, not the refused retry.
            enriched.status = TaskStatus::Failed;
            enriched.error = Some(format!("retry limit of {max_retries} exceeded"));
            warn!(
                session_id = %session_id,
                task_id = %enriched.task_id,
                "task retries exhausted, phase failed"
            );
        } else {
            debug!(
                session_id = %session_id,
                task_id = %enriched.task_id,
                status = ?enriched.status,
                "task event applied"
            );
        }
        self.publisher.publish(&PipelineEvent::Task(enriched));

        if exhausted {
            Ok(TaskDisposition::RetryExhausted)
        } else {
            Ok(TaskDisposition::Applied)
        }
    }
}

/// Reject non-finite or out-of-range progress values at ingestion.
fn validate_progress_value(value: f64) -> Result<(), EventError> {
    if !value.is_finite() || !(0.0..=100.0).contains(&value) {
        return Err(EventError::Malformed {
            reason: format!("progress must be within 0-100, got {value}"),
        });
    }
    Ok(())
}

/// Pull a quality score out of a free-form details payload.
fn quality_score_from(details: Option<&serde_json::Value>) -> Option<f64> {
    details
        .and_then(|v| v.get("qualityScore"))
        .and_then(serde_json::Value::as_f64)
}
