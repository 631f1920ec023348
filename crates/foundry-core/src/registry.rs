//! The session registry: ownership and lifecycle of active pipeline runs.
//!
//! The registry owns the map of live sessions. Lookups take a read lock
//! on the map; every mutation of a single session happens under that
//! session's own `tokio::Mutex`, so two events for the same session can
//! never interleave while different sessions proceed fully in parallel.
//! The map's write lock is only taken on create and prune.
//!
//! Pruning runs on an independent timer: running sessions that received
//! no events for the idle TTL are expired (with a `sessionExpired`
//! notification so subscribers can clean up), and terminal sessions are
//! removed once their grace period allows late observers to read the
//! final state.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use foundry_types::{
    PhaseStatus, PipelineEvent, Session, SessionId, SessionStatus, UserId,
};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::PipelineConfig;
use crate::publisher::EventPublisher;

/// Errors that can occur in registry operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// A session with this id already exists.
    #[error("session {session_id} already exists")]
    AlreadyExists {
        /// The duplicate session id.
        session_id: SessionId,
    },

    /// No session with this id is currently tracked.
    #[error("session {session_id} not found")]
    NotFound {
        /// The unknown session id.
        session_id: SessionId,
    },
}

/// The reason for an explicit session termination.
///
/// Completion and expiry are produced internally (by the aggregator and
/// the prune loop); external collaborators can only cancel a run or
/// report it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The owner cancelled the run.
    Cancelled,
    /// An external collaborator reported the run failed.
    Failed,
}

impl Termination {
    const fn status(self) -> SessionStatus {
        match self {
            Self::Cancelled => SessionStatus::Cancelled,
            Self::Failed => SessionStatus::Failed,
        }
    }
}

/// Registry of all active pipeline sessions.
pub struct SessionRegistry {
    /// Session map: concurrent lookups, per-session write serialization.
    sessions: RwLock<BTreeMap<SessionId, Arc<Mutex<Session>>>>,
    /// Sink for lifecycle events (termination, expiry).
    publisher: Arc<dyn EventPublisher>,
    /// How long a running session may go without events.
    idle_ttl: Duration,
    /// How long a terminal session stays queryable.
    terminal_grace: Duration,
    /// Interval of the background prune loop, in seconds.
    prune_interval_secs: u64,
}

impl SessionRegistry {
    /// Create a registry from a validated pipeline configuration.
    pub fn new(publisher: Arc<dyn EventPublisher>, config: &PipelineConfig) -> Self {
        Self {
            sessions: RwLock::new(BTreeMap::new()),
            publisher,
            idle_ttl: Duration::seconds(i64::try_from(config.idle_ttl_secs).unwrap_or(i64::MAX)),
            terminal_grace: Duration::seconds(
                i64::try_from(config.terminal_grace_secs).unwrap_or(i64::MAX),
            ),
            prune_interval_secs: config.prune_interval_secs,
        }
    }

    /// Create a new session for a pipeline run.
    ///
    /// Returns a snapshot of the freshly created session.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::AlreadyExists`] if the id is in use.
    pub async fn create(
        &self,
        session_id: SessionId,
        user_id: UserId,
        artifact_name: impl Into<String>,
    ) -> Result<Session, RegistryError> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&session_id) {
            return Err(RegistryError::AlreadyExists { session_id });
        }

        let session = Session::new(session_id.clone(), user_id, artifact_name, Utc::now());
        sessions.insert(session_id.clone(), Arc::new(Mutex::new(session.clone())));
        info!(session_id = %session_id, artifact = session.artifact_name, "session created");
        Ok(session)
    }

    /// Snapshot the current state of a session.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] for unknown or pruned ids.
    pub async fn get(&self, session_id: &SessionId) -> Result<Session, RegistryError> {
        let handle = self.handle(session_id).await?;
        let session = handle.lock().await;
        Ok(session.clone())
    }

    /// The shared handle for a session, for callers that need to hold
    /// the per-session lock across a multi-step mutation.
    pub(crate) async fn handle(
        &self,
        session_id: &SessionId,
    ) -> Result<Arc<Mutex<Session>>, RegistryError> {
        let sessions = self.sessions.read().await;
        sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound {
                session_id: session_id.clone(),
            })
    }

    /// Apply a state transition to one session under its exclusive lock.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] for unknown or pruned ids.
    pub async fn mutate<F, R>(&self, session_id: &SessionId, f: F) -> Result<R, RegistryError>
    where
        F: FnOnce(&mut Session) -> R,
    {
        let handle = self.handle(session_id).await?;
        let mut session = handle.lock().await;
        Ok(f(&mut session))
    }

    /// Number of currently tracked sessions.
    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Session count without waiting on the map lock, for metrics
    /// collectors that must not block. Reports zero during the brief
    /// windows a create or prune holds the write lock.
    pub fn try_count(&self) -> usize {
        self.sessions.try_read().map_or(0, |sessions| sessions.len())
    }

    /// Explicitly terminate a session (cancel or external failure).
    ///
    /// Every phase that has not completed is forced to failed, the
    /// terminal event is published exactly once, and the session stays
    /// queryable until the grace period elapses. Calling this on an
    /// already-terminal session is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] for unknown or pruned ids.
    pub async fn terminate(
        &self,
        session_id: &SessionId,
        reason: Termination,
        message: impl Into<String>,
    ) -> Result<(), RegistryError> {
        let handle = self.handle(session_id).await?;
        let mut session = handle.lock().await;
        if session.is_terminal() {
            return Ok(());
        }

        let now = Utc::now();
        for phase_state in session.phases.values_mut() {
            if phase_state.status != PhaseStatus::Completed {
                phase_state.status = PhaseStatus::Failed;
                phase_state.ended_at = Some(now);
            }
        }
        session.status = reason.status();
        session.terminal_at = Some(now);
        session.last_event_at = now;

        let event = PipelineEvent::SessionTerminated {
            session_id: session.id.clone(),
            status: session.status,
            message: message.into(),
            timestamp: now,
        };
        drop(session);

        info!(session_id = %session_id, ?reason, "session terminated");
        self.publisher.publish(&event);
        Ok(())
    }

    /// Remove sessions idle beyond the TTL or terminal beyond the grace
    /// period. Returns how many sessions were pruned.
    ///
    /// Idle sessions are marked expired and a `sessionExpired`
    /// notification is published so subscribers can clean up.
    pub async fn prune(&self, now: DateTime<Utc>) -> usize {
        let mut expired_events: Vec<PipelineEvent> = Vec::new();
        let mut to_remove: Vec<SessionId> = Vec::new();

        {
            let mut sessions = self.sessions.write().await;
            for (session_id, handle) in sessions.iter() {
                let mut session = handle.lock().await;
                if session.is_terminal() {
                    if let Some(terminal_at) = session.terminal_at
                        && now - terminal_at > self.terminal_grace
                    {
                        to_remove.push(session_id.clone());
                    }
                } else if now - session.last_event_at > self.idle_ttl {
                    session.status = SessionStatus::Expired;
                    session.terminal_at = Some(now);
                    expired_events.push(PipelineEvent::SessionExpired {
                        session_id: session_id.clone(),
                        timestamp: now,
                    });
                    to_remove.push(session_id.clone());
                }
            }
            for session_id in &to_remove {
                sessions.remove(session_id);
            }
        }

        for event in &expired_events {
            self.publisher.publish(event);
        }

        if !to_remove.is_empty() {
            debug!(pruned = to_remove.len(), "prune pass removed sessions");
        }
        to_remove.len()
    }

    /// Spawn the background prune loop on its own timer.
    ///
    /// The loop never blocks request-path operations; it takes the map
    /// write lock only long enough to sweep.
    pub fn spawn_prune_loop(self: &Arc<Self>) -> JoinHandle<()> {
        let registry = Arc::clone(self);
        let interval_secs = registry.prune_interval_secs;
        tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(std::time::Duration::from_secs(interval_secs.max(1)));
            // The first tick fires immediately; skip it so a fresh
            // registry is not swept at startup.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let pruned = registry.prune(Utc::now()).await;
                if pruned > 0 {
                    debug!(pruned, "prune loop tick");
                }
            }
        })
    }
}
