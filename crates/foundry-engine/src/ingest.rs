//! NATS ingestion adapter: the bridge from pipeline workers to the core.
//!
//! Workers publish JSON messages on the `foundry.pipeline.*` subjects;
//! this adapter deserializes them and calls the corresponding core
//! operations. Malformed messages and structural rejections are logged
//! and dropped -- one bad producer message never corrupts session state
//! or stops the loop.
//!
//! # Subject Convention
//!
//! | Subject | Payload | Operation |
//! |---------|---------|-----------|
//! | `foundry.pipeline.start` | [`StartMessage`] | create session + attach observer relay |
//! | `foundry.pipeline.progress` | `ProgressEvent` | `apply_progress_event` |
//! | `foundry.pipeline.task` | `TaskEvent` | `apply_task_event` |
//! | `foundry.pipeline.terminate` | [`TerminateMessage`] | explicit termination |

use std::sync::Arc;

use foundry_broadcast::SessionBroadcaster;
use foundry_core::{ProgressAggregator, SessionRegistry, Termination};
use foundry_types::{ProgressEvent, SessionId, TaskEvent, UserId};
use futures::StreamExt as _;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::EngineError;
use crate::relay;

/// The subject wildcard this adapter consumes.
const PIPELINE_SUBJECTS: &str = "foundry.pipeline.>";

/// Payload of `foundry.pipeline.start`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartMessage {
    /// The new session's id (producer-chosen, must be unique).
    pub session_id: SessionId,
    /// The owning user.
    pub user_id: UserId,
    /// Name of the artifact being generated.
    pub artifact_name: String,
}

/// Payload of `foundry.pipeline.terminate`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminateMessage {
    /// The session to terminate.
    pub session_id: SessionId,
    /// `"cancelled"` or `"failed"`.
    pub reason: String,
    /// Human-readable explanation.
    #[serde(default)]
    pub message: String,
}

/// The NATS-to-core ingestion adapter.
pub struct PipelineIngest {
    client: async_nats::Client,
    registry: Arc<SessionRegistry>,
    aggregator: Arc<ProgressAggregator>,
    broadcaster: Arc<SessionBroadcaster>,
}

impl PipelineIngest {
    /// Create an adapter from an existing NATS client.
    pub const fn new(
        client: async_nats::Client,
        registry: Arc<SessionRegistry>,
        aggregator: Arc<ProgressAggregator>,
        broadcaster: Arc<SessionBroadcaster>,
    ) -> Self {
        Self {
            client,
            registry,
            aggregator,
            broadcaster,
        }
    }

    /// Subscribe to the pipeline subjects and process messages until
    /// the connection closes.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Nats`] if the subscription cannot be
    /// established. Per-message failures are logged, never returned.
    pub async fn run(self) -> Result<(), EngineError> {
        let mut sub = self
            .client
            .subscribe(PIPELINE_SUBJECTS.to_owned())
            .await
            .map_err(|e| EngineError::Nats {
                message: format!("failed to subscribe to {PIPELINE_SUBJECTS}: {e}"),
            })?;
        info!(subjects = PIPELINE_SUBJECTS, "pipeline ingest listening");

        while let Some(message) = sub.next().await {
            let operation = message
                .subject
                .as_str()
                .rsplit('.')
                .next()
                .unwrap_or_default()
                .to_owned();
            self.dispatch(&operation, &message.payload).await;
        }

        info!("pipeline ingest stream closed");
        Ok(())
    }

    /// Route one message by its subject suffix.
    async fn dispatch(&self, operation: &str, payload: &[u8]) {
        match operation {
            "start" => match serde_json::from_slice::<StartMessage>(payload) {
                Ok(start) => self.handle_start(start).await,
                Err(e) => warn!(error = %e, "malformed start message dropped"),
            },
            "progress" => match serde_json::from_slice::<ProgressEvent>(payload) {
                Ok(event) => {
                    if let Err(e) = self.aggregator.apply_progress_event(event).await {
                        warn!(error = %e, "progress event rejected");
                    }
                }
                Err(e) => warn!(error = %e, "malformed progress event dropped"),
            },
            "task" => match serde_json::from_slice::<TaskEvent>(payload) {
                Ok(event) => {
                    if let Err(e) = self.aggregator.apply_task_event(event).await {
                        warn!(error = %e, "task event rejected");
                    }
                }
                Err(e) => warn!(error = %e, "malformed task event dropped"),
            },
            "terminate" => match serde_json::from_slice::<TerminateMessage>(payload) {
                Ok(msg) => self.handle_terminate(msg).await,
                Err(e) => warn!(error = %e, "malformed terminate message dropped"),
            },
            other => debug!(operation = other, "unrecognized pipeline subject ignored"),
        }
    }

    async fn handle_start(&self, start: StartMessage) {
        match self
            .registry
            .create(
                start.session_id.clone(),
                start.user_id.clone(),
                start.artifact_name,
            )
            .await
        {
            Ok(_session) => {
                relay::attach_session_relay(
                    &self.broadcaster,
                    self.client.clone(),
                    start.session_id,
                    start.user_id,
                );
            }
            Err(e) => warn!(error = %e, "session start rejected"),
        }
    }

    async fn handle_terminate(&self, msg: TerminateMessage) {
        let reason = match msg.reason.as_str() {
            "cancelled" => Termination::Cancelled,
            "failed" => Termination::Failed,
            other => {
                warn!(reason = other, "terminate message with unknown reason dropped");
                return;
            }
        };
        if let Err(e) = self
            .registry
            .terminate(&msg.session_id, reason, msg.message)
            .await
        {
            warn!(error = %e, "terminate rejected");
        }
    }
}
