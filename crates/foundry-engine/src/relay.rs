//! Observer relay: republishes one session's event stream over NATS.
//!
//! When a session starts, the engine attaches a relay subscription to
//! the broadcaster and forwards every delivered event as JSON on
//! `foundry.observe.<sessionId>`. Dashboards and other processes follow
//! a session by subscribing to that subject; the relay is just another
//! observer, so a slow NATS connection loses old events to gap markers
//! instead of slowing producers.
//!
//! The relay ends itself after forwarding the terminal event
//! (`sessionTerminated` or `sessionExpired`) and detaches its
//! subscription.

use std::sync::Arc;

use foundry_broadcast::SessionBroadcaster;
use foundry_types::{ConnectionId, PipelineEvent, SessionId, UserId};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Capacity of the relay's sink channel between the broadcaster's drain
/// and the NATS publisher.
const RELAY_SINK_CAPACITY: usize = 64;

/// Attach a relay that mirrors one session's events onto NATS.
///
/// The relay runs until the session's terminal event has been forwarded,
/// then unsubscribes itself.
pub fn attach_session_relay(
    broadcaster: &Arc<SessionBroadcaster>,
    client: async_nats::Client,
    session_id: SessionId,
    user_id: UserId,
) {
    let subject = format!("foundry.observe.{session_id}");
    let connection_id = ConnectionId::new(format!("relay-{session_id}"));
    let (tx, mut rx) = mpsc::channel::<PipelineEvent>(RELAY_SINK_CAPACITY);

    let handle = broadcaster.subscribe_session(
        session_id.clone(),
        user_id,
        connection_id,
        tx,
    );

    let broadcaster = Arc::downgrade(broadcaster);
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let terminal = matches!(
                event,
                PipelineEvent::SessionTerminated { .. } | PipelineEvent::SessionExpired { .. }
            );

            match serde_json::to_vec(&event) {
                Ok(payload) => {
                    if let Err(e) = client.publish(subject.clone(), payload.into()).await {
                        warn!(
                            subject = %subject,
                            error = %e,
                            "relay publish failed, event lost to this subject"
                        );
                    }
                }
                Err(e) => warn!(error = %e, kind = event.kind(), "relay serialization failed"),
            }

            if terminal {
                break;
            }
        }

        debug!(session_id = %session_id, "observer relay finished");
        if let Some(broadcaster) = broadcaster.upgrade() {
            broadcaster.unsubscribe(&handle);
        }
    });
}
