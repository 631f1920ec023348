//! The session broadcaster: topic-keyed fanout to live observers.
//!
//! Observers subscribe with a bounded `mpsc::Sender` owned by their
//! transport adapter and a set of topics (a session, a user, or both).
//! [`SessionBroadcaster::publish`] is synchronous and never blocks: it
//! enqueues into each matching subscriber's private [`DeliveryQueue`]
//! and wakes that subscriber's drain task. The drain delivers strictly
//! FIFO into the sink; a closed sink (the observer disconnected) lazily
//! removes the subscription on the failed delivery attempt.
//!
//! Ordering is guaranteed per subscriber only -- two observers of the
//! same session may see events at different times, but each sees them
//! in publish order.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, RwLock, Weak};

use foundry_core::publisher::EventPublisher;
use foundry_types::{
    ConnectionId, PipelineEvent, SessionId, SubscriptionId, UserId,
};
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::queue::DeliveryQueue;

/// A topic an observer can subscribe to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Topic {
    /// All events for one session.
    Session(SessionId),
    /// All events for every session owned by one user.
    User(UserId),
}

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionHandle {
    /// The broadcaster-minted subscription id.
    pub id: SubscriptionId,
    /// The connection this subscription belongs to.
    pub connection_id: ConnectionId,
}

/// One live observer subscription.
struct Subscriber {
    user_id: UserId,
    connection_id: ConnectionId,
    topics: BTreeSet<Topic>,
    queue: Arc<Mutex<DeliveryQueue>>,
    notify: Arc<Notify>,
    drain: JoinHandle<()>,
}

impl Drop for Subscriber {
    fn drop(&mut self) {
        self.drain.abort();
    }
}

/// Topic-based publish/subscribe fanout keyed by session and user.
pub struct SessionBroadcaster {
    subscribers: RwLock<BTreeMap<SubscriptionId, Subscriber>>,
    queue_capacity: usize,
}

impl SessionBroadcaster {
    /// Create a broadcaster whose subscriber queues hold `queue_capacity`
    /// events each.
    pub fn new(queue_capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            subscribers: RwLock::new(BTreeMap::new()),
            queue_capacity,
        })
    }

    /// Attach an observer to a set of topics.
    ///
    /// `sink` is the bounded channel owned by the observer's transport
    /// adapter; the drain task feeds it in FIFO order and removes the
    /// subscription when the receiving side is gone. Must be called from
    /// within a tokio runtime (the drain task is spawned here).
    pub fn subscribe(
        self: &Arc<Self>,
        user_id: UserId,
        connection_id: ConnectionId,
        topics: BTreeSet<Topic>,
        sink: mpsc::Sender<PipelineEvent>,
    ) -> SubscriptionHandle {
        let id = SubscriptionId::new();
        let queue = Arc::new(Mutex::new(DeliveryQueue::new(self.queue_capacity)));
        let notify = Arc::new(Notify::new());

        let drain = spawn_drain(
            Arc::downgrade(self),
            id,
            Arc::clone(&queue),
            Arc::clone(&notify),
            sink,
        );

        let subscriber = Subscriber {
            user_id,
            connection_id: connection_id.clone(),
            topics,
            queue,
            notify,
            drain,
        };
        if let Ok(mut subscribers) = self.subscribers.write() {
            subscribers.insert(id, subscriber);
        }
        debug!(subscription_id = %id, connection_id = %connection_id, "observer subscribed");
        SubscriptionHandle { id, connection_id }
    }

    /// Convenience for the common case: one observer, one session.
    pub fn subscribe_session(
        self: &Arc<Self>,
        session_id: SessionId,
        user_id: UserId,
        connection_id: ConnectionId,
        sink: mpsc::Sender<PipelineEvent>,
    ) -> SubscriptionHandle {
        let mut topics = BTreeSet::new();
        topics.insert(Topic::Session(session_id));
        self.subscribe(user_id, connection_id, topics, sink)
    }

    /// Detach an observer eagerly (explicit disconnect from the
    /// transport layer).
    pub fn unsubscribe(&self, handle: &SubscriptionHandle) {
        self.remove(handle.id);
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().map(|s| s.len()).unwrap_or(0)
    }

    fn remove(&self, id: SubscriptionId) {
        let removed = self
            .subscribers
            .write()
            .ok()
            .and_then(|mut subscribers| subscribers.remove(&id));
        if let Some(subscriber) = removed {
            debug!(
                subscription_id = %id,
                connection_id = %subscriber.connection_id,
                user_id = %subscriber.user_id,
                "observer unsubscribed"
            );
            // Dropping the subscriber aborts its drain task.
            drop(subscriber);
        }
    }
}

impl EventPublisher for SessionBroadcaster {
    /// Fan an event out to every subscriber of its session and user
    /// topics. Never blocks and never surfaces failure to the producer:
    /// slow observers lose old events to gap markers inside their own
    /// queues.
    fn publish(&self, event: &PipelineEvent) {
        let session_topic = event.session_id().cloned().map(Topic::Session);
        let user_topic = event.user_id().cloned().map(Topic::User);
        if session_topic.is_none() && user_topic.is_none() {
            return;
        }

        let Ok(subscribers) = self.subscribers.read() else {
            return;
        };
        for (id, subscriber) in subscribers.iter() {
            let interested = session_topic
                .as_ref()
                .is_some_and(|t| subscriber.topics.contains(t))
                || user_topic
                    .as_ref()
                    .is_some_and(|t| subscriber.topics.contains(t));
            if !interested {
                continue;
            }

            if let Ok(mut queue) = subscriber.queue.lock() {
                queue.push(event.clone());
                trace!(subscription_id = %id, queued = queue.len(), "event enqueued");
            }
            subscriber.notify.notify_one();
        }
    }
}

/// Spawn the background drain for one subscriber.
///
/// Pops the queue in FIFO order and awaits the sink. The queue lock is
/// never held across an await. When the sink is closed the subscription
/// removes itself (lazy disconnect detection).
fn spawn_drain(
    broadcaster: Weak<SessionBroadcaster>,
    id: SubscriptionId,
    queue: Arc<Mutex<DeliveryQueue>>,
    notify: Arc<Notify>,
    sink: mpsc::Sender<PipelineEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            loop {
                let next = queue.lock().ok().and_then(|mut q| q.pop());
                let Some(event) = next else {
                    break;
                };
                if sink.send(event).await.is_err() {
                    debug!(subscription_id = %id, "sink closed, removing subscription");
                    if let Some(broadcaster) = broadcaster.upgrade() {
                        broadcaster.remove(id);
                    }
                    return;
                }
            }
            notify.notified().await;
        }
    })
}
