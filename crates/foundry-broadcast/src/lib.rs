//! Topic-based event fanout with bounded per-subscriber queues.
//!
//! This crate implements the observer side of the Foundry tracking
//! core: the [`hub::SessionBroadcaster`] accepts subscriptions keyed by
//! session or user topic and fans published events out to every live
//! observer without ever blocking the producing pipeline. Backpressure
//! from a slow observer manifests only inside that observer's own
//! bounded [`queue::DeliveryQueue`], as dropped-oldest events replaced
//! by gap markers.
//!
//! Transports stay external: an observer attaches with a plain bounded
//! `mpsc::Sender`, and whatever protocol sits on the receiving end
//! (`WebSocket`, NATS, a test channel) is not this crate's concern.

pub mod hub;
pub mod queue;

pub use hub::{SessionBroadcaster, SubscriptionHandle, Topic};
pub use queue::DeliveryQueue;
