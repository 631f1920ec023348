//! The bounded per-subscriber delivery queue.
//!
//! Each subscriber owns one [`DeliveryQueue`]. Producers enqueue without
//! ever blocking; when the queue is full the oldest event is dropped and
//! a synthetic gap marker takes its place so the consumer can detect
//! loss. Consecutive drops coalesce into the existing marker, so one
//! dropped batch yields exactly one marker -- never silent loss, never a
//! flood of markers.
//!
//! Capacity counts real events: while a dropped batch is pending the
//! queue holds up to `capacity` events plus the one marker.

use std::collections::VecDeque;

use chrono::Utc;
use foundry_types::PipelineEvent;

/// A bounded FIFO of events awaiting delivery to one subscriber.
#[derive(Debug)]
pub struct DeliveryQueue {
    buf: VecDeque<PipelineEvent>,
    capacity: usize,
    dropped_total: u64,
}

impl DeliveryQueue {
    /// Create a queue holding at most `capacity` events.
    ///
    /// A capacity below 2 is raised to 2: the overflow policy needs room
    /// for at least two in-flight events to keep any ordering.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        Self {
            buf: VecDeque::with_capacity(capacity.saturating_add(1)),
            capacity,
            dropped_total: 0,
        }
    }

    /// Enqueue an event, applying the overflow policy when full.
    ///
    /// On overflow the oldest queued event is dropped and a gap marker
    /// takes its place at the front of the queue; while the marker is
    /// still at the front, further overflows drop the oldest event
    /// behind it and grow the marker's count instead of adding markers.
    pub fn push(&mut self, event: PipelineEvent) {
        if self.buf.len() < self.capacity {
            self.buf.push_back(event);
            return;
        }

        self.dropped_total = self.dropped_total.saturating_add(1);
        if let Some(PipelineEvent::Gap { dropped, .. }) = self.buf.front_mut() {
            *dropped = dropped.saturating_add(1);
            // The marker stays; the oldest real event behind it goes.
            let _ = self.buf.remove(1);
        } else {
            let _ = self.buf.pop_front();
            self.buf.push_front(PipelineEvent::Gap {
                dropped: 1,
                timestamp: Utc::now(),
            });
        }
        self.buf.push_back(event);
    }

    /// Dequeue the next event in FIFO order.
    pub fn pop(&mut self) -> Option<PipelineEvent> {
        self.buf.pop_front()
    }

    /// Number of entries (including any gap marker) currently queued.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Total events dropped over the queue's lifetime.
    pub const fn dropped_total(&self) -> u64 {
        self.dropped_total
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// Distinguishable non-gap events for order assertions.
    fn marker(n: u64) -> PipelineEvent {
        PipelineEvent::SessionExpired {
            session_id: foundry_types::SessionId::new(format!("s{n}")),
            timestamp: Utc::now(),
        }
    }

    fn id_of(event: &PipelineEvent) -> Option<String> {
        match event {
            PipelineEvent::SessionExpired { session_id, .. } => {
                Some(session_id.as_str().to_owned())
            }
            _ => None,
        }
    }

    #[test]
    fn fifo_below_capacity() {
        let mut queue = DeliveryQueue::new(4);
        for n in 0..3 {
            queue.push(marker(n));
        }
        assert_eq!(queue.len(), 3);
        for n in 0..3 {
            let event = queue.pop().unwrap();
            assert_eq!(id_of(&event), Some(format!("s{n}")));
        }
        assert!(queue.is_empty());
        assert_eq!(queue.dropped_total(), 0);
    }

    #[test]
    fn overflow_replaces_oldest_with_gap() {
        let mut queue = DeliveryQueue::new(3);
        for n in 0..4 {
            queue.push(marker(n));
        }

        // s0 was dropped: [gap(1), s1, s2, s3].
        assert_eq!(queue.dropped_total(), 1);
        let first = queue.pop().unwrap();
        assert!(matches!(first, PipelineEvent::Gap { dropped: 1, .. }));
        assert_eq!(id_of(&queue.pop().unwrap()), Some("s1".to_owned()));
        assert_eq!(id_of(&queue.pop().unwrap()), Some("s2".to_owned()));
        assert_eq!(id_of(&queue.pop().unwrap()), Some("s3".to_owned()));
        assert!(queue.is_empty());
    }

    #[test]
    fn consecutive_overflows_coalesce_into_one_marker() {
        let mut queue = DeliveryQueue::new(3);
        for n in 0..8 {
            queue.push(marker(n));
        }

        // 8 pushed into capacity 3: 5 dropped, exactly one marker.
        assert_eq!(queue.dropped_total(), 5);
        let first = queue.pop().unwrap();
        assert!(matches!(first, PipelineEvent::Gap { dropped: 5, .. }));

        // The survivors are the newest events, still in order.
        assert_eq!(id_of(&queue.pop().unwrap()), Some("s5".to_owned()));
        assert_eq!(id_of(&queue.pop().unwrap()), Some("s6".to_owned()));
        assert_eq!(id_of(&queue.pop().unwrap()), Some("s7".to_owned()));
        assert!(queue.pop().is_none());
    }

    #[test]
    fn drained_gap_starts_a_new_batch() {
        let mut queue = DeliveryQueue::new(3);
        for n in 0..5 {
            queue.push(marker(n));
        }
        // First batch: marker with 2 drops, then the survivors.
        let first = queue.pop().unwrap();
        assert!(matches!(first, PipelineEvent::Gap { dropped: 2, .. }));
        assert_eq!(id_of(&queue.pop().unwrap()), Some("s2".to_owned()));
        assert_eq!(id_of(&queue.pop().unwrap()), Some("s3".to_owned()));
        assert_eq!(id_of(&queue.pop().unwrap()), Some("s4".to_owned()));
        assert!(queue.is_empty());

        // Overflow again after draining: a fresh marker, not a
        // continuation of the old one.
        for n in 10..14 {
            queue.push(marker(n));
        }
        let first = queue.pop().unwrap();
        assert!(matches!(first, PipelineEvent::Gap { dropped: 1, .. }));
        assert_eq!(queue.dropped_total(), 3);
    }

    #[test]
    fn capacity_floor_is_two() {
        let mut queue = DeliveryQueue::new(0);
        queue.push(marker(0));
        queue.push(marker(1));
        queue.push(marker(2));
        // Capacity clamped to 2: s0 dropped, marker + newest survive.
        assert!(matches!(
            queue.pop().unwrap(),
            PipelineEvent::Gap { dropped: 1, .. }
        ));
        assert_eq!(id_of(&queue.pop().unwrap()), Some("s1".to_owned()));
        assert_eq!(id_of(&queue.pop().unwrap()), Some("s2".to_owned()));
        assert!(queue.is_empty());
    }

    #[test]
    fn relayed_gap_payload_is_queued_like_any_event() {
        // A gap marker arriving as a payload (relayed from another hop)
        // is an ordinary entry while no overflow touches it.
        let mut queue = DeliveryQueue::new(3);
        queue.push(PipelineEvent::Gap {
            dropped: 7,
            timestamp: Utc::now(),
        });
        queue.push(marker(1));
        assert_eq!(queue.len(), 2);
        assert!(matches!(
            queue.pop().unwrap(),
            PipelineEvent::Gap { dropped: 7, .. }
        ));
        assert_eq!(id_of(&queue.pop().unwrap()), Some("s1".to_owned()));
    }
}
