//! Backend relay: forwards device events to backend consumers.
//!
//! Frontend sessions [`publish`](BackendRelay::publish) events as they
//! happen; each connected backend channel runs [`pump`], which awaits the next
//! event and hands it to a [`RelaySink`].
//!
//! # Delivery guarantees
//!
//! Best effort.  The buffer is bounded: publishing never blocks, and when the
//! buffer is full the oldest event is discarded.  With no backend connected,
//! events accumulate up to the capacity and older ones are lost.  With
//! several backends connected, each event goes to exactly one of them.
//!
//! ```text
//! FrontendSession ──publish──► [ e1 e2 e3 ... eN ] ──next──► pump ──► RelaySink
//!                                 (drop-oldest)
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Notify;
use tracing::{debug, warn};

use crate::domain::RelayEvent;

/// A backend channel could not accept an event.
#[derive(Debug, Error)]
#[error("relay sink failed: {0}")]
pub struct SinkError(pub String);

/// Destination of relay events, usually one backend WebSocket.
#[async_trait]
pub trait RelaySink: Send {
    /// Delivers one event.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] when the destination is gone; the pump then stops.
    async fn deliver(&mut self, event: &RelayEvent) -> Result<(), SinkError>;
}

/// Bounded, drop-oldest event buffer shared by all sessions.
#[derive(Debug)]
pub struct BackendRelay {
    capacity: usize,
    queue: Mutex<VecDeque<RelayEvent>>,
    available: Notify,
    dropped: AtomicU64,
}

impl BackendRelay {
    /// Creates a relay holding at most `capacity` events (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
            available: Notify::new(),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of events currently buffered.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Total events discarded because the buffer was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Appends an event without blocking, discarding the oldest if full.
    pub fn publish(&self, event: RelayEvent) {
        let name = event.name();
        {
            let mut queue = self.lock();
            if queue.len() >= self.capacity {
                if let Some(oldest) = queue.pop_front() {
                    let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                    warn!(
                        "backend relay full ({} events); dropped oldest '{}' event ({total} dropped so far)",
                        self.capacity,
                        oldest.name()
                    );
                }
            }
            queue.push_back(event);
        }
        debug!("relay event '{name}' queued");
        self.available.notify_one();
    }

    /// Removes the oldest event without waiting.
    pub fn try_next(&self) -> Option<RelayEvent> {
        self.lock().pop_front()
    }

    /// Waits for the next event.
    pub async fn next(&self) -> RelayEvent {
        loop {
            if let Some(event) = self.try_next() {
                return event;
            }
            self.available.notified().await;
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<RelayEvent>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Forwards events from `relay` to `sink` until the sink fails.
///
/// The event that hit the failing sink is lost.
///
/// # Errors
///
/// Returns the sink's [`SinkError`].
pub async fn pump<S>(relay: &BackendRelay, sink: &mut S) -> Result<(), SinkError>
where
    S: RelaySink + ?Sized,
{
    loop {
        let event = relay.next().await;
        if let Err(e) = sink.deliver(&event).await {
            warn!("relay event '{}' lost: {e}", event.name());
            return Err(e);
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    /// Records delivered events; fails after `fail_after` deliveries.
    #[derive(Default)]
    struct RecordingSink {
        delivered: Vec<RelayEvent>,
        fail_after: Option<usize>,
    }

    #[async_trait]
    impl RelaySink for RecordingSink {
        async fn deliver(&mut self, event: &RelayEvent) -> Result<(), SinkError> {
            if self.fail_after == Some(self.delivered.len()) {
                return Err(SinkError("injected failure".to_string()));
            }
            self.delivered.push(event.clone());
            Ok(())
        }
    }

    fn acquisition(tag: f64) -> RelayEvent {
        RelayEvent::Acquisition {
            duration: tag,
            data: Vec::new(),
            output_file: None,
        }
    }

    #[test]
    fn test_publish_and_try_next_are_fifo() {
        // Arrange
        let relay = BackendRelay::new(4);

        // Act
        relay.publish(acquisition(1.0));
        relay.publish(RelayEvent::DeviceDisconnected);

        // Assert
        assert_eq!(relay.try_next(), Some(acquisition(1.0)));
        assert_eq!(relay.try_next(), Some(RelayEvent::DeviceDisconnected));
        assert_eq!(relay.try_next(), None);
    }

    #[test]
    fn test_full_buffer_drops_oldest() {
        // Arrange
        let relay = BackendRelay::new(2);

        // Act
        relay.publish(acquisition(1.0));
        relay.publish(acquisition(2.0));
        relay.publish(acquisition(3.0));

        // Assert
        assert_eq!(relay.len(), 2);
        assert_eq!(relay.dropped(), 1);
        assert_eq!(relay.try_next(), Some(acquisition(2.0)));
        assert_eq!(relay.try_next(), Some(acquisition(3.0)));
    }

    #[test]
    fn test_zero_capacity_is_raised_to_one() {
        let relay = BackendRelay::new(0);
        relay.publish(acquisition(1.0));
        assert_eq!(relay.capacity(), 1);
        assert_eq!(relay.len(), 1);
    }

    #[tokio::test]
    async fn test_next_waits_for_publish() {
        // Arrange
        let relay = Arc::new(BackendRelay::new(8));
        let consumer = {
            let relay = Arc::clone(&relay);
            tokio::spawn(async move { relay.next().await })
        };

        // Act
        tokio::time::sleep(Duration::from_millis(20)).await;
        relay.publish(RelayEvent::DeviceDisconnected);

        // Assert
        let event = tokio::time::timeout(Duration::from_secs(1), consumer)
            .await
            .expect("consumer must wake up")
            .unwrap();
        assert_eq!(event, RelayEvent::DeviceDisconnected);
    }

    #[tokio::test]
    async fn test_pump_delivers_in_order_and_stops_on_sink_failure() {
        // Arrange
        let relay = BackendRelay::new(8);
        relay.publish(acquisition(1.0));
        relay.publish(acquisition(2.0));
        relay.publish(acquisition(3.0));
        let mut sink = RecordingSink {
            fail_after: Some(2),
            ..RecordingSink::default()
        };

        // Act
        let result = pump(&relay, &mut sink).await;

        // Assert: third event hit the failure and is gone
        assert!(result.is_err());
        assert_eq!(sink.delivered, vec![acquisition(1.0), acquisition(2.0)]);
        assert!(relay.is_empty());
    }
}
