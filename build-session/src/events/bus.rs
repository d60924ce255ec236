//! Event bus for build notifications
//!
//! Fire-and-forget pub/sub over a Tokio broadcast channel. Publishing with
//! no subscribers is not an error.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::broadcast;
use tracing::debug;

use super::types::{BuildEvent, BuildId, BuildResult, Notification};

/// Channel capacity for broadcast
const CHANNEL_CAPACITY: usize = 256;

/// Error type for event bus operations
#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Channel closed")]
    ChannelClosed,

    #[error("Subscriber lagged behind by {0} events")]
    Lagged(u64),
}

/// Result type for event bus operations
pub type EventBusResult<T> = Result<T, EventBusError>;

/// Shared reference to EventBus
pub type SharedEventBus = Arc<EventBus>;

/// Broadcasts `started`/`completed` notifications to listeners
pub struct EventBus {
    sender: broadcast::Sender<Notification>,
    sequence: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            sender,
            sequence: AtomicU64::new(0),
        }
    }

    /// Create a shared reference to this event bus
    pub fn shared(self) -> SharedEventBus {
        Arc::new(self)
    }

    /// Announce that `build_id` was accepted
    pub fn started(&self, build_id: BuildId) -> Notification {
        self.publish(build_id, BuildEvent::BuildStarted)
    }

    /// Announce the final result of `build_id`
    pub fn completed(&self, build_id: BuildId, result: BuildResult) -> Notification {
        self.publish(build_id, BuildEvent::BuildCompleted(result))
    }

    /// Publish an event to all subscribers and return the sent envelope
    pub fn publish(&self, build_id: BuildId, event: BuildEvent) -> Notification {
        let notification = Notification {
            id: Notification::new_id(),
            sequence: self.sequence.fetch_add(1, Ordering::SeqCst) + 1,
            build_id,
            timestamp: Utc::now(),
            event,
        };
        let event_type = notification.event_type();
        let sequence = notification.sequence;

        // Broadcast to subscribers (ignore if no receivers)
        match self.sender.send(notification.clone()) {
            Ok(count) => {
                debug!(event_type, build_id, sequence, receivers = count, "Event published");
            }
            Err(_) => {
                debug!(event_type, build_id, sequence, "Event published (no receivers)");
            }
        }
        notification
    }

    /// Subscribe to receive events
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Get the number of current subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving side of the bus
pub struct EventReceiver {
    receiver: broadcast::Receiver<Notification>,
}

impl EventReceiver {
    /// Receive the next notification
    pub async fn recv(&mut self) -> EventBusResult<Notification> {
        self.receiver.recv().await.map_err(|e| match e {
            broadcast::error::RecvError::Closed => EventBusError::ChannelClosed,
            broadcast::error::RecvError::Lagged(n) => EventBusError::Lagged(n),
        })
    }

    /// Receive without waiting; `None` when nothing is queued
    pub fn try_recv(&mut self) -> EventBusResult<Option<Notification>> {
        match self.receiver.try_recv() {
            Ok(n) => Ok(Some(n)),
            Err(broadcast::error::TryRecvError::Empty) => Ok(None),
            Err(broadcast::error::TryRecvError::Closed) => Err(EventBusError::ChannelClosed),
            Err(broadcast::error::TryRecvError::Lagged(n)) => Err(EventBusError::Lagged(n)),
        }
    }

    /// Wait for the `completed` notification of `build_id`, skipping others
    pub async fn completion_of(&mut self, build_id: BuildId) -> EventBusResult<Notification> {
        loop {
            let notification = self.recv().await?;
            if notification.build_id == build_id && notification.is_completed() {
                return Ok(notification);
            }
        }
    }

    /// Everything queued right now, in publish order
    pub fn drain(&mut self) -> Vec<Notification> {
        let mut out = Vec::new();
        while let Ok(Some(n)) = self.try_recv() {
            out.push(n);
        }
        out
    }
}
