//! Process-wide console output stream
//!
//! Whatever runs the child process publishes its output here as
//! channel-tagged chunks; an active build subscribes for its duration.

use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use crate::events::OutputKind;

/// Console channel of a chunk (standard output or standard error)
pub type Channel = OutputKind;

/// Chunks buffered per subscriber before it starts lagging
pub const CHANNEL_CAPACITY: usize = 4096;

/// Error type for console bus operations
#[derive(Debug, thiserror::Error)]
pub enum ConsoleBusError {
    #[error("Console stream is closed")]
    Closed,
}

/// Result type for console bus operations
pub type ConsoleBusResult<T> = Result<T, ConsoleBusError>;

/// Shared reference to ConsoleBus
pub type SharedConsoleBus = Arc<ConsoleBus>;

/// A piece of console output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleChunk {
    pub channel: Channel,
    pub text: String,
}

impl ConsoleChunk {
    pub fn normal(text: impl Into<String>) -> Self {
        Self {
            channel: Channel::Normal,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            channel: Channel::Error,
            text: text.into(),
        }
    }
}

/// Broadcast stream of console chunks
pub struct ConsoleBus {
    sender: RwLock<Option<broadcast::Sender<ConsoleChunk>>>,
}

impl ConsoleBus {
    pub fn new() -> Self {
        Self::with_capacity(CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: RwLock::new(Some(sender)),
        }
    }

    /// Create a shared reference to this bus
    pub fn shared(self) -> SharedConsoleBus {
        Arc::new(self)
    }

    /// Publish a chunk; returns how many subscribers received it
    pub fn publish(&self, chunk: ConsoleChunk) -> usize {
        let guard = self.sender.read().unwrap_or_else(|e| e.into_inner());
        let Some(sender) = guard.as_ref() else {
            debug!(channel = %chunk.channel, "Console chunk dropped (stream closed)");
            return 0;
        };
        sender.send(chunk).unwrap_or(0)
    }

    pub fn write_normal(&self, text: impl Into<String>) -> usize {
        self.publish(ConsoleChunk::normal(text))
    }

    pub fn write_error(&self, text: impl Into<String>) -> usize {
        self.publish(ConsoleChunk::error(text))
    }

    /// Start receiving chunks published from now on
    pub fn subscribe(&self) -> ConsoleBusResult<broadcast::Receiver<ConsoleChunk>> {
        self.sender
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|s| s.subscribe())
            .ok_or(ConsoleBusError::Closed)
    }

    /// Close the stream; existing subscribers see the end of the stream
    pub fn close(&self) {
        self.sender.write().unwrap_or_else(|e| e.into_inner()).take();
    }

    pub fn is_closed(&self) -> bool {
        self.sender
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_none()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|s| s.receiver_count())
            .unwrap_or(0)
    }
}

impl Default for ConsoleBus {
    fn default() -> Self {
        Self::new()
    }
}
