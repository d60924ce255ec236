//! Per-build capture of console output

use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::bus::{Channel, ConsoleBusResult, ConsoleChunk, SharedConsoleBus};

/// An active subscription to the console stream.
///
/// Dropping it unsubscribes.
struct Subscription {
    receiver: broadcast::Receiver<ConsoleChunk>,
}

/// Accumulates stdout and stderr text while subscribed
pub struct ConsoleCapture {
    bus: SharedConsoleBus,
    subscription: Option<Subscription>,
    normalize_newlines: bool,
    stdout: String,
    stderr: String,
}

impl ConsoleCapture {
    /// `normalize_newlines` terminates every chunk with `\n`, for hosts
    /// that multiplex both channels onto one unbuffered stream.
    pub fn new(bus: SharedConsoleBus, normalize_newlines: bool) -> Self {
        Self {
            bus,
            subscription: None,
            normalize_newlines,
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    pub fn bus(&self) -> &SharedConsoleBus {
        &self.bus
    }

    /// Subscribe to the console stream. Subscribing twice is a no-op.
    pub fn subscribe(&mut self) -> ConsoleBusResult<()> {
        if self.subscription.is_some() {
            return Ok(());
        }
        let receiver = self.bus.subscribe()?;
        self.subscription = Some(Subscription { receiver });
        debug!("Console capture subscribed");
        Ok(())
    }

    /// Drop the subscription; returns whether one was active
    pub fn unsubscribe(&mut self) -> bool {
        let was_subscribed = self.subscription.take().is_some();
        if was_subscribed {
            debug!("Console capture unsubscribed");
        }
        was_subscribed
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    /// Append a chunk to the buffer of its channel. Ignored when not
    /// subscribed.
    pub fn append(&mut self, chunk: ConsoleChunk) -> bool {
        if self.subscription.is_none() {
            return false;
        }
        let text = if self.normalize_newlines {
            normalize_newline(chunk.text)
        } else {
            chunk.text
        };
        match chunk.channel {
            Channel::Normal => self.stdout.push_str(&text),
            Channel::Error => self.stderr.push_str(&text),
        }
        true
    }

    /// Append every chunk already queued on the subscription
    pub fn drain(&mut self) -> usize {
        let mut appended = 0;
        loop {
            let Some(subscription) = self.subscription.as_mut() else {
                return appended;
            };
            match subscription.receiver.try_recv() {
                Ok(chunk) => {
                    self.append(chunk);
                    appended += 1;
                }
                Err(broadcast::error::TryRecvError::Empty) => return appended,
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "Console capture lagged; output was lost");
                }
                Err(broadcast::error::TryRecvError::Closed) => {
                    self.subscription = None;
                    return appended;
                }
            }
        }
    }

    /// Wait for the next chunk. Never resolves while unsubscribed; returns
    /// `None` once when the stream closes.
    pub async fn next_chunk(&mut self) -> Option<ConsoleChunk> {
        loop {
            let Some(subscription) = self.subscription.as_mut() else {
                return std::future::pending().await;
            };
            match subscription.receiver.recv().await {
                Ok(chunk) => return Some(chunk),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Console capture lagged; output was lost");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    warn!("Console stream closed during capture");
                    self.subscription = None;
                    return None;
                }
            }
        }
    }

    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    /// Take both buffers, leaving them empty
    pub fn take_buffers(&mut self) -> (String, String) {
        (
            std::mem::take(&mut self.stdout),
            std::mem::take(&mut self.stderr),
        )
    }

    /// Unsubscribe and clear both buffers
    pub fn reset(&mut self) {
        self.unsubscribe();
        self.stdout.clear();
        self.stderr.clear();
    }
}

/// Terminate `text` with a newline unless it already ends with one
pub fn normalize_newline(mut text: String) -> String {
    if !text.ends_with('\n') {
        text.push('\n');
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::ConsoleBus;

    fn capture(normalize: bool) -> ConsoleCapture {
        ConsoleCapture::new(ConsoleBus::new().shared(), normalize)
    }

    #[test]
    fn test_normalize_newline() {
        assert_eq!(normalize_newline("abc".to_string()), "abc\n");
        assert_eq!(normalize_newline("abc\n".to_string()), "abc\n");
        assert_eq!(normalize_newline(normalize_newline("abc".to_string())), "abc\n");
    }

    #[test]
    fn test_chunks_routed_by_channel() {
        let mut capture = capture(false);
        capture.subscribe().unwrap();

        capture.append(ConsoleChunk::normal("compiling "));
        capture.append(ConsoleChunk::error("x.cpp:1:1: error: e\n"));
        capture.append(ConsoleChunk::normal("done\n"));

        assert_eq!(capture.stdout(), "compiling done\n");
        assert_eq!(capture.stderr(), "x.cpp:1:1: error: e\n");
    }

    #[test]
    fn test_normalization_applies_when_enabled() {
        let mut capture = capture(true);
        capture.subscribe().unwrap();

        capture.append(ConsoleChunk::normal("abc"));
        capture.append(ConsoleChunk::error("def\n"));

        assert_eq!(capture.stdout(), "abc\n");
        assert_eq!(capture.stderr(), "def\n");
    }

    #[test]
    fn test_append_ignored_when_unsubscribed() {
        let mut capture = capture(false);
        assert!(!capture.append(ConsoleChunk::normal("stray")));
        assert_eq!(capture.stdout(), "");
    }

    #[test]
    fn test_subscribe_and_unsubscribe_are_idempotent() {
        let bus = ConsoleBus::new().shared();
        let mut capture = ConsoleCapture::new(bus.clone(), false);

        capture.subscribe().unwrap();
        capture.subscribe().unwrap();
        assert_eq!(bus.subscriber_count(), 1);

        assert!(capture.unsubscribe());
        assert!(!capture.unsubscribe());
        assert_eq!(bus.subscriber_count(), 0);

        capture.reset();
        capture.reset();
        assert!(!capture.is_subscribed());
    }

    #[test]
    fn test_drain_reads_bus_in_order() {
        let bus = ConsoleBus::new().shared();
        let mut capture = ConsoleCapture::new(bus.clone(), false);
        capture.subscribe().unwrap();

        bus.write_normal("a\n");
        bus.write_error("b\n");
        bus.write_normal("c\n");

        assert_eq!(capture.drain(), 3);
        assert_eq!(capture.stdout(), "a\nc\n");
        assert_eq!(capture.stderr(), "b\n");
        assert_eq!(capture.drain(), 0);
    }

    #[test]
    fn test_chunks_before_subscribe_are_not_seen() {
        let bus = ConsoleBus::new().shared();
        let mut capture = ConsoleCapture::new(bus.clone(), false);

        bus.write_normal("early\n");
        capture.subscribe().unwrap();
        bus.write_normal("late\n");

        capture.drain();
        assert_eq!(capture.stdout(), "late\n");
    }

    fn overflowed_capture() -> (SharedConsoleBus, ConsoleCapture) {
        let bus = ConsoleBus::with_capacity(2).shared();
        let mut capture = ConsoleCapture::new(bus.clone(), false);
        capture.subscribe().unwrap();
        for i in 1..=5 {
            bus.write_normal(format!("{i}\n"));
        }
        (bus, capture)
    }

    #[test]
    fn test_drain_continues_after_lag() {
        let (bus, mut capture) = overflowed_capture();

        // The oldest three chunks were overwritten
        assert_eq!(capture.drain(), 2);
        assert_eq!(capture.stdout(), "4\n5\n");
        assert!(capture.is_subscribed());

        bus.write_normal("6\n");
        assert_eq!(capture.drain(), 1);
        assert_eq!(capture.stdout(), "4\n5\n6\n");
    }

    #[tokio::test]
    async fn test_next_chunk_continues_after_lag() {
        let (_bus, mut capture) = overflowed_capture();

        assert_eq!(capture.next_chunk().await, Some(ConsoleChunk::normal("4\n")));
        assert_eq!(capture.next_chunk().await, Some(ConsoleChunk::normal("5\n")));
        assert!(capture.is_subscribed());
    }

    #[tokio::test]
    async fn test_next_chunk_ends_when_stream_closes() {
        let bus = ConsoleBus::new().shared();
        let mut capture = ConsoleCapture::new(bus.clone(), false);
        capture.subscribe().unwrap();

        bus.write_error("last\n");
        bus.close();

        assert_eq!(capture.next_chunk().await, Some(ConsoleChunk::error("last\n")));
        assert_eq!(capture.next_chunk().await, None);
        assert!(!capture.is_subscribed());
    }
}
