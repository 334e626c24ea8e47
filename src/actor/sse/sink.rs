//! Write side of one event stream subscription.

use thiserror::Error;
use tokio::sync::mpsc;

/// The subscriber's connection is gone.
#[derive(Debug, Error)]
#[error("subscriber disconnected")]
pub struct SinkClosed;

/// Destination for encoded event frames.
///
/// `send` must not block: the registry writes to every subscriber while
/// holding its lock.
pub trait EventSink: Send + Sync + 'static {
    fn send(&self, frame: &str) -> Result<(), SinkClosed>;
}

/// Sink feeding the connection task that owns the socket.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<String>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn send(&self, frame: &str) -> Result<(), SinkClosed> {
        self.tx.send(frame.to_string()).map_err(|_| SinkClosed)
    }
}
