//! Outbound event sinks
//!
//! The collector hands each event over and keeps no reference to it.

use std::io::Write;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{error, warn};

use crate::event::Event;

/// Anything that can take ownership of a published event
pub trait Publisher: Send + Sync {
    fn publish(&self, event: Event);
}

/// Writes each event as one JSON line
pub struct JsonLinesPublisher<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesPublisher<W> {
    pub fn new(writer: W) -> Self {
        JsonLinesPublisher {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl JsonLinesPublisher<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> Publisher for JsonLinesPublisher<W> {
    fn publish(&self, event: Event) {
        let line = match serde_json::to_string(&event) {
            Ok(line) => line,
            Err(e) => {
                error!(kind = %event.kind, error = %e, "Failed to serialize event");
                return;
            }
        };

        let mut writer = self.writer.lock();
        if let Err(e) = writeln!(writer, "{}", line).and_then(|_| writer.flush()) {
            error!(kind = %event.kind, error = %e, "Failed to write event");
        }
    }
}

/// Forwards events into an unbounded channel
#[derive(Clone)]
pub struct ChannelPublisher {
    tx: mpsc::UnboundedSender<Event>,
}

impl ChannelPublisher {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ChannelPublisher { tx }, rx)
    }
}

impl Publisher for ChannelPublisher {
    fn publish(&self, event: Event) {
        if let Err(e) = self.tx.send(event) {
            warn!(kind = %e.0.kind, "Event receiver dropped, discarding event");
        }
    }
}
