//! Outbound notification seam.
//!
//! The swapper and the installer report progress through [`Notifier`]; the
//! serve command plugs in a channel feeding the WebSocket actor.

use super::BusMessage;
use tokio::sync::mpsc;

/// Sink for outbound bus messages. Delivery is fire-and-forget.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: BusMessage);
}

/// Forwards messages into an unbounded channel.
#[derive(Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<BusMessage>,
}

impl ChannelNotifier {
    pub fn new(tx: mpsc::UnboundedSender<BusMessage>) -> Self {
        Self { tx }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<BusMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, message: BusMessage) {
        if self.tx.send(message).is_err() {
            crate::debug!("bus"; "no receiver, message dropped");
        }
    }
}

/// Discards everything (one-shot CLI commands).
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _message: BusMessage) {}
}

/// Keeps every message for assertions.
#[cfg(test)]
#[derive(Default)]
pub struct RecordingNotifier {
    messages: parking_lot::Mutex<Vec<BusMessage>>,
}

#[cfg(test)]
impl RecordingNotifier {
    pub fn messages(&self) -> Vec<BusMessage> {
        self.messages.lock().clone()
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.messages.lock().iter().map(BusMessage::kind).collect()
    }

    pub fn count(&self, kind: &str) -> usize {
        self.messages.lock().iter().filter(|m| m.kind() == kind).count()
    }
}

#[cfg(test)]
impl Notifier for RecordingNotifier {
    fn notify(&self, message: BusMessage) {
        self.messages.lock().push(message);
    }
}
