//! Event channel built on crossbeam-channel.

use super::Event;
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};

/// Cloneable sending half. Dropped receivers make `send` a no-op so
/// progress reporting stays optional.
#[derive(Clone)]
pub struct EventSender {
    inner: Option<Sender<Event>>,
}

impl EventSender {
    pub fn send(&self, event: Event) {
        if let Some(sender) = &self.inner {
            let _ = sender.send(event);
        }
    }
}

/// Receiving half used by front ends
pub struct EventReceiver {
    inner: Receiver<Event>,
}

impl EventReceiver {
    /// Block until the next event, `None` once all senders are gone
    pub fn recv(&self) -> Option<Event> {
        self.inner.recv().ok()
    }

    pub fn try_recv(&self) -> Option<Event> {
        self.inner.try_recv().ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = Event> + '_ {
        self.inner.iter()
    }
}

/// Factory for event channels
pub struct EventChannel;

impl EventChannel {
    pub fn new() -> (EventSender, EventReceiver) {
        let (sender, receiver) = unbounded();
        (
            EventSender { inner: Some(sender) },
            EventReceiver { inner: receiver },
        )
    }

    /// Bounded variant for consumers that want backpressure
    pub fn bounded(capacity: usize) -> (EventSender, EventReceiver) {
        let (sender, receiver) = bounded(capacity);
        (
            EventSender { inner: Some(sender) },
            EventReceiver { inner: receiver },
        )
    }
}

/// A sender that discards everything; for callers without a UI
pub fn null_sender() -> EventSender {
    EventSender { inner: None }
}
