use std::sync::{
    mpsc::{self, Receiver, Sender},
    Mutex,
};

use crate::StashEvent;

/// Consumer of the events emitted while serving, fetching and indexing.
///
/// Emitting never fails; a sink that can no longer deliver drops the event.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: StashEvent);
}

/// Forwards events to a receiver, typically the progress renderer of a bulk run.
///
/// Once every clone of the sending side is dropped the receiver drains and ends.
pub struct ChannelSink {
    sender: Sender<StashEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, Receiver<StashEvent>) {
        let (sender, receiver) = mpsc::channel();
        (
            Self {
                sender,
            },
            receiver,
        )
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: StashEvent) {
        // A closed receiver means nobody renders progress anymore.
        let _ = self.sender.send(event);
    }
}

/// Discards every event. Used by `serve` and single-package indexing.
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: StashEvent) {}
}

/// Keeps every event in emission order.
#[derive(Default)]
pub struct CollectorSink {
    events: Mutex<Vec<StashEvent>>,
}

impl CollectorSink {
    /// Snapshot of the events collected so far.
    pub fn events(&self) -> Vec<StashEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Number of collected events matching `predicate`.
    pub fn count<P>(&self, predicate: P) -> usize
    where
        P: Fn(&StashEvent) -> bool,
    {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|event| predicate(event))
            .count()
    }
}

impl EventSink for CollectorSink {
    fn emit(&self, event: StashEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
    }
}
