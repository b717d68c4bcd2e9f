//! Subscriber registry and event fan-out for the tracker's `latest-head` and
//! `error` channels.

use crate::tracker::head::Head;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Event channels a consumer can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// A new head strictly newer than every previously notified head.
    LatestHead,
    /// A fetch-and-update cycle failed; polling continues.
    Error,
}

/// Notification delivered to subscribers.
#[derive(Debug, Clone)]
pub enum TrackerEvent {
    LatestHead(Head),
    Error(Arc<anyhow::Error>),
}

/// Identity of a registered subscriber.
///
/// Issued by the tracker at subscription time; subscribing twice yields two
/// distinct ids and two independent deliveries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// A live subscription. Dropping the subscription (and with it the receiver)
/// unsubscribes lazily at the next emission.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    kind: EventKind,
    receiver: mpsc::UnboundedReceiver<TrackerEvent>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Receives the next event, or `None` once the tracker has dropped the
    /// sending side (explicit unsubscribe or tracker teardown).
    pub async fn recv(&mut self) -> Option<TrackerEvent> {
        self.receiver.recv().await
    }

    /// Non-blocking variant of [`recv`](Self::recv).
    pub fn try_recv(&mut self) -> Option<TrackerEvent> {
        self.receiver.try_recv().ok()
    }
}

struct SubscriberEntry {
    id: SubscriptionId,
    kind: EventKind,
    sender: mpsc::UnboundedSender<TrackerEvent>,
}

/// Registry of subscribers, kept in registration order so delivery order is
/// defined. Closed channels are pruned during emission.
#[derive(Default)]
pub(crate) struct SubscriberSet {
    entries: Vec<SubscriberEntry>,
    next_id: u64,
}

impl SubscriberSet {
    pub(crate) fn subscribe(&mut self, kind: EventKind) -> Subscription {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        let (sender, receiver) = mpsc::unbounded_channel();
        self.entries.push(SubscriberEntry { id, kind, sender });
        Subscription { id, kind, receiver }
    }

    /// Removes a subscriber by id. Returns whether an entry was removed.
    pub(crate) fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.id != id);
        self.entries.len() != before
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    /// Drops entries whose receiver is gone, without emitting anything.
    /// Dropping a `Subscription` unsubscribes through this path.
    pub(crate) fn prune_closed(&mut self) {
        self.entries.retain(|entry| !entry.sender.is_closed());
    }

    /// Delivers an event to every subscriber of `kind` in registration order.
    ///
    /// A send can only fail when the receiver is gone; the failure is logged
    /// (never silently dropped) and the dead entry is pruned. Returns the
    /// number of deliveries that reached a live receiver.
    pub(crate) fn emit(&mut self, kind: EventKind, event: &TrackerEvent) -> usize {
        let mut delivered = 0;
        self.entries.retain(|entry| {
            if entry.kind != kind {
                return true;
            }
            match entry.sender.send(event.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(failed) => {
                    match failed.0 {
                        TrackerEvent::Error(err) => tracing::error!(
                            subscription = entry.id.0,
                            error = %err,
                            "error event had no live receiver; dropping subscriber"
                        ),
                        TrackerEvent::LatestHead(head) => tracing::debug!(
                            subscription = entry.id.0,
                            %head,
                            "head event had no live receiver; dropping subscriber"
                        ),
                    }
                    false
                }
            }
        });
        delivered
    }
}
