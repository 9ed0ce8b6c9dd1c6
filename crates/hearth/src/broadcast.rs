//! In-process fan-out of events to registered subscriber channels.
//!
//! Each subscriber owns a bounded `tokio::sync::mpsc` channel and registers its
//! sender with the hub. `submit` never blocks: an event that does not fit into
//! a subscriber's buffer is dropped for that subscriber only (drop-newest).

use log::{debug, warn};
use parking_lot::RwLock;
use tokio::sync::mpsc::{self, Receiver, Sender, error::TrySendError};

/// Pending events buffered per subscriber by [`subscriber_channel`].
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 100;

/// Create a subscriber channel with the default capacity.
pub fn subscriber_channel<T>() -> (Sender<T>, Receiver<T>) {
    mpsc::channel(DEFAULT_SUBSCRIBER_CAPACITY)
}

/// Per-submission delivery counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: usize,
    pub dropped: usize,
}

pub struct BroadcastHub<T> {
    subscribers: RwLock<Vec<Sender<T>>>,
}

impl<T> Default for BroadcastHub<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> BroadcastHub<T> {
    pub fn new() -> Self {
        BroadcastHub {
            subscribers: RwLock::new(Vec::new()),
        }
    }

    /// Start delivering to `channel`. Events submitted before this returns are
    /// never delivered to it. Registering the same channel twice is a no-op.
    pub fn register(&self, channel: Sender<T>) {
        let mut subscribers = self.subscribers.write();
        if subscribers.iter().any(|s| s.same_channel(&channel)) {
            return;
        }
        subscribers.push(channel);
        debug!("Registered subscriber, {} total", subscribers.len());
    }

    /// Stop delivering to `channel`. The hub drops its sender handle but never
    /// closes the channel; the caller keeps its own handles.
    pub fn unregister(&self, channel: &Sender<T>) {
        let mut subscribers = self.subscribers.write();
        subscribers.retain(|s| !s.same_channel(channel));
        debug!("Unregistered subscriber, {} remaining", subscribers.len());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

impl<T: Clone> BroadcastHub<T> {
    /// Deliver `event` to every registered subscriber without blocking.
    pub fn submit(&self, event: T) -> Delivery {
        let mut delivery = Delivery::default();
        let mut saw_closed = false;
        {
            let subscribers = self.subscribers.read();
            for subscriber in subscribers.iter() {
                match subscriber.try_send(event.clone()) {
                    Ok(()) => delivery.delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        delivery.dropped += 1;
                        warn!("Subscriber buffer full, dropping event");
                    }
                    Err(TrySendError::Closed(_)) => {
                        delivery.dropped += 1;
                        saw_closed = true;
                    }
                }
            }
        }

        if saw_closed {
            let mut subscribers = self.subscribers.write();
            let before = subscribers.len();
            subscribers.retain(|s| !s.is_closed());
            debug!(
                "Pruned {} closed subscribers",
                before.saturating_sub(subscribers.len())
            );
        }

        delivery
    }
}
