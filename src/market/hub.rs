//! Mailbox-per-subscriber broadcast.
//!
//! Each subscriber owns an unbounded mailbox. Broadcasting snapshots the
//! sender list and sends outside the lock, so a subscriber may drop its
//! subscription while events are in flight, including from the task that
//! is handling one.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::trace;

pub struct ListenerHub<E> {
    subscribers: Mutex<Vec<(u64, UnboundedSender<E>)>>,
    next_id: AtomicU64,
    closed: AtomicBool,
}

impl<E: Clone + Send + 'static> ListenerHub<E> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        })
    }

    /// Register a new mailbox. Only events broadcast after this call arrive.
    /// On a closed hub the mailbox is already at its end.
    pub fn subscribe(self: &Arc<Self>) -> Subscription<E> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        let mut subscribers = self.subscribers.lock();
        if !self.closed.load(Ordering::Acquire) {
            subscribers.push((id, tx));
        }
        drop(subscribers);
        trace!(subscriber = id, "Subscribed");
        Subscription {
            id,
            rx,
            hub: Arc::downgrade(self),
        }
    }

    /// Deliver `event` to every live subscriber. Returns how many got it.
    pub fn broadcast(&self, event: E) -> usize {
        let snapshot: Vec<(u64, UnboundedSender<E>)> = self.subscribers.lock().clone();

        let mut delivered = 0;
        let mut gone = Vec::new();
        for (id, tx) in snapshot {
            if tx.send(event.clone()).is_ok() {
                delivered += 1;
            } else {
                gone.push(id);
            }
        }

        if !gone.is_empty() {
            self.subscribers
                .lock()
                .retain(|(id, _)| !gone.contains(id));
        }
        delivered
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Drop every mailbox. Pending subscribers see the end of their stream.
    pub fn close(&self) {
        let mut subscribers = self.subscribers.lock();
        self.closed.store(true, Ordering::Release);
        subscribers.clear();
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn remove(&self, id: u64) {
        self.subscribers.lock().retain(|(sid, _)| *sid != id);
        trace!(subscriber = id, "Unsubscribed");
    }
}

/// A live registration. Dropping it unsubscribes.
pub struct Subscription<E: Clone + Send + 'static> {
    id: u64,
    rx: UnboundedReceiver<E>,
    hub: Weak<ListenerHub<E>>,
}

impl<E: Clone + Send + 'static> Subscription<E> {
    /// Next event, or `None` once the hub is closed or gone.
    pub async fn recv(&mut self) -> Option<E> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<E> {
        self.rx.try_recv().ok()
    }

    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl<E: Clone + Send + 'static> Drop for Subscription<E> {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.remove(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_broadcast_reaches_all_subscribers() {
        let hub = ListenerHub::<u32>::new();
        let mut a = hub.subscribe();
        let mut b = hub.subscribe();

        assert_eq!(hub.broadcast(7), 2);
        assert_eq!(a.recv().await, Some(7));
        assert_eq!(b.recv().await, Some(7));
    }

    #[tokio::test]
    async fn test_drop_unsubscribes() {
        let hub = ListenerHub::<u32>::new();
        let a = hub.subscribe();
        let mut b = hub.subscribe();
        assert_eq!(hub.subscriber_count(), 2);

        a.unsubscribe();
        assert_eq!(hub.subscriber_count(), 1);
        assert_eq!(hub.broadcast(1), 1);
        assert_eq!(b.recv().await, Some(1));
    }

    #[tokio::test]
    async fn test_late_subscriber_misses_earlier_events() {
        let hub = ListenerHub::<u32>::new();
        hub.broadcast(1);
        let mut late = hub.subscribe();
        hub.broadcast(2);
        assert_eq!(late.recv().await, Some(2));
        assert_eq!(late.try_recv(), None);
    }

    #[tokio::test]
    async fn test_close_ends_streams() {
        let hub = ListenerHub::<u32>::new();
        let mut sub = hub.subscribe();
        hub.close();
        assert_eq!(sub.recv().await, None);
    }

    #[tokio::test]
    async fn test_subscribe_after_close_sees_end() {
        let hub = ListenerHub::<u32>::new();
        hub.close();
        let mut sub = hub.subscribe();
        assert!(hub.is_closed());
        assert_eq!(hub.broadcast(1), 0);
        assert_eq!(sub.recv().await, None);
    }

    #[tokio::test]
    async fn test_unsubscribe_while_handling_event() {
        let hub = ListenerHub::<u32>::new();
        let mut first = hub.subscribe();
        let mut second = hub.subscribe();
        hub.broadcast(1);

        if first.recv().await == Some(1) {
            first.unsubscribe();
        }
        assert_eq!(hub.broadcast(2), 1);
        assert_eq!(second.recv().await, Some(1));
        assert_eq!(second.recv().await, Some(2));
    }
}
