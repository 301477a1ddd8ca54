//! In-process publish/subscribe.
//!
//! Producers hold a cloned [`EventBus`] and call [`EventBus::publish`] from any
//! thread or task. Each [`Subscription`] owns an unbounded queue, so a slow
//! consumer never blocks a producer. Delivery guarantees:
//!
//! - every live subscriber sees published events in one global order;
//! - once [`Subscription::unsubscribe`] returns (or the subscription is
//!   dropped) no further events are queued for it;
//! - after [`EventBus::close`] publishing is a no-op and receivers drain
//!   what was already queued, then observe end-of-stream.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::mpsc;

struct Subscriber<E> {
    id: u64,
    tx: mpsc::UnboundedSender<E>,
}

struct Inner<E> {
    subscribers: Mutex<Vec<Subscriber<E>>>,
    next_id: AtomicU64,
    closed: AtomicBool,
}

impl<E> Inner<E> {
    fn remove(&self, id: u64) {
        let mut subs = self.subscribers.lock().expect("bus mutex poisoned");
        subs.retain(|s| s.id != id);
    }
}

/// Cloneable handle to a publish/subscribe channel of `E`.
pub struct EventBus<E> {
    inner: Arc<Inner<E>>,
}

impl<E> Clone for EventBus<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E> fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl<E: Clone + Send + 'static> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> EventBus<E> {
    /// Number of currently registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .subscribers
            .lock()
            .expect("bus mutex poisoned")
            .len()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }
}

impl<E: Clone + Send + 'static> EventBus<E> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                subscribers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Register a new subscriber. Only events published after this call
    /// are delivered to it.
    pub fn subscribe(&self) -> Subscription<E> {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);

        let mut subs = self.inner.subscribers.lock().expect("bus mutex poisoned");
        if !self.is_closed() {
            subs.push(Subscriber { id, tx });
        }
        drop(subs);

        Subscription {
            id,
            rx,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Deliver `event` to every live subscriber and return how many received it.
    ///
    /// Subscribers whose receiving half is gone are pruned on the way.
    pub fn publish(&self, event: E) -> usize {
        if self.is_closed() {
            tracing::trace!("publish on closed bus dropped");
            return 0;
        }

        let mut subs = self.inner.subscribers.lock().expect("bus mutex poisoned");
        subs.retain(|s| s.tx.send(event.clone()).is_ok());
        subs.len()
    }

    /// Close the bus. Pending events stay queued; nothing new is accepted.
    pub fn close(&self) {
        let mut subs = self.inner.subscribers.lock().expect("bus mutex poisoned");
        self.inner.closed.store(true, Ordering::Release);
        subs.clear();
    }
}

/// Receiving side of an [`EventBus`] registration.
pub struct Subscription<E> {
    id: u64,
    rx: mpsc::UnboundedReceiver<E>,
    bus: Weak<Inner<E>>,
}

impl<E> fmt::Debug for Subscription<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

impl<E> Subscription<E> {
    /// Wait for the next event. Returns `None` once the bus is closed (or
    /// every publisher is gone) and the queue is drained.
    pub async fn recv(&mut self) -> Option<E> {
        self.rx.recv().await
    }

    /// Take the next queued event without waiting.
    pub fn try_recv(&mut self) -> Option<E> {
        self.rx.try_recv().ok()
    }

    /// Drain everything currently queued.
    pub fn drain(&mut self) -> Vec<E> {
        let mut out = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            out.push(event);
        }
        out
    }

    /// Unregister from the bus. Events queued before this call are discarded.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl<E> Drop for Subscription<E> {
    fn drop(&mut self) {
        if let Some(inner) = self.bus.upgrade() {
            inner.remove(self.id);
        }
    }
}
