//! Best-effort publish/subscribe fan-out of change events.
//!
//! Every observer owns a bounded queue. `publish` never waits: an observer
//! whose queue is full misses that event, and an observer whose receiving
//! side is gone is pruned from the set. The observer set sits behind its own
//! lock so a publish never contends with the storage write lock.

use crate::config::NotifierConfig;
use crate::events::{ChangeEvent, ChangeKind};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NotifierError {
    #[error("observer limit reached ({0} live observers)")]
    ObserverLimit(usize),
}

struct Observer {
    id: u64,
    tx: mpsc::Sender<ChangeEvent>,
}

struct Inner {
    observers: Mutex<Vec<Observer>>,
    next_id: AtomicU64,
    max_observers: usize,
    buffer: usize,
}

/// Shared handle to the fan-out hub. Clones publish into the same set.
#[derive(Clone)]
pub struct ChangeNotifier {
    inner: Arc<Inner>,
}

impl ChangeNotifier {
    #[must_use]
    pub fn new(max_observers: usize, buffer: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                observers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
                max_observers: max_observers.max(1),
                buffer: buffer.max(1),
            }),
        }
    }

    #[must_use]
    pub fn from_config(config: &NotifierConfig) -> Self {
        Self::new(config.max_observers, config.observer_buffer)
    }

    /// Registers a new observer. It sees only events published after this call.
    ///
    /// # Errors
    /// Returns `NotifierError::ObserverLimit` when the set is still full after
    /// dropping disconnected observers.
    pub fn subscribe(&self) -> Result<Subscription, NotifierError> {
        let (tx, rx) = mpsc::channel(self.inner.buffer);

        let mut observers = self.inner.observers.lock();
        observers.retain(|o| !o.tx.is_closed());
        if observers.len() >= self.inner.max_observers {
            warn!(live = observers.len(), "Rejecting observer, fan-out set is full");
            return Err(NotifierError::ObserverLimit(observers.len()));
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        observers.push(Observer { id, tx });
        debug!(observer = id, live = observers.len(), "Observer subscribed");

        Ok(Subscription { id, rx })
    }

    /// Fans the event out to every live observer without waiting on any of them.
    pub fn publish(&self, kind: ChangeKind) {
        let event = ChangeEvent::new(kind);
        let mut observers = self.inner.observers.lock();
        let before = observers.len();

        observers.retain(|o| match o.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!(observer = o.id, %kind, "Observer queue full, event dropped");
                true
            }
            Err(TrySendError::Closed(_)) => false,
        });

        let pruned = before - observers.len();
        debug!(%kind, delivered_to = observers.len(), pruned, "Published change event");
    }

    /// Number of observers still registered. Disconnected observers are only
    /// removed on the next publish or subscribe.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.inner.observers.lock().len()
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::from_config(&NotifierConfig::default())
    }
}

/// Receiving side of one observer. Dropping it disconnects the observer.
pub struct Subscription {
    id: u64,
    rx: mpsc::Receiver<ChangeEvent>,
}

impl Subscription {
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Waits for the next event; `None` once the notifier itself is gone.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        self.rx.recv().await
    }

    /// Returns an already-queued event without waiting.
    pub fn try_recv(&mut self) -> Option<ChangeEvent> {
        self.rx.try_recv().ok()
    }
}
