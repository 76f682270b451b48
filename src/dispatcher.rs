//! Action dispatch
//!
//! Keeps a bounded history of emitted actions and fans each one out to the
//! registered subscribers in registration order. A subscriber that returns
//! an error or panics is logged and skipped; the remaining subscribers still
//! receive the action.
//!
//! Two delivery modes are available:
//! - `Inline` runs callbacks on the publishing thread. Callbacks slower than
//!   the configured budget are reported.
//! - `Queued` hands actions to a bounded channel drained in order by a
//!   dedicated worker thread. A full queue blocks the publisher until space
//!   frees up, so no action is dropped.
//!
//! History is recorded for the whole batch before any delivery starts, and no
//! dispatcher lock is held while an inline callback runs, so callbacks may
//! read the history or publish again. A queued callback that publishes while
//! the queue is full waits on itself; keep queued callbacks non-publishing.

use crate::buffer::BoundedBuffer;
use crate::error::EngineError;
use crate::types::ActionEvent;
use log::{error, warn};
use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, SyncSender, TrySendError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Default number of retained actions
pub const DEFAULT_ACTION_HISTORY_CAPACITY: usize = 100;

/// Default per-callback time budget before a slow-subscriber warning
pub const DEFAULT_SUBSCRIBER_BUDGET_MS: u64 = 50;

/// Error type subscriber callbacks may return
pub type SubscriberError = Box<dyn std::error::Error + Send + Sync>;

type Callback = Arc<dyn Fn(&ActionEvent) -> Result<(), SubscriberError> + Send + Sync>;

/// Default bound of the queued delivery channel
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// How actions reach subscribers.
///
/// Defaults to `Queued`, so a slow subscriber delays only the delivery
/// worker and never the publishing cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DeliveryMode {
    Inline,
    Queued { capacity: usize },
}

impl Default for DeliveryMode {
    fn default() -> Self {
        DeliveryMode::Queued {
            capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// Registry key for a subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubscriptionId(u64);

/// Handle returned by [`ActionDispatcher::subscribe`].
///
/// Dropping the handle keeps the subscriber registered; call
/// [`Subscription::unsubscribe`] to remove it.
#[derive(Debug)]
#[must_use = "keep the handle to unsubscribe later"]
pub struct Subscription {
    id: SubscriptionId,
    shared: Weak<Shared>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Remove the subscriber. Returns `false` if it was already gone.
    pub fn unsubscribe(self) -> bool {
        match self.shared.upgrade() {
            Some(shared) => shared.remove(self.id),
            None => false,
        }
    }
}

/// State shared with the delivery worker
struct Shared {
    subscribers: RwLock<Vec<(SubscriptionId, Callback)>>,
    next_id: AtomicU64,
    failures: AtomicU64,
    budget: Duration,
}

impl std::fmt::Debug for Shared {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shared")
            .field("subscribers", &self.count())
            .field("failures", &self.failures.load(Ordering::Relaxed))
            .field("budget", &self.budget)
            .finish()
    }
}

impl Shared {
    fn new(budget: Duration) -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            failures: AtomicU64::new(0),
            budget,
        }
    }

    fn count(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn remove(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        subscribers.len() != before
    }

    /// Deliver one action to a snapshot of the current subscribers
    fn deliver(&self, action: &ActionEvent) {
        let snapshot: Vec<(SubscriptionId, Callback)> = self
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        for (id, callback) in snapshot {
            let started = Instant::now();
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| callback(action)));
            let elapsed = started.elapsed();

            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    self.failures.fetch_add(1, Ordering::Relaxed);
                    error!(
                        "Subscriber {} failed on {} action: {}",
                        id.0,
                        action.action_type.as_str(),
                        e
                    );
                }
                Err(_) => {
                    self.failures.fetch_add(1, Ordering::Relaxed);
                    error!(
                        "Subscriber {} panicked on {} action",
                        id.0,
                        action.action_type.as_str()
                    );
                }
            }

            if elapsed > self.budget {
                warn!(
                    "Subscriber {} took {}ms (budget {}ms)",
                    id.0,
                    elapsed.as_millis(),
                    self.budget.as_millis()
                );
            }
        }
    }
}

enum Delivery {
    Inline,
    Queued {
        tx: SyncSender<ActionEvent>,
        worker: JoinHandle<()>,
    },
}

/// Bounded action history plus publish/subscribe fan-out
pub struct ActionDispatcher {
    history: Mutex<BoundedBuffer<ActionEvent>>,
    shared: Arc<Shared>,
    /// Held for a whole publish so batches reach subscribers in order
    delivery: Mutex<Delivery>,
}

impl Default for ActionDispatcher {
    fn default() -> Self {
        Self::new(DEFAULT_ACTION_HISTORY_CAPACITY)
    }
}

impl std::fmt::Debug for ActionDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionDispatcher")
            .field("history_len", &self.history().len())
            .field("shared", &self.shared)
            .finish()
    }
}

impl ActionDispatcher {
    /// Inline dispatcher retaining at most `history_capacity` actions
    pub fn new(history_capacity: usize) -> Self {
        Self {
            history: Mutex::new(BoundedBuffer::new(history_capacity)),
            shared: Arc::new(Shared::new(Duration::from_millis(
                DEFAULT_SUBSCRIBER_BUDGET_MS,
            ))),
            delivery: Mutex::new(Delivery::Inline),
        }
    }

    /// Dispatcher with an explicit delivery mode and subscriber budget
    pub fn with_delivery(
        history_capacity: usize,
        mode: DeliveryMode,
        budget: Duration,
    ) -> Result<Self, EngineError> {
        let shared = Arc::new(Shared::new(budget));

        let delivery = match mode {
            DeliveryMode::Inline => Delivery::Inline,
            DeliveryMode::Queued { capacity } => {
                if capacity == 0 {
                    return Err(EngineError::InvalidConfig(
                        "dispatch queue capacity must be positive".to_string(),
                    ));
                }

                let (tx, rx) = mpsc::sync_channel::<ActionEvent>(capacity);
                let worker_shared = Arc::clone(&shared);
                let worker = thread::Builder::new()
                    .name("empath-dispatch".to_string())
                    .spawn(move || {
                        for action in rx {
                            worker_shared.deliver(&action);
                        }
                    })
                    .map_err(|e| EngineError::DispatchError(e.to_string()))?;

                Delivery::Queued { tx, worker }
            }
        };

        Ok(Self {
            history: Mutex::new(BoundedBuffer::new(history_capacity)),
            shared,
            delivery: Mutex::new(delivery),
        })
    }

    /// Register a callback for every subsequently published action
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&ActionEvent) -> Result<(), SubscriberError> + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.shared.next_id.fetch_add(1, Ordering::Relaxed));
        self.shared
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(callback)));

        Subscription {
            id,
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Remove a subscriber by id
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.shared.remove(id)
    }

    /// Record the whole batch in the history, then hand each action to
    /// subscribers in order.
    ///
    /// History readers see either none or all of a batch.
    pub fn publish(&self, actions: &[ActionEvent]) {
        if actions.is_empty() {
            return;
        }

        {
            let mut history = self.history();
            for action in actions {
                history.push(action.clone());
            }
        }

        let delivery = self.delivery.lock().unwrap_or_else(PoisonError::into_inner);
        if let Delivery::Queued { tx, .. } = &*delivery {
            for action in actions {
                self.enqueue(tx, action.clone());
            }
            return;
        }
        drop(delivery);

        for action in actions {
            self.shared.deliver(action);
        }
    }

    fn enqueue(&self, tx: &SyncSender<ActionEvent>, action: ActionEvent) {
        match tx.try_send(action) {
            Ok(()) => {}
            Err(TrySendError::Full(action)) => {
                warn!("Dispatch queue full, waiting for subscribers to drain it");
                if let Err(mpsc::SendError(action)) = tx.send(action) {
                    error!("Dispatch worker stopped, delivering inline");
                    self.shared.deliver(&action);
                }
            }
            Err(TrySendError::Disconnected(action)) => {
                error!("Dispatch worker stopped, delivering inline");
                self.shared.deliver(&action);
            }
        }
    }

    /// Most recent `limit` actions (all when `None`) in chronological order
    pub fn get_action_history(&self, limit: Option<usize>) -> Vec<ActionEvent> {
        self.history().recent(limit)
    }

    pub fn clear_history(&self) {
        self.history().clear();
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared.count()
    }

    /// Callbacks that returned an error or panicked so far
    pub fn delivery_failures(&self) -> u64 {
        self.shared.failures.load(Ordering::Relaxed)
    }

    fn history(&self) -> MutexGuard<'_, BoundedBuffer<ActionEvent>> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for ActionDispatcher {
    fn drop(&mut self) {
        let delivery = std::mem::replace(
            self.delivery
                .get_mut()
                .unwrap_or_else(PoisonError::into_inner),
            Delivery::Inline,
        );

        if let Delivery::Queued { tx, worker } = delivery {
            drop(tx);
            if worker.join().is_err() {
                error!("Dispatch worker panicked during shutdown");
            }
        }
    }
}
