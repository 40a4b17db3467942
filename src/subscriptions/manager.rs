//! Subscription manager for broadcasting collection snapshots.

use crate::types::Snapshot;
use crossbeam_channel::{bounded, Sender, TrySendError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::types::{
    CollectionEvent, DropReason, SubscriptionConfig, SubscriptionHandle, SubscriptionId,
};

/// Internal subscription state.
struct Subscription<R> {
    sender: Sender<CollectionEvent<R>>,
}

impl<R> Subscription<R> {
    /// Try to send an event. Returns the drop reason if the subscriber
    /// can no longer keep up.
    fn try_send(&self, event: CollectionEvent<R>) -> Option<DropReason> {
        match self.sender.try_send(event) {
            Ok(()) => None,
            Err(TrySendError::Full(_)) => Some(DropReason::BufferOverflow),
            Err(TrySendError::Disconnected(_)) => Some(DropReason::Disconnected),
        }
    }
}

/// Registry of subscribers with a single broadcast entry point.
pub struct SubscriptionManager<R> {
    /// Active subscriptions by ID.
    subscriptions: RwLock<HashMap<SubscriptionId, Subscription<R>>>,
    /// Counter for generating subscription IDs.
    next_id: AtomicU64,
}

impl<R> SubscriptionManager<R> {
    /// Create a new subscription manager.
    pub fn new() -> Self {
        Self {
            subscriptions: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a new subscriber.
    ///
    /// The subscriber receives every snapshot broadcast after this call
    /// returns, and nothing from before.
    pub fn subscribe(self: &Arc<Self>, config: SubscriptionConfig) -> SubscriptionHandle<R> {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = bounded(config.buffer_size.max(1));

        self.subscriptions.write().insert(id, Subscription { sender });
        tracing::debug!(subscription = id.0, "subscription registered");

        SubscriptionHandle::new(id, receiver, Arc::downgrade(self))
    }

    /// Unsubscribe and clean up.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut subs = self.subscriptions.write();
        if let Some(sub) = subs.remove(&id) {
            // Best effort; a releasing handle has already stopped listening.
            let _ = sub.sender.try_send(CollectionEvent::Dropped {
                reason: DropReason::Unsubscribed,
            });
            tracing::debug!(subscription = id.0, "subscription released");
        }
    }

    /// Get subscription count.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.read().len()
    }

    /// Deliver a snapshot to every subscriber. Returns the number of
    /// subscribers that received it.
    ///
    /// Callers must serialize broadcasts; the store does so under its write
    /// lock so each subscriber sees snapshots in emission order.
    pub fn broadcast(&self, snapshot: &Snapshot<R>) -> usize {
        let mut to_remove = Vec::new();
        let mut delivered = 0;

        {
            let subs = self.subscriptions.read();
            for (id, sub) in subs.iter() {
                match sub.try_send(CollectionEvent::Snapshot(snapshot.clone())) {
                    None => delivered += 1,
                    Some(reason) => to_remove.push((*id, reason)),
                }
            }
        }

        if !to_remove.is_empty() {
            let mut subs = self.subscriptions.write();
            for (id, reason) in to_remove {
                if let Some(sub) = subs.remove(&id) {
                    tracing::warn!(subscription = id.0, ?reason, "dropping subscriber");
                    let _ = sub.sender.try_send(CollectionEvent::Dropped { reason });
                }
            }
        }

        delivered
    }
}

impl<R> Default for SubscriptionManager<R> {
    fn default() -> Self {
        Self::new()
    }
}
