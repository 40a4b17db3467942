//! Subscription types for live collection updates.

use crate::error::{Result, StoreError};
use crate::types::Snapshot;
use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};
use serde::{Deserialize, Serialize};
use std::sync::Weak;
use std::time::Duration;

use super::manager::SubscriptionManager;

/// Configuration for a subscription.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriptionConfig {
    /// Max buffered snapshots before dropping the subscriber.
    /// Default: 1000
    pub buffer_size: usize,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self { buffer_size: 1000 }
    }
}

/// Events delivered to a subscriber.
#[derive(Debug)]
pub enum CollectionEvent<R> {
    /// The collection changed; this is the new state.
    Snapshot(Snapshot<R>),

    /// Subscription was dropped by the store.
    Dropped { reason: DropReason },
}

impl<R> Clone for CollectionEvent<R> {
    fn clone(&self) -> Self {
        match self {
            Self::Snapshot(snapshot) => Self::Snapshot(snapshot.clone()),
            Self::Dropped { reason } => Self::Dropped {
                reason: reason.clone(),
            },
        }
    }
}

/// Why a subscription was dropped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Send buffer overflowed (slow consumer).
    BufferOverflow,
    /// Receiving side went away without releasing.
    Disconnected,
    /// Explicitly unsubscribed.
    Unsubscribed,
}

/// Unique identifier for a subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Scoped registration with a store's broadcast channel.
///
/// Dropping the handle releases the subscription. Once released, the
/// handle never yields another event, even if an emission raced the
/// release.
pub struct SubscriptionHandle<R> {
    pub id: SubscriptionId,
    receiver: Option<Receiver<CollectionEvent<R>>>,
    manager: Weak<SubscriptionManager<R>>,
}

impl<R> SubscriptionHandle<R> {
    pub(crate) fn new(
        id: SubscriptionId,
        receiver: Receiver<CollectionEvent<R>>,
        manager: Weak<SubscriptionManager<R>>,
    ) -> Self {
        Self {
            id,
            receiver: Some(receiver),
            manager,
        }
    }

    /// Whether the handle has not been released yet.
    pub fn is_active(&self) -> bool {
        self.receiver.is_some()
    }

    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<CollectionEvent<R>> {
        let receiver = self.receiver.as_ref().ok_or(StoreError::SubscriptionDropped)?;
        receiver.recv().map_err(|_| StoreError::SubscriptionDropped)
    }

    /// Try to receive an event (non-blocking). `Ok(None)` means nothing is
    /// pending.
    pub fn try_recv(&self) -> Result<Option<CollectionEvent<R>>> {
        let receiver = self.receiver.as_ref().ok_or(StoreError::SubscriptionDropped)?;
        match receiver.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(StoreError::SubscriptionDropped),
        }
    }

    /// Receive with timeout. `Ok(None)` means the timeout elapsed.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<CollectionEvent<R>>> {
        let receiver = self.receiver.as_ref().ok_or(StoreError::SubscriptionDropped)?;
        match receiver.recv_timeout(timeout) {
            Ok(event) => Ok(Some(event)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(StoreError::SubscriptionDropped),
        }
    }

    /// Unregister from the store. Safe to call more than once.
    pub fn release(&mut self) {
        // Unregister before dropping the receiver so a concurrent broadcast
        // sees either a live channel or no registration at all.
        if self.receiver.is_none() {
            return;
        }
        if let Some(manager) = self.manager.upgrade() {
            manager.unsubscribe(self.id);
        }
        self.receiver = None;
    }
}

impl<R> Drop for SubscriptionHandle<R> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<R> std::fmt::Debug for SubscriptionHandle<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
