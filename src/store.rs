//! Local collection store tying snapshots and subscriptions together.

use crate::error::Result;
use crate::subscriptions::{SubscriptionConfig, SubscriptionHandle, SubscriptionManager};
use crate::types::{Record, Snapshot, StoreStats, Version};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Store configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Defaults for subscriptions created with [`CollectionStore::subscribe`].
    pub subscription: SubscriptionConfig,
}

impl StoreConfig {
    /// Parse a JSON config. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

/// The in-process collection store.
///
/// Owns the authoritative ordered sequence of records. Every mutation
/// builds a fresh [`Snapshot`], makes it current and broadcasts it to all
/// subscribers. None of the operations fail.
///
/// A store is created once per session and passed explicitly to whatever
/// needs it.
pub struct CollectionStore<R> {
    /// Store configuration.
    config: StoreConfig,

    /// Current snapshot. Only written by mutations.
    current: RwLock<Snapshot<R>>,

    /// Broadcast registry.
    subscriptions: Arc<SubscriptionManager<R>>,

    /// Serializes snapshot construction, publication and broadcast.
    write_lock: Mutex<()>,
}

impl<R: Record> CollectionStore<R> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Create an empty store with a custom configuration.
    pub fn with_config(config: StoreConfig) -> Self {
        Self::seeded(config, Vec::new())
    }

    /// Create a store holding `records` at version 0. Nothing is emitted.
    pub fn with_records(records: impl IntoIterator<Item = R>) -> Self {
        Self::seeded(StoreConfig::default(), records.into_iter().collect())
    }

    fn seeded(config: StoreConfig, records: Vec<R>) -> Self {
        Self {
            config,
            current: RwLock::new(Snapshot::new(Version::default(), records)),
            subscriptions: Arc::new(SubscriptionManager::new()),
            write_lock: Mutex::new(()),
        }
    }

    // --- Reads ---

    /// The current snapshot.
    pub fn list(&self) -> Snapshot<R> {
        self.current.read().clone()
    }

    /// Number of records currently held.
    pub fn len(&self) -> usize {
        self.current.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current version.
    pub fn version(&self) -> Version {
        self.current.read().version()
    }

    // --- Mutations ---

    /// Append a record at the end.
    pub fn add(&self, record: R) -> Snapshot<R> {
        self.commit("add", |records| {
            let mut next = Vec::with_capacity(records.len() + 1);
            next.extend_from_slice(records);
            next.push(record);
            next
        })
    }

    /// Remove every record matching the predicate.
    ///
    /// A snapshot is emitted even when nothing matched.
    pub fn remove_where<F>(&self, predicate: F) -> Snapshot<R>
    where
        F: Fn(&R) -> bool,
    {
        self.commit("remove", |records| {
            records.iter().filter(|r| !predicate(*r)).cloned().collect()
        })
    }

    /// Remove every record with the given id.
    pub fn remove(&self, id: &str) -> Snapshot<R> {
        self.remove_where(|r| r.id() == Some(id))
    }

    /// Replace every record with the given id, keeping its position.
    ///
    /// A snapshot is emitted even when nothing matched.
    pub fn replace(&self, id: &str, record: R) -> Snapshot<R> {
        self.commit("replace", |records| {
            records
                .iter()
                .map(|r| {
                    if r.id() == Some(id) {
                        record.clone()
                    } else {
                        r.clone()
                    }
                })
                .collect()
        })
    }

    /// Replace the whole collection.
    pub fn replace_all(&self, records: Vec<R>) -> Snapshot<R> {
        self.commit("replace_all", move |_| records)
    }

    /// Build the next snapshot from the current one, publish and broadcast
    /// it, all under the write lock.
    fn commit<F>(&self, op: &'static str, mutate: F) -> Snapshot<R>
    where
        F: FnOnce(&[R]) -> Vec<R>,
    {
        let _lock = self.write_lock.lock();

        let next = {
            let current = self.current.read();
            Snapshot::new(current.version().next(), mutate(current.records()))
        };
        *self.current.write() = next.clone();

        let delivered = self.subscriptions.broadcast(&next);
        tracing::debug!(
            op,
            version = next.version().0,
            len = next.len(),
            delivered,
            "snapshot emitted"
        );

        next
    }

    // --- Subscriptions ---

    /// Subscribe to every future snapshot using the store's default
    /// subscription config.
    ///
    /// The current snapshot is not delivered; use
    /// [`subscribe_current`](Self::subscribe_current) if the initial state is
    /// needed.
    pub fn subscribe(&self) -> SubscriptionHandle<R> {
        self.subscribe_with(self.config.subscription.clone())
    }

    /// Subscribe with a custom config.
    ///
    /// Registration waits for any in-flight mutation, so the first delivery
    /// is always newer than the snapshot current at registration.
    pub fn subscribe_with(&self, config: SubscriptionConfig) -> SubscriptionHandle<R> {
        let _lock = self.write_lock.lock();
        self.subscriptions.subscribe(config)
    }

    /// Read the current snapshot and subscribe to every later one, with no
    /// mutation in between.
    pub fn subscribe_current(&self) -> (Snapshot<R>, SubscriptionHandle<R>) {
        let _lock = self.write_lock.lock();
        let handle = self.subscriptions.subscribe(self.config.subscription.clone());
        (self.list(), handle)
    }

    /// Number of live subscriptions. Non-zero after every presentation
    /// unit is gone means a handle leaked.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.subscription_count()
    }

    /// Get store statistics.
    pub fn stats(&self) -> StoreStats {
        let current = self.current.read();
        StoreStats {
            len: current.len(),
            version: current.version(),
            subscribers: self.subscriptions.subscription_count(),
        }
    }
}

impl<R: Record + PartialEq> CollectionStore<R> {
    /// Remove every record structurally equal to `value`.
    pub fn remove_value(&self, value: &R) -> Snapshot<R> {
        self.remove_where(|r| r == value)
    }
}

impl<R: Record> Default for CollectionStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> Drop for CollectionStore<R> {
    fn drop(&mut self) {
        let live = self.subscriptions.subscription_count();
        if live > 0 {
            tracing::warn!(live, "collection store dropped with unreleased subscriptions");
        }
    }
}
