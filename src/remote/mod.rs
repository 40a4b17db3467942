//! Remote-backed collection store.
//!
//! Mutations are asynchronous calls against a [`CollectionBackend`]. The
//! local snapshot only changes, and subscribers only hear about it, once
//! the backend has acknowledged the call. Failures go back to the caller
//! and leave the current snapshot in place.

mod backend;
mod file;
mod http;
mod memory;

pub use backend::CollectionBackend;
pub use file::{FileBackend, FileBackendConfig};
pub use http::{HttpBackend, HttpBackendConfig};
pub use memory::MemoryBackend;

use crate::error::Result;
use crate::store::{CollectionStore, StoreConfig};
use crate::subscriptions::SubscriptionHandle;
use crate::types::{PageRequest, Record, Snapshot};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

/// A [`CollectionStore`] whose mutations go through a backend first.
pub struct RemoteStore<R, B> {
    local: CollectionStore<R>,
    backend: B,
    /// Serializes backend round-trips so acknowledgements are applied in
    /// the order the backend saw them.
    mutation_lock: Mutex<()>,
    /// Total reported by the last fetch.
    total_count: AtomicUsize,
}

impl<R, B> RemoteStore<R, B>
where
    R: Record,
    B: CollectionBackend<R>,
{
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, StoreConfig::default())
    }

    pub fn with_config(backend: B, config: StoreConfig) -> Self {
        Self {
            local: CollectionStore::with_config(config),
            backend,
            mutation_lock: Mutex::new(()),
            total_count: AtomicUsize::new(0),
        }
    }

    /// The local store; attach bindings to it.
    pub fn local(&self) -> &CollectionStore<R> {
        &self.local
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Current snapshot of what has been loaded and acknowledged.
    pub fn list(&self) -> Snapshot<R> {
        self.local.list()
    }

    /// See [`CollectionStore::subscribe`].
    pub fn subscribe(&self) -> SubscriptionHandle<R> {
        self.local.subscribe()
    }

    /// Collection size reported by the most recent [`load`](Self::load).
    pub fn total_count(&self) -> usize {
        self.total_count.load(Ordering::SeqCst)
    }

    /// Fetch a page from the backend and make it the current snapshot.
    /// Returns the backend's total count.
    pub async fn load(&self, page: Option<PageRequest>) -> Result<usize> {
        let _guard = self.mutation_lock.lock().await;

        let fetched = self.backend.fetch(page).await.map_err(|e| {
            tracing::warn!(error = %e, "collection fetch failed");
            e
        })?;

        self.total_count.store(fetched.total_count, Ordering::SeqCst);
        self.local.replace_all(fetched.items);
        tracing::info!(total = fetched.total_count, "collection loaded");
        Ok(fetched.total_count)
    }

    /// Validate and create a record, then append what the backend stored.
    pub async fn add(&self, record: R) -> Result<R> {
        record.validate()?;
        let _guard = self.mutation_lock.lock().await;

        let created = self.backend.create(record).await.map_err(|e| {
            tracing::warn!(error = %e, "create rejected");
            e
        })?;

        self.local.add(created.clone());
        self.total_count.fetch_add(1, Ordering::SeqCst);
        tracing::info!(id = created.id(), "record created");
        Ok(created)
    }

    /// Validate and replace the record with the given id.
    pub async fn replace(&self, id: &str, record: R) -> Result<R> {
        record.validate()?;
        let _guard = self.mutation_lock.lock().await;

        let stored = self.backend.update(id, record).await.map_err(|e| {
            tracing::warn!(id, error = %e, "update rejected");
            e
        })?;

        self.local.replace(id, stored.clone());
        tracing::info!(id, "record updated");
        Ok(stored)
    }

    /// Delete the record with the given id.
    pub async fn remove(&self, id: &str) -> Result<()> {
        let _guard = self.mutation_lock.lock().await;

        self.backend.delete(id).await.map_err(|e| {
            tracing::warn!(id, error = %e, "delete rejected");
            e
        })?;

        self.local.remove(id);
        let _ = self
            .total_count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        tracing::info!(id, "record deleted");
        Ok(())
    }
}
