//! Backend seam for the remote-backed store.

use crate::error::Result;
use crate::types::{Page, PageRequest, Record};
use async_trait::async_trait;

/// Authoritative storage behind a [`RemoteStore`](super::RemoteStore).
///
/// Every method either completes and is acknowledged, or returns an error
/// and leaves the backend unchanged.
#[async_trait]
pub trait CollectionBackend<R: Record>: Send + Sync {
    /// Fetch one page (or everything, for `None`).
    async fn fetch(&self, page: Option<PageRequest>) -> Result<Page<R>>;

    /// Store a new record. Returns it as stored, with any assigned id.
    async fn create(&self, record: R) -> Result<R>;

    /// Replace the record with the given id.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`](crate::StoreError::NotFound) if no record
    /// has that id.
    async fn update(&self, id: &str, record: R) -> Result<R>;

    /// Delete the record with the given id.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`](crate::StoreError::NotFound) if no record
    /// has that id.
    async fn delete(&self, id: &str) -> Result<()>;
}
