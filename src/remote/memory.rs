//! In-process backend.

use crate::error::{Result, StoreError};
use crate::types::{Page, PageRequest, Record};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use super::backend::CollectionBackend;

/// Backend holding records in memory, with ids from a counter.
///
/// [`fail_next`](MemoryBackend::fail_next) makes upcoming calls fail with a
/// transport error without touching the data.
pub struct MemoryBackend<R> {
    records: RwLock<Vec<R>>,
    next_id: AtomicU64,
    failures: AtomicUsize,
}

impl<R: Record> MemoryBackend<R> {
    pub fn new() -> Self {
        Self::with_records(Vec::new())
    }

    /// Seed the backend. Records without an id get one past every numeric
    /// id already present.
    pub fn with_records(records: Vec<R>) -> Self {
        let backend = Self {
            records: RwLock::new(Vec::with_capacity(records.len())),
            next_id: AtomicU64::new(1),
            failures: AtomicUsize::new(0),
        };
        {
            let mut stored = backend.records.write();
            for record in &records {
                if let Some(id) = record.id() {
                    backend.reserve_id(id);
                }
            }
            for mut record in records {
                if record.id().is_none() {
                    record.assign_id(backend.allocate_id());
                }
                stored.push(record);
            }
        }
        backend
    }

    /// Fail the next `count` calls with [`StoreError::Transport`].
    pub fn fail_next(&self, count: usize) {
        self.failures.store(count, Ordering::SeqCst);
    }

    /// Everything the backend currently holds.
    pub fn records(&self) -> Vec<R> {
        self.records.read().clone()
    }

    fn allocate_id(&self) -> String {
        self.next_id.fetch_add(1, Ordering::SeqCst).to_string()
    }

    /// Keep the counter ahead of a numeric id supplied from outside.
    fn reserve_id(&self, id: &str) {
        if let Ok(n) = id.parse::<u64>() {
            self.next_id.fetch_max(n.saturating_add(1), Ordering::SeqCst);
        }
    }

    fn check_failure(&self) -> Result<()> {
        let injected = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(StoreError::Transport("injected failure".into()));
        }
        Ok(())
    }
}

impl<R: Record> Default for MemoryBackend<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<R: Record> CollectionBackend<R> for MemoryBackend<R> {
    async fn fetch(&self, page: Option<PageRequest>) -> Result<Page<R>> {
        self.check_failure()?;
        Ok(Page::slice(&self.records.read(), page))
    }

    async fn create(&self, mut record: R) -> Result<R> {
        self.check_failure()?;
        let mut records = self.records.write();
        match record.id() {
            Some(id) => {
                if records.iter().any(|r| r.id() == Some(id)) {
                    return Err(StoreError::Validation(format!("duplicate id {}", id)));
                }
                self.reserve_id(id);
            }
            None => record.assign_id(self.allocate_id()),
        }
        records.push(record.clone());
        Ok(record)
    }

    async fn update(&self, id: &str, mut record: R) -> Result<R> {
        self.check_failure()?;
        let mut records = self.records.write();
        let slot = records
            .iter_mut()
            .find(|r| r.id() == Some(id))
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        record.assign_id(id.to_string());
        *slot = record.clone();
        Ok(record)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.check_failure()?;
        let mut records = self.records.write();
        let before = records.len();
        records.retain(|r| r.id() != Some(id));
        if records.len() == before {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }
}
