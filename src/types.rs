//! Core types for the collection store.

use crate::error::{Result, StoreError};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// Minimum title length accepted for a post.
pub const MIN_TITLE_LEN: usize = 3;

/// Monotonic version of the collection, bumped on every mutation.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Version(pub u64);

impl fmt::Debug for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Version({})", self.0)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Version {
    pub fn next(self) -> Self {
        Version(self.0 + 1)
    }
}

/// A domain item held by a store.
///
/// Attributes are opaque to the store. Identity is either the id returned
/// by [`Record::id`] or, for records without one, structural equality.
pub trait Record: Clone + Send + Sync + 'static {
    /// Externally assigned identifier, if any.
    fn id(&self) -> Option<&str> {
        None
    }

    /// Called by backends when they assign an identifier on create.
    fn assign_id(&mut self, _id: String) {}

    /// Basic shape checks, run before any backend interaction.
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

/// A blog post.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    pub content: String,
}

impl Post {
    /// Create a post without an id.
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: None,
            title: title.into(),
            content: content.into(),
        }
    }

    /// Builder-style id assignment.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

impl Record for Post {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn assign_id(&mut self, id: String) {
        self.id = Some(id);
    }

    fn validate(&self) -> Result<()> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(StoreError::Validation("title is required".into()));
        }
        if title.chars().count() < MIN_TITLE_LEN {
            return Err(StoreError::Validation(format!(
                "title must be at least {} characters",
                MIN_TITLE_LEN
            )));
        }
        if self.content.trim().is_empty() {
            return Err(StoreError::Validation("content is required".into()));
        }
        Ok(())
    }
}

/// Product names are plain strings, identified structurally.
impl Record for String {
    fn validate(&self) -> Result<()> {
        if self.trim().is_empty() {
            return Err(StoreError::Validation("name is required".into()));
        }
        Ok(())
    }
}

/// Immutable ordered view of a collection at one version.
///
/// Cloning a snapshot shares the underlying storage; nothing can mutate it.
/// Use [`Snapshot::to_vec`] for an owned, editable copy.
pub struct Snapshot<R> {
    version: Version,
    records: Arc<[R]>,
}

impl<R> Snapshot<R> {
    pub(crate) fn new(version: Version, records: Vec<R>) -> Self {
        Self {
            version,
            records: Arc::from(records),
        }
    }

    /// Version this snapshot was produced at.
    pub fn version(&self) -> Version {
        self.version
    }

    pub fn records(&self) -> &[R] {
        &self.records
    }

    /// True if both handles point at the very same snapshot.
    pub fn same_as(&self, other: &Snapshot<R>) -> bool {
        self.version == other.version && Arc::ptr_eq(&self.records, &other.records)
    }
}

impl<R: Clone> Snapshot<R> {
    /// Owned copy of the records.
    pub fn to_vec(&self) -> Vec<R> {
        self.records.to_vec()
    }
}

impl<R> Clone for Snapshot<R> {
    fn clone(&self) -> Self {
        Self {
            version: self.version,
            records: Arc::clone(&self.records),
        }
    }
}

impl<R> Deref for Snapshot<R> {
    type Target = [R];

    fn deref(&self) -> &[R] {
        &self.records
    }
}

impl<R: PartialEq> PartialEq for Snapshot<R> {
    /// Content equality; versions are ignored.
    fn eq(&self, other: &Self) -> bool {
        self.records[..] == other.records[..]
    }
}

impl<R: fmt::Debug> fmt::Debug for Snapshot<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("version", &self.version)
            .field("records", &&self.records[..])
            .finish()
    }
}

impl<R: Serialize> Serialize for Snapshot<R> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.records.iter())
    }
}

/// Store statistics.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreStats {
    pub len: usize,
    pub version: Version,
    pub subscribers: usize,
}

/// 1-based page request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub size: u32,
}

impl PageRequest {
    pub fn new(page: u32, size: u32) -> Self {
        Self { page, size }
    }

    /// Number of records to skip.
    pub fn offset(&self) -> usize {
        self.size as usize * self.page.saturating_sub(1) as usize
    }
}

/// One page of a remote collection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Page<R> {
    pub items: Vec<R>,
    #[serde(rename = "totalCount")]
    pub total_count: usize,
}

impl<R: Clone> Page<R> {
    /// Cut a page out of a full ordered collection.
    pub fn slice(records: &[R], request: Option<PageRequest>) -> Self {
        let items = match request {
            Some(req) => records
                .iter()
                .skip(req.offset())
                .take(req.size as usize)
                .cloned()
                .collect(),
            None => records.to_vec(),
        };
        Self {
            items,
            total_count: records.len(),
        }
    }
}
