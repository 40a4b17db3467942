//! Single-file backend.
//!
//! File layout:
//! - magic `CST\0`
//! - format version (1 byte)
//! - payload length (u64 LE)
//! - MessagePack payload
//! - CRC32 of the payload (u32 LE)

use crate::error::{Result, StoreError};
use crate::types::{Page, PageRequest, Record};
use async_trait::async_trait;
use fs2::FileExt;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use super::backend::CollectionBackend;

/// Magic bytes for the collection file.
const FILE_MAGIC: &[u8; 4] = b"CST\0";

/// Current collection file format version.
const FILE_VERSION: u8 = 1;

/// Magic, version and length.
const HEADER_LEN: u64 = 13;

/// CRC32 trailer.
const CHECKSUM_LEN: u64 = 4;

/// File backend configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct FileBackendConfig {
    /// Path of the collection file.
    pub path: PathBuf,

    /// Whether to create the file if it doesn't exist.
    pub create_if_missing: bool,
}

impl Default for FileBackendConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./collection.bin"),
            create_if_missing: true,
        }
    }
}

/// Persisted contents.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct FileState<R> {
    next_id: u64,
    records: Vec<R>,
}

/// Backend persisting the whole collection to one file.
///
/// Every acknowledged mutation has been written and synced. The file is
/// held under an exclusive lock for the backend's lifetime.
pub struct FileBackend<R> {
    path: PathBuf,
    _lock_file: File,
    state: Mutex<FileState<R>>,
}

impl<R> FileBackend<R>
where
    R: Record + Serialize + DeserializeOwned,
{
    /// Open an existing collection file or create a new one.
    pub fn open(config: FileBackendConfig) -> Result<Self> {
        let path = config.path;
        let exists = path.exists();

        if !exists && !config.create_if_missing {
            return Err(StoreError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("collection file {} does not exist", path.display()),
            )));
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let lock_file = Self::acquire_lock(&path)?;

        let state = if exists {
            Self::read_file(&path)?
        } else {
            let state = FileState {
                next_id: 1,
                records: Vec::new(),
            };
            Self::write_file(&path, &state)?;
            state
        };

        tracing::debug!(path = %path.display(), records = state.records.len(), "collection file opened");

        Ok(Self {
            path,
            _lock_file: lock_file,
            state: Mutex::new(state),
        })
    }

    /// Path of the collection file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply a change to a copy of the state, persist it, then keep it.
    /// Nothing changes in memory if the write fails.
    fn mutate<T, F>(&self, change: F) -> Result<T>
    where
        F: FnOnce(&mut FileState<R>) -> Result<T>,
    {
        let mut state = self.state.lock();
        let mut next = state.clone();
        let out = change(&mut next)?;
        Self::write_file(&self.path, &next)?;
        *state = next;
        Ok(out)
    }

    fn acquire_lock(path: &Path) -> Result<File> {
        let lock_path = path.with_extension("lock");
        let lock_file = File::create(lock_path)?;

        lock_file
            .try_lock_exclusive()
            .map_err(|_| StoreError::Locked)?;

        Ok(lock_file)
    }

    fn write_file(path: &Path, state: &FileState<R>) -> Result<()> {
        // Named encoding: records may skip optional fields.
        let encoded = rmp_serde::to_vec_named(state)?;

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        file.write_all(FILE_MAGIC)?;
        file.write_all(&[FILE_VERSION])?;
        file.write_all(&(encoded.len() as u64).to_le_bytes())?;
        file.write_all(&encoded)?;
        file.write_all(&crc32fast::hash(&encoded).to_le_bytes())?;
        file.sync_all()?;

        Ok(())
    }

    fn read_file(path: &Path) -> Result<FileState<R>> {
        let mut file = File::open(path)?;
        let file_len = file.metadata()?.len();

        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)?;
        if &magic != FILE_MAGIC {
            return Err(StoreError::InvalidFormat("Invalid collection file magic".into()));
        }

        let mut version = [0u8; 1];
        file.read_exact(&mut version)?;
        if version[0] != FILE_VERSION {
            return Err(StoreError::InvalidFormat(format!(
                "Unsupported collection file version: {}",
                version[0]
            )));
        }

        let mut len_bytes = [0u8; 8];
        file.read_exact(&mut len_bytes)?;
        let len = u64::from_le_bytes(len_bytes);
        if len > file_len.saturating_sub(HEADER_LEN + CHECKSUM_LEN) {
            return Err(StoreError::Corruption(format!(
                "collection payload length {} exceeds file size {}",
                len, file_len
            )));
        }

        let mut encoded = vec![0u8; len as usize];
        file.read_exact(&mut encoded)?;

        let mut checksum_bytes = [0u8; 4];
        file.read_exact(&mut checksum_bytes)?;
        if u32::from_le_bytes(checksum_bytes) != crc32fast::hash(&encoded) {
            return Err(StoreError::Corruption("collection file checksum mismatch".into()));
        }

        Ok(rmp_serde::from_slice(&encoded)?)
    }
}

#[async_trait]
impl<R> CollectionBackend<R> for FileBackend<R>
where
    R: Record + Serialize + DeserializeOwned,
{
    async fn fetch(&self, page: Option<PageRequest>) -> Result<Page<R>> {
        let state = self.state.lock();
        Ok(Page::slice(&state.records, page))
    }

    async fn create(&self, mut record: R) -> Result<R> {
        self.mutate(|state| {
            match record.id() {
                Some(id) => {
                    if state.records.iter().any(|r| r.id() == Some(id)) {
                        return Err(StoreError::Validation(format!("duplicate id {}", id)));
                    }
                    if let Ok(n) = id.parse::<u64>() {
                        state.next_id = state.next_id.max(n.saturating_add(1));
                    }
                }
                None => {
                    record.assign_id(state.next_id.to_string());
                    state.next_id += 1;
                }
            }
            state.records.push(record.clone());
            Ok(record)
        })
    }

    async fn update(&self, id: &str, mut record: R) -> Result<R> {
        self.mutate(|state| {
            let slot = state
                .records
                .iter_mut()
                .find(|r| r.id() == Some(id))
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
            record.assign_id(id.to_string());
            *slot = record.clone();
            Ok(record)
        })
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.mutate(|state| {
            let before = state.records.len();
            state.records.retain(|r| r.id() != Some(id));
            if state.records.len() == before {
                return Err(StoreError::NotFound(id.to_string()));
            }
            Ok(())
        })
    }
}
