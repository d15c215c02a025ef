//! Page identifiers and the file id registry.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Default page size in bytes (4 KB).
pub const PAGE_SIZE: usize = 4096;

/// Unique identifier for a page within a file.
///
/// PageId consists of a file ID and page number within that file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PageId {
    /// File identifier handed out by the [`FileRegistry`].
    pub file_id: u32,
    /// Page number within the file (0-indexed).
    pub page_num: u32,
}

impl PageId {
    /// Creates a new PageId.
    pub fn new(file_id: u32, page_num: u32) -> Self {
        Self { file_id, page_num }
    }

    /// Returns the PageId as a single u64 for compact storage.
    pub fn as_u64(&self) -> u64 {
        ((self.file_id as u64) << 32) | (self.page_num as u64)
    }

    /// Creates a PageId from a u64 representation.
    pub fn from_u64(value: u64) -> Self {
        Self {
            file_id: (value >> 32) as u32,
            page_num: value as u32,
        }
    }

    /// Byte offset of this page in its file.
    pub fn offset(&self, page_size: usize) -> u64 {
        self.page_num as u64 * page_size as u64
    }
}

impl std::fmt::Display for PageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.file_id, self.page_num)
    }
}

/// Derives the preferred id for a path: CRC-32 of its bytes.
///
/// The same canonical path always hashes to the same id, so ids stay
/// stable across restarts as long as no collision forced a probe.
pub fn file_id_for_path(path: &Path) -> u32 {
    crc32fast::hash(path.as_os_str().as_encoded_bytes())
}

/// Assigns file ids to data files.
///
/// Two distinct paths never share an id within one registry: when the hashed
/// id is already taken by another path, the next free id is used instead.
#[derive(Debug, Default)]
pub struct FileRegistry {
    inner: Mutex<RegistryInner>,
}

#[derive(Debug, Default)]
struct RegistryInner {
    by_id: HashMap<u32, PathBuf>,
    by_path: HashMap<PathBuf, u32>,
}

impl FileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id for `path`, registering it on first use.
    pub fn register(&self, path: &Path) -> u32 {
        let canonical = canonicalize(path);
        let preferred = file_id_for_path(&canonical);
        self.register_canonical(canonical, preferred)
    }

    fn register_canonical(&self, canonical: PathBuf, preferred: u32) -> u32 {
        let mut inner = self.inner.lock();

        if let Some(&id) = inner.by_path.get(&canonical) {
            return id;
        }

        let mut id = preferred;
        while inner.by_id.contains_key(&id) {
            id = id.wrapping_add(1);
        }

        inner.by_id.insert(id, canonical.clone());
        inner.by_path.insert(canonical, id);
        id
    }

    /// Returns the path registered under `file_id`.
    pub fn path(&self, file_id: u32) -> Option<PathBuf> {
        self.inner.lock().by_id.get(&file_id).cloned()
    }

    /// Returns the id of an already registered path.
    pub fn lookup(&self, path: &Path) -> Option<u32> {
        let canonical = canonicalize(path);
        self.inner.lock().by_path.get(&canonical).copied()
    }

    /// Forgets a file id. Its path may be registered again later.
    pub fn unregister(&self, file_id: u32) -> Option<PathBuf> {
        let mut inner = self.inner.lock();
        let path = inner.by_id.remove(&file_id)?;
        inner.by_path.remove(&path);
        Some(path)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn canonicalize(path: &Path) -> PathBuf {
    std::fs::canonicalize(path)
        .or_else(|_| std::path::absolute(path))
        .unwrap_or_else(|_| path.to_path_buf())
}
