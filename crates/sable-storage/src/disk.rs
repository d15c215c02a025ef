//! Disk manager for page-level file I/O.

use parking_lot::Mutex;
use sable_common::{FileRegistry, PAGE_SIZE, PageId, Result, SableError, StorageConfig};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Configuration for the disk manager.
#[derive(Debug, Clone)]
pub struct DiskManagerConfig {
    /// Base directory for relative data file paths.
    pub data_dir: PathBuf,
    /// Size of every page in every file.
    pub page_size: usize,
    /// Enable fsync after writes.
    pub fsync_enabled: bool,
}

impl Default for DiskManagerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            page_size: PAGE_SIZE,
            fsync_enabled: true,
        }
    }
}

impl From<&StorageConfig> for DiskManagerConfig {
    fn from(config: &StorageConfig) -> Self {
        Self {
            data_dir: config.data_dir.clone(),
            page_size: config.page_size,
            fsync_enabled: config.fsync_enabled,
        }
    }
}

/// Manages reading and writing pages to disk files.
///
/// Files are registered by path. Page `n` of a file lives at byte offset
/// `n * page_size`, and a file's page count is its length divided by the
/// page size.
pub struct DiskManager {
    config: DiskManagerConfig,
    registry: FileRegistry,
    /// Open file handles keyed by file_id.
    files: Mutex<HashMap<u32, FileHandle>>,
}

/// Handle for an open data file.
struct FileHandle {
    file: File,
    path: PathBuf,
    num_pages: u32,
}

impl DiskManager {
    /// Creates a new disk manager.
    pub fn new(config: DiskManagerConfig) -> Result<Self> {
        if config.page_size == 0 {
            return Err(SableError::ConfigError(
                "page_size must be positive".to_string(),
            ));
        }
        std::fs::create_dir_all(&config.data_dir)?;

        Ok(Self {
            config,
            registry: FileRegistry::new(),
            files: Mutex::new(HashMap::new()),
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    pub fn page_size(&self) -> usize {
        self.config.page_size
    }

    /// Opens (creating if needed) the data file at `path` and returns its id.
    ///
    /// Relative paths are resolved against the data directory. Registering
    /// the same file twice returns the same id.
    pub fn register_file(&self, path: &Path) -> Result<u32> {
        let path = if path.is_relative() {
            self.config.data_dir.join(path)
        } else {
            path.to_path_buf()
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        let file_id = self.registry.register(&path);

        let mut files = self.files.lock();
        if files.contains_key(&file_id) {
            return Ok(file_id);
        }

        let file_size = file.metadata()?.len();
        let num_pages = (file_size / self.config.page_size as u64) as u32;
        debug!(file_id, path = %path.display(), num_pages, "registered data file");

        files.insert(
            file_id,
            FileHandle {
                file,
                path,
                num_pages,
            },
        );

        Ok(file_id)
    }

    /// Returns the path a file id was registered with.
    pub fn file_path(&self, file_id: u32) -> Option<PathBuf> {
        self.files.lock().get(&file_id).map(|handle| handle.path.clone())
    }

    /// Reads exactly one page from disk.
    pub fn read_page(&self, page_id: PageId) -> Result<Box<[u8]>> {
        let page_size = self.config.page_size;
        let mut files = self.files.lock();
        let handle = files
            .get_mut(&page_id.file_id)
            .ok_or(SableError::FileNotRegistered(page_id.file_id))?;

        if page_id.page_num >= handle.num_pages {
            return Err(SableError::PageNotFound {
                page_id: page_id.to_string(),
            });
        }

        handle.file.seek(SeekFrom::Start(page_id.offset(page_size)))?;

        let mut buffer = vec![0u8; page_size].into_boxed_slice();
        let mut filled = 0;
        while filled < page_size {
            match handle.file.read(&mut buffer[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        if filled < page_size {
            return Err(SableError::ShortRead {
                page_id: page_id.to_string(),
                expected: page_size,
                actual: filled,
            });
        }

        Ok(buffer)
    }

    /// Writes exactly one page to disk.
    ///
    /// The page may be an existing one or the one directly after the last;
    /// writing further out would leave a hole and is rejected.
    pub fn write_page(&self, page_id: PageId, data: &[u8]) -> Result<()> {
        let page_size = self.config.page_size;
        if data.len() != page_size {
            return Err(SableError::InvalidParameter {
                name: "page data length".to_string(),
                value: format!("{} (page size {})", data.len(), page_size),
            });
        }

        let mut files = self.files.lock();
        let handle = files
            .get_mut(&page_id.file_id)
            .ok_or(SableError::FileNotRegistered(page_id.file_id))?;

        if page_id.page_num > handle.num_pages {
            return Err(SableError::PageOutOfRange {
                file_id: page_id.file_id,
                page_num: page_id.page_num,
                num_pages: handle.num_pages,
            });
        }

        handle.file.seek(SeekFrom::Start(page_id.offset(page_size)))?;
        handle.file.write_all(data)?;

        if self.config.fsync_enabled {
            handle.file.sync_all()?;
        }

        // Update page count if we extended the file
        if page_id.page_num == handle.num_pages {
            handle.num_pages += 1;
        }

        Ok(())
    }

    /// Appends a zeroed page to the file and returns its id.
    pub fn allocate_page(&self, file_id: u32) -> Result<PageId> {
        let page_num = self.num_pages(file_id)?;
        let page_id = PageId::new(file_id, page_num);
        self.write_page(page_id, &vec![0u8; self.config.page_size])?;
        debug!(page = %page_id, "allocated page");
        Ok(page_id)
    }

    /// Returns the number of pages in a file.
    pub fn num_pages(&self, file_id: u32) -> Result<u32> {
        let files = self.files.lock();
        files
            .get(&file_id)
            .map(|handle| handle.num_pages)
            .ok_or(SableError::FileNotRegistered(file_id))
    }

    /// Flushes all pending writes to disk.
    pub fn flush(&self) -> Result<()> {
        let files = self.files.lock();
        for handle in files.values() {
            handle.file.sync_all()?;
        }
        Ok(())
    }

    /// Closes a specific file. Its id must be registered again before use.
    pub fn close_file(&self, file_id: u32) -> Result<()> {
        let handle = self.files.lock().remove(&file_id);
        self.registry.unregister(file_id);
        if let Some(handle) = handle {
            handle.file.sync_all()?;
        }
        Ok(())
    }

    /// Closes all open files.
    pub fn close_all(&self) -> Result<()> {
        let mut files = self.files.lock();
        for (file_id, handle) in files.drain() {
            self.registry.unregister(file_id);
            handle.file.sync_all()?;
        }
        Ok(())
    }

    /// Closes and deletes a data file.
    pub fn delete_file(&self, file_id: u32) -> Result<()> {
        let path = self.file_path(file_id);
        self.close_file(file_id)?;
        if let Some(path) = path {
            if path.exists() {
                std::fs::remove_file(path)?;
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for DiskManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskManager")
            .field("config", &self.config)
            .field("open_files", &self.files.lock().len())
            .finish()
    }
}

impl Drop for DiskManager {
    fn drop(&mut self) {
        let _ = self.close_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const TEST_PAGE: usize = 64;

    fn create_test_disk_manager() -> (DiskManager, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let config = DiskManagerConfig {
            data_dir: dir.path().to_path_buf(),
            page_size: TEST_PAGE,
            fsync_enabled: false,
        };
        let dm = DiskManager::new(config).unwrap();
        (dm, dir)
    }

    #[test]
    fn test_disk_manager_new() {
        let (dm, _dir) = create_test_disk_manager();
        assert!(dm.data_dir().exists());
        assert_eq!(dm.page_size(), TEST_PAGE);
    }

    #[test]
    fn test_disk_manager_rejects_zero_page_size() {
        let dir = tempdir().unwrap();
        let config = DiskManagerConfig {
            data_dir: dir.path().to_path_buf(),
            page_size: 0,
            fsync_enabled: false,
        };
        assert!(DiskManager::new(config).is_err());
    }

    #[test]
    fn test_register_same_file_twice() {
        let (dm, dir) = create_test_disk_manager();
        let a = dm.register_file(Path::new("t.dat")).unwrap();
        let b = dm.register_file(&dir.path().join("t.dat")).unwrap();
        assert_eq!(a, b);
        assert_eq!(dm.file_path(a).unwrap().file_name().unwrap(), "t.dat");
    }

    #[test]
    fn test_disk_manager_allocate_page() {
        let (dm, _dir) = create_test_disk_manager();
        let file_id = dm.register_file(Path::new("a.dat")).unwrap();

        let page1 = dm.allocate_page(file_id).unwrap();
        assert_eq!(page1, PageId::new(file_id, 0));

        let page2 = dm.allocate_page(file_id).unwrap();
        assert_eq!(page2.page_num, 1);

        assert_eq!(dm.num_pages(file_id).unwrap(), 2);
    }

    #[test]
    fn test_disk_manager_write_read() {
        let (dm, _dir) = create_test_disk_manager();
        let file_id = dm.register_file(Path::new("a.dat")).unwrap();
        let page_id = dm.allocate_page(file_id).unwrap();

        let mut data = [0u8; TEST_PAGE];
        data[0] = 0xAB;
        data[10] = 0xCD;
        data[TEST_PAGE - 1] = 0xEF;
        dm.write_page(page_id, &data).unwrap();

        let read_data = dm.read_page(page_id).unwrap();
        assert_eq!(&*read_data, &data[..]);
    }

    #[test]
    fn test_disk_manager_write_extends_by_one() {
        let (dm, _dir) = create_test_disk_manager();
        let file_id = dm.register_file(Path::new("a.dat")).unwrap();

        dm.write_page(PageId::new(file_id, 0), &[1; TEST_PAGE]).unwrap();
        assert_eq!(dm.num_pages(file_id).unwrap(), 1);

        let result = dm.write_page(PageId::new(file_id, 5), &[1; TEST_PAGE]);
        assert!(matches!(result, Err(SableError::PageOutOfRange { .. })));
        assert_eq!(dm.num_pages(file_id).unwrap(), 1);
    }

    #[test]
    fn test_disk_manager_wrong_length_write() {
        let (dm, _dir) = create_test_disk_manager();
        let file_id = dm.register_file(Path::new("a.dat")).unwrap();
        assert!(dm.write_page(PageId::new(file_id, 0), &[0; 10]).is_err());
    }

    #[test]
    fn test_disk_manager_multiple_files() {
        let (dm, _dir) = create_test_disk_manager();
        let ids: Vec<u32> = ["f0.dat", "f1.dat", "f2.dat"]
            .iter()
            .map(|name| dm.register_file(Path::new(name)).unwrap())
            .collect();

        for (i, &file_id) in ids.iter().enumerate() {
            dm.write_page(PageId::new(file_id, 0), &[i as u8 * 0x11; TEST_PAGE])
                .unwrap();
        }
        for (i, &file_id) in ids.iter().enumerate() {
            assert_eq!(dm.read_page(PageId::new(file_id, 0)).unwrap()[0], i as u8 * 0x11);
        }
    }

    #[test]
    fn test_disk_manager_read_nonexistent_page() {
        let (dm, _dir) = create_test_disk_manager();
        let file_id = dm.register_file(Path::new("a.dat")).unwrap();
        dm.allocate_page(file_id).unwrap();

        let result = dm.read_page(PageId::new(file_id, 99));
        assert!(matches!(result, Err(SableError::PageNotFound { .. })));
    }

    #[test]
    fn test_disk_manager_unregistered_file() {
        let (dm, _dir) = create_test_disk_manager();
        assert!(matches!(
            dm.read_page(PageId::new(12345, 0)),
            Err(SableError::FileNotRegistered(12345))
        ));
        assert!(dm.num_pages(12345).is_err());
    }

    #[test]
    fn test_disk_manager_partial_trailing_page_ignored() {
        let (dm, dir) = create_test_disk_manager();
        let path = dir.path().join("partial.dat");
        std::fs::write(&path, vec![7u8; TEST_PAGE * 2 + 10]).unwrap();

        let file_id = dm.register_file(&path).unwrap();
        assert_eq!(dm.num_pages(file_id).unwrap(), 2);
        assert_eq!(dm.read_page(PageId::new(file_id, 1)).unwrap()[0], 7);
    }

    #[test]
    fn test_disk_manager_short_read() {
        let (dm, dir) = create_test_disk_manager();
        let path = dir.path().join("short.dat");
        std::fs::write(&path, vec![1u8; TEST_PAGE]).unwrap();
        let file_id = dm.register_file(&path).unwrap();

        // Truncate behind the manager's back
        std::fs::OpenOptions::new()
            .write(true)
            .open(&path)
            .unwrap()
            .set_len(10)
            .unwrap();

        let result = dm.read_page(PageId::new(file_id, 0));
        assert!(matches!(
            result,
            Err(SableError::ShortRead {
                expected: TEST_PAGE,
                actual: 10,
                ..
            })
        ));
    }

    #[test]
    fn test_disk_manager_overwrite_page() {
        let (dm, _dir) = create_test_disk_manager();
        let file_id = dm.register_file(Path::new("a.dat")).unwrap();
        let page_id = dm.allocate_page(file_id).unwrap();

        dm.write_page(page_id, &[0xAA; TEST_PAGE]).unwrap();
        dm.write_page(page_id, &[0xBB; TEST_PAGE]).unwrap();

        assert_eq!(dm.read_page(page_id).unwrap()[0], 0xBB);
        assert_eq!(dm.num_pages(file_id).unwrap(), 1);
    }

    #[test]
    fn test_disk_manager_persistence() {
        let dir = tempdir().unwrap();
        let config = DiskManagerConfig {
            data_dir: dir.path().to_path_buf(),
            page_size: TEST_PAGE,
            fsync_enabled: true,
        };

        let page_id = {
            let dm = DiskManager::new(config.clone()).unwrap();
            let file_id = dm.register_file(Path::new("p.dat")).unwrap();
            let page_id = dm.allocate_page(file_id).unwrap();
            dm.write_page(page_id, &[0xFF; TEST_PAGE]).unwrap();
            page_id
        };

        let dm = DiskManager::new(config).unwrap();
        let file_id = dm.register_file(Path::new("p.dat")).unwrap();
        // Same path hashes to the same id across restarts
        assert_eq!(file_id, page_id.file_id);
        assert_eq!(dm.read_page(page_id).unwrap()[0], 0xFF);
    }

    #[test]
    fn test_disk_manager_delete_file() {
        let (dm, dir) = create_test_disk_manager();
        let file_id = dm.register_file(Path::new("gone.dat")).unwrap();
        dm.allocate_page(file_id).unwrap();

        let file_path = dir.path().join("gone.dat");
        assert!(file_path.exists());

        dm.delete_file(file_id).unwrap();
        assert!(!file_path.exists());
        assert!(dm.num_pages(file_id).is_err());
    }

    #[test]
    fn test_disk_manager_close_file() {
        let (dm, _dir) = create_test_disk_manager();
        let file_id = dm.register_file(Path::new("c.dat")).unwrap();
        dm.allocate_page(file_id).unwrap();
        dm.close_file(file_id).unwrap();

        // Can reopen and continue
        let file_id = dm.register_file(Path::new("c.dat")).unwrap();
        dm.allocate_page(file_id).unwrap();
        assert_eq!(dm.num_pages(file_id).unwrap(), 2);
        dm.flush().unwrap();
    }
}
