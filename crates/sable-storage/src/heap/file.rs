//! Heap file: an unordered collection of tuples spread over fixed-slot pages.
//!
//! Reads and in-place modifications go through the [`PageCache`], so every
//! page a transaction touches is locked first. Growing the file is the one
//! exception: a fresh empty page is written straight to disk and then fetched
//! back through the cache like any other page.

use crate::cache::PageCache;
use crate::disk::DiskManager;
use crate::heap::iter::HeapFileIterator;
use crate::heap::page::{HeapPage, slots_per_page};
use crate::tuple::Tuple;
use parking_lot::Mutex;
use sable_common::{PageId, Result, SableError, Schema};
use sable_txn::{Permissions, TransactionId};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// A table stored as a sequence of heap pages in one data file.
pub struct HeapFile {
    file_id: u32,
    schema: Arc<Schema>,
    disk: Arc<DiskManager>,
    cache: Arc<dyn PageCache>,
    /// Serializes appends so two inserters never write the same new page.
    append_latch: Mutex<()>,
}

impl HeapFile {
    /// Opens the data file at `path`, creating it when missing.
    ///
    /// Fails before touching the file when a tuple of `schema` does not fit
    /// on a page.
    pub fn open(
        path: &Path,
        schema: Arc<Schema>,
        disk: Arc<DiskManager>,
        cache: Arc<dyn PageCache>,
    ) -> Result<Self> {
        if disk.page_size() != cache.page_size() {
            return Err(SableError::ConfigError(format!(
                "disk page size {} differs from cache page size {}",
                disk.page_size(),
                cache.page_size()
            )));
        }
        if slots_per_page(disk.page_size(), schema.size()) == 0 {
            return Err(SableError::InvalidParameter {
                name: "schema".to_string(),
                value: format!(
                    "{}-byte tuples do not fit on a {}-byte page",
                    schema.size(),
                    disk.page_size()
                ),
            });
        }
        let file_id = disk.register_file(path)?;
        Ok(Self {
            file_id,
            schema,
            disk,
            cache,
            append_latch: Mutex::new(()),
        })
    }

    /// Stable identifier of this table's data file.
    pub fn id(&self) -> u32 {
        self.file_id
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn path(&self) -> Option<PathBuf> {
        self.disk.file_path(self.file_id)
    }

    pub fn page_size(&self) -> usize {
        self.disk.page_size()
    }

    pub fn cache(&self) -> &Arc<dyn PageCache> {
        &self.cache
    }

    /// Number of whole pages currently in the file.
    pub fn num_pages(&self) -> Result<u32> {
        self.disk.num_pages(self.file_id)
    }

    /// Reads a page straight from disk, bypassing locks and the cache.
    pub fn read_page(&self, page_id: PageId) -> Result<HeapPage> {
        self.check_owner(page_id)?;
        let data = self.disk.read_page(page_id)?;
        HeapPage::from_bytes(page_id, Arc::clone(&self.schema), &data)
    }

    /// Writes a page straight to disk at its page number.
    pub fn write_page(&self, page: &HeapPage) -> Result<()> {
        self.check_owner(page.page_id())?;
        self.disk.write_page(page.page_id(), &page.to_bytes())
    }

    /// Fetches a page through the cache under the lock `perm` implies.
    pub fn fetch_page(
        &self,
        txn: TransactionId,
        page_num: u32,
        perm: Permissions,
    ) -> Result<HeapPage> {
        let page_id = PageId::new(self.file_id, page_num);
        let data = self.cache.get_page(txn, page_id, perm)?;
        HeapPage::from_bytes(page_id, Arc::clone(&self.schema), &data)
    }

    /// Inserts `tuple` into the first page with a free slot, appending a new
    /// page when every existing one is full.
    ///
    /// On success the tuple carries its new location and the modified page is
    /// returned. Pages scanned along the way stay locked until the
    /// transaction ends.
    pub fn insert_tuple(&self, txn: TransactionId, tuple: &mut Tuple) -> Result<Vec<HeapPage>> {
        if **tuple.schema() != *self.schema {
            return Err(SableError::SchemaMismatch {
                expected: self.schema.to_string(),
                actual: tuple.schema().to_string(),
            });
        }

        let mut first_unscanned = 0;
        loop {
            let num_pages = self.num_pages()?;
            for page_num in first_unscanned..num_pages {
                let page = self.fetch_page(txn, page_num, Permissions::ReadWrite)?;
                if page.num_empty_slots() > 0 {
                    return self.place(txn, page, tuple);
                }
            }
            first_unscanned = num_pages;

            let page_num = self.append_empty_page()?;
            let page = self.fetch_page(txn, page_num, Permissions::ReadWrite)?;
            if page.num_slots() == 0 {
                return Err(SableError::PageFull);
            }
            if page.num_empty_slots() > 0 {
                return self.place(txn, page, tuple);
            }
            // Another transaction filled the new page before we locked it;
            // pages appended by others since the scan are checked next round.
        }
    }

    /// Removes `tuple` from the page its id names and returns that page.
    pub fn delete_tuple(&self, txn: TransactionId, tuple: &Tuple) -> Result<HeapPage> {
        let tuple_id = tuple.tuple_id().ok_or(SableError::MissingTupleId)?;
        self.check_owner(tuple_id.page_id)?;

        let mut page = self.fetch_page(txn, tuple_id.page_id.page_num, Permissions::ReadWrite)?;
        page.delete_tuple(tuple)?;
        self.cache.write_back(txn, page.page_id(), &page.to_bytes())?;
        Ok(page)
    }

    /// Returns a scan over every tuple in the file on behalf of `txn`.
    pub fn iter(self: &Arc<Self>, txn: TransactionId) -> HeapFileIterator {
        HeapFileIterator::new(Arc::clone(self), txn)
    }

    fn place(
        &self,
        txn: TransactionId,
        mut page: HeapPage,
        tuple: &mut Tuple,
    ) -> Result<Vec<HeapPage>> {
        page.insert_tuple(tuple)?;
        self.cache.write_back(txn, page.page_id(), &page.to_bytes())?;
        Ok(vec![page])
    }

    fn append_empty_page(&self) -> Result<u32> {
        let _guard = self.append_latch.lock();
        let page_num = self.num_pages()?;
        if page_num == u32::MAX {
            return Err(SableError::Internal(format!(
                "heap file {} cannot grow past {} pages",
                self.file_id, page_num
            )));
        }
        let page = HeapPage::empty(
            PageId::new(self.file_id, page_num),
            Arc::clone(&self.schema),
            self.page_size(),
        );
        self.write_page(&page)?;
        debug!(file_id = self.file_id, page_num, "appended heap page");
        Ok(page_num)
    }

    fn check_owner(&self, page_id: PageId) -> Result<()> {
        if page_id.file_id != self.file_id {
            return Err(SableError::WrongPage {
                expected: format!("file {}", self.file_id),
                actual: page_id.to_string(),
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for HeapFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeapFile")
            .field("file_id", &self.file_id)
            .field("schema", &self.schema.to_string())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::LockingPageCache;
    use crate::disk::DiskManagerConfig;
    use sable_buffer::{BufferPool, BufferPoolConfig};
    use sable_common::{Field, LockConfig, Type};
    use sable_txn::LockManager;
    use tempfile::tempdir;

    const PAGE: usize = 13;

    fn setup() -> (Arc<HeapFile>, Arc<LockingPageCache>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let disk = Arc::new(
            DiskManager::new(DiskManagerConfig {
                data_dir: dir.path().to_path_buf(),
                page_size: PAGE,
                fsync_enabled: false,
            })
            .unwrap(),
        );
        let pool = BufferPool::new(BufferPoolConfig {
            num_frames: 16,
            page_size: PAGE,
        });
        let cache = Arc::new(
            LockingPageCache::new(
                pool,
                Arc::new(LockManager::new()),
                Arc::clone(&disk),
                LockConfig::default(),
            )
            .unwrap(),
        );
        let schema = Arc::new(Schema::from_types(vec![Type::Int]).unwrap());
        let file = HeapFile::open(
            Path::new("t.dat"),
            schema,
            disk,
            Arc::clone(&cache) as Arc<dyn PageCache>,
        )
        .unwrap();
        (Arc::new(file), cache, dir)
    }

    fn int_tuple(file: &HeapFile, v: i32) -> Tuple {
        Tuple::new(Arc::clone(file.schema()), vec![Field::Int(v)]).unwrap()
    }

    #[test]
    fn test_insert_appends_pages() {
        let (file, _cache, _dir) = setup();
        let txn = TransactionId::next();
        assert_eq!(file.num_pages().unwrap(), 0);

        for v in 0..4 {
            let mut tuple = int_tuple(&file, v);
            let pages = file.insert_tuple(txn, &mut tuple).unwrap();
            assert_eq!(pages.len(), 1);
            let tid = tuple.tuple_id().unwrap();
            assert_eq!(tid.page_id, pages[0].page_id());
        }
        assert_eq!(file.num_pages().unwrap(), 2);
    }

    #[test]
    fn test_insert_rejects_foreign_schema() {
        let (file, _cache, _dir) = setup();
        let other = Arc::new(Schema::from_types(vec![Type::Int, Type::Int]).unwrap());
        let mut tuple = Tuple::new(other, vec![Field::Int(1), Field::Int(2)]).unwrap();
        let err = file
            .insert_tuple(TransactionId::next(), &mut tuple)
            .unwrap_err();
        assert!(matches!(err, SableError::SchemaMismatch { .. }));
        assert_eq!(file.num_pages().unwrap(), 0);
    }

    fn wide_schema() -> Arc<Schema> {
        Arc::new(Schema::from_types(vec![Type::Int; 17]).unwrap())
    }

    #[test]
    fn test_open_rejects_tuple_wider_than_page() {
        let (file, cache, dir) = setup();
        let err = HeapFile::open(
            Path::new("wide.dat"),
            wide_schema(),
            Arc::clone(&file.disk),
            cache as Arc<dyn PageCache>,
        )
        .unwrap_err();
        assert!(matches!(err, SableError::InvalidParameter { .. }));
        assert!(!dir.path().join("wide.dat").exists());
    }

    #[test]
    fn test_insert_stops_when_page_holds_no_slots() {
        let (file, cache, _dir) = setup();
        let disk = Arc::clone(&file.disk);
        let file_id = disk.register_file(Path::new("wide.dat")).unwrap();
        let wide = HeapFile {
            file_id,
            schema: wide_schema(),
            disk: Arc::clone(&disk),
            cache: cache as Arc<dyn PageCache>,
            append_latch: Mutex::new(()),
        };
        let mut tuple = Tuple::new(wide_schema(), vec![Field::Int(0); 17]).unwrap();
        let err = wide
            .insert_tuple(TransactionId::next(), &mut tuple)
            .unwrap_err();
        assert!(matches!(err, SableError::PageFull));
        assert_eq!(wide.num_pages().unwrap(), 1);
    }

    #[test]
    fn test_delete_requires_tuple_id() {
        let (file, _cache, _dir) = setup();
        let tuple = int_tuple(&file, 1);
        assert!(matches!(
            file.delete_tuple(TransactionId::next(), &tuple),
            Err(SableError::MissingTupleId)
        ));
    }

    #[test]
    fn test_committed_insert_visible_on_disk() {
        let (file, cache, _dir) = setup();
        let txn = TransactionId::next();
        let mut tuple = int_tuple(&file, 42);
        file.insert_tuple(txn, &mut tuple).unwrap();

        // Appended page is still empty on disk until commit.
        let before = file.read_page(PageId::new(file.id(), 0)).unwrap();
        assert_eq!(before.num_empty_slots(), 3);

        cache.transaction_complete(txn, true).unwrap();
        let after = file.read_page(PageId::new(file.id(), 0)).unwrap();
        assert_eq!(after.num_empty_slots(), 2);
        assert_eq!(after.tuples().next().unwrap().field(0).unwrap(), &Field::Int(42));
    }

    #[test]
    fn test_read_page_checks_file() {
        let (file, _cache, _dir) = setup();
        let err = file.read_page(PageId::new(file.id().wrapping_add(1), 0)).unwrap_err();
        assert!(matches!(err, SableError::WrongPage { .. }));
    }
}
