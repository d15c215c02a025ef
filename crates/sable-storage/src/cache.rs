//! Lock-aware page cache.
//!
//! Every page a transaction touches is fetched through a [`PageCache`], which
//! takes the matching page lock first. Locks are held until the transaction
//! completes (strict two-phase locking). Dirty pages stay in memory until
//! commit writes them out; abort throws them away.

use crate::disk::DiskManager;
use sable_buffer::{BufferPool, BufferPoolConfig};
use sable_common::{EngineConfig, LockConfig, PageId, Result, SableError};
use sable_txn::{LockManager, LockMode, Permissions, TransactionId};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Transactional access to pages.
pub trait PageCache: Send + Sync {
    /// Size in bytes of every page handed out.
    fn page_size(&self) -> usize;

    /// Locks `page_id` for `txn` and returns a copy of its bytes.
    ///
    /// Blocks while the lock is refused and fails with
    /// [`SableError::TransactionAborted`] once the wait exceeds the
    /// configured timeout.
    fn get_page(&self, txn: TransactionId, page_id: PageId, perm: Permissions)
    -> Result<Box<[u8]>>;

    /// Stores modified page bytes. The caller must hold the exclusive lock.
    fn write_back(&self, txn: TransactionId, page_id: PageId, data: &[u8]) -> Result<()>;

    /// Releases the lock `txn` holds on `page_id` before the transaction ends.
    fn release_page(&self, txn: TransactionId, page_id: PageId);

    fn holds_lock(&self, txn: TransactionId, page_id: PageId) -> bool;

    /// Ends a transaction: commit forces its dirty pages to disk, abort
    /// discards them. Either way all of its locks are released.
    fn transaction_complete(&self, txn: TransactionId, commit: bool) -> Result<()>;

    /// Writes every dirty page to disk regardless of owner.
    fn flush_all(&self) -> Result<()>;
}

/// [`PageCache`] built from a buffer pool, a lock manager and a disk manager.
pub struct LockingPageCache {
    pool: BufferPool,
    locks: Arc<LockManager>,
    disk: Arc<DiskManager>,
    lock_config: LockConfig,
}

impl LockingPageCache {
    pub fn new(
        pool: BufferPool,
        locks: Arc<LockManager>,
        disk: Arc<DiskManager>,
        lock_config: LockConfig,
    ) -> Result<Self> {
        if pool.page_size() != disk.page_size() {
            return Err(SableError::ConfigError(format!(
                "buffer pool page size {} differs from disk page size {}",
                pool.page_size(),
                disk.page_size()
            )));
        }
        lock_config.validate()?;
        Ok(Self {
            pool,
            locks,
            disk,
            lock_config,
        })
    }

    /// Builds a cache with a fresh pool and lock manager sized from `config`.
    pub fn from_config(config: &EngineConfig, disk: Arc<DiskManager>) -> Result<Self> {
        config.validate()?;
        let pool = BufferPool::new(BufferPoolConfig::from(&config.storage));
        Self::new(
            pool,
            Arc::new(LockManager::new()),
            disk,
            config.lock.clone(),
        )
    }

    pub fn lock_manager(&self) -> &Arc<LockManager> {
        &self.locks
    }

    pub fn disk(&self) -> &Arc<DiskManager> {
        &self.disk
    }

    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }

    /// Polls the lock manager with exponential backoff until the lock is
    /// granted or the timeout passes.
    fn acquire(&self, txn: TransactionId, page_id: PageId, mode: LockMode) -> Result<()> {
        let start = Instant::now();
        let mut backoff = self.lock_config.retry_interval();

        while self.locks.grant_lock(page_id, txn, mode) {
            if start.elapsed() >= self.lock_config.timeout() {
                warn!(%txn, page = %page_id, ?mode, "lock wait timed out, aborting");
                return Err(SableError::TransactionAborted {
                    txn: txn.as_u64(),
                    reason: format!("timed out waiting for {:?} lock on page {}", mode, page_id),
                });
            }
            std::thread::sleep(backoff);
            backoff = (backoff * 2).min(self.lock_config.max_backoff());
        }
        Ok(())
    }
}

impl PageCache for LockingPageCache {
    fn page_size(&self) -> usize {
        self.pool.page_size()
    }

    fn get_page(
        &self,
        txn: TransactionId,
        page_id: PageId,
        perm: Permissions,
    ) -> Result<Box<[u8]>> {
        self.acquire(txn, page_id, perm.lock_mode())?;

        if let Some(data) = self.pool.fetch_page(page_id) {
            return Ok(data);
        }

        let data = self.disk.read_page(page_id)?;
        self.pool.load_page(page_id, &data)?;
        Ok(data)
    }

    fn write_back(&self, txn: TransactionId, page_id: PageId, data: &[u8]) -> Result<()> {
        if !self.locks.holds_exclusive(txn, page_id) {
            return Err(SableError::LockNotHeld {
                txn: txn.as_u64(),
                page_id: page_id.to_string(),
            });
        }
        self.pool.write_page(page_id, data)
    }

    fn release_page(&self, txn: TransactionId, page_id: PageId) {
        self.locks.release_lock(page_id, txn);
    }

    fn holds_lock(&self, txn: TransactionId, page_id: PageId) -> bool {
        self.locks.holds_lock(txn, page_id)
    }

    fn transaction_complete(&self, txn: TransactionId, commit: bool) -> Result<()> {
        let pages = self.locks.exclusive_pages(txn);

        let result = if commit {
            let mut flushed = 0;
            let outcome = pages.iter().try_for_each(|&page_id| {
                if self
                    .pool
                    .flush_page(page_id, |pid, data| self.disk.write_page(pid, data))?
                {
                    flushed += 1;
                }
                Ok(())
            });
            debug!(%txn, flushed, "transaction committed");
            outcome
        } else {
            for &page_id in &pages {
                self.pool.discard_page(page_id);
            }
            debug!(%txn, discarded = pages.len(), "transaction aborted");
            Ok(())
        };

        self.locks.release_all(txn);
        result
    }

    fn flush_all(&self) -> Result<()> {
        let flushed = self
            .pool
            .flush_all(|page_id, data| self.disk.write_page(page_id, data))?;
        debug!(flushed, "flushed all dirty pages");
        Ok(())
    }
}

impl std::fmt::Debug for LockingPageCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockingPageCache")
            .field("pool", &self.pool)
            .field("lock_config", &self.lock_config)
            .finish()
    }
}
