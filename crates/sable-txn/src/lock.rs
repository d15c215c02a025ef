//! Page lock table.

use crate::transaction::TransactionId;
use parking_lot::Mutex;
use sable_common::PageId;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LockMode {
    Shared,
    Exclusive,
}

/// Both directions of the lock table.
///
/// Page-keyed maps answer grant decisions, transaction-keyed maps make
/// `release_all` proportional to what the transaction holds. Entries are
/// removed as soon as their set becomes empty.
#[derive(Debug, Default)]
struct LockTable {
    shared: HashMap<PageId, HashSet<TransactionId>>,
    exclusive: HashMap<PageId, TransactionId>,
    shared_by_txn: HashMap<TransactionId, HashSet<PageId>>,
    exclusive_by_txn: HashMap<TransactionId, HashSet<PageId>>,
}

impl LockTable {
    fn can_share(&self, page: PageId, txn: TransactionId) -> bool {
        match self.exclusive.get(&page) {
            None => true,
            Some(&holder) => holder == txn,
        }
    }

    fn can_exclude(&self, page: PageId, txn: TransactionId) -> bool {
        if let Some(readers) = self.shared.get(&page) {
            if readers.len() > 1 || readers.iter().any(|&reader| reader != txn) {
                return false;
            }
        }
        self.can_share(page, txn)
    }

    fn add_shared(&mut self, page: PageId, txn: TransactionId) {
        self.shared.entry(page).or_default().insert(txn);
        self.shared_by_txn.entry(txn).or_default().insert(page);
    }

    fn add_exclusive(&mut self, page: PageId, txn: TransactionId) {
        self.exclusive.insert(page, txn);
        self.exclusive_by_txn.entry(txn).or_default().insert(page);
    }

    fn remove(&mut self, page: PageId, txn: TransactionId) -> bool {
        let mut removed = false;

        if let Some(readers) = self.shared.get_mut(&page) {
            removed |= readers.remove(&txn);
            if readers.is_empty() {
                self.shared.remove(&page);
            }
        }
        if let Some(pages) = self.shared_by_txn.get_mut(&txn) {
            pages.remove(&page);
            if pages.is_empty() {
                self.shared_by_txn.remove(&txn);
            }
        }

        if self.exclusive.get(&page) == Some(&txn) {
            self.exclusive.remove(&page);
            removed = true;
        }
        if let Some(pages) = self.exclusive_by_txn.get_mut(&txn) {
            pages.remove(&page);
            if pages.is_empty() {
                self.exclusive_by_txn.remove(&txn);
            }
        }

        removed
    }
}

/// Grants and tracks shared/exclusive locks on pages.
///
/// Requests are evaluated on every call against the current holders. There
/// is no wait queue and no fairness: a refused caller retries on its own
/// schedule, so a steady stream of readers can starve a writer.
#[derive(Debug, Default)]
pub struct LockManager {
    table: Mutex<LockTable>,
}

impl LockManager {
    /// Creates a lock manager with no locks held.
    pub fn new() -> Self {
        Self::default()
    }

    /// Tries to give `txn` a lock on `page`.
    ///
    /// Returns `true` when the request is BLOCKED and must be retried, and
    /// `false` when the lock was granted. Re-requesting a lock already held
    /// is granted. A sole shared holder asking for exclusive is upgraded and
    /// stays in the shared set.
    pub fn grant_lock(&self, page: PageId, txn: TransactionId, mode: LockMode) -> bool {
        let mut table = self.table.lock();

        let granted = match mode {
            LockMode::Shared => table.can_share(page, txn),
            LockMode::Exclusive => table.can_exclude(page, txn),
        };

        if !granted {
            debug!(%page, %txn, ?mode, "lock blocked");
            return true;
        }

        match mode {
            LockMode::Shared => table.add_shared(page, txn),
            LockMode::Exclusive => table.add_exclusive(page, txn),
        }
        debug!(%page, %txn, ?mode, "lock granted");
        false
    }

    /// Drops whatever lock `txn` holds on `page`. Idempotent.
    ///
    /// Never touches another transaction's exclusive lock.
    pub fn release_lock(&self, page: PageId, txn: TransactionId) {
        let mut table = self.table.lock();
        if table.remove(page, txn) {
            debug!(%page, %txn, "lock released");
        }
    }

    /// Drops every lock held by `txn`.
    pub fn release_all(&self, txn: TransactionId) {
        let mut table = self.table.lock();

        let mut pages: HashSet<PageId> = HashSet::new();
        if let Some(shared) = table.shared_by_txn.get(&txn) {
            pages.extend(shared);
        }
        if let Some(exclusive) = table.exclusive_by_txn.get(&txn) {
            pages.extend(exclusive);
        }

        for &page in &pages {
            table.remove(page, txn);
        }
        debug!(%txn, released = pages.len(), "released all locks");
    }

    /// Returns true if `txn` holds any lock on `page`.
    ///
    /// A page that was never locked has no holder.
    pub fn holds_lock(&self, txn: TransactionId, page: PageId) -> bool {
        let table = self.table.lock();
        table.exclusive.get(&page) == Some(&txn)
            || table
                .shared
                .get(&page)
                .is_some_and(|readers| readers.contains(&txn))
    }

    /// Returns true if `txn` is the exclusive holder of `page`.
    pub fn holds_exclusive(&self, txn: TransactionId, page: PageId) -> bool {
        self.table.lock().exclusive.get(&page) == Some(&txn)
    }

    /// Returns the transaction holding `page` exclusively, if any.
    pub fn exclusive_holder(&self, page: PageId) -> Option<TransactionId> {
        self.table.lock().exclusive.get(&page).copied()
    }

    /// Returns the shared holders of `page`, in id order.
    pub fn shared_holders(&self, page: PageId) -> Vec<TransactionId> {
        let table = self.table.lock();
        let mut holders: Vec<_> = table
            .shared
            .get(&page)
            .map(|readers| readers.iter().copied().collect())
            .unwrap_or_default();
        holders.sort();
        holders
    }

    /// Pages `txn` holds exclusively, in page order.
    pub fn exclusive_pages(&self, txn: TransactionId) -> Vec<PageId> {
        let table = self.table.lock();
        let mut pages: Vec<_> = table
            .exclusive_by_txn
            .get(&txn)
            .map(|pages| pages.iter().copied().collect())
            .unwrap_or_default();
        pages.sort();
        pages
    }

    /// Pages `txn` holds in any mode, in page order.
    pub fn locked_pages(&self, txn: TransactionId) -> Vec<PageId> {
        let table = self.table.lock();
        let mut pages: HashSet<PageId> = HashSet::new();
        if let Some(shared) = table.shared_by_txn.get(&txn) {
            pages.extend(shared);
        }
        if let Some(exclusive) = table.exclusive_by_txn.get(&txn) {
            pages.extend(exclusive);
        }
        let mut pages: Vec<_> = pages.into_iter().collect();
        pages.sort();
        pages
    }

    /// Number of pages with at least one holder.
    pub fn locked_page_count(&self) -> usize {
        let table = self.table.lock();
        let mut pages: HashSet<&PageId> = table.shared.keys().collect();
        pages.extend(table.exclusive.keys());
        pages.len()
    }
}
