//! Sequential scan over a heap file.

use crate::heap::file::HeapFile;
use crate::iterator::TupleIterator;
use crate::tuple::Tuple;
use sable_common::{Result, SableError};
use sable_txn::{Permissions, TransactionId};
use std::sync::Arc;

enum ScanState {
    Closed,
    /// `next_page` is the first page not yet loaded into `pending`.
    Open {
        next_page: u32,
        pending: std::vec::IntoIter<Tuple>,
    },
    Exhausted,
}

/// Yields every tuple of a heap file in page then slot order.
///
/// Pages are fetched one at a time with read permission, so the scanning
/// transaction ends up holding a shared lock on each page it has visited.
pub struct HeapFileIterator {
    file: Arc<HeapFile>,
    txn: TransactionId,
    state: ScanState,
}

impl HeapFileIterator {
    pub fn new(file: Arc<HeapFile>, txn: TransactionId) -> Self {
        Self {
            file,
            txn,
            state: ScanState::Closed,
        }
    }

    pub fn transaction(&self) -> TransactionId {
        self.txn
    }
}

impl TupleIterator for HeapFileIterator {
    fn open(&mut self) -> Result<()> {
        self.state = ScanState::Open {
            next_page: 0,
            pending: Vec::new().into_iter(),
        };
        Ok(())
    }

    fn has_next(&mut self) -> Result<bool> {
        loop {
            let ScanState::Open { next_page, pending } = &mut self.state else {
                return Ok(false);
            };
            if !pending.as_slice().is_empty() {
                return Ok(true);
            }
            // The file can grow while scanning, so recheck the length per page.
            if *next_page >= self.file.num_pages()? {
                self.state = ScanState::Exhausted;
                return Ok(false);
            }
            let page = self
                .file
                .fetch_page(self.txn, *next_page, Permissions::ReadOnly)?;
            *next_page += 1;
            *pending = page.into_tuples().into_iter();
        }
    }

    fn next(&mut self) -> Result<Tuple> {
        if !self.has_next()? {
            return Err(SableError::NoSuchElement(format!(
                "heap file {} scan has no more tuples",
                self.file.id()
            )));
        }
        match &mut self.state {
            ScanState::Open { pending, .. } => pending.next().ok_or_else(|| {
                SableError::Internal("scan buffer emptied after has_next".to_string())
            }),
            _ => Err(SableError::Internal("scan closed after has_next".to_string())),
        }
    }

    fn rewind(&mut self) -> Result<()> {
        self.close();
        self.open()
    }

    fn close(&mut self) {
        self.state = ScanState::Closed;
    }
}

impl std::fmt::Debug for HeapFileIterator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &self.state {
            ScanState::Closed => "closed",
            ScanState::Open { .. } => "open",
            ScanState::Exhausted => "exhausted",
        };
        f.debug_struct("HeapFileIterator")
            .field("file_id", &self.file.id())
            .field("txn", &self.txn)
            .field("state", &state)
            .finish()
    }
}
