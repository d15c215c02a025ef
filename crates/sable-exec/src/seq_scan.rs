//! Sequential scan over a heap file.

use crate::operator::OpIterator;
use sable_common::{Result, Schema};
use sable_storage::{Catalog, HeapFile, HeapFileIterator, Tuple, TupleIterator};
use sable_txn::TransactionId;
use std::sync::Arc;

/// Reads every tuple of a table in storage order.
///
/// Field names are prefixed with the table alias (`alias.field`). Emitted
/// tuples keep their tuple ids so they can be fed to [`Delete`](crate::Delete).
pub struct SeqScan {
    alias: String,
    schema: Arc<Schema>,
    inner: HeapFileIterator,
}

impl SeqScan {
    pub fn new(txn: TransactionId, file: &Arc<HeapFile>, alias: &str) -> Self {
        Self {
            alias: alias.to_string(),
            schema: Arc::new(file.schema().with_prefix(alias)),
            inner: file.iter(txn),
        }
    }

    /// Scans a catalog table, using its name as the alias.
    pub fn for_table(txn: TransactionId, catalog: &Catalog, table_id: u32) -> Result<Self> {
        let file = catalog.file(table_id)?;
        let name = catalog.table_name(table_id)?;
        Ok(Self::new(txn, &file, &name))
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }
}

impl TupleIterator for SeqScan {
    fn open(&mut self) -> Result<()> {
        self.inner.open()
    }

    fn has_next(&mut self) -> Result<bool> {
        self.inner.has_next()
    }

    fn next(&mut self) -> Result<Tuple> {
        let stored = self.inner.next()?;
        let tuple_id = stored.tuple_id();
        let mut tuple = Tuple::new(Arc::clone(&self.schema), stored.into_fields())?;
        tuple.set_tuple_id(tuple_id);
        Ok(tuple)
    }

    fn rewind(&mut self) -> Result<()> {
        self.inner.rewind()
    }

    fn close(&mut self) {
        self.inner.close()
    }
}

impl OpIterator for SeqScan {
    fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }
}
