//! Insert and delete operators.
//!
//! Both drain their child on the first fetch, apply every change under the
//! operator's transaction, and then yield a single one-int tuple holding the
//! number of rows affected.

use crate::operator::{Lookahead, OpIterator};
use sable_common::{Field, Result, SableError, Schema, SchemaItem, Type};
use sable_storage::{Catalog, HeapFile, Tuple, TupleIterator};
use sable_txn::TransactionId;
use std::sync::Arc;
use tracing::debug;

fn count_schema(name: &str) -> Result<Arc<Schema>> {
    Ok(Arc::new(Schema::from_items(vec![SchemaItem::new(
        Type::Int,
        name,
    )])?))
}

/// Inserts every child tuple into a heap file.
pub struct Insert {
    txn: TransactionId,
    child: Box<dyn OpIterator>,
    file: Arc<HeapFile>,
    schema: Arc<Schema>,
    /// Rows inserted, once the child has been drained.
    inserted: Option<usize>,
    lookahead: Lookahead,
}

impl Insert {
    /// Fails when the child's tuples do not match the table's schema.
    pub fn new(txn: TransactionId, child: Box<dyn OpIterator>, file: Arc<HeapFile>) -> Result<Self> {
        if **child.schema() != **file.schema() {
            return Err(SableError::SchemaMismatch {
                expected: file.schema().to_string(),
                actual: child.schema().to_string(),
            });
        }
        Ok(Self {
            txn,
            child,
            file,
            schema: count_schema("inserted")?,
            inserted: None,
            lookahead: Lookahead::default(),
        })
    }

    /// Inserts into a catalog table.
    pub fn for_table(
        txn: TransactionId,
        child: Box<dyn OpIterator>,
        catalog: &Catalog,
        table_id: u32,
    ) -> Result<Self> {
        Self::new(txn, child, catalog.file(table_id)?)
    }

    fn fetch_next(&mut self) -> Result<Option<Tuple>> {
        if self.inserted.is_some() {
            return Ok(None);
        }
        let mut count = 0;
        while self.child.has_next()? {
            let mut tuple = self.child.next()?;
            self.file.insert_tuple(self.txn, &mut tuple)?;
            count += 1;
        }
        debug!(txn = %self.txn, table_id = self.file.id(), count, "inserted tuples");
        self.inserted = Some(count);
        count_tuple(&self.schema, count).map(Some)
    }
}

/// Deletes every child tuple from the table its tuple id points into.
pub struct Delete {
    txn: TransactionId,
    child: Box<dyn OpIterator>,
    catalog: Arc<Catalog>,
    schema: Arc<Schema>,
    deleted: Option<usize>,
    lookahead: Lookahead,
}

impl Delete {
    pub fn new(
        txn: TransactionId,
        child: Box<dyn OpIterator>,
        catalog: Arc<Catalog>,
    ) -> Result<Self> {
        Ok(Self {
            txn,
            child,
            catalog,
            schema: count_schema("deleted")?,
            deleted: None,
            lookahead: Lookahead::default(),
        })
    }

    fn fetch_next(&mut self) -> Result<Option<Tuple>> {
        if self.deleted.is_some() {
            return Ok(None);
        }
        let mut count = 0;
        while self.child.has_next()? {
            let tuple = self.child.next()?;
            let tuple_id = tuple.tuple_id().ok_or(SableError::MissingTupleId)?;
            // Table ids are data file ids.
            let file = self.catalog.file(tuple_id.page_id.file_id)?;
            file.delete_tuple(self.txn, &tuple)?;
            count += 1;
        }
        debug!(txn = %self.txn, count, "deleted tuples");
        self.deleted = Some(count);
        count_tuple(&self.schema, count).map(Some)
    }
}

fn count_tuple(schema: &Arc<Schema>, count: usize) -> Result<Tuple> {
    let count = i32::try_from(count).map_err(|_| SableError::InvalidParameter {
        name: "count".to_string(),
        value: count.to_string(),
    })?;
    Tuple::new(Arc::clone(schema), vec![Field::Int(count)])
}

macro_rules! counting_operator {
    ($ty:ident, $done:ident, $label:literal) => {
        impl TupleIterator for $ty {
            fn open(&mut self) -> Result<()> {
                self.child.open()?;
                self.lookahead.open();
                Ok(())
            }

            fn has_next(&mut self) -> Result<bool> {
                if !self.lookahead.is_open() {
                    return Ok(false);
                }
                if self.lookahead.is_empty() {
                    let fetched = self.fetch_next()?;
                    return Ok(self.lookahead.fill(fetched));
                }
                Ok(true)
            }

            fn next(&mut self) -> Result<Tuple> {
                self.has_next()?;
                self.lookahead.take($label)
            }

            /// Replays the count without applying the changes again.
            fn rewind(&mut self) -> Result<()> {
                self.child.rewind()?;
                self.lookahead.open();
                if let Some(count) = self.$done {
                    let tuple = count_tuple(&self.schema, count)?;
                    self.lookahead.fill(Some(tuple));
                }
                Ok(())
            }

            fn close(&mut self) {
                self.child.close();
                self.lookahead.close();
            }
        }

        impl OpIterator for $ty {
            fn schema(&self) -> &Arc<Schema> {
                &self.schema
            }
        }
    };
}

counting_operator!(Insert, inserted, "insert");
counting_operator!(Delete, deleted, "delete");
