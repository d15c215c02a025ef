//! The relational operator protocol.
//!
//! Operators form a tree of boxed [`OpIterator`]s; each parent pulls tuples
//! from its children. Most operators only know how to produce "the next
//! tuple or nothing", so [`Lookahead`] turns that into the
//! `has_next`/`next` pair of [`TupleIterator`].

use sable_common::{Result, SableError, Schema};
use sable_storage::{Tuple, TupleIterator};
use std::sync::Arc;

/// A tuple iterator that also describes the tuples it yields.
pub trait OpIterator: TupleIterator + Send {
    fn schema(&self) -> &Arc<Schema>;
}

impl OpIterator for Box<dyn OpIterator> {
    fn schema(&self) -> &Arc<Schema> {
        (**self).schema()
    }
}

/// One-tuple buffer between an operator's fetch step and its consumer.
#[derive(Debug, Default)]
pub(crate) struct Lookahead {
    open: bool,
    buffered: Option<Tuple>,
}

impl Lookahead {
    pub(crate) fn open(&mut self) {
        self.open = true;
        self.buffered = None;
    }

    pub(crate) fn close(&mut self) {
        self.open = false;
        self.buffered = None;
    }

    pub(crate) fn is_open(&self) -> bool {
        self.open
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.buffered.is_none()
    }

    /// Fills the buffer with `fetched` if it is empty.
    pub(crate) fn fill(&mut self, fetched: Option<Tuple>) -> bool {
        if self.buffered.is_none() {
            self.buffered = fetched;
        }
        self.buffered.is_some()
    }

    pub(crate) fn take(&mut self, operator: &str) -> Result<Tuple> {
        self.buffered
            .take()
            .ok_or_else(|| SableError::NoSuchElement(format!("{operator} has no more tuples")))
    }
}

/// Iterates over a fixed list of tuples.
#[derive(Debug)]
pub struct TupleList {
    schema: Arc<Schema>,
    tuples: Vec<Tuple>,
    position: Option<usize>,
}

impl TupleList {
    /// Every tuple must match `schema`.
    pub fn new(schema: Arc<Schema>, tuples: Vec<Tuple>) -> Result<Self> {
        if let Some(bad) = tuples.iter().find(|t| **t.schema() != *schema) {
            return Err(SableError::SchemaMismatch {
                expected: schema.to_string(),
                actual: bad.schema().to_string(),
            });
        }
        Ok(Self {
            schema,
            tuples,
            position: None,
        })
    }

    pub fn len(&self) -> usize {
        self.tuples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tuples.is_empty()
    }
}

impl TupleIterator for TupleList {
    fn open(&mut self) -> Result<()> {
        self.position = Some(0);
        Ok(())
    }

    fn has_next(&mut self) -> Result<bool> {
        Ok(matches!(self.position, Some(i) if i < self.tuples.len()))
    }

    fn next(&mut self) -> Result<Tuple> {
        match self.position {
            Some(i) if i < self.tuples.len() => {
                self.position = Some(i + 1);
                Ok(self.tuples[i].clone())
            }
            _ => Err(SableError::NoSuchElement(
                "tuple list has no more tuples".to_string(),
            )),
        }
    }

    fn rewind(&mut self) -> Result<()> {
        self.close();
        self.open()
    }

    fn close(&mut self) {
        self.position = None;
    }
}

impl OpIterator for TupleList {
    fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }
}
