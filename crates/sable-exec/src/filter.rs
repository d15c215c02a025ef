//! Predicates and the filter operator.

use crate::operator::{Lookahead, OpIterator};
use sable_common::{Field, Op, Result, Schema};
use sable_storage::{Tuple, TupleIterator};
use std::sync::Arc;

/// Compares one field of a tuple against a constant.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub field: usize,
    pub op: Op,
    pub operand: Field,
}

impl Predicate {
    pub fn new(field: usize, op: Op, operand: Field) -> Self {
        Self { field, op, operand }
    }

    /// True when `tuple[field] op operand` holds.
    pub fn filter(&self, tuple: &Tuple) -> Result<bool> {
        tuple.field(self.field)?.compare(self.op, &self.operand)
    }
}

impl std::fmt::Display for Predicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "f{} {} {}", self.field, self.op, self.operand)
    }
}

/// Passes through the child's tuples that satisfy a predicate.
pub struct Filter {
    predicate: Predicate,
    child: Box<dyn OpIterator>,
    lookahead: Lookahead,
}

impl Filter {
    pub fn new(predicate: Predicate, child: Box<dyn OpIterator>) -> Self {
        Self {
            predicate,
            child,
            lookahead: Lookahead::default(),
        }
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    fn fetch_next(&mut self) -> Result<Option<Tuple>> {
        while self.child.has_next()? {
            let tuple = self.child.next()?;
            if self.predicate.filter(&tuple)? {
                return Ok(Some(tuple));
            }
        }
        Ok(None)
    }
}

impl TupleIterator for Filter {
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
        self.lookahead.take("filter")
    }

    fn rewind(&mut self) -> Result<()> {
        self.child.rewind()?;
        self.lookahead.open();
        Ok(())
    }

    fn close(&mut self) {
        self.child.close();
        self.lookahead.close();
    }
}

impl OpIterator for Filter {
    fn schema(&self) -> &Arc<Schema> {
        self.child.schema()
    }
}
