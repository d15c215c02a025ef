//! Pull-based tuple iteration shared by storage scans and query operators.

use crate::tuple::Tuple;
use sable_common::Result;

/// A restartable cursor over tuples.
///
/// Before `open` and after `close`, `has_next` reports `false` and `next`
/// fails with [`SableError::NoSuchElement`](sable_common::SableError::NoSuchElement).
pub trait TupleIterator {
    fn open(&mut self) -> Result<()>;

    fn has_next(&mut self) -> Result<bool>;

    fn next(&mut self) -> Result<Tuple>;

    /// Restarts from the first tuple.
    fn rewind(&mut self) -> Result<()>;

    fn close(&mut self);

    /// Drains the remaining tuples into a vector.
    fn collect_remaining(&mut self) -> Result<Vec<Tuple>>
    where
        Self: Sized,
    {
        let mut out = Vec::new();
        while self.has_next()? {
            out.push(self.next()?);
        }
        Ok(out)
    }
}

impl<T: TupleIterator + ?Sized> TupleIterator for Box<T> {
    fn open(&mut self) -> Result<()> {
        (**self).open()
    }

    fn has_next(&mut self) -> Result<bool> {
        (**self).has_next()
    }

    fn next(&mut self) -> Result<Tuple> {
        (**self).next()
    }

    fn rewind(&mut self) -> Result<()> {
        (**self).rewind()
    }

    fn close(&mut self) {
        (**self).close()
    }
}
