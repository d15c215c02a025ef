//! Relational operators for Sable.
//!
//! Every operator implements [`OpIterator`] and pulls tuples from its
//! children, so plans are built by nesting boxed operators:
//! - SeqScan reads a heap file
//! - Filter keeps tuples matching a [`Predicate`]
//! - Insert and Delete apply changes and report a row count
//! - Aggregate computes min, max, sum, avg or count, optionally grouped

mod aggregate;
mod filter;
mod modify;
mod operator;
mod seq_scan;

pub use aggregate::{Aggregate, AggregateOp};
pub use filter::{Filter, Predicate};
pub use modify::{Delete, Insert};
pub use operator::{OpIterator, TupleList};
pub use seq_scan::SeqScan;
