//! Storage engine for Sable.
//!
//! This crate provides:
//! - Disk manager for page-level file I/O
//! - Tuple representation and serialization
//! - Heap pages and heap files for fixed-width tuple storage
//! - A lock-aware page cache enforcing NO-STEAL/FORCE
//! - The table catalog and its schema file loader

mod cache;
mod catalog;
mod disk;
mod heap;
mod iterator;
mod tuple;

pub use cache::{LockingPageCache, PageCache};
pub use catalog::Catalog;
pub use disk::{DiskManager, DiskManagerConfig};
pub use heap::{HeapFile, HeapFileIterator, HeapPage, header_size, slots_per_page};
pub use iterator::TupleIterator;
pub use tuple::{SlotId, Tuple, TupleId};
