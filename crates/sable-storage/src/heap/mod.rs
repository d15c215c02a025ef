//! Heap storage implementation.
//!
//! This module provides heap-based tuple storage with:
//! - HeapPage: fixed-slot page format with an occupancy bitmap
//! - HeapFile: first-fit inserts and deletes through the page cache
//! - HeapFileIterator: page-by-page sequential scan

mod file;
mod iter;
mod page;

pub use file::HeapFile;
pub use iter::HeapFileIterator;
pub use page::{HeapPage, header_size, slots_per_page};
