//! Buffer pool management for Sable.
//!
//! This crate provides in-memory page caching with:
//! - Fixed-size buffer pool with configurable page count and page size
//! - Clock eviction policy restricted to clean, unpinned frames
//! - Pin counting while page bytes are copied out
//! - Dirty page tracking for write-back at commit

mod frame;
mod pool;
mod replacer;

pub use frame::{BufferFrame, FrameId};
pub use pool::{BufferPool, BufferPoolConfig, BufferPoolStats};
pub use replacer::{ClockReplacer, Replacer};
