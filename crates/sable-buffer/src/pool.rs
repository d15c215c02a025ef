//! Buffer pool manager.

use crate::frame::{BufferFrame, FrameId};
use crate::replacer::{ClockReplacer, Replacer};
use parking_lot::Mutex;
use sable_common::{PAGE_SIZE, PageId, Result, SableError, StorageConfig};
use std::collections::HashMap;
use tracing::debug;

/// Configuration for the buffer pool.
#[derive(Debug, Clone)]
pub struct BufferPoolConfig {
    /// Number of frames in the pool.
    pub num_frames: usize,
    /// Size of each frame in bytes.
    pub page_size: usize,
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        Self {
            num_frames: 1024,
            page_size: PAGE_SIZE,
        }
    }
}

impl From<&StorageConfig> for BufferPoolConfig {
    fn from(config: &StorageConfig) -> Self {
        Self {
            num_frames: config.buffer_pool_pages,
            page_size: config.page_size,
        }
    }
}

/// Page table and free list, updated together.
struct PoolState {
    page_table: HashMap<PageId, FrameId>,
    free_list: Vec<FrameId>,
}

/// Buffer pool manager.
///
/// Manages a fixed-size pool of page frames with:
/// - Page ID to frame ID mapping
/// - Free frame list for new pages
/// - Clock replacement for eviction
/// - Pin counting while page bytes are copied out
///
/// Dirty frames are never chosen for eviction. They leave the pool only
/// through a flush or an explicit discard, so uncommitted changes never
/// reach disk behind the owner's back.
pub struct BufferPool {
    config: BufferPoolConfig,
    frames: Vec<BufferFrame>,
    state: Mutex<PoolState>,
    replacer: ClockReplacer,
}

impl BufferPool {
    /// Creates a new buffer pool.
    pub fn new(config: BufferPoolConfig) -> Self {
        let num_frames = config.num_frames;

        let frames: Vec<_> = (0..num_frames)
            .map(|i| BufferFrame::new(FrameId(i as u32), config.page_size))
            .collect();

        // Reversed so that pop() hands out frame 0 first
        let free_list: Vec<_> = (0..num_frames).rev().map(|i| FrameId(i as u32)).collect();

        Self {
            config,
            frames,
            state: Mutex::new(PoolState {
                page_table: HashMap::with_capacity(num_frames),
                free_list,
            }),
            replacer: ClockReplacer::new(num_frames),
        }
    }

    pub fn num_frames(&self) -> usize {
        self.config.num_frames
    }

    pub fn page_size(&self) -> usize {
        self.config.page_size
    }

    pub fn free_count(&self) -> usize {
        self.state.lock().free_list.len()
    }

    /// Returns the number of pages currently in the pool.
    pub fn page_count(&self) -> usize {
        self.state.lock().page_table.len()
    }

    pub fn contains(&self, page_id: PageId) -> bool {
        self.state.lock().page_table.contains_key(&page_id)
    }

    /// Returns true if the cached copy of `page_id` has unflushed changes.
    pub fn is_dirty(&self, page_id: PageId) -> bool {
        self.frame_of(page_id)
            .is_some_and(|frame_id| self.frames[frame_id.index()].is_dirty())
    }

    fn frame_of(&self, page_id: PageId) -> Option<FrameId> {
        self.state.lock().page_table.get(&page_id).copied()
    }

    /// Returns a copy of the cached page, or None if it is not resident.
    ///
    /// The frame is pinned while the bytes are copied so it cannot be
    /// evicted underneath the reader.
    pub fn fetch_page(&self, page_id: PageId) -> Option<Box<[u8]>> {
        let frame = {
            let state = self.state.lock();
            let frame_id = *state.page_table.get(&page_id)?;
            let frame = &self.frames[frame_id.index()];
            frame.pin();
            self.replacer.record_access(frame_id);
            frame
        };

        let data = frame.to_owned_data();
        frame.unpin();
        Some(data)
    }

    /// Picks a frame for a new page. Must be called with the state locked.
    fn allocate_frame(&self, state: &mut PoolState) -> Result<FrameId> {
        if let Some(frame_id) = state.free_list.pop() {
            return Ok(frame_id);
        }

        let victim = self
            .replacer
            .evict(&|fid| self.frames[fid.index()].is_evictable());

        match victim {
            Some(victim_id) => {
                let frame = &self.frames[victim_id.index()];
                if let Some(old_page_id) = frame.page_id() {
                    state.page_table.remove(&old_page_id);
                    debug!(page = %old_page_id, frame = %victim_id, "evicted clean page");
                }
                Ok(victim_id)
            }
            None => Err(SableError::BufferPoolFull),
        }
    }

    /// Installs freshly read page bytes.
    ///
    /// If the page is already resident the cached copy wins, since it may be
    /// newer than what is on disk.
    pub fn load_page(&self, page_id: PageId, data: &[u8]) -> Result<()> {
        let mut state = self.state.lock();
        if let Some(&frame_id) = state.page_table.get(&page_id) {
            self.replacer.record_access(frame_id);
            return Ok(());
        }

        let frame_id = self.allocate_frame(&mut state)?;
        let frame = &self.frames[frame_id.index()];
        frame.reset();
        frame.set_page_id(Some(page_id));
        frame.copy_from(data);
        state.page_table.insert(page_id, frame_id);
        self.replacer.record_access(frame_id);
        Ok(())
    }

    /// Stores new contents for a page and marks it dirty.
    pub fn write_page(&self, page_id: PageId, data: &[u8]) -> Result<()> {
        let mut state = self.state.lock();
        let frame_id = match state.page_table.get(&page_id) {
            Some(&frame_id) => frame_id,
            None => {
                let frame_id = self.allocate_frame(&mut state)?;
                let frame = &self.frames[frame_id.index()];
                frame.reset();
                frame.set_page_id(Some(page_id));
                state.page_table.insert(page_id, frame_id);
                frame_id
            }
        };

        let frame = &self.frames[frame_id.index()];
        frame.copy_from(data);
        frame.set_dirty(true);
        self.replacer.record_access(frame_id);
        Ok(())
    }

    /// Drops a page from the pool without writing it, dirty or not.
    ///
    /// Returns false if the page is pinned or not in the pool.
    pub fn discard_page(&self, page_id: PageId) -> bool {
        let mut state = self.state.lock();
        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return false;
        };

        let frame = &self.frames[frame_id.index()];
        if frame.is_pinned() {
            return false;
        }

        state.page_table.remove(&page_id);
        self.replacer.remove(frame_id);
        frame.reset();
        state.free_list.push(frame_id);
        debug!(page = %page_id, "discarded page");
        true
    }

    /// Flushes a page to the provided callback.
    ///
    /// The callback receives the page data if the page is dirty.
    /// Returns true if the page was flushed.
    pub fn flush_page<F>(&self, page_id: PageId, mut flush_fn: F) -> Result<bool>
    where
        F: FnMut(PageId, &[u8]) -> Result<()>,
    {
        let Some(frame_id) = self.frame_of(page_id) else {
            return Ok(false);
        };
        let frame = &self.frames[frame_id.index()];
        if !frame.is_dirty() {
            return Ok(false);
        }

        let data = frame.read_data();
        flush_fn(page_id, &data)?;
        frame.set_dirty(false);
        Ok(true)
    }

    /// Flushes all dirty pages.
    ///
    /// Returns the number of pages flushed.
    pub fn flush_all<F>(&self, mut flush_fn: F) -> Result<usize>
    where
        F: FnMut(PageId, &[u8]) -> Result<()>,
    {
        // Collect first to avoid holding the state lock during I/O
        let mut resident: Vec<(PageId, FrameId)> = self
            .state
            .lock()
            .page_table
            .iter()
            .map(|(&page_id, &frame_id)| (page_id, frame_id))
            .collect();
        resident.sort_by_key(|&(page_id, _)| page_id);

        let mut flushed = 0;
        for (page_id, frame_id) in resident {
            let frame = &self.frames[frame_id.index()];
            if frame.is_dirty() && frame.page_id() == Some(page_id) {
                let data = frame.read_data();
                flush_fn(page_id, &data)?;
                frame.set_dirty(false);
                flushed += 1;
            }
        }
        Ok(flushed)
    }

    /// Returns statistics about the buffer pool.
    pub fn stats(&self) -> BufferPoolStats {
        let state = self.state.lock();
        let mut pinned_frames = 0;
        let mut dirty_frames = 0;

        for frame_id in state.page_table.values() {
            let frame = &self.frames[frame_id.index()];
            if frame.is_pinned() {
                pinned_frames += 1;
            }
            if frame.is_dirty() {
                dirty_frames += 1;
            }
        }

        BufferPoolStats {
            total_frames: self.config.num_frames,
            free_frames: state.free_list.len(),
            used_frames: state.page_table.len(),
            pinned_frames,
            dirty_frames,
        }
    }
}

impl std::fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPool")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}

/// Statistics about the buffer pool.
#[derive(Debug, Clone)]
pub struct BufferPoolStats {
    pub total_frames: usize,
    pub free_frames: usize,
    /// Number of frames with pages.
    pub used_frames: usize,
    pub pinned_frames: usize,
    pub dirty_frames: usize,
}
