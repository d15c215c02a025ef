//! Page replacement policies for the buffer pool.

use crate::frame::FrameId;
use parking_lot::Mutex;

/// Trait for page replacement algorithms.
pub trait Replacer: Send + Sync {
    /// Records that the given frame was accessed.
    fn record_access(&self, frame_id: FrameId);

    /// Selects a victim among the frames for which `is_evictable` holds.
    ///
    /// Returns None if no frame qualifies.
    fn evict(&self, is_evictable: &dyn Fn(FrameId) -> bool) -> Option<FrameId>;

    /// Forgets any history for a frame.
    fn remove(&self, frame_id: FrameId);

    /// Returns the number of frames tracked.
    fn capacity(&self) -> usize;
}

/// Clock replacement algorithm implementation.
///
/// The clock hand sweeps the frames in order. A candidate with its reference
/// bit set gets a second chance (the bit is cleared and the hand moves on);
/// the first candidate found with a clear bit is the victim. Two full sweeps
/// are enough to find a victim if any candidate exists.
pub struct ClockReplacer {
    inner: Mutex<ClockReplacerInner>,
}

struct ClockReplacerInner {
    reference_bits: Vec<bool>,
    clock_hand: usize,
}

impl ClockReplacer {
    pub fn new(num_frames: usize) -> Self {
        Self {
            inner: Mutex::new(ClockReplacerInner {
                reference_bits: vec![false; num_frames],
                clock_hand: 0,
            }),
        }
    }
}

impl Replacer for ClockReplacer {
    fn record_access(&self, frame_id: FrameId) {
        let mut inner = self.inner.lock();
        if let Some(bit) = inner.reference_bits.get_mut(frame_id.index()) {
            *bit = true;
        }
    }

    fn evict(&self, is_evictable: &dyn Fn(FrameId) -> bool) -> Option<FrameId> {
        let mut inner = self.inner.lock();
        let num_frames = inner.reference_bits.len();
        if num_frames == 0 {
            return None;
        }

        for _ in 0..(2 * num_frames) {
            let hand = inner.clock_hand;
            inner.clock_hand = (hand + 1) % num_frames;

            let frame_id = FrameId(hand as u32);
            if !is_evictable(frame_id) {
                continue;
            }
            if inner.reference_bits[hand] {
                inner.reference_bits[hand] = false;
            } else {
                return Some(frame_id);
            }
        }

        None
    }

    fn remove(&self, frame_id: FrameId) {
        let mut inner = self.inner.lock();
        if let Some(bit) = inner.reference_bits.get_mut(frame_id.index()) {
            *bit = false;
        }
    }

    fn capacity(&self) -> usize {
        self.inner.lock().reference_bits.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all(_: FrameId) -> bool {
        true
    }

    #[test]
    fn test_clock_replacer_new() {
        let replacer = ClockReplacer::new(10);
        assert_eq!(replacer.capacity(), 10);
    }

    #[test]
    fn test_clock_replacer_evict_none_evictable() {
        let replacer = ClockReplacer::new(10);
        assert!(replacer.evict(&|_| false).is_none());
    }

    #[test]
    fn test_clock_replacer_empty() {
        let replacer = ClockReplacer::new(0);
        assert!(replacer.evict(&all).is_none());
    }

    #[test]
    fn test_clock_replacer_evict_single_candidate() {
        let replacer = ClockReplacer::new(10);
        let victim = replacer.evict(&|fid| fid == FrameId(5));
        assert_eq!(victim, Some(FrameId(5)));
    }

    #[test]
    fn test_clock_replacer_second_chance() {
        let replacer = ClockReplacer::new(3);

        replacer.record_access(FrameId(0));
        replacer.record_access(FrameId(1));

        // Frame 2 has no reference bit and goes first
        assert_eq!(replacer.evict(&all), Some(FrameId(2)));
    }

    #[test]
    fn test_clock_replacer_all_referenced() {
        let replacer = ClockReplacer::new(3);

        for i in 0..3 {
            replacer.record_access(FrameId(i));
        }

        // First sweep clears every bit, second sweep picks frame 0
        assert_eq!(replacer.evict(&all), Some(FrameId(0)));
    }

    #[test]
    fn test_clock_replacer_hand_advances() {
        let replacer = ClockReplacer::new(3);
        assert_eq!(replacer.evict(&all), Some(FrameId(0)));
        assert_eq!(replacer.evict(&all), Some(FrameId(1)));
        assert_eq!(replacer.evict(&all), Some(FrameId(2)));
        assert_eq!(replacer.evict(&all), Some(FrameId(0)));
    }

    #[test]
    fn test_clock_replacer_remove_clears_reference() {
        let replacer = ClockReplacer::new(2);
        replacer.record_access(FrameId(0));
        replacer.remove(FrameId(0));
        assert_eq!(replacer.evict(&all), Some(FrameId(0)));
    }

    #[test]
    fn test_clock_replacer_out_of_range_ignored() {
        let replacer = ClockReplacer::new(2);
        replacer.record_access(FrameId(99));
        replacer.remove(FrameId(99));
        assert_eq!(replacer.capacity(), 2);
    }
}
