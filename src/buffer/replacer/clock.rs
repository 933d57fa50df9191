//! CLOCK (second chance) replacement policy.

use log::trace;

use crate::buffer::frame::FrameDescriptor;
use crate::common::FrameId;

/// Rotating clock hand over the frame descriptors.
///
/// Each step advances the hand and looks at one slot:
/// 1. Invalid: claim it.
/// 2. Reference flag set: clear it and move on (second chance).
/// 3. Pinned: move on.
/// 4. Otherwise: it is the victim.
///
/// Two full sweeps are enough: the first clears every reference flag, so
/// the second finds any unpinned frame. If it doesn't, every frame is pinned.
///
/// The replacer only chooses. Writing back a dirty victim and dropping its
/// directory entry is the buffer manager's job.
#[derive(Debug)]
pub struct ClockReplacer {
    hand: usize,
    num_frames: usize,
}

impl ClockReplacer {
    /// Create a replacer for `num_frames` slots.
    ///
    /// The hand starts on the last slot so the first advance lands on slot 0.
    pub fn new(num_frames: usize) -> Self {
        assert!(num_frames > 0, "num_frames must be > 0");
        Self {
            hand: num_frames - 1,
            num_frames,
        }
    }

    /// Current hand position.
    #[inline]
    pub fn hand(&self) -> usize {
        self.hand
    }

    #[inline]
    fn advance(&mut self) {
        self.hand = (self.hand + 1) % self.num_frames;
    }

    /// Pick a frame to reuse, clearing reference flags along the way.
    ///
    /// Returns `None` if every frame is pinned. The returned frame is either
    /// invalid or valid, unpinned and unreferenced.
    pub fn pick_victim(&mut self, descriptors: &mut [FrameDescriptor]) -> Option<FrameId> {
        debug_assert_eq!(descriptors.len(), self.num_frames);

        for _ in 0..2 * self.num_frames {
            self.advance();
            let desc = &mut descriptors[self.hand];

            if !desc.valid {
                return Some(desc.frame_id);
            }
            if desc.ref_bit {
                desc.ref_bit = false;
                continue;
            }
            if desc.is_pinned() {
                continue;
            }

            trace!("clock picked {} holding {}", desc.frame_id, desc.page_id);
            return Some(desc.frame_id);
        }

        None
    }
}
