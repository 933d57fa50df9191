//! Frame and file identifier types.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Index of a slot in the buffer pool.
///
/// Frames live in a `Vec`, so this is a plain `usize` usable as
/// `frames[frame_id.0]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId(pub usize);

impl FrameId {
    /// Create a new FrameId.
    #[inline]
    pub fn new(id: usize) -> Self {
        FrameId(id)
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame({})", self.0)
    }
}

static NEXT_FILE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of an open paged file.
///
/// Every handle to one physical file shares an identity while any of them
/// is alive, and the buffer manager's directory keys on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileId(u64);

impl FileId {
    /// Hand out the next unused identity.
    pub(crate) fn next() -> Self {
        FileId(NEXT_FILE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "File({})", self.0)
    }
}
