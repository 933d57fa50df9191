//! Frame - a slot in the buffer pool.
//!
//! A [`Frame`] holds the bytes of one cached page. Its bookkeeping lives in
//! a [`FrameDescriptor`] kept by the buffer manager:
//! - Which file and page are loaded (if any)
//! - Pin count for reference counting
//! - Dirty flag for write-back tracking
//! - Reference flag for the clock algorithm

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::common::{FrameId, PageId};
use crate::storage::page::Page;
use crate::storage::PagedFile;

/// The page buffer of one frame.
///
/// Access to the bytes goes through the `RwLock`, so a [`PageGuard`] may
/// hand out short-lived borrows while the descriptor table is locked
/// elsewhere.
///
/// [`PageGuard`]: super::PageGuard
pub struct Frame {
    page: RwLock<Page>,
}

impl Frame {
    /// Create a new frame holding a zeroed page.
    pub fn new() -> Self {
        Self {
            page: RwLock::new(Page::new()),
        }
    }

    /// Acquire read lock on the page.
    #[inline]
    pub fn page(&self) -> RwLockReadGuard<'_, Page> {
        self.page.read()
    }

    /// Acquire write lock on the page.
    #[inline]
    pub fn page_mut(&self) -> RwLockWriteGuard<'_, Page> {
        self.page.write()
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::new()
    }
}

/// Bookkeeping for one frame.
///
/// Invalid at startup, valid while a page is loaded, invalid again after
/// eviction, flush or disposal. A cleared descriptor drops its file handle.
#[derive(Debug)]
pub struct FrameDescriptor {
    pub frame_id: FrameId,
    pub file: Option<PagedFile>,
    pub page_id: PageId,
    pub pin_count: u32,
    pub dirty: bool,
    pub valid: bool,
    pub ref_bit: bool,
}

impl FrameDescriptor {
    pub fn new(frame_id: FrameId) -> Self {
        Self {
            frame_id,
            file: None,
            page_id: PageId::INVALID,
            pin_count: 0,
            dirty: false,
            valid: false,
            ref_bit: false,
        }
    }

    /// Take ownership of a freshly loaded page: pinned once, recently used,
    /// clean.
    pub fn set(&mut self, file: &PagedFile, page_id: PageId) {
        self.file = Some(file.clone());
        self.page_id = page_id;
        self.pin_count = 1;
        self.dirty = false;
        self.valid = true;
        self.ref_bit = true;
    }

    /// Return to the invalid state.
    pub fn clear(&mut self) {
        self.file = None;
        self.page_id = PageId::INVALID;
        self.pin_count = 0;
        self.dirty = false;
        self.valid = false;
        self.ref_bit = false;
    }

    /// Whether this descriptor claims to belong to `file`.
    #[inline]
    pub fn belongs_to(&self, file: &PagedFile) -> bool {
        self.file.as_ref().is_some_and(|f| f == file)
    }

    #[inline]
    pub fn is_pinned(&self) -> bool {
        self.pin_count > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_descriptor_starts_invalid() {
        let desc = FrameDescriptor::new(FrameId::new(3));
        assert!(!desc.valid);
        assert!(!desc.is_pinned());
        assert!(!desc.dirty);
        assert!(!desc.ref_bit);
        assert!(desc.file.is_none());
    }

    #[test]
    fn test_descriptor_set_and_clear() {
        let dir = tempdir().unwrap();
        let file = PagedFile::create(dir.path().join("f.db")).unwrap();
        let other = PagedFile::create(dir.path().join("g.db")).unwrap();

        let mut desc = FrameDescriptor::new(FrameId::new(0));
        desc.set(&file, PageId::new(4));
        assert!(desc.valid);
        assert!(desc.ref_bit);
        assert_eq!(desc.pin_count, 1);
        assert!(desc.belongs_to(&file));
        assert!(!desc.belongs_to(&other));

        desc.dirty = true;
        desc.clear();
        assert!(!desc.valid);
        assert!(!desc.dirty);
        assert!(!desc.belongs_to(&file));
        assert_eq!(desc.page_id, PageId::INVALID);
    }

    #[test]
    fn test_frame_page_access() {
        let frame = Frame::new();
        frame.page_mut().as_mut_slice()[0] = 0xAB;
        assert_eq!(frame.page().as_slice()[0], 0xAB);
    }
}
