//! RAII guard for a pinned page.
//!
//! A [`PageGuard`] owns one pin on a cached page and releases it when
//! dropped, passing along whether the page was modified. Page bytes are
//! borrowed through short-lived lock guards:
//! - [`PageGuard::data`] - shared read access
//! - [`PageGuard::data_mut`] - exclusive write access (marks the guard dirty)

use log::warn;
use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use crate::common::{FrameId, PageId, Result};
use crate::storage::page::Page;
use crate::storage::PagedFile;

use super::buffer_manager::BufferManager;

/// A scoped pin on one page.
///
/// # Example
/// ```ignore
/// let mut guard = bm.read_page(&file, page_id)?;
/// guard.data_mut().as_mut_slice()[8] = 0xFF;
/// // guard drops here, page unpinned and marked dirty
/// ```
///
/// Do not hold the lock returned by `data()` while calling `data_mut()` on a
/// second guard for the same page; the frame lock is not reentrant.
pub struct PageGuard<'a> {
    /// Reference back to the manager for unpin on drop.
    bm: &'a BufferManager,
    file: PagedFile,
    page_id: PageId,
    frame_id: FrameId,
    dirty: bool,
    /// Cleared once the pin has been released or handed off.
    pinned: bool,
}

impl<'a> PageGuard<'a> {
    /// Called by the buffer manager after it has taken the pin.
    pub(crate) fn new(
        bm: &'a BufferManager,
        file: PagedFile,
        page_id: PageId,
        frame_id: FrameId,
    ) -> Self {
        Self {
            bm,
            file,
            page_id,
            frame_id,
            dirty: false,
            pinned: true,
        }
    }

    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    #[inline]
    pub fn file(&self) -> &PagedFile {
        &self.file
    }

    /// Whether the page will be reported dirty on release.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Borrow the page bytes for reading.
    pub fn data(&self) -> RwLockReadGuard<'_, Page> {
        self.bm.frame(self.frame_id).page()
    }

    /// Borrow the page bytes for writing. Marks the guard dirty.
    pub fn data_mut(&mut self) -> RwLockWriteGuard<'_, Page> {
        self.dirty = true;
        self.bm.frame(self.frame_id).page_mut()
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Release the pin now, reporting any error.
    pub fn unpin(mut self) -> Result<()> {
        self.pinned = false;
        self.bm.unpin_page(&self.file, self.page_id, self.dirty)
    }

    /// Give up the guard but keep the pin.
    ///
    /// The caller becomes responsible for a matching
    /// [`BufferManager::unpin_page`]. A dirty guard marks the frame dirty
    /// first, so the later unpin may pass `false`.
    pub fn into_pinned(mut self) -> PageId {
        self.pinned = false;
        if self.dirty {
            self.bm.mark_frame_dirty(self.frame_id);
        }
        self.page_id
    }
}

impl std::fmt::Debug for PageGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageGuard")
            .field("file", &self.file.filename())
            .field("page_id", &self.page_id)
            .field("frame_id", &self.frame_id)
            .field("dirty", &self.dirty)
            .finish()
    }
}

impl Drop for PageGuard<'_> {
    fn drop(&mut self) {
        if !self.pinned {
            return;
        }
        if let Err(e) = self.bm.unpin_page(&self.file, self.page_id, self.dirty) {
            warn!("failed to unpin {} of {}: {}", self.page_id, self.file.filename(), e);
        }
    }
}
