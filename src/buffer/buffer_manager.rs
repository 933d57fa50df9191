//! Buffer Manager - the page caching layer.
//!
//! The [`BufferManager`] provides:
//! - Page caching between paged files and memory, for any number of files
//! - Pin-based reference counting
//! - Clock (second chance) replacement
//! - Dirty page write-back on eviction, flush and shutdown

use log::{debug, trace, warn};
use parking_lot::Mutex;

use crate::buffer::frame::{Frame, FrameDescriptor};
use crate::buffer::replacer::ClockReplacer;
use crate::buffer::{BufferStats, Directory, PageGuard};
use crate::common::config::DEFAULT_BUFFER_FRAMES;
use crate::common::{Error, FrameId, PageId, Result};
use crate::storage::PagedFile;

/// Manages a pool of buffer frames for caching pages.
///
/// # Architecture
/// ```text
/// ┌─────────────────────────────────────────────────────────────┐
/// │                      BufferManager                          │
/// │  ┌──────────────────┐  ┌───────────────────────────────┐   │
/// │  │ directory        │  │      frames: Vec<Frame>       │   │
/// │  │(file,page) → Fid │─▶│  [Frame0] [Frame1] [Frame2]   │   │
/// │  └──────────────────┘  └───────────────────────────────┘   │
/// │  ┌──────────────────┐  ┌──────────────┐                    │
/// │  │ descriptors      │  │ clock        │                    │
/// │  │ pin/dirty/ref    │  │ rotating hand│                    │
/// │  └──────────────────┘  └──────────────┘                    │
/// └─────────────────────────────────────────────────────────────┘
/// ```
///
/// Descriptors, directory, clock and stats sit behind one `Mutex`; page
/// bytes sit behind a per-frame `RwLock`. Methods take `&self` so several
/// [`PageGuard`]s can be alive at once. The manager is driven by one logical
/// actor; it does not promise anything under concurrent use.
///
/// # Usage
/// ```ignore
/// let file = PagedFile::create("rel.db")?;
/// let bm = BufferManager::new(10);
///
/// let mut guard = bm.alloc_page(&file)?;
/// guard.data_mut().as_mut_slice()[8] = 0xAB;
/// drop(guard); // unpinned, dirty
///
/// bm.flush_file(&file)?;
/// ```
pub struct BufferManager {
    /// Fixed pool of frames allocated at startup.
    frames: Vec<Frame>,

    state: Mutex<BufferState>,

    num_frames: usize,
}

struct BufferState {
    /// One per frame, index-aligned with `frames`.
    descriptors: Vec<FrameDescriptor>,
    directory: Directory,
    clock: ClockReplacer,
    stats: BufferStats,
}

impl BufferManager {
    /// Create a buffer manager with `num_frames` frames.
    ///
    /// # Panics
    /// Panics if `num_frames` is 0.
    pub fn new(num_frames: usize) -> Self {
        assert!(num_frames > 0, "num_frames must be > 0");

        let frames = (0..num_frames).map(|_| Frame::new()).collect();
        let descriptors = (0..num_frames)
            .map(|i| FrameDescriptor::new(FrameId::new(i)))
            .collect();

        Self {
            frames,
            state: Mutex::new(BufferState {
                descriptors,
                directory: Directory::with_capacity(num_frames),
                clock: ClockReplacer::new(num_frames),
                stats: BufferStats::default(),
            }),
            num_frames,
        }
    }

    /// Create a buffer manager with [`DEFAULT_BUFFER_FRAMES`] frames.
    pub fn with_default_frames() -> Self {
        Self::new(DEFAULT_BUFFER_FRAMES)
    }

    // ========================================================================
    // Public API: pin pages
    // ========================================================================

    /// Pin a page, loading it from `file` on a miss.
    ///
    /// # Errors
    /// - `Error::BufferExceeded` if the page is not cached and every frame is pinned
    /// - `Error::PageNotFound` / `Error::ChecksumMismatch` from the file
    pub fn read_page(&self, file: &PagedFile, page_id: PageId) -> Result<PageGuard<'_>> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        if let Ok(frame_id) = state.directory.lookup(file, page_id) {
            let desc = &mut state.descriptors[frame_id.0];
            desc.ref_bit = true;
            desc.pin_count += 1;
            state.stats.cache_hits += 1;
            trace!("hit {} of {} in {}", page_id, file.filename(), frame_id);
            return Ok(PageGuard::new(self, file.clone(), page_id, frame_id));
        }

        state.stats.cache_misses += 1;
        let frame_id = self.alloc_buf(state)?;
        {
            let mut page = self.frames[frame_id.0].page_mut();
            file.read_page(page_id, &mut page)?;
        }
        state.stats.pages_read += 1;

        state.directory.insert(file, page_id, frame_id)?;
        state.descriptors[frame_id.0].set(file, page_id);
        trace!("loaded {} of {} into {}", page_id, file.filename(), frame_id);

        Ok(PageGuard::new(self, file.clone(), page_id, frame_id))
    }

    /// Allocate a new page in `file` and pin it.
    ///
    /// The guard's [`page_id`](PageGuard::page_id) is the new page number.
    /// The page starts zeroed.
    ///
    /// # Errors
    /// - `Error::BufferExceeded` if every frame is pinned
    /// - I/O errors from the file
    pub fn alloc_page(&self, file: &PagedFile) -> Result<PageGuard<'_>> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let frame_id = self.alloc_buf(state)?;
        let page_id = file.allocate_page()?;
        self.frames[frame_id.0].page_mut().reset();

        state.directory.insert(file, page_id, frame_id)?;
        state.descriptors[frame_id.0].set(file, page_id);
        state.stats.allocations += 1;
        trace!("allocated {} of {} in {}", page_id, file.filename(), frame_id);

        Ok(PageGuard::new(self, file.clone(), page_id, frame_id))
    }

    /// Release one pin on a page, marking it dirty if `dirty`.
    ///
    /// Does nothing if the page is not cached.
    ///
    /// # Errors
    /// `Error::PageNotPinned` if the pin count is already zero.
    pub fn unpin_page(&self, file: &PagedFile, page_id: PageId, dirty: bool) -> Result<()> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let Ok(frame_id) = state.directory.lookup(file, page_id) else {
            trace!("unpin of uncached {} of {} ignored", page_id, file.filename());
            return Ok(());
        };

        let desc = &mut state.descriptors[frame_id.0];
        if desc.pin_count == 0 {
            return Err(Error::PageNotPinned {
                file: file.filename().to_string(),
                page_id,
                frame_id,
            });
        }

        desc.pin_count -= 1;
        if dirty {
            desc.dirty = true;
        }
        Ok(())
    }

    // ========================================================================
    // Public API: flush and dispose
    // ========================================================================

    /// Write back and drop every cached page of `file`, then sync it.
    ///
    /// Nothing is written unless all of the file's frames can be flushed.
    ///
    /// # Errors
    /// - `Error::BadBuffer` if a frame of the file is invalid
    /// - `Error::PagePinned` if a page of the file is still pinned
    /// - I/O errors from the file
    pub fn flush_file(&self, file: &PagedFile) -> Result<()> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        for desc in state.descriptors.iter().filter(|d| d.belongs_to(file)) {
            if !desc.valid {
                return Err(bad_buffer(desc));
            }
            if desc.is_pinned() {
                return Err(Error::PagePinned {
                    file: file.filename().to_string(),
                    page_id: desc.page_id,
                    frame_id: desc.frame_id,
                });
            }
        }

        let mut flushed = 0usize;
        for desc in state.descriptors.iter_mut().filter(|d| d.belongs_to(file)) {
            if desc.dirty {
                file.write_page(desc.page_id, &self.frames[desc.frame_id.0].page())?;
                desc.dirty = false;
                state.stats.pages_written += 1;
                flushed += 1;
            }
            state.directory.remove(file, desc.page_id)?;
            desc.clear();
        }

        file.sync()?;
        debug!("flushed {}: {} dirty pages written", file.filename(), flushed);
        Ok(())
    }

    /// Drop a page from the pool without writing it back and delete it from
    /// `file`.
    ///
    /// # Errors
    /// - `Error::PagePinned` if the page is cached and pinned
    /// - `Error::PageNotFound` if the file has no such page
    pub fn dispose_page(&self, file: &PagedFile, page_id: PageId) -> Result<()> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        if let Ok(frame_id) = state.directory.lookup(file, page_id) {
            let desc = &mut state.descriptors[frame_id.0];
            if desc.is_pinned() {
                return Err(Error::PagePinned {
                    file: file.filename().to_string(),
                    page_id,
                    frame_id,
                });
            }
            desc.clear();
            state.directory.remove(file, page_id)?;
        }

        file.delete_page(page_id)?;
        state.stats.disposals += 1;
        trace!("disposed {} of {}", page_id, file.filename());
        Ok(())
    }

    // ========================================================================
    // Public API: stats and introspection
    // ========================================================================

    /// Copy of the current counters.
    pub fn stats(&self) -> BufferStats {
        self.state.lock().stats
    }

    pub fn num_frames(&self) -> usize {
        self.num_frames
    }

    /// Number of pages currently cached.
    pub fn cached_page_count(&self) -> usize {
        self.state.lock().directory.len()
    }

    pub fn contains_page(&self, file: &PagedFile, page_id: PageId) -> bool {
        self.state.lock().directory.lookup(file, page_id).is_ok()
    }

    /// Pin count of a cached page, or `None` if it is not cached.
    pub fn pin_count(&self, file: &PagedFile, page_id: PageId) -> Option<u32> {
        let state = self.state.lock();
        let frame_id = state.directory.lookup(file, page_id).ok()?;
        Some(state.descriptors[frame_id.0].pin_count)
    }

    /// Dirty flag of a cached page, or `None` if it is not cached.
    pub fn is_dirty(&self, file: &PagedFile, page_id: PageId) -> Option<bool> {
        let state = self.state.lock();
        let frame_id = state.directory.lookup(file, page_id).ok()?;
        Some(state.descriptors[frame_id.0].dirty)
    }

    /// Check that the directory and the frame descriptors agree.
    ///
    /// Every valid frame must be registered under its own `(file, page)`,
    /// every directory entry must point at a valid frame holding that page,
    /// and invalid frames must be fully cleared.
    ///
    /// # Errors
    /// `Error::BadBuffer` naming the first inconsistent frame.
    pub fn check_invariants(&self) -> Result<()> {
        let state = self.state.lock();

        let mut valid = 0usize;
        for desc in &state.descriptors {
            if desc.valid {
                valid += 1;
                let registered = desc
                    .file
                    .as_ref()
                    .and_then(|file| state.directory.lookup(file, desc.page_id).ok());
                if registered != Some(desc.frame_id) {
                    return Err(bad_buffer(desc));
                }
            } else if desc.file.is_some() || desc.is_pinned() || desc.dirty {
                return Err(bad_buffer(desc));
            }
        }

        for (&(file_id, page_id), &frame_id) in state.directory.iter() {
            let desc = &state.descriptors[frame_id.0];
            let matches = desc.valid
                && desc.page_id == page_id
                && desc.file.as_ref().is_some_and(|f| f.id() == file_id);
            if !matches {
                return Err(bad_buffer(desc));
            }
        }

        if valid != state.directory.len() {
            return Err(Error::BadBuffer {
                frame_id: FrameId::new(state.clock.hand()),
                dirty: false,
                valid: false,
                ref_bit: false,
            });
        }
        Ok(())
    }

    // ========================================================================
    // Internal
    // ========================================================================

    #[inline]
    pub(crate) fn frame(&self, frame_id: FrameId) -> &Frame {
        &self.frames[frame_id.0]
    }

    /// Mark a frame dirty without touching its pin count.
    pub(crate) fn mark_frame_dirty(&self, frame_id: FrameId) {
        self.state.lock().descriptors[frame_id.0].dirty = true;
    }

    /// Claim a frame with the clock, writing back and unregistering a valid
    /// victim. The returned frame is invalid.
    fn alloc_buf(&self, state: &mut BufferState) -> Result<FrameId> {
        let frame_id = state
            .clock
            .pick_victim(&mut state.descriptors)
            .ok_or(Error::BufferExceeded)?;

        let desc = &mut state.descriptors[frame_id.0];
        if !desc.valid {
            return Ok(frame_id);
        }

        let Some(file) = desc.file.clone() else {
            return Err(bad_buffer(desc));
        };
        if desc.dirty {
            file.write_page(desc.page_id, &self.frames[frame_id.0].page())?;
            state.stats.pages_written += 1;
            debug!(
                "evicting dirty {} of {} from {}",
                desc.page_id,
                file.filename(),
                frame_id
            );
        } else {
            trace!("evicting {} of {} from {}", desc.page_id, file.filename(), frame_id);
        }

        state.directory.remove(&file, desc.page_id)?;
        desc.clear();
        state.stats.evictions += 1;
        Ok(frame_id)
    }
}

impl Drop for BufferManager {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        let mut written = 0usize;

        for desc in state.descriptors.iter_mut().filter(|d| d.valid && d.dirty) {
            let Some(file) = desc.file.as_ref() else {
                continue;
            };
            match file.write_page(desc.page_id, &self.frames[desc.frame_id.0].page()) {
                Ok(()) => {
                    desc.dirty = false;
                    written += 1;
                }
                Err(e) => warn!(
                    "failed to write back {} of {} on shutdown: {}",
                    desc.page_id,
                    file.filename(),
                    e
                ),
            }
        }

        if written > 0 {
            debug!("buffer manager shutdown wrote back {} dirty pages", written);
        }
    }
}

fn bad_buffer(desc: &FrameDescriptor) -> Error {
    Error::BadBuffer {
        frame_id: desc.frame_id,
        dirty: desc.dirty,
        valid: desc.valid,
        ref_bit: desc.ref_bit,
    }
}
