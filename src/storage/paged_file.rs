//! Paged file - low-level file I/O for fixed-size pages.
//!
//! A [`PagedFile`] stores pages of [`PAGE_SIZE`] bytes and hands them out by
//! page number. It is the only code in the crate that touches the disk; the
//! buffer manager sits on top of it.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use log::{debug, trace};
use parking_lot::{const_mutex, Mutex};

use crate::common::config::PAGE_SIZE;
use crate::common::{Error, FileId, PageId, Result};
use crate::storage::page::{read_u32, write_u32, Page, PageType};

const FILE_MAGIC: u32 = 0x4C45_454B;

const OFFSET_MAGIC: usize = 8;
const OFFSET_PAGE_COUNT: usize = 12;
const OFFSET_FIRST_FREE: usize = 16;
const OFFSET_NEXT_FREE: usize = 8;

/// Live handles by canonical path. `open` hands out the existing handle for a
/// path so one physical file has one identity in the buffer manager.
static OPEN_FILES: Mutex<BTreeMap<PathBuf, Weak<Inner>>> = const_mutex(BTreeMap::new());

/// Handle to an open paged file.
///
/// # File Layout
/// ```text
/// ┌─────────────┬─────────┬─────────┬─────────┐
/// │ Page 0      │ Page 1  │ Page 2  │  ...    │
/// │ file header │ data    │ data    │         │
/// └─────────────┴─────────┴─────────┴─────────┘
/// Offset:  0        4096      8192
/// ```
///
/// The header page records the magic number, the number of pages in the
/// file and the head of the free list. Deleted pages are chained through
/// that list and reused by [`allocate_page`](Self::allocate_page).
///
/// Handles are cheap to clone; clones share the underlying file and compare
/// equal. Identity is per file: opening a path that already has a live
/// handle returns that handle, so cached pages are shared between them.
///
/// # Durability
/// Writes go to the OS without `fsync`; [`sync`](Self::sync) makes them
/// durable. The buffer manager syncs a file at the end of `flush_file`.
#[derive(Clone)]
pub struct PagedFile {
    inner: Arc<Inner>,
}

struct Inner {
    id: FileId,
    path: PathBuf,
    canonical: PathBuf,
    name: String,
    state: Mutex<FileState>,
}

struct FileState {
    file: File,
    /// Pages in the file, header included.
    page_count: u32,
    /// Head of the free list.
    first_free: PageId,
}

impl PagedFile {
    /// Create a new paged file.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;
        let canonical = fs::canonicalize(path)?;

        let mut state = FileState {
            file,
            page_count: 1,
            first_free: PageId::INVALID,
        };
        state.write_header()?;
        debug!("created paged file {}", path.display());

        // A stale entry can remain if the path was removed while a handle
        // to the old file was still alive.
        let mut open_files = OPEN_FILES.lock();
        Ok(Self::register(&mut open_files, path, canonical, state))
    }

    /// Open an existing paged file.
    ///
    /// If a handle to the same file is still alive, that handle is returned.
    ///
    /// # Errors
    /// Returns an error if the file doesn't exist or its header is not valid.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let canonical = fs::canonicalize(path)?;

        let mut open_files = OPEN_FILES.lock();
        if let Some(inner) = open_files.get(&canonical).and_then(Weak::upgrade) {
            trace!("{}: reusing open handle", inner.name);
            return Ok(Self { inner });
        }

        let mut file = OpenOptions::new().read(true).write(true).open(path)?;

        let mut header = Page::new();
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(header.as_mut_slice())
            .map_err(|_| Error::InvalidFile(path.display().to_string()))?;

        let data = header.as_slice();
        if header.page_type() != PageType::FileHeader
            || read_u32(data, OFFSET_MAGIC) != FILE_MAGIC
            || !header.verify_checksum()
        {
            return Err(Error::InvalidFile(path.display().to_string()));
        }

        let state = FileState {
            file,
            page_count: read_u32(data, OFFSET_PAGE_COUNT),
            first_free: PageId::new(read_u32(data, OFFSET_FIRST_FREE)),
        };
        debug!(
            "opened paged file {} with {} pages",
            path.display(),
            state.page_count
        );

        Ok(Self::register(&mut open_files, path, canonical, state))
    }

    /// Whether a file exists at `path`.
    pub fn exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().exists()
    }

    fn register(
        open_files: &mut BTreeMap<PathBuf, Weak<Inner>>,
        path: &Path,
        canonical: PathBuf,
        state: FileState,
    ) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let inner = Arc::new(Inner {
            id: FileId::next(),
            path: path.to_path_buf(),
            canonical: canonical.clone(),
            name,
            state: Mutex::new(state),
        });
        open_files.insert(canonical, Arc::downgrade(&inner));
        Self { inner }
    }

    /// Identity used by the buffer manager's directory.
    #[inline]
    pub fn id(&self) -> FileId {
        self.inner.id
    }

    /// File name without directories.
    #[inline]
    pub fn filename(&self) -> &str {
        &self.inner.name
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Pages in the file, including the header page and free pages.
    pub fn page_count(&self) -> u32 {
        self.inner.state.lock().page_count
    }

    /// Allocate a new zeroed page and return its number.
    ///
    /// Pages on the free list are reused before the file is extended.
    pub fn allocate_page(&self) -> Result<PageId> {
        let mut state = self.inner.state.lock();

        let page_id = if state.first_free.is_valid() {
            let page_id = state.first_free;
            let mut free = Page::new();
            state.read_raw(page_id, &mut free)?;
            state.first_free = PageId::new(read_u32(free.as_slice(), OFFSET_NEXT_FREE));
            page_id
        } else {
            let page_id = PageId::new(state.page_count);
            state.page_count += 1;
            page_id
        };

        let mut page = Page::new();
        page.update_checksum();
        state.write_raw(page_id, &page)?;
        state.write_header()?;

        trace!("{}: allocated {}", self.inner.name, page_id);
        Ok(page_id)
    }

    /// Read a page into `page`.
    ///
    /// # Errors
    /// - `Error::PageNotFound` if the page was never allocated or was deleted
    /// - `Error::ChecksumMismatch` if the stored bytes are corrupt
    pub fn read_page(&self, page_id: PageId, page: &mut Page) -> Result<()> {
        let mut state = self.inner.state.lock();
        self.check_bounds(&state, page_id)?;

        state.read_raw(page_id, page)?;
        if !page.verify_checksum() {
            return Err(Error::ChecksumMismatch {
                file: self.inner.name.clone(),
                page_id,
            });
        }
        if page.page_type() == PageType::Free {
            return Err(self.not_found(page_id));
        }
        Ok(())
    }

    /// Write a page, stamping its checksum on the way out.
    ///
    /// # Errors
    /// Returns `Error::PageNotFound` if the page hasn't been allocated.
    pub fn write_page(&self, page_id: PageId, page: &Page) -> Result<()> {
        let mut state = self.inner.state.lock();
        self.check_bounds(&state, page_id)?;

        let mut stamped = Page::new();
        stamped.copy_from(page);
        stamped.update_checksum();
        state.write_raw(page_id, &stamped)
    }

    /// Delete a page, putting it on the free list.
    ///
    /// # Errors
    /// Returns `Error::PageNotFound` if the page is not allocated.
    pub fn delete_page(&self, page_id: PageId) -> Result<()> {
        let mut state = self.inner.state.lock();
        self.check_bounds(&state, page_id)?;

        let mut page = Page::new();
        state.read_raw(page_id, &mut page)?;
        if page.page_type() == PageType::Free {
            return Err(self.not_found(page_id));
        }

        page.reset();
        page.set_page_type(PageType::Free);
        write_u32(page.as_mut_slice(), OFFSET_NEXT_FREE, state.first_free.0);
        page.update_checksum();
        state.write_raw(page_id, &page)?;

        state.first_free = page_id;
        state.write_header()?;

        trace!("{}: deleted {}", self.inner.name, page_id);
        Ok(())
    }

    /// Flush OS buffers for this file to stable storage.
    pub fn sync(&self) -> Result<()> {
        self.inner.state.lock().file.sync_all()?;
        Ok(())
    }

    fn check_bounds(&self, state: &FileState, page_id: PageId) -> Result<()> {
        if !page_id.is_valid() || page_id.0 >= state.page_count {
            return Err(self.not_found(page_id));
        }
        Ok(())
    }

    fn not_found(&self, page_id: PageId) -> Error {
        Error::PageNotFound {
            file: self.inner.name.clone(),
            page_id,
        }
    }
}

impl FileState {
    fn read_raw(&mut self, page_id: PageId, page: &mut Page) -> Result<()> {
        self.file.seek(SeekFrom::Start(page_id.file_offset(PAGE_SIZE)))?;
        self.file.read_exact(page.as_mut_slice())?;
        Ok(())
    }

    fn write_raw(&mut self, page_id: PageId, page: &Page) -> Result<()> {
        self.file.seek(SeekFrom::Start(page_id.file_offset(PAGE_SIZE)))?;
        self.file.write_all(page.as_slice())?;
        Ok(())
    }

    fn write_header(&mut self) -> Result<()> {
        let mut header = Page::new();
        header.set_page_type(PageType::FileHeader);
        let data = header.as_mut_slice();
        write_u32(data, OFFSET_MAGIC, FILE_MAGIC);
        write_u32(data, OFFSET_PAGE_COUNT, self.page_count);
        write_u32(data, OFFSET_FIRST_FREE, self.first_free.0);
        header.update_checksum();
        self.write_raw(PageId::new(0), &header)
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let mut open_files = OPEN_FILES.lock();
        // Only drop the entry if it still points at this (now dead) handle.
        if open_files
            .get(&self.canonical)
            .is_some_and(|weak| weak.strong_count() == 0)
        {
            open_files.remove(&self.canonical);
        }
    }
}

impl PartialEq for PagedFile {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for PagedFile {}

impl fmt::Debug for PagedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PagedFile")
            .field("id", &self.inner.id)
            .field("path", &self.inner.path)
            .finish()
    }
}
