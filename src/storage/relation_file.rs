//! Relation files - heap files of variable-length records.
//!
//! Records live in slotted data pages read through the buffer manager. The
//! B+Tree bulk load walks a relation with [`FileScan`]; tests and tools fill
//! one with [`RelationFile::insert_record`].

use std::path::Path;

use log::trace;

use crate::buffer::BufferManager;
use crate::common::config::PAGE_SIZE;
use crate::common::{Error, PageId, RecordId, Result};
use crate::storage::page::{read_u16, write_u16, PageType};
use crate::storage::PagedFile;

const OFFSET_SLOT_COUNT: usize = 8;
const OFFSET_FREE_END: usize = 10;
const SLOTS_START: usize = 12;
const SLOT_SIZE: usize = 4;

/// Largest record a data page can hold.
pub const MAX_RECORD_SIZE: usize = PAGE_SIZE - SLOTS_START - SLOT_SIZE;

/// Slotted data page layout over raw page bytes.
///
/// ```text
/// ┌────────┬──────────┬──────────┬──────────────┬─────────┬─────────┐
/// │ header │ slot_cnt │ free_end │ slots ...  → │  free   │ ← data  │
/// │  (8)   │  (u16)   │  (u16)   │ (off, len)   │         │         │
/// └────────┴──────────┴──────────┴──────────────┴─────────┴─────────┘
/// ```
struct SlottedPage;

impl SlottedPage {
    fn init(data: &mut [u8]) {
        write_u16(data, OFFSET_SLOT_COUNT, 0);
        write_u16(data, OFFSET_FREE_END, PAGE_SIZE as u16);
    }

    fn slot_count(data: &[u8]) -> u16 {
        read_u16(data, OFFSET_SLOT_COUNT)
    }

    fn free_space(data: &[u8]) -> usize {
        let free_end = read_u16(data, OFFSET_FREE_END) as usize;
        let slots_end = SLOTS_START + Self::slot_count(data) as usize * SLOT_SIZE;
        free_end.saturating_sub(slots_end)
    }

    fn insert(data: &mut [u8], record: &[u8]) -> Option<u16> {
        if Self::free_space(data) < record.len() + SLOT_SIZE {
            return None;
        }

        let slot = Self::slot_count(data);
        let start = read_u16(data, OFFSET_FREE_END) as usize - record.len();
        data[start..start + record.len()].copy_from_slice(record);

        let slot_offset = SLOTS_START + slot as usize * SLOT_SIZE;
        write_u16(data, slot_offset, start as u16);
        write_u16(data, slot_offset + 2, record.len() as u16);
        write_u16(data, OFFSET_SLOT_COUNT, slot + 1);
        write_u16(data, OFFSET_FREE_END, start as u16);
        Some(slot)
    }

    fn get(data: &[u8], slot: u16) -> Option<&[u8]> {
        if slot >= Self::slot_count(data) {
            return None;
        }
        let slot_offset = SLOTS_START + slot as usize * SLOT_SIZE;
        let start = read_u16(data, slot_offset) as usize;
        let len = read_u16(data, slot_offset + 2) as usize;
        data.get(start..start + len)
    }
}

/// A heap file of records.
#[derive(Debug, Clone)]
pub struct RelationFile {
    file: PagedFile,
}

impl RelationFile {
    /// Create an empty relation.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self {
            file: PagedFile::create(path)?,
        })
    }

    /// Open an existing relation.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self {
            file: PagedFile::open(path)?,
        })
    }

    /// The underlying paged file, for flushing through the buffer manager.
    pub fn paged_file(&self) -> &PagedFile {
        &self.file
    }

    pub fn filename(&self) -> &str {
        self.file.filename()
    }

    /// Append a record, starting a new page when the last one is full.
    ///
    /// # Errors
    /// - `Error::RecordTooLarge` if the record can't fit in an empty page
    /// - buffer and file errors
    pub fn insert_record(&self, bm: &BufferManager, record: &[u8]) -> Result<RecordId> {
        if record.len() > MAX_RECORD_SIZE {
            return Err(Error::RecordTooLarge(record.len()));
        }

        let page_count = self.file.page_count();
        if page_count > 1 {
            let last = PageId::new(page_count - 1);
            match bm.read_page(&self.file, last) {
                Ok(mut guard) => {
                    if guard.data().page_type() == PageType::Data {
                        let slot = SlottedPage::insert(guard.data_mut().as_mut_slice(), record);
                        if let Some(slot) = slot {
                            return Ok(RecordId::new(last, slot));
                        }
                    }
                }
                // Last page is on the free list.
                Err(Error::PageNotFound { .. }) => {}
                Err(e) => return Err(e),
            }
        }

        let mut guard = bm.alloc_page(&self.file)?;
        let page_id = guard.page_id();
        let mut page = guard.data_mut();
        page.set_page_type(PageType::Data);
        SlottedPage::init(page.as_mut_slice());
        let slot = SlottedPage::insert(page.as_mut_slice(), record)
            .ok_or(Error::RecordTooLarge(record.len()))?;

        trace!("{}: started data {}", self.file.filename(), page_id);
        Ok(RecordId::new(page_id, slot))
    }

    /// Fetch one record by id.
    ///
    /// # Errors
    /// `Error::PageNotFound` if the id does not name a stored record.
    pub fn get_record(&self, bm: &BufferManager, rid: RecordId) -> Result<Vec<u8>> {
        let guard = bm.read_page(&self.file, rid.page_number)?;
        let page = guard.data();
        let not_found = || Error::PageNotFound {
            file: self.file.filename().to_string(),
            page_id: rid.page_number,
        };
        if page.page_type() != PageType::Data {
            return Err(not_found());
        }
        SlottedPage::get(page.as_slice(), rid.slot_number)
            .map(<[u8]>::to_vec)
            .ok_or_else(not_found)
    }

    /// Sequential scan over every record, in page then slot order.
    pub fn scan<'a>(&self, bm: &'a BufferManager) -> FileScan<'a> {
        FileScan {
            bm,
            file: self.file.clone(),
            page_id: PageId::FIRST,
            slot: 0,
        }
    }
}

/// Cursor over the records of a relation.
///
/// Pages are pinned only for the duration of each call.
pub struct FileScan<'a> {
    bm: &'a BufferManager,
    file: PagedFile,
    page_id: PageId,
    slot: u16,
}

impl FileScan<'_> {
    /// Yield the next record and its id.
    ///
    /// # Errors
    /// `Error::EndOfRelation` once every record has been returned.
    pub fn scan_next(&mut self) -> Result<(RecordId, Vec<u8>)> {
        loop {
            if self.page_id.0 >= self.file.page_count() {
                return Err(Error::EndOfRelation);
            }

            let guard = match self.bm.read_page(&self.file, self.page_id) {
                Ok(guard) => guard,
                Err(Error::PageNotFound { .. }) => {
                    self.next_page();
                    continue;
                }
                Err(e) => return Err(e),
            };

            let page = guard.data();
            if page.page_type() == PageType::Data {
                if let Some(record) = SlottedPage::get(page.as_slice(), self.slot) {
                    let rid = RecordId::new(self.page_id, self.slot);
                    self.slot += 1;
                    return Ok((rid, record.to_vec()));
                }
            }
            drop(page);
            self.next_page();
        }
    }

    fn next_page(&mut self) {
        self.page_id = PageId::new(self.page_id.0 + 1);
        self.slot = 0;
    }
}

impl Iterator for FileScan<'_> {
    type Item = Result<(RecordId, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.scan_next() {
            Err(Error::EndOfRelation) => None,
            other => Some(other),
        }
    }
}
