//! Error types for keelstore.

use thiserror::Error;

use super::{FrameId, PageId, RecordId};

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// All errors surfaced by the storage engine.
///
/// None of these are transient: they mean either a misused API (wrong call
/// order, bad arguments) or an exhausted resource, so nothing is retried
/// internally.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from the underlying file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The page was never allocated in the file or has been deleted.
    #[error("{page_id} not found in file {file}")]
    PageNotFound { file: String, page_id: PageId },

    /// Stored checksum does not match the page contents.
    #[error("checksum mismatch on {page_id} in file {file}")]
    ChecksumMismatch { file: String, page_id: PageId },

    /// The file is not a paged file (bad header).
    #[error("invalid paged file {0}")]
    InvalidFile(String),

    // --- buffer layer ---
    /// Directory lookup miss. Used to tell a cache miss from a hit and never
    /// escapes the buffer manager.
    #[error("no directory entry for {page_id} of {file}")]
    HashNotFound { file: String, page_id: PageId },

    /// A page was registered in the directory twice.
    #[error("directory entry for {page_id} of {file} already present")]
    HashAlreadyPresent { file: String, page_id: PageId },

    /// Every frame is pinned.
    #[error("buffer pool exceeded: all frames are pinned")]
    BufferExceeded,

    /// Unpin called on a page whose pin count is already zero.
    #[error("{page_id} of {file} in {frame_id} is not pinned")]
    PageNotPinned {
        file: String,
        page_id: PageId,
        frame_id: FrameId,
    },

    /// A page is still pinned where it must not be.
    #[error("{page_id} of {file} in {frame_id} is still pinned")]
    PagePinned {
        file: String,
        page_id: PageId,
        frame_id: FrameId,
    },

    /// A frame descriptor is in an inconsistent state.
    #[error("bad buffer state in {frame_id}: dirty={dirty} valid={valid} ref_bit={ref_bit}")]
    BadBuffer {
        frame_id: FrameId,
        dirty: bool,
        valid: bool,
        ref_bit: bool,
    },

    // --- index layer ---
    /// Scan operators outside {Gt, Gte} for the low bound or {Lt, Lte} for the high bound.
    #[error("malformed scan operators")]
    BadOpcodes,

    /// Low bound of a scan is greater than its high bound.
    #[error("invalid scan range: low {low} > high {high}")]
    BadScanRange { low: i32, high: i32 },

    /// No entry satisfies the requested scan range.
    #[error("no key satisfies the scan range")]
    NoSuchKeyFound,

    /// `scan_next` or `end_scan` without an active scan.
    #[error("scan not initialized")]
    ScanNotInitialized,

    /// `scan_next` after the last qualifying entry.
    #[error("index scan completed")]
    IndexScanCompleted,

    /// A relation scan ran past its last record.
    #[error("end of relation")]
    EndOfRelation,

    /// Index parameters do not match the index file, or are unsupported.
    #[error("bad index info: {0}")]
    BadIndexInfo(String),

    /// The key is already present in the index.
    #[error("duplicate key {0}")]
    DuplicateKey(i32),

    /// The record id is the invalid sentinel and cannot be stored in a leaf.
    #[error("cannot index the invalid record id {0}")]
    InvalidRecordId(RecordId),

    /// An `IndexConfig` value is out of range.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    // --- relation files ---
    /// A record does not fit in an empty relation page.
    #[error("record of {0} bytes is too large for a page")]
    RecordTooLarge(usize),

    /// A record is too short to hold the indexed attribute.
    #[error("record {len} bytes long has no attribute at offset {offset}")]
    RecordTooShort { len: usize, offset: usize },
}
