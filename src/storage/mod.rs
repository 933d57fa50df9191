//! Storage layer - disk I/O and page formats.
//!
//! This module handles persistent storage:
//! - [`PagedFile`] - Low-level file I/O in fixed-size pages
//! - [`RelationFile`] / [`FileScan`] - Heap files of records
//! - [`page`] - Page types and layouts

pub mod page;
mod paged_file;
mod relation_file;

pub use paged_file::PagedFile;
pub use relation_file::{FileScan, RelationFile, MAX_RECORD_SIZE};
