//! keelstore - a clock buffer manager and a B+Tree index over paged files.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          keelstore                              │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │              Index Layer (index/)                        │   │
//! │  │   BTreeIndex: bulk load, insert + split, range scans     │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │              Buffer Layer (buffer/)                      │   │
//! │  │   BufferManager + Directory + Clock + PageGuard          │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │              Storage Layer (storage/)                    │   │
//! │  │   PagedFile + RelationFile + Page + PageHeader           │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (PageId, FrameId, RecordId, Error, config)
//! - [`buffer`] - Buffer management and the clock replacer
//! - [`storage`] - Paged files, relation files and page formats
//! - [`index`] - The B+Tree index
//!
//! # Quick Start
//! ```no_run
//! use keelstore::{BTreeIndex, BufferManager, Datatype, Operator, RelationFile};
//!
//! let bm = BufferManager::new(64);
//! let relation = RelationFile::create("employees").unwrap();
//! for id in 0..100i32 {
//!     relation.insert_record(&bm, &id.to_le_bytes()).unwrap();
//! }
//! bm.flush_file(relation.paged_file()).unwrap();
//!
//! let mut index = BTreeIndex::open(&bm, "employees", 0, Datatype::Integer).unwrap();
//! index.start_scan(10, Operator::Gte, 20, Operator::Lt).unwrap();
//! while let Ok(rid) = index.scan_next() {
//!     println!("{}", rid);
//! }
//! index.end_scan().unwrap();
//! ```

pub mod buffer;
pub mod common;
pub mod index;
pub mod storage;

// Re-export commonly used items at crate root for convenience
pub use common::config::{IndexConfig, PAGE_SIZE};
pub use common::{Error, FileId, FrameId, PageId, RecordId, Result};

pub use buffer::{BufferManager, BufferStats, PageGuard};
pub use index::{BTreeIndex, Datatype, Operator};
pub use storage::page::{Page, PageHeader, PageType};
pub use storage::{FileScan, PagedFile, RelationFile};
