//! Buffer management.
//!
//! The buffer manager is the in-memory cache layer between the index and
//! relation code and the paged files. It manages a fixed pool of frames,
//! each holding one page of one file.
//!
//! # Components
//! - [`BufferManager`] - The main page cache
//! - [`Directory`] - `(file, page)` to frame lookup
//! - [`Frame`] / [`FrameDescriptor`] - A slot in the pool and its bookkeeping
//! - [`PageGuard`] - RAII pin on a page
//! - [`BufferStats`] - Counters
//! - [`replacer`] - The clock eviction policy

mod buffer_manager;
mod directory;
mod frame;
mod page_guard;
pub mod replacer;
mod stats;

pub use buffer_manager::BufferManager;
pub use directory::Directory;
pub use frame::{Frame, FrameDescriptor};
pub use page_guard::PageGuard;
pub use stats::BufferStats;
