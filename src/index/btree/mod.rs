//! B+Tree index.
//!
//! # Components
//! - [`BTreeIndex`] - Construction, insertion and tree walks
//! - Range scans (`start_scan` / `scan_next` / `end_scan`)
//! - [`IndexMeta`] - The meta page at page 1 of each index file
//! - [`LeafNode`] / [`InternalNode`] - Node layouts over page bytes

mod meta;
mod node;
mod scan;
mod tree;

pub use meta::IndexMeta;
pub use node::{InternalNode, LeafNode, SENTINEL_KEY};
pub use tree::{BTreeIndex, META_PAGE};
