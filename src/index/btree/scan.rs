//! Range scans over the leaf chain.
//!
//! A scan moves through these states:
//! ```text
//! Inactive ──start_scan──▶ Active ──scan_next──▶ Active ... ──▶ Exhausted
//!     ▲                                                             │
//!     └──────────────────────────── end_scan ◀──────────────────────┘
//! ```
//! While active, the current leaf stays pinned.

use log::{debug, trace, warn};

use crate::buffer::PageGuard;
use crate::common::{Error, PageId, RecordId, Result};
use crate::index::Operator;

use super::node::{InternalNode, LeafNode};
use super::tree::BTreeIndex;

/// Cursor of an active scan.
pub(super) struct ScanState<'a> {
    /// Pinned leaf holding the next entry; `None` once exhausted.
    leaf: Option<PageGuard<'a>>,
    /// Sibling that could not be pinned when the previous leaf ran out.
    pending_leaf: Option<PageId>,
    next_entry: usize,
    high: i32,
    high_op: Operator,
}

impl<'a> ScanState<'a> {
    /// Continue on `next` if its first key is still in range.
    fn enter(&mut self, next: PageGuard<'a>) {
        let first_key = {
            let page = next.data();
            let leaf = LeafNode::new(page.as_slice());
            (!leaf.is_empty()).then(|| leaf.key(0))
        };
        if first_key.is_some_and(|key| self.high_op.admits(key, self.high)) {
            trace!("scan moved to {}", next.page_id());
            self.leaf = Some(next);
            self.next_entry = 0;
        }
    }
}

impl<'a> BTreeIndex<'a> {
    /// Position a scan on the first entry in the range.
    ///
    /// Any active scan is ended first.
    ///
    /// # Errors
    /// - `Error::BadOpcodes` unless `low_op` is `Gt`/`Gte` and `high_op` is `Lt`/`Lte`
    /// - `Error::BadScanRange` if `low > high`
    /// - `Error::NoSuchKeyFound` if no entry is in the range; no scan is left active
    pub fn start_scan(
        &mut self,
        low: i32,
        low_op: Operator,
        high: i32,
        high_op: Operator,
    ) -> Result<()> {
        if !low_op.is_low_bound() || !high_op.is_high_bound() {
            return Err(Error::BadOpcodes);
        }
        if low > high {
            return Err(Error::BadScanRange { low, high });
        }
        if self.scan.is_some() {
            self.end_scan()?;
        }

        let mut page_id = self.meta.root;
        let mut is_leaf = self.meta.height == 1;
        while !is_leaf {
            let guard = self.bm.read_page(&self.file, page_id)?;
            let page = guard.data();
            let node = InternalNode::new(page.as_slice());
            is_leaf = node.children_are_leaves();
            page_id = node.child(node.child_index(low));
        }

        let mut guard = self.bm.read_page(&self.file, page_id)?;
        loop {
            let (first, sibling) = {
                let page = guard.data();
                let leaf = LeafNode::new(page.as_slice());
                let first = (0..leaf.len())
                    .find(|&i| low_op.admits(leaf.key(i), low))
                    .map(|i| (i, leaf.key(i)));
                (first, leaf.right_sibling())
            };

            match first {
                Some((slot, key)) => {
                    if !high_op.admits(key, high) {
                        return Err(Error::NoSuchKeyFound);
                    }
                    debug!(
                        "{}: scan {:?} {} .. {:?} {} starts at {} slot {}",
                        self.index_name(),
                        low_op,
                        low,
                        high_op,
                        high,
                        guard.page_id(),
                        slot
                    );
                    self.scan = Some(ScanState {
                        leaf: Some(guard),
                        pending_leaf: None,
                        next_entry: slot,
                        high,
                        high_op,
                    });
                    return Ok(());
                }
                None if sibling.is_valid() => {
                    guard = self.bm.read_page(&self.file, sibling)?;
                }
                None => return Err(Error::NoSuchKeyFound),
            }
        }
    }

    /// Return the next record id in the range.
    ///
    /// If the next leaf cannot be pinned after an entry was read, the entry
    /// is still returned and the following call retries the pin.
    ///
    /// # Errors
    /// - `Error::ScanNotInitialized` without an active scan
    /// - `Error::IndexScanCompleted` once every entry in the range was returned
    /// - buffer errors from pinning the next leaf; the scan keeps its position
    pub fn scan_next(&mut self) -> Result<RecordId> {
        let scan = self.scan.as_mut().ok_or(Error::ScanNotInitialized)?;
        if let Some(sibling) = scan.pending_leaf {
            let next = self.bm.read_page(&self.file, sibling)?;
            scan.pending_leaf = None;
            scan.enter(next);
        }
        let Some(guard) = scan.leaf.as_ref() else {
            return Err(Error::IndexScanCompleted);
        };

        let (rid, next_key, sibling) = {
            let page = guard.data();
            let leaf = LeafNode::new(page.as_slice());
            let next = scan.next_entry + 1;
            let next_key = (next < leaf.len()).then(|| leaf.key(next));
            (leaf.rid(scan.next_entry), next_key, leaf.right_sibling())
        };

        match next_key {
            Some(key) => {
                scan.next_entry += 1;
                if !scan.high_op.admits(key, scan.high) {
                    scan.leaf = None;
                }
            }
            None => {
                // Unpin the finished leaf before pinning the next one.
                scan.leaf = None;
                if sibling.is_valid() {
                    match self.bm.read_page(&self.file, sibling) {
                        Ok(next) => scan.enter(next),
                        Err(e) => {
                            warn!("scan could not pin {}, retrying on next call: {}", sibling, e);
                            scan.pending_leaf = Some(sibling);
                        }
                    }
                }
            }
        }

        if scan.leaf.is_none() && scan.pending_leaf.is_none() {
            trace!("{}: scan exhausted", self.index_name());
        }
        Ok(rid)
    }

    /// Finish the active scan and unpin its leaf.
    ///
    /// # Errors
    /// `Error::ScanNotInitialized` without an active scan.
    pub fn end_scan(&mut self) -> Result<()> {
        let scan = self.scan.take().ok_or(Error::ScanNotInitialized)?;
        if let Some(guard) = scan.leaf {
            guard.unpin()?;
        }
        debug!("{}: scan ended", self.index_name());
        Ok(())
    }

    /// Whether a scan is active (possibly exhausted).
    pub fn scan_active(&self) -> bool {
        self.scan.is_some()
    }

    /// Leaf the active scan is positioned on, if any.
    pub fn scan_leaf(&self) -> Option<PageId> {
        self.scan
            .as_ref()
            .and_then(|scan| scan.leaf.as_ref())
            .map(PageGuard::page_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferManager;
    use crate::common::config::IndexConfig;
    use crate::index::btree::META_PAGE;
    use crate::index::Datatype;
    use crate::storage::RelationFile;
    use tempfile::{tempdir, TempDir};

    fn build<'a>(bm: &'a BufferManager, keys: &[i32], leaf_capacity: usize) -> (TempDir, BTreeIndex<'a>) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scan_rel");
        let rel = RelationFile::create(&path).unwrap();
        for key in keys {
            rel.insert_record(bm, &key.to_le_bytes()).unwrap();
        }
        bm.flush_file(rel.paged_file()).unwrap();

        let config = IndexConfig::default()
            .with_leaf_capacity(leaf_capacity)
            .unwrap();
        let index = BTreeIndex::open_with_config(bm, &path, 0, Datatype::Integer, config).unwrap();
        (dir, index)
    }

    fn collect(index: &mut BTreeIndex<'_>) -> Vec<RecordId> {
        let mut out = Vec::new();
        loop {
            match index.scan_next() {
                Ok(rid) => out.push(rid),
                Err(Error::IndexScanCompleted) => break,
                Err(e) => panic!("unexpected error {}", e),
            }
        }
        out
    }

    #[test]
    fn test_scan_across_leaves() {
        let bm = BufferManager::new(10);
        let (_dir, mut index) = build(&bm, &[10, 20, 30, 40, 50], 4);

        index.start_scan(15, Operator::Gte, 45, Operator::Lte).unwrap();
        let rids = collect(&mut index);
        // Records are stored in key order, one slot each on page 1.
        let slots: Vec<u16> = rids.iter().map(|rid| rid.slot_number).collect();
        assert_eq!(slots, vec![1, 2, 3]);

        assert!(matches!(index.scan_next(), Err(Error::IndexScanCompleted)));
        index.end_scan().unwrap();
    }

    #[test]
    fn test_strict_bounds() {
        let bm = BufferManager::new(10);
        let (_dir, mut index) = build(&bm, &[10, 20, 30, 40, 50], 4);

        index.start_scan(20, Operator::Gt, 50, Operator::Lt).unwrap();
        let slots: Vec<u16> = collect(&mut index).iter().map(|r| r.slot_number).collect();
        assert_eq!(slots, vec![2, 3]);
        index.end_scan().unwrap();
    }

    #[test]
    fn test_bad_arguments_touch_nothing() {
        let bm = BufferManager::new(10);
        let (_dir, mut index) = build(&bm, &[1, 2, 3], 4);
        let misses = bm.stats().cache_misses;

        assert!(matches!(
            index.start_scan(50, Operator::Gt, 10, Operator::Lt),
            Err(Error::BadScanRange { low: 50, high: 10 })
        ));
        assert!(matches!(
            index.start_scan(1, Operator::Lt, 10, Operator::Lt),
            Err(Error::BadOpcodes)
        ));
        assert!(matches!(
            index.start_scan(1, Operator::Gt, 10, Operator::Gte),
            Err(Error::BadOpcodes)
        ));
        assert_eq!(bm.stats().cache_misses, misses);
        assert!(!index.scan_active());
    }

    #[test]
    fn test_no_such_key() {
        let bm = BufferManager::new(10);
        let (_dir, mut index) = build(&bm, &[10, 20, 30, 40, 50], 4);

        assert!(matches!(
            index.start_scan(21, Operator::Gte, 29, Operator::Lte),
            Err(Error::NoSuchKeyFound)
        ));
        assert!(matches!(
            index.start_scan(50, Operator::Gt, 100, Operator::Lte),
            Err(Error::NoSuchKeyFound)
        ));
        assert!(!index.scan_active());
    }

    #[test]
    fn test_scan_state_errors() {
        let bm = BufferManager::new(10);
        let (_dir, mut index) = build(&bm, &[1, 2, 3], 4);

        assert!(matches!(index.scan_next(), Err(Error::ScanNotInitialized)));
        assert!(matches!(index.end_scan(), Err(Error::ScanNotInitialized)));

        index.start_scan(1, Operator::Gte, 1, Operator::Lte).unwrap();
        assert!(index.scan_next().is_ok());
        assert!(matches!(index.scan_next(), Err(Error::IndexScanCompleted)));
        index.end_scan().unwrap();
        assert!(matches!(index.end_scan(), Err(Error::ScanNotInitialized)));
    }

    #[test]
    fn test_restart_ends_previous_scan() {
        let bm = BufferManager::new(10);
        let (_dir, mut index) = build(&bm, &[10, 20, 30, 40, 50], 4);

        index.start_scan(10, Operator::Gte, 50, Operator::Lte).unwrap();
        let first_leaf = index.scan_leaf().unwrap();
        assert_eq!(bm.pin_count(index.paged_file(), first_leaf), Some(1));

        index.start_scan(40, Operator::Gte, 50, Operator::Lte).unwrap();
        assert_eq!(bm.pin_count(index.paged_file(), first_leaf), Some(0));
        assert_eq!(collect(&mut index).len(), 2);
    }

    #[test]
    fn test_scan_keeps_position_when_next_leaf_unavailable() {
        let bm = BufferManager::new(10);
        let (dir, index) = build(&bm, &[10, 20, 30, 40, 50], 4);
        index.close().unwrap();

        let small = BufferManager::new(2);
        let mut index =
            BTreeIndex::open(&small, dir.path().join("scan_rel"), 0, Datatype::Integer).unwrap();
        index.start_scan(10, Operator::Gte, 50, Operator::Lte).unwrap();
        let first_leaf = index.scan_leaf().unwrap();

        // Hold both frames so the second leaf cannot be brought in.
        let leaf_pin = small.read_page(index.paged_file(), first_leaf).unwrap();
        let meta_pin = small.read_page(index.paged_file(), META_PAGE).unwrap();

        let slots: Vec<u16> = (0..3)
            .map(|_| index.scan_next().unwrap().slot_number)
            .collect();
        assert_eq!(slots, vec![0, 1, 2]);
        assert!(matches!(index.scan_next(), Err(Error::BufferExceeded)));
        assert!(index.scan_active());

        drop(leaf_pin);
        drop(meta_pin);
        let rest: Vec<u16> = collect(&mut index).iter().map(|r| r.slot_number).collect();
        assert_eq!(rest, vec![3, 4]);
        index.end_scan().unwrap();
    }

    #[test]
    fn test_exhausted_scan_releases_leaf() {
        let bm = BufferManager::new(10);
        let (_dir, mut index) = build(&bm, &[10, 20, 30, 40, 50], 4);

        index.start_scan(10, Operator::Gte, 50, Operator::Lte).unwrap();
        assert_eq!(collect(&mut index).len(), 5);
        assert_eq!(index.scan_leaf(), None);

        let file = index.paged_file().clone();
        for page in 1..file.page_count() {
            assert_eq!(bm.pin_count(&file, PageId::new(page)).unwrap_or(0), 0);
        }
        index.end_scan().unwrap();
    }
}
