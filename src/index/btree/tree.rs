//! B+Tree index: construction, insertion and tree walks.

use std::path::{Path, PathBuf};

use log::{debug, info, trace, warn};

use crate::buffer::{BufferManager, PageGuard};
use crate::common::config::IndexConfig;
use crate::common::{Error, PageId, RecordId, Result};
use crate::index::Datatype;
use crate::storage::page::read_i32;
use crate::storage::{PagedFile, RelationFile, MAX_RECORD_SIZE};

use super::meta::IndexMeta;
use super::node::{InternalNode, LeafNode};
use super::scan::ScanState;

/// Page number of the meta page in every index file.
pub const META_PAGE: PageId = PageId(1);

/// A separator key and the new right page produced by a split.
type Split = (i32, PageId);

/// Secondary index over one `i32` attribute of a relation.
///
/// The index lives in its own paged file named `<relation>.<offset>` next to
/// the relation file, and reaches every page through the buffer manager.
///
/// # Usage
/// ```ignore
/// let bm = BufferManager::new(100);
/// let mut index = BTreeIndex::open(&bm, "employees", 0, Datatype::Integer)?;
///
/// index.start_scan(10, Operator::Gte, 20, Operator::Lt)?;
/// while let Ok(rid) = index.scan_next() {
///     // ...
/// }
/// index.end_scan()?;
/// ```
///
/// Keys are unique. Inserting while a scan is active may leave the cursor
/// pointing at shifted entries.
pub struct BTreeIndex<'a> {
    pub(super) bm: &'a BufferManager,
    pub(super) file: PagedFile,
    index_name: String,
    pub(super) meta: IndexMeta,
    pub(super) scan: Option<ScanState<'a>>,
    closed: bool,
}

impl<'a> BTreeIndex<'a> {
    /// Open the index on `attr_byte_offset` of the relation at
    /// `relation_path`, building it if the index file doesn't exist yet.
    pub fn open<P: AsRef<Path>>(
        bm: &'a BufferManager,
        relation_path: P,
        attr_byte_offset: usize,
        attr_type: Datatype,
    ) -> Result<Self> {
        Self::open_with_config(
            bm,
            relation_path,
            attr_byte_offset,
            attr_type,
            IndexConfig::default(),
        )
    }

    /// Like [`open`](Self::open), choosing node capacities for a new index.
    ///
    /// An existing index keeps the capacities it was built with.
    ///
    /// # Errors
    /// - `Error::BadIndexInfo` if the type is not `Integer`, the offset leaves
    ///   no room for the attribute, or an existing index file was built for a
    ///   different relation, offset or type
    /// - `Error::RecordTooShort` if a record ends before the attribute
    /// - `Error::DuplicateKey` if two records share a key
    /// - buffer and file errors
    pub fn open_with_config<P: AsRef<Path>>(
        bm: &'a BufferManager,
        relation_path: P,
        attr_byte_offset: usize,
        attr_type: Datatype,
        config: IndexConfig,
    ) -> Result<Self> {
        let relation_path = relation_path.as_ref();
        if attr_type != Datatype::Integer {
            return Err(Error::BadIndexInfo(format!(
                "{:?} attributes cannot be indexed",
                attr_type
            )));
        }
        if attr_byte_offset + 4 > MAX_RECORD_SIZE {
            return Err(Error::BadIndexInfo(format!(
                "attribute offset {} past the largest record",
                attr_byte_offset
            )));
        }

        let relation_name = relation_path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                Error::BadIndexInfo(format!("bad relation path {}", relation_path.display()))
            })?;
        let index_name = format!("{}.{}", relation_name, attr_byte_offset);
        let index_path = relation_path.with_file_name(&index_name);

        let expected = IndexMeta {
            relation_name: IndexMeta::encode_name(relation_name),
            attr_byte_offset,
            attr_type,
            height: 1,
            root: PageId::INVALID,
            leaf_capacity: config.leaf_capacity(),
            node_capacity: config.node_capacity(),
        };

        if PagedFile::exists(&index_path) {
            Self::reopen(bm, index_path, index_name, &expected)
        } else {
            let relation = RelationFile::open(relation_path)?;
            Self::build(bm, index_path, index_name, expected, &relation)
        }
    }

    fn reopen(
        bm: &'a BufferManager,
        index_path: PathBuf,
        index_name: String,
        expected: &IndexMeta,
    ) -> Result<Self> {
        let file = PagedFile::open(&index_path)?;
        let meta = {
            let guard = bm.read_page(&file, META_PAGE)?;
            let page = guard.data();
            IndexMeta::from_bytes(page.as_slice())?
        };

        if meta.relation_name != expected.relation_name
            || meta.attr_byte_offset != expected.attr_byte_offset
            || meta.attr_type != expected.attr_type
        {
            return Err(Error::BadIndexInfo(format!(
                "{} was built for {} offset {} {:?}",
                index_name,
                meta.relation_name(),
                meta.attr_byte_offset,
                meta.attr_type
            )));
        }

        info!(
            "reopened index {}: height {}, root {}",
            index_name, meta.height, meta.root
        );
        Ok(Self {
            bm,
            file,
            index_name,
            meta,
            scan: None,
            closed: false,
        })
    }

    fn build(
        bm: &'a BufferManager,
        index_path: PathBuf,
        index_name: String,
        mut meta: IndexMeta,
        relation: &RelationFile,
    ) -> Result<Self> {
        let file = PagedFile::create(&index_path)?;

        let result = Self::init_pages(bm, &file, &index_name, &mut meta).and_then(|()| {
            let mut index = Self {
                bm,
                file: file.clone(),
                index_name,
                meta,
                scan: None,
                closed: false,
            };
            index.bulk_load(relation)?;
            index.flush()?;
            Ok(index)
        });

        match result {
            Ok(index) => Ok(index),
            Err(e) => {
                // Nothing of the removed file may stay cached.
                if let Err(flush_err) = bm.flush_file(&file) {
                    warn!("failed to flush partial index {}: {}", file.filename(), flush_err);
                }
                drop(file);
                if let Err(remove_err) = std::fs::remove_file(&index_path) {
                    warn!(
                        "failed to remove partial index {}: {}",
                        index_path.display(),
                        remove_err
                    );
                }
                Err(e)
            }
        }
    }

    /// Lay out the meta page and an empty root leaf in a new index file.
    fn init_pages(
        bm: &BufferManager,
        file: &PagedFile,
        index_name: &str,
        meta: &mut IndexMeta,
    ) -> Result<()> {
        let mut meta_guard = bm.alloc_page(file)?;
        if meta_guard.page_id() != META_PAGE {
            return Err(Error::BadIndexInfo(format!(
                "new index file {} did not start at {}",
                index_name, META_PAGE
            )));
        }
        let mut root_guard = bm.alloc_page(file)?;
        LeafNode::new(root_guard.data_mut().as_mut_slice()).init();
        meta.root = root_guard.page_id();
        meta.write_to(meta_guard.data_mut().as_mut_slice());
        Ok(())
    }

    fn bulk_load(&mut self, relation: &RelationFile) -> Result<()> {
        let offset = self.meta.attr_byte_offset;
        let mut scan = relation.scan(self.bm);
        let mut loaded = 0usize;

        loop {
            let (rid, record) = match scan.scan_next() {
                Ok(entry) => entry,
                Err(Error::EndOfRelation) => break,
                Err(e) => return Err(e),
            };
            if record.len() < offset + 4 {
                return Err(Error::RecordTooShort {
                    len: record.len(),
                    offset,
                });
            }
            self.insert_entry(read_i32(&record, offset), rid)?;
            loaded += 1;
        }

        info!(
            "built index {} from {}: {} entries, height {}",
            self.index_name,
            relation.filename(),
            loaded,
            self.meta.height
        );
        Ok(())
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// File name of the index, `<relation>.<offset>`.
    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    /// Levels in the tree; 1 while the root is a leaf.
    pub fn height(&self) -> u32 {
        self.meta.height
    }

    pub fn root_page(&self) -> PageId {
        self.meta.root
    }

    pub fn leaf_capacity(&self) -> usize {
        self.meta.leaf_capacity
    }

    pub fn node_capacity(&self) -> usize {
        self.meta.node_capacity
    }

    pub fn attr_byte_offset(&self) -> usize {
        self.meta.attr_byte_offset
    }

    pub fn attr_type(&self) -> Datatype {
        self.meta.attr_type
    }

    pub fn paged_file(&self) -> &PagedFile {
        &self.file
    }

    // ========================================================================
    // Insertion
    // ========================================================================

    /// Insert a `(key, record id)` entry.
    ///
    /// # Errors
    /// - `Error::DuplicateKey` if `key` is already indexed; the tree is unchanged
    /// - `Error::InvalidRecordId` for `RecordId::INVALID`; the tree is unchanged
    /// - buffer errors (a node whose split cannot claim a page is left as it
    ///   was, but splits further up are not rolled back)
    pub fn insert_entry(&mut self, key: i32, rid: RecordId) -> Result<()> {
        if !rid.is_valid() {
            return Err(Error::InvalidRecordId(rid));
        }
        let root_is_leaf = self.meta.height == 1;
        if let Some((separator, right)) = self.insert_into(self.meta.root, root_is_leaf, key, rid)? {
            self.grow_root(separator, right)?;
        }
        Ok(())
    }

    fn insert_into(
        &self,
        page_id: PageId,
        is_leaf: bool,
        key: i32,
        rid: RecordId,
    ) -> Result<Option<Split>> {
        let mut guard = self.bm.read_page(&self.file, page_id)?;
        if is_leaf {
            return self.insert_into_leaf(&mut guard, key, rid);
        }

        let (slot, child, child_is_leaf, full) = {
            let page = guard.data();
            let node = InternalNode::new(page.as_slice());
            let slot = node.child_index(key);
            (
                slot,
                node.child(slot),
                node.children_are_leaves(),
                node.len() >= self.meta.node_capacity,
            )
        };

        let Some((separator, right)) = self.insert_into(child, child_is_leaf, key, rid)? else {
            return Ok(None);
        };

        // Claim the new node before touching this one.
        let right_guard = if full {
            Some(self.bm.alloc_page(&self.file)?)
        } else {
            None
        };

        let mut page = guard.data_mut();
        let mut node = InternalNode::new(page.as_mut_slice());
        node.insert_at(slot, separator, right);
        Ok(right_guard.map(|right_guard| self.split_internal(page_id, &mut node, right_guard)))
    }

    fn insert_into_leaf(
        &self,
        guard: &mut PageGuard<'_>,
        key: i32,
        rid: RecordId,
    ) -> Result<Option<Split>> {
        let (slot, full) = {
            let page = guard.data();
            let leaf = LeafNode::new(page.as_slice());
            let slot = leaf.lower_bound(key);
            if slot < leaf.len() && leaf.key(slot) == key {
                return Err(Error::DuplicateKey(key));
            }
            (slot, leaf.len() >= self.meta.leaf_capacity)
        };

        // Claim the sibling before touching the leaf, so a failed allocation
        // leaves the leaf as it was.
        let right_guard = if full {
            Some(self.bm.alloc_page(&self.file)?)
        } else {
            None
        };

        let page_id = guard.page_id();
        let mut page = guard.data_mut();
        let mut leaf = LeafNode::new(page.as_mut_slice());
        leaf.insert_at(slot, key, rid);
        Ok(right_guard.map(|right_guard| self.split_leaf(page_id, &mut leaf, right_guard)))
    }

    /// Move the upper half of an overfull leaf into `right_guard`, a freshly
    /// allocated page that becomes its right sibling.
    fn split_leaf(
        &self,
        page_id: PageId,
        leaf: &mut LeafNode<&mut [u8]>,
        mut right_guard: PageGuard<'_>,
    ) -> Split {
        let right_id = right_guard.page_id();
        let mut right_page = right_guard.data_mut();
        let mut right = LeafNode::new(right_page.as_mut_slice());
        right.init();

        let len = leaf.len();
        let keep = (len + 1) / 2;
        for (j, i) in (keep..len).enumerate() {
            right.set_entry(j, leaf.key(i), leaf.rid(i));
        }
        right.set_right_sibling(leaf.right_sibling());
        leaf.set_right_sibling(right_id);
        leaf.truncate(keep);

        let separator = right.key(0);
        debug!(
            "{}: split leaf {} at key {} into {} ({} + {} entries)",
            self.index_name,
            page_id,
            separator,
            right_id,
            keep,
            len - keep
        );
        (separator, right_id)
    }

    /// Move the upper half of an overfull internal node into `right_guard`,
    /// pushing the middle key up.
    fn split_internal(
        &self,
        page_id: PageId,
        node: &mut InternalNode<&mut [u8]>,
        mut right_guard: PageGuard<'_>,
    ) -> Split {
        let right_id = right_guard.page_id();
        let mut right_page = right_guard.data_mut();
        let mut right = InternalNode::new(right_page.as_mut_slice());
        right.init(node.level());

        let len = node.len();
        let mid = len / 2;
        let separator = node.key(mid);
        for (j, i) in (mid + 1..len).enumerate() {
            right.set_key(j, node.key(i));
        }
        for (j, i) in (mid + 1..=len).enumerate() {
            right.set_child(j, node.child(i));
        }
        node.truncate(mid);

        debug!(
            "{}: split internal {} at key {} into {}",
            self.index_name, page_id, separator, right_id
        );
        (separator, right_id)
    }

    /// Replace the root with a new internal node over the old root and its
    /// new sibling.
    fn grow_root(&mut self, separator: i32, right: PageId) -> Result<()> {
        let level = if self.meta.height == 1 { 1 } else { 0 };

        let mut guard = self.bm.alloc_page(&self.file)?;
        let new_root = guard.page_id();
        {
            let mut page = guard.data_mut();
            let mut node = InternalNode::new(page.as_mut_slice());
            node.init(level);
            node.set_child(0, self.meta.root);
            node.set_key(0, separator);
            node.set_child(1, right);
        }
        drop(guard);

        let old_root = self.meta.root;
        self.meta.root = new_root;
        self.meta.height += 1;
        self.write_meta()?;

        info!(
            "{}: root {} split, new root {} at height {}",
            self.index_name, old_root, new_root, self.meta.height
        );
        Ok(())
    }

    fn write_meta(&self) -> Result<()> {
        let mut guard = self.bm.read_page(&self.file, META_PAGE)?;
        self.meta.write_to(guard.data_mut().as_mut_slice());
        Ok(())
    }

    // ========================================================================
    // Tree walks
    // ========================================================================

    /// Page of the leftmost leaf.
    pub(super) fn leftmost_leaf(&self) -> Result<PageId> {
        let mut page_id = self.meta.root;
        let mut is_leaf = self.meta.height == 1;
        while !is_leaf {
            let guard = self.bm.read_page(&self.file, page_id)?;
            let page = guard.data();
            let node = InternalNode::new(page.as_slice());
            is_leaf = node.children_are_leaves();
            page_id = node.child(0);
        }
        Ok(page_id)
    }

    /// Keys of every leaf, left to right along the sibling chain.
    pub fn leaf_keys(&self) -> Result<Vec<Vec<i32>>> {
        let mut leaves = Vec::new();
        let mut page_id = self.leftmost_leaf()?;
        while page_id.is_valid() {
            let guard = self.bm.read_page(&self.file, page_id)?;
            let page = guard.data();
            let leaf = LeafNode::new(page.as_slice());
            leaves.push(leaf.keys());
            page_id = leaf.right_sibling();
        }
        trace!("{}: walked {} leaves", self.index_name, leaves.len());
        Ok(leaves)
    }

    // ========================================================================
    // Shutdown
    // ========================================================================

    fn flush(&mut self) -> Result<()> {
        self.scan = None;
        self.bm.flush_file(&self.file)
    }

    /// End any scan and flush the index file.
    pub fn close(mut self) -> Result<()> {
        self.flush()?;
        self.closed = true;
        Ok(())
    }
}

impl Drop for BTreeIndex<'_> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = self.flush() {
            warn!("failed to flush index {}: {}", self.index_name, e);
        }
    }
}
