//! Leaf and internal node layouts.
//!
//! Nodes are views over the bytes of a pinned page. A view over `&[u8]`
//! reads; a view over `&mut [u8]` also writes.
//!
//! # Leaf Layout
//! ```text
//! ┌────────┬─────────┬──────────────────────┬──────────────────────────┐
//! │ header │ sibling │ keys [LEAF_SLOTS]    │ rids [LEAF_SLOTS]        │
//! │  (8)   │  (u32)  │ i32 each             │ (page u32, slot u16, 2)  │
//! └────────┴─────────┴──────────────────────┴──────────────────────────┘
//! ```
//!
//! # Internal Layout
//! ```text
//! ┌────────┬─────────┬──────────────────────┬──────────────────────────┐
//! │ header │ level   │ keys [NODE_SLOTS]    │ children [NODE_SLOTS+1]  │
//! │  (8)   │  (u32)  │ i32 each             │ u32 each                 │
//! └────────┴─────────┴──────────────────────┴──────────────────────────┘
//! ```
//!
//! Entries are contiguous from slot 0. Unused key slots hold
//! [`SENTINEL_KEY`]; unused record ids and children hold page 0. Occupancy
//! is the position of the first invalid record id (leaf) or child (internal).

use crate::common::config::{LEAF_SLOTS, NODE_SLOTS, PAGE_HEADER_SIZE, PAGE_SIZE};
use crate::common::{PageId, RecordId};
use crate::storage::page::{read_i32, read_u32, write_i32, write_u32, PageHeader, PageType};

/// Key stored in unused slots.
pub const SENTINEL_KEY: i32 = i32::MAX;

const OFFSET_SIBLING: usize = PAGE_HEADER_SIZE;
const LEAF_KEYS: usize = OFFSET_SIBLING + 4;
const LEAF_RIDS: usize = LEAF_KEYS + LEAF_SLOTS * 4;

const OFFSET_LEVEL: usize = PAGE_HEADER_SIZE;
const NODE_KEYS: usize = OFFSET_LEVEL + 4;
const NODE_CHILDREN: usize = NODE_KEYS + NODE_SLOTS * 4;

const _: () = assert!(LEAF_RIDS + LEAF_SLOTS * RecordId::SIZE <= PAGE_SIZE);
const _: () = assert!(NODE_CHILDREN + (NODE_SLOTS + 1) * 4 <= PAGE_SIZE);

/// Leaf node view.
pub struct LeafNode<B> {
    data: B,
}

impl<B: AsRef<[u8]>> LeafNode<B> {
    pub fn new(data: B) -> Self {
        Self { data }
    }

    #[inline]
    fn bytes(&self) -> &[u8] {
        self.data.as_ref()
    }

    /// Number of occupied entries.
    pub fn len(&self) -> usize {
        (0..LEAF_SLOTS)
            .position(|i| !self.rid(i).is_valid())
            .unwrap_or(LEAF_SLOTS)
    }

    pub fn is_empty(&self) -> bool {
        !self.rid(0).is_valid()
    }

    #[inline]
    pub fn key(&self, i: usize) -> i32 {
        read_i32(self.bytes(), LEAF_KEYS + i * 4)
    }

    #[inline]
    pub fn rid(&self, i: usize) -> RecordId {
        let offset = LEAF_RIDS + i * RecordId::SIZE;
        RecordId::from_bytes(&self.bytes()[offset..offset + RecordId::SIZE])
    }

    pub fn right_sibling(&self) -> PageId {
        PageId::new(read_u32(self.bytes(), OFFSET_SIBLING))
    }

    /// First slot whose key is `>= key`, or `len()` if there is none.
    pub fn lower_bound(&self, key: i32) -> usize {
        let len = self.len();
        let mut lo = 0;
        let mut hi = len;
        while lo < hi {
            let mid = (lo + hi) / 2;
            if self.key(mid) < key {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    }

    pub fn keys(&self) -> Vec<i32> {
        (0..self.len()).map(|i| self.key(i)).collect()
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> LeafNode<B> {
    #[inline]
    fn bytes_mut(&mut self) -> &mut [u8] {
        self.data.as_mut()
    }

    /// Format an empty leaf with no right sibling.
    pub fn init(&mut self) {
        let data = self.bytes_mut();
        PageHeader::new(PageType::BTreeLeaf).write_to(data);
        write_u32(data, OFFSET_SIBLING, PageId::INVALID.0);
        self.truncate(0);
    }

    pub fn set_right_sibling(&mut self, sibling: PageId) {
        write_u32(self.bytes_mut(), OFFSET_SIBLING, sibling.0);
    }

    pub fn set_entry(&mut self, i: usize, key: i32, rid: RecordId) {
        let data = self.bytes_mut();
        write_i32(data, LEAF_KEYS + i * 4, key);
        let offset = LEAF_RIDS + i * RecordId::SIZE;
        rid.write_to(&mut data[offset..offset + RecordId::SIZE]);
    }

    /// Insert an entry at slot `i`, shifting later entries right.
    ///
    /// # Panics
    /// Panics if every physical slot is occupied.
    pub fn insert_at(&mut self, i: usize, key: i32, rid: RecordId) {
        let len = self.len();
        assert!(len < LEAF_SLOTS, "leaf overflow");

        let data = self.bytes_mut();
        data.copy_within(LEAF_KEYS + i * 4..LEAF_KEYS + len * 4, LEAF_KEYS + (i + 1) * 4);
        data.copy_within(
            LEAF_RIDS + i * RecordId::SIZE..LEAF_RIDS + len * RecordId::SIZE,
            LEAF_RIDS + (i + 1) * RecordId::SIZE,
        );
        self.set_entry(i, key, rid);
    }

    /// Keep the first `len` entries and reset the rest to sentinels.
    pub fn truncate(&mut self, len: usize) {
        for i in len..LEAF_SLOTS {
            self.set_entry(i, SENTINEL_KEY, RecordId::INVALID);
        }
    }
}

/// Internal node view.
pub struct InternalNode<B> {
    data: B,
}

impl<B: AsRef<[u8]>> InternalNode<B> {
    pub fn new(data: B) -> Self {
        Self { data }
    }

    #[inline]
    fn bytes(&self) -> &[u8] {
        self.data.as_ref()
    }

    /// Number of keys. A node with `n` keys has `n + 1` children.
    pub fn len(&self) -> usize {
        (0..=NODE_SLOTS)
            .position(|i| !self.child(i).is_valid())
            .map_or(NODE_SLOTS, |children| children.saturating_sub(1))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 1 if the children are leaves, 0 otherwise.
    pub fn level(&self) -> u32 {
        read_u32(self.bytes(), OFFSET_LEVEL)
    }

    #[inline]
    pub fn children_are_leaves(&self) -> bool {
        self.level() == 1
    }

    #[inline]
    pub fn key(&self, i: usize) -> i32 {
        read_i32(self.bytes(), NODE_KEYS + i * 4)
    }

    #[inline]
    pub fn child(&self, i: usize) -> PageId {
        PageId::new(read_u32(self.bytes(), NODE_CHILDREN + i * 4))
    }

    /// Index of the child whose range holds `key`: the first child whose
    /// separator exceeds `key`, or the last child.
    pub fn child_index(&self, key: i32) -> usize {
        let len = self.len();
        let mut lo = 0;
        let mut hi = len;
        while lo < hi {
            let mid = (lo + hi) / 2;
            if self.key(mid) <= key {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> InternalNode<B> {
    #[inline]
    fn bytes_mut(&mut self) -> &mut [u8] {
        self.data.as_mut()
    }

    /// Format an empty internal node at `level`.
    pub fn init(&mut self, level: u32) {
        let data = self.bytes_mut();
        PageHeader::new(PageType::BTreeInternal).write_to(data);
        write_u32(data, OFFSET_LEVEL, level);
        for i in 0..NODE_SLOTS {
            write_i32(data, NODE_KEYS + i * 4, SENTINEL_KEY);
        }
        for i in 0..=NODE_SLOTS {
            write_u32(data, NODE_CHILDREN + i * 4, PageId::INVALID.0);
        }
    }

    pub fn set_key(&mut self, i: usize, key: i32) {
        write_i32(self.bytes_mut(), NODE_KEYS + i * 4, key);
    }

    pub fn set_child(&mut self, i: usize, child: PageId) {
        write_u32(self.bytes_mut(), NODE_CHILDREN + i * 4, child.0);
    }

    /// Insert `key` at slot `i` with `right` as the child after it.
    ///
    /// # Panics
    /// Panics if every physical key slot is occupied.
    pub fn insert_at(&mut self, i: usize, key: i32, right: PageId) {
        let len = self.len();
        assert!(len < NODE_SLOTS, "internal node overflow");

        let data = self.bytes_mut();
        data.copy_within(NODE_KEYS + i * 4..NODE_KEYS + len * 4, NODE_KEYS + (i + 1) * 4);
        data.copy_within(
            NODE_CHILDREN + (i + 1) * 4..NODE_CHILDREN + (len + 1) * 4,
            NODE_CHILDREN + (i + 2) * 4,
        );
        self.set_key(i, key);
        self.set_child(i + 1, right);
    }

    /// Keep the first `len` keys and `len + 1` children.
    pub fn truncate(&mut self, len: usize) {
        for i in len..NODE_SLOTS {
            self.set_key(i, SENTINEL_KEY);
        }
        for i in len + 1..=NODE_SLOTS {
            self.set_child(i, PageId::INVALID);
        }
    }
}
