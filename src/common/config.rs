//! Configuration for keelstore.
//!
//! Compile-time layout constants plus [`IndexConfig`], the runtime knobs of
//! a B+Tree index.

use super::{Error, Result};

/// Size of a page in bytes (4KB).
pub const PAGE_SIZE: usize = 4096;

/// Bytes reserved at the start of every page for the page header.
pub const PAGE_HEADER_SIZE: usize = 8;

/// Frames in a buffer manager created with [`BufferManager::with_default_frames`].
///
/// [`BufferManager::with_default_frames`]: crate::buffer::BufferManager::with_default_frames
pub const DEFAULT_BUFFER_FRAMES: usize = 100;

/// Bytes of the relation name kept in an index meta page.
pub const RELATION_NAME_LEN: usize = 20;

/// Physical key slots in a leaf node.
///
/// # Layout
/// header (8) + right sibling (4) + `LEAF_SLOTS` × (key 4 + record id 8)
pub const LEAF_SLOTS: usize = (PAGE_SIZE - PAGE_HEADER_SIZE - 4) / 12;

/// Physical key slots in an internal node. There is one more child slot.
///
/// # Layout
/// header (8) + level (4) + `NODE_SLOTS` × key 4 + (`NODE_SLOTS` + 1) × child 4
pub const NODE_SLOTS: usize = (PAGE_SIZE - PAGE_HEADER_SIZE - 4 - 4) / 8;

/// Largest leaf capacity. One physical slot stays free so an insert can
/// overflow by one entry before the split.
pub const MAX_LEAF_CAPACITY: usize = LEAF_SLOTS - 1;

/// Largest internal node capacity, in keys.
pub const MAX_NODE_CAPACITY: usize = NODE_SLOTS - 1;

/// Smallest capacity that still splits into two non-empty halves.
pub const MIN_CAPACITY: usize = 2;

/// Node geometry of a B+Tree index.
///
/// Capacities are only applied when an index file is created; a reopened
/// index uses the capacities recorded in its meta page.
///
/// # Example
/// ```
/// use keelstore::IndexConfig;
///
/// let config = IndexConfig::default().with_leaf_capacity(4).unwrap();
/// assert_eq!(config.leaf_capacity(), 4);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexConfig {
    leaf_capacity: usize,
    node_capacity: usize,
}

impl IndexConfig {
    /// Maximum `(key, record id)` entries per leaf.
    #[inline]
    pub const fn leaf_capacity(&self) -> usize {
        self.leaf_capacity
    }

    /// Maximum keys per internal node.
    #[inline]
    pub const fn node_capacity(&self) -> usize {
        self.node_capacity
    }

    pub fn with_leaf_capacity(mut self, capacity: usize) -> Result<Self> {
        self.leaf_capacity = check_capacity("leaf", capacity, MAX_LEAF_CAPACITY)?;
        Ok(self)
    }

    pub fn with_node_capacity(mut self, capacity: usize) -> Result<Self> {
        self.node_capacity = check_capacity("node", capacity, MAX_NODE_CAPACITY)?;
        Ok(self)
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            leaf_capacity: MAX_LEAF_CAPACITY,
            node_capacity: MAX_NODE_CAPACITY,
        }
    }
}

pub(crate) fn check_capacity(kind: &str, capacity: usize, max: usize) -> Result<usize> {
    if (MIN_CAPACITY..=max).contains(&capacity) {
        Ok(capacity)
    } else {
        Err(Error::InvalidConfig(format!(
            "{} capacity {} outside {}..={}",
            kind, capacity, MIN_CAPACITY, max
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_size_is_power_of_two() {
        assert!(PAGE_SIZE.is_power_of_two());
    }

    #[test]
    fn test_node_layouts_fit_in_page() {
        assert!(PAGE_HEADER_SIZE + 4 + LEAF_SLOTS * 12 <= PAGE_SIZE);
        assert!(PAGE_HEADER_SIZE + 4 + NODE_SLOTS * 4 + (NODE_SLOTS + 1) * 4 <= PAGE_SIZE);
        assert_eq!(LEAF_SLOTS, 340);
        assert_eq!(NODE_SLOTS, 510);
    }

    #[test]
    fn test_default_uses_largest_capacities() {
        let config = IndexConfig::default();
        assert_eq!(config.leaf_capacity(), MAX_LEAF_CAPACITY);
        assert_eq!(config.node_capacity(), MAX_NODE_CAPACITY);
    }

    #[test]
    fn test_capacity_bounds() {
        assert!(IndexConfig::default().with_leaf_capacity(1).is_err());
        assert!(IndexConfig::default().with_leaf_capacity(MAX_LEAF_CAPACITY + 1).is_err());
        assert!(IndexConfig::default().with_node_capacity(MAX_NODE_CAPACITY + 1).is_err());

        let config = IndexConfig::default()
            .with_leaf_capacity(2)
            .and_then(|c| c.with_node_capacity(3))
            .unwrap();
        assert_eq!(config.leaf_capacity(), 2);
        assert_eq!(config.node_capacity(), 3);
    }
}
