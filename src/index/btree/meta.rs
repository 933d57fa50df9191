//! Index meta page.

use crate::common::config::{check_capacity, PAGE_HEADER_SIZE, RELATION_NAME_LEN};
use crate::common::config::{MAX_LEAF_CAPACITY, MAX_NODE_CAPACITY};
use crate::common::{Error, PageId, Result};
use crate::index::Datatype;
use crate::storage::page::{read_u16, read_u32, write_u16, write_u32, PageHeader, PageType};

const OFFSET_RELATION_NAME: usize = PAGE_HEADER_SIZE;
const OFFSET_ATTR_BYTE_OFFSET: usize = OFFSET_RELATION_NAME + RELATION_NAME_LEN;
const OFFSET_ATTR_TYPE: usize = OFFSET_ATTR_BYTE_OFFSET + 4;
const OFFSET_HEIGHT: usize = OFFSET_ATTR_TYPE + 4;
const OFFSET_ROOT: usize = OFFSET_HEIGHT + 4;
const OFFSET_LEAF_CAPACITY: usize = OFFSET_ROOT + 4;
const OFFSET_NODE_CAPACITY: usize = OFFSET_LEAF_CAPACITY + 2;

/// Contents of page 1 of an index file.
///
/// # Layout
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 0       8     page header
/// 8       20    relation name (zero padded)
/// 28      4     attribute byte offset
/// 32      1     attribute type (3 bytes padding)
/// 36      4     height (1 = root is a leaf)
/// 40      4     root page number
/// 44      2     leaf capacity
/// 46      2     internal node capacity
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexMeta {
    pub relation_name: [u8; RELATION_NAME_LEN],
    pub attr_byte_offset: usize,
    pub attr_type: Datatype,
    pub height: u32,
    pub root: PageId,
    pub leaf_capacity: usize,
    pub node_capacity: usize,
}

impl IndexMeta {
    /// Encode a relation name the way the meta page stores it.
    pub fn encode_name(name: &str) -> [u8; RELATION_NAME_LEN] {
        let mut bytes = [0u8; RELATION_NAME_LEN];
        let len = name.len().min(RELATION_NAME_LEN);
        bytes[..len].copy_from_slice(&name.as_bytes()[..len]);
        bytes
    }

    /// Stored relation name with the padding removed.
    pub fn relation_name(&self) -> String {
        let end = self
            .relation_name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(RELATION_NAME_LEN);
        String::from_utf8_lossy(&self.relation_name[..end]).into_owned()
    }

    /// Decode a meta page.
    ///
    /// # Errors
    /// `Error::BadIndexInfo` if the page is not a well-formed meta page.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if PageHeader::from_bytes(data).page_type != PageType::IndexMeta {
            return Err(Error::BadIndexInfo("page 1 is not an index meta page".into()));
        }

        let mut relation_name = [0u8; RELATION_NAME_LEN];
        relation_name.copy_from_slice(
            &data[OFFSET_RELATION_NAME..OFFSET_RELATION_NAME + RELATION_NAME_LEN],
        );

        let attr_type = Datatype::from_u8(data[OFFSET_ATTR_TYPE]).ok_or_else(|| {
            Error::BadIndexInfo(format!("unknown attribute type {}", data[OFFSET_ATTR_TYPE]))
        })?;

        let height = read_u32(data, OFFSET_HEIGHT);
        let root = PageId::new(read_u32(data, OFFSET_ROOT));
        if height == 0 || !root.is_valid() {
            return Err(Error::BadIndexInfo(format!(
                "corrupt tree shape: height {} root {}",
                height, root
            )));
        }

        let capacity = |kind, offset, max| {
            check_capacity(kind, read_u16(data, offset) as usize, max)
                .map_err(|e| Error::BadIndexInfo(e.to_string()))
        };

        Ok(Self {
            relation_name,
            attr_byte_offset: read_u32(data, OFFSET_ATTR_BYTE_OFFSET) as usize,
            attr_type,
            height,
            root,
            leaf_capacity: capacity("leaf", OFFSET_LEAF_CAPACITY, MAX_LEAF_CAPACITY)?,
            node_capacity: capacity("node", OFFSET_NODE_CAPACITY, MAX_NODE_CAPACITY)?,
        })
    }

    pub fn write_to(&self, data: &mut [u8]) {
        PageHeader::new(PageType::IndexMeta).write_to(data);
        data[OFFSET_RELATION_NAME..OFFSET_RELATION_NAME + RELATION_NAME_LEN]
            .copy_from_slice(&self.relation_name);
        write_u32(data, OFFSET_ATTR_BYTE_OFFSET, self.attr_byte_offset as u32);
        data[OFFSET_ATTR_TYPE..OFFSET_HEIGHT].fill(0);
        data[OFFSET_ATTR_TYPE] = self.attr_type as u8;
        write_u32(data, OFFSET_HEIGHT, self.height);
        write_u32(data, OFFSET_ROOT, self.root.0);
        write_u16(data, OFFSET_LEAF_CAPACITY, self.leaf_capacity as u16);
        write_u16(data, OFFSET_NODE_CAPACITY, self.node_capacity as u16);
    }
}
