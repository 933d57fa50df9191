//! Record identifier type.

use std::fmt;

use super::PageId;

/// Locates a record inside a relation file: the page it lives on and its
/// slot within that page.
///
/// # Encoding
/// 8 bytes little-endian: page number (`u32`), slot number (`u16`), 2 bytes
/// padding. A record id whose page is [`PageId::INVALID`] is the sentinel
/// that marks unused leaf slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId {
    pub page_number: PageId,
    pub slot_number: u16,
}

impl RecordId {
    /// Encoded size in bytes.
    pub const SIZE: usize = 8;

    /// The "no record" marker.
    pub const INVALID: RecordId = RecordId {
        page_number: PageId::INVALID,
        slot_number: 0,
    };

    pub fn new(page_number: PageId, slot_number: u16) -> Self {
        Self {
            page_number,
            slot_number,
        }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.page_number.is_valid()
    }

    /// Decode from the first [`RecordId::SIZE`] bytes of `data`.
    pub fn from_bytes(data: &[u8]) -> Self {
        let page = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
        let slot = u16::from_le_bytes([data[4], data[5]]);
        Self::new(PageId::new(page), slot)
    }

    /// Encode into the first [`RecordId::SIZE`] bytes of `data`.
    pub fn write_to(&self, data: &mut [u8]) {
        data[0..4].copy_from_slice(&self.page_number.0.to_le_bytes());
        data[4..6].copy_from_slice(&self.slot_number.to_le_bytes());
        data[6..8].fill(0);
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rid({}, {})", self.page_number.0, self.slot_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_id_byte_layout() {
        let rid = RecordId::new(PageId::new(0x0403_0201), 0x0605);
        let mut buf = [0xFFu8; RecordId::SIZE];
        rid.write_to(&mut buf);

        assert_eq!(buf, [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0, 0]);
        assert_eq!(RecordId::from_bytes(&buf), rid);
    }

    #[test]
    fn test_invalid_record_id() {
        assert!(!RecordId::INVALID.is_valid());
        assert!(RecordId::new(PageId::new(3), 0).is_valid());
    }
}
