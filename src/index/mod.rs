//! Index structures.
//!
//! - [`btree`] - B+Tree secondary index over an integer attribute
//! - [`Datatype`] - Attribute type tags recorded in an index
//! - [`Operator`] - Comparison operators for range scans

pub mod btree;

pub use btree::BTreeIndex;

/// Type of the indexed attribute.
///
/// Only [`Datatype::Integer`] can be indexed; the other tags exist so an
/// index file can record what it was asked for.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Datatype {
    Integer = 0,
    Double = 1,
    String = 2,
}

impl Datatype {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Datatype::Integer),
            1 => Some(Datatype::Double),
            2 => Some(Datatype::String),
            _ => None,
        }
    }
}

/// Scan bound operator.
///
/// A low bound takes `Gt` or `Gte`, a high bound `Lt` or `Lte`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Lt,
    Lte,
    Gte,
    Gt,
}

impl Operator {
    /// Whether `key` satisfies `key <op> bound`.
    #[inline]
    pub fn admits(self, key: i32, bound: i32) -> bool {
        match self {
            Operator::Lt => key < bound,
            Operator::Lte => key <= bound,
            Operator::Gte => key >= bound,
            Operator::Gt => key > bound,
        }
    }

    #[inline]
    pub fn is_low_bound(self) -> bool {
        matches!(self, Operator::Gt | Operator::Gte)
    }

    #[inline]
    pub fn is_high_bound(self) -> bool {
        matches!(self, Operator::Lt | Operator::Lte)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_admits() {
        assert!(Operator::Gt.admits(11, 10));
        assert!(!Operator::Gt.admits(10, 10));
        assert!(Operator::Gte.admits(10, 10));
        assert!(Operator::Lt.admits(9, 10));
        assert!(!Operator::Lt.admits(10, 10));
        assert!(Operator::Lte.admits(10, 10));
    }

    #[test]
    fn test_operator_bound_sides() {
        assert!(Operator::Gt.is_low_bound() && Operator::Gte.is_low_bound());
        assert!(!Operator::Lt.is_low_bound());
        assert!(Operator::Lte.is_high_bound());
        assert!(!Operator::Gte.is_high_bound());
    }

    #[test]
    fn test_datatype_tags() {
        assert_eq!(Datatype::from_u8(0), Some(Datatype::Integer));
        assert_eq!(Datatype::from_u8(2), Some(Datatype::String));
        assert_eq!(Datatype::from_u8(9), None);
    }
}
