//! Bit-packed 32-bit units.
use crate::errors::{DartError, Result};

const LABEL_MASK: u32 = 0xFF;
const HAS_LEAF_BIT: u32 = 1 << 8;
const EXTENSION_BIT: u32 = 1 << 9;
const IS_LEAF_BIT: u32 = 1 << 31;

/// Offsets must be less than this value.
pub(crate) const OFFSET_LIMIT: u32 = 1 << 29;
// Offsets not less than this value are stored without their low 8 bits.
const EXTENSION_LIMIT: u32 = 1 << 21;

/// A unit of a double array.
///
/// A unit either describes a transition (label, offset to the children, and
/// whether the state is accepting) or holds a value when the most significant bit
/// is set.
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Unit(u32);

impl Unit {
    /// Unit returned for positions outside the array. It never matches a byte and
    /// has no leaf.
    pub(crate) const DEAD: Self = Self(IS_LEAF_BIT);

    /// Creates a unit from its raw representation.
    #[inline(always)]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw representation.
    #[inline(always)]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Checks if the state has a value unit at its offset.
    #[inline(always)]
    pub const fn has_leaf(self) -> bool {
        (self.0 >> 8) & 1 == 1
    }

    /// Value of a value unit.
    #[inline(always)]
    pub const fn value(self) -> u32 {
        self.0 & !IS_LEAF_BIT
    }

    /// Label of a transition unit.
    ///
    /// The most significant bit is kept, so that the label of a value unit never
    /// equals a byte.
    #[inline(always)]
    pub const fn label(self) -> u32 {
        self.0 & (IS_LEAF_BIT | LABEL_MASK)
    }

    /// Offset XORed with the state position to reach the children.
    #[inline(always)]
    pub const fn offset(self) -> u32 {
        (self.0 >> 10) << ((self.0 & EXTENSION_BIT) >> 6)
    }

    #[inline(always)]
    pub(crate) fn set_has_leaf(&mut self, has_leaf: bool) {
        if has_leaf {
            self.0 |= HAS_LEAF_BIT;
        } else {
            self.0 &= !HAS_LEAF_BIT;
        }
    }

    #[inline(always)]
    pub(crate) fn set_value(&mut self, value: u32) {
        debug_assert_eq!(value & IS_LEAF_BIT, 0);
        self.0 = value | IS_LEAF_BIT;
    }

    #[inline(always)]
    pub(crate) fn set_label(&mut self, label: u8) {
        self.0 = (self.0 & !LABEL_MASK) | u32::from(label);
    }

    pub(crate) fn set_offset(&mut self, offset: u32) -> Result<()> {
        if offset >= OFFSET_LIMIT {
            return Err(DartError::scale("relative offset", OFFSET_LIMIT - 1));
        }
        self.0 &= IS_LEAF_BIT | HAS_LEAF_BIT | LABEL_MASK;
        if offset < EXTENSION_LIMIT {
            self.0 |= offset << 10;
        } else {
            debug_assert_eq!(offset & LABEL_MASK, 0);
            self.0 |= (offset << 2) | EXTENSION_BIT;
        }
        Ok(())
    }
}

/// A unit of the intermediate DAWG.
///
/// Terminal units store `value << 1 | has_sibling`, and the others store
/// `child << 2 | is_state << 1 | has_sibling`.
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct DawgUnit(u32);

impl DawgUnit {
    #[inline(always)]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[inline(always)]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline(always)]
    pub const fn child(self) -> u32 {
        self.0 >> 2
    }

    #[inline(always)]
    pub const fn has_sibling(self) -> bool {
        self.0 & 1 == 1
    }

    #[inline(always)]
    pub const fn value(self) -> u32 {
        self.0 >> 1
    }

    #[inline(always)]
    pub const fn is_state(self) -> bool {
        self.0 & 2 == 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_unit() {
        let mut unit = Unit::default();
        unit.set_label(b'a');
        unit.set_offset(1234).unwrap();
        unit.set_has_leaf(true);
        assert_eq!(unit.label(), u32::from(b'a'));
        assert_eq!(unit.offset(), 1234);
        assert!(unit.has_leaf());

        unit.set_has_leaf(false);
        unit.set_label(b'z');
        assert_eq!(unit.label(), u32::from(b'z'));
        assert_eq!(unit.offset(), 1234);
        assert!(!unit.has_leaf());
    }

    #[test]
    fn test_extended_offset() {
        let mut unit = Unit::default();
        unit.set_label(7);
        unit.set_offset(0x1234_5600).unwrap();
        assert_eq!(unit.offset(), 0x1234_5600);
        assert_eq!(unit.label(), 7);
        assert!(!unit.has_leaf());

        unit.set_offset((1 << 21) - 1).unwrap();
        assert_eq!(unit.offset(), (1 << 21) - 1);
        assert_eq!(unit.raw() & EXTENSION_BIT, 0);
    }

    #[test]
    fn test_too_large_offset() {
        let mut unit = Unit::default();
        assert!(unit.set_offset(OFFSET_LIMIT).is_err());
        assert!(unit.set_offset(OFFSET_LIMIT - 256).is_ok());
    }

    #[test]
    fn test_value_unit() {
        let mut unit = Unit::default();
        unit.set_value(0x7fff_ffff);
        assert_eq!(unit.value(), 0x7fff_ffff);
        for c in 0..=255 {
            assert_ne!(unit.label(), c);
        }
        unit.set_value(0);
        assert_eq!(unit.value(), 0);
        assert_eq!(unit.label(), 1 << 31);
    }

    #[test]
    fn test_dead_unit() {
        assert!(!Unit::DEAD.has_leaf());
        for c in 0..=255 {
            assert_ne!(Unit::DEAD.label(), c);
        }
    }

    #[test]
    fn test_dawg_unit() {
        let unit = DawgUnit::from_raw((12345 << 2) | 2 | 1);
        assert_eq!(unit.child(), 12345);
        assert!(unit.is_state());
        assert!(unit.has_sibling());

        let unit = DawgUnit::from_raw(9876 << 1);
        assert_eq!(unit.value(), 9876);
        assert!(!unit.has_sibling());
    }
}
