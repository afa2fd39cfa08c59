//! Append-only bit vector supporting rank queries.

const UNIT_SIZE: usize = 32;

/// Bit vector with a rank directory.
///
/// Bits are appended and set while building, then [`BitVector::build`] computes the
/// number of ones preceding every 32-bit word. No bit may be modified after that.
#[derive(Default, Clone, Debug)]
pub struct BitVector {
    units: Vec<u32>,
    ranks: Vec<u32>,
    num_ones: u32,
    len: usize,
    built: bool,
}

impl BitVector {
    /// Creates an empty bit vector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets the `i`-th bit.
    #[inline(always)]
    pub fn get(&self, i: usize) -> bool {
        debug_assert!(i < self.len());
        (self.units[i / UNIT_SIZE] >> (i % UNIT_SIZE)) & 1 == 1
    }

    /// Counts the ones in positions `0..=i`.
    #[inline(always)]
    pub fn rank(&self, i: usize) -> u32 {
        debug_assert!(self.built);
        debug_assert!(i < self.len());
        let unit_id = i / UNIT_SIZE;
        let mask = u32::MAX >> (UNIT_SIZE - (i % UNIT_SIZE) - 1);
        self.ranks[unit_id] + pop_count(self.units[unit_id] & mask)
    }

    /// Sets the `i`-th bit.
    pub fn set(&mut self, i: usize, bit: bool) {
        debug_assert!(!self.built);
        debug_assert!(i < self.len());
        let mask = 1 << (i % UNIT_SIZE);
        if bit {
            self.units[i / UNIT_SIZE] |= mask;
        } else {
            self.units[i / UNIT_SIZE] &= !mask;
        }
    }

    /// Appends an unset bit.
    pub fn append(&mut self) {
        debug_assert!(!self.built);
        if self.len % UNIT_SIZE == 0 {
            self.units.push(0);
        }
        self.len += 1;
    }

    /// Builds the rank directory.
    pub fn build(&mut self) {
        self.ranks = Vec::with_capacity(self.units.len());
        self.num_ones = 0;
        for &unit in &self.units {
            self.ranks.push(self.num_ones);
            self.num_ones += pop_count(unit);
        }
        self.built = true;
    }

    /// Gets the number of ones, available after [`BitVector::build`].
    #[inline(always)]
    pub const fn num_ones(&self) -> u32 {
        self.num_ones
    }

    /// Gets the number of bits.
    #[inline(always)]
    pub const fn len(&self) -> usize {
        self.len
    }
}

/// Counts the ones in a word.
#[inline(always)]
pub const fn pop_count(mut unit: u32) -> u32 {
    unit = ((unit & 0xAAAA_AAAA) >> 1) + (unit & 0x5555_5555);
    unit = ((unit & 0xCCCC_CCCC) >> 2) + (unit & 0x3333_3333);
    unit = ((unit >> 4) + unit) & 0x0F0F_0F0F;
    unit += unit >> 8;
    unit += unit >> 16;
    unit & 0xFF
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pop_count() {
        for &x in &[0, 1, 0x8000_0000, 0xFFFF_FFFF, 0xDEAD_BEEF, 0x0F0F_0F0F, 12345] {
            assert_eq!(pop_count(x), x.count_ones());
        }
    }

    #[test]
    fn test_rank() {
        let bits: Vec<bool> = (0..200).map(|i| i % 3 == 0 || i % 7 == 0).collect();
        let mut bv = BitVector::new();
        for (i, &b) in bits.iter().enumerate() {
            bv.append();
            bv.set(i, b);
        }
        bv.build();

        let mut expected = 0;
        for (i, &b) in bits.iter().enumerate() {
            if b {
                expected += 1;
            }
            assert_eq!(bv.get(i), b);
            assert_eq!(bv.rank(i), expected);
        }
        assert_eq!(bv.num_ones(), expected);
        assert_eq!(bv.len(), 200);
    }

    #[test]
    fn test_unset() {
        let mut bv = BitVector::new();
        for _ in 0..40 {
            bv.append();
        }
        bv.set(33, true);
        bv.set(5, true);
        bv.set(5, false);
        bv.build();
        assert!(!bv.get(5));
        assert_eq!(bv.rank(32), 0);
        assert_eq!(bv.rank(33), 1);
        assert_eq!(bv.rank(39), 1);
        assert_eq!(bv.num_ones(), 1);
    }

    #[test]
    fn test_empty() {
        let mut bv = BitVector::new();
        bv.build();
        assert_eq!(bv.len(), 0);
        assert_eq!(bv.num_ones(), 0);
    }
}
