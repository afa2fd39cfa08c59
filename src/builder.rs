//! Construction of double-array dictionaries.
pub(crate) mod dawg;

use crate::dictionary::Dictionary;
use crate::errors::{DartError, Result};
use crate::keyset::Keyset;
use crate::unit::Unit;
use crate::BLOCK_SIZE;

use dawg::{Dawg, DawgBuilder};

// Blocks behind the latest ones are fixed and never searched again.
const NUM_EXTRA_BLOCKS: u32 = 16;
const NUM_EXTRAS: u32 = BLOCK_SIZE * NUM_EXTRA_BLOCKS;

const UPPER_MASK: u32 = 0xFF << 21;
const LOWER_MASK: u32 = 0xFF;

type ProgressFn<'a> = dyn FnMut(usize, usize) + 'a;

/// Builder of [`Dictionary`] with construction options.
///
/// If values are given, keys are first compressed into a minimal DAWG so that
/// equivalent subtrees are stored once. Otherwise, the trie of the keys is packed
/// directly and each key is associated with its index.
///
/// # Examples
///
/// ```
/// use dartdict::DictionaryBuilder;
///
/// let keys = ["apple", "apricot", "banana"];
/// let mut calls = 0;
/// let dict = DictionaryBuilder::new()
///     .progress(|_, _| calls += 1)
///     .build_from_records(&keys, &[3, 1, 4])
///     .unwrap();
///
/// assert_eq!(dict.exact_match_search(b"apricot").map(|m| m.value()), Some(1));
/// assert_eq!(calls, 4);
/// ```
#[derive(Default)]
pub struct DictionaryBuilder<'a> {
    progress: Option<Box<ProgressFn<'a>>>,
}

impl<'a> DictionaryBuilder<'a> {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a callback reporting `(processed, total)` during construction.
    ///
    /// `total` is the number of keys plus one, and the last call reports
    /// `(total, total)` after the array is packed.
    #[must_use]
    pub fn progress<F>(mut self, f: F) -> Self
    where
        F: FnMut(usize, usize) + 'a,
    {
        self.progress = Some(Box::new(f));
        self
    }

    /// Builds a dictionary associating each key with its index.
    ///
    /// # Errors
    ///
    /// [`DartError`] will be returned when `keys` is not strictly sorted, or
    /// contains an empty key or a key with NUL bytes, or when the resulting array
    /// exceeds the addressable range.
    pub fn build_from_keys<K>(self, keys: &[K]) -> Result<Dictionary>
    where
        K: AsRef<[u8]>,
    {
        self.build(keys, None)
    }

    /// Builds a dictionary associating `keys[i]` with `values[i]`.
    ///
    /// # Errors
    ///
    /// In addition to the cases of [`DictionaryBuilder::build_from_keys`],
    /// [`DartError`] will be returned when the lengths differ or a value exceeds
    /// `0x7fffffff`.
    pub fn build_from_records<K>(self, keys: &[K], values: &[u32]) -> Result<Dictionary>
    where
        K: AsRef<[u8]>,
    {
        self.build(keys, Some(values))
    }

    /// Builds a dictionary from keys and optional values.
    ///
    /// # Errors
    ///
    /// See [`DictionaryBuilder::build_from_records`].
    pub fn build<K>(self, keys: &[K], values: Option<&[u32]>) -> Result<Dictionary>
    where
        K: AsRef<[u8]>,
    {
        let keyset = Keyset::new(keys, values)?;
        let num_keys = keyset.num_keys();
        tracing::debug!(
            num_keys,
            minimized = keyset.has_values(),
            "building double array"
        );

        let mut builder = DoubleArrayBuilder::new(self.progress);
        if keyset.has_values() {
            let dawg = builder.build_dawg(&keyset)?;
            builder.build_from_dawg(&dawg)?;
        } else {
            builder.build_from_keyset(&keyset)?;
        }
        builder.report(num_keys + 1, num_keys + 1);

        tracing::debug!(num_units = builder.units.len(), "double array built");
        Ok(Dictionary::from_built_units(builder.units))
    }
}

/// Links of the circular free list and the state of a unit in the latest blocks.
#[derive(Default, Clone, Copy)]
struct ExtraUnit {
    prev: u32,
    next: u32,
    // The unit is reserved as a child or a dummy.
    is_fixed: bool,
    // The unit index is used as an offset.
    is_used: bool,
}

struct DoubleArrayBuilder<'a> {
    progress: Option<Box<ProgressFn<'a>>>,
    units: Vec<Unit>,
    extras: Vec<ExtraUnit>,
    labels: Vec<u8>,
    // Offsets assigned to shared DAWG states, indexed by intersection ids.
    table: Vec<u32>,
    extras_head: u32,
}

impl<'a> DoubleArrayBuilder<'a> {
    fn new(progress: Option<Box<ProgressFn<'a>>>) -> Self {
        Self {
            progress,
            units: vec![],
            extras: vec![],
            labels: vec![],
            table: vec![],
            extras_head: 0,
        }
    }

    #[inline(always)]
    fn report(&mut self, processed: usize, total: usize) {
        if let Some(progress) = self.progress.as_mut() {
            progress(processed, total);
        }
    }

    #[inline(always)]
    fn num_units(&self) -> u32 {
        self.units.len() as u32
    }

    #[inline(always)]
    fn num_blocks(&self) -> u32 {
        self.num_units() / BLOCK_SIZE
    }

    #[inline(always)]
    fn extra(&self, id: u32) -> &ExtraUnit {
        &self.extras[(id % NUM_EXTRAS) as usize]
    }

    #[inline(always)]
    fn extra_mut(&mut self, id: u32) -> &mut ExtraUnit {
        &mut self.extras[(id % NUM_EXTRAS) as usize]
    }

    fn build_dawg<K>(&mut self, keyset: &Keyset<K>) -> Result<Dawg>
    where
        K: AsRef<[u8]>,
    {
        let mut dawg_builder = DawgBuilder::new();
        let num_keys = keyset.num_keys();
        for i in 0..num_keys {
            dawg_builder.insert(keyset.key(i), keyset.value(i))?;
            self.report(i + 1, num_keys + 1);
        }
        dawg_builder.finish()
    }

    fn init_array(&mut self, num_units_hint: usize) -> Result<()> {
        self.units.reserve(num_units_hint.next_power_of_two());
        self.extras = vec![ExtraUnit::default(); NUM_EXTRAS as usize];
        self.extras_head = 0;

        self.reserve_id(0)?;
        self.extra_mut(0).is_used = true;
        self.units[0].set_offset(1)?;
        self.units[0].set_label(0);
        Ok(())
    }

    fn release_scratch(&mut self) {
        self.extras = vec![];
        self.labels = vec![];
        self.table = vec![];
    }

    fn build_from_dawg(&mut self, dawg: &Dawg) -> Result<()> {
        self.init_array(dawg.size())?;
        self.table = vec![0; dawg.num_intersections() as usize];

        if dawg.child(dawg.root()) != 0 {
            self.build_from_dawg_state(dawg, dawg.root(), 0)?;
        }
        self.fix_all_blocks()?;
        self.release_scratch();
        Ok(())
    }

    fn build_from_dawg_state(&mut self, dawg: &Dawg, dawg_id: u32, dic_id: u32) -> Result<()> {
        let mut dawg_child_id = dawg.child(dawg_id);
        if dawg.is_intersection(dawg_child_id) {
            let intersection_id = dawg.intersection_id(dawg_child_id) as usize;
            let offset = self.table[intersection_id];
            if offset != 0 {
                let offset = offset ^ dic_id;
                // The relative offset must fit in either encoding of the unit.
                if offset & UPPER_MASK == 0 || offset & LOWER_MASK == 0 {
                    if dawg.is_leaf(dawg_child_id) {
                        self.units[dic_id as usize].set_has_leaf(true);
                    }
                    return self.units[dic_id as usize].set_offset(offset);
                }
            }
        }

        let offset = self.arrange_from_dawg(dawg, dawg_id, dic_id)?;
        if dawg.is_intersection(dawg_child_id) {
            self.table[dawg.intersection_id(dawg_child_id) as usize] = offset;
        }

        loop {
            let child_label = dawg.label(dawg_child_id);
            let dic_child_id = offset ^ u32::from(child_label);
            if child_label != 0 {
                self.build_from_dawg_state(dawg, dawg_child_id, dic_child_id)?;
            }
            dawg_child_id = dawg.sibling(dawg_child_id);
            if dawg_child_id == 0 {
                break;
            }
        }
        Ok(())
    }

    fn arrange_from_dawg(&mut self, dawg: &Dawg, dawg_id: u32, dic_id: u32) -> Result<u32> {
        self.labels.clear();
        let mut dawg_child_id = dawg.child(dawg_id);
        while dawg_child_id != 0 {
            self.labels.push(dawg.label(dawg_child_id));
            dawg_child_id = dawg.sibling(dawg_child_id);
        }

        let offset = self.find_valid_offset(dic_id);
        self.units[dic_id as usize].set_offset(dic_id ^ offset)?;

        let mut dawg_child_id = dawg.child(dawg_id);
        for i in 0..self.labels.len() {
            let label = self.labels[i];
            let dic_child_id = offset ^ u32::from(label);
            self.reserve_id(dic_child_id)?;
            if dawg.is_leaf(dawg_child_id) {
                self.units[dic_id as usize].set_has_leaf(true);
                self.units[dic_child_id as usize].set_value(dawg.value(dawg_child_id));
            } else {
                self.units[dic_child_id as usize].set_label(label);
            }
            dawg_child_id = dawg.sibling(dawg_child_id);
        }
        self.extra_mut(offset).is_used = true;

        Ok(offset)
    }

    fn build_from_keyset<K>(&mut self, keyset: &Keyset<K>) -> Result<()>
    where
        K: AsRef<[u8]>,
    {
        self.init_array(keyset.num_keys())?;

        if keyset.num_keys() > 0 {
            self.build_from_keyset_range(keyset, 0, keyset.num_keys(), 0, 0)?;
        }
        self.fix_all_blocks()?;
        self.release_scratch();
        Ok(())
    }

    fn build_from_keyset_range<K>(
        &mut self,
        keyset: &Keyset<K>,
        mut begin: usize,
        end: usize,
        depth: usize,
        dic_id: u32,
    ) -> Result<()>
    where
        K: AsRef<[u8]>,
    {
        let offset = self.arrange_from_keyset(keyset, begin, end, depth, dic_id)?;

        while begin < end && keyset.key_byte(begin, depth) == 0 {
            begin += 1;
        }
        if begin == end {
            return Ok(());
        }

        let mut last_begin = begin;
        let mut last_label = keyset.key_byte(begin, depth);
        for i in begin + 1..end {
            let label = keyset.key_byte(i, depth);
            if label != last_label {
                let child_id = offset ^ u32::from(last_label);
                self.build_from_keyset_range(keyset, last_begin, i, depth + 1, child_id)?;
                last_begin = i;
                last_label = label;
            }
        }
        let child_id = offset ^ u32::from(last_label);
        self.build_from_keyset_range(keyset, last_begin, end, depth + 1, child_id)
    }

    fn arrange_from_keyset<K>(
        &mut self,
        keyset: &Keyset<K>,
        begin: usize,
        end: usize,
        depth: usize,
        dic_id: u32,
    ) -> Result<u32>
    where
        K: AsRef<[u8]>,
    {
        self.labels.clear();
        let mut value = None;
        for i in begin..end {
            let label = keyset.key_byte(i, depth);
            if label == 0 {
                let key = keyset.key(i);
                if depth == 0 {
                    return Err(DartError::input_at("keys must not be empty.", i, key));
                }
                if depth < key.len() {
                    return Err(DartError::input_at(
                        "keys must not contain NUL bytes.",
                        i,
                        key,
                    ));
                }
                if value.is_some() {
                    return Err(DartError::input_at(
                        "keys must not be duplicated.",
                        i,
                        key,
                    ));
                }
                value = Some(keyset.value(i));
                self.report(i + 1, keyset.num_keys() + 1);
            }
            match self.labels.last() {
                Some(&last) if label == last => {}
                Some(&last) if label < last => {
                    return Err(DartError::input_at(
                        "keys must be sorted.",
                        i,
                        keyset.key(i),
                    ));
                }
                _ => self.labels.push(label),
            }
        }

        let offset = self.find_valid_offset(dic_id);
        self.units[dic_id as usize].set_offset(dic_id ^ offset)?;

        for i in 0..self.labels.len() {
            let label = self.labels[i];
            let dic_child_id = offset ^ u32::from(label);
            self.reserve_id(dic_child_id)?;
            if label == 0 {
                self.units[dic_id as usize].set_has_leaf(true);
                self.units[dic_child_id as usize].set_value(value.unwrap_or(0));
            } else {
                self.units[dic_child_id as usize].set_label(label);
            }
        }
        self.extra_mut(offset).is_used = true;

        Ok(offset)
    }

    fn find_valid_offset(&self, id: u32) -> u32 {
        debug_assert!(!self.labels.is_empty());

        if self.extras_head >= self.num_units() {
            return self.num_units() | (id & LOWER_MASK);
        }

        let mut unfixed_id = self.extras_head;
        loop {
            let offset = unfixed_id ^ u32::from(self.labels[0]);
            if self.is_valid_offset(id, offset) {
                return offset;
            }
            unfixed_id = self.extra(unfixed_id).next;
            if unfixed_id == self.extras_head {
                break;
            }
        }
        self.num_units() | (id & LOWER_MASK)
    }

    #[inline(always)]
    fn is_valid_offset(&self, id: u32, offset: u32) -> bool {
        if self.extra(offset).is_used {
            return false;
        }
        let rel_offset = id ^ offset;
        if rel_offset & LOWER_MASK != 0 && rel_offset & UPPER_MASK != 0 {
            return false;
        }
        self.labels[1..]
            .iter()
            .all(|&label| !self.extra(offset ^ u32::from(label)).is_fixed)
    }

    fn reserve_id(&mut self, id: u32) -> Result<()> {
        if id >= self.num_units() {
            self.expand_units()?;
        }

        if id == self.extras_head {
            self.extras_head = self.extra(id).next;
            if self.extras_head == id {
                self.extras_head = self.num_units();
            }
        }
        let ExtraUnit { prev, next, .. } = *self.extra(id);
        self.extra_mut(prev).next = next;
        self.extra_mut(next).prev = prev;
        self.extra_mut(id).is_fixed = true;
        Ok(())
    }

    fn expand_units(&mut self) -> Result<()> {
        let src_num_units = self.num_units();
        let src_num_blocks = self.num_blocks();

        let dest_num_units = src_num_units
            .checked_add(BLOCK_SIZE)
            .ok_or_else(|| DartError::scale("number of units", u32::MAX - BLOCK_SIZE + 1))?;
        let dest_num_blocks = src_num_blocks + 1;

        if dest_num_blocks > NUM_EXTRA_BLOCKS {
            self.fix_block(src_num_blocks - NUM_EXTRA_BLOCKS)?;
        }

        self.units.resize(dest_num_units as usize, Unit::default());

        if dest_num_blocks > NUM_EXTRA_BLOCKS {
            for id in src_num_units..dest_num_units {
                let extra = self.extra_mut(id);
                extra.is_used = false;
                extra.is_fixed = false;
            }
        }

        for i in src_num_units + 1..dest_num_units {
            self.extra_mut(i - 1).next = i;
            self.extra_mut(i).prev = i - 1;
        }

        // Splices the new block before the head of the free list.
        self.extra_mut(src_num_units).prev = dest_num_units - 1;
        self.extra_mut(dest_num_units - 1).next = src_num_units;

        let head = self.extras_head;
        let tail = self.extra(head).prev;
        self.extra_mut(src_num_units).prev = tail;
        self.extra_mut(dest_num_units - 1).next = head;
        self.extra_mut(tail).next = src_num_units;
        self.extra_mut(head).prev = dest_num_units - 1;

        Ok(())
    }

    fn fix_all_blocks(&mut self) -> Result<()> {
        let end = self.num_blocks();
        let begin = end.saturating_sub(NUM_EXTRA_BLOCKS);
        for block_id in begin..end {
            self.fix_block(block_id)?;
        }
        Ok(())
    }

    fn fix_block(&mut self, block_id: u32) -> Result<()> {
        let begin = block_id * BLOCK_SIZE;
        let end = begin + BLOCK_SIZE;

        let unused_offset = (begin..end)
            .find(|&offset| !self.extra(offset).is_used)
            .unwrap_or(0);

        for id in begin..end {
            if !self.extra(id).is_fixed {
                self.reserve_id(id)?;
                // A dummy label that no state can reach.
                self.units[id as usize].set_label((id ^ unused_offset) as u8);
            }
        }
        tracing::trace!(block_id, unused_offset, "block fixed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const EXTENSION_BIT: u32 = 1 << 9;

    #[test]
    fn test_empty_keys() {
        let keys: [&str; 0] = [];
        let dict = DictionaryBuilder::new().build_from_keys(&keys).unwrap();
        assert_eq!(dict.size(), BLOCK_SIZE as usize);
        assert_eq!(dict.exact_match_search(b"a"), None);

        let dict = DictionaryBuilder::new()
            .build_from_records(&keys, &[])
            .unwrap();
        assert_eq!(dict.size(), BLOCK_SIZE as usize);
    }

    #[test]
    fn test_root_unit() {
        let keys = ["a", "b"];
        let dict = DictionaryBuilder::new().build_from_keys(&keys).unwrap();
        let root = dict.as_units()[0];
        assert_eq!(root.label(), 0);
        assert!(!root.has_leaf());
        assert!(root.offset() > 0 && root.offset() < 2 * BLOCK_SIZE);

        let keys: [&str; 0] = [];
        let dict = DictionaryBuilder::new().build_from_keys(&keys).unwrap();
        assert_eq!(dict.as_units()[0].offset(), 1);
    }

    #[test]
    fn test_unsorted_keys() {
        let keys = ["b", "a"];
        let e = DictionaryBuilder::new().build_from_keys(&keys).unwrap_err();
        match e {
            DartError::Input(e) => assert_eq!(e.key(), Some((1, &b"a"[..]))),
            _ => panic!(),
        }
        let e = DictionaryBuilder::new()
            .build_from_records(&keys, &[0, 1])
            .unwrap_err();
        assert!(matches!(e, DartError::Input(_)));
    }

    #[test]
    fn test_duplicated_keys() {
        let keys = ["a", "ab", "ab"];
        assert!(matches!(
            DictionaryBuilder::new().build_from_keys(&keys),
            Err(DartError::Input(_))
        ));
        assert!(matches!(
            DictionaryBuilder::new().build_from_records(&keys, &[0, 1, 2]),
            Err(DartError::Input(_))
        ));
    }

    #[test]
    fn test_empty_key() {
        let keys = ["", "a"];
        assert!(matches!(
            DictionaryBuilder::new().build_from_keys(&keys),
            Err(DartError::Input(_))
        ));
        assert!(matches!(
            DictionaryBuilder::new().build_from_records(&keys, &[0, 1]),
            Err(DartError::Input(_))
        ));
    }

    #[test]
    fn test_nul_key() {
        let keys: [&[u8]; 2] = [b"a\0", b"b"];
        assert!(matches!(
            DictionaryBuilder::new().build_from_keys(&keys),
            Err(DartError::Input(_))
        ));
        assert!(matches!(
            DictionaryBuilder::new().build_from_records(&keys, &[0, 1]),
            Err(DartError::Input(_))
        ));
    }

    #[test]
    fn test_too_large_value() {
        let keys = ["a"];
        assert!(matches!(
            DictionaryBuilder::new().build_from_records(&keys, &[0x8000_0000]),
            Err(DartError::Input(_))
        ));
    }

    #[test]
    fn test_progress() {
        let keys = ["a", "ab", "b", "bcd"];
        for values in [None, Some(&[1, 2, 3, 4][..])] {
            let mut reports = vec![];
            DictionaryBuilder::new()
                .progress(|processed, total| reports.push((processed, total)))
                .build(&keys, values)
                .unwrap();
            assert_eq!(reports, vec![(1, 5), (2, 5), (3, 5), (4, 5), (5, 5)]);
        }
    }

    #[test]
    fn test_many_blocks() {
        // Forces blocks to be fixed while building.
        let mut keys: Vec<String> = (0..20000).map(|i| format!("{:x}", i * 7919)).collect();
        keys.sort_unstable();
        keys.dedup();
        let dict = DictionaryBuilder::new().build_from_keys(&keys).unwrap();
        assert!(dict.size() > (NUM_EXTRA_BLOCKS * BLOCK_SIZE) as usize);
        assert_eq!(dict.size() % BLOCK_SIZE as usize, 0);
        for (i, key) in keys.iter().enumerate() {
            let m = dict.exact_match_search(key.as_bytes()).unwrap();
            assert_eq!(m.value(), i as u32);
            assert_eq!(m.length(), key.len());
        }
    }

    #[test]
    fn test_offset_straddling_masks() {
        let mut builder = DoubleArrayBuilder::new(None);
        builder.init_array(0).unwrap();
        builder.labels = vec![b'a'];

        // Relative offsets must have either the upper or the lower bits clear.
        assert!(builder.is_valid_offset(0, 0x101));
        assert!(builder.is_valid_offset(0, (1 << 21) | 0x100));
        assert!(!builder.is_valid_offset(0, (1 << 21) | 0x101));
        assert!(!builder.is_valid_offset(0x305, (1 << 22) | 0x100));
        assert!(builder.is_valid_offset(0x305, (1 << 22) | 0x105));

        // Offsets already used by other states are rejected.
        assert!(!builder.is_valid_offset(1, 0));
    }

    #[test]
    fn test_extended_offsets() {
        let mut rng = StdRng::seed_from_u64(2112);
        let mut keys: Vec<Vec<u8>> = (0..600_000)
            .map(|_| {
                let len = rng.gen_range(2..=10);
                (0..len).map(|_| rng.gen_range(1..=255)).collect()
            })
            .collect();
        keys.sort_unstable();
        keys.dedup();
        let values: Vec<u32> = keys.iter().map(|key| key.len() as u32).collect();

        for with_values in [false, true] {
            let dict = if with_values {
                DictionaryBuilder::new()
                    .build_from_records(&keys, &values)
                    .unwrap()
            } else {
                DictionaryBuilder::new().build_from_keys(&keys).unwrap()
            };

            let num_extended = dict
                .as_units()
                .iter()
                .filter(|unit| unit.label() <= 0xFF && unit.raw() & EXTENSION_BIT != 0)
                .count();
            assert!(num_extended > 0);

            for (i, key) in keys.iter().enumerate() {
                let expected = if with_values { values[i] } else { i as u32 };
                let m = dict.exact_match_search(key).unwrap();
                assert_eq!((m.value(), m.length()), (expected, key.len()));
            }

            let other = Dictionary::deserialize_from_slice(&dict.serialize_to_vec()).unwrap();
            assert_eq!(dict.as_units(), other.as_units());
        }
    }
}
